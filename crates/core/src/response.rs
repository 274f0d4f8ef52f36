//! Response Builder
//!
//! Decides what the voice host should say and show for an agent reply. The
//! decision depends on the reply itself, on whether the device has a screen,
//! on which agent is answering, and on the configured [`ResponseMode`].
//!
//! Two modes exist because deployed skills disagree on precedence:
//!
//! - [`ResponseMode::DisplayFirst`] checks the QR hand-off before the dialog
//!   end, keeps cards on a closing reply and honors `play-audio` instructions.
//! - [`ResponseMode::EndFirst`] answers a closing reply with speech only and
//!   never emits audio directives.

use crate::{
    HostState,
    agent::COURSE_RECORD_AGENT,
    error::TransportError,
    event::SessionContext,
    qrcode::QrCodeProvider,
    reply::AgentReply,
};
use std::{fmt, str::FromStr};
use tracing::debug;

/// Spoken and shown instead of the agent reply when the QR code card is used.
pub const QRCODE_PROMPT: &str = "请使用微信扫描二维码，打开小程序进行课程的录制和修改。";

/// Reply text marker that makes the course recording agent hand off to WeChat.
pub const QRCODE_MARKER: &str = "哒尔文";

/// Precedence policy of the response builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseMode {
    #[default]
    DisplayFirst,
    EndFirst,
}

impl ResponseMode {
    fn honors_audio(self) -> bool {
        matches!(self, ResponseMode::DisplayFirst)
    }
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseMode::DisplayFirst => write!(f, "display-first"),
            ResponseMode::EndFirst => write!(f, "end-first"),
        }
    }
}

impl FromStr for ResponseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "display-first" | "a" => Ok(ResponseMode::DisplayFirst),
            "end-first" | "b" => Ok(ResponseMode::EndFirst),
            other => Err(format!("'{other}' is not a response mode")),
        }
    }
}

/// How a new audio stream interacts with whatever is already queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayBehavior {
    ReplaceAll,
}

/// Non-speech output for the voice host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    TextCard {
        title: Option<String>,
        body: String,
        background_image: Option<String>,
    },
    ImageCard {
        title: Option<String>,
        body: String,
        background_image: Option<String>,
        image_url: String,
    },
    AudioPlay {
        url: String,
        behavior: PlayBehavior,
    },
}

/// Final output of the pipeline, including the host flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundResponse {
    pub directives: Vec<Directive>,
    pub speech_text: String,
    pub dialog_should_end: bool,
    pub expects_further_speech: bool,
}

impl OutboundResponse {
    pub fn new(directives: Vec<Directive>, speech_text: String, host: HostState) -> Self {
        Self {
            directives,
            speech_text,
            dialog_should_end: host.dialog_ended,
            expects_further_speech: host.expect_speech,
        }
    }

    /// A response with nothing to say or show.
    pub fn empty(host: HostState) -> Self {
        Self::new(Vec::new(), String::new(), host)
    }
}

/// The host's audio player only accepts plain `http` streams.
fn insecure_audio_url(url: &str) -> String {
    match url.get(..8) {
        Some(scheme) if scheme.eq_ignore_ascii_case("https://") => {
            format!("http://{}", &url[8..])
        }
        _ => url.to_string(),
    }
}

/// Whether the reply should be replaced by the WeChat QR code card.
pub fn should_display_qrcode(reply: &AgentReply, ctx: &SessionContext) -> bool {
    ctx.supports_visual_display
        && ctx.agent_name() == Some(COURSE_RECORD_AGENT)
        && reply.text.contains(QRCODE_MARKER)
}

/// Renders agent replies into host output according to a [`ResponseMode`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseBuilder {
    mode: ResponseMode,
}

impl ResponseBuilder {
    pub fn new(mode: ResponseMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ResponseMode {
        self.mode
    }

    /// Builds the outbound response for `reply`.
    ///
    /// `host` is the state left by the event normalizer. The QR provider is
    /// only called when the QR card is chosen, and its failure is returned
    /// as is.
    pub async fn build(
        &self,
        reply: &AgentReply,
        ctx: &SessionContext,
        host: HostState,
        qrcode: &dyn QrCodeProvider,
    ) -> Result<OutboundResponse, TransportError> {
        match self.mode {
            ResponseMode::DisplayFirst => {
                if should_display_qrcode(reply, ctx) {
                    return self.qrcode_card(ctx, host, qrcode).await;
                }
                let host = if reply.wants_dialog_end {
                    host.without_speech().end_dialog()
                } else {
                    host
                };
                Ok(self.with_directives(reply, ctx, host))
            }
            ResponseMode::EndFirst => {
                if reply.wants_dialog_end {
                    let host = host.without_speech().end_dialog();
                    return Ok(OutboundResponse::new(Vec::new(), reply.text.clone(), host));
                }
                if should_display_qrcode(reply, ctx) {
                    return self.qrcode_card(ctx, host, qrcode).await;
                }
                Ok(self.with_directives(reply, ctx, host))
            }
        }
    }

    async fn qrcode_card(
        &self,
        ctx: &SessionContext,
        host: HostState,
        qrcode: &dyn QrCodeProvider,
    ) -> Result<OutboundResponse, TransportError> {
        let image_url = qrcode.image_url(&ctx.user_id).await?;
        debug!(user_id = %ctx.user_id, %image_url, "Handing off to QR code card");

        let agent = ctx.agent.as_deref();
        let card = Directive::ImageCard {
            title: agent.map(|a| a.display_title.clone()),
            body: QRCODE_PROMPT.to_string(),
            background_image: agent.map(|a| a.background_image_url.clone()),
            image_url,
        };
        Ok(OutboundResponse::new(
            vec![card],
            QRCODE_PROMPT.to_string(),
            host.without_speech(),
        ))
    }

    fn with_directives(
        &self,
        reply: &AgentReply,
        ctx: &SessionContext,
        mut host: HostState,
    ) -> OutboundResponse {
        let mut directives = Vec::new();

        if ctx.supports_visual_display {
            let agent = ctx.agent.as_deref();
            directives.push(Directive::TextCard {
                title: agent.map(|a| a.display_title.clone()),
                body: reply.text.clone(),
                background_image: agent.map(|a| a.background_image_url.clone()),
            });
        }

        // The host plays a single stream per response.
        if self.mode.honors_audio() {
            if let Some(url) = reply.first_audio_url() {
                directives.push(Directive::AudioPlay {
                    url: insecure_audio_url(url),
                    behavior: PlayBehavior::ReplaceAll,
                });
                host = host.without_speech();
            }
        }

        OutboundResponse::new(directives, reply.text.clone(), host)
    }
}
