//! Skill Pipeline
//!
//! Runs one host request end to end: identity and agent resolution, event
//! normalization, the backend round trip and response building. A pipeline is
//! built once at startup and shared by every request; it holds no mutable
//! state of its own.

use crate::{
    agent::AgentRegistry,
    chatbot_client::ChatbotClient,
    error::PipelineError,
    event::{InboundRequest, SessionContext, normalize},
    identity::{DEFAULT_USER_ID_PREFIX, resolve_user_id},
    qrcode::QrCodeProvider,
    response::{OutboundResponse, ResponseBuilder, ResponseMode},
};
use std::sync::Arc;
use tracing::{error, instrument};

/// Tunables of the pipeline that come from configuration.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub mode: ResponseMode,
    pub user_id_prefix: String,
    /// Reject requests from unregistered bots instead of running degraded.
    pub strict_registry: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            mode: ResponseMode::default(),
            user_id_prefix: DEFAULT_USER_ID_PREFIX.to_string(),
            strict_registry: false,
        }
    }
}

pub struct SkillPipeline {
    registry: Arc<AgentRegistry>,
    chatbot: Arc<dyn ChatbotClient>,
    qrcode: Arc<dyn QrCodeProvider>,
    builder: ResponseBuilder,
    options: PipelineOptions,
}

impl SkillPipeline {
    pub fn new(
        registry: Arc<AgentRegistry>,
        chatbot: Arc<dyn ChatbotClient>,
        qrcode: Arc<dyn QrCodeProvider>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            registry,
            chatbot,
            qrcode,
            builder: ResponseBuilder::new(options.mode),
            options,
        }
    }

    pub fn mode(&self) -> ResponseMode {
        self.builder.mode()
    }

    /// Resolves the user identity and agent profile for `request`.
    pub fn session_context(&self, request: &InboundRequest) -> Result<SessionContext, PipelineError> {
        let user_id = resolve_user_id(
            &self.options.user_id_prefix,
            request.host_user_id.as_deref(),
        )?;

        let agent = match self.registry.lookup(&request.bot_id) {
            Ok(profile) => Some(profile),
            Err(e) if self.options.strict_registry => return Err(e.into()),
            Err(e) => {
                error!(error = %e, "Continuing without agent");
                None
            }
        };

        Ok(SessionContext {
            user_id,
            agent,
            supports_visual_display: request.supports_display,
        })
    }

    /// Handles one inbound request and produces the host response.
    #[instrument(name = "skill_request", skip_all, fields(bot_id = %request.bot_id, user_id))]
    pub async fn handle(&self, request: InboundRequest) -> Result<OutboundResponse, PipelineError> {
        let ctx = self.session_context(&request)?;
        tracing::Span::current().record("user_id", ctx.user_id.as_str());

        let (event, host) = normalize(request.event, &ctx);
        if !event.dispatches_to_backend() {
            return Ok(OutboundResponse::empty(host));
        }

        let reply = self.chatbot.dispose(ctx.agent_name(), &event).await?;
        let response = self
            .builder
            .build(&reply, &ctx, host, self.qrcode.as_ref())
            .await?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        agent::AgentProfile,
        error::TransportError,
        event::{EventKind, NormalizedEvent},
        qrcode::MockQrCodeProvider,
        reply::{AgentReply, Instruction},
        response::{Directive, QRCODE_PROMPT},
    };
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// A chatbot that answers every event with the same reply and records what it saw.
    struct FakeChatbot {
        reply: Result<AgentReply, ()>,
        seen: Mutex<Vec<(Option<String>, NormalizedEvent)>>,
    }

    impl FakeChatbot {
        fn replying(reply: AgentReply) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(Option<String>, NormalizedEvent)> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatbotClient for FakeChatbot {
        async fn dispose(
            &self,
            agent: Option<&str>,
            event: &NormalizedEvent,
        ) -> Result<AgentReply, TransportError> {
            self.seen
                .lock()
                .unwrap()
                .push((agent.map(str::to_string), event.clone()));
            self.reply
                .clone()
                .map_err(|_| TransportError::Timeout { service: "chatbot" })
        }
    }

    fn registry() -> Arc<AgentRegistry> {
        Arc::new(AgentRegistry::new([
            (
                "bot-math".to_string(),
                AgentProfile {
                    agent_name: "math-helper".to_string(),
                    display_title: "math-helper-title".to_string(),
                    background_image_url: "https://img.example.com/math.png".to_string(),
                },
            ),
            (
                "bot-course".to_string(),
                AgentProfile {
                    agent_name: "course-record".to_string(),
                    display_title: "Course".to_string(),
                    background_image_url: "https://img.example.com/course.png".to_string(),
                },
            ),
        ]))
    }

    fn pipeline(
        chatbot: Arc<FakeChatbot>,
        qrcode: MockQrCodeProvider,
        options: PipelineOptions,
    ) -> SkillPipeline {
        SkillPipeline::new(registry(), chatbot, Arc::new(qrcode), options)
    }

    fn request(bot_id: &str, display: bool, event: EventKind) -> InboundRequest {
        InboundRequest {
            bot_id: bot_id.to_string(),
            host_user_id: Some("u1".to_string()),
            supports_display: display,
            event,
        }
    }

    #[tokio::test]
    async fn test_utterance_round_trip() {
        let chatbot = FakeChatbot::replying(AgentReply::text("2+2=4"));
        let pipeline = pipeline(
            chatbot.clone(),
            MockQrCodeProvider::new(),
            PipelineOptions::default(),
        );

        let out = pipeline
            .handle(request(
                "bot-math",
                false,
                EventKind::Utterance {
                    text: "2+2".to_string(),
                },
            ))
            .await
            .unwrap();

        assert!(out.directives.is_empty());
        assert_eq!(out.speech_text, "2+2=4");
        assert!(out.expects_further_speech);
        assert!(!out.dialog_should_end);

        let calls = chatbot.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0.as_deref(), Some("math-helper"));
        assert_eq!(calls[0].1.user_id, "dueros_u1");
        assert!(!calls[0].1.supports_visual_display);
    }

    #[tokio::test]
    async fn test_session_end_always_terminates() {
        for mode in [ResponseMode::DisplayFirst, ResponseMode::EndFirst] {
            let chatbot = FakeChatbot::replying(AgentReply::text("see you"));
            let pipeline = pipeline(
                chatbot.clone(),
                MockQrCodeProvider::new(),
                PipelineOptions {
                    mode,
                    ..PipelineOptions::default()
                },
            );
            let out = pipeline
                .handle(request("bot-math", true, EventKind::SessionEnd))
                .await
                .unwrap();
            assert!(out.dialog_should_end);
            assert!(!out.expects_further_speech);
            assert_eq!(chatbot.calls().len(), 1);
        }
    }

    #[tokio::test]
    async fn test_unknown_event_skips_backend() {
        let chatbot = FakeChatbot::replying(AgentReply::text("never"));
        let pipeline = pipeline(
            chatbot.clone(),
            MockQrCodeProvider::new(),
            PipelineOptions::default(),
        );
        let out = pipeline
            .handle(request("bot-math", true, EventKind::Unknown))
            .await
            .unwrap();
        assert!(out.directives.is_empty());
        assert!(out.speech_text.is_empty());
        assert!(!out.expects_further_speech);
        assert!(chatbot.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unregistered_bot_runs_degraded() {
        let chatbot = FakeChatbot::replying(AgentReply::text("hi"));
        let pipeline = pipeline(
            chatbot.clone(),
            MockQrCodeProvider::new(),
            PipelineOptions::default(),
        );
        let out = pipeline
            .handle(request("bot-unknown", true, EventKind::Launch))
            .await
            .unwrap();
        assert_eq!(
            out.directives,
            vec![Directive::TextCard {
                title: None,
                body: "hi".to_string(),
                background_image: None,
            }]
        );
        assert_eq!(chatbot.calls()[0].0, None);
    }

    #[tokio::test]
    async fn test_unregistered_bot_rejected_when_strict() {
        let chatbot = FakeChatbot::replying(AgentReply::text("hi"));
        let pipeline = pipeline(
            chatbot.clone(),
            MockQrCodeProvider::new(),
            PipelineOptions {
                strict_registry: true,
                ..PipelineOptions::default()
            },
        );
        let err = pipeline
            .handle(request("bot-unknown", true, EventKind::Launch))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
        assert!(chatbot.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_user_id_is_rejected() {
        let chatbot = FakeChatbot::replying(AgentReply::text("hi"));
        let pipeline = pipeline(
            chatbot.clone(),
            MockQrCodeProvider::new(),
            PipelineOptions::default(),
        );
        let mut req = request("bot-math", true, EventKind::Launch);
        req.host_user_id = None;
        let err = pipeline.handle(req).await.unwrap_err();
        assert!(matches!(err, PipelineError::Identity(_)));
    }

    #[tokio::test]
    async fn test_backend_failure_surfaces() {
        let pipeline = pipeline(
            FakeChatbot::failing(),
            MockQrCodeProvider::new(),
            PipelineOptions::default(),
        );
        let err = pipeline
            .handle(request("bot-math", true, EventKind::Launch))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Transport(_)));
    }

    #[tokio::test]
    async fn test_course_record_hand_off_uses_user_id_as_scene() {
        let mut qr = MockQrCodeProvider::new();
        qr.expect_image_url()
            .withf(|scene| scene == "dueros_u1")
            .times(1)
            .returning(|_| Ok("https://x/qr1".to_string()));
        let chatbot = FakeChatbot::replying(AgentReply::text("请找哒尔文帮忙"));
        let pipeline = pipeline(chatbot, qr, PipelineOptions::default());

        let out = pipeline
            .handle(request(
                "bot-course",
                true,
                EventKind::Utterance {
                    text: "录课".to_string(),
                },
            ))
            .await
            .unwrap();
        assert_eq!(out.speech_text, QRCODE_PROMPT);
        assert!(matches!(
            &out.directives[..],
            [Directive::ImageCard { image_url, .. }] if image_url == "https://x/qr1"
        ));
    }

    #[tokio::test]
    async fn test_playback_finished_with_audio_reply() {
        let reply = AgentReply::text("next track").with_instructions(vec![
            Instruction::PlayAudio {
                url: "https://a/b.mp3".to_string(),
            },
        ]);
        let chatbot = FakeChatbot::replying(reply);
        let pipeline = pipeline(
            chatbot.clone(),
            MockQrCodeProvider::new(),
            PipelineOptions::default(),
        );
        let out = pipeline
            .handle(request(
                "bot-math",
                false,
                EventKind::PlaybackFinished {
                    audio_url: "http://a/a.mp3".to_string(),
                },
            ))
            .await
            .unwrap();
        assert!(!out.expects_further_speech);
        assert_eq!(out.directives.len(), 1);
        assert_eq!(
            chatbot.calls()[0].1.kind,
            EventKind::PlaybackFinished {
                audio_url: "http://a/a.mp3".to_string()
            }
        );
    }
}
