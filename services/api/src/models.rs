//! DuerOS Wire Models
//!
//! The subset of the DuerOS skill protocol this service reads and writes,
//! with `utoipa` schemas for the OpenAPI document. Conversions to and from the
//! core pipeline types live here so handlers stay thin.

use serde::{Deserialize, Serialize};
use skillbridge_core::{
    event::{EventKind, InboundRequest},
    response::{Directive, OutboundResponse, PlayBehavior},
};
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;

/// Intent name the host uses for free-form utterances.
pub const DEFAULT_INTENT: &str = "ai.dueros.common.default_intent";

/// Spoken when the backend or the QR service cannot be reached.
pub const FAILURE_SPEECH: &str = "抱歉，服务暂时不可用，请稍后再试。";

const PROTOCOL_VERSION: &str = "2.0";
const QRCODE_IMAGE_SCALE: u32 = 100;

// --- Inbound ---

#[derive(Deserialize, ToSchema, Debug, Default)]
pub struct DuerRequest {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub context: RequestContext,
    pub request: RequestBody,
}

#[derive(Deserialize, ToSchema, Debug, Default)]
pub struct RequestContext {
    #[serde(rename = "System", default)]
    pub system: SystemContext,
}

#[derive(Deserialize, ToSchema, Debug, Default)]
pub struct SystemContext {
    #[serde(default)]
    pub user: Option<UserContext>,
    #[serde(default)]
    pub application: ApplicationContext,
    #[serde(default)]
    pub device: DeviceContext,
}

#[derive(Deserialize, ToSchema, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Deserialize, ToSchema, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationContext {
    #[serde(default)]
    pub application_id: String,
}

#[derive(Deserialize, ToSchema, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct DeviceContext {
    #[serde(default)]
    #[schema(value_type = Object)]
    pub supported_interfaces: HashMap<String, serde_json::Value>,
}

#[derive(Deserialize, ToSchema, Debug, Default)]
pub struct RequestBody {
    #[serde(rename = "type")]
    #[schema(example = "IntentRequest")]
    pub kind: String,
    #[serde(default)]
    pub query: Option<QueryBody>,
    #[serde(default)]
    pub intents: Vec<IntentBody>,
    /// Stream token echoed back by audio player events.
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Deserialize, ToSchema, Debug, Default)]
pub struct QueryBody {
    #[serde(default)]
    pub original: Option<String>,
}

#[derive(Deserialize, ToSchema, Debug, Default)]
pub struct IntentBody {
    pub name: String,
}

impl DuerRequest {
    fn query(&self) -> Option<&str> {
        self.request.query.as_ref()?.original.as_deref()
    }

    fn event(&self) -> EventKind {
        match self.request.kind.as_str() {
            "LaunchRequest" => EventKind::Launch,
            "SessionEndedRequest" => EventKind::SessionEnd,
            "IntentRequest"
                if self
                    .request
                    .intents
                    .first()
                    .is_some_and(|i| i.name == DEFAULT_INTENT) =>
            {
                EventKind::Utterance {
                    text: self.query().unwrap_or_default().to_string(),
                }
            }
            "AudioPlayer.PlaybackFinished" => EventKind::PlaybackFinished {
                audio_url: self
                    .query()
                    .or(self.request.token.as_deref())
                    .unwrap_or_default()
                    .to_string(),
            },
            _ => EventKind::Unknown,
        }
    }

    /// Converts the wire request into the pipeline's typed request.
    pub fn into_inbound(self) -> InboundRequest {
        let event = self.event();
        let system = self.context.system;
        InboundRequest {
            bot_id: system.application.application_id,
            host_user_id: system.user.and_then(|u| u.user_id),
            supports_display: system.device.supported_interfaces.contains_key("Display"),
            event,
        }
    }
}

// --- Outbound ---

#[derive(Serialize, ToSchema, Debug, Clone, PartialEq)]
pub struct DuerResponse {
    pub version: String,
    pub context: ResponseContext,
    pub session: ResponseSession,
    pub response: ResponseBody,
}

/// Always serialized as `{}`.
#[derive(Serialize, ToSchema, Debug, Clone, PartialEq, Default)]
pub struct ResponseContext {}

#[derive(Serialize, ToSchema, Debug, Clone, PartialEq, Default)]
pub struct ResponseSession {
    pub attributes: HashMap<String, String>,
}

#[derive(Serialize, ToSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseBody {
    #[schema(value_type = Vec<Object>)]
    pub directives: Vec<DuerDirective>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_speech: Option<PlainText>,
    pub should_end_session: bool,
    pub expect_speech: bool,
}

#[derive(Serialize, ToSchema, Debug, Clone, PartialEq)]
pub struct PlainText {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl PlainText {
    fn new(text: impl Into<String>) -> Self {
        Self {
            kind: "PlainText".to_string(),
            text: text.into(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum DuerDirective {
    #[serde(rename = "Display.RenderTemplate")]
    RenderTemplate { template: Template },
    #[serde(rename = "AudioPlayer.Play", rename_all = "camelCase")]
    AudioPlay {
        play_behavior: &'static str,
        audio_item: AudioItem,
    },
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum Template {
    #[serde(rename_all = "camelCase")]
    BodyTemplate1 {
        token: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        text_content: PlainText,
        #[serde(skip_serializing_if = "Option::is_none")]
        background_image: Option<ImageRef>,
    },
    #[serde(rename_all = "camelCase")]
    BodyTemplate2 {
        token: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        content: PlainText,
        image: ScaledImage,
        #[serde(skip_serializing_if = "Option::is_none")]
        background_image: Option<ImageRef>,
    },
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ImageRef {
    pub url: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScaledImage {
    pub url: String,
    pub width_scale: u32,
    pub height_scale: u32,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AudioItem {
    pub stream: AudioStream,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AudioStream {
    pub url: String,
    pub stream_format: &'static str,
    pub offset_in_milli_seconds: u64,
    pub token: String,
}

/// Directive tokens are stable for identical content.
fn token_for(content: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, content.as_bytes()).to_string()
}

impl From<&Directive> for DuerDirective {
    fn from(directive: &Directive) -> Self {
        match directive {
            Directive::TextCard {
                title,
                body,
                background_image,
            } => DuerDirective::RenderTemplate {
                template: Template::BodyTemplate1 {
                    token: token_for(body),
                    title: title.clone(),
                    text_content: PlainText::new(body.clone()),
                    background_image: background_image.clone().map(|url| ImageRef { url }),
                },
            },
            Directive::ImageCard {
                title,
                body,
                background_image,
                image_url,
            } => DuerDirective::RenderTemplate {
                template: Template::BodyTemplate2 {
                    token: token_for(image_url),
                    title: title.clone(),
                    content: PlainText::new(body.clone()),
                    image: ScaledImage {
                        url: image_url.clone(),
                        width_scale: QRCODE_IMAGE_SCALE,
                        height_scale: QRCODE_IMAGE_SCALE,
                    },
                    background_image: background_image.clone().map(|url| ImageRef { url }),
                },
            },
            Directive::AudioPlay { url, behavior } => DuerDirective::AudioPlay {
                play_behavior: match behavior {
                    PlayBehavior::ReplaceAll => "REPLACE_ALL",
                },
                audio_item: AudioItem {
                    stream: AudioStream {
                        url: url.clone(),
                        stream_format: "AUDIO_MP3",
                        offset_in_milli_seconds: 0,
                        token: token_for(url),
                    },
                },
            },
        }
    }
}

impl From<&OutboundResponse> for DuerResponse {
    fn from(out: &OutboundResponse) -> Self {
        let output_speech =
            (!out.speech_text.is_empty()).then(|| PlainText::new(out.speech_text.clone()));
        Self {
            version: PROTOCOL_VERSION.to_string(),
            context: ResponseContext::default(),
            session: ResponseSession::default(),
            response: ResponseBody {
                directives: out.directives.iter().map(DuerDirective::from).collect(),
                output_speech,
                should_end_session: out.dialog_should_end,
                expect_speech: out.expects_further_speech,
            },
        }
    }
}

impl DuerResponse {
    /// The generic answer given when a collaborator service fails.
    pub fn failure() -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            context: ResponseContext::default(),
            session: ResponseSession::default(),
            response: ResponseBody {
                directives: Vec::new(),
                output_speech: Some(PlainText::new(FAILURE_SPEECH)),
                should_end_session: true,
                expect_speech: false,
            },
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
    #[schema(example = "display-first")]
    pub response_mode: String,
}
