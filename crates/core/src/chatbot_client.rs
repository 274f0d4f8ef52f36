//! Backend Client
//!
//! Forwards normalized events to the remote conversational agent. The agent's
//! dialog logic is opaque to this crate; only the request/reply contract is
//! modeled here.

use crate::{
    error::TransportError,
    event::{EventKind, NormalizedEvent},
    reply::{AgentReply, ReplyBody},
};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

const SERVICE: &str = "chatbot";

/// Sends one normalized event to the backend agent and returns its reply.
#[async_trait]
pub trait ChatbotClient: Send + Sync {
    /// Delivers `event` to the agent named `agent`.
    ///
    /// `agent` is `None` when the bot id was not registered; the backend then
    /// receives a `null` agent, matching the degraded behavior of the service.
    async fn dispose(
        &self,
        agent: Option<&str>,
        event: &NormalizedEvent,
    ) -> Result<AgentReply, TransportError>;
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct DisposeRequest<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    agent: Option<&'a str>,
    source: &'a str,
    user_id: &'a str,
    display: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    query: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
}

impl<'a> DisposeRequest<'a> {
    /// Returns `None` for events the backend has no vocabulary for.
    fn new(agent: Option<&'a str>, source: &'a str, event: &'a NormalizedEvent) -> Option<Self> {
        let (kind, query, url) = match &event.kind {
            EventKind::Launch => ("open-skill", None, None),
            EventKind::Utterance { text } => ("query", Some(text.as_str()), None),
            EventKind::SessionEnd => ("quit-skill", None, None),
            EventKind::PlaybackFinished { audio_url } => {
                ("play-finish", None, Some(audio_url.as_str()))
            }
            EventKind::Unknown => return None,
        };
        Some(Self {
            kind,
            agent,
            source,
            user_id: &event.user_id,
            display: event.supports_visual_display,
            query,
            url,
        })
    }
}

/// A `ChatbotClient` speaking JSON over HTTP.
pub struct HttpChatbotClient {
    client: reqwest::Client,
    url: String,
    source: String,
}

impl HttpChatbotClient {
    /// Creates a client posting to `url`, tagging every event with `source`.
    ///
    /// Every call is bounded by `timeout`; an elapsed timeout surfaces as
    /// [`TransportError::Timeout`].
    pub fn new(url: String, source: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url,
            source,
        })
    }
}

#[async_trait]
impl ChatbotClient for HttpChatbotClient {
    async fn dispose(
        &self,
        agent: Option<&str>,
        event: &NormalizedEvent,
    ) -> Result<AgentReply, TransportError> {
        let Some(body) = DisposeRequest::new(agent, &self.source, event) else {
            debug!(user_id = %event.user_id, "Unknown event has no chatbot counterpart");
            return Ok(AgentReply::text(""));
        };
        debug!(kind = body.kind, user_id = %event.user_id, "Dispatching event to chatbot");

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                service: SERVICE,
                status,
            });
        }

        let reply: ReplyBody = response
            .json()
            .await
            .map_err(|e| TransportError::from_reqwest(SERVICE, e))?;
        Ok(reply.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reply::Instruction;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_json, method, path},
    };

    fn event(kind: EventKind) -> NormalizedEvent {
        NormalizedEvent {
            user_id: "dueros_u1".to_string(),
            supports_visual_display: true,
            kind,
        }
    }

    fn client(server: &MockServer, timeout: Duration) -> HttpChatbotClient {
        HttpChatbotClient::new(
            format!("{}/chatbot", server.uri()),
            "dueros".to_string(),
            timeout,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_dispose_utterance() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chatbot"))
            .and(body_json(json!({
                "type": "query",
                "agent": "math-helper",
                "source": "dueros",
                "userId": "dueros_u1",
                "display": true,
                "query": "2+2"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "reply": "2+2=4",
                "instructs": [{ "type": "play-audio", "url": "https://a/b.mp3" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client(&server, Duration::from_secs(5))
            .dispose(
                Some("math-helper"),
                &event(EventKind::Utterance {
                    text: "2+2".to_string(),
                }),
            )
            .await
            .unwrap();

        assert_eq!(reply.text, "2+2=4");
        assert_eq!(
            reply.instructions,
            Some(vec![Instruction::PlayAudio {
                url: "https://a/b.mp3".to_string()
            }])
        );
    }

    #[tokio::test]
    async fn test_dispose_playback_finished_with_unregistered_agent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(json!({
                "type": "play-finish",
                "agent": null,
                "source": "dueros",
                "userId": "dueros_u1",
                "display": true,
                "url": "https://a/b.mp3"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "reply": "next" })))
            .mount(&server)
            .await;

        let reply = client(&server, Duration::from_secs(5))
            .dispose(
                None,
                &event(EventKind::PlaybackFinished {
                    audio_url: "https://a/b.mp3".to_string(),
                }),
            )
            .await
            .unwrap();
        assert_eq!(reply, AgentReply::text("next"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client(&server, Duration::from_secs(5))
            .dispose(Some("math-helper"), &event(EventKind::Launch))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransportError::Status { status, .. } if status == reqwest::StatusCode::SERVICE_UNAVAILABLE
        ));
    }

    #[tokio::test]
    async fn test_slow_backend_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "reply": "late" }))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let err = client(&server, Duration::from_millis(50))
            .dispose(Some("math-helper"), &event(EventKind::SessionEnd))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout { service: "chatbot" }));
    }

    #[tokio::test]
    async fn test_unknown_event_is_not_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "reply": "no" })))
            .expect(0)
            .mount(&server)
            .await;

        let reply = client(&server, Duration::from_secs(5))
            .dispose(Some("math-helper"), &event(EventKind::Unknown))
            .await
            .unwrap();
        assert_eq!(reply, AgentReply::text(""));
    }

    #[tokio::test]
    async fn test_malformed_instruct_keeps_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "reply": "hi",
                "instructs": [{ "kind": "x" }, { "type": "play-audio" }]
            })))
            .mount(&server)
            .await;

        let reply = client(&server, Duration::from_secs(5))
            .dispose(Some("math-helper"), &event(EventKind::Launch))
            .await
            .unwrap();
        assert_eq!(reply.text, "hi");
        assert_eq!(reply.first_audio_url(), None);
    }
}
