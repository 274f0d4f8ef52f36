//! Event Normalizer
//!
//! Turns the typed dialog triggers delivered by the voice host into the
//! normalized events understood by the backend agent, and computes the host
//! state that must be in place before the backend call is made.

use crate::HostState;
use crate::agent::AgentProfile;
use std::sync::Arc;

/// The dialog trigger carried by an inbound host request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// The user opened the skill.
    Launch,
    /// The user said something.
    Utterance { text: String },
    /// The host is closing the session.
    SessionEnd,
    /// An audio stream started by an earlier response has finished playing.
    PlaybackFinished { audio_url: String },
    /// Any trigger this adapter has no handler for.
    Unknown,
}

/// A host request after parsing, before any identity or registry resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRequest {
    pub bot_id: String,
    pub host_user_id: Option<String>,
    pub supports_display: bool,
    pub event: EventKind,
}

/// Per-request context shared by the normalizer and the response builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: String,
    /// `None` when the bot id is not registered and the request runs degraded.
    pub agent: Option<Arc<AgentProfile>>,
    pub supports_visual_display: bool,
}

impl SessionContext {
    pub fn agent_name(&self) -> Option<&str> {
        self.agent.as_deref().map(|a| a.agent_name.as_str())
    }
}

/// The backend-protocol shaped form of a dialog trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedEvent {
    pub user_id: String,
    pub supports_visual_display: bool,
    pub kind: EventKind,
}

impl NormalizedEvent {
    /// Unknown triggers are answered locally and never reach the backend.
    pub fn dispatches_to_backend(&self) -> bool {
        !matches!(self.kind, EventKind::Unknown)
    }
}

/// Builds the normalized event for `event` and the host state to apply before dispatch.
pub fn normalize(event: EventKind, ctx: &SessionContext) -> (NormalizedEvent, HostState) {
    let host = match &event {
        EventKind::Launch | EventKind::Utterance { .. } | EventKind::PlaybackFinished { .. } => {
            HostState::default().wait_answer()
        }
        // The session is closing whatever the backend says.
        EventKind::SessionEnd => HostState::default().without_speech().end_dialog(),
        EventKind::Unknown => HostState::default().without_speech(),
    };

    let normalized = NormalizedEvent {
        user_id: ctx.user_id.clone(),
        supports_visual_display: ctx.supports_visual_display,
        kind: event,
    };
    (normalized, host)
}
