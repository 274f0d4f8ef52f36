pub mod agent;
pub mod chatbot_client;
pub mod error;
pub mod event;
pub mod identity;
pub mod pipeline;
pub mod qrcode;
pub mod reply;
pub mod response;

/// Conversation flags the voice host reads after a handler returns.
///
/// The host serializes whatever state is current when the response is built,
/// so every transition is applied explicitly by value instead of through a
/// shared mutable bot object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HostState {
    /// The microphone reopens after the speech is played.
    pub expect_speech: bool,
    /// The host closes the skill session.
    pub dialog_ended: bool,
}

impl HostState {
    /// Keeps the session open and waits for the user's next turn.
    #[must_use]
    pub fn wait_answer(self) -> Self {
        Self {
            expect_speech: true,
            dialog_ended: false,
        }
    }

    /// Stops waiting for further speech.
    #[must_use]
    pub fn without_speech(self) -> Self {
        Self {
            expect_speech: false,
            ..self
        }
    }

    /// Terminates the dialog.
    #[must_use]
    pub fn end_dialog(self) -> Self {
        Self {
            dialog_ended: true,
            ..self
        }
    }
}
