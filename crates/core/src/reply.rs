use serde::{Deserialize, Deserializer, Serialize};

/// A side instruction attached to an agent reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Instruction {
    /// Play the audio stream at `url`.
    PlayAudio { url: String },
    /// The agent considers the conversation finished.
    Quit,
    /// Any instruction kind this adapter does not understand yet.
    #[serde(other)]
    Unrecognized,
}

/// The structured reply produced by the backend agent for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentReply {
    pub text: String,
    pub instructions: Option<Vec<Instruction>>,
    pub wants_dialog_end: bool,
}

impl AgentReply {
    /// A reply with text only.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            instructions: None,
            wants_dialog_end: false,
        }
    }

    pub fn with_instructions(mut self, instructions: Vec<Instruction>) -> Self {
        self.wants_dialog_end = instructions.contains(&Instruction::Quit);
        self.instructions = Some(instructions);
        self
    }

    /// Returns the first `play-audio` URL, ignoring every later one.
    pub fn first_audio_url(&self) -> Option<&str> {
        self.instructions.as_deref()?.iter().find_map(|i| match i {
            Instruction::PlayAudio { url } => Some(url.as_str()),
            _ => None,
        })
    }
}

/// The JSON body the backend agent answers with.
#[derive(Debug, Deserialize)]
pub(crate) struct ReplyBody {
    #[serde(default)]
    pub reply: String,
    #[serde(default, deserialize_with = "lenient_instructions")]
    pub instructs: Option<Vec<Instruction>>,
}

/// Decodes each instruct on its own; malformed entries become `Unrecognized`.
fn lenient_instructions<'de, D>(deserializer: D) -> Result<Option<Vec<Instruction>>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?;
    Ok(entries.map(|entries| {
        entries
            .into_iter()
            .map(|entry| serde_json::from_value(entry).unwrap_or(Instruction::Unrecognized))
            .collect()
    }))
}

impl From<ReplyBody> for AgentReply {
    fn from(body: ReplyBody) -> Self {
        let reply = AgentReply::text(body.reply);
        match body.instructs {
            Some(instructs) => reply.with_instructions(instructs),
            None => reply,
        }
    }
}
