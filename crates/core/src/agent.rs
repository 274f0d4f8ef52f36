//! Agent Registry
//!
//! Maps the bot identifier the voice host stamps on every request to the
//! backend agent serving that bot, together with the visual theme used when
//! rendering cards for it. The table is loaded once at startup and only read
//! afterwards, so it is shared between requests behind an `Arc` without locks.

use crate::error::ConfigurationError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Name of the agent that hands users off to the course recording mini program.
pub const COURSE_RECORD_AGENT: &str = "course-record";

/// Metadata describing one backend agent and how its cards look.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Agent identity forwarded to the backend (e.g., "course-record").
    #[serde(rename = "name")]
    pub agent_name: String,
    /// Title shown on visual cards.
    #[serde(rename = "title")]
    pub display_title: String,
    /// Background image shown behind visual cards.
    #[serde(rename = "background")]
    pub background_image_url: String,
}

/// Read-only table of agent profiles keyed by bot identifier.
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    profiles: HashMap<String, Arc<AgentProfile>>,
}

impl AgentRegistry {
    /// Builds a registry from `(bot_id, profile)` pairs.
    pub fn new(profiles: impl IntoIterator<Item = (String, AgentProfile)>) -> Self {
        Self {
            profiles: profiles
                .into_iter()
                .map(|(bot_id, profile)| (bot_id, Arc::new(profile)))
                .collect(),
        }
    }

    /// Parses a JSON object of the form `{ "<bot id>": { "name", "title", "background" } }`.
    pub fn from_json(json: &str) -> Result<Self> {
        let profiles: HashMap<String, AgentProfile> =
            serde_json::from_str(json).context("Agent table is not valid JSON")?;
        Ok(Self::new(profiles))
    }

    /// Loads the agent table from a JSON file on disk.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read agent table at {}", path.display()))?;
        Self::from_json(&content)
    }

    /// Resolves the profile registered for `bot_id`.
    pub fn lookup(&self, bot_id: &str) -> Result<Arc<AgentProfile>, ConfigurationError> {
        self.profiles
            .get(bot_id)
            .cloned()
            .ok_or_else(|| ConfigurationError {
                bot_id: bot_id.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"{
        "bot-course": {
            "name": "course-record",
            "title": "Course Recorder",
            "background": "https://img.example.com/course.png"
        },
        "bot-math": {
            "name": "math-helper",
            "title": "math-helper-title",
            "background": "https://img.example.com/math.png"
        }
    }"#;

    #[test]
    fn test_lookup_registered_bot() {
        let registry = AgentRegistry::from_json(TABLE).unwrap();
        assert_eq!(registry.len(), 2);

        let profile = registry.lookup("bot-math").unwrap();
        assert_eq!(profile.agent_name, "math-helper");
        assert_eq!(profile.display_title, "math-helper-title");
        assert_eq!(
            profile.background_image_url,
            "https://img.example.com/math.png"
        );
    }

    #[test]
    fn test_lookup_unknown_bot_is_configuration_error() {
        let registry = AgentRegistry::from_json(TABLE).unwrap();
        let err = registry.lookup("bot-missing").unwrap_err();
        assert_eq!(err.bot_id, "bot-missing");
    }

    #[test]
    fn test_from_json_rejects_incomplete_profile() {
        let result = AgentRegistry::from_json(r#"{ "bot": { "name": "x" } }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_file_missing_path() {
        let err = AgentRegistry::from_file(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }
}
