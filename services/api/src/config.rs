use skillbridge_core::{identity::DEFAULT_USER_ID_PREFIX, response::ResponseMode};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Address of the backend conversational agent.
    pub chatbot_url: String,
    /// Source tag sent to the backend and the QR endpoint.
    pub source: String,
    /// Base address of the WeChat QR code provisioning service.
    pub wechat_url: String,
    pub agents_path: PathBuf,
    pub response_mode: ResponseMode,
    pub user_id_prefix: String,
    pub strict_agent_registry: bool,
    pub http_timeout: Duration,
    pub log_level: Level,
}

fn required(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue(
            name.to_string(),
            format!("'{}' is not a boolean", value),
        )),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let chatbot_url = required("CHATBOT_URL")?;
        let wechat_url = required("WECHAT_URL")?;
        let source = std::env::var("CHATBOT_SOURCE").unwrap_or_else(|_| "dueros".to_string());

        let agents_path = std::env::var("AGENTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./agents.json"));

        let response_mode = match std::env::var("RESPONSE_MODE") {
            Ok(mode) => mode
                .parse::<ResponseMode>()
                .map_err(|e| ConfigError::InvalidValue("RESPONSE_MODE".to_string(), e))?,
            Err(_) => ResponseMode::default(),
        };

        let user_id_prefix =
            std::env::var("USER_ID_PREFIX").unwrap_or_else(|_| DEFAULT_USER_ID_PREFIX.to_string());

        let strict_agent_registry = match std::env::var("STRICT_AGENT_REGISTRY") {
            Ok(value) => parse_bool("STRICT_AGENT_REGISTRY", &value)?,
            Err(_) => false,
        };

        let timeout_str = std::env::var("HTTP_TIMEOUT_SECS").unwrap_or_else(|_| "10".to_string());
        let http_timeout = timeout_str
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "HTTP_TIMEOUT_SECS".to_string(),
                    format!("'{}' is not a positive number of seconds", timeout_str),
                )
            })?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            chatbot_url,
            source,
            wechat_url,
            agents_path,
            response_mode,
            user_id_prefix,
            strict_agent_registry,
            http_timeout,
            log_level,
        })
    }
}
