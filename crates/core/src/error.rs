//! Error taxonomy for the skill pipeline.

use thiserror::Error;

/// A bot identifier arrived that has no registered agent profile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("bot id does not register agent: {bot_id}")]
pub struct ConfigurationError {
    pub bot_id: String,
}

/// The inbound payload did not carry a host user identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("inbound request carries no user id")]
pub struct IdentityError;

/// A call to the backend agent or the QR provisioning endpoint failed.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{service} request timed out")]
    Timeout { service: &'static str },
    #[error("{service} request failed: {source}")]
    Request {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{service} returned status {status}")]
    Status {
        service: &'static str,
        status: reqwest::StatusCode,
    },
    #[error("{service} returned an unreadable body: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },
}

impl TransportError {
    /// Classifies a `reqwest` failure, keeping timeouts distinct.
    pub fn from_reqwest(service: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout { service }
        } else if err.is_decode() {
            Self::Decode {
                service,
                message: err.to_string(),
            }
        } else {
            Self::Request {
                service,
                source: err,
            }
        }
    }
}

/// Everything that can abort the handling of a single request.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}
