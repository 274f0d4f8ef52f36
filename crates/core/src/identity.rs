use crate::error::IdentityError;

/// Namespace tag used when none is configured.
pub const DEFAULT_USER_ID_PREFIX: &str = "dueros_";

/// Derives the backend-facing user identifier from the host's user id.
///
/// The prefix keeps identities from this host apart from other integrations
/// that talk to the same backend agent.
pub fn resolve_user_id(prefix: &str, host_user_id: Option<&str>) -> Result<String, IdentityError> {
    match host_user_id {
        Some(id) if !id.is_empty() => Ok(format!("{prefix}{id}")),
        _ => Err(IdentityError),
    }
}
