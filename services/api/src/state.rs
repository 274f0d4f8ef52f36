//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the resources shared
//! by every request.

use skillbridge_core::pipeline::SkillPipeline;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<SkillPipeline>,
}
