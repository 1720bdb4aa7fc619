//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources like the repositories and the turn processor.

use crate::config::Config;
use mentor_core::orchestrator::TurnProcessor;
use mentor_core::repo::StudentRepo;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub students: Arc<dyn StudentRepo>,
    pub turns: Arc<TurnProcessor>,
    pub config: Arc<Config>,
}
