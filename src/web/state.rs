//! Shared application state for the web server.

use std::sync::Arc;

use crate::report::AnalyzeOptions;

/// Shared state injected into every Axum handler. The dashboard keeps no
/// per-session data; this is configuration only.
#[derive(Clone)]
pub struct AppState {
    pub options: AnalyzeOptions,
}

impl AppState {
    pub fn new(options: AnalyzeOptions) -> Self {
        Self { options }
    }
}

pub type SharedState = Arc<AppState>;
