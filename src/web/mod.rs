//! thin axum host around the analysis pipeline
//!
//! two routes: the upload page and the analyze endpoint that re-renders the
//! same page with results. the pipeline itself lives in [`crate::report`];
//! this layer only owns the session lifecycle.

pub mod handlers;
pub mod state;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use crate::web::handlers::{analyze_upload, index};
use crate::web::state::{AppState, SharedState};

/// Build and return the full Axum router.
pub fn build_router(state: AppState) -> Router {
    let shared: SharedState = Arc::new(state);

    Router::new()
        .route("/", get(index))
        .route("/analyze", post(analyze_upload))
        // spreadsheets overflow the 2 MB default body limit
        .layer(DefaultBodyLimit::max(16 * 1024 * 1024))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}
