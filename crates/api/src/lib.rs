// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Firesync API
//!
//! HTTP surface over [`firesync_core`]: the billing webhook endpoint and the
//! identity-lifecycle event endpoints. No server bootstrap lives here; the
//! host embeds [`router`] into its own server.

use std::sync::Arc;

use axum::{routing::post, Router};
use firesync_core::BillingSync;
use tower_http::trace::TraceLayer;

pub mod error;
pub mod routes;

pub use error::{ApiError, ApiResult};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub sync: Arc<BillingSync>,
}

/// Builds the router for the synchronization endpoints.
pub fn router(sync: Arc<BillingSync>) -> Router {
    Router::new()
        .route("/webhooks/billing", post(routes::webhook))
        .route("/events/user-created", post(routes::user_created))
        .route("/events/user-deleted", post(routes::user_deleted))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { sync })
}
