//! HTTP handlers: billing webhook and identity lifecycle events.

use axum::{
    extract::State,
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Handle billing provider webhook events
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> ApiResult<Json<Value>> {
    tracing::info!(body_len = body.len(), "billing webhook received");

    let signature = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("billing webhook missing signature header");
            ApiError::Unauthorized
        })?;

    let ack = state.sync.webhooks.handle(&body, signature).await?;
    tracing::info!(
        event_id = %ack.event_id,
        event_type = %ack.event_type,
        "billing webhook processed"
    );

    Ok(Json(json!({
        "received": true,
        "event_id": ack.event_id,
        "event_type": ack.event_type,
        "outcome": ack.outcome,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCreatedRequest {
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Provision a billing customer for a newly created account
pub async fn user_created(
    State(state): State<AppState>,
    Json(request): Json<UserCreatedRequest>,
) -> ApiResult<Json<Value>> {
    state
        .sync
        .lifecycle
        .on_user_created(&request.uid, request.email, request.display_name)
        .await?;
    Ok(Json(json!({ "received": true })))
}

#[derive(Debug, Deserialize)]
pub struct UserDeletedRequest {
    pub uid: String,
}

/// Tear down billing state for a deleted account
pub async fn user_deleted(
    State(state): State<AppState>,
    Json(request): Json<UserDeletedRequest>,
) -> ApiResult<Json<Value>> {
    state.sync.lifecycle.on_user_deleted(&request.uid).await?;
    Ok(Json(json!({ "received": true })))
}
