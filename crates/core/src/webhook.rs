//! Webhook ingestion: signature verification and event dispatch.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use tracing::{debug, info};

use crate::catalog::CatalogService;
use crate::error::{SyncError, SyncResult};
use crate::events::{self, EventEnvelope, EventPayload};
use crate::invoices::InvoiceService;
use crate::subscriptions::SubscriptionSyncService;

type HmacSha256 = Hmac<Sha256>;

/// Accepted clock skew between the signature timestamp and now, in seconds.
const SIGNATURE_TOLERANCE_SECS: u64 = 300;

/// Dispatch outcome reported back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AckOutcome {
    Handled,
    Ignored,
}

/// Acknowledgement for a verified, processed event.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub event_id: String,
    pub event_type: String,
    pub outcome: AckOutcome,
}

/// Verifies incoming webhook deliveries and routes them to the
/// reconciliation services.
pub struct WebhookDispatcher {
    secret: String,
    catalog: Arc<CatalogService>,
    subscriptions: Arc<SubscriptionSyncService>,
    invoices: Arc<InvoiceService>,
}

impl WebhookDispatcher {
    pub fn new(
        secret: impl Into<String>,
        catalog: Arc<CatalogService>,
        subscriptions: Arc<SubscriptionSyncService>,
        invoices: Arc<InvoiceService>,
    ) -> Self {
        Self {
            secret: secret.into(),
            catalog,
            subscriptions,
            invoices,
        }
    }

    /// Verifies and processes one delivery.
    ///
    /// Verification runs over the raw body before any JSON parsing. On
    /// signature failure nothing is parsed, logged, or written.
    pub async fn handle(&self, payload: &str, signature_header: &str) -> SyncResult<WebhookAck> {
        verify_signature(&self.secret, payload, signature_header, unix_now())?;

        let envelope: EventEnvelope = serde_json::from_str(payload)
            .map_err(|err| SyncError::MalformedEvent(err.to_string()))?;
        let event = events::decode(envelope)?;
        info!(event_id = %event.id, event_type = %event.event_type, "webhook event received");

        let outcome = match event.payload {
            EventPayload::ProductUpserted(product) => {
                self.catalog.upsert_product(&product).await?;
                AckOutcome::Handled
            }
            EventPayload::ProductDeleted(product) => {
                self.catalog.delete_product(&product).await?;
                AckOutcome::Handled
            }
            EventPayload::PriceUpserted(price) => {
                self.catalog.upsert_price(&price).await?;
                AckOutcome::Handled
            }
            EventPayload::PriceDeleted(price) => {
                self.catalog.delete_price(&price).await?;
                AckOutcome::Handled
            }
            EventPayload::SubscriptionChanged { subscription_id, customer_id } => {
                self.subscriptions.sync(&subscription_id, &customer_id).await?;
                AckOutcome::Handled
            }
            EventPayload::InvoiceSnapshot(invoice) => {
                self.invoices.record(&invoice).await?;
                AckOutcome::Handled
            }
            EventPayload::Unknown(_) => {
                debug!(event_type = %event.event_type, "unhandled event type acknowledged");
                AckOutcome::Ignored
            }
        };

        Ok(WebhookAck {
            event_id: event.id,
            event_type: event.event_type,
            outcome,
        })
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

/// Checks the `t=<ts>,v1=<sig>` signature header against the raw payload.
///
/// The signed message is `"{timestamp}.{payload}"`; any matching `v1`
/// candidate accepts the delivery (the provider sends several during secret
/// rotation). Comparison is constant-time via the mac itself.
fn verify_signature(secret: &str, payload: &str, header: &str, now: u64) -> SyncResult<()> {
    let mut timestamp: Option<u64> = None;
    let mut candidates: Vec<&str> = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }
    let timestamp = timestamp.ok_or(SyncError::Unauthenticated)?;
    if candidates.is_empty() {
        return Err(SyncError::Unauthenticated);
    }
    if now.abs_diff(timestamp) > SIGNATURE_TOLERANCE_SECS {
        return Err(SyncError::Unauthenticated);
    }

    let key = secret.strip_prefix("whsec_").unwrap_or(secret);
    let message = format!("{timestamp}.{payload}");
    for candidate in candidates {
        let Ok(expected) = hex::decode(candidate) else {
            continue;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(key.as_bytes()) else {
            return Err(SyncError::Unauthenticated);
        };
        mac.update(message.as_bytes());
        if mac.verify_slice(&expected).is_ok() {
            return Ok(());
        }
    }
    Err(SyncError::Unauthenticated)
}
