//! Synchronization error types

use thiserror::Error;

/// Errors surfaced by the synchronization core.
///
/// Authentication and unresolved-mapping failures must stay visible to the
/// webhook caller so the provider's redelivery mechanism retries the event.
/// Failures after the primary document write are absorbed at the call site
/// (logged, not escalated) because the durable record already exists.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("webhook signature verification failed")]
    Unauthenticated,

    #[error("malformed event payload: {0}")]
    MalformedEvent(String),

    #[error("no user mapped to billing customer {0}")]
    UnresolvedMapping(String),

    #[error("document store error: {0}")]
    Store(String),

    #[error("billing provider error: {0}")]
    Billing(String),

    #[error("identity provider error: {0}")]
    Identity(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<stripe::StripeError> for SyncError {
    fn from(err: stripe::StripeError) -> Self {
        SyncError::Billing(err.to_string())
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
