// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Firesync Core
//!
//! Event-driven synchronization between a billing provider and an
//! application's document store and identity accounts.
//!
//! ## Features
//!
//! - **Webhook Dispatch**: Signature-verified ingestion of billing events
//! - **Catalog Mirror**: Product and price documents kept in step
//! - **Subscription Projection**: Per-user subscription documents plus a
//!   `stripeRole` custom claim on the identity account
//! - **Invoice Snapshots**: Invoices filed under their owning subscription
//! - **Customer Lifecycle**: Provisioning and teardown on account events
//!
//! All external systems are reached through the [`DocumentStore`],
//! [`IdentityProvider`], and [`BillingProvider`] traits; the host injects
//! real implementations, tests use the [`memory`] module.

pub mod catalog;
pub mod client;
pub mod error;
pub mod events;
pub mod identity;
pub mod invoices;
pub mod lifecycle;
pub mod memory;
pub mod model;
pub mod provider;
pub mod store;
pub mod subscriptions;
pub mod webhook;

// Error
pub use error::{SyncError, SyncResult};

// Collaborator traits
pub use identity::IdentityProvider;
pub use provider::{BillingProvider, CustomerObject, NewCustomer};
pub use store::{DocumentSnapshot, DocumentStore};

// Domain model
pub use model::{
    InvoiceObject, ObjectRef, PriceObject, ProductObject, ProductRef, SubscriptionObject,
    SubscriptionStatus, ROLE_CLAIM, ROLE_METADATA_KEY,
};

// Events
pub use events::{DecodedEvent, EventEnvelope, EventPayload};

// Services
pub use catalog::CatalogService;
pub use invoices::InvoiceService;
pub use lifecycle::CustomerLifecycleService;
pub use subscriptions::SubscriptionSyncService;
pub use webhook::{AckOutcome, WebhookAck, WebhookDispatcher};

// Stripe adapter
pub use client::{StripeBilling, StripeConfig};

use std::sync::Arc;

/// Aggregate wiring every synchronization service over one set of
/// collaborators.
pub struct BillingSync {
    pub catalog: Arc<CatalogService>,
    pub subscriptions: Arc<SubscriptionSyncService>,
    pub invoices: Arc<InvoiceService>,
    pub lifecycle: Arc<CustomerLifecycleService>,
    pub webhooks: Arc<WebhookDispatcher>,
}

impl BillingSync {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        billing: Arc<dyn BillingProvider>,
        webhook_secret: impl Into<String>,
    ) -> Self {
        let catalog = Arc::new(CatalogService::new(store.clone()));
        let subscriptions = Arc::new(SubscriptionSyncService::new(
            store.clone(),
            billing.clone(),
            identity,
        ));
        let invoices = Arc::new(InvoiceService::new(store.clone()));
        let lifecycle = Arc::new(CustomerLifecycleService::new(store, billing));
        let webhooks = Arc::new(WebhookDispatcher::new(
            webhook_secret,
            catalog.clone(),
            subscriptions.clone(),
            invoices.clone(),
        ));
        Self {
            catalog,
            subscriptions,
            invoices,
            lifecycle,
            webhooks,
        }
    }
}
