//! Document store abstraction.
//!
//! The synchronization services never talk to a concrete database; they go
//! through this trait so hosts can plug in their document store and tests
//! can use [`crate::memory::MemoryStore`].

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::error::{SyncError, SyncResult};

/// Attribute on the user document holding the billing customer id.
pub const STRIPE_ID_FIELD: &str = "stripeId";

/// A document returned from a query: its id, full path, and payload.
#[derive(Debug, Clone)]
pub struct DocumentSnapshot {
    pub id: String,
    pub path: String,
    pub data: Value,
}

/// Hierarchical document store with path-addressed documents.
///
/// Paths are slash-separated (`users/{uid}/subscriptions/{id}`). Writing to
/// a path creates the document; parent documents need not exist.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads the document at `path`, `None` if it does not exist.
    async fn get(&self, path: &str) -> SyncResult<Option<Value>>;

    /// Full-replace write: the document becomes exactly `data`.
    async fn set(&self, path: &str, data: Value) -> SyncResult<()>;

    /// Merge write: top-level fields of `data` are set, other fields kept.
    async fn set_merge(&self, path: &str, data: Value) -> SyncResult<()>;

    /// Deletes exactly the document at `path`. No cascade into subtrees.
    async fn delete(&self, path: &str) -> SyncResult<()>;

    /// Equality query over the direct documents of `collection`.
    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> SyncResult<Vec<DocumentSnapshot>>;
}

/// Document path layout.
pub mod paths {
    pub const USERS: &str = "users";
    pub const PRODUCTS: &str = "products";

    pub fn user(uid: &str) -> String {
        format!("{USERS}/{uid}")
    }

    pub fn subscriptions(uid: &str) -> String {
        format!("{USERS}/{uid}/subscriptions")
    }

    pub fn subscription(uid: &str, subscription_id: &str) -> String {
        format!("{USERS}/{uid}/subscriptions/{subscription_id}")
    }

    pub fn invoice(uid: &str, subscription_id: &str, invoice_id: &str) -> String {
        format!("{USERS}/{uid}/subscriptions/{subscription_id}/invoices/{invoice_id}")
    }

    pub fn product(product_id: &str) -> String {
        format!("{PRODUCTS}/{product_id}")
    }

    pub fn price(product_id: &str, price_id: &str) -> String {
        format!("{PRODUCTS}/{product_id}/prices/{price_id}")
    }
}

/// Resolves the user uid mapped to a billing customer.
///
/// Looks up users whose `stripeId` equals `customer_id`. No match is an
/// [`SyncError::UnresolvedMapping`]; several matches use the first and log
/// the ambiguity.
pub async fn resolve_user_by_customer(
    store: &dyn DocumentStore,
    customer_id: &str,
) -> SyncResult<String> {
    let matches = store
        .query_eq(paths::USERS, STRIPE_ID_FIELD, &Value::String(customer_id.to_owned()))
        .await?;

    match matches.as_slice() {
        [] => Err(SyncError::UnresolvedMapping(customer_id.to_owned())),
        [single] => Ok(single.id.clone()),
        [first, ..] => {
            warn!(
                customer_id = %customer_id,
                matched = matches.len(),
                uid = %first.id,
                "multiple users mapped to one billing customer, using first"
            );
            Ok(first.id.clone())
        }
    }
}
