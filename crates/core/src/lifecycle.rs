//! Identity-account lifecycle: customer provisioning and teardown.

use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::SyncResult;
use crate::model::{now_rfc3339, SubscriptionStatus};
use crate::provider::{BillingProvider, NewCustomer};
use crate::store::{paths, DocumentStore, STRIPE_ID_FIELD};

/// Concurrent cancellation writes during account teardown.
const CANCEL_FANOUT: usize = 8;

/// Reacts to identity-account creation and deletion.
pub struct CustomerLifecycleService {
    store: Arc<dyn DocumentStore>,
    billing: Arc<dyn BillingProvider>,
}

impl CustomerLifecycleService {
    pub fn new(store: Arc<dyn DocumentStore>, billing: Arc<dyn BillingProvider>) -> Self {
        Self { store, billing }
    }

    /// Provisions a billing customer for a new account and records the
    /// mapping on the user document.
    ///
    /// The provider call runs first: if the mapping write fails afterwards,
    /// the orphaned customer is recoverable through its uid metadata.
    pub async fn on_user_created(
        &self,
        uid: &str,
        email: Option<String>,
        display_name: Option<String>,
    ) -> SyncResult<()> {
        let customer = self
            .billing
            .create_customer(NewCustomer {
                uid: uid.to_owned(),
                email,
                display_name,
            })
            .await?;
        self.store
            .set_merge(&paths::user(uid), json!({ STRIPE_ID_FIELD: customer.id }))
            .await?;
        info!(uid = %uid, customer_id = %customer.id, "billing customer provisioned");
        Ok(())
    }

    /// Tears down billing state for a deleted account.
    ///
    /// Store-side cancellation runs first and must complete before the
    /// provider customer is deleted. An account that never got a customer
    /// mapping still has its local subscriptions canceled.
    pub async fn on_user_deleted(&self, uid: &str) -> SyncResult<()> {
        let user = self.store.get(&paths::user(uid)).await?;
        let customer_id = user
            .as_ref()
            .and_then(|doc| doc.get(STRIPE_ID_FIELD))
            .and_then(Value::as_str)
            .map(str::to_owned);

        self.cancel_live_subscriptions(uid).await?;

        match customer_id {
            Some(customer_id) => {
                self.billing.delete_customer(&customer_id).await?;
                info!(uid = %uid, customer_id = %customer_id, "billing customer deleted");
            }
            None => {
                warn!(uid = %uid, "user has no billing customer mapping, skipping provider delete");
            }
        }
        Ok(())
    }

    /// Marks every trialing or active subscription of the user canceled.
    async fn cancel_live_subscriptions(&self, uid: &str) -> SyncResult<()> {
        let collection = paths::subscriptions(uid);
        let mut live = Vec::new();
        for status in [SubscriptionStatus::Trialing, SubscriptionStatus::Active] {
            live.extend(
                self.store
                    .query_eq(&collection, "status", &Value::String(status.as_str().to_owned()))
                    .await?,
            );
        }
        if live.is_empty() {
            return Ok(());
        }

        let ended_at = now_rfc3339();
        let count = live.len();
        stream::iter(live)
            .map(|snapshot| {
                let store = self.store.clone();
                let patch = json!({ "status": "canceled", "ended_at": ended_at.clone() });
                async move { store.set_merge(&snapshot.path, patch).await }
            })
            .buffer_unordered(CANCEL_FANOUT)
            .try_collect::<Vec<()>>()
            .await?;
        info!(uid = %uid, canceled = count, "live subscriptions canceled");
        Ok(())
    }
}
