//! Subscription projection and role-claim maintenance.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::{SyncError, SyncResult};
use crate::identity::IdentityProvider;
use crate::model::{timestamp_field, SubscriptionObject, ROLE_CLAIM};
use crate::provider::BillingProvider;
use crate::store::{paths, resolve_user_by_customer, DocumentStore};

/// Projects provider subscriptions into per-user documents and keeps the
/// role claim on the identity account in step.
pub struct SubscriptionSyncService {
    store: Arc<dyn DocumentStore>,
    billing: Arc<dyn BillingProvider>,
    identity: Arc<dyn IdentityProvider>,
}

impl SubscriptionSyncService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        billing: Arc<dyn BillingProvider>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self { store, billing, identity }
    }

    /// Re-projects one subscription from provider truth.
    ///
    /// The webhook payload is treated as a change notification only; the
    /// authoritative state is re-fetched with items expanded. The role is
    /// derived from the first line item's product (multi-item subscriptions
    /// with differing roles are collapsed to the first). The claim update
    /// runs after the document write and its failure is absorbed, since the
    /// durable record already exists and the next event will converge it.
    pub async fn sync(&self, subscription_id: &str, customer_id: &str) -> SyncResult<()> {
        let uid = resolve_user_by_customer(self.store.as_ref(), customer_id).await?;
        let subscription = self.billing.subscription_with_items(subscription_id).await?;
        let doc = project(&subscription)?;
        let role = doc
            .get("role")
            .and_then(Value::as_str)
            .map(str::to_owned);

        self.store
            .set(&paths::subscription(&uid, &subscription.id), doc)
            .await?;
        info!(
            uid = %uid,
            subscription_id = %subscription.id,
            status = %subscription.status,
            "subscription synced"
        );

        let claim = if subscription.status.grants_access() {
            role.map(Value::String).unwrap_or(Value::Null)
        } else {
            Value::Null
        };
        if let Err(err) = self.apply_role_claim(&uid, claim).await {
            warn!(uid = %uid, error = %err, "role claim update failed after subscription write");
        }
        Ok(())
    }

    /// Merges `stripeRole` into the account's existing claims.
    async fn apply_role_claim(&self, uid: &str, value: Value) -> SyncResult<()> {
        let mut claims = self.identity.custom_claims(uid).await?;
        claims.insert(ROLE_CLAIM.to_owned(), value);
        self.identity.set_custom_claims(uid, claims).await
    }
}

/// Builds the subscription document. Field set and order are fixed so two
/// syncs of the same provider state produce byte-identical documents.
fn project(subscription: &SubscriptionObject) -> SyncResult<Value> {
    let first_item = subscription.items.data.first().ok_or_else(|| {
        SyncError::Billing(format!("subscription {} has no line items", subscription.id))
    })?;
    let product = first_item.price.product.object().ok_or_else(|| {
        SyncError::Billing(format!("subscription {} product not expanded", subscription.id))
    })?;

    let prices: Vec<String> = subscription
        .items
        .data
        .iter()
        .map(|item| paths::price(item.price.product.id(), &item.price.id))
        .collect();

    Ok(json!({
        "metadata": subscription.metadata,
        "role": product.role(),
        "status": subscription.status,
        "product": paths::product(&product.id),
        "price": paths::price(&product.id, &first_item.price.id),
        "prices": prices,
        "quantity": first_item.quantity,
        "items": subscription.items.data,
        "cancel_at_period_end": subscription.cancel_at_period_end,
        "cancel_at": timestamp_field(subscription.cancel_at),
        "canceled_at": timestamp_field(subscription.canceled_at),
        "current_period_start": timestamp_field(Some(subscription.current_period_start)),
        "current_period_end": timestamp_field(Some(subscription.current_period_end)),
        "created": timestamp_field(Some(subscription.created)),
        "ended_at": timestamp_field(subscription.ended_at),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{FailingIdentity, MemoryBilling, MemoryIdentity, MemoryStore};
    use serde_json::json;

    fn subscription(id: &str, status: &str, role: Option<&str>) -> SubscriptionObject {
        let metadata = match role {
            Some(role) => json!({ "firebaseRole": role }),
            None => json!({}),
        };
        serde_json::from_value(json!({
            "id": id,
            "status": status,
            "cancel_at_period_end": false,
            "current_period_start": 1_700_000_000,
            "current_period_end": 1_702_592_000,
            "created": 1_700_000_000,
            "customer": "cus_1",
            "items": {
                "data": [{
                    "id": "si_1",
                    "quantity": 1,
                    "price": {
                        "id": "price_1",
                        "currency": "usd",
                        "product": {
                            "id": "prod_1",
                            "name": "Pro Plan",
                            "metadata": metadata
                        }
                    }
                }]
            }
        }))
        .unwrap()
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        billing: Arc<MemoryBilling>,
        identity: Arc<MemoryIdentity>,
        service: SubscriptionSyncService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let billing = Arc::new(MemoryBilling::new());
        let identity = Arc::new(MemoryIdentity::new());
        let service = SubscriptionSyncService::new(
            store.clone(),
            billing.clone(),
            identity.clone(),
        );
        Fixture { store, billing, identity, service }
    }

    async fn map_user(store: &MemoryStore, uid: &str, customer_id: &str) {
        store
            .set(&paths::user(uid), json!({ "stripeId": customer_id }))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn projects_document_and_grants_claim_for_trialing() {
        let fx = fixture();
        map_user(&fx.store, "alice", "cus_1").await;
        fx.identity.seed("alice", json!({ "admin": true }));
        fx.billing.seed_subscription(subscription("sub_1", "trialing", Some("pro")));

        fx.service.sync("sub_1", "cus_1").await.unwrap();

        let doc = fx
            .store
            .get("users/alice/subscriptions/sub_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["role"], json!("pro"));
        assert_eq!(doc["status"], json!("trialing"));
        assert_eq!(doc["product"], json!("products/prod_1"));
        assert_eq!(doc["price"], json!("products/prod_1/prices/price_1"));
        assert_eq!(doc["prices"], json!(["products/prod_1/prices/price_1"]));
        assert_eq!(doc["ended_at"], Value::Null);
        assert_eq!(doc["created"], json!("2023-11-14T22:13:20Z"));

        let claims = fx.identity.claims("alice");
        assert_eq!(claims["stripeRole"], json!("pro"));
        assert_eq!(claims["admin"], json!(true), "unrelated claims survive the merge");
    }

    #[tokio::test]
    async fn non_granting_status_clears_the_claim() {
        let fx = fixture();
        map_user(&fx.store, "alice", "cus_1").await;
        fx.identity.seed("alice", json!({ "stripeRole": "pro" }));
        fx.billing.seed_subscription(subscription("sub_1", "past_due", Some("pro")));

        fx.service.sync("sub_1", "cus_1").await.unwrap();

        assert_eq!(fx.identity.claims("alice")["stripeRole"], Value::Null);
    }

    #[tokio::test]
    async fn canceled_subscription_document_is_kept_not_deleted() {
        let fx = fixture();
        map_user(&fx.store, "alice", "cus_1").await;
        fx.billing.seed_subscription(subscription("sub_1", "canceled", Some("pro")));

        fx.service.sync("sub_1", "cus_1").await.unwrap();

        let doc = fx
            .store
            .get("users/alice/subscriptions/sub_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["status"], json!("canceled"));
        assert_eq!(fx.identity.claims("alice")["stripeRole"], Value::Null);
    }

    #[tokio::test]
    async fn sync_is_deterministic_for_identical_provider_state() {
        let fx = fixture();
        map_user(&fx.store, "alice", "cus_1").await;
        fx.billing.seed_subscription(subscription("sub_1", "active", Some("pro")));

        fx.service.sync("sub_1", "cus_1").await.unwrap();
        let first = fx.store.get("users/alice/subscriptions/sub_1").await.unwrap().unwrap();
        fx.service.sync("sub_1", "cus_1").await.unwrap();
        let second = fx.store.get("users/alice/subscriptions/sub_1").await.unwrap().unwrap();

        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn unmapped_customer_fails_loudly() {
        let fx = fixture();
        fx.billing.seed_subscription(subscription("sub_1", "active", Some("pro")));

        let err = fx.service.sync("sub_1", "cus_ghost").await.unwrap_err();
        assert!(matches!(err, SyncError::UnresolvedMapping(id) if id == "cus_ghost"));
    }

    #[tokio::test]
    async fn product_without_role_writes_null_role_and_null_claim() {
        let fx = fixture();
        map_user(&fx.store, "alice", "cus_1").await;
        fx.billing.seed_subscription(subscription("sub_1", "active", None));

        fx.service.sync("sub_1", "cus_1").await.unwrap();

        let doc = fx
            .store
            .get("users/alice/subscriptions/sub_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["role"], Value::Null);
        assert_eq!(fx.identity.claims("alice")["stripeRole"], Value::Null);
    }

    #[tokio::test]
    async fn claim_failure_after_the_write_is_absorbed() {
        let store = Arc::new(MemoryStore::new());
        let billing = Arc::new(MemoryBilling::new());
        let service = SubscriptionSyncService::new(
            store.clone(),
            billing.clone(),
            Arc::new(FailingIdentity),
        );
        map_user(&store, "alice", "cus_1").await;
        billing.seed_subscription(subscription("sub_1", "active", Some("pro")));

        service.sync("sub_1", "cus_1").await.unwrap();

        assert!(store
            .get("users/alice/subscriptions/sub_1")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn zero_line_items_is_a_billing_contract_error() {
        let fx = fixture();
        map_user(&fx.store, "alice", "cus_1").await;
        let mut sub = subscription("sub_1", "active", Some("pro"));
        sub.items.data.clear();
        fx.billing.seed_subscription(sub);

        let err = fx.service.sync("sub_1", "cus_1").await.unwrap_err();
        assert!(matches!(err, SyncError::Billing(_)));
        assert!(fx
            .store
            .get("users/alice/subscriptions/sub_1")
            .await
            .unwrap()
            .is_none());
    }
}
