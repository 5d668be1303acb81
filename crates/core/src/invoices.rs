//! Invoice snapshot recording.

use std::sync::Arc;

use tracing::info;

use crate::error::{SyncError, SyncResult};
use crate::model::InvoiceObject;
use crate::store::{paths, resolve_user_by_customer, DocumentStore};

/// Files invoice snapshots under their owning user and subscription.
pub struct InvoiceService {
    store: Arc<dyn DocumentStore>,
}

impl InvoiceService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Full-replace write of the invoice payload at
    /// `users/{uid}/subscriptions/{sub}/invoices/{id}`.
    ///
    /// An invoice whose customer has no user mapping fails loudly so the
    /// provider redelivers once the mapping exists.
    pub async fn record(&self, invoice: &InvoiceObject) -> SyncResult<()> {
        let subscription_id = invoice
            .subscription
            .as_ref()
            .map(|subscription| subscription.id().to_owned())
            .ok_or_else(|| {
                SyncError::MalformedEvent(format!("invoice {} has no subscription", invoice.id))
            })?;
        let uid = resolve_user_by_customer(self.store.as_ref(), invoice.customer.id()).await?;

        let doc = serde_json::to_value(invoice)
            .map_err(|err| SyncError::MalformedEvent(err.to_string()))?;
        self.store
            .set(&paths::invoice(&uid, &subscription_id, &invoice.id), doc)
            .await?;
        info!(uid = %uid, subscription_id = %subscription_id, invoice_id = %invoice.id, "invoice recorded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use serde_json::json;

    fn invoice(id: &str) -> InvoiceObject {
        serde_json::from_value(json!({
            "id": id,
            "customer": "cus_1",
            "subscription": "sub_1",
            "amount_due": 999,
            "status": "paid"
        }))
        .unwrap()
    }

    async fn store_with_user() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .set(&paths::user("alice"), json!({ "stripeId": "cus_1" }))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn records_the_full_payload_under_the_owner() {
        let store = store_with_user().await;
        let service = InvoiceService::new(store.clone());

        service.record(&invoice("in_1")).await.unwrap();

        let doc = store
            .get("users/alice/subscriptions/sub_1/invoices/in_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["amount_due"], json!(999));
        assert_eq!(doc["status"], json!("paid"));
    }

    #[tokio::test]
    async fn redelivery_is_idempotent() {
        let store = store_with_user().await;
        let service = InvoiceService::new(store.clone());

        service.record(&invoice("in_1")).await.unwrap();
        let first = store
            .get("users/alice/subscriptions/sub_1/invoices/in_1")
            .await
            .unwrap()
            .unwrap();
        service.record(&invoice("in_1")).await.unwrap();
        let second = store
            .get("users/alice/subscriptions/sub_1/invoices/in_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn unknown_owner_fails_loudly() {
        let store = Arc::new(MemoryStore::new());
        let service = InvoiceService::new(store);

        let err = service.record(&invoice("in_1")).await.unwrap_err();
        assert!(matches!(err, SyncError::UnresolvedMapping(id) if id == "cus_1"));
    }

    #[tokio::test]
    async fn invoice_without_subscription_is_malformed() {
        let store = store_with_user().await;
        let service = InvoiceService::new(store);

        let mut invoice = invoice("in_1");
        invoice.subscription = None;
        let err = service.record(&invoice).await.unwrap_err();
        assert!(matches!(err, SyncError::MalformedEvent(_)));
    }
}
