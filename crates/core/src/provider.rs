//! Billing provider abstraction.

use async_trait::async_trait;

use crate::error::SyncResult;
use crate::model::SubscriptionObject;

/// Input for provisioning a billing customer for a new user.
#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

/// A provisioned billing customer.
#[derive(Debug, Clone)]
pub struct CustomerObject {
    pub id: String,
}

/// The slice of the billing provider's API the sync core needs.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Creates a customer tagged with the user's uid metadata.
    async fn create_customer(&self, customer: NewCustomer) -> SyncResult<CustomerObject>;

    /// Deletes the customer (and, provider-side, its subscriptions).
    async fn delete_customer(&self, customer_id: &str) -> SyncResult<()>;

    /// Fetches a subscription with every line item's price and product
    /// expanded to full objects.
    async fn subscription_with_items(&self, subscription_id: &str)
        -> SyncResult<SubscriptionObject>;
}
