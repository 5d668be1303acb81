//! Stripe-backed [`BillingProvider`] implementation.

use std::collections::HashMap;
use std::env;

use async_trait::async_trait;
use stripe::{Client, CreateCustomer, Customer, CustomerId, Subscription, SubscriptionId};

use crate::error::{SyncError, SyncResult};
use crate::model::{SubscriptionObject, UID_METADATA_KEY};
use crate::provider::{BillingProvider, CustomerObject, NewCustomer};

/// Stripe credentials.
#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
}

impl StripeConfig {
    /// Loads credentials from `STRIPE_SECRET_KEY` and `STRIPE_WEBHOOK_SECRET`.
    pub fn from_env() -> SyncResult<Self> {
        Ok(Self {
            secret_key: require_env("STRIPE_SECRET_KEY")?,
            webhook_secret: require_env("STRIPE_WEBHOOK_SECRET")?,
        })
    }
}

fn require_env(name: &str) -> SyncResult<String> {
    env::var(name).map_err(|_| SyncError::Config(format!("{name} not set")))
}

/// Stripe API adapter.
pub struct StripeBilling {
    client: Client,
    config: StripeConfig,
}

impl StripeBilling {
    pub fn new(config: StripeConfig) -> Self {
        let client = Client::new(&config.secret_key);
        Self { client, config }
    }

    pub fn from_env() -> SyncResult<Self> {
        Ok(Self::new(StripeConfig::from_env()?))
    }

    /// The webhook signing secret paired with these credentials.
    pub fn webhook_secret(&self) -> &str {
        &self.config.webhook_secret
    }
}

#[async_trait]
impl BillingProvider for StripeBilling {
    async fn create_customer(&self, customer: NewCustomer) -> SyncResult<CustomerObject> {
        let metadata: HashMap<String, String> =
            HashMap::from([(UID_METADATA_KEY.to_owned(), customer.uid.clone())]);
        let created = Customer::create(
            &self.client,
            CreateCustomer {
                email: customer.email.as_deref(),
                name: customer.display_name.as_deref(),
                metadata: Some(metadata),
                ..Default::default()
            },
        )
        .await?;
        Ok(CustomerObject {
            id: created.id.to_string(),
        })
    }

    async fn delete_customer(&self, customer_id: &str) -> SyncResult<()> {
        let id: CustomerId = customer_id
            .parse()
            .map_err(|err| SyncError::Billing(format!("invalid customer id: {err}")))?;
        Customer::delete(&self.client, &id).await?;
        Ok(())
    }

    async fn subscription_with_items(
        &self,
        subscription_id: &str,
    ) -> SyncResult<SubscriptionObject> {
        let id: SubscriptionId = subscription_id
            .parse()
            .map_err(|err| SyncError::Billing(format!("invalid subscription id: {err}")))?;
        let subscription =
            Subscription::retrieve(&self.client, &id, &["items.data.price.product"]).await?;

        // Go through the wire representation so API responses decode through
        // the same types as webhook payloads.
        let raw = serde_json::to_value(&subscription)
            .map_err(|err| SyncError::Billing(format!("subscription encode: {err}")))?;
        serde_json::from_value(raw)
            .map_err(|err| SyncError::Billing(format!("subscription decode: {err}")))
    }
}
