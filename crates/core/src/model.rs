//! Wire-shaped billing domain types.
//!
//! These decode both webhook payloads and provider API responses, so every
//! provider-nullable field is an `Option` and unknown fields are tolerated.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Product metadata key naming the access role granted by a plan.
pub const ROLE_METADATA_KEY: &str = "firebaseRole";

/// Custom-claim key projected onto the identity account.
pub const ROLE_CLAIM: &str = "stripeRole";

/// Customer metadata key carrying the identity uid back from the provider.
pub const UID_METADATA_KEY: &str = "firebaseUID";

/// Subscription lifecycle states as reported by the billing provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Incomplete,
    IncompleteExpired,
    Trialing,
    Active,
    PastDue,
    Canceled,
    Unpaid,
}

impl SubscriptionStatus {
    /// Whether this status entitles the user to the product's role claim.
    ///
    /// Exact set membership: only `trialing` and `active` grant access.
    pub fn grants_access(self) -> bool {
        matches!(self, SubscriptionStatus::Trialing | SubscriptionStatus::Active)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionStatus::Incomplete => "incomplete",
            SubscriptionStatus::IncompleteExpired => "incomplete_expired",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Unpaid => "unpaid",
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A catalog product as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductObject {
    pub id: String,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub images: Option<Vec<String>>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl ProductObject {
    /// Access role this product grants, read from its metadata.
    pub fn role(&self) -> Option<&str> {
        self.metadata.get(ROLE_METADATA_KEY).map(String::as_str)
    }
}

/// A catalog price as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceObject {
    pub id: String,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub billing_scheme: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(rename = "type", default)]
    pub price_type: Option<String>,
    #[serde(default)]
    pub unit_amount: Option<i64>,
    #[serde(default)]
    pub recurring: Option<Value>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub product: ProductRef,
}

/// Expandable product reference: a bare id or the embedded object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProductRef {
    Id(String),
    Object(ProductObject),
}

impl ProductRef {
    pub fn id(&self) -> &str {
        match self {
            ProductRef::Id(id) => id,
            ProductRef::Object(product) => &product.id,
        }
    }

    /// The embedded object, if the reference was expanded.
    pub fn object(&self) -> Option<&ProductObject> {
        match self {
            ProductRef::Id(_) => None,
            ProductRef::Object(product) => Some(product),
        }
    }
}

/// Expandable reference to any other provider object (customer, subscription).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjectRef {
    Id(String),
    Object { id: String },
}

impl ObjectRef {
    pub fn id(&self) -> &str {
        match self {
            ObjectRef::Id(id) => id,
            ObjectRef::Object { id } => id,
        }
    }
}

/// One line item of a subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub quantity: Option<u64>,
    pub price: PriceObject,
}

/// The provider's list container for line items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemList {
    #[serde(default)]
    pub data: Vec<SubscriptionItem>,
}

/// A subscription as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionObject {
    pub id: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub status: SubscriptionStatus,
    pub items: ItemList,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub cancel_at: Option<i64>,
    #[serde(default)]
    pub canceled_at: Option<i64>,
    pub current_period_start: i64,
    pub current_period_end: i64,
    pub created: i64,
    #[serde(default)]
    pub ended_at: Option<i64>,
    #[serde(default)]
    pub customer: Option<ObjectRef>,
}

/// An invoice snapshot. Only the routing fields are typed; the rest of the
/// payload is preserved verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceObject {
    pub id: String,
    pub customer: ObjectRef,
    #[serde(default)]
    pub subscription: Option<ObjectRef>,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, Value>,
}

/// Converts a provider epoch-seconds timestamp to a stored document value.
///
/// Absent timestamps become explicit JSON nulls, never omitted fields.
pub fn timestamp_field(epoch_seconds: Option<i64>) -> Value {
    match epoch_seconds.and_then(format_epoch) {
        Some(formatted) => Value::String(formatted),
        None => Value::Null,
    }
}

fn format_epoch(epoch_seconds: i64) -> Option<String> {
    let datetime = OffsetDateTime::from_unix_timestamp(epoch_seconds).ok()?;
    datetime.format(&Rfc3339).ok()
}

/// Current time as an RFC 3339 string, for store-side cancellations.
pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| String::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_grant_set_is_exact() {
        assert!(SubscriptionStatus::Trialing.grants_access());
        assert!(SubscriptionStatus::Active.grants_access());
        assert!(!SubscriptionStatus::PastDue.grants_access());
        assert!(!SubscriptionStatus::Canceled.grants_access());
        assert!(!SubscriptionStatus::Incomplete.grants_access());
        assert!(!SubscriptionStatus::IncompleteExpired.grants_access());
        assert!(!SubscriptionStatus::Unpaid.grants_access());
    }

    #[test]
    fn unknown_status_fails_to_decode() {
        let result: Result<SubscriptionStatus, _> = serde_json::from_value(json!("paused"));
        assert!(result.is_err());
    }

    #[test]
    fn product_ref_decodes_both_shapes() {
        let bare: ProductRef = serde_json::from_value(json!("prod_123")).unwrap();
        assert_eq!(bare.id(), "prod_123");
        assert!(bare.object().is_none());

        let expanded: ProductRef = serde_json::from_value(json!({
            "id": "prod_123",
            "name": "Pro Plan",
            "metadata": { "firebaseRole": "pro" }
        }))
        .unwrap();
        assert_eq!(expanded.id(), "prod_123");
        assert_eq!(expanded.object().unwrap().role(), Some("pro"));
    }

    #[test]
    fn subscription_decodes_webhook_shape() {
        let sub: SubscriptionObject = serde_json::from_value(json!({
            "id": "sub_1",
            "status": "trialing",
            "customer": "cus_1",
            "cancel_at_period_end": false,
            "current_period_start": 1_700_000_000,
            "current_period_end": 1_702_592_000,
            "created": 1_700_000_000,
            "items": {
                "data": [{
                    "id": "si_1",
                    "quantity": 1,
                    "price": {
                        "id": "price_1",
                        "currency": "usd",
                        "product": "prod_1"
                    }
                }]
            }
        }))
        .unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Trialing);
        assert_eq!(sub.customer.as_ref().unwrap().id(), "cus_1");
        assert_eq!(sub.items.data[0].price.product.id(), "prod_1");
        assert!(sub.ended_at.is_none());
    }

    #[test]
    fn timestamp_field_renders_rfc3339_or_null() {
        assert_eq!(
            timestamp_field(Some(1_700_000_000)),
            json!("2023-11-14T22:13:20Z")
        );
        assert_eq!(timestamp_field(None), Value::Null);
    }

    #[test]
    fn invoice_preserves_unknown_fields() {
        let invoice: InvoiceObject = serde_json::from_value(json!({
            "id": "in_1",
            "customer": "cus_1",
            "subscription": "sub_1",
            "amount_due": 999,
            "hosted_invoice_url": "https://pay.example/in_1"
        }))
        .unwrap();
        let round_trip = serde_json::to_value(&invoice).unwrap();
        assert_eq!(round_trip["amount_due"], json!(999));
        assert_eq!(round_trip["subscription"], json!("sub_1"));
    }
}
