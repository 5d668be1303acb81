//! Webhook event envelope and tagged payload decoding.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{SyncError, SyncResult};
use crate::model::{InvoiceObject, PriceObject, ProductObject};

/// The outer webhook envelope: event id, type tag, and carried object.
#[derive(Debug, Deserialize)]
pub struct EventEnvelope {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Deserialize)]
pub struct EventData {
    pub object: Value,
}

/// An envelope decoded against its type tag.
#[derive(Debug)]
pub struct DecodedEvent {
    pub id: String,
    pub event_type: String,
    pub payload: EventPayload,
}

/// Payload variants the dispatcher routes on. Each known type tag has its
/// own decoder; unknown tags carry the raw object untouched.
#[derive(Debug)]
pub enum EventPayload {
    ProductUpserted(ProductObject),
    ProductDeleted(ProductObject),
    PriceUpserted(PriceObject),
    PriceDeleted(PriceObject),
    SubscriptionChanged {
        subscription_id: String,
        customer_id: String,
    },
    InvoiceSnapshot(InvoiceObject),
    Unknown(Value),
}

/// Decodes the envelope's carried object according to its type tag.
pub fn decode(envelope: EventEnvelope) -> SyncResult<DecodedEvent> {
    let EventEnvelope { id, event_type, data } = envelope;
    let payload = decode_payload(&event_type, data.object)?;
    Ok(DecodedEvent { id, event_type, payload })
}

fn decode_payload(event_type: &str, object: Value) -> SyncResult<EventPayload> {
    match event_type {
        "product.created" | "product.updated" => {
            Ok(EventPayload::ProductUpserted(decode_object(event_type, object)?))
        }
        "product.deleted" => Ok(EventPayload::ProductDeleted(decode_object(event_type, object)?)),
        "price.created" | "price.updated" => {
            Ok(EventPayload::PriceUpserted(decode_object(event_type, object)?))
        }
        "price.deleted" => Ok(EventPayload::PriceDeleted(decode_object(event_type, object)?)),
        "customer.subscription.created"
        | "customer.subscription.updated"
        | "customer.subscription.deleted" => decode_subscription_change(event_type, &object),
        "invoice.paid"
        | "invoice.payment_succeeded"
        | "invoice.payment_failed"
        | "invoice.upcoming"
        | "invoice.marked_uncollectible"
        | "invoice.payment_action_required" => {
            Ok(EventPayload::InvoiceSnapshot(decode_object(event_type, object)?))
        }
        _ => Ok(EventPayload::Unknown(object)),
    }
}

fn decode_object<T: serde::de::DeserializeOwned>(event_type: &str, object: Value) -> SyncResult<T> {
    serde_json::from_value(object)
        .map_err(|err| SyncError::MalformedEvent(format!("{event_type}: {err}")))
}

/// Subscription changes only need the two ids; the authoritative state is
/// re-fetched from the provider during sync.
fn decode_subscription_change(event_type: &str, object: &Value) -> SyncResult<EventPayload> {
    let subscription_id = object
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| SyncError::MalformedEvent(format!("{event_type}: missing id")))?;
    let customer_id = match object.get("customer") {
        Some(Value::String(id)) => Some(id.as_str()),
        Some(Value::Object(customer)) => customer.get("id").and_then(Value::as_str),
        _ => None,
    }
    .ok_or_else(|| SyncError::MalformedEvent(format!("{event_type}: missing customer")))?;

    Ok(EventPayload::SubscriptionChanged {
        subscription_id: subscription_id.to_owned(),
        customer_id: customer_id.to_owned(),
    })
}
