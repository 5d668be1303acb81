//! In-memory collaborator implementations.
//!
//! Back the test suites and local experimentation. Documents live in a
//! `BTreeMap` keyed by path, so query results are deterministically ordered.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{SyncError, SyncResult};
use crate::identity::IdentityProvider;
use crate::model::SubscriptionObject;
use crate::provider::{BillingProvider, CustomerObject, NewCustomer};
use crate::store::{DocumentSnapshot, DocumentStore};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Path-keyed document store.
#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently stored.
    pub fn len(&self) -> usize {
        lock(&self.docs).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.docs).is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &str) -> SyncResult<Option<Value>> {
        Ok(lock(&self.docs).get(path).cloned())
    }

    async fn set(&self, path: &str, data: Value) -> SyncResult<()> {
        lock(&self.docs).insert(path.to_owned(), data);
        Ok(())
    }

    async fn set_merge(&self, path: &str, data: Value) -> SyncResult<()> {
        let mut docs = lock(&self.docs);
        match (docs.get_mut(path), data) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                for (key, value) in incoming {
                    existing.insert(key, value);
                }
            }
            (_, data) => {
                docs.insert(path.to_owned(), data);
            }
        }
        Ok(())
    }

    async fn delete(&self, path: &str) -> SyncResult<()> {
        lock(&self.docs).remove(path);
        Ok(())
    }

    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> SyncResult<Vec<DocumentSnapshot>> {
        let prefix = format!("{collection}/");
        let snapshots = lock(&self.docs)
            .range(prefix.clone()..)
            .take_while(|(path, _)| path.starts_with(&prefix))
            .filter(|(path, _)| !path[prefix.len()..].contains('/'))
            .filter(|(_, data)| data.get(field) == Some(value))
            .map(|(path, data)| DocumentSnapshot {
                id: path[prefix.len()..].to_owned(),
                path: path.clone(),
                data: data.clone(),
            })
            .collect();
        Ok(snapshots)
    }
}

/// Uid-keyed custom-claims map. Accounts exist implicitly: unknown uids
/// start with empty claims.
#[derive(Default)]
pub struct MemoryIdentity {
    claims: Mutex<HashMap<String, Map<String, Value>>>,
}

impl MemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test helper: pre-populates an account's claims.
    pub fn seed(&self, uid: &str, claims: Value) {
        let map = match claims {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        lock(&self.claims).insert(uid.to_owned(), map);
    }

    /// Test helper: current claims as a JSON object.
    pub fn claims(&self, uid: &str) -> Value {
        Value::Object(lock(&self.claims).get(uid).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentity {
    async fn custom_claims(&self, uid: &str) -> SyncResult<Map<String, Value>> {
        Ok(lock(&self.claims).get(uid).cloned().unwrap_or_default())
    }

    async fn set_custom_claims(&self, uid: &str, claims: Map<String, Value>) -> SyncResult<()> {
        lock(&self.claims).insert(uid.to_owned(), claims);
        Ok(())
    }
}

/// Identity provider that fails every call, for absorbed-failure tests.
pub struct FailingIdentity;

#[async_trait]
impl IdentityProvider for FailingIdentity {
    async fn custom_claims(&self, uid: &str) -> SyncResult<Map<String, Value>> {
        Err(SyncError::Identity(format!("no account for {uid}")))
    }

    async fn set_custom_claims(&self, uid: &str, _claims: Map<String, Value>) -> SyncResult<()> {
        Err(SyncError::Identity(format!("no account for {uid}")))
    }
}

/// Billing provider backed by seeded subscriptions, recording the customer
/// operations it receives.
#[derive(Default)]
pub struct MemoryBilling {
    subscriptions: Mutex<HashMap<String, SubscriptionObject>>,
    created: Mutex<Vec<NewCustomer>>,
    deleted: Mutex<Vec<String>>,
    next_customer: AtomicU64,
}

impl MemoryBilling {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the subscription `subscription_with_items` will return.
    pub fn seed_subscription(&self, subscription: SubscriptionObject) {
        lock(&self.subscriptions).insert(subscription.id.clone(), subscription);
    }

    pub fn created_customers(&self) -> Vec<NewCustomer> {
        lock(&self.created).clone()
    }

    pub fn deleted_customers(&self) -> Vec<String> {
        lock(&self.deleted).clone()
    }
}

#[async_trait]
impl BillingProvider for MemoryBilling {
    async fn create_customer(&self, customer: NewCustomer) -> SyncResult<CustomerObject> {
        let n = self.next_customer.fetch_add(1, Ordering::Relaxed);
        lock(&self.created).push(customer);
        Ok(CustomerObject {
            id: format!("cus_mem_{n}"),
        })
    }

    async fn delete_customer(&self, customer_id: &str) -> SyncResult<()> {
        lock(&self.deleted).push(customer_id.to_owned());
        Ok(())
    }

    async fn subscription_with_items(
        &self,
        subscription_id: &str,
    ) -> SyncResult<SubscriptionObject> {
        lock(&self.subscriptions)
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| SyncError::Billing(format!("no such subscription {subscription_id}")))
    }
}
