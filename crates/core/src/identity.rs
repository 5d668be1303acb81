//! Identity provider abstraction: custom-claims access.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::SyncResult;

/// Custom-claims surface of the identity provider.
///
/// `set_custom_claims` is a full replace; merging the new claim into the
/// existing map is the caller's job.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Current custom claims of the account, empty map if none are set.
    async fn custom_claims(&self, uid: &str) -> SyncResult<Map<String, Value>>;

    /// Replaces the account's custom claims with `claims`.
    async fn set_custom_claims(&self, uid: &str, claims: Map<String, Value>) -> SyncResult<()>;
}
