pub mod memory;
pub mod supabase;

pub use memory::MemoryStore;
pub use supabase::SupabaseStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors from the hosted table store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("table store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("table store error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("unexpected table store response: {0}")]
    Decode(String),

    #[error("insert into {0} returned no rows")]
    EmptyInsert(&'static str),
}

/// An organization row. Extra columns are carried through untouched so the
/// API can surface whatever the store holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Org {
    pub org_id: i64,
    pub org_slug: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// A per-user profile row, keyed by the identity provider's user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub org_id: Option<i64>,
    #[serde(default)]
    pub is_activated: bool,
    #[serde(default)]
    pub is_superuser: bool,
}

/// Operations this system needs from the hosted table store.
///
/// [`SupabaseStore`] implements them over the store's REST interface;
/// [`MemoryStore`] backs tests and keyless local development.
#[async_trait]
pub trait TableStore: Send + Sync {
    async fn find_org_by_slug(&self, slug: &str) -> Result<Option<Org>, StoreError>;
    async fn find_org_by_id(&self, org_id: i64) -> Result<Option<Org>, StoreError>;
    async fn insert_org(&self, slug: &str) -> Result<Org, StoreError>;

    async fn find_profile(&self, user_id: &str) -> Result<Option<Profile>, StoreError>;
    async fn insert_profile(&self, profile: &Profile) -> Result<(), StoreError>;
    async fn update_profile_org(&self, user_id: &str, org_id: i64) -> Result<(), StoreError>;
    /// Insert `{id, org_id, is_activated, is_superuser: false}` when no row
    /// exists, otherwise update `org_id` and `is_activated` in place. The
    /// superuser flag of an existing row is never touched.
    async fn upsert_profile(
        &self,
        user_id: &str,
        org_id: i64,
        is_activated: bool,
    ) -> Result<(), StoreError>;

    async fn list_profiles(&self) -> Result<Vec<Value>, StoreError>;
    async fn count_profiles(&self) -> Result<u64, StoreError>;
    async fn count_profiles_in_org(&self, org_id: i64) -> Result<u64, StoreError>;

    async fn list_brands(&self) -> Result<Vec<Value>, StoreError>;
    async fn find_brand_by_slug(&self, slug: &str) -> Result<Option<Value>, StoreError>;
}
