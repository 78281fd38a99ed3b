use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::store::{Org, Profile, StoreError, TableStore};

#[derive(Default)]
struct Inner {
    orgs: Vec<Org>,
    profiles: BTreeMap<String, Profile>,
    brands: Vec<Value>,
    next_org_id: i64,
}

/// In-memory [`TableStore`] used by the test suite and for running the
/// server locally without store credentials.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write operation fail with a store error, to exercise the
    /// denial paths of callers.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn seed_org(&self, slug: &str) -> Org {
        let mut inner = self.inner.lock().unwrap();
        inner.next_org_id += 1;
        let org = Org {
            org_id: inner.next_org_id,
            org_slug: slug.to_string(),
            extra: serde_json::Map::new(),
        };
        inner.orgs.push(org.clone());
        org
    }

    pub fn seed_profile(&self, profile: Profile) {
        let mut inner = self.inner.lock().unwrap();
        inner.profiles.insert(profile.id.clone(), profile);
    }

    pub fn seed_brand(&self, brand: Value) {
        self.inner.lock().unwrap().brands.push(brand);
    }

    pub fn org_count(&self) -> usize {
        self.inner.lock().unwrap().orgs.len()
    }

    pub fn profile_count(&self) -> usize {
        self.inner.lock().unwrap().profiles.len()
    }

    pub fn profile(&self, user_id: &str) -> Option<Profile> {
        self.inner.lock().unwrap().profiles.get(user_id).cloned()
    }

    fn write_guard(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StoreError::Api {
                status: 503,
                message: "writes disabled".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn find_org_by_slug(&self, slug: &str) -> Result<Option<Org>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.orgs.iter().find(|o| o.org_slug == slug).cloned())
    }

    async fn find_org_by_id(&self, org_id: i64) -> Result<Option<Org>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.orgs.iter().find(|o| o.org_id == org_id).cloned())
    }

    async fn insert_org(&self, slug: &str) -> Result<Org, StoreError> {
        self.write_guard()?;
        Ok(self.seed_org(slug))
    }

    async fn find_profile(&self, user_id: &str) -> Result<Option<Profile>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.profiles.get(user_id).cloned())
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        self.write_guard()?;
        let mut inner = self.inner.lock().unwrap();
        if inner.profiles.contains_key(&profile.id) {
            return Err(StoreError::Api {
                status: 409,
                message: format!("duplicate profile id {}", profile.id),
            });
        }
        inner.profiles.insert(profile.id.clone(), profile.clone());
        Ok(())
    }

    async fn update_profile_org(&self, user_id: &str, org_id: i64) -> Result<(), StoreError> {
        self.write_guard()?;
        let mut inner = self.inner.lock().unwrap();
        match inner.profiles.get_mut(user_id) {
            Some(profile) => {
                profile.org_id = Some(org_id);
                Ok(())
            }
            None => Err(StoreError::Api {
                status: 404,
                message: format!("no profile with id {}", user_id),
            }),
        }
    }

    async fn upsert_profile(
        &self,
        user_id: &str,
        org_id: i64,
        is_activated: bool,
    ) -> Result<(), StoreError> {
        self.write_guard()?;
        let mut inner = self.inner.lock().unwrap();
        match inner.profiles.get_mut(user_id) {
            Some(profile) => {
                profile.org_id = Some(org_id);
                profile.is_activated = is_activated;
            }
            None => {
                inner.profiles.insert(
                    user_id.to_string(),
                    Profile {
                        id: user_id.to_string(),
                        org_id: Some(org_id),
                        is_activated,
                        is_superuser: false,
                    },
                );
            }
        }
        Ok(())
    }

    async fn list_profiles(&self) -> Result<Vec<Value>, StoreError> {
        let inner = self.inner.lock().unwrap();
        inner
            .profiles
            .values()
            .map(|p| serde_json::to_value(p).map_err(|e| StoreError::Decode(e.to_string())))
            .collect()
    }

    async fn count_profiles(&self) -> Result<u64, StoreError> {
        Ok(self.inner.lock().unwrap().profiles.len() as u64)
    }

    async fn count_profiles_in_org(&self, org_id: i64) -> Result<u64, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .profiles
            .values()
            .filter(|p| p.org_id == Some(org_id))
            .count() as u64)
    }

    async fn list_brands(&self) -> Result<Vec<Value>, StoreError> {
        Ok(self.inner.lock().unwrap().brands.clone())
    }

    async fn find_brand_by_slug(&self, slug: &str) -> Result<Option<Value>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .brands
            .iter()
            .find(|b| b.get("slug").and_then(Value::as_str) == Some(slug))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn assigns_monotonic_org_ids() {
        let store = MemoryStore::new();
        let first = store.insert_org("one").await.unwrap();
        let second = store.insert_org("two").await.unwrap();
        assert!(second.org_id > first.org_id);
        assert_eq!(store.org_count(), 2);
    }

    #[tokio::test]
    async fn insert_profile_rejects_duplicates() {
        let store = MemoryStore::new();
        let profile = Profile {
            id: "u1".to_string(),
            org_id: None,
            is_activated: true,
            is_superuser: false,
        };
        store.insert_profile(&profile).await.unwrap();
        assert!(store.insert_profile(&profile).await.is_err());
    }

    #[tokio::test]
    async fn upsert_preserves_superuser_flag() {
        let store = MemoryStore::new();
        store.seed_profile(Profile {
            id: "root".to_string(),
            org_id: Some(1),
            is_activated: true,
            is_superuser: true,
        });

        store.upsert_profile("root", 2, false).await.unwrap();

        let profile = store.profile("root").unwrap();
        assert_eq!(profile.org_id, Some(2));
        assert!(!profile.is_activated);
        assert!(profile.is_superuser);
    }

    #[tokio::test]
    async fn upsert_inserts_when_absent() {
        let store = MemoryStore::new();
        store.upsert_profile("fresh", 5, true).await.unwrap();
        let profile = store.profile("fresh").unwrap();
        assert_eq!(profile.org_id, Some(5));
        assert!(profile.is_activated);
        assert!(!profile.is_superuser);
    }

    #[tokio::test]
    async fn brand_lookup_matches_slug_column() {
        let store = MemoryStore::new();
        store.seed_brand(json!({"slug": "northwind", "name": "Northwind"}));
        let found = store.find_brand_by_slug("northwind").await.unwrap();
        assert_eq!(found.unwrap()["name"], "Northwind");
        assert!(store.find_brand_by_slug("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fail_writes_blocks_only_writes() {
        let store = MemoryStore::new();
        store.seed_org("kept");
        store.set_fail_writes(true);
        assert!(store.insert_org("denied").await.is_err());
        assert!(store.find_org_by_slug("kept").await.unwrap().is_some());
    }
}
