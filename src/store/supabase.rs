use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{json, Value};

use crate::config::AppConfig;
use crate::store::{Org, Profile, StoreError, TableStore};

/// Which credential a request goes out with. Restricted requests respect the
/// store's row-level security; elevated requests bypass it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Privilege {
    Restricted,
    Elevated,
}

/// REST client for the hosted table store.
///
/// One instance holds both credential sets; provisioning operations (org and
/// profile rows) go through the elevated credential the way the permission
/// flow requires, while the public passthrough reads stay restricted.
pub struct SupabaseStore {
    rest_url: String,
    anon_key: String,
    service_role_key: String,
    client: Client,
}

impl SupabaseStore {
    pub fn new(config: &AppConfig) -> Result<Self, reqwest::Error> {
        // Store calls intentionally carry no request timeout; the admin and
        // email clients are the ones with a deadline.
        let client = Client::builder().build()?;
        Ok(Self {
            rest_url: format!("{}/rest/v1", config.supabase_url.trim_end_matches('/')),
            anon_key: config.supabase_anon_key.clone(),
            service_role_key: config.supabase_service_role_key.clone(),
            client,
        })
    }

    fn key(&self, privilege: Privilege) -> &str {
        match privilege {
            Privilege::Restricted => &self.anon_key,
            Privilege::Elevated => &self.service_role_key,
        }
    }

    fn request(
        &self,
        method: reqwest::Method,
        privilege: Privilege,
        table: &str,
    ) -> RequestBuilder {
        let key = self.key(privilege);
        self.client
            .request(method, format!("{}/{}", self.rest_url, table))
            .header("apikey", key)
            .bearer_auth(key)
    }

    async fn check(response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(StoreError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }

    async fn rows(
        &self,
        privilege: Privilege,
        table: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<Value>, StoreError> {
        let response = self
            .request(reqwest::Method::GET, privilege, table)
            .query(query)
            .send()
            .await?;
        let rows = Self::check(response)
            .await?
            .json::<Vec<Value>>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(rows)
    }

    async fn count(
        &self,
        privilege: Privilege,
        table: &str,
        query: &[(&str, &str)],
    ) -> Result<u64, StoreError> {
        let response = self
            .request(reqwest::Method::GET, privilege, table)
            .query(query)
            .header("Prefer", "count=exact")
            .header("Range", "0-0")
            .send()
            .await?;
        let response = Self::check(response).await?;
        let content_range = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        parse_content_range_total(&content_range).ok_or_else(|| {
            StoreError::Decode(format!("unparseable content-range: {:?}", content_range))
        })
    }

    fn one<T: serde::de::DeserializeOwned>(
        rows: Vec<Value>,
    ) -> Result<Option<T>, StoreError> {
        match rows.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map(Some)
                .map_err(|e| StoreError::Decode(e.to_string())),
            None => Ok(None),
        }
    }
}

/// Extract the total from a `content-range` header such as `0-0/42` or `*/0`.
fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}

#[async_trait]
impl TableStore for SupabaseStore {
    async fn find_org_by_slug(&self, slug: &str) -> Result<Option<Org>, StoreError> {
        let filter = format!("eq.{}", slug);
        let rows = self
            .rows(
                Privilege::Elevated,
                "orgs",
                &[("org_slug", filter.as_str()), ("select", "*")],
            )
            .await?;
        Self::one(rows)
    }

    async fn find_org_by_id(&self, org_id: i64) -> Result<Option<Org>, StoreError> {
        let filter = format!("eq.{}", org_id);
        let rows = self
            .rows(
                Privilege::Elevated,
                "orgs",
                &[("org_id", filter.as_str()), ("select", "*")],
            )
            .await?;
        Self::one(rows)
    }

    async fn insert_org(&self, slug: &str) -> Result<Org, StoreError> {
        let response = self
            .request(reqwest::Method::POST, Privilege::Elevated, "orgs")
            .header("Prefer", "return=representation")
            .json(&json!([{ "org_slug": slug }]))
            .send()
            .await?;
        let rows = Self::check(response)
            .await?
            .json::<Vec<Org>>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        rows.into_iter()
            .next()
            .ok_or(StoreError::EmptyInsert("orgs"))
    }

    async fn find_profile(&self, user_id: &str) -> Result<Option<Profile>, StoreError> {
        let filter = format!("eq.{}", user_id);
        let rows = self
            .rows(
                Privilege::Elevated,
                "profiles",
                &[("id", filter.as_str()), ("select", "*")],
            )
            .await?;
        Self::one(rows)
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        let response = self
            .request(reqwest::Method::POST, Privilege::Elevated, "profiles")
            .header("Prefer", "return=minimal")
            .json(&json!([profile]))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn update_profile_org(&self, user_id: &str, org_id: i64) -> Result<(), StoreError> {
        let filter = format!("eq.{}", user_id);
        let response = self
            .request(reqwest::Method::PATCH, Privilege::Elevated, "profiles")
            .query(&[("id", filter.as_str())])
            .header("Prefer", "return=minimal")
            .json(&json!({ "org_id": org_id }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn upsert_profile(
        &self,
        user_id: &str,
        org_id: i64,
        is_activated: bool,
    ) -> Result<(), StoreError> {
        // Read-then-write rather than a merge upsert so an existing row's
        // superuser flag is left alone.
        match self.find_profile(user_id).await? {
            Some(_) => {
                let filter = format!("eq.{}", user_id);
                let response = self
                    .request(reqwest::Method::PATCH, Privilege::Elevated, "profiles")
                    .query(&[("id", filter.as_str())])
                    .header("Prefer", "return=minimal")
                    .json(&json!({ "org_id": org_id, "is_activated": is_activated }))
                    .send()
                    .await?;
                Self::check(response).await?;
                Ok(())
            }
            None => {
                self.insert_profile(&Profile {
                    id: user_id.to_string(),
                    org_id: Some(org_id),
                    is_activated,
                    is_superuser: false,
                })
                .await
            }
        }
    }

    async fn list_profiles(&self) -> Result<Vec<Value>, StoreError> {
        self.rows(Privilege::Restricted, "profiles", &[("select", "*")])
            .await
    }

    async fn count_profiles(&self) -> Result<u64, StoreError> {
        self.count(Privilege::Restricted, "profiles", &[("select", "id")])
            .await
    }

    async fn count_profiles_in_org(&self, org_id: i64) -> Result<u64, StoreError> {
        let filter = format!("eq.{}", org_id);
        self.count(
            Privilege::Elevated,
            "profiles",
            &[("org_id", filter.as_str()), ("select", "id")],
        )
        .await
    }

    async fn list_brands(&self) -> Result<Vec<Value>, StoreError> {
        self.rows(Privilege::Restricted, "brands", &[("select", "*")])
            .await
    }

    async fn find_brand_by_slug(&self, slug: &str) -> Result<Option<Value>, StoreError> {
        let filter = format!("eq.{}", slug);
        let rows = self
            .rows(
                Privilege::Restricted,
                "brands",
                &[("slug", filter.as_str()), ("select", "*")],
            )
            .await?;
        Ok(rows.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_content_range_totals() {
        assert_eq!(parse_content_range_total("0-0/42"), Some(42));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-24/3573"), Some(3573));
        assert_eq!(parse_content_range_total("0-0/*"), None);
        assert_eq!(parse_content_range_total(""), None);
    }

    #[test]
    fn profile_row_defaults_flags_when_absent() {
        let profile: Profile =
            serde_json::from_value(serde_json::json!({ "id": "u1", "org_id": null })).unwrap();
        assert!(!profile.is_activated);
        assert!(!profile.is_superuser);
        assert_eq!(profile.org_id, None);
    }

    #[test]
    fn org_row_keeps_extra_columns() {
        let org: Org = serde_json::from_value(serde_json::json!({
            "org_id": 3,
            "org_slug": "acme",
            "display_name": "Acme Inc",
        }))
        .unwrap();
        assert_eq!(org.org_id, 3);
        assert_eq!(org.extra["display_name"], "Acme Inc");
    }
}
