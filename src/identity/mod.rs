use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::AppConfig;

/// Outbound calls to the identity provider's admin API time out after this
/// long; no retries follow.
const ADMIN_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("{0} is already registered")]
    AlreadyRegistered(String),

    #[error("identity provider returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("identity provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected identity provider response: {0}")]
    Decode(String),
}

/// Request to provision a user at the identity provider. Organization hints
/// ride along in both the public and the private metadata maps so the
/// invited user's session token carries them back to us.
#[derive(Debug, Clone)]
pub struct CreateUserRequest {
    pub email: String,
    pub user_metadata: Value,
    pub app_metadata: Value,
    pub redirect_to: String,
}

/// The provider's view of a freshly created user. The two timestamps tell
/// us whether the provider already dispatched an invitation or confirmation
/// email of its own.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub invited_at: Option<String>,
    #[serde(default)]
    pub confirmation_sent_at: Option<String>,
}

impl CreatedUser {
    /// True when the provider reports it already sent the user an email.
    pub fn email_dispatched(&self) -> bool {
        self.invited_at.is_some() || self.confirmation_sent_at.is_some()
    }
}

/// Administrative operations against the hosted identity provider.
#[async_trait]
pub trait IdentityAdmin: Send + Sync {
    async fn create_user(&self, request: &CreateUserRequest) -> Result<CreatedUser, IdentityError>;

    /// Ask the provider to mint an invitation link for `email` pointing back
    /// at `redirect_to` once accepted.
    async fn generate_invite_link(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<String, IdentityError>;
}

/// [`IdentityAdmin`] over the provider's REST admin endpoints, authenticated
/// with the elevated credential.
pub struct GoTrueAdmin {
    auth_url: String,
    service_role_key: String,
    client: Client,
}

impl GoTrueAdmin {
    pub fn new(config: &AppConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(ADMIN_REQUEST_TIMEOUT).build()?;
        Ok(Self {
            auth_url: format!("{}/auth/v1", config.supabase_url.trim_end_matches('/')),
            service_role_key: config.supabase_service_role_key.clone(),
            client,
        })
    }

    async fn error_from(response: reqwest::Response) -> IdentityError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        IdentityError::Upstream { status, message }
    }
}

/// The provider reports a duplicate registration as a client error whose
/// body mentions the address has already been registered.
fn is_already_registered(status: u16, body: &str) -> bool {
    (status == 400 || status == 422) && body.to_lowercase().contains("already")
}

/// Invitation links show up as `action_link` either at the top level or
/// under `properties`, depending on the provider version.
fn extract_action_link(value: &Value) -> Option<String> {
    value
        .get("action_link")
        .or_else(|| value.get("properties").and_then(|p| p.get("action_link")))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[async_trait]
impl IdentityAdmin for GoTrueAdmin {
    async fn create_user(&self, request: &CreateUserRequest) -> Result<CreatedUser, IdentityError> {
        let body = json!({
            "email": request.email,
            "user_metadata": request.user_metadata,
            "app_metadata": request.app_metadata,
        });
        let response = self
            .client
            .post(format!("{}/admin/users", self.auth_url))
            .query(&[("redirect_to", request.redirect_to.as_str())])
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            if is_already_registered(status.as_u16(), &message) {
                return Err(IdentityError::AlreadyRegistered(request.email.clone()));
            }
            return Err(IdentityError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<CreatedUser>()
            .await
            .map_err(|e| IdentityError::Decode(e.to_string()))
    }

    async fn generate_invite_link(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<String, IdentityError> {
        let body = json!({
            "type": "invite",
            "email": email,
            "redirect_to": redirect_to,
        });
        let response = self
            .client
            .post(format!("{}/admin/generate_link", self.auth_url))
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let value = response
            .json::<Value>()
            .await
            .map_err(|e| IdentityError::Decode(e.to_string()))?;
        extract_action_link(&value)
            .ok_or_else(|| IdentityError::Decode("response carried no action_link".to_string()))
    }
}
