use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde_json::{json, Value};
use tower::ServiceExt;

use divisadero_api::auth::UnverifiedTokenDecoder;
use divisadero_api::config::{AppConfig, Environment};
use divisadero_api::email::{EmailError, EmailMessage, EmailOutcome, Mailer};
use divisadero_api::identity::{CreateUserRequest, CreatedUser, IdentityAdmin, IdentityError};
use divisadero_api::store::{MemoryStore, TableStore};
use divisadero_api::AppState;

/// Identity provider fake: records calls, returns a scripted user.
#[derive(Default)]
pub struct FakeIdentity {
    pub create_calls: Mutex<Vec<CreateUserRequest>>,
    pub link_calls: Mutex<Vec<(String, String)>>,
    pub provider_sends_email: AtomicBool,
    pub already_registered: AtomicBool,
}

impl FakeIdentity {
    pub fn create_call_count(&self) -> usize {
        self.create_calls.lock().unwrap().len()
    }

    pub fn link_call_count(&self) -> usize {
        self.link_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl IdentityAdmin for FakeIdentity {
    async fn create_user(&self, request: &CreateUserRequest) -> Result<CreatedUser, IdentityError> {
        self.create_calls.lock().unwrap().push(request.clone());
        if self.already_registered.load(Ordering::SeqCst) {
            return Err(IdentityError::AlreadyRegistered(request.email.clone()));
        }
        let invited_at = self
            .provider_sends_email
            .load(Ordering::SeqCst)
            .then(|| "2026-01-01T00:00:00Z".to_string());
        Ok(CreatedUser {
            id: "invited-user-1".to_string(),
            email: Some(request.email.clone()),
            invited_at,
            confirmation_sent_at: None,
        })
    }

    async fn generate_invite_link(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<String, IdentityError> {
        self.link_calls
            .lock()
            .unwrap()
            .push((email.to_string(), redirect_to.to_string()));
        Ok(format!(
            "https://id.example/verify?email={}&redirect_to={}",
            email, redirect_to
        ))
    }
}

/// Mailer fake: records every message instead of sending it.
#[derive(Default)]
pub struct FakeMailer {
    pub sent: Mutex<Vec<EmailMessage>>,
}

impl FakeMailer {
    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Mailer for FakeMailer {
    async fn send(&self, message: &EmailMessage) -> Result<EmailOutcome, EmailError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(EmailOutcome::Sent)
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        environment: Environment::Development,
        port: 0,
        supabase_url: "http://table-store.test".to_string(),
        supabase_anon_key: "anon-key".to_string(),
        supabase_service_role_key: "service-key".to_string(),
        supabase_jwt_secret: None,
        verify_tokens: false,
        allow_org_mismatch: true,
        resend_api_key: None,
        email_from_address: "no-reply@divisadero.app".to_string(),
        email_from_name: "Divisadero".to_string(),
        frontend_url: "http://localhost:5173".to_string(),
        cors_origins: vec!["http://localhost:5173".to_string()],
    }
}

/// Everything an integration test needs to drive the router and inspect the
/// fakes behind it.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub identity: Arc<FakeIdentity>,
    pub mailer: Arc<FakeMailer>,
}

pub fn test_app() -> TestApp {
    test_app_with_config(test_config())
}

pub fn test_app_with_config(config: AppConfig) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let identity = Arc::new(FakeIdentity::default());
    let mailer = Arc::new(FakeMailer::default());

    let state = AppState::new(
        config,
        store.clone() as Arc<dyn TableStore>,
        identity.clone(),
        mailer.clone(),
        Arc::new(UnverifiedTokenDecoder),
    );

    TestApp {
        router: divisadero_api::app(state),
        store,
        identity,
        mailer,
    }
}

/// Forge an unsigned three-segment session token the development decoder
/// accepts.
pub fn forge_token(sub: &str, email: &str, user_metadata: Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        serde_json::to_vec(&json!({
            "sub": sub,
            "email": email,
            "user_metadata": user_metadata,
        }))
        .unwrap(),
    );
    format!("{}.{}.forged-signature", header, payload)
}

pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router never fails");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, body)
}

pub async fn get(router: &Router, path: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .uri(path)
        .body(Body::empty())
        .expect("request");
    send(router, request).await
}

pub async fn get_authed(router: &Router, path: &str, token: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .uri(path)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .expect("request");
    send(router, request).await
}

pub async fn post_authed(
    router: &Router,
    path: &str,
    token: &str,
    body: Value,
) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .expect("request");
    send(router, request).await
}
