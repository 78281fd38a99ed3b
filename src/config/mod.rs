use std::env;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable is not set")]
    MissingVar(&'static str),

    #[error("SUPABASE_URL is not a valid URL: {0}")]
    InvalidUrl(String),

    #[error("token verification is enabled but SUPABASE_JWT_SECRET is not set")]
    MissingJwtSecret,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

/// Runtime configuration, loaded once at startup and passed explicitly to
/// every component. There is no global config singleton.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub port: u16,

    /// Base URL of the hosted table store / identity provider.
    pub supabase_url: String,
    /// Restricted credential: respects row-level security.
    pub supabase_anon_key: String,
    /// Elevated credential: bypasses row-level security.
    pub supabase_service_role_key: String,
    /// HS256 secret the identity provider signs session tokens with.
    pub supabase_jwt_secret: Option<String>,

    /// Whether bearer tokens must carry a valid signature. Defaults to on
    /// outside development.
    pub verify_tokens: bool,
    /// Whether a profile bound to a different organization is still granted
    /// access to the requested one. Defaults to on in development only.
    pub allow_org_mismatch: bool,

    pub resend_api_key: Option<String>,
    pub email_from_address: String,
    pub email_from_name: String,

    /// Base URL invite redirect links point at.
    pub frontend_url: String,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        let supabase_url = require_var("SUPABASE_URL")?;
        url::Url::parse(&supabase_url)
            .map_err(|_| ConfigError::InvalidUrl(supabase_url.clone()))?;

        let config = Self {
            environment,
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
            supabase_url,
            supabase_anon_key: require_var("SUPABASE_KEY")?,
            supabase_service_role_key: require_var("SUPABASE_SERVICE_ROLE_KEY")?,
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET").ok(),
            verify_tokens: flag_var(
                "TOKEN_VERIFICATION",
                environment != Environment::Development,
            ),
            allow_org_mismatch: flag_var(
                "ALLOW_ORG_MISMATCH",
                environment == Environment::Development,
            ),
            resend_api_key: env::var("RESEND_API_KEY").ok().filter(|k| !k.is_empty()),
            email_from_address: env::var("EMAIL_FROM_ADDRESS")
                .unwrap_or_else(|_| "no-reply@divisadero.app".to_string()),
            email_from_name: env::var("EMAIL_FROM_NAME")
                .unwrap_or_else(|_| "Divisadero".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            cors_origins: cors_origins_from_env(environment),
        };

        if config.verify_tokens && config.supabase_jwt_secret.is_none() {
            return Err(ConfigError::MissingJwtSecret);
        }

        Ok(config)
    }
}

fn require_var(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(name)),
    }
}

/// Parse an on/off env var, falling back to `default` when absent or
/// unparseable. Accepts `on`/`off` as well as `true`/`false`.
fn flag_var(name: &'static str, default: bool) -> bool {
    match env::var(name).as_deref() {
        Ok("on") | Ok("true") | Ok("1") => true,
        Ok("off") | Ok("false") | Ok("0") => false,
        _ => default,
    }
}

fn cors_origins_from_env(environment: Environment) -> Vec<String> {
    if let Ok(v) = env::var("CORS_ORIGINS") {
        return v.split(',').map(|s| s.trim().to_string()).collect();
    }
    match environment {
        Environment::Development => vec![
            "http://localhost:5173".to_string(),
            "http://localhost:3000".to_string(),
        ],
        _ => Vec::new(),
    }
}
