use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing or invalid authorization header")]
    MissingHeader,

    #[error("Authorization header must use Bearer token format")]
    InvalidScheme,

    #[error("Invalid token format")]
    MalformedToken,

    #[error("Token validation failed: {0}")]
    InvalidPayload(String),

    #[error("Invalid token: no user ID")]
    MissingSubject,

    #[error("Token signature rejected: {0}")]
    InvalidSignature(String),
}

/// Identity extracted from a session token issued by the hosted identity
/// provider.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenPayload {
    pub sub: String,
    pub email: Option<String>,
    pub user_metadata: Value,
}

/// Turns a bearer credential into a caller identity.
///
/// Two implementations exist: [`VerifyingTokenDecoder`] checks the HS256
/// signature against the provider's secret before trusting any claim, and
/// [`UnverifiedTokenDecoder`] trusts the payload at face value. Production
/// configurations default to the verifying variant.
pub trait TokenDecoder: Send + Sync {
    fn decode(&self, token: &str) -> Result<TokenPayload, AuthError>;
}

#[derive(Debug, Deserialize)]
struct RawClaims {
    sub: Option<String>,
    email: Option<String>,
    #[serde(default)]
    user_metadata: Option<Value>,
}

impl RawClaims {
    fn into_payload(self) -> Result<TokenPayload, AuthError> {
        let sub = match self.sub {
            Some(sub) if !sub.is_empty() => sub,
            _ => return Err(AuthError::MissingSubject),
        };
        Ok(TokenPayload {
            sub,
            email: self.email,
            user_metadata: self
                .user_metadata
                .unwrap_or_else(|| Value::Object(Map::new())),
        })
    }
}

/// Decodes the payload segment of a token without checking its signature.
///
/// Development use only: anyone able to base64-encode JSON can mint an
/// identity this decoder accepts.
pub struct UnverifiedTokenDecoder;

impl TokenDecoder for UnverifiedTokenDecoder {
    fn decode(&self, token: &str) -> Result<TokenPayload, AuthError> {
        let mut segments = token.split('.');
        let (_header, payload) = match (segments.next(), segments.next(), segments.next()) {
            (Some(h), Some(p), Some(_sig)) if segments.next().is_none() => (h, p),
            _ => return Err(AuthError::MalformedToken),
        };

        // Token segments come unpadded; pad back to a multiple of four.
        let mut padded = payload.to_string();
        while padded.len() % 4 != 0 {
            padded.push('=');
        }
        let decoded = URL_SAFE
            .decode(padded.as_bytes())
            .map_err(|e| AuthError::InvalidPayload(e.to_string()))?;

        let claims: RawClaims = serde_json::from_slice(&decoded)
            .map_err(|e| AuthError::InvalidPayload(e.to_string()))?;
        claims.into_payload()
    }
}

/// Validates the token signature against the provider's HS256 secret before
/// trusting its claims.
pub struct VerifyingTokenDecoder {
    key: DecodingKey,
    validation: Validation,
}

impl VerifyingTokenDecoder {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Provider tokens carry an `aud` of "authenticated"; the subject and
        // expiry are what we care about here.
        validation.validate_aud = false;
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

impl TokenDecoder for VerifyingTokenDecoder {
    fn decode(&self, token: &str) -> Result<TokenPayload, AuthError> {
        let data = jsonwebtoken::decode::<RawClaims>(token, &self.key, &self.validation)
            .map_err(|e| AuthError::InvalidSignature(e.to_string()))?;
        data.claims.into_payload()
    }
}
