use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use serde_json::Value;

use crate::auth::{AuthError, TokenPayload};
use crate::error::ApiError;
use crate::state::AppState;

/// Authenticated caller context extracted from the bearer token.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
    pub user_metadata: Value,
}

impl From<TokenPayload> for AuthUser {
    fn from(payload: TokenPayload) -> Self {
        Self {
            id: payload.sub,
            email: payload.email,
            user_metadata: payload.user_metadata,
        }
    }
}

/// Authentication middleware: runs the configured token decoder and injects
/// the caller identity into request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(request.headers())?;
    let payload = state.decoder.decode(&token)?;
    request.extensions_mut().insert(AuthUser::from(payload));
    Ok(next.run(request).await)
}

/// Extract the credential from an `Authorization: Bearer <token>` header.
fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AuthError> {
    let auth_header = headers
        .get("authorization")
        .ok_or(AuthError::MissingHeader)?;

    let auth_str = auth_header.to_str().map_err(|_| AuthError::MissingHeader)?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.to_string()),
        _ => Err(AuthError::InvalidScheme),
    }
}
