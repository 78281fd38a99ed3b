use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::response::Json;
use axum::Extension;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::state::AppState;

/// Organization a caller lands in when they show up without one.
const DEFAULT_ORG_SLUG: &str = "default-org";

/// GET /org/me - the caller's organization, lazily provisioned.
///
/// Read endpoint: data failures come back as a 200 error envelope. Only the
/// auth middleware produces a real 401 here.
pub async fn org_me(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Json<Value> {
    match org_me_inner(&state, &user).await {
        Ok(value) => Json(value),
        Err(message) => {
            warn!(user_id = %user.id, error = %message, "failed to resolve caller organization");
            Json(json!({ "status": "error", "error": message }))
        }
    }
}

async fn org_me_inner(state: &AppState, user: &AuthUser) -> Result<Value, String> {
    let profile = state
        .store
        .find_profile(&user.id)
        .await
        .map_err(|e| e.to_string())?;

    let org_id = match profile.as_ref().and_then(|p| p.org_id) {
        Some(org_id) => org_id,
        None => {
            // No profile, or a profile with no organization: provision both
            // against the default organization.
            let decision = state.permissions.authorize(user, DEFAULT_ORG_SLUG, false).await;
            match (decision.allowed, decision.org_id) {
                (true, Some(org_id)) => org_id,
                _ => return Err("Could not provision an organization".to_string()),
            }
        }
    };

    let org = state
        .store
        .find_org_by_id(org_id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| "Organization not found".to_string())?;

    let user_count = state
        .store
        .count_profiles_in_org(org_id)
        .await
        .map_err(|e| e.to_string())?;

    // Refetch rather than reuse: the authorize call above may just have
    // created or rebound the profile.
    let is_superuser = state
        .store
        .find_profile(&user.id)
        .await
        .map_err(|e| e.to_string())?
        .map(|p| p.is_superuser)
        .unwrap_or(false);

    let mut org_value = serde_json::to_value(&org).map_err(|e| e.to_string())?;
    org_value["user_count"] = json!(user_count);

    Ok(json!({
        "status": "success",
        "org": org_value,
        "is_superuser": is_superuser,
    }))
}

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub email: String,
}

/// POST /org/:org_slug/invite - onboard a new user into an organization.
///
/// Mutating endpoint: failures map to real HTTP statuses (403/404/400/500).
pub async fn org_invite(
    State(state): State<AppState>,
    Path(org_slug): Path<String>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<InviteRequest>,
) -> Result<Json<Value>, ApiError> {
    let email = body.email.trim();
    if !is_valid_email(email) {
        let mut field_errors = HashMap::new();
        field_errors.insert(
            "email".to_string(),
            "value is not a valid email address".to_string(),
        );
        return Err(ApiError::unprocessable_entity(
            "Invalid request body",
            field_errors,
        ));
    }

    let receipt = state.invites.invite(&user, &org_slug, email).await?;

    Ok(Json(json!({
        "status": "success",
        "message": format!("Invitation sent to {}", email),
        "user_id": receipt.user_id,
    })))
}

/// Syntactic email check: one `@`, non-empty local part, dotted domain.
fn is_valid_email(value: &str) -> bool {
    if value.is_empty() || value.contains(char::is_whitespace) {
        return false;
    }
    let mut parts = value.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        _ => false,
    }
}
