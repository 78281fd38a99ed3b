use axum::extract::State;
use axum::response::Json;
use axum::Extension;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::state::AppState;

/// POST /auth/accept - reconcile the caller's profile from the organization
/// hints carried in their session token after accepting an invitation.
pub async fn accept_invite(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    let acceptance = state.invites.accept(&user).await?;

    Ok(Json(json!({
        "status": "success",
        "org_id": acceptance.org_id,
        "org_slug": acceptance.org_slug,
    })))
}
