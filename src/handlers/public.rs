// Public read endpoints. These never surface HTTP error statuses for data
// problems: failures fold into a 200 `{status: "error"}` envelope so the
// frontend has one shape to deal with.

use axum::extract::{Path, State};
use axum::response::Json;
use serde_json::{json, Value};
use tracing::warn;

use crate::state::AppState;

/// GET /
pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Welcome to Divisadero API" }))
}

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// GET /health/db - connectivity probe against the table store
pub async fn health_db(State(state): State<AppState>) -> Json<Value> {
    let now = chrono::Utc::now();
    match state.store.count_profiles().await {
        Ok(count) => Json(json!({
            "status": "success",
            "database": "connected",
            "supabase": state.config.supabase_url,
            "profiles_count": count,
            "timestamp": now,
        })),
        Err(e) => {
            warn!(error = %e, "database health check failed");
            Json(json!({
                "status": "error",
                "database": "disconnected",
                "error": e.to_string(),
                "timestamp": now,
            }))
        }
    }
}

/// GET /profiles - passthrough list of profile rows
pub async fn profiles_list(State(state): State<AppState>) -> Json<Value> {
    match state.store.list_profiles().await {
        Ok(profiles) => Json(json!({
            "status": "success",
            "count": profiles.len(),
            "profiles": profiles,
        })),
        Err(e) => {
            warn!(error = %e, "failed to list profiles");
            Json(json!({ "status": "error", "error": e.to_string() }))
        }
    }
}

/// GET /brands - passthrough list of brand rows
pub async fn brands_list(State(state): State<AppState>) -> Json<Value> {
    match state.store.list_brands().await {
        Ok(brands) => Json(json!({
            "status": "success",
            "count": brands.len(),
            "brands": brands,
        })),
        Err(e) => {
            warn!(error = %e, "failed to list brands");
            Json(json!({ "status": "error", "error": e.to_string() }))
        }
    }
}

/// GET /brands/:slug - single brand by slug. A missing brand is still a 200
/// with an error envelope, not a 404.
pub async fn brand_get(State(state): State<AppState>, Path(slug): Path<String>) -> Json<Value> {
    match state.store.find_brand_by_slug(&slug).await {
        Ok(Some(brand)) => Json(json!({ "status": "success", "brand": brand })),
        Ok(None) => Json(json!({ "status": "error", "error": "Brand not found" })),
        Err(e) => {
            warn!(slug, error = %e, "failed to fetch brand");
            Json(json!({ "status": "error", "error": e.to_string() }))
        }
    }
}
