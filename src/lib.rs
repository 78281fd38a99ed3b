pub mod auth;
pub mod config;
pub mod email;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod middleware;
pub mod services;
pub mod state;
pub mod store;

pub use state::AppState;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the full application router around an [`AppState`].
pub fn app(state: AppState) -> Router {
    let protected = Router::new()
        .route("/org/me", get(handlers::org::org_me))
        .route("/org/:org_slug/invite", post(handlers::org::org_invite))
        .route("/auth/accept", post(handlers::accept::accept_invite))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .route("/", get(handlers::public::root))
        .route("/health", get(handlers::public::health))
        .route("/health/db", get(handlers::public::health_db))
        .route("/profiles", get(handlers::public::profiles_list))
        .route("/brands", get(handlers::public::brands_list))
        .route("/brands/:slug", get(handlers::public::brand_get))
        .merge(protected)
        .layer(cors_layer(&state))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(state: &AppState) -> CorsLayer {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}
