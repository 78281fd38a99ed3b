// HTTP API error types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::HashMap;

/// HTTP API error with appropriate status codes and client-friendly messages.
///
/// Read endpoints never surface these: they fold failures into a 200
/// `{status: "error"}` envelope instead. Mutating endpoints return real
/// status codes through this type.
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 422 Unprocessable Entity (syntactically invalid request body)
    UnprocessableEntity {
        message: String,
        field_errors: HashMap<String, String>,
    },

    // 500 Internal Server Error
    Configuration(String),
    Upstream(String),
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::UnprocessableEntity { .. } => 422,
            ApiError::Configuration(_) => 500,
            ApiError::Upstream(_) => 500,
            ApiError::Internal(_) => 500,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::UnprocessableEntity { message, .. } => message,
            ApiError::Configuration(msg) => msg,
            ApiError::Upstream(msg) => msg,
            ApiError::Internal(msg) => msg,
        }
    }

    /// Convert to the JSON error envelope.
    pub fn to_json(&self) -> Value {
        match self {
            ApiError::UnprocessableEntity {
                message,
                field_errors,
            } => {
                json!({
                    "status": "error",
                    "error": message,
                    "field_errors": field_errors,
                })
            }
            _ => json!({
                "status": "error",
                "error": self.message(),
            }),
        }
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn unprocessable_entity(
        message: impl Into<String>,
        field_errors: HashMap<String, String>,
    ) -> Self {
        ApiError::UnprocessableEntity {
            message: message.into(),
            field_errors,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        ApiError::Configuration(message.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        ApiError::Upstream(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }
}

// Convert domain error types to ApiError
impl From<crate::auth::AuthError> for ApiError {
    fn from(err: crate::auth::AuthError) -> Self {
        ApiError::unauthorized(err.to_string())
    }
}

impl From<crate::services::invite::InviteError> for ApiError {
    fn from(err: crate::services::invite::InviteError) -> Self {
        use crate::services::invite::InviteError;
        match err {
            InviteError::NotPermitted => ApiError::forbidden(
                "You do not have permission to invite users to this organization",
            ),
            InviteError::OrgNotResolved(slug) => {
                ApiError::not_found(format!("Organization '{}' not found", slug))
            }
            InviteError::AlreadyRegistered(email) => {
                ApiError::bad_request(format!("{} is already registered", email))
            }
            InviteError::Identity(e) => {
                ApiError::upstream(format!("identity provider error: {}", e))
            }
            InviteError::Email(e) => ApiError::upstream(format!("email delivery failed: {}", e)),
        }
    }
}

impl From<crate::services::invite::AcceptError> for ApiError {
    fn from(err: crate::services::invite::AcceptError) -> Self {
        use crate::services::invite::AcceptError;
        match err {
            AcceptError::NoOrganization => ApiError::bad_request(
                "No organization could be determined from the invitation",
            ),
            AcceptError::Store(e) => {
                tracing::error!("profile reconciliation failed: {}", e);
                ApiError::internal("Failed to update profile")
            }
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}
