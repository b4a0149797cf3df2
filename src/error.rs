// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::auth::TokenError;
use crate::identity::{IdentityError, ResolveError};
use crate::notify::MailError;
use crate::policy::Deny;
use crate::services::templates::UnknownTemplateKind;
use crate::services::{Blockers, StoreError};

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },
    InvalidJson(String),

    // 401 Unauthorized (rejected by the identity provider)
    InvalidCredentials(String),

    // 401 / 403 / 404 decided by the policy engine
    Denied(Deny),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),
    InUse {
        message: String,
        blockers: Blockers,
    },

    // 500 Internal Server Error
    InternalServerError(String),

    // 502 Bad Gateway (external service issues)
    BadGateway(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),

    // 504 Gateway Timeout
    UpstreamTimeout(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::InvalidJson(_) => 400,
            ApiError::InvalidCredentials(_) => 401,
            ApiError::Denied(deny) => deny.status_code(),
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::InUse { .. } => 409,
            ApiError::InternalServerError(_) => 500,
            ApiError::BadGateway(_) => 502,
            ApiError::ServiceUnavailable(_) => 503,
            ApiError::UpstreamTimeout(_) => 504,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> String {
        match self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::ValidationError { message, .. } => message.clone(),
            ApiError::InvalidJson(msg) => msg.clone(),
            ApiError::InvalidCredentials(msg) => msg.clone(),
            ApiError::Denied(deny) => deny.to_string(),
            ApiError::NotFound(msg) => msg.clone(),
            ApiError::Conflict(msg) => msg.clone(),
            ApiError::InUse { message, .. } => message.clone(),
            ApiError::InternalServerError(msg) => msg.clone(),
            ApiError::BadGateway(msg) => msg.clone(),
            ApiError::ServiceUnavailable(msg) => msg.clone(),
            ApiError::UpstreamTimeout(msg) => msg.clone(),
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut response = json!({
            "success": false,
            "error": self.message(),
            "code": self.error_code()
        });

        match self {
            ApiError::ValidationError {
                field_errors: Some(field_errors),
                ..
            } => {
                response["field_errors"] = json!(field_errors);
            }
            ApiError::InUse { blockers, .. } => {
                response["blockers"] = json!(blockers);
            }
            _ => {}
        }

        response
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::InvalidJson(_) => "INVALID_JSON",
            ApiError::InvalidCredentials(_) => "INVALID_CREDENTIALS",
            ApiError::Denied(deny) => deny.code(),
            ApiError::NotFound(_) => "RESOURCE_NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::InUse { .. } => "IN_USE",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::BadGateway(_) => "BAD_GATEWAY",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::UpstreamTimeout(_) => "UPSTREAM_UNAVAILABLE",
        }
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(
        message: impl Into<String>,
        field_errors: Option<HashMap<String, String>>,
    ) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    /// Validation failure on a single named field.
    pub fn field_error(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut field_errors = HashMap::new();
        field_errors.insert(field.to_string(), message.clone());
        ApiError::validation_error(message, Some(field_errors))
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        ApiError::InvalidJson(message.into())
    }

    pub fn invalid_credentials(message: impl Into<String>) -> Self {
        ApiError::InvalidCredentials(message.into())
    }

    pub fn unauthorized() -> Self {
        ApiError::Denied(Deny::NotAuthenticated)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        ApiError::BadGateway(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }

    pub fn upstream_timeout(message: impl Into<String>) -> Self {
        ApiError::UpstreamTimeout(message.into())
    }
}

// Convert other error types to ApiError
impl From<Deny> for ApiError {
    fn from(deny: Deny) -> Self {
        ApiError::Denied(deny)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ApiError::Denied(Deny::NotFound(what)),
            StoreError::Duplicate(msg) => ApiError::conflict(msg),
            StoreError::InvalidReference { field, message } => ApiError::field_error(field, message),
            StoreError::InUse {
                entity,
                code,
                blockers,
            } => ApiError::InUse {
                message: format!("{} '{}' is still referenced", entity, code),
                blockers,
            },
            StoreError::Unavailable(msg) => {
                tracing::error!("Store unavailable: {}", msg);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            StoreError::Sqlx(sqlx_err) => {
                // Log the real error but return generic message
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::internal_server_error("Database error occurred")
            }
        }
    }
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Denied(deny) => deny.into(),
            ResolveError::Store(store) => store.into(),
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Timeout(after) => {
                tracing::error!("Identity API timed out after {:?}", after);
                ApiError::upstream_timeout("Identity service did not respond in time")
            }
            IdentityError::Unreachable(reason) => {
                tracing::error!("Identity API unreachable: {}", reason);
                ApiError::bad_gateway("Identity service unavailable")
            }
            IdentityError::UnexpectedReply(payload) => {
                tracing::error!("Identity API unexpected reply: {}", payload);
                ApiError::bad_gateway("Unexpected reply from identity service")
            }
            IdentityError::Setup(reason) => {
                tracing::error!("Identity client misconfigured: {}", reason);
                ApiError::internal_server_error("Identity service misconfigured")
            }
        }
    }
}

impl From<MailError> for ApiError {
    fn from(err: MailError) -> Self {
        if err.is_validation() {
            return ApiError::field_error(
                match &err {
                    MailError::EmptyBody => "body",
                    _ => "to",
                },
                err.to_string(),
            );
        }
        ApiError::bad_gateway("Email delivery failed")
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        tracing::error!("Session token error: {}", err);
        ApiError::internal_server_error("Could not issue session token")
    }
}

impl From<UnknownTemplateKind> for ApiError {
    fn from(err: UnknownTemplateKind) -> Self {
        ApiError::field_error("tipo", err.to_string())
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
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{Action, Role};

    #[test]
    fn denials_keep_their_reason_code() {
        let err = ApiError::from(Deny::CrossFaculty {
            requested: "MED".into(),
            own: "ING".into(),
        });
        assert_eq!(err.status_code(), 403);
        let body = err.to_json();
        assert_eq!(body["code"], "CROSS_FACULTY");
        assert_eq!(body["error"], "cross-faculty access denied");
        assert_eq!(body["success"], false);

        let err = ApiError::from(Deny::InsufficientRole {
            role: Role::Usuario,
            action: Action::UploadFile,
        });
        assert_eq!(err.to_json()["code"], "INSUFFICIENT_ROLE");
    }

    #[test]
    fn in_use_conflicts_carry_blockers() {
        let err = ApiError::from(StoreError::InUse {
            entity: "Faculty",
            code: "ING".into(),
            blockers: Blockers {
                usuarios: 1,
                carreras: 2,
                archivos: 0,
            },
        });
        assert_eq!(err.status_code(), 409);
        let body = err.to_json();
        assert_eq!(body["blockers"]["carreras"], 2);
        assert!(body["error"].is_string());
    }

    #[test]
    fn upstream_timeout_is_distinguishable() {
        let err = ApiError::from(IdentityError::Timeout(std::time::Duration::from_secs(10)));
        assert_eq!(err.status_code(), 504);
        assert_eq!(err.error_code(), "UPSTREAM_UNAVAILABLE");
    }

    #[test]
    fn sql_details_are_not_exposed() {
        let err = ApiError::from(StoreError::Sqlx(sqlx::Error::RowNotFound));
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.message(), "Database error occurred");
    }
}
