// handlers/protected/authority.rs - authority notification address

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;
use crate::identity::Identity;
use crate::middleware::{ApiResponse, ApiResult};
use crate::policy::{enforce, Action};
use crate::services::validation::validate_email_format;

use super::utils::json_body;

#[derive(Debug, Deserialize)]
pub struct AuthorityUpdate {
    #[serde(rename = "correoAutoridad")]
    pub email: Option<String>,
}

/// GET /correo-autoridad - Stored address, or the configured default
pub async fn show(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Value> {
    enforce(&identity, Action::ReadAuthority, None)?;

    let email = state
        .store
        .get_authority_email()
        .await?
        .unwrap_or_else(|| state.config.directory.default_authority_email.clone());

    Ok(ApiResponse::success(json!({ "correoAutoridad": email })))
}

/// POST /correo-autoridad - `{ "correoAutoridad": "decano@ug.edu.ec" }`
pub async fn update(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<AuthorityUpdate>, JsonRejection>,
) -> ApiResult<Value> {
    enforce(&identity, Action::ConfigureAuthority, None)?;
    let body = json_body(payload)?;

    let email = body.email.as_deref().map(str::trim).unwrap_or_default();
    if email.is_empty() {
        return Err(ApiError::field_error("correoAutoridad", "correoAutoridad is required"));
    }
    validate_email_format(email).map_err(|msg| ApiError::field_error("correoAutoridad", msg))?;

    state.store.set_authority_email(email).await?;

    tracing::info!(login = %identity.login, "authority email updated");
    Ok(ApiResponse::success(json!({
        "message": "Authority email updated",
        "correoAutoridad": email,
    })))
}
