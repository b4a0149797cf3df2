use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde::Deserialize;

use crate::error::ApiError;
use crate::policy::Deny;
use crate::services::Store;

/// `?facultadCod=` shared by file and user endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct FacultyQuery {
    #[serde(rename = "facultadCod")]
    pub faculty_code: Option<String>,
}

/// Trimmed, upper-cased catalog code; `None` when blank.
pub fn normalize_code(code: Option<&str>) -> Option<String> {
    code.map(|c| c.trim().to_ascii_uppercase())
        .filter(|c| !c.is_empty())
}

/// Rejects a requested faculty that is not in the catalog.
pub async fn ensure_faculty(store: &dyn Store, requested: Option<&str>) -> Result<(), ApiError> {
    let Some(code) = requested.map(str::trim).filter(|c| !c.is_empty()) else {
        return Ok(());
    };

    if store.faculty_exists(code).await? {
        Ok(())
    } else {
        Err(Deny::NotFound(format!("Faculty '{}'", code)).into())
    }
}

/// Unwraps a JSON body, turning axum's rejection into the error envelope.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::invalid_json(e.body_text()))
}
