// handlers/protected/catalogs.rs - role, faculty and career catalogs
//
// Reads are open to every authenticated role; writes require ManageCatalogs.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;
use crate::identity::Identity;
use crate::middleware::{ApiResponse, ApiResult};
use crate::policy::{enforce, Action};
use crate::services::validation::{validate_catalog_code, validate_catalog_name};
use crate::services::{Career, CareerPatch, Faculty, RoleRecord};

use super::utils::{ensure_faculty, json_body, normalize_code};

#[derive(Debug, Deserialize)]
pub struct FacultyRequest {
    pub codigo: Option<String>,
    pub nombre: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CareerRequest {
    pub codigo: Option<String>,
    #[serde(rename = "facultadCod")]
    pub faculty_code: Option<String>,
    pub nombre: Option<String>,
}

fn required_code(field: &str, code: Option<&str>) -> Result<String, ApiError> {
    let code = normalize_code(code)
        .ok_or_else(|| ApiError::field_error(field, format!("{} is required", field)))?;
    validate_catalog_code(&code).map_err(|msg| ApiError::field_error(field, msg))?;
    Ok(code)
}

fn required_name(name: Option<&str>) -> Result<String, ApiError> {
    let name = name.map(str::trim).unwrap_or_default();
    validate_catalog_name(name).map_err(|msg| ApiError::field_error("nombre", msg))?;
    Ok(name.to_string())
}

/// GET /api/roles
pub async fn roles(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Vec<RoleRecord>> {
    enforce(&identity, Action::ReadCatalogs, None)?;
    Ok(ApiResponse::success(state.store.list_roles().await?))
}

/// GET /api/facultades
pub async fn faculties(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Vec<Faculty>> {
    enforce(&identity, Action::ReadCatalogs, None)?;
    Ok(ApiResponse::success(state.store.list_faculties().await?))
}

/// POST /api/facultades - `{ "codigo": "ARQ", "nombre": "Arquitectura" }`
pub async fn create_faculty(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<FacultyRequest>, JsonRejection>,
) -> ApiResult<Faculty> {
    enforce(&identity, Action::ManageCatalogs, None)?;
    let body = json_body(payload)?;

    let faculty = Faculty {
        code: required_code("codigo", body.codigo.as_deref())?,
        name: required_name(body.nombre.as_deref())?,
    };
    let faculty = state.store.create_faculty(faculty).await?;

    tracing::info!(admin = %identity.login, faculty = %faculty.code, "faculty created");
    Ok(ApiResponse::created(faculty))
}

/// PUT /api/facultades/:cod - Rename a faculty. The code is immutable.
pub async fn update_faculty(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(code): Path<String>,
    payload: Result<Json<FacultyRequest>, JsonRejection>,
) -> ApiResult<Faculty> {
    enforce(&identity, Action::ManageCatalogs, None)?;
    let body = json_body(payload)?;

    let code = required_code("codigo", Some(&code))?;
    let name = required_name(body.nombre.as_deref())?;
    let faculty = state.store.rename_faculty(&code, &name).await?;

    Ok(ApiResponse::success(faculty))
}

/// DELETE /api/facultades/:cod
///
/// Refused with 409 `IN_USE` and a `blockers` breakdown while users, careers
/// or files still reference the faculty.
pub async fn delete_faculty(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(code): Path<String>,
) -> ApiResult<Value> {
    enforce(&identity, Action::ManageCatalogs, None)?;

    let code = required_code("codigo", Some(&code))?;
    state.store.delete_faculty(&code).await?;

    tracing::info!(admin = %identity.login, faculty = %code, "faculty deleted");
    Ok(ApiResponse::success(json!({
        "message": format!("Faculty '{}' deleted", code),
        "codigo": code,
    })))
}

/// GET /api/carreras/:facultadCod - Careers of one faculty
pub async fn careers(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(faculty_code): Path<String>,
) -> ApiResult<Vec<Career>> {
    let faculty_code = required_code("facultadCod", Some(&faculty_code))?;
    ensure_faculty(state.store.as_ref(), Some(&faculty_code)).await?;
    enforce(&identity, Action::ReadCatalogs, Some(&faculty_code))?;

    Ok(ApiResponse::success(
        state.store.list_careers(&faculty_code).await?,
    ))
}

/// POST /api/carreras - `{ "codigo": "SIS", "facultadCod": "ING", "nombre": "Sistemas" }`
pub async fn create_career(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<CareerRequest>, JsonRejection>,
) -> ApiResult<Career> {
    enforce(&identity, Action::ManageCatalogs, None)?;
    let body = json_body(payload)?;

    let career = Career {
        code: required_code("codigo", body.codigo.as_deref())?,
        faculty_code: required_code("facultadCod", body.faculty_code.as_deref())?,
        name: required_name(body.nombre.as_deref())?,
    };
    let career = state.store.create_career(career).await?;

    tracing::info!(admin = %identity.login, career = %career.code, "career created");
    Ok(ApiResponse::created(career))
}

/// PUT /api/carreras/:cod - Rename a career or move it to another faculty
pub async fn update_career(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(code): Path<String>,
    payload: Result<Json<CareerRequest>, JsonRejection>,
) -> ApiResult<Career> {
    enforce(&identity, Action::ManageCatalogs, None)?;
    let body = json_body(payload)?;

    let code = required_code("codigo", Some(&code))?;
    let patch = CareerPatch {
        faculty_code: match body.faculty_code.as_deref() {
            Some(faculty) => Some(required_code("facultadCod", Some(faculty))?),
            None => None,
        },
        name: match body.nombre.as_deref() {
            Some(name) => Some(required_name(Some(name))?),
            None => None,
        },
    };

    if patch.faculty_code.is_none() && patch.name.is_none() {
        return Err(ApiError::bad_request("No fields to update"));
    }

    Ok(ApiResponse::success(
        state.store.update_career(&code, patch).await?,
    ))
}

/// DELETE /api/carreras/:cod - Refused while users reference the career
pub async fn delete_career(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(code): Path<String>,
) -> ApiResult<Value> {
    enforce(&identity, Action::ManageCatalogs, None)?;

    let code = required_code("codigo", Some(&code))?;
    state.store.delete_career(&code).await?;

    tracing::info!(admin = %identity.login, career = %code, "career deleted");
    Ok(ApiResponse::success(json!({
        "message": format!("Career '{}' deleted", code),
        "codigo": code,
    })))
}
