// handlers/protected/users.rs - user directory handlers
//
// Reads: admin (any faculty) and decano (own faculty).
// Writes: admin only. Users are deactivated, never deleted.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Deserializer};

use crate::app::AppState;
use crate::error::ApiError;
use crate::identity::Identity;
use crate::middleware::{ApiResponse, ApiResult};
use crate::policy::{enforce, Action, Deny};
use crate::services::validation::validate_email_format;
use crate::services::{NewUser, Page, UserFilter, UserPage, UserPatch, UserRecord};

use super::utils::{ensure_faculty, json_body, normalize_code};

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    #[serde(rename = "facultadCod")]
    pub faculty_code: Option<String>,
    #[serde(rename = "rolId")]
    pub role_id: Option<i32>,
    pub q: Option<String>,
    pub activo: Option<bool>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub usuario: Option<String>,
    #[serde(rename = "rolId")]
    pub role_id: Option<i32>,
    #[serde(rename = "facultadCod")]
    pub faculty_code: Option<String>,
    #[serde(rename = "carreraCod")]
    pub career_code: Option<String>,
    pub activo: Option<bool>,
}

/// Partial update. `carreraCod: null` clears the career; an absent key keeps it.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub usuario: Option<String>,
    #[serde(rename = "rolId")]
    pub role_id: Option<i32>,
    #[serde(rename = "facultadCod")]
    pub faculty_code: Option<String>,
    #[serde(rename = "carreraCod", default, deserialize_with = "double_option")]
    pub career_code: Option<Option<String>>,
    pub activo: Option<bool>,
}

fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// GET /usuarios - Paginated user list
///
/// Query: `facultadCod`, `rolId`, `q` (login, role or faculty name), `activo`,
/// `page` (>= 0) and `limit` (1..=200).
pub async fn list(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<UserListQuery>,
) -> ApiResult<UserPage> {
    let requested = normalize_code(query.faculty_code.as_deref());
    let requested = requested.as_deref();
    ensure_faculty(state.store.as_ref(), requested).await?;
    let scope = enforce(&identity, Action::ViewUsers, requested)?;

    let filter = UserFilter {
        faculty_code: scope.faculty_code().map(str::to_string),
        role_id: query.role_id,
        search: query.q,
        active: query.activo,
        page: Page::clamped(query.page, query.limit),
    };

    let page = state.store.list_users(&filter).await?;
    Ok(ApiResponse::success(page))
}

/// GET /usuarios/:id - A single user, 404 outside the caller's scope
pub async fn show(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i32>,
) -> ApiResult<UserRecord> {
    let scope = enforce(&identity, Action::ViewUsers, None)?;

    match state.store.get_user(id).await? {
        Some(user) if scope.permits(&user.faculty_code) => Ok(ApiResponse::success(user)),
        _ => Err(Deny::NotFound(format!("User {}", id)).into()),
    }
}

/// POST /usuarios - Register a user (admin only)
///
/// ```json
/// { "usuario": "ana@ug.edu.ec", "rolId": 3, "facultadCod": "ING", "carreraCod": "SIS", "activo": true }
/// ```
pub async fn create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<UserRecord> {
    enforce(&identity, Action::ManageUsers, None)?;
    let body = json_body(payload)?;

    let login = body
        .usuario
        .as_deref()
        .map(str::trim)
        .filter(|login| !login.is_empty())
        .ok_or_else(|| ApiError::field_error("usuario", "usuario is required"))?;
    validate_email_format(login).map_err(|msg| ApiError::field_error("usuario", msg))?;

    let role_id = body
        .role_id
        .ok_or_else(|| ApiError::field_error("rolId", "rolId is required"))?;
    let faculty_code = normalize_code(body.faculty_code.as_deref())
        .ok_or_else(|| ApiError::field_error("facultadCod", "facultadCod is required"))?;

    let user = state
        .store
        .create_user(NewUser {
            login: login.to_string(),
            role_id,
            faculty_code,
            career_code: normalize_code(body.career_code.as_deref()),
            active: body.activo.unwrap_or(true),
        })
        .await?;

    tracing::info!(admin = %identity.login, user = %user.login, "user created");
    Ok(ApiResponse::created(user))
}

/// PUT /usuarios/:id - Patch the supplied fields of a user (admin only)
pub async fn update(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i32>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> ApiResult<UserRecord> {
    enforce(&identity, Action::ManageUsers, None)?;
    let body = json_body(payload)?;

    let login = match body.usuario.as_deref().map(str::trim) {
        Some(login) => {
            validate_email_format(login).map_err(|msg| ApiError::field_error("usuario", msg))?;
            Some(login.to_string())
        }
        None => None,
    };

    let faculty_code = match body.faculty_code.as_deref() {
        Some(code) => Some(
            normalize_code(Some(code))
                .ok_or_else(|| ApiError::field_error("facultadCod", "facultadCod cannot be empty"))?,
        ),
        None => None,
    };

    let patch = UserPatch {
        login,
        role_id: body.role_id,
        faculty_code,
        career_code: body
            .career_code
            .map(|career| normalize_code(career.as_deref())),
        active: body.activo,
    };

    if patch.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }

    let user = state.store.update_user(id, patch).await?;

    tracing::info!(admin = %identity.login, user = %user.login, "user updated");
    Ok(ApiResponse::success(user))
}
