// handlers/protected/session.rs - session introspection handlers

use axum::Extension;
use serde_json::{json, Value};

use crate::identity::Identity;
use crate::middleware::{ApiResponse, ApiResult};
use crate::policy::modules::module_access;

/// GET /api/auth/whoami - The identity resolved for this request
pub async fn whoami(Extension(identity): Extension<Identity>) -> ApiResult<Identity> {
    Ok(ApiResponse::success(identity))
}

/// GET /api/permissions/modules - Front-end module visibility for the caller's role
///
/// ```json
/// {
///   "permissions": { "admin-panel": false, "reportes": true, ... },
///   "userInfo": { "role": "decano", "facultad": "ING", "carrera": null, "usuario": "ana@ug.edu.ec" }
/// }
/// ```
pub async fn module_permissions(Extension(identity): Extension<Identity>) -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({
        "permissions": module_access(identity.role),
        "userInfo": {
            "role": identity.role,
            "facultad": identity.faculty_code,
            "carrera": identity.career_code,
            "usuario": identity.login,
        }
    })))
}
