// handlers/public/ug.rs - POST /auth/ug handler

use axum::{
    extract::{FromRequest, Request, State},
    http::header::CONTENT_TYPE,
    Form, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::auth::issue_session_token;
use crate::error::ApiError;
use crate::identity::UgVerdict;
use crate::middleware::{ApiResponse, ApiResult};
use crate::policy::Deny;

#[derive(Debug, Default, Deserialize)]
pub struct UgLoginRequest {
    #[serde(default)]
    pub usuario: String,
    #[serde(default)]
    pub clave: String,
}

/// POST /auth/ug - Validate institutional credentials and open a session
///
/// Accepts a JSON or `application/x-www-form-urlencoded` body with
/// `usuario` and `clave`. The password is checked by the UG identity API only.
///
/// Registered, active login:
/// ```json
/// {
///   "success": true,
///   "data": {
///     "ok": true,
///     "registrado": true,
///     "usuario": { "id": 7, "usuario": "ana@ug.edu.ec", "rolNombre": "coordinador", "facultadCod": "ING" },
///     "token": "eyJhbGciOiJIUzI1NiI..."
///   }
/// }
/// ```
///
/// Valid upstream but unknown locally: `registrado: false`, no token.
pub async fn login(State(state): State<AppState>, request: Request) -> ApiResult<Value> {
    let credentials = read_credentials(&state, request).await?;
    let login = credentials.usuario.trim();

    if login.is_empty() || credentials.clave.is_empty() {
        return Err(ApiError::bad_request("usuario and clave are required"));
    }

    match state
        .identity
        .validate_credentials(login, &credentials.clave)
        .await?
    {
        UgVerdict::Invalid { message } => {
            tracing::info!("UG rejected credentials for '{}'", login);
            Err(ApiError::invalid_credentials(message))
        }
        UgVerdict::Valid => match state.store.find_user(login).await? {
            Some(user) if !user.active => {
                tracing::warn!("Login refused for inactive account '{}'", user.login);
                Err(Deny::InactiveAccount.into())
            }
            Some(user) => {
                let token = issue_session_token(&state.config.security, &user.login)?;
                tracing::info!("Session opened for '{}' ({})", user.login, user.role_name);

                Ok(ApiResponse::success(json!({
                    "ok": true,
                    "registrado": true,
                    "usuario": user,
                    "token": token,
                })))
            }
            None => Ok(ApiResponse::success(json!({
                "ok": true,
                "registrado": false,
                "usuario": login,
                "mensaje": "Valid credentials, but the account is not registered in FACAF",
            }))),
        },
    }
}

async fn read_credentials(state: &AppState, request: Request) -> Result<UgLoginRequest, ApiError> {
    let is_form = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false);

    if is_form {
        let Form(credentials) = Form::<UgLoginRequest>::from_request(request, state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        Ok(credentials)
    } else {
        let Json(credentials) = Json::<UgLoginRequest>::from_request(request, state)
            .await
            .map_err(|e| ApiError::invalid_json(e.body_text()))?;
        Ok(credentials)
    }
}
