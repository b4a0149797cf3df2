// handlers/protected/templates.rs - notification template handlers

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::identity::Identity;
use crate::middleware::{ApiResponse, ApiResult};
use crate::policy::{enforce, Action};
use crate::services::{TemplateBodies, TemplateKind};

use super::utils::json_body;

#[derive(Debug, Default, Deserialize)]
pub struct TemplateQuery {
    pub tipo: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TemplateUpdate {
    pub tipo: Option<String>,
    #[serde(flatten)]
    pub bodies: TemplateBodies,
}

fn parse_kind(tipo: Option<&str>) -> Result<TemplateKind, crate::error::ApiError> {
    match tipo.map(str::trim).filter(|t| !t.is_empty()) {
        Some(tipo) => Ok(tipo.parse()?),
        None => Ok(TemplateKind::default()),
    }
}

/// GET /plantillas?tipo= - Bodies of one template kind (default `seguimiento`)
///
/// ```json
/// {
///   "tipo": "nee",
///   "plantillas": { "autoridad": "...", "docente": "...", "estudiante": "..." },
///   "tiposDisponibles": ["seguimiento", "nee", "tercera_matricula", "parcial", "final"]
/// }
/// ```
pub async fn show(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<TemplateQuery>,
) -> ApiResult<Value> {
    enforce(&identity, Action::ReadTemplates, None)?;
    let kind = parse_kind(query.tipo.as_deref())?;

    let bodies = state.store.get_template(kind).await?;

    Ok(ApiResponse::success(json!({
        "tipo": kind,
        "plantillas": bodies,
        "tiposDisponibles": TemplateKind::names(),
    })))
}

/// GET /plantillas/tipos
pub async fn kinds(Extension(identity): Extension<Identity>) -> ApiResult<Value> {
    enforce(&identity, Action::ReadTemplates, None)?;
    let names = TemplateKind::names();

    Ok(ApiResponse::success(json!({
        "total": names.len(),
        "tipos": names,
    })))
}

/// POST /plantillas - `{ "tipo": "parcial", "autoridad": "...", "docente": "...", "estudiante": "..." }`
///
/// Missing bodies are stored as empty strings.
pub async fn update(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<TemplateUpdate>, JsonRejection>,
) -> ApiResult<Value> {
    enforce(&identity, Action::EditTemplates, None)?;
    let body = json_body(payload)?;
    let kind = parse_kind(body.tipo.as_deref())?;

    state.store.set_template(kind, body.bodies).await?;

    tracing::info!(login = %identity.login, kind = %kind, "template updated");
    Ok(ApiResponse::success(json!({
        "message": format!("Template '{}' saved", kind),
        "tipo": kind,
    })))
}
