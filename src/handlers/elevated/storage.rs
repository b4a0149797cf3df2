// handlers/elevated/storage.rs - GET /debug/files handler

use axum::{extract::State, Extension};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::identity::Identity;
use crate::middleware::{ApiResponse, ApiResult};
use crate::policy::{enforce, Action};

/// GET /debug/files - Every stored file with faculty name and payload size
pub async fn debug_files(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Value> {
    enforce(&identity, Action::InspectStorage, None)?;

    let files = state.store.file_usage().await?;
    let total_bytes: i64 = files.iter().map(|f| f.size_bytes).sum();

    Ok(ApiResponse::success(json!({
        "total": files.len(),
        "totalBytes": total_bytes,
        "archivos": files,
    })))
}
