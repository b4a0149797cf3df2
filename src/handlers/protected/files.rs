// handlers/protected/files.rs - faculty-scoped Excel file handlers

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Extension,
};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;
use crate::identity::Identity;
use crate::middleware::{ApiResponse, ApiResult};
use crate::policy::{enforce, Action, Deny};
use crate::services::NewFile;

use super::utils::{ensure_faculty, normalize_code, FacultyQuery};

pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

struct UploadedPart {
    name: String,
    mime_type: String,
    data: Vec<u8>,
}

/// POST /upload - Store an Excel file for a faculty
///
/// Multipart fields: `file` (required) and `facultadCod` (form field or
/// query parameter). Re-uploading a name within the same faculty replaces the
/// stored payload.
pub async fn upload(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<FacultyQuery>,
    mut multipart: Multipart,
) -> ApiResult<Value> {
    let mut part: Option<UploadedPart> = None;
    let mut form_faculty: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("file") => {
                let name = field.file_name().unwrap_or_default().trim().to_string();
                let mime_type = field
                    .content_type()
                    .filter(|mime| !mime.is_empty())
                    .unwrap_or(XLSX_MIME)
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Could not read file: {}", e)))?;
                part = Some(UploadedPart {
                    name,
                    mime_type,
                    data: data.to_vec(),
                });
            }
            Some("facultadCod") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid facultadCod: {}", e)))?;
                form_faculty = Some(value);
            }
            _ => {}
        }
    }

    let part = part.ok_or_else(|| ApiError::field_error("file", "No file was sent"))?;
    if part.name.is_empty() {
        return Err(ApiError::field_error("file", "File name cannot be empty"));
    }

    let requested = normalize_code(form_faculty.or(query.faculty_code).as_deref())
        .ok_or_else(|| ApiError::field_error("facultadCod", "facultadCod is required"))?;

    ensure_faculty(state.store.as_ref(), Some(&requested)).await?;
    let scope = enforce(&identity, Action::UploadFile, Some(&requested))?;
    let faculty_code = scope.faculty_code().unwrap_or(&requested).to_string();

    let meta = state
        .store
        .put_file(NewFile {
            name: part.name,
            mime_type: part.mime_type,
            data: part.data,
            faculty_code: faculty_code.clone(),
        })
        .await?;

    tracing::info!(
        login = %identity.login,
        file = %meta.name,
        faculty = %faculty_code,
        "file uploaded"
    );

    Ok(ApiResponse::success(json!({
        "message": format!("File '{}' uploaded for faculty {}", meta.name, faculty_code),
        "facultadCod": faculty_code,
        "archivo": meta,
    })))
}

/// GET /files?facultadCod= - File metadata, newest first
///
/// Admins see every faculty unless they narrow the list; everyone else sees
/// their own faculty only.
pub async fn list(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<FacultyQuery>,
) -> ApiResult<Value> {
    let requested = normalize_code(query.faculty_code.as_deref());
    let requested = requested.as_deref();
    ensure_faculty(state.store.as_ref(), requested).await?;
    let scope = enforce(&identity, Action::ListFiles, requested)?;

    let files = state.store.list_files(&scope).await?;

    Ok(ApiResponse::success(json!({
        "total": files.len(),
        "archivos": files,
        "facultadFiltro": scope.faculty_code(),
    })))
}

/// GET /download/:id - Stream a stored file as an attachment
pub async fn download(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: i64 = id
        .parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid file id '{}'", id)))?;

    let file = state
        .store
        .get_file(id)
        .await?
        .ok_or_else(|| Deny::NotFound("File".to_string()))?;

    enforce(&identity, Action::DownloadFile, Some(&file.meta.faculty_code))?;

    let content_type = HeaderValue::from_str(&file.meta.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static(XLSX_MIME));
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        attachment_name(&file.meta.name)
    ))
    .map_err(|_| ApiError::internal_server_error("Could not build download headers"))?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.data,
    )
        .into_response())
}

/// DELETE /delete/by-name/:filename?facultadCod= - Delete a file by its name
///
/// Without `facultadCod`, an admin removes the name from every faculty.
pub async fn delete_by_name(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(filename): Path<String>,
    Query(query): Query<FacultyQuery>,
) -> ApiResult<Value> {
    let requested = normalize_code(query.faculty_code.as_deref());
    let requested = requested.as_deref();
    ensure_faculty(state.store.as_ref(), requested).await?;
    let scope = enforce(&identity, Action::DeleteFile, requested)?;

    let removed = state.store.delete_file_by_name(&filename, &scope).await?;
    if removed == 0 {
        return Err(Deny::NotFound(format!("File '{}'", filename)).into());
    }

    tracing::info!(
        login = %identity.login,
        file = %filename,
        faculty = scope.faculty_code().unwrap_or("*"),
        removed,
        "file deleted"
    );

    Ok(ApiResponse::success(json!({
        "message": format!("File '{}' deleted", filename),
        "facultadCod": scope.faculty_code(),
        "eliminados": removed,
    })))
}

/// Quoted-string safe rendition of a file name for `Content-Disposition`.
fn attachment_name(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();

    if safe.trim().is_empty() {
        "archivo.xlsx".to_string()
    } else {
        safe
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_names_stay_ascii() {
        assert_eq!(attachment_name("notas 2024.xlsx"), "notas 2024.xlsx");
        assert_eq!(attachment_name("año\"final\".xlsx"), "a_o_final_.xlsx");
        assert_eq!(attachment_name("   "), "archivo.xlsx");
    }
}
