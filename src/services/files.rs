use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use super::StoreError;
use crate::policy::Scope;

/// File metadata as listed to clients.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct FileMeta {
    pub id: i64,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "fecha")]
    pub uploaded_at: DateTime<Utc>,
    #[serde(rename = "facultadCod")]
    pub faculty_code: String,
    #[serde(rename = "tipoMime")]
    pub mime_type: String,
}

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub meta: FileMeta,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct NewFile {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
    pub faculty_code: String,
}

/// Storage inspection row (admin diagnostics).
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FileUsage {
    pub id: i64,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "fecha")]
    pub uploaded_at: DateTime<Utc>,
    #[serde(rename = "facultadCod")]
    pub faculty_code: String,
    #[serde(rename = "facultadNombre")]
    pub faculty_name: String,
    #[serde(rename = "tipoMime")]
    pub mime_type: String,
    #[serde(rename = "tamanoBytes")]
    pub size_bytes: i64,
}

/// Composite name older uploads were sometimes stored under.
pub fn legacy_name(name: &str, faculty_code: &str) -> String {
    format!("{}_{}", name, faculty_code)
}

#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Upsert keyed by (name, faculty). A re-upload replaces payload, MIME type
    /// and timestamp of the existing row.
    async fn put_file(&self, file: NewFile) -> Result<FileMeta, StoreError>;

    /// Metadata newest first.
    async fn list_files(&self, scope: &Scope) -> Result<Vec<FileMeta>, StoreError>;

    async fn get_file(&self, id: i64) -> Result<Option<StoredFile>, StoreError>;

    /// Deletes rows named exactly `name`, in `faculty_code` or everywhere when `None`.
    async fn delete_files_named(
        &self,
        name: &str,
        faculty_code: Option<&str>,
    ) -> Result<u64, StoreError>;

    async fn file_usage(&self) -> Result<Vec<FileUsage>, StoreError>;

    /// Delete by name under a policy scope.
    ///
    /// An unrestricted scope removes every faculty's file with that name. A
    /// faculty scope tries the exact name first and then the legacy
    /// `{name}_{faculty}` form.
    async fn delete_file_by_name(&self, name: &str, scope: &Scope) -> Result<u64, StoreError> {
        match scope.faculty_code() {
            None => self.delete_files_named(name, None).await,
            Some(code) => {
                let removed = self.delete_files_named(name, Some(code)).await?;
                if removed > 0 {
                    return Ok(removed);
                }
                self.delete_files_named(&legacy_name(name, code), Some(code))
                    .await
            }
        }
    }
}
