use async_trait::async_trait;
use serde::Serialize;
use sqlx::FromRow;

use super::{Blockers, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct RoleRecord {
    pub id: i32,
    #[serde(rename = "nombre")]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Faculty {
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "nombre")]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Career {
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "facultadCod")]
    pub faculty_code: String,
    #[serde(rename = "nombre")]
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct CareerPatch {
    pub faculty_code: Option<String>,
    pub name: Option<String>,
}

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn list_roles(&self) -> Result<Vec<RoleRecord>, StoreError>;

    async fn list_faculties(&self) -> Result<Vec<Faculty>, StoreError>;

    async fn get_faculty(&self, code: &str) -> Result<Option<Faculty>, StoreError>;

    async fn create_faculty(&self, faculty: Faculty) -> Result<Faculty, StoreError>;

    async fn rename_faculty(&self, code: &str, name: &str) -> Result<Faculty, StoreError>;

    /// Refused with `InUse` while any user, career or file references it.
    async fn delete_faculty(&self, code: &str) -> Result<(), StoreError>;

    async fn list_careers(&self, faculty_code: &str) -> Result<Vec<Career>, StoreError>;

    /// The faculty reference must exist.
    async fn create_career(&self, career: Career) -> Result<Career, StoreError>;

    async fn update_career(&self, code: &str, patch: CareerPatch) -> Result<Career, StoreError>;

    /// Refused with `InUse` while any user references it.
    async fn delete_career(&self, code: &str) -> Result<(), StoreError>;

    async fn faculty_exists(&self, code: &str) -> Result<bool, StoreError> {
        Ok(self.get_faculty(code).await?.is_some())
    }
}

pub(crate) fn faculty_in_use(code: &str, blockers: Blockers) -> StoreError {
    StoreError::InUse {
        entity: "Faculty",
        code: code.to_string(),
        blockers,
    }
}

pub(crate) fn career_in_use(code: &str, users: i64) -> StoreError {
    StoreError::InUse {
        entity: "Career",
        code: code.to_string(),
        blockers: Blockers {
            usuarios: users,
            ..Blockers::default()
        },
    }
}
