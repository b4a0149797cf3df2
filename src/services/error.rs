use serde::Serialize;
use thiserror::Error;

/// Rows still pointing at a catalog entry that was asked to be deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Blockers {
    pub usuarios: i64,
    pub carreras: i64,
    pub archivos: i64,
}

impl Blockers {
    pub fn is_empty(&self) -> bool {
        self.usuarios == 0 && self.carreras == 0 && self.archivos == 0
    }
}

/// Errors shared by every store backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Duplicate(String),

    #[error("{message}")]
    InvalidReference { field: &'static str, message: String },

    #[error("{entity} '{code}' is still referenced")]
    InUse {
        entity: &'static str,
        code: String,
        blockers: Blockers,
    },


    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl StoreError {
    pub fn invalid_reference(field: &'static str, message: impl Into<String>) -> Self {
        StoreError::InvalidReference {
            field,
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            other => StoreError::Sqlx(other),
        }
    }
}
