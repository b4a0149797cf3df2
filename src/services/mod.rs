//! Resource service contracts.
//!
//! Each service is a small CRUD store. Faculty visibility is never derived here:
//! operations that read or delete across faculties take a [`Scope`](crate::policy::Scope)
//! produced by the policy engine.

pub mod authority;
pub mod catalog;
pub mod error;
pub mod files;
pub mod templates;
pub mod users;
pub mod validation;

use async_trait::async_trait;

pub use authority::AuthorityConfigStore;
pub use catalog::{Career, CareerPatch, Catalog, Faculty, RoleRecord};
pub use error::{Blockers, StoreError};
pub use files::{FileMeta, FileStorage, FileUsage, NewFile, StoredFile};
pub use templates::{TemplateBodies, TemplateKind, TemplateStore};
pub use users::{NewUser, Page, UserDirectory, UserFilter, UserPage, UserPatch, UserRecord};

/// Everything the HTTP layer needs from persistence.
#[async_trait]
pub trait Store:
    FileStorage + UserDirectory + Catalog + TemplateStore + AuthorityConfigStore + Send + Sync
{
    /// Cheap round trip used by the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Backend name for logs and the health payload.
    fn backend(&self) -> &'static str;
}
