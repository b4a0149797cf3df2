use async_trait::async_trait;

use super::StoreError;

/// Singleton holding the authority (dean) notification address.
#[async_trait]
pub trait AuthorityConfigStore: Send + Sync {
    /// Most recent address, if one was ever stored.
    async fn get_authority_email(&self) -> Result<Option<String>, StoreError>;

    /// Overwrites the most recent record; no history is kept.
    async fn set_authority_email(&self, email: &str) -> Result<(), StoreError>;
}
