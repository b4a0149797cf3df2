//! Identity and session contract.
//!
//! A request's identity is resolved from a signed session token: the token
//! names the login, and role, faculty and career are read from the user
//! directory on every request. Nothing the client sends besides the token is
//! consulted.

pub mod ug;

use serde::Serialize;
use thiserror::Error;

use crate::auth::{self, TokenError};
use crate::config::SecurityConfig;
use crate::policy::{Deny, Role};
use crate::services::{StoreError, UserDirectory, UserRecord};

pub use ug::{IdentityError, IdentityProvider, UgIdentityClient, UgVerdict};

/// Verified subject of a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identity {
    #[serde(rename = "id")]
    pub user_id: i32,
    #[serde(rename = "usuario")]
    pub login: String,
    #[serde(rename = "rol")]
    pub role: Role,
    #[serde(rename = "facultadCod")]
    pub faculty_code: String,
    #[serde(rename = "carreraCod")]
    pub career_code: Option<String>,
    #[serde(rename = "activo")]
    pub active: bool,
}

impl From<UserRecord> for Identity {
    fn from(user: UserRecord) -> Self {
        Self {
            user_id: user.id,
            role: Role::from_name(&user.role_name),
            login: user.login,
            faculty_code: user.faculty_code,
            career_code: user.career_code,
            active: user.active,
        }
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Denied(#[from] Deny),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Turns a session token into a verified identity, or the reason there is none.
pub async fn resolve_identity<D>(
    directory: &D,
    security: &SecurityConfig,
    token: &str,
) -> Result<Identity, ResolveError>
where
    D: UserDirectory + ?Sized,
{
    let claims = auth::validate_jwt(security, token).map_err(|e| {
        match &e {
            TokenError::MissingSecret => tracing::error!("Session secret not configured"),
            _ => tracing::debug!("Rejected session token: {}", e),
        }
        Deny::NotAuthenticated
    })?;

    let user = directory
        .find_user(&claims.sub)
        .await?
        .ok_or_else(|| {
            tracing::warn!("Session token for unknown login '{}'", claims.sub);
            Deny::NotAuthenticated
        })?;

    if !user.active {
        tracing::warn!("Session token for inactive login '{}'", user.login);
        return Err(Deny::InactiveAccount.into());
    }

    Ok(Identity::from(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::issue_session_token;
    use crate::config::{AppConfig, DirectoryConfig};
    use crate::database::MemoryStore;
    use crate::services::UserPatch;

    fn security() -> SecurityConfig {
        AppConfig::development().security
    }

    #[tokio::test]
    async fn seeded_admin_resolves_from_token() {
        let directory = DirectoryConfig::default();
        let store = MemoryStore::seeded(&directory);
        let token = issue_session_token(&security(), &directory.admin_email).unwrap();

        let identity = resolve_identity(&store, &security(), &token).await.unwrap();
        assert_eq!(identity.role, Role::Admin);
        assert_eq!(identity.faculty_code, "ADM");
        assert!(identity.active);
    }

    #[tokio::test]
    async fn tampered_or_unknown_tokens_are_not_authenticated() {
        let store = MemoryStore::seeded(&DirectoryConfig::default());

        let err = resolve_identity(&store, &security(), "abc.def.ghi").await.unwrap_err();
        assert!(matches!(err, ResolveError::Denied(Deny::NotAuthenticated)));

        let token = issue_session_token(&security(), "ghost@ug.edu.ec").unwrap();
        let err = resolve_identity(&store, &security(), &token).await.unwrap_err();
        assert!(matches!(err, ResolveError::Denied(Deny::NotAuthenticated)));
    }

    #[tokio::test]
    async fn deactivation_applies_to_live_tokens() {
        let directory = DirectoryConfig::default();
        let store = MemoryStore::seeded(&directory);
        let token = issue_session_token(&security(), &directory.admin_email).unwrap();

        store
            .update_user(
                1,
                UserPatch {
                    active: Some(false),
                    ..UserPatch::default()
                },
            )
            .await
            .unwrap();

        let err = resolve_identity(&store, &security(), &token).await.unwrap_err();
        assert!(matches!(err, ResolveError::Denied(Deny::InactiveAccount)));
    }
}
