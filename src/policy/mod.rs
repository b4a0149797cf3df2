//! Access policy engine.
//!
//! One authoritative place that decides, for a verified [`Identity`], whether an
//! [`Action`] is allowed and which faculties it may touch. Handlers call
//! [`authorize`] before any resource service; services accept the resulting
//! [`Scope`] and never derive visibility on their own.

pub mod modules;

use serde::Serialize;
use std::fmt;

use crate::identity::Identity;

/// Role tag as stored in the role catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Decano,
    Coordinador,
    Usuario,
}

impl Role {
    /// Parses a catalog role name. Unrecognized names fall back to the most
    /// restrictive role.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "admin" => Role::Admin,
            "decano" => Role::Decano,
            "coordinador" => Role::Coordinador,
            _ => Role::Usuario,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Decano => "decano",
            Role::Coordinador => "coordinador",
            Role::Usuario => "usuario",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything a request can ask the policy engine about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    UploadFile,
    DeleteFile,
    ListFiles,
    DownloadFile,
    InspectStorage,
    ViewUsers,
    ManageUsers,
    ReadCatalogs,
    ManageCatalogs,
    SendEmail,
    ReadTemplates,
    EditTemplates,
    ReadAuthority,
    ConfigureAuthority,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::UploadFile => "upload_file",
            Action::DeleteFile => "delete_file",
            Action::ListFiles => "list_files",
            Action::DownloadFile => "download_file",
            Action::InspectStorage => "inspect_storage",
            Action::ViewUsers => "view_users",
            Action::ManageUsers => "manage_users",
            Action::ReadCatalogs => "read_catalogs",
            Action::ManageCatalogs => "manage_catalogs",
            Action::SendEmail => "send_email",
            Action::ReadTemplates => "read_templates",
            Action::EditTemplates => "edit_templates",
            Action::ReadAuthority => "read_authority",
            Action::ConfigureAuthority => "configure_authority",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How far a role's capability for an action extends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reach {
    /// Capability absent.
    None,
    /// Only the subject's own faculty.
    OwnFaculty,
    /// Every faculty, optionally narrowed by the caller.
    AnyFaculty,
}

/// The capability table. Total over (role, action).
pub fn reach(role: Role, action: Action) -> Reach {
    use Action::*;
    use Reach::*;

    match role {
        Role::Admin => AnyFaculty,
        Role::Decano => match action {
            UploadFile | DeleteFile | ListFiles | DownloadFile => OwnFaculty,
            ViewUsers => OwnFaculty,
            SendEmail | EditTemplates => OwnFaculty,
            ReadCatalogs | ReadTemplates | ReadAuthority => AnyFaculty,
            ManageUsers | ManageCatalogs | InspectStorage | ConfigureAuthority => None,
        },
        Role::Coordinador => match action {
            UploadFile | DeleteFile | ListFiles | DownloadFile => OwnFaculty,
            SendEmail | EditTemplates | ConfigureAuthority => OwnFaculty,
            ReadCatalogs | ReadTemplates | ReadAuthority => AnyFaculty,
            ViewUsers | ManageUsers | ManageCatalogs | InspectStorage => None,
        },
        Role::Usuario => match action {
            ListFiles | DownloadFile => OwnFaculty,
            ReadCatalogs | ReadTemplates | ReadAuthority => AnyFaculty,
            UploadFile | DeleteFile | InspectStorage | ViewUsers | ManageUsers | ManageCatalogs
            | SendEmail | EditTemplates | ConfigureAuthority => None,
        },
    }
}

/// Faculty filter an allowed action operates under.
///
/// Only the policy engine constructs scopes, so a service receiving one knows
/// the decision was made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scope {
    faculty: Option<String>,
}

impl Scope {
    pub(crate) fn unrestricted() -> Self {
        Self { faculty: None }
    }

    pub(crate) fn faculty(code: impl Into<String>) -> Self {
        Self { faculty: Some(code.into()) }
    }

    /// The single faculty this scope is narrowed to, or `None` for all faculties.
    pub fn faculty_code(&self) -> Option<&str> {
        self.faculty.as_deref()
    }

    pub fn is_unrestricted(&self) -> bool {
        self.faculty.is_none()
    }

    pub fn permits(&self, faculty_code: &str) -> bool {
        match &self.faculty {
            None => true,
            Some(code) => code == faculty_code,
        }
    }
}

/// Structured denial reasons. Never carries raw error text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deny {
    NotAuthenticated,
    InactiveAccount,
    InsufficientRole { role: Role, action: Action },
    CrossFaculty { requested: String, own: String },
    NotFound(String),
}

impl Deny {
    pub fn code(&self) -> &'static str {
        match self {
            Deny::NotAuthenticated => "NOT_AUTHENTICATED",
            Deny::InactiveAccount => "INACTIVE_ACCOUNT",
            Deny::InsufficientRole { .. } => "INSUFFICIENT_ROLE",
            Deny::CrossFaculty { .. } => "CROSS_FACULTY",
            Deny::NotFound(_) => "RESOURCE_NOT_FOUND",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Deny::NotAuthenticated => 401,
            Deny::InactiveAccount | Deny::InsufficientRole { .. } | Deny::CrossFaculty { .. } => 403,
            Deny::NotFound(_) => 404,
        }
    }
}

impl fmt::Display for Deny {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deny::NotAuthenticated => f.write_str("not authenticated"),
            Deny::InactiveAccount => f.write_str("inactive account"),
            Deny::InsufficientRole { .. } => f.write_str("insufficient role capability"),
            Deny::CrossFaculty { .. } => f.write_str("cross-faculty access denied"),
            Deny::NotFound(what) => write!(f, "{} not found", what),
        }
    }
}

impl std::error::Error for Deny {}

/// Decides `action` for `subject`, optionally targeting `requested_faculty`.
///
/// Order: account state, then capability, then faculty scope. A blank
/// requested faculty is treated as absent.
pub fn authorize(
    subject: &Identity,
    action: Action,
    requested_faculty: Option<&str>,
) -> Result<Scope, Deny> {
    if !subject.active {
        return Err(Deny::InactiveAccount);
    }

    let requested = requested_faculty.map(str::trim).filter(|code| !code.is_empty());

    match reach(subject.role, action) {
        Reach::None => Err(Deny::InsufficientRole {
            role: subject.role,
            action,
        }),
        Reach::AnyFaculty => Ok(match requested {
            Some(code) => Scope::faculty(code),
            None => Scope::unrestricted(),
        }),
        Reach::OwnFaculty => match requested {
            Some(code) if code != subject.faculty_code => Err(Deny::CrossFaculty {
                requested: code.to_string(),
                own: subject.faculty_code.clone(),
            }),
            _ => Ok(Scope::faculty(subject.faculty_code.clone())),
        },
    }
}

/// Convenience wrapper logging the denial the way every handler wants it.
pub fn enforce(
    subject: &Identity,
    action: Action,
    requested_faculty: Option<&str>,
) -> Result<Scope, Deny> {
    authorize(subject, action, requested_faculty).map_err(|deny| {
        tracing::warn!(
            login = %subject.login,
            role = %subject.role,
            action = %action,
            reason = deny.code(),
            "access denied"
        );
        deny
    })
}
