use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub identity: IdentityConfig,
    pub mail: MailConfig,
    pub directory: DirectoryConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL. `None` selects the in-memory store (development only).
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub max_upload_bytes: usize,
    pub enable_request_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub cors_origins: Vec<String>,
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
}

/// External institutional identity API (credential validation is delegated there).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub ug_auth_url: String,
    pub request_timeout_secs: u64,
}

/// Microsoft Graph client-credentials mail settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub tenant_id: String,
    pub sender: Option<String>,
    pub default_subject: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    pub admin_email: String,
    pub default_authority_email: String,
}

const DEFAULT_UG_AUTH_URL: &str =
    "https://servicioenlinea.ug.edu.ec/SeguridadTestAPI/api/CampusVirtual/ValidarCuentaInstitucionalv3";

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            if !v.trim().is_empty() {
                self.database.url = Some(v);
            }
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // API overrides
        if let Ok(v) = env::var("FACAF_API_PORT").or_else(|_| env::var("PORT")) {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("API_MAX_UPLOAD_BYTES") {
            self.api.max_upload_bytes = v.parse().unwrap_or(self.api.max_upload_bytes);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }

        // Identity API overrides
        if let Ok(v) = env::var("UG_AUTH_URL") {
            self.identity.ug_auth_url = v;
        }
        if let Ok(v) = env::var("REQUEST_TIMEOUT") {
            self.identity.request_timeout_secs = v.parse().unwrap_or(self.identity.request_timeout_secs);
        }

        // Mail overrides
        self.mail.client_id = env::var("MS_CLIENT_ID").ok().or(self.mail.client_id);
        self.mail.client_secret = env::var("MS_CLIENT_SECRET").ok().or(self.mail.client_secret);
        self.mail.sender = env::var("OUTLOOK_USER").ok().or(self.mail.sender);
        if let Ok(v) = env::var("MS_TENANT_ID") {
            self.mail.tenant_id = v;
        }
        if let Ok(v) = env::var("MAIL_DEFAULT_SUBJECT") {
            self.mail.default_subject = v;
        }

        // Directory overrides
        if let Ok(v) = env::var("ADMIN_EMAIL") {
            self.directory.admin_email = v;
        }
        if let Ok(v) = env::var("DEFAULT_AUTHORITY_EMAIL") {
            self.directory.default_authority_email = v;
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                url: None,
                max_connections: 5,
                connection_timeout: 30,
            },
            api: ApiConfig {
                port: 5000,
                max_upload_bytes: 25 * 1024 * 1024, // 25MB
                enable_request_logging: true,
            },
            security: SecurityConfig {
                cors_origins: vec![],
                jwt_secret: "facaf-development-secret".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
            },
            identity: IdentityConfig::default(),
            mail: MailConfig::default(),
            directory: DirectoryConfig::default(),
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 10,
            },
            api: ApiConfig {
                port: 5000,
                max_upload_bytes: 20 * 1024 * 1024, // 20MB
                enable_request_logging: true,
            },
            security: SecurityConfig {
                cors_origins: vec![],
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
            },
            identity: IdentityConfig::default(),
            mail: MailConfig::default(),
            directory: DirectoryConfig::default(),
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 5,
            },
            api: ApiConfig {
                port: 5000,
                max_upload_bytes: 20 * 1024 * 1024, // 20MB
                enable_request_logging: false,
            },
            security: SecurityConfig {
                cors_origins: vec![],
                jwt_secret: String::new(),
                jwt_expiry_hours: 12,
            },
            identity: IdentityConfig::default(),
            mail: MailConfig::default(),
            directory: DirectoryConfig::default(),
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            ug_auth_url: DEFAULT_UG_AUTH_URL.to_string(),
            request_timeout_secs: 10,
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            tenant_id: "250f76e7-6105-42e3-82d0-be7c460aea59".to_string(),
            sender: None,
            default_subject: "FACAF Notificación Académica".to_string(),
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            admin_email: "luis.baldeons@ug.edu.ec".to_string(),
            default_authority_email: "alvaro.espinozabu@ug.edu.ec".to_string(),
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
