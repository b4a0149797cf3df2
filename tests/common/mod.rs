#![allow(dead_code)]

use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{multipart, StatusCode};
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

use facaf_api::app::{app, AppState};
use facaf_api::auth::issue_session_token;
use facaf_api::config::AppConfig;
use facaf_api::database::{DatabaseManager, MemoryStore, PgStore};
use facaf_api::identity::{IdentityError, IdentityProvider, UgVerdict};
use facaf_api::notify::{Email, MailError, MailGateway};
use facaf_api::services::{NewUser, Store, UserRecord};

pub const ADMIN: &str = "admin@ug.edu.ec";
pub const VALID_PASSWORD: &str = "clave-correcta";

pub const ROLE_ADMIN: i32 = 1;
pub const ROLE_DECANO: i32 = 2;
pub const ROLE_COORDINADOR: i32 = 3;
pub const ROLE_USUARIO: i32 = 4;

/// Accepts every login whose password is [`VALID_PASSWORD`].
pub struct StubIdentity;

#[async_trait]
impl IdentityProvider for StubIdentity {
    async fn validate_credentials(&self, _login: &str, password: &str) -> Result<UgVerdict, IdentityError> {
        if password == VALID_PASSWORD {
            Ok(UgVerdict::Valid)
        } else {
            Ok(UgVerdict::Invalid {
                message: "CREDENCIALES ERRADAS".to_string(),
            })
        }
    }
}

/// Keeps every email instead of delivering it.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MailGateway for RecordingMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        self.sent
            .lock()
            .map_err(|_| MailError::DeliveryFailed("recorder poisoned".to_string()))?
            .push(email.clone());
        Ok(())
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.security.jwt_secret = "integration-test-secret".to_string();
    config.api.enable_request_logging = false;
    config.directory.admin_email = ADMIN.to_string();
    config.directory.default_authority_email = "autoridad@ug.edu.ec".to_string();
    config
}

static SCHEMA_SEQ: AtomicU32 = AtomicU32::new(0);

/// The real router served on a free local port over a freshly seeded store.
pub struct TestServer {
    pub base_url: String,
    pub store: Arc<dyn Store>,
    pub mailer: Arc<RecordingMailer>,
    pub config: Arc<AppConfig>,
    pub client: reqwest::Client,
}

impl TestServer {
    pub async fn start() -> Result<Self> {
        Self::start_with(Arc::new(StubIdentity)).await
    }

    pub async fn start_with(identity: Arc<dyn IdentityProvider>) -> Result<Self> {
        let config = test_config();
        let store = Arc::new(MemoryStore::seeded(&config.directory));
        Self::serve(config, store, identity).await
    }

    /// Same server over PostgreSQL, in a private schema of `TEST_DATABASE_URL`.
    /// `None` when the variable is unset.
    pub async fn start_postgres() -> Result<Option<Self>> {
        let url = match std::env::var("TEST_DATABASE_URL") {
            Ok(url) if !url.trim().is_empty() => url,
            _ => return Ok(None),
        };

        let schema = format!(
            "facaf_test_{}_{}",
            std::process::id(),
            SCHEMA_SEQ.fetch_add(1, Ordering::SeqCst)
        );
        let options = PgConnectOptions::from_str(&url).context("invalid TEST_DATABASE_URL")?;

        let admin_pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_with(options.clone())
            .await
            .context("failed to connect to TEST_DATABASE_URL")?;
        sqlx::query(&format!("DROP SCHEMA IF EXISTS {} CASCADE", schema))
            .execute(&admin_pool)
            .await?;
        sqlx::query(&format!("CREATE SCHEMA {}", schema))
            .execute(&admin_pool)
            .await?;
        admin_pool.close().await;

        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect_with(options.options([("search_path", schema.as_str())]))
            .await?;

        let config = test_config();
        let manager = DatabaseManager::from_pool(pool);
        manager.initialize_schema(&config.directory).await?;
        let store = Arc::new(PgStore::new(manager.pool().clone()));

        Ok(Some(
            Self::serve(config, store, Arc::new(StubIdentity)).await?,
        ))
    }

    async fn serve(
        config: AppConfig,
        store: Arc<dyn Store>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self> {
        let config = Arc::new(config);
        let mailer = Arc::new(RecordingMailer::default());

        let state = AppState {
            store: store.clone(),
            identity,
            mailer: mailer.clone(),
            config: config.clone(),
        };

        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .with_context(|| format!("failed to bind test port {}", port))?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app(state)).await;
        });

        Ok(Self {
            base_url: format!("http://127.0.0.1:{}", port),
            store,
            mailer,
            config,
            client: reqwest::Client::new(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn token(&self, login: &str) -> Result<String> {
        Ok(issue_session_token(&self.config.security, login)?)
    }

    /// Register a user directly in the store and return a session token for it.
    pub async fn user(
        &self,
        login: &str,
        role_id: i32,
        faculty: &str,
    ) -> Result<(UserRecord, String)> {
        let user = self
            .store
            .create_user(NewUser {
                login: login.to_string(),
                role_id,
                faculty_code: faculty.to_string(),
                career_code: None,
                active: true,
            })
            .await?;
        let token = self.token(login)?;
        Ok((user, token))
    }

    pub fn admin_token(&self) -> Result<String> {
        self.token(ADMIN)
    }

    pub async fn get(&self, path: &str, token: &str) -> Result<(StatusCode, Value)> {
        let res = self.client.get(self.url(path)).bearer_auth(token).send().await?;
        read(res).await
    }

    pub async fn post_json(&self, path: &str, token: &str, body: &Value) -> Result<(StatusCode, Value)> {
        let res = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;
        read(res).await
    }

    pub async fn put_json(&self, path: &str, token: &str, body: &Value) -> Result<(StatusCode, Value)> {
        let res = self
            .client
            .put(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;
        read(res).await
    }

    pub async fn delete(&self, path: &str, token: &str) -> Result<(StatusCode, Value)> {
        let res = self.client.delete(self.url(path)).bearer_auth(token).send().await?;
        read(res).await
    }

    /// Multipart upload with the faculty sent as a form field.
    pub async fn upload(
        &self,
        token: &str,
        faculty: Option<&str>,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<(StatusCode, Value)> {
        let part = multipart::Part::bytes(bytes.to_vec())
            .file_name(file_name.to_string())
            .mime_str("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet")?;
        let mut form = multipart::Form::new().part("file", part);
        if let Some(code) = faculty {
            form = form.text("facultadCod", code.to_string());
        }

        let res = self
            .client
            .post(self.url("/upload"))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;
        read(res).await
    }
}

async fn read(res: reqwest::Response) -> Result<(StatusCode, Value)> {
    let status = res.status();
    let text = res.text().await?;
    let body = serde_json::from_str(&text)
        .with_context(|| format!("non-JSON body ({}): {}", status, text))?;
    Ok((status, body))
}
