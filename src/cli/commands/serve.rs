use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use crate::app::{app, AppState};
use crate::config::AppConfig;
use crate::database::open_store;
use crate::identity::UgIdentityClient;
use crate::notify::{GraphMailer, MailGateway, UnconfiguredMailer};

/// Assemble the production dependencies and serve until the process exits.
pub async fn handle(config: &AppConfig, port: Option<u16>) -> anyhow::Result<()> {
    info!("Starting FACAF API in {:?} mode", config.environment);

    if config.security.jwt_secret.is_empty() {
        warn!("JWT_SECRET is empty: sessions cannot be issued or verified");
    }

    let store = open_store(config).await.context("opening store")?;
    info!("Persistence backend: {}", store.backend());

    let identity = UgIdentityClient::new(&config.identity).context("building UG identity client")?;

    let mailer: Arc<dyn MailGateway> = match GraphMailer::from_config(&config.mail) {
        Some(mailer) => Arc::new(mailer),
        None => {
            warn!("MS_CLIENT_ID / MS_CLIENT_SECRET / OUTLOOK_USER not set, email sending disabled");
            Arc::new(UnconfiguredMailer)
        }
    };

    let state = AppState {
        store,
        identity: Arc::new(identity),
        mailer,
        config: Arc::new(config.clone()),
    };

    let port = port.unwrap_or(config.api.port);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    info!("FACAF API listening on http://{}", bind_addr);
    axum::serve(listener, app(state)).await.context("server error")?;

    Ok(())
}
