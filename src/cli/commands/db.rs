use anyhow::Context;
use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::database::{DatabaseManager, SchemaInit};

/// Idempotent schema initialization against `DATABASE_URL`.
pub async fn init(config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let manager = DatabaseManager::connect_lazy(&config.database)?;
    manager
        .health_check()
        .await
        .context("database is not reachable")?;

    let outcome = manager.initialize_schema(&config.directory).await?;
    manager.close().await;

    let message = match outcome {
        SchemaInit::Created => "Schema created and seeded",
        SchemaInit::AlreadyPresent => "Schema already present, nothing to do",
    };

    output_success(
        &output_format,
        message,
        Some(json!({ "admin": config.directory.admin_email })),
    )
}
