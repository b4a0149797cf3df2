use serde_json::json;

use crate::auth::issue_session_token;
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::AppConfig;

/// Mint a session token without going through the UG API.
///
/// The token only names the login; the server still resolves role and faculty
/// from the directory, so an unknown login gets 401 when it is used.
pub async fn handle(config: &AppConfig, login: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let login = login.trim();
    anyhow::ensure!(!login.is_empty(), "login cannot be empty");

    let token = issue_session_token(&config.security, login)?;

    output_success(
        &output_format,
        &format!("Session token for {}", login),
        Some(json!({
            "token": token,
            "expires_in_hours": config.security.jwt_expiry_hours,
        })),
    )
}
