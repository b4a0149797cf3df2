// handlers/protected/email.rs - POST /send-email handler

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::identity::Identity;
use crate::middleware::{ApiResponse, ApiResult};
use crate::notify::{self, parse_recipients, Email};
use crate::policy::{enforce, Action};

use super::utils::json_body;

/// POST /send-email - Send one HTML notification
///
/// ```json
/// { "to": ["a@ug.edu.ec", "b@ug.edu.ec"], "subject": "Seguimiento", "body": "<p>...</p>" }
/// ```
///
/// `to` may also be a `;`-separated string. `subject` defaults to the
/// configured subject. Delivery is attempted once.
pub async fn send(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    enforce(&identity, Action::SendEmail, None)?;
    let body = json_body(payload)?;

    let recipients = parse_recipients(body.get("to").unwrap_or(&Value::Null))?;
    let subject = body
        .get("subject")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(&state.config.mail.default_subject);
    let html_body = body.get("body").and_then(Value::as_str).unwrap_or_default();

    let email = Email::new(recipients, subject, html_body)?;
    notify::deliver(state.mailer.as_ref(), &email).await?;

    tracing::info!(login = %identity.login, recipients = email.to.len(), "notification sent");
    Ok(ApiResponse::success(json!({
        "message": "Email sent",
        "destinatarios": email.to.len(),
    })))
}
