use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

use crate::config::IdentityConfig;

/// Outcome of a credential check against the institutional API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UgVerdict {
    Valid,
    Invalid { message: String },
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Identity API did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Identity API unreachable: {0}")]
    Unreachable(String),

    #[error("Identity API reply has no valid id")]
    UnexpectedReply(Value),

    #[error("Identity client setup failed: {0}")]
    Setup(String),
}

/// External credential validation. Password checks never happen locally.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn validate_credentials(&self, login: &str, password: &str) -> Result<UgVerdict, IdentityError>;
}

/// HTTP client for the UG institutional account API.
pub struct UgIdentityClient {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl UgIdentityClient {
    pub fn new(config: &IdentityConfig) -> Result<Self, IdentityError> {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        Self::with_timeout(&config.ug_auth_url, timeout)
    }

    pub fn with_timeout(url: &str, timeout: Duration) -> Result<Self, IdentityError> {
        url::Url::parse(url).map_err(|e| IdentityError::Setup(format!("invalid UG_AUTH_URL: {}", e)))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0")
            .build()
            .map_err(|e| IdentityError::Setup(e.to_string()))?;

        Ok(Self {
            client,
            url: url.to_string(),
            timeout,
        })
    }
}

#[async_trait]
impl IdentityProvider for UgIdentityClient {
    async fn validate_credentials(&self, login: &str, password: &str) -> Result<UgVerdict, IdentityError> {
        let response = self
            .client
            .post(&self.url)
            .form(&[("usuario", login), ("clave", password)])
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;
        let payload = serde_json::from_str::<Value>(&text)
            .unwrap_or_else(|_| json!({ "status": status.as_u16(), "text": text }));

        let (id, message) = parse_ug_reply(&payload);
        match id {
            Some(0) => Ok(UgVerdict::Invalid {
                message: message.unwrap_or_else(|| "CREDENCIALES ERRADAS".to_string()),
            }),
            Some(1) => Ok(UgVerdict::Valid),
            _ => {
                tracing::warn!("Identity API replied {} without a usable id", status);
                Err(IdentityError::UnexpectedReply(payload))
            }
        }
    }
}

impl UgIdentityClient {
    fn transport_error(&self, err: reqwest::Error) -> IdentityError {
        if err.is_timeout() {
            IdentityError::Timeout(self.timeout)
        } else {
            IdentityError::Unreachable(err.to_string())
        }
    }
}

/// Extracts `(id, mensaje)` from either `{id, mensaje}` or `{ug: {id, mensaje}}`.
/// The id may arrive as a number or a numeric string.
pub fn parse_ug_reply(payload: &Value) -> (Option<i64>, Option<String>) {
    let node = match payload.get("ug") {
        Some(inner) if inner.is_object() => inner,
        _ => payload,
    };
    if !node.is_object() {
        return (None, None);
    }

    let id = match node.get("id") {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    let message = node.get("mensaje").and_then(Value::as_str).map(str::to_string);

    (id, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flat_and_nested_replies() {
        assert_eq!(
            parse_ug_reply(&json!({"id": 1, "mensaje": "OK"})),
            (Some(1), Some("OK".to_string()))
        );
        assert_eq!(
            parse_ug_reply(&json!({"ug": {"id": " 0 ", "mensaje": "CREDENCIALES ERRADAS"}})),
            (Some(0), Some("CREDENCIALES ERRADAS".to_string()))
        );
    }

    #[test]
    fn non_numeric_or_missing_ids_are_none() {
        assert_eq!(parse_ug_reply(&json!({"id": "abc"})).0, None);
        assert_eq!(parse_ug_reply(&json!({"status": 500, "text": "boom"})).0, None);
        assert_eq!(parse_ug_reply(&json!([1, 2])), (None, None));
    }

    #[test]
    fn rejects_invalid_url() {
        assert!(matches!(
            UgIdentityClient::with_timeout("not a url", Duration::from_secs(1)),
            Err(IdentityError::Setup(_))
        ));
    }
}
