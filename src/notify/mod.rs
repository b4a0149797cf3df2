//! Notification gateway.
//!
//! Callers build a validated [`Email`] and hand it to a [`MailGateway`].
//! Delivery is best-effort: a failure is reported once and never retried.

pub mod graph;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use graph::GraphMailer;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("At least one recipient is required")]
    NoRecipients,

    #[error("Recipients must be a list or a ';'-separated string")]
    InvalidRecipients,

    #[error("Email body cannot be empty")]
    EmptyBody,

    #[error("Mail gateway is not configured")]
    NotConfigured,

    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),
}

impl MailError {
    /// True for errors caused by the caller's input rather than the gateway.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            MailError::NoRecipients | MailError::InvalidRecipients | MailError::EmptyBody
        )
    }
}

/// A validated outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: Vec<String>,
    pub subject: String,
    pub html_body: String,
}

impl Email {
    pub fn new(
        to: Vec<String>,
        subject: impl Into<String>,
        html_body: impl Into<String>,
    ) -> Result<Self, MailError> {
        let to: Vec<String> = to
            .into_iter()
            .map(|address| address.trim().to_string())
            .filter(|address| !address.is_empty())
            .collect();
        if to.is_empty() {
            return Err(MailError::NoRecipients);
        }

        let html_body = html_body.into();
        if html_body.trim().is_empty() {
            return Err(MailError::EmptyBody);
        }

        Ok(Self {
            to,
            subject: subject.into(),
            html_body,
        })
    }
}

/// Accepts `["a@x", "b@x"]` or `"a@x; b@x"`. Blank entries are dropped.
pub fn parse_recipients(value: &Value) -> Result<Vec<String>, MailError> {
    let list: Vec<String> = match value {
        Value::String(s) => s.split(';').map(|part| part.trim().to_string()).collect(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            })
            .collect(),
        Value::Null => Vec::new(),
        _ => return Err(MailError::InvalidRecipients),
    };

    Ok(list.into_iter().filter(|address| !address.is_empty()).collect())
}

#[async_trait]
pub trait MailGateway: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

/// Gateway used when no mail credentials are configured.
pub struct UnconfiguredMailer;

#[async_trait]
impl MailGateway for UnconfiguredMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        tracing::warn!("Dropping email '{}' to {} recipients: mail gateway not configured", email.subject, email.to.len());
        Err(MailError::NotConfigured)
    }
}

/// Sends once; any gateway error becomes a single `DeliveryFailed`.
pub async fn deliver(gateway: &dyn MailGateway, email: &Email) -> Result<(), MailError> {
    match gateway.send(email).await {
        Ok(()) => {
            tracing::info!("Email '{}' sent to {} recipients", email.subject, email.to.len());
            Ok(())
        }
        Err(MailError::DeliveryFailed(reason)) => {
            tracing::error!("Email delivery failed: {}", reason);
            Err(MailError::DeliveryFailed(reason))
        }
        Err(other) => {
            tracing::error!("Email delivery failed: {}", other);
            Err(MailError::DeliveryFailed(other.to_string()))
        }
    }
}
