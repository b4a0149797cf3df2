use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{Email, MailError, MailGateway};
use crate::config::MailConfig;

const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";
const GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0/users";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Microsoft Graph `sendMail` with OAuth2 client credentials.
pub struct GraphMailer {
    client: reqwest::Client,
    tenant_id: String,
    client_id: String,
    client_secret: String,
    sender: String,
}

impl GraphMailer {
    /// `None` unless client id, secret and sender are all configured.
    pub fn from_config(config: &MailConfig) -> Option<Self> {
        let client_id = config.client_id.clone().filter(|v| !v.is_empty())?;
        let client_secret = config.client_secret.clone().filter(|v| !v.is_empty())?;
        let sender = config.sender.clone().filter(|v| !v.is_empty())?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .ok()?;

        Some(Self {
            client,
            tenant_id: config.tenant_id.clone(),
            client_id,
            client_secret,
            sender,
        })
    }

    async fn access_token(&self) -> Result<String, MailError> {
        let token_url = format!(
            "https://login.microsoftonline.com/{}/oauth2/v2.0/token",
            self.tenant_id
        );

        let response = self
            .client
            .post(&token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", GRAPH_SCOPE),
            ])
            .send()
            .await
            .map_err(|e| MailError::DeliveryFailed(format!("token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::DeliveryFailed(format!(
                "token request rejected: {} - {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| MailError::DeliveryFailed(format!("malformed token response: {}", e)))?;
        Ok(token.access_token)
    }

    fn send_mail_url(&self) -> Result<url::Url, MailError> {
        let mut url = url::Url::parse(GRAPH_BASE)
            .map_err(|e| MailError::DeliveryFailed(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| MailError::DeliveryFailed("invalid Graph base URL".to_string()))?
            .push(&self.sender)
            .push("sendMail");
        Ok(url)
    }
}

#[async_trait]
impl MailGateway for GraphMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        let access_token = self.access_token().await?;

        let recipients: Vec<_> = email
            .to
            .iter()
            .map(|address| json!({ "emailAddress": { "address": address } }))
            .collect();
        let payload = json!({
            "message": {
                "subject": email.subject,
                "body": { "contentType": "HTML", "content": email.html_body },
                "toRecipients": recipients,
            },
            "saveToSentItems": true,
        });

        let response = self
            .client
            .post(self.send_mail_url()?)
            .bearer_auth(access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| MailError::DeliveryFailed(e.to_string()))?;

        if response.status() != StatusCode::ACCEPTED {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::DeliveryFailed(format!("{} - {}", status, body)));
        }

        Ok(())
    }
}
