//! Outbound alert delivery.

use anyhow::{Context, Result};
use async_trait::async_trait;
use orderwatch_config::NotifierConfig;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

const ERROR_BODY_MAX_CHARS: usize = 256;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NotifierError {
    #[error("notifier API key is not configured")]
    NotConfigured,

    #[error("notifier request failed: {0}")]
    Transport(String),

    #[error("notifier rejected message with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Capability to deliver one formatted message. The caller owns all formatting.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), NotifierError>;
}

#[derive(Debug, Serialize)]
struct EmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

/// Sends HTML email through the Resend `POST /emails` API.
#[derive(Debug, Clone)]
pub struct ResendNotifier {
    http: Client,
    endpoint: String,
    api_key: String,
    from_address: String,
}

impl ResendNotifier {
    pub fn from_config(config: &NotifierConfig, from_address: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms.max(500)))
            .build()
            .context("failed to build notifier http client")?;
        Ok(Self {
            http,
            endpoint: format!("{}/emails", config.api_base_url.trim().trim_end_matches('/')),
            api_key: config.api_key.trim().to_string(),
            from_address: from_address.trim().to_string(),
        })
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

#[async_trait]
impl Notifier for ResendNotifier {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), NotifierError> {
        if !self.is_configured() {
            return Err(NotifierError::NotConfigured);
        }
        let payload = EmailRequest {
            from: &self.from_address,
            to,
            subject,
            html,
        };
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|error| NotifierError::Transport(error.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body = truncate_error_body(&body);
            warn!(status = status.as_u16(), body = %body, "notifier rejected message");
            return Err(NotifierError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        debug!(status = status.as_u16(), subject, "notifier accepted message");
        Ok(())
    }
}

fn truncate_error_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= ERROR_BODY_MAX_CHARS {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(ERROR_BODY_MAX_CHARS).collect();
    out.push_str("...");
    out
}
