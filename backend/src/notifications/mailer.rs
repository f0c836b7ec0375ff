//! Outbound email transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("mail relay unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("mail relay timed out")]
    Timeout,

    #[error("mail relay rejected message ({status}): {detail}")]
    Rejected { status: u16, detail: String },
}

impl DeliveryError {
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(e)
        }
    }
}

/// Accepts one message for delivery, or fails.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), DeliveryError>;
}

/// Development mailer: writes the message to the log and reports success.
#[derive(Clone, Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), DeliveryError> {
        info!(
            to = %email.to,
            subject = %email.subject,
            body = %email.body,
            "email (log only)"
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct RelayPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

/// Posts each message as JSON to an HTTP mail relay.
#[derive(Clone)]
pub struct HttpRelayMailer {
    http: Client,
    url: String,
    from: String,
}

impl HttpRelayMailer {
    pub fn new(url: String, from: String, timeout: Duration) -> Result<Self, DeliveryError> {
        let http = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { http, url, from })
    }
}

#[async_trait]
impl Mailer for HttpRelayMailer {
    #[instrument(skip(self, email), fields(to = %email.to), level = "debug")]
    async fn send(&self, email: &OutgoingEmail) -> Result<(), DeliveryError> {
        let payload = RelayPayload {
            from: &self.from,
            to: &email.to,
            subject: &email.subject,
            text: &email.body,
        };

        let resp = self
            .http
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(DeliveryError::from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                detail,
            });
        }

        debug!(status = status.as_u16(), "relay accepted message");
        Ok(())
    }
}
