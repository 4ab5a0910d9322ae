use std::time::Duration;

use log::{debug, warn};
use reqwest::Client;
use serde::Serialize;
use tokio::time::{sleep, timeout};

use super::{ContactNotification, Mailer, MailerError, PasswordResetMail};

const MAIL_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAIL_MAX_RETRIES: usize = 3;
const MAIL_RETRY_BACKOFF_MS: u64 = 500;
const MAIL_RETRY_BACKOFF_FACTOR: u64 = 2;

/// Posts each message as JSON to an HTTP mail relay.
#[derive(Debug, Clone)]
pub struct WebhookMailer {
    base_url: String,
    http: Client,
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    kind: &'static str,
    payload: &'a T,
}

impl WebhookMailer {
    pub fn new(base_url: impl Into<String>, http: Client) -> Self {
        let base = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url: base,
            http,
        }
    }

    async fn deliver<T: Serialize + Sync>(
        &self,
        kind: &'static str,
        payload: &T,
    ) -> Result<(), MailerError> {
        let mut backoff_ms = MAIL_RETRY_BACKOFF_MS;
        for attempt in 1..=MAIL_MAX_RETRIES {
            debug!(
                "mailer: dispatching {} (attempt {} of {})",
                kind, attempt, MAIL_MAX_RETRIES
            );

            match timeout(MAIL_REQUEST_TIMEOUT, self.dispatch(kind, payload)).await {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(err)) => {
                    warn!("mailer: {} attempt {} failed: {}", kind, attempt, err);
                    if attempt == MAIL_MAX_RETRIES {
                        return Err(err);
                    }
                }
                Err(_) => {
                    warn!(
                        "mailer: {} attempt {} timed out after {:?}",
                        kind, attempt, MAIL_REQUEST_TIMEOUT
                    );
                    if attempt == MAIL_MAX_RETRIES {
                        return Err(MailerError::Timeout);
                    }
                }
            }

            sleep(Duration::from_millis(backoff_ms)).await;
            backoff_ms = backoff_ms.saturating_mul(MAIL_RETRY_BACKOFF_FACTOR);
        }

        Err(MailerError::Timeout)
    }

    async fn dispatch<T: Serialize + Sync>(
        &self,
        kind: &'static str,
        payload: &T,
    ) -> Result<(), MailerError> {
        let url = format!("{}/messages", self.base_url);
        let response = self
            .http
            .post(url)
            .json(&Envelope { kind, payload })
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "failed to read error body".to_string());
        Err(MailerError::Status { status, body })
    }
}

#[rocket::async_trait]
impl Mailer for WebhookMailer {
    async fn send_password_reset(&self, mail: &PasswordResetMail) -> Result<(), MailerError> {
        self.deliver("password_reset", mail).await
    }

    async fn send_contact_notification(
        &self,
        notification: &ContactNotification,
    ) -> Result<(), MailerError> {
        self.deliver("contact_notification", notification).await
    }
}
