//! Outbound mail collaborator.
//!
//! The auth core only hands a message to a [`Mailer`]. Reset mails are sent
//! from a background task; their failures are logged and never change the
//! response of the reset flow.

pub mod webhook;

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub use webhook::WebhookMailer;

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("mail relay HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("mail relay returned status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("mail relay timed out")]
    Timeout,
}

/// Why a reset token was issued; selects the mail template downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetPurpose {
    ForgotPassword,
    AccountSetup,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetMail {
    pub account_id: Uuid,
    pub username: String,
    pub email: String,
    pub token: String,
    pub reset_url: String,
    pub purpose: ResetPurpose,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactNotification {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: String,
    pub property_id: Option<String>,
    pub recipient: String,
}

#[rocket::async_trait]
pub trait Mailer: Send + Sync {
    async fn send_password_reset(&self, mail: &PasswordResetMail) -> Result<(), MailerError>;

    async fn send_contact_notification(
        &self,
        notification: &ContactNotification,
    ) -> Result<(), MailerError>;
}

/// Mail settings loaded from the environment.
#[derive(Debug, Clone)]
pub struct MailerConfig {
    pub webhook_url: Option<String>,
    pub contact_inbox: String,
}

impl MailerConfig {
    pub fn from_env() -> Self {
        Self {
            webhook_url: std::env::var("ESTATE_MAIL_WEBHOOK_URL")
                .ok()
                .filter(|value| !value.trim().is_empty()),
            contact_inbox: std::env::var("ESTATE_CONTACT_INBOX")
                .unwrap_or_else(|_| "contact@localhost".into()),
        }
    }

    pub fn build(&self) -> Arc<dyn Mailer> {
        match &self.webhook_url {
            Some(url) => Arc::new(WebhookMailer::new(url.clone(), reqwest::Client::new())),
            None => {
                log::warn!("mailer: ESTATE_MAIL_WEBHOOK_URL not set, outbound mail is only logged");
                Arc::new(LogMailer)
            }
        }
    }
}

/// Logs every message instead of delivering it. Tokens are never logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[rocket::async_trait]
impl Mailer for LogMailer {
    async fn send_password_reset(&self, mail: &PasswordResetMail) -> Result<(), MailerError> {
        log::info!(
            "mailer: {:?} mail queued for account {} <{}>",
            mail.purpose,
            mail.account_id,
            mail.email
        );
        Ok(())
    }

    async fn send_contact_notification(
        &self,
        notification: &ContactNotification,
    ) -> Result<(), MailerError> {
        log::info!(
            "mailer: contact notification from <{}> for {} (property {:?})",
            notification.email,
            notification.recipient,
            notification.property_id
        );
        Ok(())
    }
}

const DELIVERY_WAIT: Duration = Duration::from_secs(5);
const DELIVERY_POLL: Duration = Duration::from_millis(5);

/// Keeps every message in memory; used by tests to read issued tokens.
#[derive(Debug, Clone, Default)]
pub struct RecordingMailer {
    resets: Arc<Mutex<Vec<PasswordResetMail>>>,
    contacts: Arc<Mutex<Vec<ContactNotification>>>,
    fail: bool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer that records nothing and fails every delivery.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn resets(&self) -> Vec<PasswordResetMail> {
        self.resets.lock().clone()
    }

    /// Reset mails are delivered in the background. Block until `count` have
    /// arrived or the wait runs out, then return what was recorded.
    pub fn wait_for_resets(&self, count: usize) -> Vec<PasswordResetMail> {
        let deadline = Instant::now() + DELIVERY_WAIT;
        loop {
            let resets = self.resets();
            if resets.len() >= count || Instant::now() >= deadline {
                return resets;
            }
            std::thread::sleep(DELIVERY_POLL);
        }
    }

    /// Async counterpart of [`RecordingMailer::wait_for_resets`].
    pub async fn delivered_resets(&self, count: usize) -> Vec<PasswordResetMail> {
        let deadline = Instant::now() + DELIVERY_WAIT;
        loop {
            let resets = self.resets();
            if resets.len() >= count || Instant::now() >= deadline {
                return resets;
            }
            tokio::time::sleep(DELIVERY_POLL).await;
        }
    }

    pub fn contacts(&self) -> Vec<ContactNotification> {
        self.contacts.lock().clone()
    }
}

#[rocket::async_trait]
impl Mailer for RecordingMailer {
    async fn send_password_reset(&self, mail: &PasswordResetMail) -> Result<(), MailerError> {
        if self.fail {
            return Err(MailerError::Timeout);
        }
        self.resets.lock().push(mail.clone());
        Ok(())
    }

    async fn send_contact_notification(
        &self,
        notification: &ContactNotification,
    ) -> Result<(), MailerError> {
        if self.fail {
            return Err(MailerError::Timeout);
        }
        self.contacts.lock().push(notification.clone());
        Ok(())
    }
}
