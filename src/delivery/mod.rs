use anyhow::Context;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::path::Path;

use crate::config::{MailConfig, APP_PASSWORD_ENV, SENDER_EMAIL_ENV};
use crate::{MashupError, Result};

/// Sender identity and application password for the relay
#[derive(Clone)]
pub struct MailCredentials {
    sender: String,
    password: String,
}

impl std::fmt::Debug for MailCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailCredentials")
            .field("sender", &self.sender)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl MailCredentials {
    pub fn new(sender: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            password: password.into(),
        }
    }

    /// Read credentials from the process environment
    pub fn from_env() -> std::result::Result<Self, MashupError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> std::result::Result<Self, MashupError> {
        let read = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(MashupError::MissingCredentials(key))
        };

        Ok(Self {
            sender: read(SENDER_EMAIL_ENV)?,
            password: read(APP_PASSWORD_ENV)?,
        })
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }
}

/// Build the message carrying `archive` to `recipient`
pub fn build_message(
    config: &MailConfig,
    credentials: &MailCredentials,
    recipient: &str,
    archive: &Path,
) -> Result<Message> {
    let from: Mailbox = credentials
        .sender
        .parse()
        .with_context(|| format!("Invalid sender address: {}", credentials.sender))?;
    let to: Mailbox = recipient
        .parse()
        .with_context(|| format!("Invalid recipient address: {}", recipient))?;

    let filename = archive
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("mashup_result.zip")
        .to_string();

    let content = fs_err::read(archive)
        .with_context(|| format!("Failed to read archive {}", archive.display()))?;

    let content_type = ContentType::parse("application/zip")
        .map_err(|e| anyhow::anyhow!("Invalid attachment content type: {:?}", e))?;

    let message = Message::builder()
        .from(from)
        .to(to)
        .subject(config.subject.as_str())
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(config.body.clone()))
                .singlepart(Attachment::new(filename).body(content, content_type)),
        )
        .context("Failed to build message")?;

    Ok(message)
}

/// Mail `archive` to `recipient` through the configured relay.
///
/// Credentials are read from the environment here, not at startup.
pub async fn deliver(config: &MailConfig, recipient: &str, archive: &Path) -> Result<()> {
    let credentials = MailCredentials::from_env()?;
    deliver_with(config, &credentials, recipient, archive).await
}

pub async fn deliver_with(
    config: &MailConfig,
    credentials: &MailCredentials,
    recipient: &str,
    archive: &Path,
) -> Result<()> {
    let message = build_message(config, credentials, recipient, archive)
        .map_err(|e| MashupError::DeliveryFailed(format!("{:#}", e)))?;

    let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
        .map_err(|e| MashupError::DeliveryFailed(format!("relay {}: {}", config.smtp_host, e)))?
        .port(config.smtp_port)
        .credentials(Credentials::new(
            credentials.sender.clone(),
            credentials.password.clone(),
        ))
        .build();

    tracing::info!(
        "Sending {} to {} via {}:{}",
        archive.display(),
        recipient,
        config.smtp_host,
        config.smtp_port
    );

    transport
        .send(message)
        .await
        .map_err(|e| MashupError::DeliveryFailed(e.to_string()))?;

    tracing::info!("Delivered mashup to {}", recipient);
    Ok(())
}
