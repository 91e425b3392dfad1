use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::EmailConfig;
use crate::{AppError, Result};

use super::NotifyChannel;

/// SMTP alert channel. Implicit TLS (the 465 style QQ mail expects) or
/// STARTTLS, selected by configuration.
pub struct EmailChannel {
    config: EmailConfig,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailChannel {
    pub fn new(config: EmailConfig) -> Result<Self> {
        let builder = if config.use_ssl {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_server)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_server)
        }
        .map_err(|e| AppError::Notification(format!("smtp transport: {e}")))?;

        let transport = builder
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.sender.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self { config, transport })
    }

    fn build_email(&self, title: &str, body: &str) -> Result<Message> {
        let from: Mailbox = self
            .config
            .sender
            .parse()
            .map_err(|e| AppError::Notification(format!("bad sender address: {e}")))?;

        let mut builder = Message::builder()
            .from(from)
            .subject(title)
            .header(ContentType::TEXT_PLAIN);
        for receiver in &self.config.receivers {
            let to: Mailbox = receiver
                .parse()
                .map_err(|e| AppError::Notification(format!("bad receiver address: {e}")))?;
            builder = builder.to(to);
        }

        builder
            .body(body.to_string())
            .map_err(|e| AppError::Notification(format!("building email: {e}")))
    }
}

#[async_trait]
impl NotifyChannel for EmailChannel {
    fn name(&self) -> &str {
        "email"
    }

    async fn send(&self, title: &str, body: &str) -> Result<()> {
        let email = self.build_email(title, body)?;
        self.transport
            .send(email)
            .await
            .map_err(|e| AppError::Notification(format!("smtp send: {e}")))?;
        Ok(())
    }
}
