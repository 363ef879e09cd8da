//! services/api/src/adapters/mailer.rs
//!
//! Outbound mail adapters implementing the `Mailer` port: SMTP delivery through
//! `lettre`, and a logging sender for local runs without a mail server.

use accounts_core::ports::{Mailer, PortError, PortResult};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, info};

use crate::config::SmtpConfig;

//=========================================================================================
// SMTP
//=========================================================================================

/// Sends plain-text mail through an SMTP relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
    server: String,
}

impl SmtpMailer {
    /// Builds the transport. No connection is opened until the first send.
    pub fn new(config: &SmtpConfig) -> PortResult<Self> {
        let builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| PortError::Unexpected(format!("SMTP relay {}: {}", config.host, e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(config.host.as_str())
        };

        let mut builder = builder.port(config.port);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let sender = config
            .sender
            .parse::<Mailbox>()
            .map_err(|e| PortError::Unexpected(format!("invalid sender address {}: {}", config.sender, e)))?;

        Ok(Self {
            transport: builder.build(),
            sender,
            server: format!("{}:{}", config.host, config.port),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> PortResult<()> {
        let to = recipient
            .parse::<Mailbox>()
            .map_err(|e| PortError::Unexpected(format!("invalid recipient: {}", e)))?;

        let message = Message::builder()
            .from(self.sender.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| PortError::Unexpected(format!("build message: {}", e)))?;

        info!(server = %self.server, recipient, "send mail");
        self.transport
            .send(message)
            .await
            .map_err(|e| PortError::Unexpected(format!("send mail: {}", e)))?;
        Ok(())
    }
}

//=========================================================================================
// Logging
//=========================================================================================

/// Local dev sender that logs the message instead of sending real email.
///
/// The body (which carries single-use links) is only emitted at debug level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> PortResult<()> {
        info!(recipient, subject, "mail delivery disabled, message not sent");
        debug!(recipient, body, "undelivered mail body");
        Ok(())
    }
}
