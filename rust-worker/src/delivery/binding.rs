//! Binding-based delivery: raw MIME handed to a platform send operation.
//!
//! The message is rendered to RFC 5322 bytes here and passed to a
//! [`MailBinding`]. On a host with a mail relay the binding is
//! [`SmtpRelayBinding`], which injects the bytes unchanged.

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::{
    address::Envelope,
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{info, warn};

use super::ComposedMessage;
use crate::error::{Outcome, Rejection};

/// A fully rendered message ready for injection.
#[derive(Debug, Clone)]
pub struct RawEmail {
    /// Envelope sender
    pub from: String,
    /// Envelope recipient
    pub to: String,
    /// RFC 5322 message bytes
    pub raw: Vec<u8>,
}

/// Platform send operation for raw messages.
#[async_trait]
pub trait MailBinding: Send + Sync {
    async fn send(&self, email: RawEmail) -> Result<()>;
}

/// Render `message` as a MIME message with an HTML body.
pub fn build_raw_email(message: &ComposedMessage) -> Result<RawEmail> {
    let from_address: Address = message
        .from_email
        .parse()
        .context("Invalid sender address")?;
    let to: Mailbox = message
        .to_email
        .parse()
        .context("Invalid recipient address")?;

    let mut builder = Message::builder()
        .from(Mailbox::new(Some(message.sender_name.clone()), from_address))
        .to(to)
        .subject(message.subject.clone());

    if let Some(reply_to) = &message.reply_to {
        let reply_to: Mailbox = reply_to.parse().context("Invalid reply-to address")?;
        builder = builder.reply_to(reply_to);
    }

    let email = builder
        .header(ContentType::TEXT_HTML)
        .body(message.html.clone())
        .context("Failed to build email message")?;

    Ok(RawEmail {
        from: message.from_email.clone(),
        to: message.to_email.clone(),
        raw: email.formatted(),
    })
}

/// Build the MIME message and hand it to `binding`.
///
/// Build and send errors both come back as [`Rejection::DeliveryFailed`].
pub async fn send_via_binding(binding: &dyn MailBinding, message: &ComposedMessage) -> Outcome {
    let raw = build_raw_email(message).map_err(|e| {
        warn!(error = %format!("{:#}", e), "binding_message_build_failed");
        Rejection::DeliveryFailed(format!("{:#}", e))
    })?;

    let raw_length = raw.raw.len();
    match binding.send(raw).await {
        Ok(()) => {
            info!(raw_length = raw_length, "binding_send_complete");
            Ok(())
        }
        Err(e) => {
            warn!(error = %format!("{:#}", e), "binding_send_failed");
            Err(Rejection::DeliveryFailed(format!("{:#}", e)))
        }
    }
}

/// How the relay connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelaySecurity {
    /// Cleartext; only used when no credentials are configured.
    Plain,
    /// STARTTLS upgrade required before authenticating.
    StartTls,
}

/// Injects raw messages into an SMTP relay.
pub struct SmtpRelayBinding {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    security: RelaySecurity,
}

impl SmtpRelayBinding {
    /// Connection to `host:port`.
    ///
    /// With credentials the connection must upgrade via STARTTLS before
    /// authenticating. Without credentials it stays plain.
    pub fn new(host: &str, port: u16, credentials: Option<(String, String)>) -> Result<Self> {
        let (transport, security) = match credentials {
            Some((username, password)) => {
                let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                    .context("Failed to configure STARTTLS for mail relay")?
                    .port(port)
                    .credentials(Credentials::new(username, password))
                    .build();
                (transport, RelaySecurity::StartTls)
            }
            None => {
                let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
                    .port(port)
                    .build();
                (transport, RelaySecurity::Plain)
            }
        };

        info!(host = %host, port = port, security = ?security, "mail_relay_configured");

        Ok(Self { transport, security })
    }

    pub fn security(&self) -> RelaySecurity {
        self.security
    }
}

#[async_trait]
impl MailBinding for SmtpRelayBinding {
    async fn send(&self, email: RawEmail) -> Result<()> {
        let from: Address = email.from.parse().context("Invalid envelope sender")?;
        let to: Address = email.to.parse().context("Invalid envelope recipient")?;
        let envelope = Envelope::new(Some(from), vec![to]).context("Invalid envelope")?;

        self.transport
            .send_raw(&envelope, &email.raw)
            .await
            .context("Mail relay rejected the message")?;

        Ok(())
    }
}
