//! Notification delivery.
//!
//! Exactly one backend handles a submission:
//!
//! ```text
//! binding configured?  → Binding  (raw MIME → MailBinding)
//! API key configured?  → ApiKey   (JSON → Resend /emails)
//! neither              → "No delivery mechanism available"
//! ```

pub mod binding;
pub mod resend;

use std::sync::Arc;

use tracing::{info, warn};

use crate::compose::compose_message;
use crate::error::{Outcome, Rejection};
use crate::form::{SubmittedForm, SUBJECT_FIELD, TURNSTILE_FIELD};

pub use binding::{build_raw_email, send_via_binding, MailBinding, RawEmail, RelaySecurity, SmtpRelayBinding};
pub use resend::ResendClient;

/// Longest subject taken from a submission.
pub const MAX_SUBJECT_CHARS: usize = 80;

/// A message ready to hand to a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedMessage {
    pub sender_name: String,
    pub from_email: String,
    pub to_email: String,
    pub subject: String,
    pub html: String,
    pub reply_to: Option<String>,
}

impl ComposedMessage {
    /// `Name <address>` form of the sender.
    pub fn from_header(&self) -> String {
        format!("{} <{}>", self.sender_name, self.from_email)
    }
}

/// Addresses and subject policy for outgoing notifications.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub from_email: String,
    pub to_email: String,
    pub sender_name: String,
    pub default_subject: String,
    /// Drop a subject of at most [`MAX_SUBJECT_CHARS`] from the body, since
    /// the Subject header already carries it verbatim.
    pub strip_short_subject: bool,
}

/// The two interchangeable delivery mechanisms.
#[derive(Clone)]
pub enum DeliveryBackend {
    /// Platform send operation fed with raw MIME
    Binding(Arc<dyn MailBinding>),
    /// HTTP email API authenticated with an API key
    ApiKey(ResendClient),
}

impl DeliveryBackend {
    /// Pick the active backend: the binding wins over the API key.
    pub fn select(
        binding: Option<Arc<dyn MailBinding>>,
        api: Option<ResendClient>,
    ) -> Option<Self> {
        binding
            .map(DeliveryBackend::Binding)
            .or_else(|| api.map(DeliveryBackend::ApiKey))
    }

    pub fn name(&self) -> &'static str {
        match self {
            DeliveryBackend::Binding(_) => "binding",
            DeliveryBackend::ApiKey(_) => "api_key",
        }
    }

    pub async fn send(&self, message: &ComposedMessage) -> Outcome {
        match self {
            DeliveryBackend::Binding(binding) => send_via_binding(binding.as_ref(), message).await,
            DeliveryBackend::ApiKey(client) => client.send(message).await,
        }
    }
}

/// Composes and sends notifications through the configured backend.
#[derive(Clone)]
pub struct Dispatcher {
    config: DeliveryConfig,
    backend: Option<DeliveryBackend>,
}

impl Dispatcher {
    pub fn new(config: DeliveryConfig, backend: Option<DeliveryBackend>) -> Self {
        Self { config, backend }
    }

    pub fn backend_name(&self) -> Option<&'static str> {
        self.backend.as_ref().map(DeliveryBackend::name)
    }

    /// Deliver a notification for `form`.
    ///
    /// `subject` is truncated to [`MAX_SUBJECT_CHARS`]; when absent or blank
    /// the configured default subject is used.
    pub async fn deliver(
        &self,
        form: &SubmittedForm,
        reply_to: Option<&str>,
        subject: Option<&str>,
    ) -> Outcome {
        let Some(backend) = &self.backend else {
            warn!("delivery_not_configured");
            return Err(Rejection::NoDeliveryMechanism);
        };

        let subject = subject.map(str::trim).filter(|s| !s.is_empty());
        let short_subject = subject.is_some_and(|s| s.chars().count() <= MAX_SUBJECT_CHARS);

        let body_form = if self.config.strip_short_subject && short_subject {
            form.without(&[TURNSTILE_FIELD, SUBJECT_FIELD])
        } else {
            form.without(&[TURNSTILE_FIELD])
        };

        let reply_to = reply_to.map(str::trim).filter(|r| !r.is_empty());
        let message = ComposedMessage {
            sender_name: self.config.sender_name.clone(),
            from_email: self.config.from_email.clone(),
            to_email: self.config.to_email.clone(),
            subject: match subject {
                Some(s) => s.chars().take(MAX_SUBJECT_CHARS).collect(),
                None => self.config.default_subject.clone(),
            },
            html: compose_message(&body_form, reply_to),
            reply_to: reply_to.map(str::to_string),
        };

        info!(
            backend = backend.name(),
            field_count = body_form.len(),
            html_length = message.html.len(),
            has_reply_to = message.reply_to.is_some(),
            "delivery_start"
        );

        let outcome = backend.send(&message).await;
        match &outcome {
            Ok(()) => info!(backend = backend.name(), "delivery_complete"),
            Err(e) => warn!(backend = backend.name(), reason = %e, "delivery_failed"),
        }
        outcome
    }
}
