//! FormMail - web form to email relay.
//!
//! Accepts form submissions over HTTP, validates them, optionally checks a
//! Cloudflare Turnstile token and sends a notification email through either
//! an SMTP relay (raw MIME) or the Resend API.
//!
//! ## Pipeline
//!
//! ```text
//! Request → limits → email syntax → Turnstile → compose → deliver → Response
//! ```

pub mod compose;
pub mod config;
pub mod delivery;
pub mod error;
pub mod form;
pub mod sanitize;
pub mod turnstile;
pub mod validate;
pub mod web;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use compose::compose_message;
pub use config::Config;
pub use delivery::{ComposedMessage, DeliveryBackend, DeliveryConfig, Dispatcher, MailBinding};
pub use error::{AppError, Outcome, Rejection};
pub use form::SubmittedForm;
pub use sanitize::text_to_html;
pub use turnstile::TurnstileVerifier;
pub use validate::{is_valid_email, FormLimits};
pub use web::{router, AppState};
