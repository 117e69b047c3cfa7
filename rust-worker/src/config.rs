//! Configuration module for environment variable parsing.
//!
//! All settings come from environment variables; unset or unparseable values
//! fall back to defaults. Only the sender and recipient addresses are required.

use std::env;

use anyhow::{Context, Result};
use tracing::warn;

use crate::delivery::resend::DEFAULT_API_URL;
use crate::delivery::DeliveryConfig;
use crate::turnstile::DEFAULT_VERIFY_URL;
use crate::validate::{FormLimits, DEFAULT_MAX_FIELDS, DEFAULT_MAX_FIELD_CHARS, DEFAULT_MAX_TOTAL_CHARS};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Path accepting form submissions
    pub submit_path: String,

    /// Turnstile secret; verification is skipped when unset
    pub turnstile_secret_key: Option<String>,

    /// Turnstile siteverify endpoint
    pub turnstile_verify_url: String,

    /// Technical sender address
    pub from_email: String,

    /// Recipient of every notification
    pub to_email: String,

    /// Display name paired with `from_email`
    pub sender_name: String,

    /// Subject used when the submission has none
    pub default_subject: String,

    /// Remove short subjects from the body (see `DeliveryConfig`)
    pub strip_short_subject: bool,

    // =========================================================================
    // Delivery Backends
    // =========================================================================

    /// SMTP relay host for the binding backend
    pub mail_relay_host: Option<String>,

    /// SMTP relay port
    pub mail_relay_port: u16,

    /// Optional relay username
    pub mail_relay_username: Option<String>,

    /// Optional relay password
    pub mail_relay_password: Option<String>,

    /// Resend API key for the API backend
    pub resend_api_key: Option<String>,

    /// Resend API base URL
    pub resend_api_url: String,

    // =========================================================================
    // Limits
    // =========================================================================

    /// Field count and size policy
    pub limits: FormLimits,

    /// Timeout for outbound HTTP calls; none when unset
    pub request_timeout_ms: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            submit_path: "/api/contact".to_string(),
            turnstile_secret_key: None,
            turnstile_verify_url: DEFAULT_VERIFY_URL.to_string(),
            from_email: String::new(),
            to_email: String::new(),
            sender_name: "Contact Form".to_string(),
            default_subject: "New Form Submission".to_string(),
            strip_short_subject: false,
            mail_relay_host: None,
            mail_relay_port: 25,
            mail_relay_username: None,
            mail_relay_password: None,
            resend_api_key: None,
            resend_api_url: DEFAULT_API_URL.to_string(),
            limits: FormLimits::default(),
            request_timeout_ms: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        Ok(Config {
            port: parse_or("PORT", defaults.port),

            submit_path: non_empty("SUBMIT_PATH").unwrap_or(defaults.submit_path),

            turnstile_secret_key: non_empty("TURNSTILE_SECRET_KEY"),

            turnstile_verify_url: non_empty("TURNSTILE_VERIFY_URL")
                .unwrap_or(defaults.turnstile_verify_url),

            from_email: non_empty("FROM_EMAIL").context("FROM_EMAIL must be set")?,

            to_email: non_empty("TO_EMAIL").context("TO_EMAIL must be set")?,

            sender_name: non_empty("SENDER_NAME").unwrap_or(defaults.sender_name),

            default_subject: non_empty("DEFAULT_SUBJECT").unwrap_or(defaults.default_subject),

            strip_short_subject: parse_bool("STRIP_SHORT_SUBJECT", defaults.strip_short_subject),

            mail_relay_host: non_empty("MAIL_RELAY_HOST"),

            mail_relay_port: parse_or("MAIL_RELAY_PORT", defaults.mail_relay_port),

            mail_relay_username: non_empty("MAIL_RELAY_USERNAME"),

            mail_relay_password: non_empty("MAIL_RELAY_PASSWORD"),

            resend_api_key: non_empty("RESEND_API_KEY"),

            resend_api_url: non_empty("RESEND_API_URL").unwrap_or(defaults.resend_api_url),

            limits: FormLimits {
                max_field_chars: parse_or("MAX_FIELD_CHARS", DEFAULT_MAX_FIELD_CHARS),
                max_total_chars: parse_or("MAX_TOTAL_CHARS", DEFAULT_MAX_TOTAL_CHARS),
                max_fields: parse_or("MAX_FIELDS", DEFAULT_MAX_FIELDS),
            },

            request_timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok()),
        })
    }

    /// Addresses and subject policy for the dispatcher.
    pub fn delivery_config(&self) -> DeliveryConfig {
        DeliveryConfig {
            from_email: self.from_email.clone(),
            to_email: self.to_email.clone(),
            sender_name: self.sender_name.clone(),
            default_subject: self.default_subject.clone(),
            strip_short_subject: self.strip_short_subject,
        }
    }

    /// Relay credentials, only when both halves are set.
    pub fn mail_relay_credentials(&self) -> Option<(String, String)> {
        match (&self.mail_relay_username, &self.mail_relay_password) {
            (Some(user), Some(pass)) => Some((user.clone(), pass.clone())),
            (None, None) => None,
            _ => {
                warn!("mail_relay_credentials_incomplete");
                None
            }
        }
    }
}

/// Parse a variable, falling back to `default` when unset or invalid.
fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }),
        Err(_) => default,
    }
}

/// Read a variable, treating blank values as unset.
fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a boolean flag ("true"/"1"/"yes" or "false"/"0"/"no").
fn parse_bool(name: &str, default: bool) -> bool {
    match non_empty(name).map(|v| v.to_ascii_lowercase()).as_deref() {
        Some("true" | "1" | "yes") => true,
        Some("false" | "0" | "no") => false,
        Some(other) => {
            warn!(env_var = name, value = %other, "Invalid boolean, using default");
            default
        }
        None => default,
    }
}
