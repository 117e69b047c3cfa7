//! Cloudflare Turnstile token verification.
//!
//! Reference: https://developers.cloudflare.com/turnstile/get-started/server-side-validation/

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};
use url::Url;

use crate::error::{Outcome, Rejection};
use crate::form::{SubmittedForm, TURNSTILE_FIELD};

/// Public siteverify endpoint.
pub const DEFAULT_VERIFY_URL: &str = "https://challenges.cloudflare.com/turnstile/v0/siteverify";

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

/// Client for the Turnstile siteverify API.
#[derive(Debug, Clone)]
pub struct TurnstileVerifier {
    client: Client,
    verify_url: Url,
}

impl TurnstileVerifier {
    pub fn new(client: Client, verify_url: Url) -> Self {
        Self { client, verify_url }
    }

    /// Ask the verification service whether `token` is valid.
    ///
    /// Returns the service's `success` decision. Transport errors, non-2xx
    /// statuses and unparseable bodies are errors.
    pub async fn verify(&self, token: &str, secret: &str, client_ip: Option<&str>) -> Result<bool> {
        let mut params = vec![("secret", secret), ("response", token)];
        if let Some(ip) = client_ip {
            params.push(("remoteip", ip));
        }

        let response = self
            .client
            .post(self.verify_url.clone())
            .form(&params)
            .send()
            .await
            .context("Failed to reach Turnstile")?
            .error_for_status()
            .context("Turnstile returned an error status")?;

        let body: SiteVerifyResponse = response
            .json()
            .await
            .context("Failed to parse Turnstile response")?;

        info!(
            success = body.success,
            error_codes = ?body.error_codes,
            has_remote_ip = client_ip.is_some(),
            "turnstile_verify_complete"
        );

        Ok(body.success)
    }

    /// Apply the anti-spam policy to a submission.
    ///
    /// Without a configured secret the check is skipped. With a secret, a
    /// missing token and a failed verification are separate rejections; an
    /// unreachable verifier counts as a failed verification.
    pub async fn check_submission(
        &self,
        form: &SubmittedForm,
        secret: Option<&str>,
        client_ip: Option<&str>,
    ) -> Outcome {
        let Some(secret) = secret.filter(|s| !s.trim().is_empty()) else {
            info!("turnstile_not_configured");
            return Ok(());
        };

        let Some(token) = form.get(TURNSTILE_FIELD).filter(|t| !t.is_empty()) else {
            warn!("turnstile_token_missing");
            return Err(Rejection::TurnstileTokenMissing);
        };

        match self.verify(token, secret, client_ip).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                warn!("turnstile_token_rejected");
                Err(Rejection::TurnstileFailed)
            }
            Err(e) => {
                warn!(error = %e, "turnstile_verify_error");
                Err(Rejection::TurnstileFailed)
            }
        }
    }
}
