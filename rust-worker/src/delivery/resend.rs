//! API-key delivery through the Resend HTTP API.
//!
//! Reference: https://resend.com/docs/api-reference/emails/send-email

use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};
use url::Url;

use super::ComposedMessage;
use crate::error::{Outcome, Rejection};

/// Public API base.
pub const DEFAULT_API_URL: &str = "https://api.resend.com/";

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: String,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
}

/// Authenticated client for the `/emails` endpoint.
#[derive(Debug, Clone)]
pub struct ResendClient {
    client: Client,
    api_url: Url,
    api_key: String,
}

impl ResendClient {
    /// `api_url` is the API base; `emails` is resolved against it.
    pub fn new(client: Client, api_url: Url, api_key: String) -> Self {
        Self {
            client,
            api_url,
            api_key,
        }
    }

    /// Send `message`. Only a 2xx response counts as success.
    pub async fn send(&self, message: &ComposedMessage) -> Outcome {
        let endpoint = self
            .api_url
            .join("emails")
            .map_err(|e| Rejection::DeliveryFailed(e.to_string()))?;

        let request = SendEmailRequest {
            from: message.from_header(),
            to: vec![message.to_email.as_str()],
            subject: &message.subject,
            html: &message.html,
            reply_to: message.reply_to.as_deref(),
        };

        match self
            .client
            .post(endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                info!(status_code = resp.status().as_u16(), "resend_send_complete");
                Ok(())
            }
            Ok(resp) => {
                let status = resp.status();
                warn!(status_code = status.as_u16(), "resend_send_rejected");
                Err(Rejection::DeliveryFailed(status.to_string()))
            }
            Err(e) => {
                warn!(error = %e, "resend_send_error");
                Err(Rejection::DeliveryFailed(e.to_string()))
            }
        }
    }
}
