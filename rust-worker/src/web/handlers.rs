//! Submission endpoint handlers.
//!
//! A submission runs strictly in order and stops at the first failure:
//! 1. Decode the body into an ordered form
//! 2. Enforce field limits
//! 3. Check the `email` field syntax, when present
//! 4. Verify the Turnstile token, when a secret is configured
//! 5. Compose and deliver the notification

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use axum::{
    extract::{FromRequest, Multipart, Request, State},
    http::{header, HeaderMap},
    Form, Json,
};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use url::Url;

use crate::delivery::{DeliveryBackend, Dispatcher, MailBinding, ResendClient, SmtpRelayBinding};
use crate::error::{AppError, Rejection};
use crate::form::{SubmittedForm, EMAIL_FIELD, SUBJECT_FIELD};
use crate::turnstile::TurnstileVerifier;
use crate::validate::is_valid_email;
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub verifier: TurnstileVerifier,
    pub dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(config: Config, verifier: TurnstileVerifier, dispatcher: Dispatcher) -> Self {
        Self {
            config: Arc::new(config),
            verifier,
            dispatcher,
        }
    }

    /// Build the HTTP client, verifier and delivery backend from `config`.
    pub fn from_config(config: Config) -> Result<Self> {
        let mut client = Client::builder();
        if let Some(ms) = config.request_timeout_ms {
            client = client.timeout(Duration::from_millis(ms));
        }
        let client = client.build().context("Failed to build HTTP client")?;

        let verify_url =
            Url::parse(&config.turnstile_verify_url).context("Invalid TURNSTILE_VERIFY_URL")?;
        let verifier = TurnstileVerifier::new(client.clone(), verify_url);

        let binding = match config.mail_relay_host.as_deref() {
            Some(host) => {
                let relay = SmtpRelayBinding::new(
                    host,
                    config.mail_relay_port,
                    config.mail_relay_credentials(),
                )?;
                Some(Arc::new(relay) as Arc<dyn MailBinding>)
            }
            None => None,
        };

        let api = match &config.resend_api_key {
            Some(key) => {
                let api_url = with_trailing_slash(&config.resend_api_url);
                let api_url = Url::parse(&api_url).context("Invalid RESEND_API_URL")?;
                Some(ResendClient::new(client, api_url, key.clone()))
            }
            None => None,
        };

        let backend = DeliveryBackend::select(binding, api);
        let dispatcher = Dispatcher::new(config.delivery_config(), backend);

        Ok(Self::new(config, verifier, dispatcher))
    }
}

fn with_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{}/", url)
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Form Submission
// =============================================================================

/// Successful submission response.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub message: &'static str,
}

/// Form submission endpoint.
pub async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
) -> Result<Json<SubmitResponse>, AppError> {
    let form = read_form(request, &state).await?;

    info!(
        field_count = form.len(),
        has_email = form.get(EMAIL_FIELD).is_some(),
        has_subject = form.get(SUBJECT_FIELD).is_some(),
        "submission_received"
    );

    state.config.limits.check(&form)?;

    let reply_to = form.get(EMAIL_FIELD).filter(|e| !e.trim().is_empty());
    if let Some(email) = reply_to {
        if !is_valid_email(Some(email)) {
            warn!("submission_invalid_email");
            return Err(Rejection::InvalidEmail.into());
        }
    }

    let client_ip = client_ip(&headers);
    state
        .verifier
        .check_submission(
            &form,
            state.config.turnstile_secret_key.as_deref(),
            client_ip.as_deref(),
        )
        .await?;

    state
        .dispatcher
        .deliver(&form, reply_to, form.get(SUBJECT_FIELD))
        .await?;

    info!("submission_delivered");

    Ok(Json(SubmitResponse {
        success: true,
        message: "Email sent successfully",
    }))
}

/// Decode a JSON, urlencoded or multipart body into a form.
///
/// Undecodable bodies are internal errors; an unknown content type is a
/// rejection. Decoding stops once the field count passes the limit.
async fn read_form(request: Request, state: &AppState) -> Result<SubmittedForm, AppError> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .unwrap_or_default();
    let max_fields = state.config.limits.max_fields;

    match content_type.as_str() {
        "application/json" => {
            let Json(body) = Json::<Value>::from_request(request, state)
                .await
                .map_err(|e| anyhow!(e.body_text()))?;
            Ok(SubmittedForm::from_json(body, max_fields)?)
        }
        "application/x-www-form-urlencoded" => {
            let Form(fields) = Form::<Vec<(String, String)>>::from_request(request, state)
                .await
                .map_err(|e| anyhow!(e.body_text()))?;
            Ok(SubmittedForm::from_pairs(fields, max_fields)?)
        }
        "multipart/form-data" => {
            let mut multipart = Multipart::from_request(request, state)
                .await
                .map_err(|e| anyhow!(e.body_text()))?;

            let mut form = SubmittedForm::new();
            while let Some(field) = multipart
                .next_field()
                .await
                .map_err(|e| anyhow!(e.body_text()))?
            {
                let name = field.name().unwrap_or_default().to_string();
                if field.file_name().is_some() {
                    return Err(Rejection::FileUpload(name).into());
                }
                let value = field.text().await.map_err(|e| anyhow!(e.body_text()))?;
                form.try_insert(name, value, max_fields)?;
            }
            Ok(form)
        }
        other => {
            warn!(content_type = %other, "submission_unsupported_content_type");
            Err(Rejection::UnsupportedContentType.into())
        }
    }
}

/// Client address as reported by Cloudflare.
///
/// Only `CF-Connecting-IP` is trusted; proxy headers such as
/// `X-Forwarded-For` are set by the client and ignored.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("CF-Connecting-IP")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::DeliveryConfig;
    use crate::test_support::{self, API_KEY, GOOD_TOKEN, SECRET};
    use crate::web::router;
    use axum::{
        body::{to_bytes, Body},
        http::{HeaderValue, Method, StatusCode},
        Router,
    };
    use serde_json::json;
    use tower::ServiceExt;

    struct Harness {
        app: Router,
        sent: test_support::Seen,
    }

    async fn harness(secret: Option<&str>) -> Harness {
        let (api_url, sent) = test_support::spawn_email_api(StatusCode::OK).await;
        let (verify_url, _) = test_support::spawn_turnstile().await;

        let config = Config {
            turnstile_secret_key: secret.map(str::to_string),
            from_email: "forms@example.com".to_string(),
            to_email: "owner@example.com".to_string(),
            ..Config::default()
        };
        let dispatcher = Dispatcher::new(
            config.delivery_config(),
            Some(DeliveryBackend::ApiKey(ResendClient::new(
                Client::new(),
                api_url,
                API_KEY.to_string(),
            ))),
        );
        let verifier = TurnstileVerifier::new(Client::new(), verify_url);

        Harness {
            app: router(AppState::new(config, verifier, dispatcher)),
            sent,
        }
    }

    fn post(content_type: &str, body: impl Into<Body>) -> Request {
        axum::http::Request::builder()
            .method(Method::POST)
            .uri("/api/contact")
            .header(header::CONTENT_TYPE, content_type)
            .body(body.into())
            .unwrap()
    }

    async fn call(app: &Router, request: Request) -> (StatusCode, HeaderMap, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, headers, body)
    }

    #[tokio::test]
    async fn test_json_submission_end_to_end() {
        let h = harness(None).await;
        let body = json!({
            "name": "Alice",
            "email": "alice@example.com",
            "subject": "Hello",
            "message": "Hi\nthere"
        });

        let (status, headers, resp) =
            call(&h.app, post("application/json", body.to_string())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp["success"], true);
        assert_eq!(resp["message"], "Email sent successfully");
        assert_eq!(
            headers.get("access-control-allow-origin"),
            Some(&HeaderValue::from_static("*"))
        );

        let sent = h.sent.lock().unwrap();
        let email = &sent[0]["body"];
        assert_eq!(email["subject"], "Hello");
        assert_eq!(email["reply_to"], "alice@example.com");
        assert_eq!(email["to"][0], "owner@example.com");

        let html = email["html"].as_str().unwrap();
        assert!(html.contains(r#"<p class="field" style="margin: 10px 0;"><strong>name:</strong> Alice</p>"#));
        assert!(html.contains(r#"<p class="field" style="margin: 10px 0;"><strong>subject:</strong> Hello</p>"#));
        assert!(html.contains(r#"<div class="field boxed""#));
        assert!(html.contains("<strong>message:</strong></p>\n<p style=\"margin: 10px 0;\">Hi<br>\nthere</p>"));
        assert!(html.contains(r#"Reply to: <a href="mailto:alice@example.com">alice@example.com</a>"#));
    }

    #[tokio::test]
    async fn test_urlencoded_submission() {
        let h = harness(None).await;

        let (status, _, _) = call(
            &h.app,
            post(
                "application/x-www-form-urlencoded",
                "name=Bob&email=bob%40example.com&message=Hello+there",
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let sent = h.sent.lock().unwrap();
        let html = sent[0]["body"]["html"].as_str().unwrap();
        assert!(html.contains("<strong>message:</strong> Hello there"));
        assert_eq!(sent[0]["body"]["subject"], "New Form Submission");
    }

    #[tokio::test]
    async fn test_multipart_submission() {
        let h = harness(None).await;
        let body = "--XBOUNDARY\r\n\
            Content-Disposition: form-data; name=\"name\"\r\n\r\n\
            Carol\r\n\
            --XBOUNDARY\r\n\
            Content-Disposition: form-data; name=\"message\"\r\n\r\n\
            line one\r\nline two\r\n\
            --XBOUNDARY--\r\n";

        let (status, _, _) = call(
            &h.app,
            post("multipart/form-data; boundary=XBOUNDARY", body),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let sent = h.sent.lock().unwrap();
        let html = sent[0]["body"]["html"].as_str().unwrap();
        assert!(html.contains("<strong>name:</strong> Carol"));
        assert!(html.contains("line one<br>\nline two"));
        assert!(sent[0]["body"].get("reply_to").is_none());
    }

    #[tokio::test]
    async fn test_multipart_file_rejected() {
        let h = harness(None).await;
        let body = "--XBOUNDARY\r\n\
            Content-Disposition: form-data; name=\"upload\"; filename=\"a.txt\"\r\n\
            Content-Type: text/plain\r\n\r\n\
            data\r\n\
            --XBOUNDARY--\r\n";

        let (status, _, resp) = call(
            &h.app,
            post("multipart/form-data; boundary=XBOUNDARY", body),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["error"], "File uploads are not accepted (field 'upload')");
    }

    #[tokio::test]
    async fn test_unsupported_content_type() {
        let h = harness(None).await;

        let (status, _, resp) = call(&h.app, post("text/plain", "hello")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["error"], "Unsupported content type");
        assert!(h.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_json_is_internal_error() {
        let h = harness(None).await;

        let (status, _, resp) = call(&h.app, post("application/json", "{not json")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(resp["error"]
            .as_str()
            .unwrap()
            .starts_with("Internal server error: "));
    }

    #[tokio::test]
    async fn test_invalid_email_rejected() {
        let h = harness(None).await;
        let body = json!({ "name": "Eve", "email": "invalid..dots@example.com" });

        let (status, _, resp) = call(&h.app, post("application/json", body.to_string())).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["error"], "Invalid email format");
        assert!(h.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_field_limit_rejected() {
        let h = harness(None).await;
        let body = json!({ "message": "x".repeat(4097) });

        let (status, _, resp) = call(&h.app, post("application/json", body.to_string())).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            resp["error"],
            "Field 'message' exceeds the maximum length of 4096 characters"
        );
    }

    #[tokio::test]
    async fn test_missing_token_with_secret() {
        let h = harness(Some(SECRET)).await;
        let body = json!({ "name": "Alice" });

        let (status, _, resp) = call(&h.app, post("application/json", body.to_string())).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["error"], "Missing CAPTCHA token");
    }

    #[tokio::test]
    async fn test_bad_token_with_secret() {
        let h = harness(Some(SECRET)).await;
        let body = json!({ "name": "Alice", "turnstileToken": "forged" });

        let (status, _, resp) = call(&h.app, post("application/json", body.to_string())).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["error"], "CAPTCHA verification failed");
        assert!(h.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_good_token_with_secret_is_stripped() {
        let h = harness(Some(SECRET)).await;
        let body = json!({ "name": "Alice", "turnstileToken": GOOD_TOKEN });

        let (status, _, _) = call(&h.app, post("application/json", body.to_string())).await;

        assert_eq!(status, StatusCode::OK);
        let sent = h.sent.lock().unwrap();
        assert!(!sent[0]["body"]["html"].as_str().unwrap().contains(GOOD_TOKEN));
    }

    #[tokio::test]
    async fn test_no_backend_is_bad_request() {
        let config = Config::default();
        let dispatcher = Dispatcher::new(
            DeliveryConfig {
                from_email: "forms@example.com".to_string(),
                to_email: "owner@example.com".to_string(),
                sender_name: "Contact Form".to_string(),
                default_subject: "New Form Submission".to_string(),
                strip_short_subject: false,
            },
            None,
        );
        let verifier = TurnstileVerifier::new(Client::new(), test_support::unreachable_url());
        let app = router(AppState::new(config, verifier, dispatcher));

        let (status, _, resp) = call(
            &app,
            post("application/json", json!({ "name": "Alice" }).to_string()),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["error"], "No delivery mechanism available");
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let h = harness(None).await;
        let request = axum::http::Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/contact")
            .header(header::ORIGIN, "https://example.org")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();

        let (status, headers, body) = call(&h.app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::Null);
        assert_eq!(
            headers.get("access-control-allow-origin"),
            Some(&HeaderValue::from_static("*"))
        );
        let methods = headers
            .get("access-control-allow-methods")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(methods.contains("POST"));
    }

    #[tokio::test]
    async fn test_health() {
        let h = harness(None).await;
        let request = axum::http::Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let (status, _, body) = call(&h.app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[test]
    fn test_client_ip_reads_only_cloudflare_header() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Forwarded-For", HeaderValue::from_static("198.51.100.1, 10.0.0.1"));
        assert_eq!(client_ip(&headers), None);

        headers.insert("CF-Connecting-IP", HeaderValue::from_static(" 203.0.113.7 "));
        assert_eq!(client_ip(&headers), Some("203.0.113.7".to_string()));

        assert_eq!(client_ip(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn test_too_many_urlencoded_fields_rejected_while_decoding() {
        let h = harness(None).await;
        let body = (0..100_000)
            .map(|i| format!("{}=", i))
            .collect::<Vec<_>>()
            .join("&");

        let (status, _, resp) = call(
            &h.app,
            post("application/x-www-form-urlencoded", body),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            resp["error"],
            "Submission exceeds the maximum of 64 fields at field '64'"
        );
        assert!(h.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_from_config_selects_backend() {
        let config = Config {
            from_email: "forms@example.com".to_string(),
            to_email: "owner@example.com".to_string(),
            resend_api_key: Some(API_KEY.to_string()),
            ..Config::default()
        };
        let state = AppState::from_config(config.clone()).unwrap();
        assert_eq!(state.dispatcher.backend_name(), Some("api_key"));

        let config = Config {
            mail_relay_host: Some("localhost".to_string()),
            ..config
        };
        let state = AppState::from_config(config).unwrap();
        assert_eq!(state.dispatcher.backend_name(), Some("binding"));

        let state = AppState::from_config(Config::default()).unwrap();
        assert_eq!(state.dispatcher.backend_name(), None);
    }

    #[test]
    fn test_with_trailing_slash() {
        assert_eq!(with_trailing_slash("https://api.resend.com"), "https://api.resend.com/");
        assert_eq!(with_trailing_slash("https://api.resend.com/"), "https://api.resend.com/");
    }
}
