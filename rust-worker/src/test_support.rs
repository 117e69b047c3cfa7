//! Throwaway HTTP servers standing in for Turnstile and the email API.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Form, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use url::Url;

pub const GOOD_TOKEN: &str = "good-token";
pub const SECRET: &str = "turnstile-secret";
pub const API_KEY: &str = "re_test_key";

/// Requests seen by a mock server.
pub type Seen = Arc<Mutex<Vec<Value>>>;

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn spawn(app: Router) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{}/", addr)).unwrap()
}

/// Siteverify mock: succeeds only for [`GOOD_TOKEN`] with [`SECRET`].
pub async fn spawn_turnstile() -> (Url, Seen) {
    let seen: Seen = Arc::default();

    async fn siteverify(
        State(seen): State<Seen>,
        Form(params): Form<HashMap<String, String>>,
    ) -> Json<Value> {
        let success = params.get("secret").map(String::as_str) == Some(SECRET)
            && params.get("response").map(String::as_str) == Some(GOOD_TOKEN);
        seen.lock().unwrap().push(json!(params));
        if success {
            Json(json!({ "success": true, "error-codes": [] }))
        } else {
            Json(json!({ "success": false, "error-codes": ["invalid-input-response"] }))
        }
    }

    let app = Router::new()
        .route("/siteverify", post(siteverify))
        .with_state(seen.clone());
    let base = spawn(app).await;
    (base.join("siteverify").unwrap(), seen)
}

/// Email API mock answering `POST /emails` with `status`.
pub async fn spawn_email_api(status: StatusCode) -> (Url, Seen) {
    let seen: Seen = Arc::default();

    let app = Router::new()
        .route(
            "/emails",
            post(
                move |State(seen): State<Seen>, headers: HeaderMap, Json(body): Json<Value>| async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    seen.lock().unwrap().push(json!({ "auth": auth, "body": body }));
                    (status, Json(json!({ "id": "email-123" })))
                },
            ),
        )
        .with_state(seen.clone());
    (spawn(app).await, seen)
}

/// A URL nothing listens on.
pub fn unreachable_url() -> Url {
    Url::parse("http://127.0.0.1:1/").unwrap()
}
