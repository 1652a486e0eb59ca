//! Local stand-in for the IAM token service and the watsonx.ai generation
//! endpoint.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Form, Json, Router};
use docqa_lib::config::{Secret, WatsonxConfig};
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub const API_KEY: &str = "test-api-key";
pub const PROJECT_ID: &str = "test-project";
pub const DEFAULT_ANSWER: &str = "The sky is blue.";

pub struct Stub {
    pub token_status: u16,
    pub expires_in: u64,
    /// Delay before the token endpoint answers
    pub token_delay: Duration,
    /// Delay before the generation endpoint answers
    pub delay: Duration,
    /// Scripted generation responses; once drained every call succeeds
    pub script: Mutex<VecDeque<(u16, Value)>>,

    pub token_calls: AtomicUsize,
    pub generation_calls: AtomicUsize,
    pub token_forms: Mutex<Vec<HashMap<String, String>>>,
    pub authorizations: Mutex<Vec<String>>,
    pub versions: Mutex<Vec<String>>,
    pub bodies: Mutex<Vec<Value>>,
}

impl Default for Stub {
    fn default() -> Self {
        Self {
            token_status: 200,
            expires_in: 3600,
            token_delay: Duration::ZERO,
            delay: Duration::ZERO,
            script: Mutex::new(VecDeque::new()),
            token_calls: AtomicUsize::new(0),
            generation_calls: AtomicUsize::new(0),
            token_forms: Mutex::default(),
            authorizations: Mutex::default(),
            versions: Mutex::default(),
            bodies: Mutex::default(),
        }
    }
}

impl Stub {
    pub fn scripted(responses: impl IntoIterator<Item = (u16, Value)>) -> Self {
        Self {
            script: Mutex::new(responses.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }

    pub fn generation_calls(&self) -> usize {
        self.generation_calls.load(Ordering::SeqCst)
    }
}

async fn token(State(stub): State<Arc<Stub>>, Form(form): Form<HashMap<String, String>>) -> Response {
    let n = stub.token_calls.fetch_add(1, Ordering::SeqCst) + 1;
    stub.token_forms.lock().unwrap().push(form);
    tokio::time::sleep(stub.token_delay).await;

    if stub.token_status != 200 {
        let status = StatusCode::from_u16(stub.token_status).unwrap();
        return (status, "Provided API key could not be found.").into_response();
    }
    Json(json!({
        "access_token": format!("token-{n}"),
        "token_type": "Bearer",
        "expires_in": stub.expires_in,
    }))
    .into_response()
}

async fn generation(
    State(stub): State<Arc<Stub>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    stub.generation_calls.fetch_add(1, Ordering::SeqCst);
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    stub.authorizations.lock().unwrap().push(authorization);
    stub.versions
        .lock()
        .unwrap()
        .push(query.get("version").cloned().unwrap_or_default());
    stub.bodies.lock().unwrap().push(body);

    tokio::time::sleep(stub.delay).await;

    let scripted = stub.script.lock().unwrap().pop_front();
    let (status, body) = scripted
        .unwrap_or_else(|| (200, json!({"results": [{"generated_text": DEFAULT_ANSWER}]})));
    (StatusCode::from_u16(status).unwrap(), Json(body)).into_response()
}

/// Serve `stub` on an ephemeral local port and return its base URL.
pub async fn serve(stub: Arc<Stub>) -> String {
    let app = Router::new()
        .route("/identity/token", post(token))
        .route("/ml/v1/text/generation", post(generation))
        .with_state(stub);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://{addr}")
}

pub fn config(base_url: &str) -> WatsonxConfig {
    WatsonxConfig {
        base_url: base_url.to_string(),
        iam_url: format!("{base_url}/identity/token"),
        api_key: Secret::new(API_KEY),
        project_id: PROJECT_ID.to_string(),
        timeout_secs: 5,
        ..Default::default()
    }
}
