#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, request::Builder, HeaderMap, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use quizspark_api::{
    config::{Config, SessionBackend},
    create_router,
    services::generation_client::{GenerationClient, GenerationError},
    services::session_store::MemorySessionStore,
    services::AppState,
};
use serde_json::Value;
use std::collections::VecDeque;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const TEST_IP: &str = "203.0.113.7";

/// Request builder whose socket peer is `ip`, as `ConnectInfo` reports it.
pub fn request_from(ip: &str) -> Builder {
    let ip: IpAddr = ip.parse().unwrap();
    Request::builder().extension(ConnectInfo(SocketAddr::new(ip, 40000)))
}

/// Generation client that replays canned model answers and records prompts.
pub struct ScriptedGenerationClient {
    responses: Mutex<VecDeque<Result<String, GenerationError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerationClient {
    pub fn new(responses: Vec<Result<String, GenerationError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationClient for ScriptedGenerationClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(GenerationError::EmptyResponse))
    }
}

pub fn api_error(status: u16) -> Result<String, GenerationError> {
    Err(GenerationError::Api {
        status,
        body: "upstream unavailable".to_string(),
    })
}

pub fn test_config() -> Config {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let mut config = Config::default();
    config.session.backend = SessionBackend::Memory;
    config.rate_limit.enabled = false;
    config
}

pub fn create_test_app(client: Arc<ScriptedGenerationClient>) -> Router {
    create_test_app_with(test_config(), client)
}

pub fn create_test_app_with(config: Config, client: Arc<ScriptedGenerationClient>) -> Router {
    let store = Arc::new(MemorySessionStore::new(config.session.ttl_seconds));
    let state = AppState::with_components(config, store, client);
    create_router(Arc::new(state))
}

/// Three History questions whose key is A, C, C.
pub fn history_batch() -> String {
    serde_json::json!([
        {
            "question": "Who was the first Roman emperor?",
            "options": ["A. Augustus", "B. Julius Caesar", "C. Nero", "D. Caligula"],
            "answer": "A"
        },
        {
            "question": "In which year did the Berlin Wall fall?",
            "options": ["A. 1961", "B. 1975", "C. 1989", "D. 1991"],
            "answer": "C"
        },
        {
            "question": "Which empire built Machu Picchu?",
            "options": ["A. Aztec", "B. Maya", "C. Inca", "D. Olmec"],
            "answer": " c "
        }
    ])
    .to_string()
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    /// `name=value` pair of the session cookie set by this response.
    pub fn session_cookie(&self) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("quiz_session="))
            .and_then(|v| v.split(';').next())
            .map(|v| v.to_string())
    }

    pub fn set_cookie_header(&self) -> Option<String> {
        self.headers
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec();
    TestResponse {
        status,
        headers,
        body,
    }
}

pub async fn post_json(app: &Router, uri: &str, body: Value, cookie: Option<&str>) -> TestResponse {
    post_raw(app, uri, body.to_string(), cookie).await
}

pub async fn post_raw(app: &Router, uri: &str, body: String, cookie: Option<&str>) -> TestResponse {
    let mut builder = request_from(TEST_IP)
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    send(app, builder.body(Body::from(body)).unwrap()).await
}

pub async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> TestResponse {
    let mut builder = request_from(TEST_IP).method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    send(app, builder.body(Body::empty()).unwrap()).await
}
