//! Shared test utilities

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::Value;
use shopchat_gateway::ai::{CompletionProvider, CompletionRequest, ModelKind};
use shopchat_gateway::api::{ApiServerBuilder, ApiState};
use shopchat_gateway::config::file::ShopchatConfigFile;
use shopchat_gateway::{Config, DbPool, db};
use tempfile::TempDir;
use tower::ServiceExt;

/// Agent base nobody listens on
pub const UNREACHABLE_AGENT: &str = "http://127.0.0.1:9/agent";

/// Multipart boundary used by [`upload_request`]
const BOUNDARY: &str = "shopchat-test-boundary";

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// Build a config from explicit variables only, ignoring the process env
pub fn test_config(vars: &[(&str, String)]) -> Config {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect();
    Config::from_sources(ShopchatConfigFile::default(), |key| vars.get(key).cloned())
        .expect("valid test config")
}

/// A gateway router wired to an in-memory database and a temp upload dir
pub struct TestApp {
    pub router: Router,
    pub state: Arc<ApiState>,
    pub db: DbPool,
    pub uploads: TempDir,
}

/// Build a test app; `vars` override the test defaults
pub fn test_app(vars: &[(&str, String)], ai: Option<Arc<dyn CompletionProvider>>) -> TestApp {
    let uploads = tempfile::tempdir().expect("temp upload dir");
    let mut all = vec![
        ("AGENT_WEBHOOK_BASE", UNREACHABLE_AGENT.to_string()),
        ("UPLOAD_DIR", uploads.path().display().to_string()),
        ("AGENT_TIMEOUT_SECS", "2".to_string()),
        ("UAZAPI_TIMEOUT_SECS", "5".to_string()),
    ];
    all.extend(vars.iter().cloned());

    let db = setup_test_db();
    let mut builder = ApiServerBuilder::new(test_config(&all), db.clone());
    if let Some(ai) = ai {
        builder = builder.completion_provider(ai);
    }
    let server = builder.build().expect("failed to build test server");

    TestApp {
        router: server.router(),
        state: server.state(),
        db,
        uploads,
    }
}

/// Completion provider with fixed answers per model kind
pub struct CannedAi {
    pub vision: String,
    pub text: String,
}

impl CannedAi {
    pub fn new(vision: &str, text: &str) -> Arc<dyn CompletionProvider> {
        Arc::new(Self {
            vision: vision.to_string(),
            text: text.to_string(),
        })
    }
}

#[async_trait]
impl CompletionProvider for CannedAi {
    fn name(&self) -> &'static str {
        "canned"
    }

    async fn complete(&self, request: &CompletionRequest) -> shopchat_gateway::Result<String> {
        Ok(match request.model {
            ModelKind::Vision => self.vision.clone(),
            ModelKind::Text => self.text.clone(),
        })
    }
}

/// Serve `router` on an ephemeral local port, returning its base URL
pub async fn serve_stub(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub server");
    let addr = listener.local_addr().expect("stub address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    format!("http://{addr}")
}

/// Send a request and decode the JSON body (`Null` when not JSON)
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.expect("request failed");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

/// JSON request for tenant `org`/`flow`
pub fn json_request(method: &str, uri: &str, org: i64, flow: i64, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("X-Org-ID", org.to_string())
        .header("X-Flow-ID", flow.to_string())
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Bodyless GET for tenant `org`/`flow`
pub fn get_request(uri: &str, org: i64, flow: i64) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("X-Org-ID", org.to_string())
        .header("X-Flow-ID", flow.to_string())
        .body(Body::empty())
        .unwrap()
}

/// Multipart `/vision/upload` request
pub fn upload_request(
    image: Option<(&[u8], &str)>,
    fields: &[(&str, &str)],
    org: i64,
    flow: i64,
) -> Request<Body> {
    multipart_request("/vision/upload", image, fields, org, flow)
}

/// Multipart request to `uri` with an optional `image` file part
pub fn multipart_request(
    uri: &str,
    image: Option<(&[u8], &str)>,
    fields: &[(&str, &str)],
    org: i64,
    flow: i64,
) -> Request<Body> {
    let mut body: Vec<u8> = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((bytes, mime)) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"photo\"\r\nContent-Type: {mime}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .header("X-Org-ID", org.to_string())
        .header("X-Flow-ID", flow.to_string())
        .body(Body::from(body))
        .unwrap()
}
