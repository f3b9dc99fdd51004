use super::mocks::SpyGenerator;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response},
};
use plantbuddy_rust::{
    llm::GenerationParams,
    server::{handlers::AppState, router},
};
use serde_json::Value;
use std::sync::Arc;

/// Build the full router around a spy generator with default generation settings
pub fn create_test_app(generator: Arc<SpyGenerator>) -> Router {
    router(AppState::new(generator, GenerationParams::default()))
}

/// POST request to `/chat` with a JSON content type and a raw body
pub fn chat_request(body: impl Into<String>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.into()))
        .unwrap()
}

/// Collect a response body and parse it as JSON
pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Sample configuration YAML for testing
pub const SAMPLE_CONFIG_YAML: &str = r#"
server:
  host: "127.0.0.1"
  port: 8080
  logs:
    level: "debug"

model:
  model_id: "Qwen/Qwen2-0.5B"
  revision: "main"
  device: "cpu"
  stop_tokens: ["<|endoftext|>"]

generation:
  max_new_tokens: 64
  do_sample: false
  temperature: 0.5
  top_p: 0.95
  top_k: null
  seed: 7
"#;

/// Configuration pointing at a local model directory
pub const LOCAL_MODEL_CONFIG_YAML: &str = r#"
model:
  local_path: "/models/qwen2-1.5b"
"#;
