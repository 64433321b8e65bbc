use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, Response};
use axum::Router;
use lyra_agents::AgentSettings;
use lyra_api::{build_app_with, ApiConfig};
use serde_json::Value;

pub const TEST_API_KEY: &str = "test-lyra-key";

pub fn test_config() -> ApiConfig {
    ApiConfig {
        api_key: TEST_API_KEY.to_string(),
        allowed_origins: vec!["http://localhost:5173".to_string()],
        rate_limit_window: Duration::from_secs(60),
        rate_limit_max: 1_000,
        trust_forwarded_for: false,
        session_sweep_interval: Duration::ZERO,
    }
}

pub fn test_settings() -> AgentSettings {
    AgentSettings {
        rng_seed: Some(42),
        ..AgentSettings::default()
    }
}

pub async fn test_app() -> Router {
    build_app_with(test_config(), test_settings())
        .await
        .expect("app should build")
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("x-api-key", TEST_API_KEY)
        .body(Body::empty())
        .expect("valid request")
}

pub fn post_json(uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-api-key", TEST_API_KEY)
        .body(Body::from(payload.to_string()))
        .expect("valid request")
}

pub async fn body_json(response: Response<Body>) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    serde_json::from_slice(&body).expect("json body")
}

pub async fn body_text(response: Response<Body>) -> String {
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    String::from_utf8(body.to_vec()).expect("utf-8 body")
}
