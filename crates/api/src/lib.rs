mod rate_limit;

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::extract::{ConnectInfo, Json, Query, State};
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{body::Body, Router};
use lyra_agents::{AgentError, AgentSettings, LyraAgent, OnboardingInput, StartSession};
use lyra_core::{
    BirthParameters, ChatInput, HoroscopePeriod, LyraError, Persona, DEFAULT_CHART_SIZE,
};
use lyra_observability::{AppMetrics, MetricsSnapshot};
use lyra_storage::MemoryStore;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub use crate::rate_limit::IpRateLimiter;

const MAX_CHART_SIZE: u32 = 2_048;
const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct ApiState {
    pub agent: Arc<LyraAgent<MemoryStore>>,
    pub metrics: Arc<AppMetrics>,
    pub api_key: String,
    pub limiter: IpRateLimiter,
    pub trust_forwarded_for: bool,
    pub allowed_origins: Arc<Vec<String>>,
}

/// Outer-surface knobs; domain knobs live in [`AgentSettings`].
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub api_key: String,
    pub allowed_origins: Vec<String>,
    pub rate_limit_window: Duration,
    pub rate_limit_max: usize,
    /// Key the rate limiter on `x-forwarded-for` instead of the peer
    /// address. Only safe behind a proxy that overwrites the header.
    pub trust_forwarded_for: bool,
    /// How often expired sessions are swept; zero disables the sweeper.
    pub session_sweep_interval: Duration,
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: env::var("LYRA_API_KEY").unwrap_or_else(|_| "dev-lyra-key".to_string()),
            allowed_origins: parse_allowed_origins(),
            rate_limit_window: Duration::from_secs(
                env::var("LYRA_RATE_LIMIT_WINDOW_SECONDS")
                    .ok()
                    .and_then(|value| value.parse::<u64>().ok())
                    .unwrap_or(60),
            ),
            rate_limit_max: env::var("LYRA_RATE_LIMIT_MAX")
                .ok()
                .and_then(|value| value.parse::<usize>().ok())
                .unwrap_or(120),
            trust_forwarded_for: env::var("LYRA_TRUST_FORWARDED_FOR")
                .map(|value| matches!(value.trim(), "1" | "true" | "yes"))
                .unwrap_or(false),
            session_sweep_interval: Duration::from_secs(
                env::var("LYRA_SESSION_SWEEP_SECONDS")
                    .ok()
                    .and_then(|value| value.parse::<u64>().ok())
                    .unwrap_or(300),
            ),
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    metrics: MetricsSnapshot,
}

#[derive(Debug, Deserialize)]
struct OnboardingRequest {
    session_id: String,
    #[serde(flatten)]
    answers: OnboardingInput,
}

#[derive(Debug, Deserialize)]
struct EndSessionRequest {
    session_id: String,
}

#[derive(Debug, Serialize)]
struct EndSessionResponse {
    session_id: String,
    ended: bool,
}

#[derive(Debug, Deserialize)]
struct PersonaRequest {
    session_id: String,
    persona: String,
}

#[derive(Debug, Deserialize)]
struct ClassifyRequest {
    text: String,
}

#[derive(Debug, Serialize)]
struct ClassifyResponse {
    normalized: String,
    intent: lyra_core::Intent,
}

#[derive(Debug, Deserialize)]
struct DashboardQuery {
    session_id: String,
    period: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChartSvgQuery {
    session_id: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChartRequest {
    #[serde(flatten)]
    birth: BirthParameters,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CompatibilityRequest {
    first: BirthParameters,
    second: BirthParameters,
}

pub async fn build_app() -> Result<Router> {
    build_app_with(ApiConfig::from_env(), AgentSettings::from_env()?).await
}

pub async fn build_app_with(config: ApiConfig, settings: AgentSettings) -> Result<Router> {
    let metrics = AppMetrics::shared();
    let store = Arc::new(MemoryStore::new());
    let agent = Arc::new(LyraAgent::new(store, metrics.clone(), &settings)?);

    if !config.session_sweep_interval.is_zero() {
        spawn_session_sweeper(agent.clone(), config.session_sweep_interval);
    }

    let state = ApiState {
        agent,
        metrics,
        api_key: config.api_key,
        limiter: IpRateLimiter::new(config.rate_limit_window, config.rate_limit_max),
        trust_forwarded_for: config.trust_forwarded_for,
        allowed_origins: Arc::new(config.allowed_origins),
    };

    Ok(build_router(state))
}

/// Purges expired sessions on a fixed period so idle servers shed them too.
/// `every` must be non-zero.
pub fn spawn_session_sweeper(
    agent: Arc<LyraAgent<MemoryStore>>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match agent.purge_expired_sessions().await {
                Ok(0) => {}
                Ok(purged) => tracing::debug!(purged, "expired sessions swept"),
                Err(error) => tracing::warn!(error = %error, "session sweep failed"),
            }
        }
    })
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/session", post(start_session))
        .route("/v1/session/end", post(end_session))
        .route("/v1/onboarding", post(onboarding))
        .route("/v1/persona", post(set_persona))
        .route("/v1/chat", post(chat))
        .route("/v1/classify", post(classify))
        .route("/v1/dashboard", get(dashboard))
        .route("/v1/chart.svg", get(chart_svg))
        .route("/v1/chart", post(chart))
        .route("/v1/transits", get(transits))
        .route("/v1/compatibility", post(compatibility))
        .layer(build_cors_layer(&state.allowed_origins))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api_key_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .with_state(state)
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let payload = HealthResponse {
        status: "ok",
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        metrics: state.metrics.snapshot(),
    };
    (StatusCode::OK, Json(payload))
}

async fn start_session(
    State(state): State<ApiState>,
    Json(request): Json<StartSession>,
) -> Response {
    match state.agent.start_session(request).await {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(error) => agent_error_response(error, "session_failed"),
    }
}

async fn end_session(
    State(state): State<ApiState>,
    Json(request): Json<EndSessionRequest>,
) -> Response {
    match state.agent.end_session(&request.session_id).await {
        Ok(true) => (
            StatusCode::OK,
            Json(EndSessionResponse {
                session_id: request.session_id,
                ended: true,
            }),
        )
            .into_response(),
        Ok(false) => agent_error_response(
            AgentError::SessionNotFound(request.session_id).into(),
            "session_end_failed",
        ),
        Err(error) => agent_error_response(error, "session_end_failed"),
    }
}

async fn onboarding(
    State(state): State<ApiState>,
    Json(request): Json<OnboardingRequest>,
) -> Response {
    match state
        .agent
        .onboard(&request.session_id, request.answers)
        .await
    {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(error) => agent_error_response(error, "onboarding_failed"),
    }
}

async fn set_persona(
    State(state): State<ApiState>,
    Json(request): Json<PersonaRequest>,
) -> Response {
    let persona = Persona::from_optional_str(Some(request.persona.as_str()));
    match state.agent.set_persona(&request.session_id, persona).await {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(error) => agent_error_response(error, "persona_failed"),
    }
}

async fn chat(State(state): State<ApiState>, Json(input): Json<ChatInput>) -> Response {
    match state.agent.handle_chat(input).await {
        Ok(reply) => (StatusCode::OK, Json(reply)).into_response(),
        Err(error) => agent_error_response(error, "chat_failed"),
    }
}

async fn classify(
    State(state): State<ApiState>,
    Json(request): Json<ClassifyRequest>,
) -> impl IntoResponse {
    let normalized = lyra_core::normalize_text(&request.text);
    let intent = state.agent.classify(&normalized);
    (StatusCode::OK, Json(ClassifyResponse { normalized, intent }))
}

async fn dashboard(State(state): State<ApiState>, Query(query): Query<DashboardQuery>) -> Response {
    let period = match query.period.as_deref() {
        None => HoroscopePeriod::default(),
        Some(raw) => match raw.parse::<HoroscopePeriod>() {
            Ok(period) => period,
            Err(()) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "invalid_period",
                    "period must be daily, weekly or monthly",
                )
            }
        },
    };
    let (width, height) = chart_size(query.width, query.height);

    match state
        .agent
        .dashboard(&query.session_id, period, width, height)
        .await
    {
        Ok(dashboard) => (StatusCode::OK, Json(dashboard)).into_response(),
        Err(error) => agent_error_response(error, "dashboard_failed"),
    }
}

async fn chart_svg(State(state): State<ApiState>, Query(query): Query<ChartSvgQuery>) -> Response {
    let (width, height) = chart_size(query.width, query.height);

    let svg = match query.session_id.as_deref() {
        Some(session_id) => match state.agent.session_chart_svg(session_id, width, height).await {
            Ok(svg) => svg,
            Err(error) => return agent_error_response(error, "chart_failed"),
        },
        None => {
            let transits = state.agent.current_transits();
            state.agent.render_svg(&transits.chart, width, height)
        }
    };

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "image/svg+xml; charset=utf-8")],
        svg,
    )
        .into_response()
}

async fn chart(
    State(state): State<ApiState>,
    Json(request): Json<ChartRequest>,
) -> impl IntoResponse {
    let (width, height) = chart_size(request.width, request.height);
    let view = state.agent.chart(&request.birth, width, height);
    (StatusCode::OK, Json(view))
}

async fn transits(State(state): State<ApiState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.agent.current_transits()))
}

async fn compatibility(
    State(state): State<ApiState>,
    Json(request): Json<CompatibilityRequest>,
) -> impl IntoResponse {
    let report = state.agent.compatibility(&request.first, &request.second);
    (StatusCode::OK, Json(report))
}

fn chart_size(width: Option<u32>, height: Option<u32>) -> (u32, u32) {
    let clamp = |value: Option<u32>| value.unwrap_or(DEFAULT_CHART_SIZE).clamp(1, MAX_CHART_SIZE);
    (clamp(width), clamp(height))
}

fn agent_error_response(error: anyhow::Error, fallback_code: &'static str) -> Response {
    let (status, code) = match error.downcast_ref::<AgentError>() {
        Some(AgentError::SessionNotFound(_)) => (StatusCode::NOT_FOUND, "session_not_found"),
        Some(AgentError::EmptyMessage) => (StatusCode::BAD_REQUEST, "empty_message"),
        None if error.downcast_ref::<LyraError>().is_some() => {
            (StatusCode::BAD_REQUEST, "invalid_input")
        }
        None => {
            tracing::error!(error = %error, code = fallback_code, "request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, fallback_code)
        }
    };

    error_response(status, code, &error.to_string())
}

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(serde_json::json!({
            "error": code,
            "message": message
        })),
    )
        .into_response()
}

async fn api_key_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || is_public_endpoint(request.uri().path()) {
        return next.run(request).await;
    }

    let header_key = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if header_key != state.api_key {
        return error_response(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "missing or invalid x-api-key",
        );
    }

    next.run(request).await
}

async fn rate_limit_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || is_public_endpoint(request.uri().path()) {
        return next.run(request).await;
    }

    let ip = request_ip(&request, state.trust_forwarded_for);
    if !state.limiter.allow(&ip) {
        return error_response(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            "rate limit exceeded for this IP",
        );
    }

    next.run(request).await
}

async fn security_headers_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        header::HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    );
    headers.insert(
        header::HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        header::HeaderName::from_static("content-security-policy"),
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'; base-uri 'none'"),
    );

    response
}

fn is_public_endpoint(path: &str) -> bool {
    matches!(path, "/health")
}

/// The forwarded header is client-controlled, so it is only consulted when
/// the deployment says a proxy sets it.
fn request_ip(request: &Request<Body>, trust_forwarded_for: bool) -> String {
    let forwarded = trust_forwarded_for
        .then(|| {
            request
                .headers()
                .get("x-forwarded-for")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.split(',').next())
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        })
        .flatten();

    forwarded
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(peer)| peer.ip().to_string())
        })
        .unwrap_or_else(|| "local".to_string())
}

fn parse_allowed_origins() -> Vec<String> {
    let default_origins = [
        "http://localhost:5173",
        "http://127.0.0.1:5173",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
    ];

    env::var("LYRA_ALLOWED_ORIGINS")
        .ok()
        .map(|value| {
            value
                .split(',')
                .map(|origin| origin.trim().trim_end_matches('/').to_string())
                .filter(|origin| !origin.is_empty())
                .collect::<Vec<_>>()
        })
        .unwrap_or_else(|| {
            default_origins
                .iter()
                .map(|value| value.to_string())
                .collect()
        })
}

fn build_cors_layer(allowed_origins: &Arc<Vec<String>>) -> CorsLayer {
    let origins = allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect::<Vec<_>>();
    let origins = if origins.is_empty() {
        vec![HeaderValue::from_static("http://localhost:5173")]
    } else {
        origins
    };

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-api-key"),
        ])
}
