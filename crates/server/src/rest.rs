//! REST API
//!
//! Serves the store over `/v1`:
//!
//! - `POST /v1/find` - one page of records matching a [`Request`]
//! - `POST /v1/stream` - NDJSON follow: pages are written and flushed as
//!   they appear until the `timeout` query (capped at 5 minutes) elapses
//! - `GET /v1/last` - newest published record
//!
//! The middleware stack mirrors the rest of the fleet: request-id
//! set/propagate, panic recovery, a global in-flight limit, a 1 KiB body
//! limit, `/ping`, app-info headers and request tracing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::{header::HeaderName, HeaderValue, Request as HttpRequest, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use dkll_core::{LogEntry, Request};
use dkll_store::StoreError;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Ceiling (and default) for one `/stream` request.
pub const MAX_STREAM_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Default page poll cadence for `/stream`.
pub const DEFAULT_STREAM_DURATION: Duration = Duration::from_millis(250);

/// In-flight request cap.
const MAX_IN_FLIGHT: usize = 100;

/// Request body cap.
const MAX_BODY_BYTES: usize = 1024;

/// Store access needed by the handlers.
#[async_trait]
pub trait DataService: Send + Sync {
    async fn find(&self, req: &Request) -> Result<Vec<LogEntry>, StoreError>;
    async fn last_published(&self) -> Result<Option<LogEntry>, StoreError>;
}

#[async_trait]
impl DataService for dkll_store::LogStore {
    async fn find(&self, req: &Request) -> Result<Vec<LogEntry>, StoreError> {
        dkll_store::LogStore::find(self, req).await
    }

    async fn last_published(&self) -> Result<Option<LogEntry>, StoreError> {
        dkll_store::LogStore::last_published(self).await
    }
}

/// REST server configuration.
#[derive(Debug, Clone)]
pub struct RestConfig {
    pub address: String,
    pub port: u16,
    /// Per-request page cap applied before the store's own cap.
    pub limit: usize,
    /// `/stream` poll cadence.
    pub stream_duration: Duration,
    /// Reported in the `X-App-Version` header.
    pub version: String,
}

impl Default for RestConfig {
    fn default() -> Self {
        RestConfig {
            address: "0.0.0.0".into(),
            port: 8080,
            limit: 100,
            stream_duration: DEFAULT_STREAM_DURATION,
            version: "unknown".into(),
        }
    }
}

/// REST server over a [`DataService`].
pub struct RestServer {
    config: RestConfig,
    data: Arc<dyn DataService>,
}

#[derive(Clone)]
struct AppState {
    data: Arc<dyn DataService>,
    limit: usize,
    stream_duration: Duration,
}

/// Request-id values reuse the store's id format.
#[derive(Clone)]
struct MakeEntryRequestId(Arc<dkll_core::IdGenerator>);

impl MakeRequestId for MakeEntryRequestId {
    fn make_request_id<B>(&mut self, _request: &HttpRequest<B>) -> Option<RequestId> {
        HeaderValue::from_str(&self.0.next().to_string())
            .ok()
            .map(RequestId::new)
    }
}

impl RestServer {
    pub fn new(config: RestConfig, data: Arc<dyn DataService>) -> RestServer {
        RestServer { config, data }
    }

    /// Build the router with the full middleware stack.
    pub fn router(&self) -> Router {
        let state = AppState {
            data: Arc::clone(&self.data),
            limit: self.config.limit,
            stream_duration: self.config.stream_duration,
        };

        let x_request_id = HeaderName::from_static("x-request-id");
        let version = HeaderValue::from_str(&self.config.version)
            .unwrap_or_else(|_| HeaderValue::from_static("unknown"));

        Router::new()
            .route("/v1/find", post(find_ctrl))
            .route("/v1/stream", post(stream_ctrl))
            .route("/v1/last", get(last_ctrl))
            .route("/ping", get(ping_ctrl))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(
                        x_request_id.clone(),
                        MakeEntryRequestId(Arc::new(dkll_core::IdGenerator::new())),
                    ))
                    .layer(PropagateRequestIdLayer::new(x_request_id))
                    .layer(CatchPanicLayer::new())
                    .layer(GlobalConcurrencyLimitLayer::new(MAX_IN_FLIGHT))
                    .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
                    .layer(SetResponseHeaderLayer::if_not_present(
                        HeaderName::from_static("x-app-name"),
                        HeaderValue::from_static("dkll"),
                    ))
                    .layer(SetResponseHeaderLayer::if_not_present(
                        HeaderName::from_static("x-app-version"),
                        version,
                    ))
                    .layer(TraceLayer::new_for_http().make_span_with(request_span)),
            )
    }

    /// Bind and serve until the token fires.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), std::io::Error> {
        let addr = format!("{}:{}", self.config.address, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        info!(addr = %listener.local_addr()?, "activate rest server");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(cancel.cancelled_owned())
            .await?;
        warn!("rest server terminated");
        Ok(())
    }
}

/// POST /v1/find - one page matching the request body.
async fn find_ctrl(State(state): State<AppState>, body: Bytes) -> Response {
    let mut req: Request = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => return bad_request(&format!("can't decode request: {e}")),
    };
    cap_limit(&mut req, state.limit);

    match state.data.find(&req).await {
        Ok(recs) => Json(recs).into_response(),
        Err(e) => bad_request(&e.to_string()),
    }
}

/// GET /v1/last - newest published record.
async fn last_ctrl(State(state): State<AppState>) -> Response {
    match state.data.last_published().await {
        Ok(entry) => Json(entry.unwrap_or_default()).into_response(),
        Err(e) => bad_request(&e.to_string()),
    }
}

/// GET /ping
async fn ping_ctrl() -> &'static str {
    "pong"
}

#[derive(serde::Deserialize, Default)]
struct StreamParams {
    timeout: Option<String>,
}

/// POST /v1/stream?timeout=<dur> - NDJSON pages until the timeout elapses.
async fn stream_ctrl(
    State(state): State<AppState>,
    Query(params): Query<StreamParams>,
    body: Bytes,
) -> Response {
    let mut req: Request = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => return bad_request(&format!("can't decode request: {e}")),
    };
    cap_limit(&mut req, state.limit);

    let timeout = params
        .timeout
        .as_deref()
        .and_then(parse_duration)
        .unwrap_or(MAX_STREAM_TIMEOUT)
        .min(MAX_STREAM_TIMEOUT);

    let (tx, rx) = mpsc::channel::<Result<Bytes, std::convert::Infallible>>(16);
    let data = Arc::clone(&state.data);
    let stream_duration = state.stream_duration;

    tokio::spawn(async move {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if tokio::time::Instant::now() >= deadline {
                return;
            }
            match data.find(&req).await {
                Ok(recs) if !recs.is_empty() => {
                    let mut page = Vec::new();
                    for rec in &recs {
                        match serde_json::to_vec(rec) {
                            Ok(line) => {
                                page.extend_from_slice(&line);
                                page.push(b'\n');
                            }
                            Err(e) => warn!(error = %e, "failed to encode record"),
                        }
                    }
                    if let Some(last) = recs.last() {
                        req.last_id = last.id.clone();
                    }
                    if tx.send(Ok(Bytes::from(page))).await.is_err() {
                        return; // client went away
                    }
                    tokio::time::sleep(stream_duration / 2).await;
                }
                Ok(_) => tokio::time::sleep(stream_duration).await,
                Err(e) => {
                    warn!(error = %e, "stream find failed");
                    return;
                }
            }
        }
    });

    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "application/x-ndjson")
        .body(Body::from_stream(ReceiverStream::new(rx)))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Request span carrying the real client ip, honoring proxy headers.
fn request_span(request: &HttpRequest<Body>) -> tracing::Span {
    let real_ip = request
        .headers()
        .get("x-real-ip")
        .or_else(|| request.headers().get("x-forwarded-for"))
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .unwrap_or("-")
        .to_string();
    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        ip = %real_ip,
    )
}

/// Apply the server page cap; 0 means "server default".
fn cap_limit(req: &mut Request, limit: usize) {
    if limit > 0 && (req.limit == 0 || req.limit > limit) {
        req.limit = limit;
    }
}

fn bad_request(msg: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
}

/// Parse `300ms` / `45s` / `5m` / `1h` durations.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let (number, unit) = s.split_at(s.find(|c: char| c.is_ascii_alphabetic())?);
    let value: u64 = number.parse().ok()?;
    match unit {
        "ms" => Some(Duration::from_millis(value)),
        "s" => Some(Duration::from_secs(value)),
        "m" => Some(Duration::from_secs(value * 60)),
        "h" => Some(Duration::from_secs(value * 3600)),
        _ => None,
    }
}

#[cfg(test)]
#[path = "rest_test.rs"]
mod rest_test;
