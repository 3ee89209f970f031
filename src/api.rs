use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use metrics::counter;
use tower_http::cors::CorsLayer;

use crate::dispatch::{dispatch, FeedContext, Window};

#[derive(Clone)]
pub struct AppState {
    pub feed: Arc<FeedContext>,
    pub max_count: usize,
}

impl AppState {
    pub fn new(feed: FeedContext, max_count: usize) -> Self {
        Self {
            feed: Arc::new(feed),
            max_count,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(serve_content).fallback(method_not_allowed))
        .route("/health", get(|| async { "ok" }))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("method not allowed. Use GET method")]
    MethodNotAllowed,
    #[error("missing query parameter `{0}`")]
    MissingParam(&'static str),
    #[error("query parameter `{name}` must be a non-negative integer, got `{value}`")]
    InvalidParam { name: &'static str, value: String },
    #[error("count {requested} exceeds the maximum window of {max}")]
    WindowTooLarge { requested: usize, max: usize },
    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::MissingParam(_)
            | ApiError::InvalidParam { .. }
            | ApiError::WindowTooLarge { .. } => StatusCode::BAD_REQUEST,
            ApiError::Encode(_) => StatusCode::BAD_GATEWAY,
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        if status == StatusCode::METHOD_NOT_ALLOWED {
            return (status, [(header::ALLOW, "GET")], body).into_response();
        }
        (status, body).into_response()
    }
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

fn parse_param<T: std::str::FromStr>(
    q: &HashMap<String, String>,
    name: &'static str,
) -> Result<T, ApiError> {
    let raw = q.get(name).ok_or(ApiError::MissingParam(name))?;
    raw.trim().parse().map_err(|_| ApiError::InvalidParam {
        name,
        value: raw.clone(),
    })
}

/// Requester key handed to providers: forwarded client, then socket peer, then "anonymous".
fn requester_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|p| p.to_string()))
        .unwrap_or_else(|| "anonymous".to_string())
}

async fn serve_content(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
    request: Request,
) -> Result<Response, ApiError> {
    let offset: u64 = parse_param(&q, "offset")?;
    let count: usize = parse_param(&q, "count")?;
    if count > state.max_count {
        return Err(ApiError::WindowTooLarge {
            requested: count,
            max: state.max_count,
        });
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0);
    let requester = requester_key(request.headers(), peer);
    tracing::info!(target: "api", offset, count, requester = %requester, "GET /");
    counter!("feed_requests_total").increment(1);

    let items = dispatch(
        Arc::clone(&state.feed),
        Window::new(offset, count),
        Arc::from(requester),
    )
    .await;

    let body = serde_json::to_vec(&items)?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response())
}
