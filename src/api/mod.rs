//! HTTP surface: routes, request logging and error mapping

pub mod error;
pub mod extract;
pub mod v1;
pub mod v2;

pub use error::ApiError;

use crate::server::AppState;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::time::Instant;
use tower_http::timeout::TimeoutLayer;

/// `{"participants": ...}` wrapper used by every v2 response
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub participants: T,
}

impl<T> Envelope<T> {
    pub fn new(participants: T) -> Self {
        Self { participants }
    }
}

/// Build the application router with all routes and middleware
pub fn router(state: AppState) -> Router {
    let timeout = state.config.request_timeout();

    Router::new()
        .route("/health", get(health))
        .route("/v1/participants", get(v1::index).post(v1::create))
        .route(
            "/v1/participants/:external_id",
            get(v1::show).put(v1::update).delete(v1::destroy),
        )
        .route("/v2/participants", get(v2::index).post(v2::create))
        .route(
            "/v2/participants/:external_id",
            get(v2::show).put(v2::update).delete(v2::destroy),
        )
        .layer(TimeoutLayer::new(timeout))
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

/// Liveness plus a round trip to the database
async fn health(State(state): State<AppState>) -> Response {
    match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => Json(json!({ "status": "ok" })).into_response(),
        Err(e) => {
            log::warn!("[HTTP] Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
                .into_response()
        }
    }
}

async fn log_requests(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(req).await;

    log::info!(
        "[HTTP] {} {} -> {} in {}ms",
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}
