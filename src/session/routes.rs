//! REST endpoints that drive a guide session.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;

use crate::error::SessionError;
use crate::stages::Horizon;

use super::manager::GuideSession;

/// Shared state for session routes.
#[derive(Clone)]
pub struct SessionRouteState {
    pub session: Arc<Mutex<GuideSession>>,
}

#[derive(Debug, Deserialize)]
struct IntakeBody {
    text: String,
}

#[derive(Debug, Deserialize)]
struct HorizonBody {
    horizon: Horizon,
}

/// GET /api/session
///
/// Current snapshot, after applying any stage results that already arrived.
async fn get_session(State(state): State<SessionRouteState>) -> impl IntoResponse {
    let mut session = state.session.lock().await;
    session.drain_ready();
    Json(session.snapshot())
}

/// POST /api/session/intake
///
/// Answers the current intake question. The completing answer also starts
/// the pipeline.
async fn post_intake(
    State(state): State<SessionRouteState>,
    Json(body): Json<IntakeBody>,
) -> impl IntoResponse {
    let mut session = state.session.lock().await;
    Json(session.submit_and_hand_off(&body.text).await)
}

/// POST /api/session/advance
async fn post_advance(State(state): State<SessionRouteState>) -> Response {
    let mut session = state.session.lock().await;
    session.drain_ready();
    match session.advance() {
        Ok(_) => Json(session.snapshot()).into_response(),
        Err(e) => conflict(e),
    }
}

/// POST /api/session/retry
async fn post_retry(State(state): State<SessionRouteState>) -> Response {
    let mut session = state.session.lock().await;
    session.drain_ready();
    match session.retry() {
        Ok(()) => Json(session.snapshot()).into_response(),
        Err(e) => conflict(e),
    }
}

/// POST /api/session/horizon
async fn post_horizon(
    State(state): State<SessionRouteState>,
    Json(body): Json<HorizonBody>,
) -> Response {
    let mut session = state.session.lock().await;
    session.drain_ready();
    match session.select_horizon(body.horizon) {
        Ok(()) => Json(session.snapshot()).into_response(),
        Err(e) => conflict(e),
    }
}

fn conflict(err: SessionError) -> Response {
    (
        StatusCode::CONFLICT,
        Json(serde_json::json!({"error": err.to_string()})),
    )
        .into_response()
}

/// Build the session REST routes.
pub fn session_routes(state: SessionRouteState) -> Router {
    Router::new()
        .route("/api/session", get(get_session))
        .route("/api/session/intake", post(post_intake))
        .route("/api/session/advance", post(post_advance))
        .route("/api/session/retry", post(post_retry))
        .route("/api/session/horizon", post(post_horizon))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
