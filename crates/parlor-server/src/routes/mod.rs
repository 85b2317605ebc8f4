//! Route assembly and the shared response envelope.
//!
//! Every endpoint answers with the `{"success": …}` envelope the operator
//! UI polls: `data` on success, `error`/`message` on failure (see
//! [`crate::error::ServerError`]).

pub mod messaging;
pub mod records;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::{get, post, put};
use serde::Serialize;
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Wrap `data` in the success envelope.
pub(crate) fn ok<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({ "success": true, "data": data }))
}

/// Success envelope with a human-readable message instead of data.
pub(crate) fn ok_message(message: &str) -> Json<Value> {
    Json(json!({ "success": true, "message": message }))
}

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/messaging/status", get(messaging::status))
        .route("/api/messaging/connect", post(messaging::connect))
        .route("/api/messaging/disconnect", post(messaging::disconnect))
        .route("/api/messaging/clear-session", post(messaging::clear_session))
        .route("/api/messaging/qr-code", get(messaging::qr_code))
        .route("/api/messaging/pairing-code", get(messaging::pairing_code))
        .route("/api/messaging/send", post(messaging::send))
        .route(
            "/api/messaging/today-appointments",
            get(messaging::today_appointments),
        )
        .route("/api/messaging/confirmations", post(messaging::confirmations))
        .route("/api/messaging/cancellations", post(messaging::cancellations))
        .route("/api/messaging/report-daily", post(messaging::report_daily))
        .route("/api/messaging/log", get(messaging::send_log))
        .route("/api/messaging/log/clear", post(messaging::clear_send_log))
        .route("/api/records/{kind}", get(records::list).post(records::create))
        .route(
            "/api/records/{kind}/{id}",
            put(records::update).delete(records::remove),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /health
async fn health(State(app): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "uptimeSecs": app.start_time.elapsed().as_secs(),
        "session": app.supervisor.status(),
    }))
}
