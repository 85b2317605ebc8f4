//! Messaging session endpoints.

use axum::Json;
use axum::extract::State;
use chrono::Local;
use parlor_messaging::ConnectOutcome;
use parlor_store::sendlog::SendKind;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::warn;

use crate::error::ServerError;
use crate::routes::{ok, ok_message};
use crate::state::AppState;

/// Entries returned by the send-log endpoint.
const SEND_LOG_TAIL: usize = 50;

/// GET /api/messaging/status
pub async fn status(State(app): State<AppState>) -> Json<Value> {
    ok(app.supervisor.status_snapshot())
}

/// POST /api/messaging/connect
pub async fn connect(State(app): State<AppState>) -> Result<Json<Value>, ServerError> {
    let outcome = app.supervisor.connect().await?;
    let message = match outcome {
        ConnectOutcome::AlreadyConnected => "session already connected",
        ConnectOutcome::Started => "connect started; pair the device if prompted",
    };
    Ok(ok_message(message))
}

/// POST /api/messaging/disconnect
pub async fn disconnect(State(app): State<AppState>) -> Json<Value> {
    app.supervisor.disconnect().await;
    ok_message("session disconnected")
}

/// POST /api/messaging/clear-session
pub async fn clear_session(State(app): State<AppState>) -> Json<Value> {
    app.supervisor.clear_session().await;
    ok_message("session storage cleared")
}

/// GET /api/messaging/qr-code
pub async fn qr_code(State(app): State<AppState>) -> Json<Value> {
    let artifact = app.supervisor.current_artifact();
    ok(json!({
        "hasQrCode": artifact.is_some(),
        "qrCode": artifact
            .as_ref()
            .map(|a| a.rendered_image.clone().unwrap_or_else(|| a.raw_code.clone())),
        "issuedAt": artifact.as_ref().map(|a| a.issued_at),
    }))
}

/// GET /api/messaging/pairing-code
pub async fn pairing_code(State(app): State<AppState>) -> Json<Value> {
    let code = app.supervisor.pairing_code();
    ok(json!({
        "hasPairingCode": code.is_some(),
        "pairingCode": code,
    }))
}

/// Body of POST /api/messaging/send.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    /// Recipient as entered by the operator.
    pub to: String,
    /// Message text.
    pub body: String,
}

/// POST /api/messaging/send
pub async fn send(
    State(app): State<AppState>,
    Json(request): Json<SendRequest>,
) -> Result<Json<Value>, ServerError> {
    match app.gateway.send(&request.to, &request.body).await {
        Ok(receipt) => {
            if let Err(e) =
                app.stores
                    .send_log
                    .record_sent(&receipt.recipient, SendKind::Manual, &receipt.message_id)
            {
                warn!(error = %e, "could not append to send log");
            }
            Ok(ok(receipt))
        }
        Err(e) => {
            if let Err(log_err) =
                app.stores
                    .send_log
                    .record_failed(&request.to, SendKind::Manual, &e.to_string())
            {
                warn!(error = %log_err, "could not append to send log");
            }
            Err(e.into())
        }
    }
}

/// GET /api/messaging/today-appointments
pub async fn today_appointments(State(app): State<AppState>) -> Result<Json<Value>, ServerError> {
    let today = Local::now().date_naive();
    Ok(ok(app.stores.appointments.on_date(today)?))
}

/// POST /api/messaging/confirmations
pub async fn confirmations(State(app): State<AppState>) -> Result<Json<Value>, ServerError> {
    Ok(ok(app.notifier.send_bulk_confirmations().await?))
}

/// Body of POST /api/messaging/cancellations.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationRequest {
    /// Reason forwarded to clients; a generic one is used when omitted.
    #[serde(default)]
    pub reason: Option<String>,
}

/// POST /api/messaging/cancellations
pub async fn cancellations(
    State(app): State<AppState>,
    Json(request): Json<CancellationRequest>,
) -> Result<Json<Value>, ServerError> {
    let reason = request
        .reason
        .unwrap_or_else(|| "technical difficulties".to_string());
    Ok(ok(app.notifier.send_bulk_cancellations(&reason).await?))
}

/// POST /api/messaging/report-daily
pub async fn report_daily(State(app): State<AppState>) -> Result<Json<Value>, ServerError> {
    app.notifier.send_daily_report().await?;
    Ok(ok_message("daily report sent"))
}

/// GET /api/messaging/log
pub async fn send_log(State(app): State<AppState>) -> Result<Json<Value>, ServerError> {
    Ok(ok(app.stores.send_log.recent(SEND_LOG_TAIL)?))
}

/// POST /api/messaging/log/clear
pub async fn clear_send_log(State(app): State<AppState>) -> Result<Json<Value>, ServerError> {
    app.stores.send_log.clear()?;
    Ok(ok_message("send log cleared"))
}
