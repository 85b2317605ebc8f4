//! Thin CRUD over the JSON record stores.
//!
//! One set of handlers serves all five record types, dispatched on the
//! `{kind}` path segment. These are deliberately plumbing-only: no
//! validation beyond what serde enforces, no business rules.

use axum::Json;
use axum::extract::{Path, State};
use parlor_store::records::{Appointment, Client, Review, ServiceOffering, StaffMember};
use parlor_store::{JsonStore, Record, StoreError};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::ServerError;
use crate::routes::{ok, ok_message};
use crate::state::AppState;

#[derive(Clone, Copy, Debug)]
enum RecordKind {
    Appointments,
    Clients,
    Services,
    Staff,
    Reviews,
}

fn parse_kind(kind: &str) -> Result<RecordKind, ServerError> {
    match kind {
        "appointments" => Ok(RecordKind::Appointments),
        "clients" => Ok(RecordKind::Clients),
        "services" => Ok(RecordKind::Services),
        "staff" => Ok(RecordKind::Staff),
        "reviews" => Ok(RecordKind::Reviews),
        other => Err(ServerError::UnknownResource(other.to_string())),
    }
}

fn list_in<T: Record>(store: &JsonStore<T>) -> Result<Value, ServerError> {
    Ok(serde_json::to_value(store.load()?).map_err(StoreError::from)?)
}

fn create_in<T: Record>(store: &JsonStore<T>, value: Value) -> Result<Value, ServerError> {
    let record: T = serde_json::from_value(value).map_err(StoreError::from)?;
    Ok(serde_json::to_value(store.insert(record)?).map_err(StoreError::from)?)
}

fn replace_in<T: Record>(store: &JsonStore<T>, value: Value) -> Result<Value, ServerError> {
    let record: T = serde_json::from_value(value).map_err(StoreError::from)?;
    Ok(serde_json::to_value(store.replace(record)?).map_err(StoreError::from)?)
}

/// GET /api/records/{kind}
pub async fn list(
    State(app): State<AppState>,
    Path(kind): Path<String>,
) -> Result<Json<Value>, ServerError> {
    let data = match parse_kind(&kind)? {
        RecordKind::Appointments => list_in(&app.stores.appointments)?,
        RecordKind::Clients => list_in(&app.stores.clients)?,
        RecordKind::Services => list_in(&app.stores.services)?,
        RecordKind::Staff => list_in(&app.stores.staff)?,
        RecordKind::Reviews => list_in(&app.stores.reviews)?,
    };
    Ok(ok(data))
}

/// POST /api/records/{kind}
pub async fn create(
    State(app): State<AppState>,
    Path(kind): Path<String>,
    Json(value): Json<Value>,
) -> Result<Json<Value>, ServerError> {
    if !value.is_object() {
        return Err(ServerError::BadRequest("expected a JSON object".to_string()));
    }
    let data = match parse_kind(&kind)? {
        RecordKind::Appointments => create_in::<Appointment>(&app.stores.appointments, value)?,
        RecordKind::Clients => create_in::<Client>(&app.stores.clients, value)?,
        RecordKind::Services => create_in::<ServiceOffering>(&app.stores.services, value)?,
        RecordKind::Staff => create_in::<StaffMember>(&app.stores.staff, value)?,
        RecordKind::Reviews => create_in::<Review>(&app.stores.reviews, value)?,
    };
    Ok(ok(data))
}

/// PUT /api/records/{kind}/{id}
pub async fn update(
    State(app): State<AppState>,
    Path((kind, id)): Path<(String, Uuid)>,
    Json(mut value): Json<Value>,
) -> Result<Json<Value>, ServerError> {
    let Some(object) = value.as_object_mut() else {
        return Err(ServerError::BadRequest("expected a JSON object".to_string()));
    };
    // the path id wins over whatever the body carries
    let _ = object.insert("id".to_string(), json!(id));

    let data = match parse_kind(&kind)? {
        RecordKind::Appointments => replace_in::<Appointment>(&app.stores.appointments, value)?,
        RecordKind::Clients => replace_in::<Client>(&app.stores.clients, value)?,
        RecordKind::Services => replace_in::<ServiceOffering>(&app.stores.services, value)?,
        RecordKind::Staff => replace_in::<StaffMember>(&app.stores.staff, value)?,
        RecordKind::Reviews => replace_in::<Review>(&app.stores.reviews, value)?,
    };
    Ok(ok(data))
}

/// DELETE /api/records/{kind}/{id}
pub async fn remove(
    State(app): State<AppState>,
    Path((kind, id)): Path<(String, Uuid)>,
) -> Result<Json<Value>, ServerError> {
    let removed = match parse_kind(&kind)? {
        RecordKind::Appointments => app.stores.appointments.remove(id)?,
        RecordKind::Clients => app.stores.clients.remove(id)?,
        RecordKind::Services => app.stores.services.remove(id)?,
        RecordKind::Staff => app.stores.staff.remove(id)?,
        RecordKind::Reviews => app.stores.reviews.remove(id)?,
    };
    if removed {
        Ok(ok_message("record deleted"))
    } else {
        Err(StoreError::NotFound { id }.into())
    }
}
