use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::envelopes::status::{Event, Status};
use crate::envelopes::store;
use crate::error::{AppError, AppResult};
use crate::ingest::metafile::parse_timestamp;
use crate::models::Envelope;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct EnvelopeResponse {
    pub id: Uuid,
    pub container: String,
    pub jurisdiction: String,
    pub po_box: String,
    pub case_number: Option<String>,
    pub classification: String,
    pub zip_file_name: String,
    pub status: String,
    pub upload_failure_count: i32,
    pub zip_deleted: bool,
    pub ccd_id: Option<String>,
    pub ccd_action: Option<String>,
    pub created_at: NaiveDateTime,
}

impl From<Envelope> for EnvelopeResponse {
    fn from(envelope: Envelope) -> Self {
        Self {
            id: envelope.id,
            container: envelope.container,
            jurisdiction: envelope.jurisdiction,
            po_box: envelope.po_box,
            case_number: envelope.case_number,
            classification: envelope.classification,
            zip_file_name: envelope.zip_file_name,
            status: envelope.status,
            upload_failure_count: envelope.upload_failure_count,
            zip_deleted: envelope.zip_deleted,
            ccd_id: envelope.ccd_id,
            ccd_action: envelope.ccd_action,
            created_at: envelope.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    status: String,
}

pub async fn list_envelopes(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<EnvelopeResponse>>> {
    let status = Status::parse(&query.status)
        .ok_or_else(|| AppError::bad_request(format!("unknown status {:?}", query.status)))?;
    let mut conn = state.db()?;
    let envelopes = store::find_by_status(&mut conn, status)?;
    Ok(Json(
        envelopes.into_iter().map(EnvelopeResponse::from).collect(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct StaleQuery {
    before: String,
}

/// Envelopes created before the cutoff that never reached a processed
/// status; reconciliation tooling reads this.
pub async fn list_stale_envelopes(
    State(state): State<AppState>,
    Query(query): Query<StaleQuery>,
) -> AppResult<Json<Vec<EnvelopeResponse>>> {
    let cutoff = parse_timestamp(&query.before)
        .map_err(|err| AppError::bad_request(format!("invalid before parameter: {err}")))?;
    let mut conn = state.db()?;
    let envelopes = store::find_stale_before(&mut conn, cutoff)?;
    Ok(Json(
        envelopes.into_iter().map(EnvelopeResponse::from).collect(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub event: String,
    pub ccd_id: Option<String>,
    pub ccd_action: Option<String>,
}

/// Downstream confirmation surface: advances an envelope through the tail
/// of its lifecycle. Only consumer-driven events are accepted here.
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ConfirmRequest>,
) -> AppResult<Json<EnvelopeResponse>> {
    let event = Event::parse(&request.event)
        .ok_or_else(|| AppError::bad_request(format!("unknown event {:?}", request.event)))?;

    if !matches!(
        event,
        Event::DocProcessed | Event::DocProcessedNotificationSent | Event::DocConsumed
    ) {
        return Err(AppError::bad_request(format!(
            "event {event} cannot be posted by a consumer"
        )));
    }

    let mut conn = state.db()?;
    let envelope = store::confirm(
        &mut conn,
        id,
        event,
        request.ccd_id.as_deref(),
        request.ccd_action.as_deref(),
    )?;
    Ok(Json(envelope.into()))
}
