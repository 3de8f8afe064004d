use std::collections::BTreeSet;

use axum::extract::{Query, State};
use axum::Json;
use chrono::NaiveDateTime;
use diesel::pg::PgConnection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::envelopes::store;
use crate::error::{AppError, AppResult};
use crate::models::{Envelope, NonScannableItem, Payment, ProcessEvent, ScannableItem};
use crate::state::AppState;

const MIN_DCN_LENGTH: usize = 6;

#[derive(Debug, Deserialize)]
pub struct ZipFileQuery {
    name: Option<String>,
    dcn: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ZipFileStatus {
    pub file_name: String,
    pub envelopes: Vec<ZipFileEnvelope>,
    pub events: Vec<ZipFileEvent>,
}

#[derive(Debug, Serialize)]
pub struct ZipFileEnvelope {
    pub id: Uuid,
    pub container: String,
    pub status: String,
    pub ccd_id: Option<String>,
    pub ccd_action: Option<String>,
    pub zip_deleted: bool,
    pub classification: String,
    pub jurisdiction: String,
    pub case_number: Option<String>,
    pub scannable_items: Vec<ZipFileItem>,
    pub payments: Vec<ZipFilePayment>,
    pub non_scannable_items: Vec<ZipFileNonScannable>,
}

#[derive(Debug, Serialize)]
pub struct ZipFilePayment {
    pub document_control_number: String,
    pub method: String,
    pub amount: Option<String>,
    pub currency: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ZipFileNonScannable {
    pub document_control_number: String,
    pub item_type: String,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ZipFileItem {
    pub document_control_number: String,
    pub scanning_date: NaiveDateTime,
    pub document_type: String,
    pub document_sub_type: Option<String>,
    pub file_name: String,
    pub document_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ZipFileEvent {
    pub event: String,
    pub container: String,
    pub created_at: NaiveDateTime,
    pub reason: Option<String>,
}

/// Status lookup for inbound archives. Exactly one of `name` or `dcn` must
/// be supplied; a DCN needs at least six characters and matches as a prefix.
pub async fn zip_file_status(
    State(state): State<AppState>,
    Query(query): Query<ZipFileQuery>,
) -> AppResult<Json<Vec<ZipFileStatus>>> {
    let mut conn = state.db()?;
    match (query.name, query.dcn) {
        (Some(name), None) => Ok(Json(vec![status_for_name(&mut conn, &name)?])),
        (None, Some(dcn)) => {
            if dcn.chars().count() < MIN_DCN_LENGTH {
                return Err(AppError::bad_request(format!(
                    "dcn must be at least {MIN_DCN_LENGTH} characters"
                )));
            }
            status_for_dcn(&mut conn, &dcn).map(Json)
        }
        _ => Err(AppError::bad_request(
            "exactly one of name or dcn must be provided",
        )),
    }
}

fn status_for_name(conn: &mut PgConnection, name: &str) -> AppResult<ZipFileStatus> {
    let envelopes = store::find_by_zip_file_name(conn, name)?;
    let events = store::events_by_zip_file_name(conn, name)?;

    let mut mapped = Vec::with_capacity(envelopes.len());
    for envelope in envelopes {
        mapped.push(map_envelope(conn, envelope)?);
    }

    Ok(ZipFileStatus {
        file_name: name.to_string(),
        envelopes: mapped,
        events: events.into_iter().map(map_event).collect(),
    })
}

fn status_for_dcn(conn: &mut PgConnection, dcn: &str) -> AppResult<Vec<ZipFileStatus>> {
    let items = store::items_by_dcn_prefix(conn, dcn)?;

    let envelope_ids: BTreeSet<Uuid> = items.iter().map(|item| item.envelope_id).collect();
    let mut file_names = BTreeSet::new();
    for id in envelope_ids {
        let envelope = store::find_by_id(conn, id)?;
        file_names.insert(envelope.zip_file_name);
    }

    let mut statuses = Vec::with_capacity(file_names.len());
    for name in file_names {
        statuses.push(status_for_name(conn, &name)?);
    }
    Ok(statuses)
}

fn map_envelope(conn: &mut PgConnection, envelope: Envelope) -> AppResult<ZipFileEnvelope> {
    let items = store::items_for_envelope(conn, envelope.id)?;
    let payments = store::payments_for_envelope(conn, envelope.id)?;
    let non_scannables = store::non_scannables_for_envelope(conn, envelope.id)?;
    Ok(ZipFileEnvelope {
        id: envelope.id,
        container: envelope.container,
        status: envelope.status,
        ccd_id: envelope.ccd_id,
        ccd_action: envelope.ccd_action,
        zip_deleted: envelope.zip_deleted,
        classification: envelope.classification,
        jurisdiction: envelope.jurisdiction,
        case_number: envelope.case_number,
        scannable_items: items.into_iter().map(map_item).collect(),
        payments: payments.into_iter().map(map_payment).collect(),
        non_scannable_items: non_scannables.into_iter().map(map_non_scannable).collect(),
    })
}

fn map_payment(payment: Payment) -> ZipFilePayment {
    ZipFilePayment {
        document_control_number: payment.document_control_number,
        method: payment.method,
        amount: payment.amount,
        currency: payment.currency,
    }
}

fn map_non_scannable(item: NonScannableItem) -> ZipFileNonScannable {
    ZipFileNonScannable {
        document_control_number: item.document_control_number,
        item_type: item.item_type,
        notes: item.notes,
    }
}

fn map_item(item: ScannableItem) -> ZipFileItem {
    ZipFileItem {
        document_control_number: item.document_control_number,
        scanning_date: item.scanning_date,
        document_type: item.document_type,
        document_sub_type: item.document_sub_type,
        file_name: item.file_name,
        document_url: item.document_url,
    }
}

fn map_event(event: ProcessEvent) -> ZipFileEvent {
    ZipFileEvent {
        event: event.event,
        container: event.container,
        created_at: event.created_at,
        reason: event.reason,
    }
}
