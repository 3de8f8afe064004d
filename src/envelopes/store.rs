use std::collections::HashMap;

use chrono::NaiveDateTime;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use thiserror::Error;
use uuid::Uuid;

use crate::ingest::builder::EnvelopeBundle;
use crate::models::{Envelope, NewProcessEvent, NonScannableItem, Payment, ProcessEvent, ScannableItem};
use crate::schema::{envelopes, non_scannable_items, payments, process_events, scannable_items};

use super::status::{Event, Status};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("envelope {0} not found")]
    NotFound(Uuid),

    #[error("envelope {id} cannot move from {from} to {to}")]
    IllegalTransition {
        id: Uuid,
        from: String,
        to: String,
    },

    #[error("event {0} does not change envelope status")]
    NoStatusChange(Event),

    #[error("envelope {id} carries unknown status {status}")]
    CorruptStatus { id: Uuid, status: String },

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persist a freshly built envelope with its children in one commit.
pub fn insert_envelope(conn: &mut PgConnection, bundle: &EnvelopeBundle) -> StoreResult<Envelope> {
    conn.transaction(|conn| {
        diesel::insert_into(envelopes::table)
            .values(&bundle.envelope)
            .execute(conn)?;
        diesel::insert_into(scannable_items::table)
            .values(&bundle.scannable_items)
            .execute(conn)?;
        diesel::insert_into(payments::table)
            .values(&bundle.payments)
            .execute(conn)?;
        diesel::insert_into(non_scannable_items::table)
            .values(&bundle.non_scannable_items)
            .execute(conn)?;
        envelopes::table.find(bundle.envelope.id).first(conn)
    })
    .map_err(StoreError::from)
}

/// Append an audit event on its own; used for events that precede or never
/// acquire an envelope row. Returns the event id for notification keying.
pub fn record_event(
    conn: &mut PgConnection,
    container: &str,
    zip_file_name: &str,
    event: Event,
    envelope_id: Option<Uuid>,
    reason: Option<&str>,
) -> StoreResult<i64> {
    let row = NewProcessEvent {
        container: container.to_string(),
        zip_file_name: zip_file_name.to_string(),
        event: event.as_str().to_string(),
        envelope_id,
        reason: reason.map(str::to_string),
    };
    let id = diesel::insert_into(process_events::table)
        .values(&row)
        .returning(process_events::id)
        .get_result(conn)?;
    Ok(id)
}

/// Whether the coordinator already flagged this archive as permanently
/// failed to upload. Coordinator-recorded failures carry no envelope id,
/// which distinguishes them from the uploader's own attempts.
pub fn has_orphan_upload_failure(
    conn: &mut PgConnection,
    container: &str,
    zip_file_name: &str,
) -> StoreResult<bool> {
    use diesel::dsl::{exists, select};

    let found = select(exists(
        process_events::table
            .filter(process_events::container.eq(container))
            .filter(process_events::zip_file_name.eq(zip_file_name))
            .filter(process_events::event.eq(Event::DocUploadFailure.as_str()))
            .filter(process_events::envelope_id.is_null()),
    ))
    .get_result(conn)?;
    Ok(found)
}

/// The at-most-one current envelope for an archive. Terminal failures never
/// create rows, so the most recent row is the current one.
pub fn find_current(
    conn: &mut PgConnection,
    container: &str,
    zip_file_name: &str,
) -> StoreResult<Option<Envelope>> {
    let envelope = envelopes::table
        .filter(envelopes::container.eq(container))
        .filter(envelopes::zip_file_name.eq(zip_file_name))
        .order(envelopes::created_at.desc())
        .first(conn)
        .optional()?;
    Ok(envelope)
}

pub fn find_by_id(conn: &mut PgConnection, id: Uuid) -> StoreResult<Envelope> {
    envelopes::table
        .find(id)
        .first(conn)
        .optional()?
        .ok_or(StoreError::NotFound(id))
}

/// Drive one envelope through the state machine: insert the event and apply
/// the matching status update in a single commit, serialized by a row lock.
pub fn transition(
    conn: &mut PgConnection,
    envelope_id: Uuid,
    event: Event,
    reason: Option<&str>,
) -> StoreResult<Envelope> {
    conn.transaction(|conn| transition_locked(conn, envelope_id, event, reason))
}

/// Record a successful upload: fill in the document URLs and advance to
/// `UPLOADED`, all in one commit.
pub fn mark_uploaded(
    conn: &mut PgConnection,
    envelope_id: Uuid,
    urls: &HashMap<String, String>,
) -> StoreResult<Envelope> {
    conn.transaction(|conn| {
        for (file_name, url) in urls {
            diesel::update(
                scannable_items::table
                    .filter(scannable_items::envelope_id.eq(envelope_id))
                    .filter(scannable_items::file_name.eq(file_name)),
            )
            .set(scannable_items::document_url.eq(url))
            .execute(conn)?;
        }
        transition_locked(conn, envelope_id, Event::DocUploaded, None)
    })
}

/// Record the downstream confirmation reference alongside the transition.
pub fn confirm(
    conn: &mut PgConnection,
    envelope_id: Uuid,
    event: Event,
    ccd_id: Option<&str>,
    ccd_action: Option<&str>,
) -> StoreResult<Envelope> {
    conn.transaction(|conn| {
        if ccd_id.is_some() || ccd_action.is_some() {
            diesel::update(envelopes::table.find(envelope_id))
                .set((
                    envelopes::ccd_id.eq(ccd_id),
                    envelopes::ccd_action.eq(ccd_action),
                ))
                .execute(conn)?;
        }
        transition_locked(conn, envelope_id, event, None)
    })
}

fn transition_locked(
    conn: &mut PgConnection,
    envelope_id: Uuid,
    event: Event,
    reason: Option<&str>,
) -> StoreResult<Envelope> {
    let next = event.status().ok_or(StoreError::NoStatusChange(event))?;

    let current: Envelope = envelopes::table
        .find(envelope_id)
        .for_update()
        .first(conn)
        .optional()?
        .ok_or(StoreError::NotFound(envelope_id))?;

    let from = Status::parse(&current.status).ok_or_else(|| StoreError::CorruptStatus {
        id: envelope_id,
        status: current.status.clone(),
    })?;

    if !from.can_transition(next) {
        return Err(StoreError::IllegalTransition {
            id: envelope_id,
            from: from.as_str().to_string(),
            to: next.as_str().to_string(),
        });
    }

    if event == Event::DocUploadFailure {
        diesel::update(envelopes::table.find(envelope_id))
            .set((
                envelopes::status.eq(next.as_str()),
                envelopes::upload_failure_count.eq(envelopes::upload_failure_count + 1),
            ))
            .execute(conn)?;
    } else {
        diesel::update(envelopes::table.find(envelope_id))
            .set(envelopes::status.eq(next.as_str()))
            .execute(conn)?;
    }

    record_event(
        conn,
        &current.container,
        &current.zip_file_name,
        event,
        Some(envelope_id),
        reason,
    )?;

    Ok(envelopes::table.find(envelope_id).first(conn)?)
}

/// Envelopes the uploader should pick up, oldest first. Envelopes at or
/// over the failure cap are left for operator attention.
pub fn find_upload_candidates(
    conn: &mut PgConnection,
    max_failures: i32,
) -> StoreResult<Vec<Envelope>> {
    let rows = envelopes::table
        .filter(
            envelopes::status.eq_any([Status::Created.as_str(), Status::UploadFailure.as_str()]),
        )
        .filter(envelopes::upload_failure_count.lt(max_failures))
        .order(envelopes::created_at.asc())
        .load(conn)?;
    Ok(rows)
}

/// Envelopes whose source blob is still around after processing finished.
pub fn find_deletable(conn: &mut PgConnection, container: &str) -> StoreResult<Vec<Envelope>> {
    let rows = envelopes::table
        .filter(envelopes::container.eq(container))
        .filter(envelopes::status.eq_any([
            Status::Processed.as_str(),
            Status::NotificationSent.as_str(),
            Status::Consumed.as_str(),
        ]))
        .filter(envelopes::zip_deleted.eq(false))
        .load(conn)?;
    Ok(rows)
}

pub fn mark_zip_deleted(conn: &mut PgConnection, envelope_id: Uuid) -> StoreResult<()> {
    diesel::update(envelopes::table.find(envelope_id))
        .set(envelopes::zip_deleted.eq(true))
        .execute(conn)?;
    Ok(())
}

pub fn find_by_status(conn: &mut PgConnection, status: Status) -> StoreResult<Vec<Envelope>> {
    let rows = envelopes::table
        .filter(envelopes::status.eq(status.as_str()))
        .order(envelopes::created_at.asc())
        .load(conn)?;
    Ok(rows)
}

/// Envelopes created before the cutoff that have not reached a processed
/// status; reconciliation reads these.
pub fn find_stale_before(
    conn: &mut PgConnection,
    cutoff: NaiveDateTime,
) -> StoreResult<Vec<Envelope>> {
    let rows = envelopes::table
        .filter(envelopes::created_at.lt(cutoff))
        .filter(diesel::dsl::not(envelopes::status.eq_any([
            Status::Processed.as_str(),
            Status::NotificationSent.as_str(),
            Status::Consumed.as_str(),
        ])))
        .order(envelopes::created_at.asc())
        .load(conn)?;
    Ok(rows)
}

pub fn find_by_zip_file_name(
    conn: &mut PgConnection,
    zip_file_name: &str,
) -> StoreResult<Vec<Envelope>> {
    let rows = envelopes::table
        .filter(envelopes::zip_file_name.eq(zip_file_name))
        .order(envelopes::created_at.desc())
        .load(conn)?;
    Ok(rows)
}

pub fn events_by_zip_file_name(
    conn: &mut PgConnection,
    zip_file_name: &str,
) -> StoreResult<Vec<ProcessEvent>> {
    let rows = process_events::table
        .filter(process_events::zip_file_name.eq(zip_file_name))
        .order(process_events::created_at.asc())
        .load(conn)?;
    Ok(rows)
}

pub fn items_for_envelope(
    conn: &mut PgConnection,
    envelope_id: Uuid,
) -> StoreResult<Vec<ScannableItem>> {
    let rows = scannable_items::table
        .filter(scannable_items::envelope_id.eq(envelope_id))
        .load(conn)?;
    Ok(rows)
}

pub fn payments_for_envelope(
    conn: &mut PgConnection,
    envelope_id: Uuid,
) -> StoreResult<Vec<Payment>> {
    let rows = payments::table
        .filter(payments::envelope_id.eq(envelope_id))
        .load(conn)?;
    Ok(rows)
}

pub fn non_scannables_for_envelope(
    conn: &mut PgConnection,
    envelope_id: Uuid,
) -> StoreResult<Vec<NonScannableItem>> {
    let rows = non_scannable_items::table
        .filter(non_scannable_items::envelope_id.eq(envelope_id))
        .load(conn)?;
    Ok(rows)
}

/// Scannable items whose DCN starts with the queried digits.
pub fn items_by_dcn_prefix(
    conn: &mut PgConnection,
    dcn: &str,
) -> StoreResult<Vec<ScannableItem>> {
    let pattern = format!("{}%", dcn.replace('%', "\\%").replace('_', "\\_"));
    let rows = scannable_items::table
        .filter(scannable_items::document_control_number.like(pattern))
        .load(conn)?;
    Ok(rows)
}
