use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use diesel::pg::PgConnection;
use rand::seq::SliceRandom;
use tracing::{debug, error, info, warn};

use crate::envelopes::status::{Event, Status};
use crate::envelopes::store;
use crate::ingest::verify::SignedArchive;
use crate::ingest::{self, builder, IngestError};
use crate::notify::{ErrorCode, ErrorMsg};
use crate::state::AppState;
use crate::storage::Lease;

use super::ScheduledTask;

/// Scheduled driver over the input containers: leases each ready archive,
/// pipes it through verification and validation, and routes the outcome to
/// persistence, the notification bus and the rejected container.
pub struct IngestTask {
    state: Arc<AppState>,
}

impl IngestTask {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    async fn process_container(&self, container: &str) -> anyhow::Result<()> {
        let mut names = self.state.blobs.list_archives(container).await?;
        // Randomised order keeps replicas from contending on the same lease.
        names.shuffle(&mut rand::thread_rng());
        debug!(container = %container, archives = names.len(), "scanning container");

        for name in names {
            if let Err(err) = self.process_archive(container, &name).await {
                error!(
                    container = %container,
                    zip = %name,
                    error = %err,
                    "archive processing failed"
                );
            }
        }
        Ok(())
    }

    async fn process_archive(&self, container: &str, name: &str) -> anyhow::Result<()> {
        let Some(modified) = self.state.blobs.last_modified(container, name).await? else {
            return Ok(());
        };
        if !ready_to_process(
            modified,
            Utc::now().naive_utc(),
            self.state.config.blob_processing_delay_minutes,
        ) {
            // The bureau's upload may still be in flight.
            debug!(container = %container, zip = %name, "archive too fresh, skipping");
            return Ok(());
        }

        let mut conn = self.state.pool.get().context("database pool")?;

        if let Some(envelope) = store::find_current(&mut conn, container, name)? {
            let status = Status::parse(&envelope.status);
            if status.map(|s| s.is_processed()).unwrap_or(false) && !envelope.zip_deleted {
                self.state.blobs.delete_if_exists(container, name).await?;
                store::mark_zip_deleted(&mut conn, envelope.id)?;
                info!(container = %container, zip = %name, "deleted blob of processed envelope");
            } else if status == Some(Status::UploadFailure)
                && envelope.upload_failure_count >= self.state.config.max_upload_failures
                && !store::has_orphan_upload_failure(&mut conn, container, name)?
            {
                // Flag the parked archive once; it stays in place for
                // operator attention and must not spam the audit log on
                // every tick.
                let err = IngestError::PreviouslyFailedToUpload {
                    zip_file_name: name.to_string(),
                };
                self.handle_failure(&mut conn, container, name, &err).await?;
            }
            // Any other existing row means the envelope is in flight.
            return Ok(());
        }

        let ttl = Duration::from_secs(self.state.config.lease_ttl_seconds);
        let Some(lease) = self.state.blobs.acquire_lease(container, name, ttl).await? else {
            debug!(container = %container, zip = %name, "lease busy");
            return Ok(());
        };

        info!(container = %container, zip = %name, "processing archive");
        store::record_event(
            &mut conn,
            container,
            name,
            Event::ZipfileProcessingStarted,
            None,
            None,
        )?;

        match self.ingest_archive(&mut conn, container, name).await {
            Ok(envelope_id) => {
                info!(
                    container = %container,
                    zip = %name,
                    envelope = %envelope_id,
                    "envelope created"
                );
            }
            Err(err) => {
                self.handle_failure(&mut conn, container, name, &err).await?;
            }
        }

        self.release(container, name, &lease).await;
        Ok(())
    }

    async fn ingest_archive(
        &self,
        conn: &mut PgConnection,
        container: &str,
        name: &str,
    ) -> Result<uuid::Uuid, IngestError> {
        let bytes = self
            .state
            .blobs
            .get_object(container, name)
            .await
            .map_err(IngestError::Blob)?;

        let parsed = ingest::read_envelope(
            &SignedArchive {
                container,
                zip_file_name: name,
                bytes: &bytes,
            },
            &self.state.signature,
        )?;

        let pdf_names: Vec<String> = parsed
            .pdfs
            .iter()
            .map(|pdf| pdf.file_name.clone())
            .collect();
        let bundle = builder::build(
            container,
            &self.state.config.container_jurisdictions,
            &parsed.metafile,
            &pdf_names,
        )?;

        let envelope = store::insert_envelope(conn, &bundle)
            .map_err(|err| IngestError::Other(err.into()))?;
        Ok(envelope.id)
    }

    /// Sole sink for classified failures: event, then notification and
    /// rejected-move where the taxonomy says so. Transient trouble records
    /// nothing; the blob stays and the next tick retries.
    async fn handle_failure(
        &self,
        conn: &mut PgConnection,
        container: &str,
        name: &str,
        err: &IngestError,
    ) -> anyhow::Result<()> {
        let Some(event) = err.event() else {
            warn!(
                container = %container,
                zip = %name,
                error = %err,
                "transient failure, will retry next tick"
            );
            return Ok(());
        };

        warn!(container = %container, zip = %name, event = %event, error = %err, "archive rejected");
        let event_id =
            store::record_event(conn, container, name, event, None, Some(&err.to_string()))?;

        if err.rejects_archive() {
            if let Some(code) = ErrorCode::for_error(err) {
                let message = ErrorMsg::new(
                    event_id,
                    name,
                    container,
                    code,
                    err.to_string(),
                    self.state.config.is_test_container(container),
                );
                if let Err(bus_err) = self.state.notifications.send(&message).await {
                    // Best effort only; the persisted event is the record.
                    error!(
                        container = %container,
                        zip = %name,
                        error = %bus_err,
                        "error sending notification to the queue"
                    );
                }
            }
            if let Err(move_err) = self.state.blobs.move_to_rejected(container, name).await {
                warn!(
                    container = %container,
                    zip = %name,
                    error = %move_err,
                    "failed to move archive to rejected container"
                );
            }
        }
        Ok(())
    }

    async fn release(&self, container: &str, name: &str, lease: &Lease) {
        if let Err(err) = self.state.blobs.release_lease(container, name, lease).await {
            warn!(container = %container, zip = %name, error = %err, "failed to release lease");
        }
    }
}

/// An archive is only picked up once it has sat unchanged for the
/// configured delay; anything younger may still be uploading.
fn ready_to_process(
    modified: chrono::NaiveDateTime,
    now: chrono::NaiveDateTime,
    delay_minutes: i64,
) -> bool {
    modified <= now - ChronoDuration::minutes(delay_minutes)
}

#[async_trait]
impl ScheduledTask for IngestTask {
    fn name(&self) -> &'static str {
        "ingest"
    }

    async fn tick(&self) -> anyhow::Result<()> {
        for container in &self.state.config.input_containers {
            if let Err(err) = self.process_container(container).await {
                error!(container = %container, error = %err, "container scan failed");
            }
        }
        Ok(())
    }
}
