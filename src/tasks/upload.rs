use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use diesel::pg::PgConnection;
use tracing::{debug, error, info, warn};

use crate::envelopes::status::Event;
use crate::envelopes::store::{self, StoreError};
use crate::ingest::verify::SignedArchive;
use crate::ingest::{self, Pdf};
use crate::models::Envelope;
use crate::state::AppState;

use super::ScheduledTask;

/// Scheduled driver pushing created envelopes' documents downstream.
/// Candidates are taken oldest first; each failure bumps the envelope's
/// counter until the cap parks it for operators.
pub struct UploadTask {
    state: Arc<AppState>,
}

impl UploadTask {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    async fn process_envelope(
        &self,
        conn: &mut PgConnection,
        envelope: &Envelope,
    ) -> anyhow::Result<()> {
        let container = envelope.container.as_str();
        let zip = envelope.zip_file_name.as_str();

        let ttl = Duration::from_secs(self.state.config.lease_ttl_seconds);
        let Some(lease) = self.state.blobs.acquire_lease(container, zip, ttl).await? else {
            debug!(container = %container, zip = %zip, "lease busy, skipping upload");
            return Ok(());
        };

        let outcome = self.upload_documents(conn, envelope).await;

        if let Err(err) = self.state.blobs.release_lease(container, zip, &lease).await {
            warn!(container = %container, zip = %zip, error = %err, "failed to release lease");
        }
        outcome
    }

    async fn upload_documents(
        &self,
        conn: &mut PgConnection,
        envelope: &Envelope,
    ) -> anyhow::Result<()> {
        match self.extract_and_upload(envelope).await {
            Ok(urls) => match store::mark_uploaded(conn, envelope.id, &urls) {
                Ok(updated) => {
                    info!(
                        envelope = %envelope.id,
                        zip = %envelope.zip_file_name,
                        documents = urls.len(),
                        status = %updated.status,
                        "documents uploaded"
                    );
                    Ok(())
                }
                // A peer replica won the row; its outcome stands.
                Err(StoreError::IllegalTransition { .. }) => {
                    debug!(envelope = %envelope.id, "envelope already advanced elsewhere");
                    Ok(())
                }
                Err(err) => Err(err.into()),
            },
            Err(reason) => {
                warn!(
                    envelope = %envelope.id,
                    zip = %envelope.zip_file_name,
                    error = %reason,
                    "document upload failed"
                );
                match store::transition(
                    conn,
                    envelope.id,
                    Event::DocUploadFailure,
                    Some(&reason.to_string()),
                ) {
                    Ok(updated) => {
                        warn!(
                            envelope = %envelope.id,
                            failures = updated.upload_failure_count,
                            "upload failure recorded"
                        );
                        Ok(())
                    }
                    Err(StoreError::IllegalTransition { .. }) => Ok(()),
                    Err(err) => Err(err.into()),
                }
            }
        }
    }

    /// Re-read the source archive and hand its PDF set to the document
    /// store. Bytes live only for the duration of one envelope.
    async fn extract_and_upload(
        &self,
        envelope: &Envelope,
    ) -> anyhow::Result<std::collections::HashMap<String, String>> {
        let container = envelope.container.as_str();
        let zip = envelope.zip_file_name.as_str();

        let bytes = self.state.blobs.get_object(container, zip).await?;
        let parsed = ingest::read_envelope(
            &SignedArchive {
                container,
                zip_file_name: zip,
                bytes: &bytes,
            },
            &self.state.signature,
        )
        .map_err(|err| anyhow::anyhow!("failed to re-extract archive: {err}"))?;

        let pdfs: Vec<Pdf> = parsed.pdfs;
        let urls = self.state.documents.upload(&pdfs).await?;

        for pdf in &pdfs {
            if !urls.contains_key(&pdf.file_name) {
                anyhow::bail!(
                    "document store returned no url for {}",
                    pdf.file_name
                );
            }
        }
        Ok(urls)
    }
}

#[async_trait]
impl ScheduledTask for UploadTask {
    fn name(&self) -> &'static str {
        "upload"
    }

    async fn tick(&self) -> anyhow::Result<()> {
        let mut conn = self.state.pool.get().context("database pool")?;
        let candidates =
            store::find_upload_candidates(&mut conn, self.state.config.max_upload_failures)?;
        if candidates.is_empty() {
            return Ok(());
        }
        debug!(candidates = candidates.len(), "uploading envelope documents");

        for envelope in candidates {
            if let Err(err) = self.process_envelope(&mut conn, &envelope).await {
                error!(
                    envelope = %envelope.id,
                    zip = %envelope.zip_file_name,
                    error = %err,
                    "upload processing failed"
                );
            }
        }
        Ok(())
    }
}
