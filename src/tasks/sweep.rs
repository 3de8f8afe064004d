use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use tracing::{error, info};

use crate::envelopes::store;
use crate::state::AppState;

use super::ScheduledTask;

/// Deletes source archives of envelopes that finished processing. The row
/// stays behind for reconciliation; only the blob goes.
pub struct SweepTask {
    state: Arc<AppState>,
}

impl SweepTask {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl ScheduledTask for SweepTask {
    fn name(&self) -> &'static str {
        "sweep"
    }

    async fn tick(&self) -> anyhow::Result<()> {
        let cutoff = Utc::now().naive_utc()
            - ChronoDuration::minutes(self.state.config.sweep_grace_minutes);

        for container in &self.state.config.input_containers {
            let mut conn = self.state.pool.get().context("database pool")?;
            let envelopes = store::find_deletable(&mut conn, container)?;

            for envelope in envelopes {
                if envelope.created_at > cutoff {
                    continue;
                }
                let result = async {
                    self.state
                        .blobs
                        .delete_if_exists(container, &envelope.zip_file_name)
                        .await?;
                    store::mark_zip_deleted(&mut conn, envelope.id)?;
                    anyhow::Ok(())
                }
                .await;

                match result {
                    Ok(()) => info!(
                        container = %container,
                        zip = %envelope.zip_file_name,
                        envelope = %envelope.id,
                        "source archive deleted"
                    ),
                    Err(err) => error!(
                        container = %container,
                        zip = %envelope.zip_file_name,
                        error = %err,
                        "failed to sweep archive"
                    ),
                }
            }
        }
        Ok(())
    }
}
