use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{error, info};

pub mod ingest;
pub mod sweep;
pub mod upload;

pub use ingest::IngestTask;
pub use sweep::SweepTask;
pub use upload::UploadTask;

/// A periodic driver. One tick never aborts the loop; failures are logged
/// and the next tick retries from current state.
#[async_trait]
pub trait ScheduledTask: Send + Sync {
    fn name(&self) -> &'static str;
    async fn tick(&self) -> anyhow::Result<()>;
}

/// Run a task forever with a fixed delay between invocations.
pub async fn run_with_fixed_delay<T: ScheduledTask>(task: T, delay: Duration) {
    info!(task = task.name(), delay_ms = delay.as_millis() as u64, "task loop started");
    loop {
        if let Err(err) = task.tick().await {
            error!(task = task.name(), error = %err, "task tick failed");
        }
        sleep(delay).await;
    }
}
