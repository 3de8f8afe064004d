use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tracing_subscriber::EnvFilter;

use mailroom::{
    config::AppConfig,
    db,
    documents::HttpDocuments,
    notify::{self, SqsNotifications},
    run_with_fixed_delay,
    state::AppState,
    storage::{self, S3Blobs},
    IngestTask, SweepTask, UploadTask,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "processor",
        database_url = %config.redacted_database_url(),
        containers = config.input_containers.len(),
        signature_alg = %config.signature_alg,
        "loaded mailroom configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    let s3_client = storage::build_client(&config).await?;
    let blobs = Arc::new(S3Blobs::new(s3_client));
    let documents = Arc::new(HttpDocuments::new(
        config.documents_endpoint.clone(),
        Duration::from_secs(config.documents_timeout_seconds),
    )?);
    let sqs_client = notify::build_client(&config).await?;
    let notifications = Arc::new(SqsNotifications::new(
        sqs_client,
        config.notifications_queue_url.clone(),
    ));
    let signature = config.signature_mode()?;

    let scan_delay = Duration::from_millis(config.scan_delay_ms);
    let upload_delay = Duration::from_millis(config.upload_delay_ms);
    let sweep_delay = Duration::from_millis(config.sweep_delay_ms);

    let state = Arc::new(AppState::new(
        pool,
        config,
        blobs,
        documents,
        notifications,
        signature,
    ));

    tokio::select! {
        _ = run_with_fixed_delay(IngestTask::new(state.clone()), scan_delay) => {}
        _ = run_with_fixed_delay(UploadTask::new(state.clone()), upload_delay) => {}
        _ = run_with_fixed_delay(SweepTask::new(state.clone()), sweep_delay) => {}
        _ = signal::ctrl_c() => {
            tracing::info!("processor received shutdown signal");
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
