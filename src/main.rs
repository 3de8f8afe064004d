use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use mailroom::{
    config::AppConfig,
    db,
    documents::HttpDocuments,
    notify::{self, SqsNotifications},
    routes,
    state::AppState,
    storage::{self, S3Blobs},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "api",
        database_url = %config.redacted_database_url(),
        containers = config.input_containers.len(),
        "loaded mailroom configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    let s3_client = storage::build_client(&config).await?;
    let blobs = Arc::new(S3Blobs::new(s3_client));
    let documents = Arc::new(HttpDocuments::new(
        config.documents_endpoint.clone(),
        std::time::Duration::from_secs(config.documents_timeout_seconds),
    )?);
    let sqs_client = notify::build_client(&config).await?;
    let notifications = Arc::new(SqsNotifications::new(
        sqs_client,
        config.notifications_queue_url.clone(),
    ));
    let signature = config.signature_mode()?;

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let state = AppState::new(pool, config, blobs, documents, notifications, signature);
    let router = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "mailroom api listening");
    axum::serve(listener, router).await?;

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
