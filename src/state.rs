use std::sync::Arc;

use diesel::{
    pg::PgConnection,
    r2d2::{ConnectionManager, PooledConnection},
};

use crate::{
    config::AppConfig,
    db::PgPool,
    documents::DocumentStore,
    error::{AppError, AppResult},
    ingest::verify::SignatureMode,
    notify::NotificationBus,
    storage::BlobStore,
};

pub type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub blobs: Arc<dyn BlobStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub notifications: Arc<dyn NotificationBus>,
    pub signature: Arc<SignatureMode>,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        config: AppConfig,
        blobs: Arc<dyn BlobStore>,
        documents: Arc<dyn DocumentStore>,
        notifications: Arc<dyn NotificationBus>,
        signature: SignatureMode,
    ) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            blobs,
            documents,
            notifications,
            signature: Arc::new(signature),
        }
    }

    pub fn db(&self) -> AppResult<PgPooledConnection> {
        self.pool
            .get()
            .map_err(|err| AppError::internal(format!("database pool error: {err}")))
    }
}
