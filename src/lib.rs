pub mod config;
pub mod db;
pub mod documents;
pub mod envelopes;
pub mod error;
pub mod ingest;
pub mod models;
pub mod notify;
pub mod routes;
pub mod schema;
pub mod state;
pub mod storage;
pub mod tasks;

pub use tasks::{run_with_fixed_delay, IngestTask, SweepTask, UploadTask};
