use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_credential_types::Credentials;
use aws_sdk_sqs::{config::Region, Client as SqsClient};
use serde::Serialize;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::ingest::IngestError;

/// Outward error codes surfaced to operators. Finite by design; new
/// internal failure kinds must pick one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    #[serde(rename = "ERR_SIG_VERIFY_FAILED")]
    SigVerifyFailed,
    #[serde(rename = "ERR_METAFILE_INVALID")]
    MetafileInvalid,
    #[serde(rename = "ERR_ZIP_PROCESSING_FAILED")]
    ZipProcessingFailed,
}

impl ErrorCode {
    /// Which code, if any, an ingestion failure is reported under.
    pub fn for_error(error: &IngestError) -> Option<ErrorCode> {
        match error {
            IngestError::Signature(_) => Some(ErrorCode::SigVerifyFailed),
            IngestError::InvalidMetafile(_) | IngestError::OcrDataParse { .. } => {
                Some(ErrorCode::MetafileInvalid)
            }
            IngestError::MetadataNotFound
            | IngestError::NonPdfFile(_)
            | IngestError::FileNameIrregularities(_)
            | IngestError::JurisdictionMismatch { .. } => Some(ErrorCode::ZipProcessingFailed),
            IngestError::PreviouslyFailedToUpload { .. }
            | IngestError::Blob(_)
            | IngestError::Other(_) => None,
        }
    }
}

/// Message published for each failed archive.
#[derive(Debug, Serialize)]
pub struct ErrorMsg {
    pub id: String,
    pub event_id: i64,
    pub zip_file_name: String,
    pub container: String,
    pub po_box: Option<String>,
    pub document_control_number: Option<String>,
    pub error_code: ErrorCode,
    pub error_description: String,
    pub test_only: bool,
}

impl ErrorMsg {
    pub fn new(
        event_id: i64,
        zip_file_name: impl Into<String>,
        container: impl Into<String>,
        error_code: ErrorCode,
        error_description: impl Into<String>,
        test_only: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_id,
            zip_file_name: zip_file_name.into(),
            container: container.into(),
            po_box: None,
            document_control_number: None,
            error_code,
            error_description: error_description.into(),
            test_only,
        }
    }
}

#[async_trait]
pub trait NotificationBus: Send + Sync + 'static {
    async fn send(&self, message: &ErrorMsg) -> Result<()>;
}

pub async fn build_client(config: &AppConfig) -> Result<SqsClient> {
    let region = Region::new(config.aws_region.clone());
    let region_provider = RegionProviderChain::first_try(Some(region))
        .or_default_provider()
        .or_else("us-east-1");

    #[allow(deprecated)]
    let mut loader = aws_config::from_env().region(region_provider);

    if let Some(endpoint) = &config.aws_endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }

    if let (Some(access_key), Some(secret_key)) = (
        config.aws_access_key_id.clone(),
        config.aws_secret_access_key.clone(),
    ) {
        let credentials = Credentials::new(access_key, secret_key, None, None, "static");
        loader = loader.credentials_provider(credentials);
    }

    Ok(SqsClient::new(&loader.load().await))
}

pub struct SqsNotifications {
    client: SqsClient,
    queue_url: String,
}

impl SqsNotifications {
    pub fn new(client: SqsClient, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }
}

#[async_trait]
impl NotificationBus for SqsNotifications {
    async fn send(&self, message: &ErrorMsg) -> Result<()> {
        let body = serde_json::to_string(message).context("failed to encode notification")?;
        self.client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .send()
            .await
            .context("failed to publish notification")?;
        Ok(())
    }
}
