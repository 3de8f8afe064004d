use thiserror::Error;

use crate::envelopes::status::Event;

/// Everything that can go wrong while turning an inbound archive into an
/// envelope. The coordinator is the only place these are acted on; the
/// verifier, validator and builder just raise them.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("signature verification failed: {0}")]
    Signature(String),

    #[error("metadata.json missing from archive")]
    MetadataNotFound,

    #[error("archive contains a non-pdf entry: {0}")]
    NonPdfFile(String),

    #[error("metadata.json does not match the envelope schema: {0}")]
    InvalidMetafile(String),

    #[error("failed to parse ocr data for document {dcn}: {detail}")]
    OcrDataParse { dcn: String, detail: String },

    #[error("{0}")]
    FileNameIrregularities(String),

    #[error("jurisdiction {jurisdiction} does not belong to container {container}")]
    JurisdictionMismatch {
        container: String,
        jurisdiction: String,
    },

    #[error("{zip_file_name} failed to upload before and awaits another attempt")]
    PreviouslyFailedToUpload { zip_file_name: String },

    /// Transient storage trouble; the blob stays put and the next tick
    /// retries.
    #[error("blob storage error: {0}")]
    Blob(anyhow::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IngestError {
    /// The audit event this failure maps to. `None` means transient: no
    /// event is recorded and the archive is retried later.
    pub fn event(&self) -> Option<Event> {
        match self {
            IngestError::Signature(_) => Some(Event::DocSignatureFailure),
            IngestError::MetadataNotFound
            | IngestError::NonPdfFile(_)
            | IngestError::InvalidMetafile(_)
            | IngestError::OcrDataParse { .. }
            | IngestError::FileNameIrregularities(_)
            | IngestError::JurisdictionMismatch { .. } => Some(Event::FileValidationFailure),
            IngestError::PreviouslyFailedToUpload { .. } => Some(Event::DocUploadFailure),
            IngestError::Blob(_) => None,
            IngestError::Other(_) => Some(Event::DocFailure),
        }
    }

    /// Whether the archive should be moved to the rejected container. Only
    /// validation and signature failures are; everything else stays in
    /// place, either for retry or for operator inspection.
    pub fn rejects_archive(&self) -> bool {
        matches!(
            self.event(),
            Some(Event::DocSignatureFailure) | Some(Event::FileValidationFailure)
        )
    }
}
