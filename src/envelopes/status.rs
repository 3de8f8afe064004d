use std::fmt;

/// Lifecycle status of an envelope row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Created,
    Uploaded,
    UploadFailure,
    Processed,
    NotificationSent,
    Consumed,
    MetadataFailure,
    SignatureFailure,
}

/// Audit event recorded in `process_events`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    ZipfileProcessingStarted,
    FileValidationFailure,
    DocSignatureFailure,
    DocUploaded,
    DocUploadFailure,
    DocProcessed,
    DocProcessedNotificationSent,
    DocConsumed,
    DocFailure,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Created => "CREATED",
            Status::Uploaded => "UPLOADED",
            Status::UploadFailure => "UPLOAD_FAILURE",
            Status::Processed => "PROCESSED",
            Status::NotificationSent => "NOTIFICATION_SENT",
            Status::Consumed => "CONSUMED",
            Status::MetadataFailure => "METADATA_FAILURE",
            Status::SignatureFailure => "SIGNATURE_FAILURE",
        }
    }

    pub fn parse(value: &str) -> Option<Status> {
        match value {
            "CREATED" => Some(Status::Created),
            "UPLOADED" => Some(Status::Uploaded),
            "UPLOAD_FAILURE" => Some(Status::UploadFailure),
            "PROCESSED" => Some(Status::Processed),
            "NOTIFICATION_SENT" => Some(Status::NotificationSent),
            "CONSUMED" => Some(Status::Consumed),
            "METADATA_FAILURE" => Some(Status::MetadataFailure),
            "SIGNATURE_FAILURE" => Some(Status::SignatureFailure),
            _ => None,
        }
    }

    /// Statuses whose source blob is allowed to be deleted.
    pub fn is_processed(&self) -> bool {
        matches!(
            self,
            Status::Processed | Status::NotificationSent | Status::Consumed
        )
    }

    /// Whether a stored envelope may move from `self` to `next`.
    ///
    /// Terminal failure statuses never own a row, so they have no outgoing
    /// edges here; `CONSUMED` is terminal by contract.
    pub fn can_transition(&self, next: Status) -> bool {
        matches!(
            (self, next),
            (Status::Created, Status::Uploaded)
                | (Status::Created, Status::UploadFailure)
                | (Status::UploadFailure, Status::Uploaded)
                | (Status::UploadFailure, Status::UploadFailure)
                | (Status::Uploaded, Status::Processed)
                | (Status::Processed, Status::NotificationSent)
                | (Status::NotificationSent, Status::Consumed)
        )
    }
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ZipfileProcessingStarted => "ZIPFILE_PROCESSING_STARTED",
            Event::FileValidationFailure => "FILE_VALIDATION_FAILURE",
            Event::DocSignatureFailure => "DOC_SIGNATURE_FAILURE",
            Event::DocUploaded => "DOC_UPLOADED",
            Event::DocUploadFailure => "DOC_UPLOAD_FAILURE",
            Event::DocProcessed => "DOC_PROCESSED",
            Event::DocProcessedNotificationSent => "DOC_PROCESSED_NOTIFICATION_SENT",
            Event::DocConsumed => "DOC_CONSUMED",
            Event::DocFailure => "DOC_FAILURE",
        }
    }

    pub fn parse(value: &str) -> Option<Event> {
        match value {
            "ZIPFILE_PROCESSING_STARTED" => Some(Event::ZipfileProcessingStarted),
            "FILE_VALIDATION_FAILURE" => Some(Event::FileValidationFailure),
            "DOC_SIGNATURE_FAILURE" => Some(Event::DocSignatureFailure),
            "DOC_UPLOADED" => Some(Event::DocUploaded),
            "DOC_UPLOAD_FAILURE" => Some(Event::DocUploadFailure),
            "DOC_PROCESSED" => Some(Event::DocProcessed),
            "DOC_PROCESSED_NOTIFICATION_SENT" => Some(Event::DocProcessedNotificationSent),
            "DOC_CONSUMED" => Some(Event::DocConsumed),
            "DOC_FAILURE" => Some(Event::DocFailure),
            _ => None,
        }
    }

    /// The status an event drives an envelope into, if any. Total over the
    /// event set; events without a mapping never change status.
    pub fn status(&self) -> Option<Status> {
        match self {
            Event::ZipfileProcessingStarted => None,
            Event::FileValidationFailure => Some(Status::MetadataFailure),
            Event::DocSignatureFailure => Some(Status::SignatureFailure),
            Event::DocUploaded => Some(Status::Uploaded),
            Event::DocUploadFailure => Some(Status::UploadFailure),
            Event::DocProcessed => Some(Status::Processed),
            Event::DocProcessedNotificationSent => Some(Status::NotificationSent),
            Event::DocConsumed => Some(Status::Consumed),
            Event::DocFailure => Some(Status::MetadataFailure),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
