use axum::http::StatusCode;
use thiserror::Error;

use super::Stage;

/// Everything that can stop an upload, from request decoding to the metadata write
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Payload too large: limit is {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    #[error("Missing file part '{0}'")]
    MissingFilePart(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Spool write failed: {0}")]
    SpoolWrite(#[source] std::io::Error),

    #[error("Spool is not seekable: {0}")]
    NotSeekable(#[source] std::io::Error),

    #[error("Probe process failed: {0}")]
    ProbeProcess(String),

    #[error("Probe output could not be parsed: {0}")]
    ProbeParse(String),

    #[error("Durable write failed: {0}")]
    DurableWrite(String),

    #[error("Metadata lookup failed: {0}")]
    MetadataLookup(String),

    #[error("Metadata persist failed: {0}")]
    MetadataPersist(String),
}

impl IngestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            IngestError::InvalidIdentifier(_) | IngestError::MissingFilePart(_) => {
                StatusCode::BAD_REQUEST
            }
            IngestError::Unauthenticated(_) | IngestError::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED
            }
            IngestError::RecordNotFound(_) => StatusCode::NOT_FOUND,
            IngestError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            IngestError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            IngestError::SpoolWrite(_)
            | IngestError::NotSeekable(_)
            | IngestError::ProbeProcess(_)
            | IngestError::ProbeParse(_)
            | IngestError::DurableWrite(_)
            | IngestError::MetadataLookup(_)
            | IngestError::MetadataPersist(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Terminal `Failed(stage, cause)` state of the pipeline.
/// `stage` is the state the pipeline was trying to enter.
#[derive(Error, Debug)]
#[error("ingest failed while entering {stage}: {error}")]
pub struct PipelineFailure {
    pub stage: Stage,
    #[source]
    pub error: IngestError,
}

impl PipelineFailure {
    pub fn new(stage: Stage, error: IngestError) -> Self {
        Self { stage, error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            IngestError::InvalidIdentifier("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            IngestError::Unauthorized("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            IngestError::PayloadTooLarge { limit: 1 }.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            IngestError::UnsupportedMediaType("text/plain".into()).status_code(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            IngestError::ProbeProcess("exit 1".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert!(IngestError::MissingFilePart("video".into()).is_client_error());
        assert!(!IngestError::DurableWrite("boom".into()).is_client_error());
    }

    #[test]
    fn test_failure_display_names_stage() {
        let failure = PipelineFailure::new(
            Stage::Probed,
            IngestError::ProbeProcess("exit status: 1".into()),
        );
        assert_eq!(
            failure.to_string(),
            "ingest failed while entering probed: Probe process failed: exit status: 1"
        );
    }
}
