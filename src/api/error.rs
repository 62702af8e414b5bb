use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::services::ingest::{IngestError, PipelineFailure};

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Pipeline(#[from] PipelineFailure),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Message shown to the client. Server-side causes stay in the logs.
fn public_message(err: &IngestError) -> String {
    match err {
        IngestError::SpoolWrite(_) | IngestError::NotSeekable(_) => {
            "Unable to buffer the uploaded file".to_string()
        }
        IngestError::ProbeProcess(_) | IngestError::ProbeParse(_) => {
            "Unable to read video metadata".to_string()
        }
        IngestError::DurableWrite(_) => "Unable to store the uploaded file".to_string(),
        IngestError::MetadataLookup(_) => "Unable to retrieve video".to_string(),
        IngestError::MetadataPersist(_) => "Unable to update video".to_string(),
        other => other.to_string(),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Ingest(e) => {
                if e.status_code().is_server_error() {
                    tracing::error!("Request failed: {}", e);
                }
                (e.status_code(), json!({ "error": public_message(&e) }))
            }
            AppError::Pipeline(failure) => {
                let status = failure.error.status_code();
                if status.is_server_error() {
                    tracing::error!("Pipeline failed at {}: {}", failure.stage, failure.error);
                }
                (
                    status,
                    json!({
                        "error": public_message(&failure.error),
                        "stage": failure.stage.to_string(),
                    }),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::Anyhow(e) => {
                tracing::error!("Anyhow error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal Server Error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ingest::Stage;
    use http_body_util::BodyExt;
    use serde_json::Value;

    async fn render(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_client_errors_keep_their_message() {
        let (status, body) = render(IngestError::MissingFilePart("video".into()).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing file part 'video'");
    }

    #[tokio::test]
    async fn test_server_errors_hide_cause_and_report_stage() {
        let failure = PipelineFailure::new(
            Stage::Relocated,
            IngestError::DurableWrite("bucket credentials rejected".into()),
        );
        let (status, body) = render(failure.into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Unable to store the uploaded file");
        assert_eq!(body["stage"], "relocated");
    }

    #[tokio::test]
    async fn test_repository_errors_render_generic_500() {
        let err = anyhow::anyhow!("connection refused: 10.0.0.5:5432");
        let (status, body) = render(err.into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal Server Error");
        assert!(body.get("stage").is_none());
    }
}
