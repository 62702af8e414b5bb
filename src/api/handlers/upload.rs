use crate::AppState;
use crate::api::error::AppError;
use crate::api::handlers::videos::parse_video_id;
use crate::api::middleware::auth::AuthSubject;
use crate::models::Video;
use crate::services::ingest::{AssetKind, IngestError, UploadRequest};
use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use futures::TryStreamExt;
use tokio_util::io::StreamReader;

/// Slack on top of the file ceiling for multipart framing and other fields
pub const MULTIPART_OVERHEAD: usize = 1024 * 1024;

fn multipart_error(e: axum::extract::multipart::MultipartError, limit: u64) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        IngestError::PayloadTooLarge { limit }.into()
    } else {
        AppError::BadRequest(e.body_text())
    }
}

/// Find the kind's file part and run it through the ingest pipeline.
async fn receive_upload(
    state: &AppState,
    subject: AuthSubject,
    kind: AssetKind,
    video: Video,
    multipart: &mut Multipart,
) -> Result<Video, AppError> {
    let policy = state.config.policy(kind).clone();

    let result: Result<Video, AppError> = async {
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(e, policy.max_bytes))?
        {
            if field.name() != Some(policy.field_name.as_str()) {
                continue;
            }

            let content_type = field.content_type().unwrap_or_default().to_string();
            let body = StreamReader::new(field.map_err(std::io::Error::other));

            let request = UploadRequest {
                subject_id: subject.user_id,
                content_type,
                body,
            };

            let outcome = state.ingest.ingest(kind, video, request).await?;
            return Ok(outcome.video);
        }

        Err(IngestError::MissingFilePart(policy.field_name.clone()).into())
    }
    .await;

    if let Err(e) = &result {
        // Consume what is left so the client reads our response instead of a connection reset
        tracing::warn!("Upload failed early: {}. Consuming remaining stream...", e);
        while let Ok(Some(mut field)) = multipart.next_field().await {
            while let Ok(Some(_)) = field.chunk().await {}
        }
    }

    result
}

#[utoipa::path(
    post,
    path = "/api/video_upload/{video_id}",
    request_body(content = Multipart, description = "Multipart body with a `video` file field"),
    params(
        ("video_id" = String, Path, description = "Video ID")
    ),
    responses(
        (status = 200, description = "Video stored and attached", body = Video),
        (status = 400, description = "Invalid ID or missing file part"),
        (status = 401, description = "Unauthenticated or not the owner"),
        (status = 404, description = "Video not found"),
        (status = 413, description = "File exceeds the size limit"),
        (status = 415, description = "Unsupported media type"),
        (status = 500, description = "Probe, storage or metadata failure")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "uploads"
)]
pub async fn upload_video(
    State(state): State<AppState>,
    Extension(subject): Extension<AuthSubject>,
    Path(video_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<Video>, AppError> {
    let video_id = parse_video_id(&video_id)?;
    tracing::info!("Uploading video for {} by user {}", video_id, subject.user_id);

    let video = state.ingest.authorize(subject.user_id, video_id).await?;
    let video = receive_upload(&state, subject, AssetKind::Video, video, &mut multipart).await?;
    Ok(Json(video))
}

#[utoipa::path(
    post,
    path = "/api/thumbnail_upload/{video_id}",
    request_body(content = Multipart, description = "Multipart body with a `thumbnail` file field"),
    params(
        ("video_id" = String, Path, description = "Video ID")
    ),
    responses(
        (status = 200, description = "Thumbnail stored and attached", body = Video),
        (status = 400, description = "Invalid ID or missing file part"),
        (status = 401, description = "Unauthenticated or not the owner"),
        (status = 404, description = "Video not found"),
        (status = 413, description = "File exceeds the size limit"),
        (status = 415, description = "Unsupported media type"),
        (status = 500, description = "Storage or metadata failure")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "uploads"
)]
pub async fn upload_thumbnail(
    State(state): State<AppState>,
    Extension(subject): Extension<AuthSubject>,
    Path(video_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<Video>, AppError> {
    let video_id = parse_video_id(&video_id)?;
    tracing::info!("Uploading thumbnail for {} by user {}", video_id, subject.user_id);

    let video = state.ingest.authorize(subject.user_id, video_id).await?;
    let video =
        receive_upload(&state, subject, AssetKind::Thumbnail, video, &mut multipart).await?;
    Ok(Json(video))
}
