use crate::AppState;
use crate::api::error::AppError;
use crate::api::middleware::auth::AuthSubject;
use crate::models::Video;
use crate::services::ingest::IngestError;
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Deserialize, ToSchema, Validate)]
pub struct CreateVideoRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 5000, message = "Description is too long"))]
    pub description: String,
}

pub fn parse_video_id(raw: &str) -> Result<Uuid, IngestError> {
    Uuid::parse_str(raw).map_err(|_| IngestError::InvalidIdentifier(raw.to_string()))
}

#[utoipa::path(
    post,
    path = "/api/videos",
    request_body = CreateVideoRequest,
    responses(
        (status = 201, description = "Video draft created", body = Video),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "videos"
)]
pub async fn create_video(
    State(state): State<AppState>,
    Extension(subject): Extension<AuthSubject>,
    Json(req): Json<CreateVideoRequest>,
) -> Result<(StatusCode, Json<Video>), AppError> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let video = Video::new(subject.user_id, req.title, req.description);
    state.videos.create(&video).await?;

    tracing::info!("Created video {} for user {}", video.id, subject.user_id);
    Ok((StatusCode::CREATED, Json(video)))
}

#[utoipa::path(
    get,
    path = "/api/videos/{video_id}",
    params(
        ("video_id" = String, Path, description = "Video ID")
    ),
    responses(
        (status = 200, description = "Video record", body = Video),
        (status = 400, description = "Invalid ID"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Video not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "videos"
)]
pub async fn get_video(
    State(state): State<AppState>,
    Extension(subject): Extension<AuthSubject>,
    Path(video_id): Path<String>,
) -> Result<Json<Video>, AppError> {
    let video_id = parse_video_id(&video_id)?;
    let video = state.ingest.authorize(subject.user_id, video_id).await?;
    Ok(Json(video))
}
