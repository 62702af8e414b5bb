//! Upload ingestion pipeline.
//!
//! One upload moves strictly forward through
//! `Received -> Spooled -> Probed -> Classified -> Keyed -> Relocated -> Completed`.
//! Any stage error ends the run as a [`PipelineFailure`]; the spool is owned by
//! the run and is deleted on every exit path.

pub mod bounded;
pub mod classify;
pub mod error;
pub mod key;
pub mod probe;
pub mod relocate;
pub mod spool;

pub use bounded::BoundedReader;
pub use classify::{ShapeCategory, classify};
pub use error::{IngestError, PipelineFailure};
pub use key::{StorageKey, derive_key, validate_content_type};
pub use probe::{FfprobeProber, MediaProber, ProbeResult, ProbeStream};
pub use relocate::{AssetReference, Relocator};
pub use spool::Spool;

use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::io::AsyncRead;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::IngestConfig;
use crate::models::Video;
use crate::services::storage::StorageService;
use crate::services::videos::VideoRepository;

/// Kind of asset attached to a video record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Video,
    Thumbnail,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Video => f.write_str("video"),
            AssetKind::Thumbnail => f.write_str("thumbnail"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Spooled,
    Probed,
    Classified,
    Keyed,
    Relocated,
    Completed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::Spooled => "spooled",
            Stage::Probed => "probed",
            Stage::Classified => "classified",
            Stage::Keyed => "keyed",
            Stage::Relocated => "relocated",
            Stage::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// One file part on its way into the pipeline
pub struct UploadRequest<R> {
    pub subject_id: Uuid,
    /// Declared by the client, untrusted
    pub content_type: String,
    pub body: R,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IngestOutcome {
    pub video: Video,
    pub asset: AssetReference,
    pub category: Option<ShapeCategory>,
}

pub struct IngestService {
    prober: Arc<dyn MediaProber>,
    storage: Arc<dyn StorageService>,
    relocator: Relocator,
    videos: Arc<dyn VideoRepository>,
    config: IngestConfig,
}

impl IngestService {
    pub fn new(
        prober: Arc<dyn MediaProber>,
        storage: Arc<dyn StorageService>,
        videos: Arc<dyn VideoRepository>,
        config: IngestConfig,
    ) -> Self {
        Self {
            prober,
            relocator: Relocator::new(storage.clone()),
            storage,
            videos,
            config,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Load the target record and check that `subject_id` owns it.
    pub async fn authorize(&self, subject_id: Uuid, video_id: Uuid) -> Result<Video, IngestError> {
        let video = self
            .videos
            .get(video_id)
            .await
            .map_err(|e| IngestError::MetadataLookup(e.to_string()))?
            .ok_or_else(|| IngestError::RecordNotFound(format!("video {}", video_id)))?;

        if video.user_id != subject_id {
            tracing::warn!(
                "User {} attempted to upload to video {} owned by {}",
                subject_id,
                video_id,
                video.user_id
            );
            return Err(IngestError::Unauthorized(
                "User is not the owner of the video".to_string(),
            ));
        }

        Ok(video)
    }

    fn failed(&self, video: &Video, kind: AssetKind, stage: Stage, error: IngestError) -> PipelineFailure {
        if error.is_client_error() {
            tracing::warn!(video_id = %video.id, kind = %kind, stage = %stage, "Upload rejected: {}", error);
        } else {
            tracing::error!(video_id = %video.id, kind = %kind, stage = %stage, "Upload failed: {}", error);
        }
        PipelineFailure::new(stage, error)
    }

    /// Run one upload through the pipeline and attach the stored asset to `video`.
    pub async fn ingest<R>(
        &self,
        kind: AssetKind,
        mut video: Video,
        request: UploadRequest<R>,
    ) -> Result<IngestOutcome, PipelineFailure>
    where
        R: AsyncRead + Unpin + Send,
    {
        let policy = self.config.policy(kind);

        tracing::info!(
            video_id = %video.id,
            kind = %kind,
            stage = %Stage::Received,
            content_type = %request.content_type,
            "Upload received"
        );

        if request.subject_id != video.user_id {
            let err = IngestError::Unauthorized("User is not the owner of the video".to_string());
            return Err(self.failed(&video, kind, Stage::Received, err));
        }

        let mut spool = Spool::acquire(self.config.spool_dir.as_deref())
            .map_err(|e| self.failed(&video, kind, Stage::Spooled, e))?;

        let body = BoundedReader::new(request.body, policy.max_bytes);
        let size = spool
            .write_from(body, policy.max_bytes)
            .await
            .map_err(|e| self.failed(&video, kind, Stage::Spooled, e))?;

        tracing::info!(video_id = %video.id, kind = %kind, stage = %Stage::Spooled, size_bytes = size, "Upload spooled");

        let category = if policy.classify {
            let probe = self
                .prober
                .probe(spool.path())
                .await
                .map_err(|e| self.failed(&video, kind, Stage::Probed, e))?;

            tracing::info!(video_id = %video.id, kind = %kind, stage = %Stage::Probed, streams = probe.streams.len(), "Upload probed");

            let (width, height) = probe.first_visual_dimensions();
            let category = classify(width, height);

            tracing::info!(
                video_id = %video.id,
                kind = %kind,
                stage = %Stage::Classified,
                category = %category,
                width = ?width,
                height = ?height,
                "Upload classified"
            );
            Some(category)
        } else {
            None
        };

        let content_type = validate_content_type(&request.content_type, &policy.allowed_types)
            .map_err(|e| self.failed(&video, kind, Stage::Keyed, e))?;
        let key = derive_key(&content_type, category)
            .map_err(|e| self.failed(&video, kind, Stage::Keyed, e))?;

        tracing::info!(video_id = %video.id, kind = %kind, stage = %Stage::Keyed, key = %key, "Storage key derived");

        let asset = self
            .relocator
            .upload(&mut spool, &key, &content_type)
            .await
            .map_err(|e| self.failed(&video, kind, Stage::Relocated, e))?;

        tracing::info!(video_id = %video.id, kind = %kind, stage = %Stage::Relocated, url = %asset.url, "Asset stored");

        match kind {
            AssetKind::Video => video.video_url = Some(asset.url.clone()),
            AssetKind::Thumbnail => video.thumbnail_url = Some(asset.url.clone()),
        }
        video.updated_at = Utc::now();

        if let Err(e) = self.videos.update(&video).await {
            // Nothing references the object yet, remove it rather than leave an orphan
            if let Err(cleanup) = self.storage.delete(&asset.key).await {
                tracing::warn!("Failed to remove orphaned asset {}: {}", asset.key, cleanup);
            }
            return Err(self.failed(
                &video,
                kind,
                Stage::Completed,
                IngestError::MetadataPersist(e.to_string()),
            ));
        }

        tracing::info!(video_id = %video.id, kind = %kind, stage = %Stage::Completed, "Upload completed");

        if let Err(e) = spool.release() {
            tracing::warn!("Failed to remove spool file: {}", e);
        }

        Ok(IngestOutcome {
            video,
            asset,
            category,
        })
    }
}
