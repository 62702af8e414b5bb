use anyhow::{Result, anyhow};
use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use uuid::Uuid;

use crate::entities::{prelude::*, videos};
use crate::models::Video;

/// Metadata record store for videos
#[async_trait]
pub trait VideoRepository: Send + Sync {
    async fn create(&self, video: &Video) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<Video>>;
    async fn update(&self, video: &Video) -> Result<()>;
}

pub struct SeaOrmVideoRepository {
    db: DatabaseConnection,
}

impl SeaOrmVideoRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn to_active(video: &Video) -> videos::ActiveModel {
    videos::ActiveModel {
        id: Set(video.id),
        user_id: Set(video.user_id),
        title: Set(video.title.clone()),
        description: Set(video.description.clone()),
        thumbnail_url: Set(video.thumbnail_url.clone()),
        video_url: Set(video.video_url.clone()),
        created_at: Set(video.created_at),
        updated_at: Set(video.updated_at),
    }
}

#[async_trait]
impl VideoRepository for SeaOrmVideoRepository {
    async fn create(&self, video: &Video) -> Result<()> {
        to_active(video).insert(&self.db).await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Video>> {
        let model = Videos::find_by_id(id).one(&self.db).await?;
        Ok(model.map(Video::from))
    }

    async fn update(&self, video: &Video) -> Result<()> {
        to_active(video)
            .update(&self.db)
            .await
            .map_err(|e| anyhow!("failed to update video {}: {}", video.id, e))?;
        Ok(())
    }
}
