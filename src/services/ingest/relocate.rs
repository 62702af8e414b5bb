use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use super::IngestError;
use super::key::StorageKey;
use super::spool::Spool;
use crate::services::storage::StorageService;

/// Resolvable locator of an asset after a successful durable write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AssetReference {
    pub url: String,
    pub key: String,
    pub content_type: String,
}

/// Moves spooled bytes into the durable store
pub struct Relocator {
    storage: Arc<dyn StorageService>,
}

impl Relocator {
    pub fn new(storage: Arc<dyn StorageService>) -> Self {
        Self { storage }
    }

    pub async fn upload(
        &self,
        spool: &mut Spool,
        key: &StorageKey,
        content_type: &str,
    ) -> Result<AssetReference, IngestError> {
        spool.rewind().await?;

        let key = key.to_string();
        let size = spool.len();
        let url = self
            .storage
            .put_stream(&key, content_type, Box::new(spool.reader()))
            .await
            .map_err(|e| {
                tracing::error!(
                    "Durable write of {} ({} bytes) to {} failed: {}",
                    key,
                    size,
                    self.storage.name(),
                    e
                );
                IngestError::DurableWrite(e.to_string())
            })?;

        Ok(AssetReference {
            url,
            key,
            content_type: content_type.to_string(),
        })
    }
}
