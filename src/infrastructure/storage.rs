use crate::config::{IngestConfig, StorageBackend};
use crate::services::storage::{LocalStorageService, S3StorageService, StorageService};
use anyhow::{Context, bail};
use aws_sdk_s3::config::Region;
use std::sync::Arc;
use tracing::info;

pub async fn setup_storage(config: &IngestConfig) -> anyhow::Result<Arc<dyn StorageService>> {
    match config.storage_backend {
        StorageBackend::Local => {
            info!(
                "📁 Local Storage: {} (served at {})",
                config.assets_root.display(),
                config.assets_base_url
            );
            let storage =
                LocalStorageService::new(&config.assets_root, config.assets_base_url.as_str())
                    .await
                    .with_context(|| {
                        format!("cannot prepare {}", config.assets_root.display())
                    })?;
            Ok(Arc::new(storage))
        }
        StorageBackend::S3 => {
            let s3 = &config.s3;
            if s3.bucket.is_empty() {
                bail!("S3_BUCKET must be set when STORAGE_BACKEND=s3");
            }

            info!(
                "☁️  S3 Storage: {} (Bucket: {})",
                s3.endpoint.as_deref().unwrap_or("aws"),
                s3.bucket
            );

            let mut loader = aws_config::from_env().region(Region::new(s3.region.clone()));
            if let Some(endpoint) = &s3.endpoint {
                loader = loader.endpoint_url(endpoint);
            }
            if let (Some(access_key), Some(secret_key)) = (&s3.access_key, &s3.secret_key) {
                loader = loader.credentials_provider(aws_sdk_s3::config::Credentials::new(
                    access_key.clone(),
                    secret_key.clone(),
                    None,
                    None,
                    "static",
                ));
            }
            let aws_config = loader.load().await;

            // MinIO and LocalStack only resolve path-style bucket addressing
            let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
                .force_path_style(s3.endpoint.is_some())
                .build();
            let client = aws_sdk_s3::Client::from_conf(s3_config);

            let public_base_url = s3
                .public_base_url
                .clone()
                .unwrap_or_else(|| S3StorageService::aws_base_url(&s3.bucket, &s3.region));

            Ok(Arc::new(S3StorageService::new(
                client,
                s3.bucket.clone(),
                public_base_url,
            )))
        }
    }
}
