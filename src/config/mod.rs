use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::services::ingest::AssetKind;

/// Upload rules for one kind of asset (videos, thumbnails)
#[derive(Debug, Clone)]
pub struct AssetPolicy {
    /// Multipart field that carries the file
    pub field_name: String,

    /// Hard ceiling for the file part in bytes
    pub max_bytes: u64,

    /// Accepted MIME types (essence only, e.g. "video/mp4")
    pub allowed_types: Vec<String>,

    /// Probe and classify the upload, prefixing its key with the shape category
    pub classify: bool,
}

/// Durable store selected at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Local,
    S3,
}

impl StorageBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "local" | "fs" | "filesystem" => Some(StorageBackend::Local),
            "s3" => Some(StorageBackend::S3),
            _ => None,
        }
    }
}

/// Remote object store settings
#[derive(Debug, Clone, Default)]
pub struct S3Settings {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint (MinIO, LocalStack); AWS is used when absent
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    /// Base URL for returned object links (CDN, MinIO); defaults to the virtual-hosted AWS URL
    pub public_base_url: Option<String>,
}

/// Configuration for the ingestion service
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// HTTP port (default: 8091)
    pub port: u16,

    /// Database connection string
    pub database_url: String,

    /// JWT secret used to validate bearer tokens
    pub jwt_secret: String,

    /// Directory for request-scoped spool files (default: system temp dir)
    pub spool_dir: Option<PathBuf>,

    /// Structural analysis tool (default: "ffprobe")
    pub probe_program: String,

    /// Deadline for one probe invocation (default: 30s)
    pub probe_timeout: Duration,

    pub storage_backend: StorageBackend,

    /// Root directory of the local asset store
    pub assets_root: PathBuf,

    /// URL prefix under which `assets_root` is served
    pub assets_base_url: String,

    pub s3: S3Settings,

    pub video: AssetPolicy,
    pub thumbnail: AssetPolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            port: 8091,
            database_url: "sqlite://tubely.db?mode=rwc".to_string(),
            jwt_secret: "secret".to_string(),
            spool_dir: None,
            probe_program: "ffprobe".to_string(),
            probe_timeout: Duration::from_secs(30),
            storage_backend: StorageBackend::Local,
            assets_root: PathBuf::from("./assets"),
            assets_base_url: "http://localhost:8091/assets".to_string(),
            s3: S3Settings {
                region: "us-east-1".to_string(),
                ..S3Settings::default()
            },
            video: AssetPolicy {
                field_name: "video".to_string(),
                max_bytes: 1 << 30, // 1 GB
                allowed_types: vec!["video/mp4".to_string()],
                classify: true,
            },
            thumbnail: AssetPolicy {
                field_name: "thumbnail".to_string(),
                max_bytes: 10 << 20, // 10 MB
                allowed_types: vec![
                    "image/jpeg".to_string(),
                    "image/jpg".to_string(),
                    "image/png".to_string(),
                ],
                classify: false,
            },
        }
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

impl IngestConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default.port);

        Self {
            port,
            database_url: env::var("DATABASE_URL").unwrap_or(default.database_url),
            jwt_secret: env::var("JWT_SECRET").unwrap_or(default.jwt_secret),
            spool_dir: env::var("SPOOL_DIR").ok().map(PathBuf::from),
            probe_program: env::var("FFPROBE_PATH").unwrap_or(default.probe_program),
            probe_timeout: env::var("PROBE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.probe_timeout),
            storage_backend: env::var("STORAGE_BACKEND")
                .ok()
                .and_then(|v| StorageBackend::parse(&v))
                .unwrap_or(default.storage_backend),
            assets_root: env::var("ASSETS_ROOT")
                .map(PathBuf::from)
                .unwrap_or(default.assets_root),
            assets_base_url: env::var("ASSETS_BASE_URL")
                .unwrap_or_else(|_| format!("http://localhost:{}/assets", port)),
            s3: S3Settings {
                bucket: env::var("S3_BUCKET").unwrap_or(default.s3.bucket),
                region: env::var("S3_REGION").unwrap_or(default.s3.region),
                endpoint: env::var("S3_ENDPOINT").ok(),
                access_key: env::var("S3_ACCESS_KEY").ok(),
                secret_key: env::var("S3_SECRET_KEY").ok(),
                public_base_url: env::var("S3_PUBLIC_BASE_URL").ok(),
            },
            video: AssetPolicy {
                max_bytes: env::var("VIDEO_MAX_BYTES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default.video.max_bytes),
                allowed_types: env::var("VIDEO_ALLOWED_TYPES")
                    .map(|v| parse_list(&v))
                    .unwrap_or(default.video.allowed_types),
                ..default.video
            },
            thumbnail: AssetPolicy {
                max_bytes: env::var("THUMBNAIL_MAX_BYTES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default.thumbnail.max_bytes),
                allowed_types: env::var("THUMBNAIL_ALLOWED_TYPES")
                    .map(|v| parse_list(&v))
                    .unwrap_or(default.thumbnail.allowed_types),
                classify: env::var("THUMBNAIL_CLASSIFY")
                    .map(|v| parse_flag(&v))
                    .unwrap_or(default.thumbnail.classify),
                ..default.thumbnail
            },
        }
    }

    /// Create config for development (local storage, short probe deadline)
    pub fn development() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            probe_timeout: Duration::from_secs(10),
            ..Self::default()
        }
    }

    pub fn policy(&self, kind: AssetKind) -> &AssetPolicy {
        match kind {
            AssetKind::Video => &self.video,
            AssetKind::Thumbnail => &self.thumbnail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = IngestConfig::default();
        assert_eq!(config.port, 8091);
        assert_eq!(config.video.max_bytes, 1024 * 1024 * 1024);
        assert_eq!(config.video.allowed_types, vec!["video/mp4".to_string()]);
        assert!(config.video.classify);
        assert!(!config.thumbnail.classify);
        assert_eq!(config.storage_backend, StorageBackend::Local);
    }

    #[test]
    fn test_development_config() {
        let config = IngestConfig::development();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.probe_timeout, Duration::from_secs(10));
        assert_eq!(config.thumbnail.field_name, "thumbnail");
    }

    #[test]
    fn test_policy_lookup() {
        let config = IngestConfig::default();
        assert_eq!(config.policy(AssetKind::Video).field_name, "video");
        assert_eq!(config.policy(AssetKind::Thumbnail).max_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_parse_helpers() {
        assert_eq!(
            parse_list(" image/PNG, image/webp ,,"),
            vec!["image/png".to_string(), "image/webp".to_string()]
        );
        assert!(parse_flag("TRUE"));
        assert!(parse_flag("1"));
        assert!(!parse_flag("off"));
        assert_eq!(StorageBackend::parse("S3"), Some(StorageBackend::S3));
        assert_eq!(StorageBackend::parse("filesystem"), Some(StorageBackend::Local));
        assert_eq!(StorageBackend::parse("gcs"), None);
    }

    #[test]
    fn test_from_env_thumbnail_overrides() {
        unsafe {
            env::set_var("THUMBNAIL_ALLOWED_TYPES", "image/webp");
            env::set_var("THUMBNAIL_CLASSIFY", "true");
        }
        let config = IngestConfig::from_env();
        unsafe {
            env::remove_var("THUMBNAIL_ALLOWED_TYPES");
            env::remove_var("THUMBNAIL_CLASSIFY");
        }
        assert_eq!(config.thumbnail.allowed_types, vec!["image/webp".to_string()]);
        assert!(config.thumbnail.classify);
        assert_eq!(config.thumbnail.field_name, "thumbnail");
    }
}
