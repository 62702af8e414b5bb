#![allow(dead_code)]

use async_trait::async_trait;
use rust_media_backend::config::IngestConfig;
use rust_media_backend::infrastructure::database;
use rust_media_backend::models::Video;
use rust_media_backend::services::identity::JwtIdentityProvider;
use rust_media_backend::services::ingest::{
    IngestError, IngestService, MediaProber, ProbeResult, ProbeStream,
};
use rust_media_backend::services::storage::{StorageError, StorageResult, StorageService};
use rust_media_backend::services::videos::{SeaOrmVideoRepository, VideoRepository};
use rust_media_backend::utils::auth::create_jwt;
use rust_media_backend::AppState;
use sea_orm::{Database, DatabaseConnection};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncReadExt};
use uuid::Uuid;

pub const JWT_SECRET: &str = "test-secret";
pub const BOUNDARY: &str = "---------------------------123456789012345678901234567";

pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    database::run_migrations(&db).await.unwrap();
    db
}

/// In-memory object store that records every write
#[derive(Default)]
pub struct MockStorageService {
    pub files: Mutex<HashMap<String, (String, Vec<u8>)>>,
    pub puts: AtomicUsize,
    pub fail_writes: bool,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.files.lock().unwrap().keys().cloned().collect()
    }

    pub fn get(&self, key: &str) -> Option<(String, Vec<u8>)> {
        self.files.lock().unwrap().get(key).cloned()
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn put_stream<'a>(
        &self,
        key: &str,
        content_type: &str,
        mut reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
    ) -> StorageResult<String> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(StorageError::Remote("bucket unavailable".to_string()));
        }

        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;
        self.files
            .lock()
            .unwrap()
            .insert(key.to_string(), (content_type.to_string(), data));
        Ok(format!("https://mock-bucket.example/{}", key))
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.files.lock().unwrap().contains_key(key))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.files.lock().unwrap().remove(key);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Prober that answers without spawning anything
pub struct StubProber {
    pub response: fn() -> Result<ProbeResult, IngestError>,
    pub calls: AtomicUsize,
    pub seen: Mutex<Vec<PathBuf>>,
}

impl StubProber {
    pub fn new(response: fn() -> Result<ProbeResult, IngestError>) -> Self {
        Self {
            response,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn landscape() -> Self {
        Self::new(|| Ok(video_streams(1920, 1080)))
    }

    pub fn portrait() -> Self {
        Self::new(|| Ok(video_streams(720, 1280)))
    }

    pub fn broken() -> Self {
        Self::new(|| Err(IngestError::ProbeProcess("exit status: 1".to_string())))
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaProber for StubProber {
    async fn probe(&self, location: &Path) -> Result<ProbeResult, IngestError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(location.exists(), "probe must see the spooled file");
        self.seen.lock().unwrap().push(location.to_path_buf());
        (self.response)()
    }
}

pub fn video_streams(width: u32, height: u32) -> ProbeResult {
    ProbeResult {
        streams: vec![
            ProbeStream {
                index: Some(0),
                codec_name: Some("aac".to_string()),
                codec_type: Some("audio".to_string()),
                width: None,
                height: None,
            },
            ProbeStream {
                index: Some(1),
                codec_name: Some("h264".to_string()),
                codec_type: Some("video".to_string()),
                width: Some(width),
                height: Some(height),
            },
        ],
    }
}

pub struct TestContext {
    pub state: AppState,
    pub storage: Arc<MockStorageService>,
    pub prober: Arc<StubProber>,
    pub spool_dir: tempfile::TempDir,
}

impl TestContext {
    /// Files left behind in the spool directory
    pub fn spool_leftovers(&self) -> usize {
        std::fs::read_dir(self.spool_dir.path()).unwrap().count()
    }

    pub async fn create_video(&self, user_id: Uuid) -> Video {
        let video = Video::new(user_id, "Boots".to_string(), "A pair of boots".to_string());
        self.state.videos.create(&video).await.unwrap();
        video
    }
}

pub fn test_config(spool_dir: &Path) -> IngestConfig {
    IngestConfig {
        jwt_secret: JWT_SECRET.to_string(),
        spool_dir: Some(spool_dir.to_path_buf()),
        ..IngestConfig::development()
    }
}

pub async fn setup_with(
    storage: MockStorageService,
    prober: StubProber,
    adjust: impl FnOnce(&mut IngestConfig),
) -> TestContext {
    let spool_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(spool_dir.path());
    adjust(&mut config);

    let db = setup_test_db().await;
    let storage = Arc::new(storage);
    let prober = Arc::new(prober);
    let videos: Arc<dyn VideoRepository> = Arc::new(SeaOrmVideoRepository::new(db.clone()));

    let ingest = Arc::new(IngestService::new(
        prober.clone(),
        storage.clone(),
        videos.clone(),
        config.clone(),
    ));

    let state = AppState {
        db,
        videos,
        identity: Arc::new(JwtIdentityProvider::new(JWT_SECRET)),
        storage: storage.clone(),
        ingest,
        config,
    };

    TestContext {
        state,
        storage,
        prober,
        spool_dir,
    }
}

pub async fn setup(prober: StubProber) -> TestContext {
    setup_with(MockStorageService::new(), prober, |_| {}).await
}

pub fn token_for(user_id: Uuid) -> String {
    create_jwt(&user_id.to_string(), JWT_SECRET, chrono::Duration::minutes(5)).unwrap()
}

/// Single-part multipart body
pub fn multipart_body(field: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\n\
        Content-Disposition: form-data; name=\"{field}\"; filename=\"upload.bin\"\r\n\
        Content-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}
