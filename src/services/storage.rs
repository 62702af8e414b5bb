use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

/// Multipart part size for S3 uploads
const S3_PART_SIZE: usize = 10 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("object store error: {0}")]
    Remote(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Durable store for finished assets
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Stream `reader` to `key`, returning the asset's resolvable URL once the
    /// store has acknowledged the write.
    async fn put_stream<'a>(
        &self,
        key: &str,
        content_type: &str,
        reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
    ) -> StorageResult<String>;

    async fn exists(&self, key: &str) -> StorageResult<bool>;

    async fn delete(&self, key: &str) -> StorageResult<()>;

    fn name(&self) -> &'static str;
}

fn check_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("empty key".to_string()));
    }
    let malformed = key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if malformed || key.contains('\\') {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Asset store rooted at a local directory that is served over HTTP
pub struct LocalStorageService {
    root: PathBuf,
    base_url: String,
}

impl LocalStorageService {
    pub async fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> StorageResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        check_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl StorageService for LocalStorageService {
    async fn put_stream<'a>(
        &self,
        key: &str,
        _content_type: &str,
        mut reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
    ) -> StorageResult<String> {
        let path = self.key_to_path(key)?;
        let parent = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        tokio::fs::create_dir_all(&parent).await?;

        // Write next to the destination and rename, so readers never see a partial file
        let staging = tempfile::Builder::new()
            .prefix(".partial-")
            .tempfile_in(&parent)?;
        let mut file = tokio::fs::File::from_std(staging.reopen()?);

        let size = tokio::io::copy(&mut reader, &mut file).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        staging
            .persist(&path)
            .map_err(|e| StorageError::Io(e.error))?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = size,
            "Local storage upload successful"
        );

        Ok(format!("{}/{}", self.base_url, key))
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

pub struct S3StorageService {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl S3StorageService {
    pub fn new(client: Client, bucket: String, public_base_url: String) -> Self {
        Self {
            client,
            bucket,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Canonical virtual-hosted URL of an AWS bucket
    pub fn aws_base_url(bucket: &str, region: &str) -> String {
        format!("https://{}.s3.{}.amazonaws.com", bucket, region)
    }

    async fn upload_parts<'a>(
        &self,
        key: &str,
        upload_id: &str,
        reader: &mut Box<dyn AsyncRead + Unpin + Send + 'a>,
    ) -> StorageResult<(Vec<CompletedPart>, u64)> {
        let mut part_number = 1;
        let mut completed_parts = Vec::new();
        let mut total_size = 0u64;
        let mut buffer = vec![0u8; S3_PART_SIZE];

        loop {
            let mut n = 0;
            while n < S3_PART_SIZE {
                let read = reader.read(&mut buffer[n..]).await?;
                if read == 0 {
                    break;
                }
                n += read;
            }

            // An empty object still needs one (empty) part
            if n == 0 && part_number > 1 {
                break;
            }

            total_size += n as u64;
            let upload_part_res = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .body(ByteStream::from(Bytes::copy_from_slice(&buffer[..n])))
                .part_number(part_number)
                .send()
                .await
                .map_err(|e| StorageError::Remote(format!("{:?}", e)))?;

            completed_parts.push(
                CompletedPart::builder()
                    .e_tag(upload_part_res.e_tag().unwrap_or_default())
                    .part_number(part_number)
                    .build(),
            );

            part_number += 1;
            if n < S3_PART_SIZE {
                break;
            }
        }

        Ok((completed_parts, total_size))
    }
}

#[async_trait]
impl StorageService for S3StorageService {
    async fn put_stream<'a>(
        &self,
        key: &str,
        content_type: &str,
        mut reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
    ) -> StorageResult<String> {
        check_key(key)?;

        let multipart_upload_res = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::Remote(format!("{:?}", e)))?;

        let upload_id = multipart_upload_res
            .upload_id()
            .ok_or_else(|| StorageError::Remote("No upload ID".to_string()))?
            .to_string();

        let (completed_parts, total_size) =
            match self.upload_parts(key, &upload_id, &mut reader).await {
                Ok(res) => res,
                Err(e) => {
                    if let Err(abort_err) = self
                        .client
                        .abort_multipart_upload()
                        .bucket(&self.bucket)
                        .key(key)
                        .upload_id(&upload_id)
                        .send()
                        .await
                    {
                        tracing::warn!(
                            "S3 abort_multipart_upload failed for {}/{}: {:?}",
                            self.bucket,
                            key,
                            abort_err
                        );
                    }
                    return Err(e);
                }
            };

        let completed_multipart_upload = CompletedMultipartUpload::builder()
            .set_parts(Some(completed_parts))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(&upload_id)
            .multipart_upload(completed_multipart_upload)
            .send()
            .await
            .map_err(|e| StorageError::Remote(format!("{:?}", e)))?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = total_size,
            "S3 upload successful"
        );

        Ok(format!("{}/{}", self.public_base_url, key))
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let res = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match res {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(StorageError::Remote(service_error.to_string()))
                }
            }
        }
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Remote(format!("{:?}", e)))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "s3"
    }
}
