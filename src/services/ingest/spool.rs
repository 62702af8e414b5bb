use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tokio::io::{AsyncRead, AsyncSeekExt, AsyncWriteExt};

use super::IngestError;
use super::bounded::classify_read_error;

const SPOOL_PREFIX: &str = "ingest-upload-";

/// Request-scoped scratch file holding an in-flight upload.
///
/// The backing file is removed when the spool is dropped, so every early
/// return out of the pipeline releases it. [`Spool::release`] does the same
/// explicitly and reports the outcome.
pub struct Spool {
    temp: NamedTempFile,
    file: tokio::fs::File,
    len: u64,
}

impl Spool {
    /// Create a uniquely named spool file in `dir` (system temp dir when `None`).
    pub fn acquire(dir: Option<&Path>) -> Result<Self, IngestError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SPOOL_PREFIX);

        let temp = match dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(IngestError::SpoolWrite)?;

        let file = tokio::fs::File::from_std(temp.reopen().map_err(IngestError::SpoolWrite)?);

        tracing::debug!("Acquired spool {}", temp.path().display());

        Ok(Self {
            temp,
            file,
            len: 0,
        })
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Bytes written so far
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy `reader` to the end of the spool. `limit` is only used to report
    /// an overflow of the request body as `PayloadTooLarge`.
    pub async fn write_from<R>(&mut self, mut reader: R, limit: u64) -> Result<u64, IngestError>
    where
        R: AsyncRead + Unpin,
    {
        let written = tokio::io::copy(&mut reader, &mut self.file)
            .await
            .map_err(|e| classify_read_error(e, limit))?;
        self.file.flush().await.map_err(IngestError::SpoolWrite)?;

        self.len += written;
        Ok(written)
    }

    /// Move the read position back to the start of the spooled content.
    pub async fn rewind(&mut self) -> Result<(), IngestError> {
        self.file
            .seek(SeekFrom::Start(0))
            .await
            .map_err(IngestError::NotSeekable)?;
        Ok(())
    }

    /// Reader over the spooled bytes from the current position.
    pub fn reader(&mut self) -> &mut tokio::fs::File {
        &mut self.file
    }

    /// Delete the backing file now, returning where it lived.
    pub fn release(self) -> std::io::Result<PathBuf> {
        let path = self.temp.path().to_path_buf();
        drop(self.file);
        self.temp.close()?;
        tracing::debug!("Released spool {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    async fn round_trip(data: &[u8]) -> Vec<u8> {
        let dir = tempfile::tempdir().unwrap();
        let mut spool = Spool::acquire(Some(dir.path())).unwrap();
        let written = spool.write_from(data, data.len() as u64).await.unwrap();
        assert_eq!(written, data.len() as u64);

        spool.rewind().await.unwrap();
        let mut out = Vec::new();
        spool.reader().read_to_end(&mut out).await.unwrap();

        // a second pass must see the same content
        spool.rewind().await.unwrap();
        let mut again = Vec::new();
        spool.reader().read_to_end(&mut again).await.unwrap();
        assert_eq!(out, again);
        out
    }

    #[tokio::test]
    async fn test_round_trip_empty() {
        assert!(round_trip(b"").await.is_empty());
    }

    #[tokio::test]
    async fn test_round_trip_large() {
        let data: Vec<u8> = (0..3 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
        assert_eq!(round_trip(&data).await, data);
    }

    #[tokio::test]
    async fn test_drop_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let mut spool = Spool::acquire(Some(dir.path())).unwrap();
            spool.write_from(&b"hello"[..], 5).await.unwrap();
            assert!(spool.path().exists());
            spool.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_release_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let spool = Spool::acquire(Some(dir.path())).unwrap();
        let path = spool.release().unwrap();
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_acquire_in_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            Spool::acquire(Some(&missing)),
            Err(IngestError::SpoolWrite(_))
        ));
    }

    #[tokio::test]
    async fn test_names_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let a = Spool::acquire(Some(dir.path())).unwrap();
        let b = Spool::acquire(Some(dir.path())).unwrap();
        assert_ne!(a.path(), b.path());
        assert!(
            a.path()
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with(SPOOL_PREFIX)
        );
    }
}
