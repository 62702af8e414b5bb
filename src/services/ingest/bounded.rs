use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};

use super::IngestError;

/// Marker carried inside the `io::Error` raised when a [`BoundedReader`] overflows.
#[derive(Debug, Clone, Copy)]
pub struct LimitExceeded {
    pub limit: u64,
}

impl fmt::Display for LimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream exceeds the {} byte limit", self.limit)
    }
}

impl std::error::Error for LimitExceeded {}

/// Reader that yields at most `limit` bytes of `inner`.
///
/// Reading past the ceiling fails with an `io::Error` wrapping [`LimitExceeded`]
/// rather than truncating silently.
pub struct BoundedReader<R> {
    inner: R,
    limit: u64,
    consumed: u64,
}

impl<R> BoundedReader<R> {
    pub fn new(inner: R, limit: u64) -> Self {
        Self {
            inner,
            limit,
            consumed: 0,
        }
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for BoundedReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();

        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                let read = (buf.filled().len() - before) as u64;
                this.consumed += read;
                if this.consumed > this.limit {
                    // A failed read must hand back no data
                    buf.set_filled(before);
                    return Poll::Ready(Err(io::Error::other(LimitExceeded {
                        limit: this.limit,
                    })));
                }
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

/// Map an error surfaced while draining an upload stream to the pipeline taxonomy.
///
/// Both our own ceiling and axum's request body limit count as `PayloadTooLarge`;
/// anything else is a spool write failure.
pub fn classify_read_error(err: io::Error, limit: u64) -> IngestError {
    if let Some(exceeded) = err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<LimitExceeded>())
    {
        return IngestError::PayloadTooLarge {
            limit: exceeded.limit,
        };
    }

    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(&err);
    while let Some(cause) = source {
        if cause.to_string().contains("length limit exceeded") {
            return IngestError::PayloadTooLarge { limit };
        }
        source = cause.source();
    }

    IngestError::SpoolWrite(err)
}
