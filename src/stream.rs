// Whole-file transfer from disk to an HTTP response body.
//
// Chunks are read only when the transport polls for more, so at most one
// chunk per transfer is held in memory. The file handle lives inside the body
// stream and is closed when the stream finishes or is dropped on disconnect.

use std::io;
use std::path::Path;

use axum::body::{Body, Bytes};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::metrics;

/// Read size per body chunk.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// An opened regular file ready to be streamed.
#[derive(Debug)]
pub struct FileTransfer {
    file: File,
    len: u64,
}

impl FileTransfer {
    /// Open `path` for streaming. Directories and other non-files are
    /// reported as `NotFound`.
    pub async fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path).await?;
        let meta = file.metadata().await?;
        if !meta.is_file() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "not a regular file"));
        }
        Ok(Self {
            file,
            len: meta.len(),
        })
    }

    /// File size, sent as `Content-Length`.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Turn the file into a streaming response body.
    pub fn into_body(self) -> Body {
        let state = (self.file, TransferGuard::new());
        let stream = futures::stream::try_unfold(state, |(mut file, guard)| async move {
            let mut buf = vec![0u8; CHUNK_SIZE];
            let n = file.read(&mut buf).await?;
            if n == 0 {
                return Ok::<_, io::Error>(None);
            }
            buf.truncate(n);
            Ok(Some((Bytes::from(buf), (file, guard))))
        });
        Body::from_stream(stream)
    }
}

/// Counts a transfer as active for as long as it is alive.
struct TransferGuard;

impl TransferGuard {
    fn new() -> Self {
        metrics::ACTIVE_TRANSFERS.inc();
        TransferGuard
    }
}

impl Drop for TransferGuard {
    fn drop(&mut self) {
        metrics::ACTIVE_TRANSFERS.dec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stream_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.zip");
        // Spans several chunks with a partial tail
        let data: Vec<u8> = (0..(CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();

        let transfer = FileTransfer::open(&path).await.unwrap();
        assert_eq!(transfer.len(), data.len() as u64);

        let body = axum::body::to_bytes(transfer.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body.as_ref(), data.as_slice());
    }

    #[tokio::test]
    async fn test_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.zip");
        std::fs::write(&path, b"").unwrap();

        let transfer = FileTransfer::open(&path).await.unwrap();
        assert!(transfer.is_empty());
        let body = axum::body::to_bytes(transfer.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_open_missing_or_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = FileTransfer::open(&dir.path().join("nope.zip")).await;
        assert_eq!(missing.unwrap_err().kind(), io::ErrorKind::NotFound);

        let is_dir = FileTransfer::open(dir.path()).await;
        assert!(is_dir.is_err());
    }
}
