//! Content-addressed blob storage.
//!
//! `Put` trusts its caller to have verified the stream already (see
//! [`crate::verify`]); this layer only owns durable placement, membership,
//! and range reads with `Size()` always reporting the full object size.

use crate::digest::Digest;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncSeekExt, AsyncWriteExt};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("blob not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A handle to a stored blob: its full size plus a lazily-opened,
/// range-scoped byte stream.
pub struct BlobObject {
    size: u64,
    path: PathBuf,
    range: Option<(u64, u64)>,
}

impl BlobObject {
    /// The full size of the stored object, independent of any requested range.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Opens the body as an `AsyncRead`, seeked to the requested range if
    /// one was given, bounded to that range's length.
    pub async fn body(&self) -> Result<impl AsyncRead, StoreError> {
        let mut file = fs::File::open(&self.path).await?;
        let (start, len) = match self.range {
            Some((start, end)) => (start, end.saturating_sub(start) + 1),
            None => (0, self.size),
        };
        if start > 0 {
            file.seek(SeekFrom::Start(start)).await?;
        }
        Ok(tokio::io::AsyncReadExt::take(file, len))
    }
}

#[derive(Debug, Clone)]
pub struct Blobstore {
    root: PathBuf,
}

impl Blobstore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, digest: &Digest) -> PathBuf {
        let key = digest.storage_key();
        let (shard, rest) = key.split_at(2.min(key.len()));
        self.root.join(shard).join(rest)
    }

    pub async fn ensure_root(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    pub async fn has(&self, digest: &Digest) -> bool {
        fs::metadata(self.path_for(digest)).await.is_ok()
    }

    /// Writes `reader` to durable storage under `digest`'s key. Writes to a
    /// sibling temp file first and renames into place so a concurrent
    /// `get`/`has` never observes a partial object.
    pub async fn put<R>(&self, digest: &Digest, mut reader: R) -> Result<u64, StoreError>
    where
        R: AsyncRead + Unpin,
    {
        let dest = self.path_for(digest);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp = dest.with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));
        let mut tmp_file = fs::File::create(&tmp).await?;
        let written = tokio::io::copy(&mut reader, &mut tmp_file).await?;
        tmp_file.flush().await?;
        fs::rename(&tmp, &dest).await?;
        Ok(written)
    }

    pub async fn get(
        &self,
        digest: &Digest,
        range: Option<(u64, u64)>,
    ) -> Result<BlobObject, StoreError> {
        let path = self.path_for(digest);
        let meta = fs::metadata(&path)
            .await
            .map_err(|_| StoreError::NotFound(digest.storage_key()))?;
        Ok(BlobObject { size: meta.len(), path, range })
    }

    pub async fn remove(&self, digest: &Digest) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(digest)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::Digest;

    #[tokio::test]
    async fn put_then_get_round_trips_full_size() {
        let dir = tempfile::tempdir().unwrap();
        let store = Blobstore::new(dir.path());
        store.ensure_root().await.unwrap();

        let data = b"hello blobstore".to_vec();
        let digest = Digest::sha256_of(&data);
        store.put(&digest, &data[..]).await.unwrap();

        assert!(store.has(&digest).await);
        let obj = store.get(&digest, None).await.unwrap();
        assert_eq!(obj.size(), data.len() as u64);

        let mut body = obj.body().await.unwrap();
        let mut out = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut body, &mut out).await.unwrap();
        assert_eq!(out, data);
    }

    #[tokio::test]
    async fn range_read_reports_full_size_but_partial_body() {
        let dir = tempfile::tempdir().unwrap();
        let store = Blobstore::new(dir.path());
        store.ensure_root().await.unwrap();

        let data = b"0123456789".to_vec();
        let digest = Digest::sha256_of(&data);
        store.put(&digest, &data[..]).await.unwrap();

        let obj = store.get(&digest, Some((2, 5))).await.unwrap();
        assert_eq!(obj.size(), data.len() as u64);

        let mut body = obj.body().await.unwrap();
        let mut out = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut body, &mut out).await.unwrap();
        assert_eq!(out, b"2345");
    }

    #[tokio::test]
    async fn missing_digest_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = Blobstore::new(dir.path());
        let digest = Digest::sha256_of(b"never stored");
        assert!(!store.has(&digest).await);
        assert!(matches!(store.get(&digest, None).await, Err(StoreError::NotFound(_))));
    }
}
