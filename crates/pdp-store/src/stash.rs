//! The stash: an unaddressed staging area for in-flight uploads, identified
//! by UUID rather than content hash. Bytes move out of the stash
//! and into the [`crate::blobstore::Blobstore`] once a commP job has
//! verified and parked them; anything left behind after a crash is cleaned
//! up by [`Stash::sweep_orphans`] at startup.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StashError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct Stash {
    dir: PathBuf,
}

impl Stash {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub async fn ensure_dir(&self) -> Result<(), StashError> {
        fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Allocates a new, empty stash slot and returns its id and path. The
    /// caller opens the path itself (typically via [`crate::verify::VerifyingCopy`]).
    pub fn path_for(&self, id: &Uuid) -> PathBuf {
        self.dir.join(format!("{id}.tmp"))
    }

    /// The `file://` URL recorded as a `ParkedPieceRef.dataURL`.
    pub fn data_url(&self, id: &Uuid) -> String {
        format!("file://{}", self.path_for(id).display())
    }

    pub async fn remove(&self, id: &Uuid) -> Result<(), StashError> {
        match fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Compares stash files on disk against the set of still-referenced
    /// `file://` data URLs and deletes anything not referenced. Returns the
    /// paths removed.
    pub async fn sweep_orphans(&self, referenced_urls: &HashSet<String>) -> Result<Vec<PathBuf>, StashError> {
        let mut removed = Vec::new();
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(removed),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let url = format!("file://{}", path.display());
            if !referenced_urls.contains(&url) {
                tracing::warn!(path = %path.display(), "stash: removing orphaned upload");
                fs::remove_file(&path).await?;
                removed.push(path);
            }
        }
        Ok(removed)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn sweep_removes_unreferenced_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let stash = Stash::new(dir.path());
        stash.ensure_dir().await.unwrap();

        let kept_id = Uuid::new_v4();
        let orphan_id = Uuid::new_v4();

        for id in [&kept_id, &orphan_id] {
            let mut f = fs::File::create(stash.path_for(id)).await.unwrap();
            f.write_all(b"data").await.unwrap();
        }

        let mut referenced = HashSet::new();
        referenced.insert(stash.data_url(&kept_id));

        let removed = stash.sweep_orphans(&referenced).await.unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0], stash.path_for(&orphan_id));

        assert!(fs::metadata(stash.path_for(&kept_id)).await.is_ok());
        assert!(fs::metadata(stash.path_for(&orphan_id)).await.is_err());
    }

    #[tokio::test]
    async fn sweep_on_missing_dir_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let stash = Stash::new(dir.path().join("does-not-exist"));
        let removed = stash.sweep_orphans(&HashSet::new()).await.unwrap();
        assert!(removed.is_empty());
    }
}
