use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tokio_stream::{wrappers::ReadDirStream, StreamExt};

/// Entries starting with this prefix belong to the mirror itself and survive
/// a purge.
pub const RESERVED_PREFIX: &str = "local.";

/// File name of the rewritten playlist inside the cache directory.
pub const LOCAL_PLAYLIST: &str = "local.m3u8";

/// Suffix of a segment transfer that has not been renamed into place yet.
pub const PARTIAL_SUFFIX: &str = ".part";

/// Suffix of the comparator's throwaway download.
pub const SCRATCH_SUFFIX: &str = ".scratch";

#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error("could not create segment cache {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not purge {path}: {source}")]
    Purge {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The directory holding previously fetched segments, keyed by their local
/// file name.
#[derive(Debug, Clone)]
pub struct SegmentCache {
    root: PathBuf,
}

impl SegmentCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_reserved(name: &str) -> bool {
        name.starts_with(RESERVED_PREFIX)
    }

    pub fn resolve_path(&self, local_file_name: &str) -> PathBuf {
        self.root.join(local_file_name)
    }

    pub fn local_playlist_path(&self) -> PathBuf {
        self.resolve_path(LOCAL_PLAYLIST)
    }

    pub async fn exists(&self, local_file_name: &str) -> bool {
        tokio::fs::metadata(self.resolve_path(local_file_name))
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    /// Create the cache directory and drop transfer leftovers from an
    /// interrupted run.
    pub async fn ensure(&self) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| CacheError::Create {
                path: self.root.clone(),
                source,
            })?;

        let swept = self.sweep_leftovers().await?;
        if swept > 0 {
            info!("Removed {} unfinished transfers from {}", swept, self.root.display());
        }

        Ok(())
    }

    fn is_leftover(name: &str) -> bool {
        !Self::is_reserved(name)
            && (name.ends_with(PARTIAL_SUFFIX) || name.ends_with(SCRATCH_SUFFIX))
    }

    async fn sweep_leftovers(&self) -> Result<usize, CacheError> {
        let read_dir = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|source| CacheError::Create {
                path: self.root.clone(),
                source,
            })?;

        let mut entries = ReadDirStream::new(read_dir);
        let mut removed = 0;

        while let Some(entry) = entries.next().await {
            let entry = entry.map_err(|source| CacheError::Create {
                path: self.root.clone(),
                source,
            })?;
            if !Self::is_leftover(&entry.file_name().to_string_lossy()) {
                continue;
            }

            let path = entry.path();
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => (),
                Err(source) => return Err(CacheError::Create { path, source }),
            }
        }

        Ok(removed)
    }

    /// Delete every non-reserved entry. Entries that disappear underneath us
    /// are ignored, so an interrupted purge can simply be run again.
    ///
    /// Returns the number of entries removed.
    pub async fn purge(&self) -> Result<usize, CacheError> {
        let read_dir = match tokio::fs::read_dir(&self.root).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(source) => {
                return Err(CacheError::Purge {
                    path: self.root.clone(),
                    source,
                })
            }
        };

        let mut entries = ReadDirStream::new(read_dir);
        let mut removed = 0;

        while let Some(entry) = entries.next().await {
            let entry = entry.map_err(|source| CacheError::Purge {
                path: self.root.clone(),
                source,
            })?;

            if Self::is_reserved(&entry.file_name().to_string_lossy()) {
                continue;
            }

            let path = entry.path();
            let res = match entry.file_type().await {
                Ok(ft) if ft.is_dir() => tokio::fs::remove_dir_all(&path).await,
                Ok(_) => tokio::fs::remove_file(&path).await,
                Err(e) => Err(e),
            };

            match res {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => (),
                Err(source) => return Err(CacheError::Purge { path, source }),
            }
        }

        info!("Purged {} entries from {}", removed, self.root.display());

        Ok(removed)
    }
}
