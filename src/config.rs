use std::path::PathBuf;

use crate::{cache::SegmentCache, download::DEFAULT_CONCURRENCY};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_RETRIES: u32 = 3;
pub const DEFAULT_MUXER: &str = "ffmpeg";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
}

/// Settings of one mirroring run.
#[derive(Debug, Clone)]
pub struct Config {
    pub work_dir: PathBuf,
    pub segments_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub concurrency: usize,
    pub retries: u32,
    pub muxer: String,
    /// Purge the cache even if the first segment still matches.
    pub force_purge: bool,
    pub mux: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::new(".")
    }
}

impl Config {
    /// Defaults for a run inside `work_dir`, with segments in
    /// `<work_dir>/segments`.
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        let work_dir = work_dir.into();
        Self {
            segments_dir: work_dir.join("segments"),
            work_dir,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            concurrency: DEFAULT_CONCURRENCY,
            retries: DEFAULT_RETRIES,
            muxer: DEFAULT_MUXER.to_string(),
            force_purge: false,
            mux: true,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        Ok(())
    }

    /// Root URL of the local file server.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn cache(&self) -> SegmentCache {
        SegmentCache::new(&self.segments_dir)
    }
}
