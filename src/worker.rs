use std::path::PathBuf;

use crate::{
    cache::{CacheError, SegmentCache},
    compare::{FirstSegmentDigest, Freshness, FreshnessCheck},
    config::{Config, ConfigError},
    download::{BoundedDownloader, DownloadOutcome, ResumePolicy, SkipExisting},
    hls,
    playlist::{self, PlaylistError},
    source::{self, PlaylistSource, SourceError},
    stats::DownloadStatistics,
    util::HttpClient,
};

#[derive(thiserror::Error, Debug)]
pub enum WorkerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("could not locate playlist: {0}")]
    Locate(#[from] SourceError),
    #[error("{0}")]
    Playlist(#[from] PlaylistError),
    #[error("segment cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("could not write local playlist: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Locating,
    Comparing,
    Purging,
    Rewriting,
    Downloading,
    Done,
}

/// Everything the file server and the muxer need once segments are in place.
#[derive(Debug)]
pub struct RunReport {
    pub source: PlaylistSource,
    pub local_playlist: PathBuf,
    pub base_url: String,
    pub freshness: Freshness,
    pub purged: bool,
    pub outcomes: Vec<DownloadOutcome>,
    pub stats: DownloadStatistics,
    pub stages: Vec<Stage>,
}

/// State owned by a single run. A new context is created for every run.
pub struct RunContext<'a> {
    client: &'a HttpClient,
    config: &'a Config,
    cache: SegmentCache,
    freshness: Box<dyn FreshnessCheck>,
    resume: Box<dyn ResumePolicy>,
    stages: Vec<Stage>,
}

impl<'a> RunContext<'a> {
    pub fn new(client: &'a HttpClient, config: &'a Config) -> Self {
        Self {
            client,
            config,
            cache: config.cache(),
            freshness: Box::new(FirstSegmentDigest),
            resume: Box::new(SkipExisting),
            stages: Vec::new(),
        }
    }

    pub fn with_freshness_check(mut self, check: Box<dyn FreshnessCheck>) -> Self {
        self.freshness = check;
        self
    }

    pub fn with_resume_policy(mut self, resume: Box<dyn ResumePolicy>) -> Self {
        self.resume = resume;
        self
    }

    fn enter(&mut self, stage: Stage) {
        info!("{:?}", stage);
        self.stages.push(stage);
    }

    /// Run the pipeline once. Configuration problems abort before any
    /// network access; per-segment failures end up in the report.
    pub async fn run(mut self, name: Option<&str>) -> Result<RunReport, WorkerError> {
        self.enter(Stage::Locating);
        self.config.validate()?;
        let source = source::locate(&self.config.work_dir, name).await?;
        let lines = playlist::read_playlist(&source.path).await?;
        let segments = playlist::segments(&lines).cloned().collect::<Vec<_>>();
        info!(
            "Using {} ({} segments)",
            source.path.display(),
            segments.len()
        );
        self.cache.ensure().await?;

        self.enter(Stage::Comparing);
        let freshness = self
            .freshness
            .check(self.client, &self.cache, &segments)
            .await;
        let purge = self.config.force_purge || freshness.is_stale();

        if purge {
            self.enter(Stage::Purging);
            match &freshness {
                Freshness::Stale(reason) => info!("Segment cache is stale: {:?}", reason),
                Freshness::Fresh => info!("Purge requested"),
            }
            self.cache.purge().await?;
        } else {
            info!("Segment cache matches, resuming");
        }

        self.enter(Stage::Rewriting);
        let local_playlist = self.cache.local_playlist_path();
        let base_url = self.config.base_url();
        let segments = hls::rewrite_playlist(&lines, &base_url, &local_playlist).await?;

        self.enter(Stage::Downloading);
        let mut stats = DownloadStatistics::new(segments.len() as u64);
        let outcomes = BoundedDownloader::new(self.client, &self.cache, self.config.concurrency)
            .with_resume_policy(&*self.resume)
            .run(&segments, &mut stats)
            .await;

        self.enter(Stage::Done);

        Ok(RunReport {
            source,
            local_playlist,
            base_url,
            freshness,
            purged: purge,
            outcomes,
            stats,
            stages: self.stages,
        })
    }
}

pub async fn start(
    client: &HttpClient,
    config: &Config,
    name: Option<&str>,
) -> Result<RunReport, WorkerError> {
    RunContext::new(client, config).run(name).await
}
