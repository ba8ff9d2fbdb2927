use async_trait::async_trait;
use futures::future::join_all;

use crate::{
    cache::{SegmentCache, PARTIAL_SUFFIX},
    playlist::SegmentRef,
    stats::DownloadStatistics,
    util::{DownloadError, HttpClient},
};

pub const DEFAULT_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyPresent,
}

#[derive(Debug)]
pub enum DownloadOutcome {
    Skipped(SkipReason),
    Fetched {
        bytes_written: u64,
        content_type: Option<String>,
    },
    Failed(DownloadError),
}

/// Decides whether a segment can be reused from the cache instead of being
/// fetched again.
#[async_trait]
pub trait ResumePolicy: Send + Sync {
    async fn should_skip(&self, cache: &SegmentCache, seg: &SegmentRef) -> bool;
}

/// Reuse any segment whose file is already in the cache.
#[derive(Debug, Default, Clone, Copy)]
pub struct SkipExisting;

#[async_trait]
impl ResumePolicy for SkipExisting {
    async fn should_skip(&self, cache: &SegmentCache, seg: &SegmentRef) -> bool {
        cache.exists(&seg.local_file_name).await
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RefetchAll;

#[async_trait]
impl ResumePolicy for RefetchAll {
    async fn should_skip(&self, _cache: &SegmentCache, _seg: &SegmentRef) -> bool {
        false
    }
}

/// Fetches segments into a [`SegmentCache`], at most `concurrency` at a time.
///
/// Segments are processed in waves: up to `concurrency` transfers are started
/// together and all of them settle before the next wave starts. A failed
/// transfer only affects its own outcome.
pub struct BoundedDownloader<'a> {
    client: &'a HttpClient,
    cache: &'a SegmentCache,
    resume: &'a dyn ResumePolicy,
    concurrency: usize,
}

impl<'a> BoundedDownloader<'a> {
    pub fn new(client: &'a HttpClient, cache: &'a SegmentCache, concurrency: usize) -> Self {
        Self {
            client,
            cache,
            resume: &SkipExisting,
            concurrency: concurrency.max(1),
        }
    }

    pub fn with_resume_policy(mut self, resume: &'a dyn ResumePolicy) -> Self {
        self.resume = resume;
        self
    }

    /// Download every segment. The returned outcomes are in input order, one
    /// per segment.
    pub async fn run(
        &self,
        segments: &[SegmentRef],
        stats: &mut DownloadStatistics,
    ) -> Vec<DownloadOutcome> {
        let mut outcomes = Vec::with_capacity(segments.len());

        for (wave, chunk) in segments.chunks(self.concurrency).enumerate() {
            let base = wave * self.concurrency;
            let results = join_all(
                chunk
                    .iter()
                    .enumerate()
                    .map(|(i, seg)| self.download_one(base + i, seg)),
            )
            .await;

            for outcome in results {
                stats.record(&outcome);
                outcomes.push(outcome);
            }
            stats.print();
        }

        if !segments.is_empty() {
            println!();
        }

        outcomes
    }

    async fn download_one(&self, index: usize, seg: &SegmentRef) -> DownloadOutcome {
        if self.resume.should_skip(self.cache, seg).await {
            debug!("{} already present, skipping", seg.local_file_name);
            return DownloadOutcome::Skipped(SkipReason::AlreadyPresent);
        }

        let path = self.cache.resolve_path(&seg.local_file_name);
        let partial = self.cache.resolve_path(&format!(
            "{}.{}{}",
            seg.local_file_name, index, PARTIAL_SUFFIX
        ));

        match self
            .client
            .download_file(&seg.fetch_url(), &path, &partial)
            .await
        {
            Ok(d) => {
                debug!("Fetched {} ({} bytes)", seg.local_file_name, d.bytes_written);
                DownloadOutcome::Fetched {
                    bytes_written: d.bytes_written,
                    content_type: d.content_type,
                }
            }
            Err(e) => {
                warn!("Could not download {}: {}", seg.remote_url, e);
                DownloadOutcome::Failed(e)
            }
        }
    }
}
