//! Decide whether the segment cache still belongs to the stream a playlist
//! describes.
//!
//! The default check only ever looks at the first segment: it is fetched
//! again into a scratch file and its digest compared with the cached copy.
//! Other segments that happen to be cached are trusted as-is. That is a known
//! limitation; [`EverySegmentDigest`] exists for callers that want to pay for
//! verifying everything.

use std::path::Path;

use async_trait::async_trait;
use tokio::try_join;

use crate::{
    cache::{SegmentCache, SCRATCH_SUFFIX},
    playlist::SegmentRef,
    util::{self, DownloadError, HttpClient},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    /// The playlist has no segment to compare against.
    NoSegments,
    /// Nothing cached under the segment's name.
    Absent,
    DigestMismatch,
    /// The comparison itself failed. An unverifiable cache is not trusted.
    Unverifiable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale(StaleReason),
}

impl Freshness {
    pub fn is_stale(&self) -> bool {
        matches!(self, Freshness::Stale(_))
    }
}

#[async_trait]
pub trait FreshnessCheck: Send + Sync {
    async fn check(
        &self,
        client: &HttpClient,
        cache: &SegmentCache,
        segments: &[SegmentRef],
    ) -> Freshness;
}

/// Verify only the first segment of the playlist.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstSegmentDigest;

#[async_trait]
impl FreshnessCheck for FirstSegmentDigest {
    async fn check(
        &self,
        client: &HttpClient,
        cache: &SegmentCache,
        segments: &[SegmentRef],
    ) -> Freshness {
        match segments.first() {
            Some(first) => verify_segment(client, cache, first).await,
            None => Freshness::Stale(StaleReason::NoSegments),
        }
    }
}

/// Verify every segment already present in the cache, sequentially. Stale as
/// soon as one of them differs.
#[derive(Debug, Default, Clone, Copy)]
pub struct EverySegmentDigest;

#[async_trait]
impl FreshnessCheck for EverySegmentDigest {
    async fn check(
        &self,
        client: &HttpClient,
        cache: &SegmentCache,
        segments: &[SegmentRef],
    ) -> Freshness {
        if segments.is_empty() {
            return Freshness::Stale(StaleReason::NoSegments);
        }

        let mut verified = 0;
        for seg in segments {
            if !cache.exists(&seg.local_file_name).await {
                continue;
            }
            match verify_segment(client, cache, seg).await {
                Freshness::Fresh => verified += 1,
                stale => return stale,
            }
        }

        if verified == 0 {
            Freshness::Stale(StaleReason::Absent)
        } else {
            Freshness::Fresh
        }
    }
}

/// Compare the cached copy of `seg` with a fresh download of the same URL.
pub async fn verify_segment(client: &HttpClient, cache: &SegmentCache, seg: &SegmentRef) -> Freshness {
    if !cache.exists(&seg.local_file_name).await {
        return Freshness::Stale(StaleReason::Absent);
    }

    let cached = cache.resolve_path(&seg.local_file_name);
    let scratch = cache.resolve_path(&format!("{}{}", seg.local_file_name, SCRATCH_SUFFIX));

    let res = digests_match(client, &seg.fetch_url(), &cached, &scratch).await;
    let _ = tokio::fs::remove_file(&scratch).await;

    match res {
        Ok(true) => {
            debug!("{} matches the cached copy", seg.local_file_name);
            Freshness::Fresh
        }
        Ok(false) => Freshness::Stale(StaleReason::DigestMismatch),
        Err(e) => {
            warn!("Could not verify {}: {}", seg.local_file_name, e);
            Freshness::Stale(StaleReason::Unverifiable(e.to_string()))
        }
    }
}

async fn digests_match(
    client: &HttpClient,
    url: &str,
    cached: &Path,
    scratch: &Path,
) -> Result<bool, DownloadError> {
    client.write_body(url, scratch).await?;
    let (remote, local) = try_join!(util::sha256_file(scratch), util::sha256_file(cached))?;

    Ok(remote == local)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_playlist_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SegmentCache::new(dir.path());
        let client = HttpClient::with_retries(0).unwrap();

        assert_eq!(
            FirstSegmentDigest.check(&client, &cache, &[]).await,
            Freshness::Stale(StaleReason::NoSegments)
        );
        assert_eq!(
            EverySegmentDigest.check(&client, &cache, &[]).await,
            Freshness::Stale(StaleReason::NoSegments)
        );
    }

    #[tokio::test]
    async fn absent_first_segment_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SegmentCache::new(dir.path());
        let client = HttpClient::with_retries(0).unwrap();
        let segs = [SegmentRef::new("http://127.0.0.1:9/a/seg0.ts")];

        assert_eq!(
            FirstSegmentDigest.check(&client, &cache, &segs).await,
            Freshness::Stale(StaleReason::Absent)
        );
    }

    #[tokio::test]
    async fn unreachable_origin_is_stale_and_leaves_no_scratch() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SegmentCache::new(dir.path());
        let client = HttpClient::with_retries(0).unwrap();
        std::fs::write(cache.resolve_path("seg0.ts"), b"cached").unwrap();

        // Port 9 (discard) is not expected to accept HTTP connections.
        let seg = SegmentRef::new("http://127.0.0.1:9/a/seg0.ts");
        let res = verify_segment(&client, &cache, &seg).await;

        assert!(matches!(res, Freshness::Stale(StaleReason::Unverifiable(_))));
        let names = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["seg0.ts".to_string()]);
    }
}
