use std::{fmt, io::Write};

use crate::{download::DownloadOutcome, util};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DownloadStatistics {
    pub bytes_downloaded: u64,
    pub segments_total: u64,
    pub segments_skipped: u64,
    pub segments_fetched: u64,
    pub segments_failed: u64,
}

impl DownloadStatistics {
    pub fn new(segments_total: u64) -> Self {
        Self {
            segments_total,
            ..Default::default()
        }
    }

    pub fn record(&mut self, outcome: &DownloadOutcome) {
        match outcome {
            DownloadOutcome::Skipped(_) => self.segments_skipped += 1,
            DownloadOutcome::Fetched { bytes_written, .. } => {
                self.segments_fetched += 1;
                self.bytes_downloaded += bytes_written;
            }
            DownloadOutcome::Failed(_) => self.segments_failed += 1,
        }
    }

    pub fn segments_done(&self) -> u64 {
        self.segments_skipped + self.segments_fetched + self.segments_failed
    }

    /// True when there was something to download and none of it succeeded.
    /// This is the only case in which a run is reported as failed.
    pub fn all_failed(&self) -> bool {
        self.segments_total > 0 && self.segments_failed == self.segments_total
    }

    pub fn print(&self) {
        print!(
            "\x1b[2K\rDownloaded {} of {} segments ({})",
            self.segments_done(),
            self.segments_total,
            util::format_bytes(self.bytes_downloaded)
        );
        let _ = std::io::stdout().lock().flush();
    }
}

impl fmt::Display for DownloadStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} segments: {} fetched ({}), {} skipped, {} failed",
            self.segments_total,
            self.segments_fetched,
            util::format_bytes(self.bytes_downloaded),
            self.segments_skipped,
            self.segments_failed,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::SkipReason;

    fn failed() -> DownloadOutcome {
        DownloadOutcome::Failed(std::io::Error::other("boom").into())
    }

    #[test]
    fn counts_outcomes() {
        let mut stats = DownloadStatistics::new(3);
        stats.record(&DownloadOutcome::Skipped(SkipReason::AlreadyPresent));
        stats.record(&DownloadOutcome::Fetched {
            bytes_written: 2048,
            content_type: Some("video/mp2t".to_string()),
        });
        stats.record(&failed());

        assert_eq!(stats.segments_done(), 3);
        assert_eq!(stats.bytes_downloaded, 2048);
        assert!(!stats.all_failed());
        assert_eq!(
            stats.to_string(),
            "3 segments: 1 fetched (2.00 KiB), 1 skipped, 1 failed"
        );
    }

    #[test]
    fn partial_failure_is_not_a_failed_run() {
        let mut stats = DownloadStatistics::new(2);
        stats.record(&failed());
        stats.record(&DownloadOutcome::Skipped(SkipReason::AlreadyPresent));

        assert!(!stats.all_failed());
    }

    #[test]
    fn every_segment_failing_fails_the_run() {
        let mut stats = DownloadStatistics::new(2);
        stats.record(&failed());
        stats.record(&failed());

        assert!(stats.all_failed());
    }

    #[test]
    fn empty_playlist_does_not_fail() {
        assert!(!DownloadStatistics::new(0).all_failed());
    }
}
