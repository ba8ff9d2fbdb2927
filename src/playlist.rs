use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
};

use regex::Regex;

use crate::cache::SegmentCache;

#[derive(thiserror::Error, Debug)]
pub enum PlaylistError {
    #[error("could not read playlist {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A media segment referenced by a playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentRef {
    /// The URL exactly as it appears in the playlist.
    pub remote_url: String,
    /// Name of the segment inside the segment cache.
    pub local_file_name: String,
}

impl SegmentRef {
    pub fn new(remote_url: &str) -> Self {
        Self {
            remote_url: remote_url.to_string(),
            local_file_name: local_file_name(remote_url),
        }
    }

    /// URL to issue requests against. Protocol-relative references are
    /// fetched over https.
    pub fn fetch_url(&self) -> String {
        if self.remote_url.starts_with("//") {
            format!("https:{}", self.remote_url)
        } else {
            self.remote_url.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaylistLine {
    /// Tags, comments and anything else that is not a segment. Kept verbatim.
    Directive(String),
    Segment(SegmentRef),
}

fn cdn_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^//cdn").expect("static regex"))
}

fn is_segment_line(line: &str) -> bool {
    line.starts_with("http") || cdn_marker().is_match(line)
}

/// Derive the cache file name of a segment: the last path component of the
/// URL, with `.html` and `.jpg` disguises mapped back to `.ts`. Names that
/// would fall under the cache's reserved prefix get a `segment_` prefix.
pub fn local_file_name(url: &str) -> String {
    let path = url.split(|c: char| c == '?' || c == '#').next().unwrap_or_default();
    let name = path.rsplit('/').next().unwrap_or_default();
    let name = if name.is_empty() { "segment" } else { name };

    let name = match Path::new(name).extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("jpg") => {
            let stem = &name[..name.len() - ext.len() - 1];
            format!("{}.ts", stem)
        }
        _ => name.to_string(),
    };

    // Reserved names belong to the mirror's own files.
    if SegmentCache::is_reserved(&name) {
        format!("segment_{}", name)
    } else {
        name
    }
}

/// Split playlist text into classified lines. Blank lines are dropped.
pub fn parse_playlist(text: &str) -> Vec<PlaylistLine> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            if is_segment_line(line) {
                PlaylistLine::Segment(SegmentRef::new(line))
            } else {
                PlaylistLine::Directive(line.to_string())
            }
        })
        .collect()
}

pub async fn read_playlist(path: &Path) -> Result<Vec<PlaylistLine>, PlaylistError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| PlaylistError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(parse_playlist(&text))
}

pub fn segments(lines: &[PlaylistLine]) -> impl Iterator<Item = &SegmentRef> {
    lines.iter().filter_map(|line| match line {
        PlaylistLine::Segment(seg) => Some(seg),
        PlaylistLine::Directive(_) => None,
    })
}
