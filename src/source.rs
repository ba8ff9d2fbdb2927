//! Where the input playlist comes from.
//!
//! Playlists are discovered in the working directory. A playlist URL
//! captured from page traffic (together with the page title) can be saved
//! there first with [`CapturedPlaylist::save`].

use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;

use crate::{
    cache::RESERVED_PREFIX,
    util::{DownloadError, HttpClient},
};

const PLAYLIST_EXTENSION: &str = ".m3u8";

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("no playlist found in {0}")]
    NotFound(PathBuf),
    #[error("more than one playlist found in {dir}: {candidates:?}")]
    Ambiguous {
        dir: PathBuf,
        candidates: Vec<String>,
    },
    #[error("playlist {0} does not exist")]
    Missing(PathBuf),
    #[error("could not list {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not read capture {path}: {source}")]
    CaptureRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid capture record: {0}")]
    CaptureParse(#[from] serde_json::Error),
    #[error("capture file holds no entries")]
    EmptyCapture,
    #[error("could not fetch playlist: {0}")]
    Fetch(#[from] DownloadError),
    #[error("could not save playlist {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The playlist a run works on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistSource {
    pub path: PathBuf,
    /// File name without the extension. Also names the muxed output.
    pub name: String,
}

fn is_candidate(file_name: &str) -> bool {
    file_name.to_ascii_lowercase().ends_with(PLAYLIST_EXTENSION)
        && !file_name.starts_with(RESERVED_PREFIX)
}

fn strip_extension(file_name: &str) -> &str {
    &file_name[..file_name.len() - PLAYLIST_EXTENSION.len()]
}

/// Find the input playlist. With a `name`, that is `<work_dir>/<name>.m3u8`;
/// otherwise the single `.m3u8` file in `work_dir` not reserved for the
/// mirror's own use.
pub async fn locate(work_dir: &Path, name: Option<&str>) -> Result<PlaylistSource, SourceError> {
    if let Some(name) = name {
        // A name that already carries the extension is used as given, case
        // included.
        let (path, name) = if is_candidate(name) {
            (work_dir.join(name), strip_extension(name))
        } else {
            (work_dir.join(format!("{}{}", name, PLAYLIST_EXTENSION)), name)
        };

        return match tokio::fs::metadata(&path).await {
            Ok(m) if m.is_file() => Ok(PlaylistSource {
                path,
                name: name.to_string(),
            }),
            _ => Err(SourceError::Missing(path)),
        };
    }

    let read_err = |source| SourceError::ReadDir {
        path: work_dir.to_path_buf(),
        source,
    };
    let mut entries = tokio::fs::read_dir(work_dir).await.map_err(read_err)?;
    let mut candidates = Vec::new();

    while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if is_candidate(&file_name) && entry.file_type().await.map_err(read_err)?.is_file() {
            candidates.push(file_name);
        }
    }
    candidates.sort();

    match candidates.len() {
        0 => Err(SourceError::NotFound(work_dir.to_path_buf())),
        1 => {
            let file_name = candidates.remove(0);
            Ok(PlaylistSource {
                path: work_dir.join(&file_name),
                name: strip_extension(&file_name).to_string(),
            })
        }
        _ => Err(SourceError::Ambiguous {
            dir: work_dir.to_path_buf(),
            candidates,
        }),
    }
}

/// A playlist URL seen in page traffic.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedPlaylist {
    pub url: String,
    pub page_url: Option<String>,
    pub page_title: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CaptureFile {
    One(CapturedPlaylist),
    Many(Vec<CapturedPlaylist>),
}

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("static regex"))
}

impl CapturedPlaylist {
    pub fn new(url: &str, page_title: Option<&str>) -> Self {
        Self {
            url: url.to_string(),
            page_url: None,
            page_title: page_title.map(str::to_string),
            timestamp: Some(Utc::now()),
        }
    }

    /// Parse a capture record. Lists are ordered newest first, so the first
    /// entry wins.
    pub fn from_json(json: &str) -> Result<Self, SourceError> {
        match serde_json::from_str(json)? {
            CaptureFile::One(c) => Ok(c),
            CaptureFile::Many(list) => list.into_iter().next().ok_or(SourceError::EmptyCapture),
        }
    }

    pub async fn from_file(path: &Path) -> Result<Self, SourceError> {
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SourceError::CaptureRead {
                path: path.to_path_buf(),
                source,
            })?;

        Self::from_json(&json)
    }

    /// File name (without extension) the playlist is saved under.
    pub fn file_stem(&self) -> String {
        let title = self.page_title.as_deref().unwrap_or_default();
        let stem = unsafe_chars().replace_all(title, "_");
        let stem = stem.trim_matches(|c: char| c == '_' || c == '.');
        // Tabs showing a playlist directly are titled with its file name.
        let stem = if stem.to_ascii_lowercase().ends_with(PLAYLIST_EXTENSION) {
            strip_extension(stem).trim_matches(|c: char| c == '_' || c == '.')
        } else {
            stem
        };

        if stem.is_empty() {
            let ts = self.timestamp.unwrap_or_else(Utc::now);
            format!("playlist_{}", ts.timestamp_millis())
        } else if format!("{}{}", stem, PLAYLIST_EXTENSION).starts_with(RESERVED_PREFIX) {
            format!("capture_{}", stem)
        } else {
            stem.to_string()
        }
    }

    /// Fetch the playlist and store it in `work_dir`. Returns the name to
    /// locate it by.
    pub async fn save(&self, client: &HttpClient, work_dir: &Path) -> Result<String, SourceError> {
        let text = client.fetch_text(&self.url).await?;
        let stem = self.file_stem();
        let path = work_dir.join(format!("{}{}", stem, PLAYLIST_EXTENSION));

        tokio::fs::write(&path, text)
            .await
            .map_err(|source| SourceError::Write {
                path: path.clone(),
                source,
            })?;
        info!("Saved {} to {}", self.url, path.display());

        Ok(stem)
    }
}
