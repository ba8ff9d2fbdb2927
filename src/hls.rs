use std::{collections::HashMap, path::Path};

use tokio::{
    fs::File,
    io::{self, AsyncWriteExt, BufWriter},
};

use crate::playlist::{PlaylistLine, SegmentRef};

/// The playlist served to the muxer. Always created from scratch so two
/// different source streams never end up in the same file.
pub struct LocalPlaylist {
    file: BufWriter<File>,
}

impl LocalPlaylist {
    pub async fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path).await?;

        Ok(Self {
            file: BufWriter::new(file),
        })
    }

    pub async fn add_line(&mut self, line: &str) -> io::Result<()> {
        self.file.write_all(format!("{}\n", line).as_bytes()).await
    }

    pub async fn finish(mut self) -> io::Result<()> {
        self.file.flush().await
    }
}

pub fn local_segment_url(base_url: &str, local_file_name: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), local_file_name)
}

/// Write `lines` to `path` with every segment pointing at `base_url`.
///
/// Returns the segments in playlist order. Segments whose local names collide
/// are all returned; the later download overwrites the earlier one.
pub async fn rewrite_playlist(
    lines: &[PlaylistLine],
    base_url: &str,
    path: &Path,
) -> io::Result<Vec<SegmentRef>> {
    let mut playlist = LocalPlaylist::create(path).await?;
    let mut segments = Vec::new();
    let mut seen: HashMap<&str, &str> = HashMap::new();

    for line in lines {
        match line {
            PlaylistLine::Directive(text) => playlist.add_line(text).await?,
            PlaylistLine::Segment(seg) => {
                if let Some(prev) = seen.insert(&seg.local_file_name, &seg.remote_url) {
                    if prev != seg.remote_url {
                        warn!(
                            "{} and {} share the local name {}, keeping the last one written",
                            prev, seg.remote_url, seg.local_file_name
                        );
                    }
                }
                playlist
                    .add_line(&local_segment_url(base_url, &seg.local_file_name))
                    .await?;
                segments.push(seg.clone());
            }
        }
    }

    playlist.finish().await?;
    info!(
        "Wrote {} ({} lines, {} segments)",
        path.display(),
        lines.len(),
        segments.len()
    );

    Ok(segments)
}
