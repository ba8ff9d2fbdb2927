use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use hls_mirror::{
    config::{Config, DEFAULT_HOST, DEFAULT_MUXER, DEFAULT_PORT, DEFAULT_RETRIES},
    download::DEFAULT_CONCURRENCY,
    ffmpeg::{self, FfmpegError},
    server::{LocalServer, ServerError},
    source::{CapturedPlaylist, SourceError},
    util,
    worker::{self, WorkerError},
};

/// Mirror the segments of an HLS playlist and mux them into one file
#[derive(Parser, Debug)]
#[command(name = "hls-mirror", version)]
struct Args {
    /// Playlist to mirror, `<NAME>.m3u8` in the working directory. Defaults
    /// to the only playlist there
    name: Option<String>,

    /// Directory holding the input playlist and the output file
    #[arg(long, default_value = ".")]
    work_dir: PathBuf,

    /// Segment cache directory [default: <WORK_DIR>/segments]
    #[arg(long)]
    segments_dir: Option<PathBuf>,

    /// Host the local file server listens on
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Port the local file server listens on
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Maximum number of simultaneous segment downloads
    #[arg(short, long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Retries for transient HTTP failures
    #[arg(long, default_value_t = DEFAULT_RETRIES)]
    retries: u32,

    /// Muxer executable
    #[arg(long, default_value = DEFAULT_MUXER)]
    muxer: String,

    /// Clear the segment cache even if it still matches the playlist
    #[arg(long)]
    purge: bool,

    /// Only download, do not serve and mux
    #[arg(long)]
    no_mux: bool,

    /// Fetch the playlist from this URL into the working directory first
    #[arg(long, conflicts_with_all = ["name", "capture"])]
    url: Option<String>,

    /// Page title naming the playlist fetched with --url
    #[arg(long, requires = "url")]
    title: Option<String>,

    /// Fetch the playlist described by a JSON capture record
    #[arg(long, conflicts_with = "name")]
    capture: Option<PathBuf>,
}

impl Args {
    fn config(&self) -> Config {
        let mut config = Config::new(&self.work_dir);
        if let Some(dir) = &self.segments_dir {
            config.segments_dir = dir.clone();
        }
        config.host = self.host.clone();
        config.port = self.port;
        config.concurrency = self.concurrency;
        config.retries = self.retries;
        config.muxer = self.muxer.clone();
        config.force_purge = self.purge;
        config.mux = !self.no_mux;
        config
    }
}

#[derive(thiserror::Error, Debug)]
enum AppError {
    #[error("could not create HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Worker(#[from] WorkerError),
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error("muxing failed: {0}")]
    Mux(#[from] FfmpegError),
}

async fn run(args: Args) -> Result<ExitCode, AppError> {
    let config = args.config();
    let client = util::HttpClient::with_retries(config.retries)?;

    let capture = match (&args.url, &args.capture) {
        (Some(url), _) => Some(CapturedPlaylist::new(url, args.title.as_deref())),
        (None, Some(path)) => Some(CapturedPlaylist::from_file(path).await?),
        (None, None) => None,
    };
    let name = match capture {
        Some(capture) => Some(capture.save(&client, &config.work_dir).await?),
        None => args.name.clone(),
    };

    let report = worker::start(&client, &config, name.as_deref()).await?;
    println!("{}", report.stats);

    if report.stats.all_failed() {
        println!("Every segment failed to download");
        return Ok(ExitCode::FAILURE);
    }
    if report.stats.segments_failed > 0 {
        println!(
            "{} segments failed, the output will have gaps",
            report.stats.segments_failed
        );
    }

    if !config.mux {
        println!("Segments are in {}", config.segments_dir.display());
        return Ok(ExitCode::SUCCESS);
    }

    let server = LocalServer::bind(&config.cache(), &config.host, config.port).await?;
    let output = config.work_dir.join(format!("{}.mp4", report.source.name));
    let res = ffmpeg::mux(&config.muxer, &report.base_url, &output).await;
    server.shutdown();
    res?;

    println!("Wrote {}", output.display());

    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Args::parse()).await {
        Ok(code) => code,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
