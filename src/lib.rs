//! # hls-mirror
//!
//! Mirror the segments of an HLS playlist into a local directory, rewrite the
//! playlist to point at a local HTTP server, and remux the result with ffmpeg.
//!
//! ## Usage
//!
//! The `worker` module runs the whole acquisition pipeline. The returned
//! report tells whether any segment failed and where the rewritten playlist
//! lives; serving and muxing are left to the caller.
//!
//! ```no_run
//! use hls_mirror::{config::Config, server::LocalServer, util, worker};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::default();
//!     let client = util::HttpClient::new().unwrap();
//!
//!     // Finds the single .m3u8 file in the working directory
//!     let report = worker::start(&client, &config, None).await.unwrap();
//!     println!("{}", report.stats);
//!
//!     let server = LocalServer::bind(&config.cache(), &config.host, config.port)
//!         .await
//!         .unwrap();
//!     // Point a player or muxer at report.base_url ...
//!     server.shutdown();
//! }
//! ```
//!
//! Segments already present in `segments/` are not downloaded again, as long
//! as the first segment of the playlist still matches the cached copy. If it
//! does not, the cache is purged before downloading.

#![forbid(unsafe_code)]
#[macro_use]
extern crate log;

pub mod cache;
pub mod compare;
pub mod config;
pub mod download;
pub mod ffmpeg;
pub mod hls;
pub mod playlist;
pub mod server;
pub mod source;
pub mod stats;
pub mod util;
pub mod worker;
