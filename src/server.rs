//! HTTP server exposing the segment cache to the muxer.
//!
//! `GET /` answers with the rewritten playlist, every other path is looked
//! up in the cache directory.

use std::{io, net::SocketAddr, path::PathBuf};

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::{net::TcpListener, task::JoinHandle};
use tower_http::services::ServeDir;

use crate::cache::SegmentCache;

pub const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    #[error("could not bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Clone)]
struct ServerState {
    playlist: PathBuf,
}

pub fn router(cache: &SegmentCache) -> Router {
    let state = ServerState {
        playlist: cache.local_playlist_path(),
    };

    Router::new()
        .route("/", get(serve_playlist))
        .fallback_service(ServeDir::new(cache.root()))
        .with_state(state)
}

async fn serve_playlist(State(state): State<ServerState>) -> Response {
    match tokio::fs::read(&state.playlist).await {
        Ok(body) => ([(header::CONTENT_TYPE, PLAYLIST_CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            warn!("Could not read {}: {}", state.playlist.display(), e);
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

/// A running local server. Dropping it leaves the server running until the
/// runtime shuts down; call [`LocalServer::shutdown`] to stop it earlier.
pub struct LocalServer {
    addr: SocketAddr,
    handle: JoinHandle<io::Result<()>>,
}

impl LocalServer {
    pub async fn bind(cache: &SegmentCache, host: &str, port: u16) -> Result<Self, ServerError> {
        let addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let addr = listener.local_addr().map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;

        let app = router(cache);
        let handle = tokio::spawn(async move { axum::serve(listener, app).await });
        info!("Serving {} on http://{}", cache.root().display(), addr);

        Ok(Self { addr, handle })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn shutdown(self) {
        self.handle.abort();
    }
}
