//! Fixture origin server for the integration tests.
//!
//! Serves in-memory bodies, counts requests per path and records the highest
//! number of requests it was handling at the same time.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

#[derive(Default)]
struct Inner {
    bodies: Mutex<HashMap<String, Vec<u8>>>,
    requests: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[derive(Clone)]
pub struct Origin {
    base: String,
    delay: Duration,
    inner: Arc<Inner>,
}

struct InFlight<'a>(&'a Inner);

impl<'a> InFlight<'a> {
    fn enter(inner: &'a Inner) -> Self {
        let now = inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        inner.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(inner)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn serve(State(origin): State<Origin>, Path(path): Path<String>) -> Response {
    let inner = &origin.inner;
    let _guard = InFlight::enter(inner);
    *inner
        .requests
        .lock()
        .unwrap()
        .entry(path.clone())
        .or_default() += 1;

    tokio::time::sleep(origin.delay).await;

    let body = inner.bodies.lock().unwrap().get(&path).cloned();
    match body {
        Some(body) => ([(header::CONTENT_TYPE, "video/mp2t")], body).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

impl Origin {
    /// Start the server on an ephemeral port. Every response is held back
    /// for `delay` so concurrent requests overlap.
    pub async fn start(delay: Duration) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind fixture origin");
        let addr = listener.local_addr().unwrap();

        let origin = Origin {
            base: format!("http://{}", addr),
            delay,
            inner: Arc::default(),
        };

        let app = Router::new()
            .route("/{*path}", get(serve))
            .with_state(origin.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        origin
    }

    /// Absolute URL of `path` (without leading slash).
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path)
    }

    pub fn set(&self, path: &str, body: impl Into<Vec<u8>>) {
        self.inner
            .bodies
            .lock()
            .unwrap()
            .insert(path.to_string(), body.into());
    }

    pub fn requests(&self, path: &str) -> usize {
        self.inner
            .requests
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .unwrap_or_default()
    }

    pub fn total_requests(&self) -> usize {
        self.inner.requests.lock().unwrap().values().sum()
    }

    pub fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }
}

pub fn file_names(dir: &std::path::Path) -> Vec<String> {
    let mut names = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    names.sort();
    names
}
