use std::{path::Path, sync::Arc};

use reqwest_cookie_store::CookieStoreMutex;
use reqwest_middleware::ClientWithMiddleware;
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use sha2::{Digest, Sha256};
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncWriteExt},
};

pub struct HttpClient {
    pub client: ClientWithMiddleware,
    pub cookies: Arc<CookieStoreMutex>,
}

#[derive(thiserror::Error, Debug)]
pub enum DownloadError {
    #[error("reqwest error: {0}")]
    ReqwestError(#[from] reqwest::Error),
    #[error("reqwest middleware error: {0}")]
    ReqwestMiddlewareError(#[from] reqwest_middleware::Error),
    #[error("unexpected status {status} for {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

/// What a successful transfer wrote to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downloaded {
    pub bytes_written: u64,
    pub content_type: Option<String>,
}

impl HttpClient {
    pub fn new() -> reqwest::Result<HttpClient> {
        Self::with_retries(3)
    }

    /// Build a client retrying transient failures up to `max_retries` times.
    pub fn with_retries(max_retries: u32) -> reqwest::Result<HttpClient> {
        let cookies = Arc::new(CookieStoreMutex::default());
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);

        let client = reqwest::Client::builder()
            .cookie_provider(cookies.clone())
            .build()?;

        let client = reqwest_middleware::ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(HttpClient { client, cookies })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, DownloadError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status,
            });
        }

        Ok(resp)
    }

    /// Stream the body of `url` into `path` as it arrives. On any failure the
    /// partially written file is removed.
    pub async fn write_body(&self, url: &str, path: &Path) -> Result<Downloaded, DownloadError> {
        let res = self.write_body_inner(url, path).await;
        if res.is_err() {
            let _ = tokio::fs::remove_file(path).await;
        }
        res
    }

    async fn write_body_inner(&self, url: &str, path: &Path) -> Result<Downloaded, DownloadError> {
        let mut resp = self.get(url).await?;
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut file = File::create(path).await?;
        let mut size = 0u64;

        while let Some(chunk) = resp.chunk().await? {
            file.write_all(&chunk).await?;
            size += chunk.len() as u64;
        }

        file.flush().await?;

        Ok(Downloaded {
            bytes_written: size,
            content_type,
        })
    }

    /// Download `url` through `partial` and move it to `path` once complete,
    /// so `path` never holds a truncated body.
    pub async fn download_file(
        &self,
        url: &str,
        path: &Path,
        partial: &Path,
    ) -> Result<Downloaded, DownloadError> {
        let downloaded = self.write_body(url, partial).await?;
        if let Err(e) = tokio::fs::rename(partial, path).await {
            let _ = tokio::fs::remove_file(partial).await;
            return Err(e.into());
        }

        Ok(downloaded)
    }

    pub async fn fetch_text(&self, url: &str) -> Result<String, DownloadError> {
        self.get(url).await?.text().await.map_err(|e| e.into())
    }
}

/// Hex encoded SHA-256 of a file, read in chunks.
pub async fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

pub fn format_bytes(bytes: u64) -> String {
    let mut bytes = bytes as f64;
    let mut suffix = "B";

    for next in ["KiB", "MiB", "GiB", "TiB"] {
        if bytes <= 1024.0 {
            break;
        }
        bytes /= 1024.0;
        suffix = next;
    }

    format!("{:.2} {}", bytes, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_sizes() {
        assert_eq!(format_bytes(512), "512.00 B");
        assert_eq!(format_bytes(2048), "2.00 KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MiB");
    }

    #[tokio::test]
    async fn digest_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a");
        std::fs::write(&path, b"abc").unwrap();

        assert_eq!(
            sha256_file(&path).await.unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
