//! Remote source fetching.
//!
//! Downloads a publicly reachable media URL to a local file so it can be
//! validated and fed to the engine. Bodies are streamed to disk chunk by
//! chunk; large media never sits in memory whole.

use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{MediaError, MediaResult};
use crate::fs_utils;
use crate::metrics;

/// Default request timeout for a single fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Fetch settings.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Whole-request timeout
    pub timeout: Duration,
    /// User-Agent header
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_FETCH_TIMEOUT,
            user_agent: format!("wallcomp/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl FetchConfig {
    /// Set timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Downloads remote sources to local files.
#[derive(Debug, Clone)]
pub struct SourceFetcher {
    client: reqwest::Client,
}

impl SourceFetcher {
    pub fn new(config: FetchConfig) -> MediaResult<Self> {
        // Redirect targets are never re-checked against the address guard
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| MediaError::internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Download `url` to `dest`, returning `dest`.
    ///
    /// A non-success status is a failure. A partially written file is
    /// removed before the error is returned.
    pub async fn fetch(&self, url: &Url, dest: &Path) -> MediaResult<PathBuf> {
        info!("Fetching source {} -> {}", url, dest.display());
        let started = Instant::now();

        let result = self.download(url, dest).await;
        metrics::record_fetch(started.elapsed().as_secs_f64(), result.is_ok());

        if let Err(e) = &result {
            warn!(url = %url, error = %e, "Source fetch failed");
            if let Err(remove_err) = fs::remove_file(dest).await {
                if remove_err.kind() != std::io::ErrorKind::NotFound {
                    warn!(
                        "Failed to remove partial download {}: {}",
                        dest.display(),
                        remove_err
                    );
                }
            }
        }

        result.map(|bytes| {
            debug!(bytes, "Fetched {}", url);
            dest.to_path_buf()
        })
    }

    async fn download(&self, url: &Url, dest: &Path) -> MediaResult<u64> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| MediaError::fetch_failed(url.as_str(), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::fetch_failed(
                url.as_str(),
                format!("server responded with {}", status),
            ));
        }

        let mut file = fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| MediaError::fetch_failed(url.as_str(), e.to_string()))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;
        Ok(written)
    }
}

/// Local file name for a fetched source, keeping a plausible extension.
pub fn fetched_file_name(index: usize, url: &Url) -> String {
    format!("source_{}.{}", index, fs_utils::safe_extension(url.path()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> SourceFetcher {
        SourceFetcher::new(FetchConfig::default().with_timeout(Duration::from_secs(5))).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_streams_body_to_disk() {
        let server = MockServer::start().await;
        let body = vec![7u8; 256 * 1024];
        Mock::given(method("GET"))
            .and(path("/media/clip.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("clip.mp4");
        let url = Url::parse(&format!("{}/media/clip.mp4", server.uri())).unwrap();

        let saved = fetcher().fetch(&url, &dest).await.unwrap();
        assert_eq!(saved, dest);
        assert_eq!(std::fs::read(&dest).unwrap(), body);
    }

    #[tokio::test]
    async fn test_non_success_status_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("missing.mp4");
        let url = Url::parse(&format!("{}/missing.mp4", server.uri())).unwrap();

        let err = fetcher().fetch(&url, &dest).await.unwrap_err();
        match err {
            MediaError::FetchFailed { url: failed, message } => {
                assert!(failed.ends_with("/missing.mp4"));
                assert!(message.contains("404"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_redirects_are_not_followed() {
        let internal = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/secret"))
            .respond_with(ResponseTemplate::new(200).set_body_string("INTERNAL-SECRET"))
            .mount(&internal)
            .await;

        let public = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.mp4"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("{}/secret", internal.uri()).as_str()),
            )
            .mount(&public)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("a.mp4");
        let url = Url::parse(&format!("{}/a.mp4", public.uri())).unwrap();

        let err = fetcher().fetch(&url, &dest).await.unwrap_err();
        match err {
            MediaError::FetchFailed { message, .. } => assert!(message.contains("302")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!dest.exists());
        assert!(internal.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_fetch_error() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("clip.mp4");
        // Port 9 (discard) on localhost is closed on any sane test machine
        let url = Url::parse("http://127.0.0.1:9/clip.mp4").unwrap();

        let err = fetcher().fetch(&url, &dest).await.unwrap_err();
        assert!(matches!(err, MediaError::FetchFailed { .. }));
    }

    #[test]
    fn test_fetched_file_name() {
        let url = Url::parse("https://cdn.example.com/v/Clip.MP4?sig=abc").unwrap();
        assert_eq!(fetched_file_name(2, &url), "source_2.mp4");

        let url = Url::parse("https://cdn.example.com/stream").unwrap();
        assert_eq!(fetched_file_name(0, &url), "source_0.bin");

        let url = Url::parse("https://cdn.example.com/a.m%2Fp4").unwrap();
        assert_eq!(fetched_file_name(1, &url), "source_1.bin");
    }
}
