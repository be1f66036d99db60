//! API configuration.

use std::path::PathBuf;

use wallcomp_media::EngineConfig;

/// Default request body limit: large enough for a handful of wallpaper clips.
const DEFAULT_MAX_BODY_SIZE: usize = 512 * 1024 * 1024;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Base of the download URLs handed back to clients
    pub public_base_url: String,
    /// Root of scratch uploads and composed artifacts
    pub work_dir: PathBuf,
    /// Max request body size
    pub max_body_size: usize,
    /// Rate limit requests per second
    pub rate_limit_rps: u32,
    /// Environment (development/production)
    pub environment: String,
    /// Serve Prometheus metrics at /metrics
    pub metrics_enabled: bool,
    /// Accept local file paths as sources on the JSON endpoint
    pub allow_local_sources: bool,
    /// FFmpeg executable
    pub ffmpeg_path: PathBuf,
    /// Kill FFmpeg after this many seconds
    pub ffmpeg_timeout_secs: Option<u64>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            public_base_url: "http://localhost:8000".to_string(),
            work_dir: PathBuf::from("temp"),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            rate_limit_rps: 10,
            environment: "development".to_string(),
            metrics_enabled: true,
            allow_local_sources: false,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffmpeg_timeout_secs: None,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.public_base_url),
            work_dir: std::env::var("WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_body_size),
            rate_limit_rps: std::env::var("RATE_LIMIT_RPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.rate_limit_rps),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.metrics_enabled),
            allow_local_sources: std::env::var("ALLOW_LOCAL_SOURCES")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.allow_local_sources),
            ffmpeg_path: std::env::var("FFMPEG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.ffmpeg_path),
            ffmpeg_timeout_secs: std::env::var("FFMPEG_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }

    /// Parent of the per-request scratch directories.
    pub fn uploads_dir(&self) -> PathBuf {
        self.work_dir.join("uploads")
    }

    /// Where composed artifacts are kept.
    pub fn output_dir(&self) -> PathBuf {
        self.work_dir.join("output")
    }

    /// Engine settings derived from this config.
    pub fn engine_config(&self) -> EngineConfig {
        let config = EngineConfig::default().with_ffmpeg_path(self.ffmpeg_path.clone());
        match self.ffmpeg_timeout_secs {
            Some(secs) => config.with_timeout(secs),
            None => config,
        }
    }

    /// Public download URL of an artifact.
    pub fn download_url(&self, file_name: &str) -> String {
        format!(
            "{}/download/{}",
            self.public_base_url.trim_end_matches('/'),
            file_name
        )
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
