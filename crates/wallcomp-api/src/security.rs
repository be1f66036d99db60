//! Security utilities for input validation.
//!
//! This module provides:
//! - Remote source URL validation (SSRF protection)
//! - Asset id validation for uploaded parts

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;
use url::Url;

/// Maximum URL length to prevent DoS attacks.
const MAX_URL_LENGTH: usize = 2048;

/// Maximum asset id length.
pub const MAX_ASSET_ID_LENGTH: usize = 128;

/// Blocked URL patterns (internal endpoints).
static BLOCKED_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Internal IP ranges
        r"^https?://127\.",
        r"^https?://0\.0\.0\.0",
        r"^https?://localhost",
        r"^https?://10\.",
        r"^https?://172\.(1[6-9]|2[0-9]|3[0-1])\.",
        r"^https?://192\.168\.",
        r"^https?://169\.254\.",
        r"^https?://\[::1\]",
        r"^https?://\[fd",
        r"^https?://\[fe80",
        // Cloud metadata endpoints
        r"^https?://metadata\.",
        r"^https?://metadata\.google\.internal",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Why a source URL was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlRejection {
    /// URL exceeds maximum length.
    TooLong,
    /// Only http and https are fetched.
    UnsupportedScheme(String),
    /// URL has no host to connect to.
    MissingHost,
    /// URL targets an internal or restricted endpoint.
    Blocked,
}

impl std::fmt::Display for UrlRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooLong => write!(
                f,
                "URL exceeds maximum length of {} characters",
                MAX_URL_LENGTH
            ),
            Self::UnsupportedScheme(scheme) => write!(
                f,
                "Invalid protocol '{}'. Only HTTP and HTTPS are allowed.",
                scheme
            ),
            Self::MissingHost => write!(f, "URL must have a valid host"),
            Self::Blocked => write!(f, "URL appears to target an internal or restricted endpoint"),
        }
    }
}

/// Check a remote media URL before the server fetches it.
pub fn validate_source_url(url: &Url) -> Result<(), UrlRejection> {
    let raw = url.as_str();
    if raw.len() > MAX_URL_LENGTH {
        return Err(UrlRejection::TooLong);
    }

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlRejection::UnsupportedScheme(scheme.to_string())),
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlRejection::MissingHost);
    }

    // Url normalizes the scheme and host to lowercase before matching
    if BLOCKED_PATTERNS.iter().any(|pattern| pattern.is_match(raw)) {
        warn!(url = %raw, "Blocked source URL pattern detected");
        return Err(UrlRejection::Blocked);
    }

    Ok(())
}

/// Validate an asset id (placement id of an uploaded part).
///
/// Valid format: ASCII alphanumerics, hyphens and underscores, 1-128 chars.
pub fn is_valid_asset_id(id: &str) -> bool {
    if id.is_empty() || id.len() > MAX_ASSET_ID_LENGTH {
        return false;
    }
    id.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
