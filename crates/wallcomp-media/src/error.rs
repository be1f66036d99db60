//! Error types for composition.

use std::path::PathBuf;
use thiserror::Error;

use wallcomp_models::PlacementId;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// A composition request that cannot be rendered as given.
///
/// Always caused by the caller's input; never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("canvas dimensions must be positive, got {width}x{height}")]
    InvalidCanvas { width: u32, height: u32 },

    #[error("output duration must be positive")]
    InvalidOutputDuration,

    #[error("placement {id}: {field} must be a finite number")]
    NonFinite { id: PlacementId, field: &'static str },

    #[error("placement {id}: {field}={value} is outside {range}")]
    OutOfRange {
        id: PlacementId,
        field: &'static str,
        value: f64,
        range: &'static str,
    },

    #[error("placement {id}: start_time must be non-negative, got {value}")]
    NegativeStartTime { id: PlacementId, value: f64 },

    #[error("placement {id}: duration must be positive, got {value}")]
    NonPositiveDuration { id: PlacementId, value: f64 },

    #[error("duplicate placement id: {0}")]
    DuplicateId(PlacementId),

    #[error("placement {id}: source {location} has not been fetched to a local file")]
    UnresolvedSource { id: PlacementId, location: String },

    #[error("placement {id}: source {path} is not a readable file")]
    UnreadableSource { id: PlacementId, path: PathBuf },

    #[error("placement {id}: {width}x{height} px after truncation has no visible area")]
    DegenerateGeometry {
        id: PlacementId,
        width: u32,
        height: u32,
    },
}

/// Errors that can occur while composing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Invalid composition request: {0}")]
    Validation(#[from] ValidationError),

    #[error("FFmpeg not found: {0}")]
    FfmpegNotFound(String),

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("Failed to fetch {url}: {message}")]
    FetchFailed { url: String, message: String },

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a fetch failure error.
    pub fn fetch_failed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FetchFailed {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Engine diagnostic output, if this error carries any.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            MediaError::FfmpegFailed {
                stderr: Some(stderr),
                ..
            } => Some(stderr.trim()),
            _ => None,
        }
    }

    /// Whether the engine itself failed (as opposed to the input or the host).
    pub fn is_engine_failure(&self) -> bool {
        matches!(
            self,
            MediaError::FfmpegFailed { .. } | MediaError::FfmpegNotFound(_) | MediaError::Timeout(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_messages_name_the_placement() {
        let err = ValidationError::OutOfRange {
            id: "logo".into(),
            field: "width",
            value: 1.5,
            range: "(0, 1]",
        };
        assert_eq!(err.to_string(), "placement logo: width=1.5 is outside (0, 1]");
    }

    #[test]
    fn test_diagnostic_is_trimmed_stderr() {
        let err = MediaError::ffmpeg_failed(
            "FFmpeg exited with status 1",
            Some("Invalid argument\n".to_string()),
            Some(1),
        );
        assert_eq!(err.diagnostic(), Some("Invalid argument"));
        assert!(err.is_engine_failure());
        assert!(MediaError::internal("x").diagnostic().is_none());
    }
}
