//! Media placements: one item's source, position, size and timing.

use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::ids::PlacementId;
use crate::rect::NormalizedRect;

/// Kind of media a placement draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    /// Video clip, looped to cover its visible duration
    #[default]
    Video,
    /// Still image, held for its visible duration
    Image,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Video => "video",
            MediaType::Image => "image",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a placement's media lives.
///
/// Serialized as one string: `http(s)://` values are remote, anything else is
/// a local path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SourceLocation {
    /// File on the local filesystem
    Local(PathBuf),
    /// Publicly fetchable URL
    Remote(Url),
}

/// Error parsing a [`SourceLocation`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceParseError {
    #[error("source location is empty")]
    Empty,

    #[error("invalid source URL: {0}")]
    InvalidUrl(String),
}

impl SourceLocation {
    /// Parse a source string.
    pub fn parse(s: &str) -> Result<Self, SourceParseError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(SourceParseError::Empty);
        }

        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Url::parse(trimmed)
                .map(SourceLocation::Remote)
                .map_err(|e| SourceParseError::InvalidUrl(e.to_string()));
        }

        Ok(SourceLocation::Local(PathBuf::from(trimmed)))
    }

    /// Local path, if already resolved.
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            SourceLocation::Local(path) => Some(path),
            SourceLocation::Remote(_) => None,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, SourceLocation::Remote(_))
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocation::Local(path) => write!(f, "{}", path.display()),
            SourceLocation::Remote(url) => write!(f, "{}", url),
        }
    }
}

impl TryFrom<String> for SourceLocation {
    type Error = SourceParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SourceLocation> for String {
    fn from(value: SourceLocation) -> Self {
        match value {
            SourceLocation::Local(path) => path.to_string_lossy().into_owned(),
            SourceLocation::Remote(url) => url.into(),
        }
    }
}

impl From<PathBuf> for SourceLocation {
    fn from(path: PathBuf) -> Self {
        SourceLocation::Local(path)
    }
}

impl JsonSchema for SourceLocation {
    fn schema_name() -> String {
        "SourceLocation".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        String::json_schema(gen)
    }
}

/// One item to composite onto the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MediaPlacement {
    /// Identifier, unique within the request
    pub id: PlacementId,
    /// Video or image
    #[serde(default)]
    pub media_type: MediaType,
    /// Local path or remote URL of the media
    pub source: SourceLocation,
    /// Left edge as a fraction of canvas width, in [0, 1]
    pub x: f64,
    /// Top edge as a fraction of canvas height, in [0, 1]
    pub y: f64,
    /// Width as a fraction of canvas width, in (0, 1]
    pub width: f64,
    /// Height as a fraction of canvas height, in (0, 1]
    pub height: f64,
    /// Offset from the start of the output timeline, in seconds
    pub start_time: f64,
    /// How long the item is visible, in seconds
    pub duration: f64,
}

impl MediaPlacement {
    /// Position and size as a normalized rectangle.
    pub fn rect(&self) -> NormalizedRect {
        NormalizedRect::new(self.x, self.y, self.width, self.height)
    }

    /// Seconds this placement is actually on screen within an output of
    /// `output_duration` seconds. Zero or negative means it never appears.
    pub fn visible_duration(&self, output_duration: f64) -> f64 {
        self.duration.min(output_duration - self.start_time)
    }
}
