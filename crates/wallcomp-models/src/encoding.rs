//! Output encoding policy.
//!
//! The composed artifact is always encoded with the same settings; nothing
//! here is derived from the request.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default pixel format
pub const DEFAULT_PIXEL_FORMAT: &str = "yuv420p";
/// Default target video bitrate
pub const DEFAULT_VIDEO_BITRATE: &str = "5M";
/// Colour of the base canvas
pub const DEFAULT_CANVAS_COLOR: &str = "white";
/// Container extension of composed artifacts
pub const OUTPUT_EXTENSION: &str = "mp4";

/// Video encoding configuration for composed output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EncodingConfig {
    /// Video codec (e.g., "libx264")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Pixel format (e.g., "yuv420p")
    #[serde(default = "default_pixel_format")]
    pub pixel_format: String,

    /// Target video bitrate (e.g., "5M")
    #[serde(default = "default_video_bitrate")]
    pub video_bitrate: String,

    /// Colour of the synthetic canvas the layers are drawn on
    #[serde(default = "default_canvas_color")]
    pub canvas_color: String,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_pixel_format() -> String {
    DEFAULT_PIXEL_FORMAT.to_string()
}
fn default_video_bitrate() -> String {
    DEFAULT_VIDEO_BITRATE.to_string()
}
fn default_canvas_color() -> String {
    DEFAULT_CANVAS_COLOR.to_string()
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            pixel_format: DEFAULT_PIXEL_FORMAT.to_string(),
            video_bitrate: DEFAULT_VIDEO_BITRATE.to_string(),
            canvas_color: DEFAULT_CANVAS_COLOR.to_string(),
        }
    }
}

impl EncodingConfig {
    /// Convert to FFmpeg output arguments.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-pix_fmt".to_string(),
            self.pixel_format.clone(),
            "-b:v".to_string(),
            self.video_bitrate.clone(),
        ]
    }
}
