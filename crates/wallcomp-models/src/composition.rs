//! Composition requests and results.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::encoding::OUTPUT_EXTENSION;
use crate::ids::OutputId;
use crate::placement::MediaPlacement;

/// A full layout to render: canvas, length and ordered placements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CompositionRequest {
    /// Canvas width in pixels
    pub canvas_width: u32,
    /// Canvas height in pixels
    pub canvas_height: u32,
    /// Output length in whole seconds
    pub output_duration: u32,
    /// Items to draw; later entries are drawn on top of earlier ones
    pub placements: Vec<MediaPlacement>,
}

impl CompositionRequest {
    /// Output length as fractional seconds.
    pub fn output_secs(&self) -> f64 {
        f64::from(self.output_duration)
    }
}

/// Handle to a composed artifact on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompositionResult {
    /// Random identifier the artifact is named after
    pub output_id: OutputId,
    /// Full path of the artifact
    pub output_path: PathBuf,
    /// File name of the artifact (`<output_id>.mp4`)
    pub file_name: String,
}

impl CompositionResult {
    /// Result for an artifact named after `output_id` inside `output_dir`.
    pub fn new(output_id: OutputId, output_dir: &Path) -> Self {
        let file_name = output_id.file_name(OUTPUT_EXTENSION);
        Self {
            output_id,
            output_path: output_dir.join(&file_name),
            file_name,
        }
    }
}

/// HTTP response for a finished composition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ComposeResponse {
    /// Absolute URL the artifact can be downloaded from
    pub download_url: String,
    /// Artifact file name
    pub file_name: String,
}
