//! Wire format of compose requests arriving over HTTP.
//!
//! Differs from [`CompositionRequest`] only in that a placement's source may
//! be absent, to be filled in from an uploaded file with the same id.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::composition::CompositionRequest;
use crate::ids::PlacementId;
use crate::placement::{MediaPlacement, MediaType, SourceLocation};

/// Layout metadata for a compose request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ComposeMetadata {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub output_duration: u32,
    #[serde(default, alias = "video_positions")]
    pub placements: Vec<PlacementSpec>,
}

/// A placement whose source may still need resolving.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlacementSpec {
    pub id: PlacementId,
    #[serde(default)]
    pub media_type: MediaType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceLocation>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub start_time: f64,
    pub duration: f64,
}

impl PlacementSpec {
    /// Complete the placement with a resolved source.
    pub fn into_placement(self, source: SourceLocation) -> MediaPlacement {
        MediaPlacement {
            id: self.id,
            media_type: self.media_type,
            source,
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            start_time: self.start_time,
            duration: self.duration,
        }
    }
}

impl ComposeMetadata {
    /// Resolve every placement's source and build the composition request.
    ///
    /// `resolve` is called once per placement, in order; the first error
    /// aborts resolution.
    pub fn resolve<F, E>(self, mut resolve: F) -> Result<CompositionRequest, E>
    where
        F: FnMut(&PlacementSpec) -> Result<SourceLocation, E>,
    {
        let placements = self
            .placements
            .into_iter()
            .map(|spec| {
                let source = resolve(&spec)?;
                Ok(spec.into_placement(source))
            })
            .collect::<Result<Vec<_>, E>>()?;

        Ok(CompositionRequest {
            canvas_width: self.canvas_width,
            canvas_height: self.canvas_height,
            output_duration: self.output_duration,
            placements,
        })
    }
}
