//! Placement validation.
//!
//! Turns a [`CompositionRequest`] into a [`ValidatedRequest`], the only input
//! the graph builder accepts. Every check that could make the engine fail on
//! bad geometry or timing happens here, before anything is rendered.

use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

use wallcomp_models::{CompositionRequest, MediaPlacement, PlacementId, SourceLocation};

use crate::error::ValidationError;

/// How far a fraction may overshoot its bounds and still be clamped onto them.
pub const FRACTION_EPSILON: f64 = 1e-6;

const POSITION_RANGE: &str = "[0, 1]";
const SIZE_RANGE: &str = "(0, 1]";

/// A request that passed validation.
///
/// Placement order is exactly the order of the original request.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest(CompositionRequest);

impl ValidatedRequest {
    pub fn request(&self) -> &CompositionRequest {
        &self.0
    }

    pub fn placements(&self) -> &[MediaPlacement] {
        &self.0.placements
    }

    pub fn into_inner(self) -> CompositionRequest {
        self.0
    }
}

/// Validate and normalize a composition request.
///
/// Fractions within [`FRACTION_EPSILON`] of a bound are clamped onto it; all
/// other out-of-range values are rejected. Sources must already be readable
/// local files.
pub fn validate(request: CompositionRequest) -> Result<ValidatedRequest, ValidationError> {
    normalize(request, SourceCheck::Readable).map(ValidatedRequest)
}

/// Run every check except source resolution.
///
/// Lets callers reject a bad layout before spending time downloading its
/// remote sources.
pub fn check_layout(request: &CompositionRequest) -> Result<(), ValidationError> {
    normalize(request.clone(), SourceCheck::Skip).map(|_| ())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceCheck {
    Readable,
    Skip,
}

fn normalize(
    request: CompositionRequest,
    sources: SourceCheck,
) -> Result<CompositionRequest, ValidationError> {
    let CompositionRequest {
        canvas_width,
        canvas_height,
        output_duration,
        placements,
    } = request;

    if canvas_width == 0 || canvas_height == 0 {
        return Err(ValidationError::InvalidCanvas {
            width: canvas_width,
            height: canvas_height,
        });
    }

    if output_duration == 0 {
        return Err(ValidationError::InvalidOutputDuration);
    }

    let mut seen: HashSet<PlacementId> = HashSet::with_capacity(placements.len());
    let mut normalized = Vec::with_capacity(placements.len());

    for placement in placements {
        if !seen.insert(placement.id.clone()) {
            return Err(ValidationError::DuplicateId(placement.id));
        }
        normalized.push(validate_placement(
            placement,
            canvas_width,
            canvas_height,
            sources,
        )?);
    }

    Ok(CompositionRequest {
        canvas_width,
        canvas_height,
        output_duration,
        placements: normalized,
    })
}

fn validate_placement(
    mut placement: MediaPlacement,
    canvas_width: u32,
    canvas_height: u32,
    sources: SourceCheck,
) -> Result<MediaPlacement, ValidationError> {
    let id = &placement.id;

    placement.x = position_fraction(id, "x", placement.x)?;
    placement.y = position_fraction(id, "y", placement.y)?;
    placement.width = size_fraction(id, "width", placement.width)?;
    placement.height = size_fraction(id, "height", placement.height)?;

    finite(id, "start_time", placement.start_time)?;
    if placement.start_time < 0.0 {
        return Err(ValidationError::NegativeStartTime {
            id: id.clone(),
            value: placement.start_time,
        });
    }

    finite(id, "duration", placement.duration)?;
    if placement.duration <= 0.0 {
        return Err(ValidationError::NonPositiveDuration {
            id: id.clone(),
            value: placement.duration,
        });
    }

    let pixels = placement.rect().to_pixels(canvas_width, canvas_height);
    if pixels.is_degenerate() {
        return Err(ValidationError::DegenerateGeometry {
            id: id.clone(),
            width: pixels.width,
            height: pixels.height,
        });
    }

    if sources == SourceCheck::Skip {
        return Ok(placement);
    }

    match &placement.source {
        SourceLocation::Local(path) => {
            if !is_readable_file(path) {
                return Err(ValidationError::UnreadableSource {
                    id: id.clone(),
                    path: path.clone(),
                });
            }
        }
        SourceLocation::Remote(url) => {
            return Err(ValidationError::UnresolvedSource {
                id: id.clone(),
                location: url.to_string(),
            });
        }
    }

    Ok(placement)
}

fn finite(id: &PlacementId, field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NonFinite {
            id: id.clone(),
            field,
        })
    }
}

/// Position fractions live in [0, 1].
fn position_fraction(
    id: &PlacementId,
    field: &'static str,
    value: f64,
) -> Result<f64, ValidationError> {
    finite(id, field, value)?;
    if (0.0..=1.0).contains(&value) {
        return Ok(value);
    }
    if (-FRACTION_EPSILON..0.0).contains(&value) {
        return Ok(0.0);
    }
    if value > 1.0 && value <= 1.0 + FRACTION_EPSILON {
        return Ok(1.0);
    }
    Err(out_of_range(id, field, value, POSITION_RANGE))
}

/// Size fractions live in (0, 1]; nothing is ever clamped up to a positive size.
fn size_fraction(
    id: &PlacementId,
    field: &'static str,
    value: f64,
) -> Result<f64, ValidationError> {
    finite(id, field, value)?;
    if value > 0.0 && value <= 1.0 {
        return Ok(value);
    }
    if value > 1.0 && value <= 1.0 + FRACTION_EPSILON {
        return Ok(1.0);
    }
    Err(out_of_range(id, field, value, SIZE_RANGE))
}

fn out_of_range(
    id: &PlacementId,
    field: &'static str,
    value: f64,
    range: &'static str,
) -> ValidationError {
    ValidationError::OutOfRange {
        id: id.clone(),
        field,
        value,
        range,
    }
}

fn is_readable_file(path: &Path) -> bool {
    path.is_file() && File::open(path).is_ok()
}
