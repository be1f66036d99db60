use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A normalized rectangle (0.0 to 1.0) representing a relative region of the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NormalizedRect {
    /// X coordinate of the top-left corner (0.0 = left, 1.0 = right)
    pub x: f64,
    /// Y coordinate of the top-left corner (0.0 = top, 1.0 = bottom)
    pub y: f64,
    /// Width of the rectangle (0.0 to 1.0)
    pub width: f64,
    /// Height of the rectangle (0.0 to 1.0)
    pub height: f64,
}

impl NormalizedRect {
    /// Create a new normalized rectangle.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Map onto a canvas of `canvas_width × canvas_height` pixels.
    ///
    /// Every coordinate is truncated toward zero, never rounded, so equal
    /// fractional inputs always land on the same pixels.
    pub fn to_pixels(&self, canvas_width: u32, canvas_height: u32) -> PixelRect {
        PixelRect {
            x: truncate(self.x, canvas_width),
            y: truncate(self.y, canvas_height),
            width: truncate(self.width, canvas_width),
            height: truncate(self.height, canvas_height),
        }
    }
}

/// Pixel-space placement of a layer on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    /// A rectangle with no visible area.
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

fn truncate(fraction: f64, extent: u32) -> u32 {
    // `as` saturates: NaN and negatives become 0
    (fraction * f64::from(extent)).trunc() as u32
}
