//! Shared data models for the wallpaper composer.
//!
//! This crate provides Serde-serializable types for:
//! - Media placements and their sources
//! - Composition requests and results
//! - HTTP compose metadata
//! - Canvas geometry
//! - Output encoding policy

pub mod composition;
pub mod encoding;
pub mod ids;
pub mod metadata;
pub mod placement;
pub mod rect;

// Re-export common types
pub use composition::{ComposeResponse, CompositionRequest, CompositionResult};
pub use encoding::EncodingConfig;
pub use ids::{OutputId, PlacementId};
pub use metadata::{ComposeMetadata, PlacementSpec};
pub use placement::{MediaPlacement, MediaType, SourceLocation, SourceParseError};
pub use rect::{NormalizedRect, PixelRect};
