//! Layout validation and graph construction.

pub mod graph;
pub mod validate;

pub use graph::{build_graph, is_drawn, CanvasSource, CompositionGraph, Layer, LayerInput, LayerOp};
pub use validate::{check_layout, validate, ValidatedRequest, FRACTION_EPSILON};
