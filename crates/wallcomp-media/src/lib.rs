#![deny(unreachable_patterns)]
//! Composition core for the wallpaper composer.
//!
//! This crate provides:
//! - Placement validation and normalization
//! - Engine-neutral composition graphs and their FFmpeg rendering
//! - The FFmpeg engine behind a swappable [`CompositionEngine`] trait
//! - Remote source fetching and artifact lifecycle

pub mod command;
pub mod compose;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod filters;
pub mod fs_utils;
pub mod metrics;
pub mod service;

pub use command::{FfmpegCommand, FfmpegInput, FfmpegRunner};
pub use compose::{build_graph, check_layout, validate, CompositionGraph, ValidatedRequest};
pub use engine::{invoke, CompositionEngine, EngineConfig, FfmpegEngine};
pub use error::{MediaError, MediaResult, ValidationError};
pub use fetch::{FetchConfig, SourceFetcher};
pub use service::CompositionService;
