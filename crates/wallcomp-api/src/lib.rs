//! Axum HTTP API for the wallpaper composer.
//!
//! This crate provides:
//! - Multipart and JSON compose endpoints
//! - Artifact downloads
//! - Rate limiting, security headers and SSRF checks on remote sources
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
