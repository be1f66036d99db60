//! Application state.

use std::sync::Arc;

use wallcomp_media::{
    CompositionEngine, CompositionService, FetchConfig, FfmpegEngine, MediaResult, SourceFetcher,
};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub composer: Arc<CompositionService>,
}

impl AppState {
    /// Create application state backed by the FFmpeg engine.
    pub fn new(config: ApiConfig) -> MediaResult<Self> {
        let engine = Arc::new(FfmpegEngine::new(config.engine_config()));
        Self::with_engine(config, engine)
    }

    /// Create application state around any engine.
    pub fn with_engine(config: ApiConfig, engine: Arc<dyn CompositionEngine>) -> MediaResult<Self> {
        let fetcher = SourceFetcher::new(FetchConfig::default())?;
        let composer = CompositionService::new(engine, fetcher, config.output_dir());

        Ok(Self {
            config,
            composer: Arc::new(composer),
        })
    }
}
