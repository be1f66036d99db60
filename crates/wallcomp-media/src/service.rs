//! End-to-end composition: resolve sources, validate, build, render.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use wallcomp_models::{
    encoding::OUTPUT_EXTENSION, CompositionRequest, CompositionResult, EncodingConfig, OutputId,
    SourceLocation,
};

use crate::compose::{build_graph, check_layout, is_drawn, validate};
use crate::engine::{self, CompositionEngine};
use crate::error::{MediaError, MediaResult};
use crate::fetch::{fetched_file_name, SourceFetcher};
use crate::fs_utils;
use crate::metrics;

/// Runs composition requests against an engine and collects artifacts in
/// one output directory.
#[derive(Clone)]
pub struct CompositionService {
    engine: Arc<dyn CompositionEngine>,
    fetcher: SourceFetcher,
    output_dir: PathBuf,
    encoding: EncodingConfig,
}

impl CompositionService {
    pub fn new(
        engine: Arc<dyn CompositionEngine>,
        fetcher: SourceFetcher,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            engine,
            fetcher,
            output_dir: output_dir.into(),
            encoding: EncodingConfig::default(),
        }
    }

    pub fn engine(&self) -> &Arc<dyn CompositionEngine> {
        &self.engine
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Path of a previously composed artifact.
    ///
    /// Only names of the form `<uuid>.mp4` are accepted, so the result never
    /// escapes the output directory. Existence is not checked.
    pub fn artifact_path(&self, file_name: &str) -> Option<PathBuf> {
        let stem = file_name.strip_suffix(&format!(".{}", OUTPUT_EXTENSION))?;
        let id = OutputId::parse(stem)?;
        Some(self.output_dir.join(id.file_name(OUTPUT_EXTENSION)))
    }

    /// Compose `request` into a new artifact.
    ///
    /// Remote sources are downloaded into `scratch_dir`, which the caller
    /// owns and cleans up. A failed render leaves no artifact behind.
    pub async fn compose(
        &self,
        request: CompositionRequest,
        scratch_dir: &Path,
    ) -> MediaResult<CompositionResult> {
        let result = self.run(request, scratch_dir).await;
        metrics::record_composition(outcome_label(&result));
        result
    }

    async fn run(
        &self,
        request: CompositionRequest,
        scratch_dir: &Path,
    ) -> MediaResult<CompositionResult> {
        check_layout(&request)?;

        let request = self
            .resolve_sources(drop_hidden(request), scratch_dir)
            .await?;
        let validated = validate(request)?;
        let graph = build_graph(&validated, &self.encoding);

        info!(
            output_id = %graph.output_id,
            placements = validated.placements().len(),
            layers = graph.overlay_count(),
            "Composing {}x{} for {}s",
            graph.canvas.width,
            graph.canvas.height,
            graph.output_duration
        );

        engine::invoke(self.engine.as_ref(), &graph, &self.output_dir).await
    }

    /// Download every remote source into `scratch_dir`, rewriting the
    /// placement to point at the local copy.
    pub async fn resolve_sources(
        &self,
        mut request: CompositionRequest,
        scratch_dir: &Path,
    ) -> MediaResult<CompositionRequest> {
        let remote = request
            .placements
            .iter()
            .filter(|p| p.source.is_remote())
            .count();
        if remote == 0 {
            return Ok(request);
        }

        fs_utils::ensure_dir(scratch_dir).await?;
        for (idx, placement) in request.placements.iter_mut().enumerate() {
            if let SourceLocation::Remote(url) = &placement.source {
                let dest = scratch_dir.join(fetched_file_name(idx, url));
                let local = self.fetcher.fetch(url, &dest).await?;
                placement.source = SourceLocation::Local(local);
            }
        }

        Ok(request)
    }
}

/// Remove placements that would never be drawn, so their sources are
/// neither fetched nor opened.
fn drop_hidden(mut request: CompositionRequest) -> CompositionRequest {
    let output_secs = request.output_secs();
    let before = request.placements.len();
    request.placements.retain(|p| is_drawn(p, output_secs));

    let hidden = before - request.placements.len();
    if hidden > 0 {
        debug!(hidden, "Dropping placements outside the output duration");
    }
    request
}

fn outcome_label(result: &MediaResult<CompositionResult>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(MediaError::Validation(_)) => "validation",
        Err(MediaError::FetchFailed { .. }) => "fetch",
        Err(e) if e.is_engine_failure() => "engine",
        Err(_) => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::CompositionGraph;
    use crate::error::ValidationError;
    use crate::fetch::FetchConfig;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use wallcomp_models::{MediaPlacement, MediaType};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Records every graph it is asked to render.
    #[derive(Default)]
    struct RecordingEngine {
        graphs: Mutex<Vec<CompositionGraph>>,
        fail: bool,
    }

    #[async_trait]
    impl CompositionEngine for RecordingEngine {
        async fn render(&self, graph: &CompositionGraph, output: &Path) -> MediaResult<()> {
            self.graphs.lock().unwrap().push(graph.clone());
            tokio::fs::write(output, b"partial").await?;
            if self.fail {
                Err(MediaError::ffmpeg_failed(
                    "exit status 1",
                    Some("Invalid data found when processing input".to_string()),
                    Some(1),
                ))
            } else {
                Ok(())
            }
        }

        fn check_available(&self) -> MediaResult<()> {
            Ok(())
        }
    }

    struct Fixture {
        dir: TempDir,
        engine: Arc<RecordingEngine>,
        service: CompositionService,
    }

    impl Fixture {
        fn new(fail: bool) -> Self {
            let dir = TempDir::new().unwrap();
            std::fs::write(dir.path().join("clip.mp4"), b"media").unwrap();
            let engine = Arc::new(RecordingEngine {
                fail,
                ..Default::default()
            });
            let fetcher = SourceFetcher::new(FetchConfig::default()).unwrap();
            let service =
                CompositionService::new(engine.clone(), fetcher, dir.path().join("output"));
            Self {
                dir,
                engine,
                service,
            }
        }

        fn scratch(&self) -> PathBuf {
            self.dir.path().join("scratch")
        }

        fn placement(&self, id: &str) -> MediaPlacement {
            MediaPlacement {
                id: id.into(),
                media_type: MediaType::Video,
                source: SourceLocation::Local(self.dir.path().join("clip.mp4")),
                x: 0.0,
                y: 0.0,
                width: 0.5,
                height: 0.5,
                start_time: 0.0,
                duration: 5.0,
            }
        }

        fn request(&self, placements: Vec<MediaPlacement>) -> CompositionRequest {
            CompositionRequest {
                canvas_width: 1280,
                canvas_height: 720,
                output_duration: 5,
                placements,
            }
        }

        fn renders(&self) -> usize {
            self.engine.graphs.lock().unwrap().len()
        }
    }

    #[tokio::test]
    async fn test_compose_writes_named_artifact() {
        let fx = Fixture::new(false);
        let result = fx
            .service
            .compose(fx.request(vec![fx.placement("a")]), &fx.scratch())
            .await
            .unwrap();

        assert_eq!(fx.renders(), 1);
        assert_eq!(result.file_name, format!("{}.mp4", result.output_id));
        assert_eq!(
            result.output_path,
            fx.dir.path().join("output").join(&result.file_name)
        );
        assert!(result.output_path.is_file());
    }

    #[tokio::test]
    async fn test_invalid_request_never_reaches_engine() {
        let fx = Fixture::new(false);
        let mut p = fx.placement("wide");
        p.width = 1.5;

        let err = fx
            .service
            .compose(fx.request(vec![p]), &fx.scratch())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            MediaError::Validation(ValidationError::OutOfRange { field: "width", .. })
        ));
        assert_eq!(fx.renders(), 0);
    }

    #[tokio::test]
    async fn test_engine_failure_removes_partial_artifact() {
        let fx = Fixture::new(true);
        let err = fx
            .service
            .compose(fx.request(vec![fx.placement("a")]), &fx.scratch())
            .await
            .unwrap_err();

        assert_eq!(
            err.diagnostic(),
            Some("Invalid data found when processing input")
        );
        let leftovers = std::fs::read_dir(fx.dir.path().join("output"))
            .unwrap()
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_remote_sources_are_fetched_before_render() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bg.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"remote media".to_vec()))
            .mount(&server)
            .await;

        let fx = Fixture::new(false);
        let mut p = fx.placement("bg");
        p.source = SourceLocation::parse(&format!("{}/bg.mp4", server.uri())).unwrap();

        fx.service
            .compose(fx.request(vec![fx.placement("a"), p]), &fx.scratch())
            .await
            .unwrap();

        let graphs = fx.engine.graphs.lock().unwrap();
        let fetched = graphs[0].layers[1].input.path().to_path_buf();
        assert_eq!(fetched, fx.scratch().join("source_1.mp4"));
        assert_eq!(std::fs::read(&fetched).unwrap(), b"remote media");
    }

    #[tokio::test]
    async fn test_hidden_placements_are_not_fetched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"remote media".to_vec()))
            .mount(&server)
            .await;

        let fx = Fixture::new(false);
        let mut late = fx.placement("late");
        late.start_time = 5.0;
        late.source = SourceLocation::parse(&format!("{}/late.mp4", server.uri())).unwrap();

        fx.service
            .compose(fx.request(vec![fx.placement("a"), late]), &fx.scratch())
            .await
            .unwrap();

        assert!(server.received_requests().await.unwrap().is_empty());
        let graphs = fx.engine.graphs.lock().unwrap();
        assert_eq!(graphs[0].overlay_count(), 1);
        assert!(!fx.scratch().join("source_1.mp4").exists());
    }

    #[tokio::test]
    async fn test_hidden_placements_are_still_validated() {
        let fx = Fixture::new(false);
        let mut late = fx.placement("late");
        late.start_time = 5.0;
        late.height = 2.0;

        let err = fx
            .service
            .compose(fx.request(vec![late]), &fx.scratch())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MediaError::Validation(ValidationError::OutOfRange { field: "height", .. })
        ));
        assert_eq!(fx.renders(), 0);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let fx = Fixture::new(false);
        let mut p = fx.placement("bg");
        p.source = SourceLocation::parse(&format!("{}/bg.mp4", server.uri())).unwrap();

        let err = fx
            .service
            .compose(fx.request(vec![p]), &fx.scratch())
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FetchFailed { .. }));
        assert_eq!(fx.renders(), 0);
    }

    #[test]
    fn test_artifact_path_only_accepts_output_names() {
        let fx = Fixture::new(false);
        let id = OutputId::new();

        let path = fx.service.artifact_path(&format!("{}.mp4", id)).unwrap();
        assert_eq!(path, fx.dir.path().join("output").join(format!("{}.mp4", id)));

        assert!(fx.service.artifact_path("../secret.mp4").is_none());
        assert!(fx.service.artifact_path(&id.to_string()).is_none());
        assert!(fx.service.artifact_path("clip.mp4").is_none());
    }
}
