//! Engine boundary: something that renders a [`CompositionGraph`] to a file.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

use wallcomp_models::CompositionResult;

use crate::command::FfmpegRunner;
use crate::compose::CompositionGraph;
use crate::error::{MediaError, MediaResult};
use crate::fs_utils;
use crate::metrics;

/// Renders composition graphs.
///
/// Implementations make exactly one attempt per call.
#[async_trait]
pub trait CompositionEngine: Send + Sync {
    /// Render `graph` to `output`, replacing any existing file.
    async fn render(&self, graph: &CompositionGraph, output: &Path) -> MediaResult<()>;

    /// Check that the engine can be invoked at all.
    fn check_available(&self) -> MediaResult<()>;
}

/// Render `graph` into `output_dir` with a single engine attempt.
///
/// The artifact is named after the graph's output id. On any failure the
/// partially written artifact is removed before the error is returned, so a
/// handle is only ever produced for a complete file.
pub async fn invoke(
    engine: &dyn CompositionEngine,
    graph: &CompositionGraph,
    output_dir: &Path,
) -> MediaResult<CompositionResult> {
    fs_utils::ensure_dir(output_dir).await?;
    let result = CompositionResult::new(graph.output_id, output_dir);

    let rendered = match engine.render(graph, &result.output_path).await {
        Ok(()) if result.output_path.is_file() => Ok(()),
        Ok(()) => Err(MediaError::internal(format!(
            "engine reported success but {} was not written",
            result.output_path.display()
        ))),
        Err(e) => Err(e),
    };

    if let Err(e) = rendered {
        if let Err(remove_err) = fs_utils::remove_if_exists(&result.output_path).await {
            warn!(
                "Failed to remove partial artifact {}: {}",
                result.output_path.display(),
                remove_err
            );
        }
        return Err(e);
    }

    Ok(result)
}

/// FFmpeg engine settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// FFmpeg executable: a bare name looked up in PATH, or a path
    pub ffmpeg_path: PathBuf,
    /// Kill FFmpeg after this many seconds
    pub timeout_secs: Option<u64>,
    /// FFmpeg `-v` level
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            timeout_secs: None,
            log_level: "error".to_string(),
        }
    }
}

impl EngineConfig {
    /// Use a specific FFmpeg executable.
    pub fn with_ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg_path = path.into();
        self
    }

    /// Set timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

/// [`CompositionEngine`] backed by the FFmpeg CLI.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    config: EngineConfig,
    runner: FfmpegRunner,
}

impl FfmpegEngine {
    pub fn new(config: EngineConfig) -> Self {
        let mut runner = FfmpegRunner::new().with_binary(config.ffmpeg_path.clone());
        if let Some(secs) = config.timeout_secs {
            runner = runner.with_timeout(secs);
        }
        Self { config, runner }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[async_trait]
impl CompositionEngine for FfmpegEngine {
    async fn render(&self, graph: &CompositionGraph, output: &Path) -> MediaResult<()> {
        let cmd = graph
            .to_command(output)
            .log_level(self.config.log_level.clone());

        info!(
            output_id = %graph.output_id,
            layers = graph.overlay_count(),
            "Running FFmpeg composition"
        );

        let started = Instant::now();
        let result = self.runner.run(&cmd).await;
        metrics::record_engine_run(started.elapsed().as_secs_f64(), result.is_ok());

        match &result {
            Ok(()) => info!(output = %output.display(), "Composition complete"),
            Err(e) => warn!(output_id = %graph.output_id, error = %e, "FFmpeg composition failed"),
        }

        result
    }

    fn check_available(&self) -> MediaResult<()> {
        self.runner.resolve_binary().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wallcomp_models::{EncodingConfig, OutputId};

    use crate::compose::CanvasSource;

    fn empty_graph() -> CompositionGraph {
        CompositionGraph {
            canvas: CanvasSource {
                width: 320,
                height: 240,
                duration_secs: 1,
                color: "white".to_string(),
            },
            layers: Vec::new(),
            output_duration: 1,
            encoding: EncodingConfig::default(),
            output_id: OutputId::new(),
        }
    }

    /// Writes nothing and reports success.
    struct SilentEngine;

    #[async_trait]
    impl CompositionEngine for SilentEngine {
        async fn render(&self, _graph: &CompositionGraph, _output: &Path) -> MediaResult<()> {
            Ok(())
        }

        fn check_available(&self) -> MediaResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_invoke_rejects_missing_artifact() {
        let dir = TempDir::new().unwrap();
        let err = invoke(&SilentEngine, &empty_graph(), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Internal(_)));
    }

    #[tokio::test]
    async fn test_invoke_with_missing_binary_leaves_nothing_behind() {
        let dir = TempDir::new().unwrap();
        let output_dir = dir.path().join("output");
        let engine = FfmpegEngine::new(
            EngineConfig::default().with_ffmpeg_path("/nonexistent/ffmpeg-binary"),
        );

        let err = invoke(&engine, &empty_graph(), &output_dir)
            .await
            .unwrap_err();
        assert!(err.is_engine_failure());
        assert_eq!(std::fs::read_dir(&output_dir).unwrap().count(), 0);
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg on PATH"]
    async fn test_renders_blank_canvas_with_real_ffmpeg() {
        let dir = TempDir::new().unwrap();
        let engine = FfmpegEngine::new(EngineConfig::default());
        let graph = empty_graph();

        let result = invoke(&engine, &graph, dir.path()).await.unwrap();
        assert_eq!(result.output_id, graph.output_id);
        assert!(std::fs::metadata(&result.output_path).unwrap().len() > 0);
    }

    /// Helpers for tests that render with a real FFmpeg and inspect pixels.
    mod real {
        use std::path::{Path, PathBuf};
        use std::process::Command;

        use wallcomp_models::{
            CompositionRequest, EncodingConfig, MediaPlacement, MediaType, SourceLocation,
        };

        use crate::command::format_secs;
        use crate::compose::{build_graph, validate, CompositionGraph};

        pub const CANVAS: u32 = 128;
        pub const WHITE: [u8; 3] = [255, 255, 255];
        pub const RED: [u8; 3] = [255, 0, 0];
        pub const BLUE: [u8; 3] = [0, 0, 255];

        fn ffmpeg(args: &[&str], output: &Path) {
            let status = Command::new("ffmpeg")
                .args(["-y", "-v", "error"])
                .args(args)
                .arg(output)
                .status()
                .unwrap();
            assert!(status.success(), "ffmpeg failed for {}", output.display());
        }

        /// One-frame PNG of a single colour.
        pub fn solid_image(dir: &Path, color: &str) -> PathBuf {
            let path = dir.join(format!("{}.png", color));
            let source = format!("color=c={}:s=64x64", color);
            ffmpeg(&["-f", "lavfi", "-i", &source, "-frames:v", "1"], &path);
            path
        }

        /// Short H.264 clip of a single colour.
        pub fn solid_video(dir: &Path, color: &str, secs: u32) -> PathBuf {
            let path = dir.join(format!("{}.mp4", color));
            let source = format!("color=c={}:s=64x64:d={}", color, secs);
            ffmpeg(
                &["-f", "lavfi", "-i", &source, "-c:v", "libx264", "-pix_fmt", "yuv420p"],
                &path,
            );
            path
        }

        #[allow(clippy::too_many_arguments)]
        pub fn placement(
            id: &str,
            media_type: MediaType,
            path: &Path,
            x: f64,
            y: f64,
            size: f64,
            start_time: f64,
            duration: f64,
        ) -> MediaPlacement {
            MediaPlacement {
                id: id.into(),
                media_type,
                source: SourceLocation::Local(path.to_path_buf()),
                x,
                y,
                width: size,
                height: size,
                start_time,
                duration,
            }
        }

        pub fn graph(output_duration: u32, placements: Vec<MediaPlacement>) -> CompositionGraph {
            let request = CompositionRequest {
                canvas_width: CANVAS,
                canvas_height: CANVAS,
                output_duration,
                placements,
            };
            build_graph(&validate(request).unwrap(), &EncodingConfig::default())
        }

        /// RGB of pixel `(x, y)` in the frame shown at `at_secs`.
        pub fn pixel_at(video: &Path, at_secs: f64, x: u32, y: u32) -> [u8; 3] {
            let output = Command::new("ffmpeg")
                .args(["-v", "error", "-ss", &format_secs(at_secs), "-i"])
                .arg(video)
                .args(["-frames:v", "1", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
                .output()
                .unwrap();
            assert!(output.status.success());
            let offset = ((y * CANVAS + x) * 3) as usize;
            [
                output.stdout[offset],
                output.stdout[offset + 1],
                output.stdout[offset + 2],
            ]
        }

        /// Colours survive lossy encoding only approximately.
        pub fn assert_near(actual: [u8; 3], expected: [u8; 3], what: &str) {
            let close = actual
                .iter()
                .zip(expected)
                .all(|(a, e)| a.abs_diff(e) <= 48);
            assert!(close, "{}: got {:?}, expected about {:?}", what, actual, expected);
        }
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg on PATH"]
    async fn test_later_placement_wins_where_layers_overlap() {
        use real::*;
        use wallcomp_models::MediaType;

        let dir = TempDir::new().unwrap();
        let red = solid_image(dir.path(), "red");
        let blue = solid_image(dir.path(), "blue");
        // red covers [0, 96) on both axes, blue covers [32, 128)
        let graph = graph(
            2,
            vec![
                placement("under", MediaType::Image, &red, 0.0, 0.0, 0.75, 0.0, 2.0),
                placement("over", MediaType::Image, &blue, 0.25, 0.25, 0.75, 0.0, 2.0),
            ],
        );

        let engine = FfmpegEngine::new(EngineConfig::default());
        let result = invoke(&engine, &graph, &dir.path().join("output"))
            .await
            .unwrap();

        let video = &result.output_path;
        assert_near(pixel_at(video, 1.0, 64, 64), BLUE, "overlap");
        assert_near(pixel_at(video, 1.0, 16, 16), RED, "bottom layer only");
        assert_near(pixel_at(video, 1.0, 120, 8), WHITE, "canvas");
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg on PATH"]
    async fn test_layers_appear_and_disappear_on_time() {
        use real::*;
        use wallcomp_models::MediaType;

        let dir = TempDir::new().unwrap();
        let red = solid_image(dir.path(), "red");
        let blue = solid_video(dir.path(), "blue", 1);
        // left half: image from 2s to 4s; right half: video for the first second
        let graph = graph(
            4,
            vec![
                placement("late", MediaType::Image, &red, 0.0, 0.0, 0.5, 2.0, 2.0),
                placement("early", MediaType::Video, &blue, 0.5, 0.0, 0.5, 0.0, 1.0),
            ],
        );

        let engine = FfmpegEngine::new(EngineConfig::default());
        let result = invoke(&engine, &graph, &dir.path().join("output"))
            .await
            .unwrap();

        let video = &result.output_path;
        assert_near(pixel_at(video, 0.5, 32, 32), WHITE, "image before its start");
        assert_near(pixel_at(video, 0.5, 96, 32), BLUE, "video while visible");
        assert_near(pixel_at(video, 3.0, 32, 32), RED, "image after its start");
        assert_near(pixel_at(video, 3.0, 96, 32), WHITE, "video after it ends");
    }

    #[test]
    fn test_default_config_uses_path_lookup() {
        let config = EngineConfig::default();
        assert_eq!(config.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert_eq!(config.timeout_secs, None);
    }

    #[test]
    fn test_configured_path_is_used() {
        let engine = FfmpegEngine::new(
            EngineConfig::default()
                .with_ffmpeg_path("/opt/missing/ffmpeg")
                .with_timeout(30),
        );
        assert_eq!(engine.config().timeout_secs, Some(30));
        match engine.check_available() {
            Err(MediaError::FfmpegNotFound(path)) => assert_eq!(path, "/opt/missing/ffmpeg"),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
