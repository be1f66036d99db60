//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// One `-i` input together with the options that precede it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfmpegInput {
    /// Input arguments (before -i)
    args: Vec<String>,
    /// File path or lavfi source description
    source: String,
}

impl FfmpegInput {
    /// Input read from a file.
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            args: Vec::new(),
            source: path.as_ref().to_string_lossy().to_string(),
        }
    }

    /// Synthetic input generated by a lavfi source filter.
    pub fn lavfi(description: impl Into<String>) -> Self {
        Self {
            args: vec!["-f".to_string(), "lavfi".to_string()],
            source: description.into(),
        }
    }

    /// Add an input argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Loop the input forever.
    pub fn loop_forever(self) -> Self {
        self.arg("-stream_loop").arg("-1")
    }

    /// Repeat a single still frame for `seconds`.
    pub fn still_for(self, seconds: f64) -> Self {
        self.arg("-loop")
            .arg("1")
            .arg("-t")
            .arg(format_secs(seconds))
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Builder for multi-input FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Inputs in `-i` order; index N is addressed as `[N:v]`
    inputs: Vec<FfmpegInput>,
    /// Output file path
    output: PathBuf,
    /// Filter graph, if any
    filter_complex: Option<String>,
    /// Output arguments (after the inputs and filter graph)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command writing to `output`.
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output: output.as_ref().to_path_buf(),
            filter_complex: None,
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Append an input.
    pub fn input(mut self, input: FfmpegInput) -> Self {
        self.inputs.push(input);
        self
    }

    /// Set filter complex.
    pub fn filter_complex(mut self, filter: impl Into<String>) -> Self {
        self.filter_complex = Some(filter.into());
        self
    }

    /// Select the stream written to the output.
    pub fn map(self, stream: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(stream)
    }

    /// Add an output argument.
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Limit the output duration.
    pub fn duration(self, seconds: f64) -> Self {
        self.output_arg("-t").output_arg(format_secs(seconds))
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn inputs(&self) -> &[FfmpegInput] {
        &self.inputs
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push(self.log_level.clone());

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.source.clone());
        }

        if let Some(filter) = &self.filter_complex {
            args.push("-filter_complex".to_string());
            args.push(filter.clone());
        }

        args.extend(self.output_args.iter().cloned());

        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Whole microseconds in `seconds`, FFmpeg's internal time base.
///
/// Negative and NaN inputs count as zero.
pub fn to_micros(seconds: f64) -> u64 {
    (seconds * 1_000_000.0).round() as u64
}

/// Format seconds the way every FFmpeg argument in this crate does.
///
/// A time that rounds to zero here is zero to FFmpeg as well, and for `trim`
/// a zero duration means no limit at all.
pub fn format_secs(seconds: f64) -> String {
    let micros = to_micros(seconds);
    format!("{}.{:06}", micros / 1_000_000, micros % 1_000_000)
}

/// Runner for FFmpeg commands with an injected binary and optional timeout.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    /// FFmpeg executable: a bare name looked up in PATH, or a path
    binary: PathBuf,
    /// Timeout in seconds
    timeout_secs: Option<u64>,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegRunner {
    /// Create a runner using `ffmpeg` from PATH.
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
            timeout_secs: None,
        }
    }

    /// Use a specific FFmpeg executable.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Set timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Resolve the configured binary to an executable path.
    pub fn resolve_binary(&self) -> MediaResult<PathBuf> {
        which::which(&self.binary)
            .map_err(|_| MediaError::FfmpegNotFound(self.binary.display().to_string()))
    }

    /// Run an FFmpeg command once, capturing stderr as the failure diagnostic.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        let binary = self.resolve_binary()?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: {} {}", binary.display(), args.join(" "));

        let child = Command::new(&binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let started = Instant::now();
        let wait_future = child.wait_with_output();

        // Dropping the future on timeout drops the child, which kills it
        let output = match self.timeout_secs {
            Some(timeout_secs) => {
                match tokio::time::timeout(Duration::from_secs(timeout_secs), wait_future).await {
                    Ok(result) => result?,
                    Err(_) => {
                        warn!(
                            "FFmpeg timed out after {} seconds, killing process",
                            timeout_secs
                        );
                        return Err(MediaError::Timeout(timeout_secs));
                    }
                }
            }
            None => wait_future.await?,
        };

        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            status = %output.status,
            "FFmpeg finished"
        );

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            Err(MediaError::ffmpeg_failed(
                format!("FFmpeg exited with {}", output.status),
                (!stderr.trim().is_empty()).then_some(stderr),
                output.status.code(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("out.mp4")
            .input(FfmpegInput::lavfi("color=c=white:s=64x64:d=1"))
            .input(FfmpegInput::file("clip.mp4").loop_forever())
            .input(FfmpegInput::file("logo.png").still_for(2.5))
            .filter_complex("[0:v][1:v]overlay[v0]")
            .map("[v0]")
            .duration(1.0);

        let args = cmd.build_args();
        assert_eq!(
            args,
            vec![
                "-y",
                "-v",
                "error",
                "-f",
                "lavfi",
                "-i",
                "color=c=white:s=64x64:d=1",
                "-stream_loop",
                "-1",
                "-i",
                "clip.mp4",
                "-loop",
                "1",
                "-t",
                "2.500000",
                "-i",
                "logo.png",
                "-filter_complex",
                "[0:v][1:v]overlay[v0]",
                "-map",
                "[v0]",
                "-t",
                "1.000000",
                "out.mp4",
            ]
        );
    }

    #[test]
    fn test_format_secs_keeps_microseconds() {
        assert_eq!(format_secs(10.0), "10.000000");
        assert_eq!(format_secs(7.5), "7.500000");
        assert_eq!(format_secs(0.0004), "0.000400");
        assert_eq!(format_secs(0.000_000_4), "0.000000");
        assert_eq!(to_micros(0.000_000_4), 0);
        assert_eq!(to_micros(-1.0), 0);
    }

    #[test]
    fn test_missing_binary_is_reported() {
        let runner = FfmpegRunner::new().with_binary("/nonexistent/ffmpeg-binary");
        assert!(matches!(
            runner.resolve_binary(),
            Err(MediaError::FfmpegNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_run_with_missing_binary_fails_before_spawning() {
        let runner = FfmpegRunner::new().with_binary("/nonexistent/ffmpeg-binary");
        let cmd = FfmpegCommand::new("out.mp4");
        let err = runner.run(&cmd).await.unwrap_err();
        assert!(matches!(err, MediaError::FfmpegNotFound(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failure_captures_stderr() {
        // sh rejects "-y" as an option, exits non-zero and explains why on stderr
        let dir = tempfile::tempdir().unwrap();
        let runner = FfmpegRunner::new().with_binary("sh");
        let err = runner
            .run(&FfmpegCommand::new(dir.path().join("out.mp4")))
            .await
            .unwrap_err();

        match err {
            MediaError::FfmpegFailed {
                stderr, exit_code, ..
            } => {
                assert!(exit_code.is_some_and(|code| code != 0));
                assert!(stderr.is_some_and(|s| !s.trim().is_empty()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_process() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("slow-ffmpeg");
        std::fs::write(&script, "#!/bin/sh\nsleep 30\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let runner = FfmpegRunner::new().with_binary(&script).with_timeout(1);
        let err = runner
            .run(&FfmpegCommand::new(dir.path().join("out.mp4")))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Timeout(1)));
    }
}
