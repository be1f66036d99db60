//! Composition graph builder.
//!
//! A graph is a base canvas plus an ordered list of layers. Each layer loads
//! one placement's media, runs it through scale/trim/pad operations and is
//! overlaid on everything drawn before it. Layer order is placement order, so
//! later placements win where they overlap.
//!
//! The graph is engine-neutral data; [`CompositionGraph::to_command`] turns it
//! into an FFmpeg invocation.

use std::path::{Path, PathBuf};

use wallcomp_models::{
    EncodingConfig, MediaPlacement, MediaType, OutputId, PixelRect, PlacementId,
};

use crate::command::{to_micros, FfmpegCommand, FfmpegInput};
use crate::compose::validate::ValidatedRequest;
use crate::filters;

/// Solid-colour base every layer is drawn on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasSource {
    pub width: u32,
    pub height: u32,
    pub duration_secs: u32,
    pub color: String,
}

/// How a layer's media is opened.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerInput {
    /// Video looped indefinitely so short clips cover the visible duration
    LoopedVideo { path: PathBuf },
    /// Still image repeated for exactly `hold_secs`
    StillImage { path: PathBuf, hold_secs: f64 },
}

impl LayerInput {
    pub fn path(&self) -> &Path {
        match self {
            LayerInput::LoopedVideo { path } | LayerInput::StillImage { path, .. } => path,
        }
    }
}

/// Per-layer stream operation, applied in order.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerOp {
    /// Scale to an exact pixel size
    Scale { width: u32, height: u32 },
    /// Keep only `[0, duration)` of the stream
    Trim { duration: f64 },
    /// Restart timestamps at zero
    ResetTimestamps,
    /// Delay the stream by `seconds` of nothing
    PadStart { seconds: f64 },
}

impl LayerOp {
    fn to_filter(&self) -> String {
        match self {
            LayerOp::Scale { width, height } => filters::filter_scale(*width, *height),
            LayerOp::Trim { duration } => filters::filter_trim(*duration),
            LayerOp::ResetTimestamps => filters::filter_reset_pts().to_string(),
            LayerOp::PadStart { seconds } => filters::filter_pad_start(*seconds),
        }
    }
}

/// One placement, ready to overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub placement_id: PlacementId,
    pub input: LayerInput,
    pub ops: Vec<LayerOp>,
    /// Where the layer lands on the canvas, in pixels
    pub geometry: PixelRect,
    /// Seconds the layer is on screen
    pub visible_secs: f64,
    /// Seconds from the start of the output until the layer appears
    pub delay_secs: f64,
}

/// Everything needed to render one composition.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionGraph {
    pub canvas: CanvasSource,
    /// Layers in drawing order
    pub layers: Vec<Layer>,
    pub output_duration: u32,
    pub encoding: EncodingConfig,
    /// Names the artifact; the only non-deterministic part of a graph
    pub output_id: OutputId,
}

/// Whether a placement contributes anything to an output of `output_secs`.
///
/// Its visible duration must survive as at least one microsecond, the finest
/// time step the rendered command can express.
pub fn is_drawn(placement: &MediaPlacement, output_secs: f64) -> bool {
    to_micros(placement.visible_duration(output_secs)) > 0
}

/// Build the composition graph for a validated request.
///
/// Placements that are not [drawn](is_drawn) are left out entirely.
pub fn build_graph(request: &ValidatedRequest, encoding: &EncodingConfig) -> CompositionGraph {
    let req = request.request();
    let output_secs = req.output_secs();

    let layers = req
        .placements
        .iter()
        .filter_map(|placement| {
            plan_layer(placement, req.canvas_width, req.canvas_height, output_secs)
        })
        .collect();

    CompositionGraph {
        canvas: CanvasSource {
            width: req.canvas_width,
            height: req.canvas_height,
            duration_secs: req.output_duration,
            color: encoding.canvas_color.clone(),
        },
        layers,
        output_duration: req.output_duration,
        encoding: encoding.clone(),
        output_id: OutputId::new(),
    }
}

fn plan_layer(
    placement: &MediaPlacement,
    canvas_width: u32,
    canvas_height: u32,
    output_secs: f64,
) -> Option<Layer> {
    if !is_drawn(placement, output_secs) {
        return None;
    }
    let visible_secs = placement.visible_duration(output_secs);

    let geometry = placement.rect().to_pixels(canvas_width, canvas_height);
    let path = placement.source.local_path()?.to_path_buf();
    let scale = LayerOp::Scale {
        width: geometry.width,
        height: geometry.height,
    };

    let (input, mut ops) = match placement.media_type {
        MediaType::Video => (
            LayerInput::LoopedVideo { path },
            vec![
                scale,
                LayerOp::Trim {
                    duration: visible_secs,
                },
                LayerOp::ResetTimestamps,
            ],
        ),
        MediaType::Image => (
            LayerInput::StillImage {
                path,
                hold_secs: visible_secs,
            },
            vec![scale],
        ),
    };

    if placement.start_time > 0.0 {
        ops.push(LayerOp::PadStart {
            seconds: placement.start_time,
        });
    }

    Some(Layer {
        placement_id: placement.id.clone(),
        input,
        ops,
        geometry,
        visible_secs,
        delay_secs: placement.start_time,
    })
}

impl CompositionGraph {
    /// Number of overlay operations the graph performs.
    pub fn overlay_count(&self) -> usize {
        self.layers.len()
    }

    /// File name of the artifact this graph renders.
    pub fn file_name(&self) -> String {
        self.output_id
            .file_name(wallcomp_models::encoding::OUTPUT_EXTENSION)
    }

    /// Filter graph text, or `None` when there is nothing to overlay.
    ///
    /// Input 0 is the canvas; layer N reads input N+1. The current node is
    /// threaded through the layers so each overlay sits on the previous one.
    pub fn filter_complex(&self) -> Option<String> {
        if self.layers.is_empty() {
            return None;
        }

        let (chains, _) = self.layers.iter().enumerate().fold(
            (Vec::with_capacity(self.layers.len() * 2), "0:v".to_string()),
            |(mut chains, current), (idx, layer)| {
                let layer_label = format!("l{}", idx);
                let out_label = format!("v{}", idx);

                let ops: Vec<String> = layer.ops.iter().map(LayerOp::to_filter).collect();
                chains.push(format!("[{}:v]{}[{}]", idx + 1, ops.join(","), layer_label));
                chains.push(format!(
                    "[{}][{}]{}[{}]",
                    current,
                    layer_label,
                    filters::filter_overlay(layer.geometry.x, layer.geometry.y),
                    out_label
                ));

                (chains, out_label)
            },
        );

        Some(chains.join(";"))
    }

    /// Label of the final video stream.
    pub fn output_label(&self) -> String {
        match self.layers.len() {
            0 => "0:v".to_string(),
            n => format!("[v{}]", n - 1),
        }
    }

    /// FFmpeg invocation rendering this graph to `output`.
    pub fn to_command(&self, output: &Path) -> FfmpegCommand {
        let canvas = FfmpegInput::lavfi(filters::canvas_source(
            &self.canvas.color,
            self.canvas.width,
            self.canvas.height,
            self.canvas.duration_secs,
        ));

        let mut cmd = FfmpegCommand::new(output).input(canvas);
        for layer in &self.layers {
            let input = match &layer.input {
                LayerInput::LoopedVideo { path } => FfmpegInput::file(path).loop_forever(),
                LayerInput::StillImage { path, hold_secs } => {
                    FfmpegInput::file(path).still_for(*hold_secs)
                }
            };
            cmd = cmd.input(input);
        }

        if let Some(filter) = self.filter_complex() {
            cmd = cmd.filter_complex(filter);
        }

        cmd.map(self.output_label())
            .output_args(self.encoding.to_ffmpeg_args())
            .duration(f64::from(self.output_duration))
    }
}
