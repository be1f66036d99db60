//! FFmpeg filter and source definitions used by the composition graph.

use crate::command::format_secs;

/// Pixel format a layer is converted to before transparent padding.
pub const ALPHA_PIXEL_FORMAT: &str = "yuva420p";

/// Solid-colour lavfi source of the given size and length.
pub fn canvas_source(color: &str, width: u32, height: u32, duration_secs: u32) -> String {
    format!("color=c={}:s={}x{}:d={}", color, width, height, duration_secs)
}

/// Scale to an exact pixel size.
pub fn filter_scale(width: u32, height: u32) -> String {
    format!("scale={}:{}", width, height)
}

/// Keep the first `duration` seconds of a stream.
pub fn filter_trim(duration: f64) -> String {
    format!("trim=start=0:duration={}", format_secs(duration))
}

/// Restart stream timestamps at zero.
pub fn filter_reset_pts() -> &'static str {
    "setpts=PTS-STARTPTS"
}

/// Delay a stream by `seconds` of fully transparent frames.
pub fn filter_pad_start(seconds: f64) -> String {
    format!(
        "format={},tpad=start_duration={}:color=black@0",
        ALPHA_PIXEL_FORMAT,
        format_secs(seconds)
    )
}

/// Draw the second input on the first at `(x, y)`.
///
/// The layer stops drawing when its own stream ends instead of freezing on
/// its last frame.
pub fn filter_overlay(x: u32, y: u32) -> String {
    format!("overlay=x={}:y={}:eof_action=pass", x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canvas_source() {
        assert_eq!(
            canvas_source("white", 1920, 1080, 10),
            "color=c=white:s=1920x1080:d=10"
        );
    }

    #[test]
    fn test_timing_filters() {
        assert_eq!(filter_trim(7.5), "trim=start=0:duration=7.500000");
        assert_eq!(
            filter_pad_start(5.0),
            "format=yuva420p,tpad=start_duration=5.000000:color=black@0"
        );
    }

    #[test]
    fn test_overlay_filter() {
        assert_eq!(filter_overlay(333, 0), "overlay=x=333:y=0:eof_action=pass");
    }
}
