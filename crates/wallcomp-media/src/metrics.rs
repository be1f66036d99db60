//! Composition metrics.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! binary installs a recorder.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const ENGINE_DURATION_SECONDS: &str = "wallcomp_engine_duration_seconds";
    pub const FETCH_DURATION_SECONDS: &str = "wallcomp_fetch_duration_seconds";
    pub const COMPOSITIONS_TOTAL: &str = "wallcomp_compositions_total";
}

/// Record one engine invocation.
pub fn record_engine_run(duration_secs: f64, success: bool) {
    let labels = [("outcome", outcome(success).to_string())];
    histogram!(names::ENGINE_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record one remote source fetch.
pub fn record_fetch(duration_secs: f64, success: bool) {
    let labels = [("outcome", outcome(success).to_string())];
    histogram!(names::FETCH_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a finished composition request by outcome (`success`, `validation`, ...).
pub fn record_composition(outcome: &'static str) {
    counter!(names::COMPOSITIONS_TOTAL, "outcome" => outcome).increment(1);
}

fn outcome(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}
