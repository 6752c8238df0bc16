//! Metrics for `wolfden`.
//!
//! Prometheus-compatible counters, gauges and histograms behind the
//! `metrics` facade. Every recording helper is a no-op until a recorder is
//! installed, so the engine records unconditionally.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::WolfdenError;
use crate::game::types::{ActionKind, Alignment, Phase};

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Maximum length for labels taken from rules files (mode ids).
const MAX_LABEL_LEN: usize = 64;

/// Initializes the global metrics recorder.
///
/// With a `port`, a Prometheus HTTP listener is bound on
/// `127.0.0.1:<port>`; without one the recorder is installed with no
/// endpoint.
///
/// # Errors
///
/// Returns `WolfdenError::Io` if the recorder or listener cannot be
/// installed.
pub fn init_metrics(port: Option<u16>) -> Result<(), WolfdenError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| WolfdenError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_counter!("wolfden_games_started_total", "Games started, by mode");
    describe_counter!(
        "wolfden_games_ended_total",
        "Games ended, by mode and winning alignment"
    );
    describe_gauge!("wolfden_games_active", "Games currently registered");
    describe_counter!(
        "wolfden_submissions_total",
        "Action submissions by kind and outcome"
    );
    describe_counter!(
        "wolfden_phase_transitions_total",
        "Phases entered, by phase"
    );
    describe_histogram!(
        "wolfden_resolution_records",
        "Records produced per resolution pass"
    );
    describe_histogram!(
        "wolfden_resolution_duration_ms",
        "Time spent holding a game lock to advance it"
    );
    describe_counter!("wolfden_void_records_total", "Actions resolved as void");
    describe_counter!("wolfden_errors_total", "Errors by category");
}

/// Sanitizes a rules-file identifier for use as a label.
///
/// Truncates to [`MAX_LABEL_LEN`] characters and replaces anything outside
/// `[A-Za-z0-9_-]` with an underscore.
#[must_use]
pub fn sanitize_label(name: &str) -> String {
    name.chars()
        .take(MAX_LABEL_LEN)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Records a game start.
pub fn record_game_started(mode: &str) {
    counter!("wolfden_games_started_total", "mode" => sanitize_label(mode)).increment(1);
}

/// Records a game end.
pub fn record_game_ended(mode: &str, winner: Alignment) {
    counter!(
        "wolfden_games_ended_total",
        "mode" => sanitize_label(mode),
        "winner" => winner.to_string(),
    )
    .increment(1);
}

/// Sets the number of registered games.
#[allow(clippy::cast_precision_loss)]
pub fn set_games_active(count: usize) {
    gauge!("wolfden_games_active").set(count as f64);
}

/// Records a submission outcome.
///
/// `outcome` is `accepted`, `replaced`, `withdrawn`, or a
/// [`Rejection::label`](crate::game::action::Rejection::label).
pub fn record_submission(kind: ActionKind, outcome: &'static str) {
    counter!(
        "wolfden_submissions_total",
        "kind" => kind.as_str(),
        "outcome" => outcome,
    )
    .increment(1);
}

/// Records entry into a phase.
pub fn record_phase_transition(to: Phase) {
    counter!("wolfden_phase_transitions_total", "phase" => to.to_string()).increment(1);
}

/// Records one resolution pass.
#[allow(clippy::cast_precision_loss)]
pub fn record_resolution(records: usize, voided: usize, duration: Duration) {
    histogram!("wolfden_resolution_records").record(records as f64);
    histogram!("wolfden_resolution_duration_ms").record(duration.as_secs_f64() * 1000.0);
    if voided > 0 {
        counter!("wolfden_void_records_total").increment(voided as u64);
    }
}

/// Records an error by category.
pub fn record_error(category: &'static str) {
    counter!("wolfden_errors_total", "category" => category).increment(1);
}
