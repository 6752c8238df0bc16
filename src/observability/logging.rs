//! Logging initialization for `wolfden`.
//!
//! Engine logs go to stderr so that `simulate` can keep stdout for the
//! event log. Verbosity flags raise the level of the `wolfden` target only;
//! dependencies stay at `warn` until `-vvv`.

use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

use crate::cli::args::ColorChoice;

/// Environment variable that overrides the verbosity flags.
pub const LOG_LEVEL_ENV: &str = "WOLFDEN_LOG_LEVEL";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Compact lines with optional ANSI colors.
    #[default]
    Human,
    /// One JSON object per line, event fields flattened to the top level.
    Json,
}

/// Filter directive for a `-v` count.
#[must_use]
pub const fn verbosity_to_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "warn,wolfden=info",
        2 => "warn,wolfden=debug",
        _ => "trace",
    }
}

fn use_ansi(color: ColorChoice) -> bool {
    match color {
        ColorChoice::Auto => {
            std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
        }
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    }
}

/// Installs the global tracing subscriber.
///
/// A valid `WOLFDEN_LOG_LEVEL` wins over `verbosity`. Later calls are
/// no-ops.
pub fn init_logging(format: LogFormat, verbosity: u8, color: ColorChoice) {
    let filter = EnvFilter::try_from_env(LOG_LEVEL_ENV)
        .unwrap_or_else(|_| EnvFilter::new(verbosity_to_directive(verbosity)));
    // module paths only help once engine internals are being traced
    let show_target = verbosity >= 2;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(show_target)
        .with_writer(std::io::stderr);

    let _ = match format {
        LogFormat::Human => builder.compact().with_ansi(use_ansi(color)).try_init(),
        LogFormat::Json => builder.json().flatten_event(true).try_init(),
    };
}
