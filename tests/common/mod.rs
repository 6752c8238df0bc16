//! Shared integration-test harness: running the `wolfden` binary, fixture
//! paths, and registries on controllable clocks.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::Output;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use wolfden::arena::{ArenaRegistry, MemorySink, StartRequest};
use wolfden::clock::Clock;
use wolfden::config::Rules;
use wolfden::game::Seat;

/// Fixed instant all manual-clock tests start from.
pub const EPOCH_SECS: i64 = 1_700_000_000;

/// Helpers for running the compiled binary.
pub struct WolfdenProcess;

impl WolfdenProcess {
    /// Runs `wolfden` with `args` to completion.
    #[allow(clippy::missing_panics_doc)]
    pub fn spawn_command(args: &[&str]) -> Output {
        std::process::Command::new(env!("CARGO_BIN_EXE_wolfden"))
            .args(args)
            .env_remove("WOLFDEN_LOG_LEVEL")
            .env_remove("WOLFDEN_RULES")
            .output()
            .expect("failed to run wolfden")
    }

    /// Returns the path to a test fixture.
    #[must_use]
    pub fn fixture_path(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }
}

/// `EPOCH_SECS + secs` as a timestamp.
#[must_use]
pub fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(EPOCH_SECS + secs, 0).expect("timestamp in range")
}

/// Seats with pre-assigned roles, `(id, role)`.
#[must_use]
pub fn seats(spec: &[(&str, &str)]) -> Vec<Seat> {
    spec.iter()
        .map(|(id, role)| Seat::new(*id, id.to_uppercase()).with_role(*role))
        .collect()
}

/// Four seats: one wolf, two villagers, one cop.
#[must_use]
pub fn small_table() -> Vec<Seat> {
    seats(&[("w", "wolf"), ("a", "vanilla"), ("b", "vanilla"), ("c", "cop")])
}

/// A registry over the built-in rules with the given clock and an
/// in-memory stats sink.
#[allow(clippy::missing_panics_doc)]
pub fn registry(clock: Arc<dyn Clock>) -> (ArenaRegistry, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let registry = ArenaRegistry::new(Arc::new(Rules::builtin().expect("built-in rules")))
        .with_clock(clock)
        .with_stats(sink.clone());
    (registry, sink)
}

/// A `lite` start request on the small table.
#[must_use]
pub fn lite_request(arena: &str) -> StartRequest {
    StartRequest::new(arena, "lite", small_table()).with_seed(7)
}
