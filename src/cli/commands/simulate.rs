//! `wolfden simulate`: a scripted game on a manual clock.
//!
//! The script is YAML:
//!
//! ```yaml
//! arena: table
//! mode: popcorn
//! seed: 11
//! players:
//!   - { id: w, name: Wolf, role: gunwolf }
//!   - { id: a, name: Ann }
//! steps:
//!   - submit: { actor: w, kind: vote_gun, target: a }
//!   - wait: 2m
//!   - advance
//!   - modkill: a
//! ```
//!
//! Either every player names a role or none does; in the latter case the
//! mode deals them from `seed`.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use crate::arena::{ArenaRegistry, MemorySink, StartRequest};
use crate::cli::args::SimulateArgs;
use crate::clock::{Clock, ManualClock};
use crate::config::Rules;
use crate::error::{EngineError, WolfdenError};
use crate::game::action::Rejection;
use crate::game::log::ActionResult;
use crate::game::machine::GameReport;
use crate::game::setup::Seat;
use crate::game::types::{ActionKind, ActorId, ArenaId};
use crate::observability::EventEmitter;

use super::load_rules;

// ============================================================================
// Script
// ============================================================================

/// A scripted game.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    /// Arena to play in.
    #[serde(default = "default_arena")]
    pub arena: String,

    /// Mode id.
    pub mode: String,

    /// RNG seed; random when absent.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Starting instant of the manual clock; now when absent.
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,

    /// Seats in order.
    pub players: Vec<ScriptPlayer>,

    /// What happens, in order. Each step is a one-key map (`submit: {..}`)
    /// or a bare word (`advance`).
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    pub steps: Vec<ScriptStep>,
}

/// One seat.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptPlayer {
    /// Actor id.
    pub id: String,

    /// Display name; the id when absent.
    #[serde(default)]
    pub name: Option<String>,

    /// Pre-assigned role.
    #[serde(default)]
    pub role: Option<String>,
}

/// One scripted step.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptStep {
    /// A player submits an action.
    Submit {
        /// Submitter.
        actor: String,
        /// Action kind.
        kind: ActionKind,
        /// Target, for kinds that take one.
        #[serde(default)]
        target: Option<String>,
    },
    /// A player takes back a pending action.
    Withdraw {
        /// Submitter.
        actor: String,
        /// Action kind.
        kind: ActionKind,
    },
    /// The admin ends the phase now.
    Advance,
    /// Time passes; expired phases end on their own.
    Wait(String),
    /// The admin removes a player.
    Modkill(String),
}

fn default_arena() -> String {
    "simulation".to_string()
}

/// A step the engine turned down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRejection {
    /// Index into [`Script::steps`].
    pub step: usize,
    /// Why.
    pub rejection: Rejection,
}

/// What a simulation produced.
#[derive(Debug)]
pub struct Outcome {
    /// The full event log.
    pub log: Vec<ActionResult>,
    /// Present when the game reached an end.
    pub report: Option<GameReport>,
    /// Submissions and withdrawals that were refused.
    pub rejections: Vec<StepRejection>,
    /// Steps left unplayed because the game ended first.
    pub skipped: usize,
}

// ============================================================================
// Command
// ============================================================================

/// Runs a script and prints its event log as JSONL.
///
/// # Errors
///
/// Rules, script, start, or engine failures; I/O writing the outputs.
pub async fn run(args: &SimulateArgs) -> Result<(), WolfdenError> {
    if let Some(port) = args.metrics_port {
        crate::observability::init_metrics(Some(port))?;
        info!(port, "Prometheus metrics endpoint started");
    }

    let rules = load_rules(args.rules.as_deref())?;
    let script = read_script(&args.script)?;
    let events = match &args.events_file {
        Some(path) => EventEmitter::from_file(path)?,
        None => EventEmitter::noop(),
    };

    let outcome = play(&script, rules, Arc::new(events)).await?;

    for record in &outcome.log {
        println!("{}", serde_json::to_string(record)?);
    }

    match (&args.report, &outcome.report) {
        (Some(path), Some(report)) => {
            std::fs::write(path, serde_json::to_string_pretty(report)?)?;
            info!(report = %path.display(), "report written");
        }
        (Some(path), None) => {
            warn!(report = %path.display(), "game did not finish; no report written");
        }
        (None, _) => {}
    }
    Ok(())
}

/// Parses a script file.
///
/// # Errors
///
/// I/O or YAML errors.
pub fn read_script(path: &Path) -> Result<Script, WolfdenError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&raw)?)
}

/// Plays `script` against `rules`.
///
/// # Errors
///
/// A game that cannot start, an unparsable `wait`, or an engine error from
/// an admin step.
pub async fn play(
    script: &Script,
    rules: Arc<Rules>,
    events: Arc<EventEmitter>,
) -> Result<Outcome, WolfdenError> {
    let clock = Arc::new(ManualClock::new(script.start.unwrap_or_else(Utc::now)));
    let sink = Arc::new(MemorySink::new());
    let registry = ArenaRegistry::new(rules)
        .with_clock(clock.clone())
        .with_stats(sink.clone())
        .with_events(events);

    let arena = ArenaId::from(script.arena.as_str());
    let seats = script
        .players
        .iter()
        .map(|p| {
            let seat = Seat::new(p.id.as_str(), p.name.as_deref().unwrap_or(&p.id));
            match &p.role {
                Some(role) => seat.with_role(role.as_str()),
                None => seat,
            }
        })
        .collect();
    let mut request = StartRequest::new(arena.clone(), script.mode.clone(), seats);
    if let Some(seed) = script.seed {
        request = request.with_seed(seed);
    }
    let handle = registry.start_game(request).await?;
    info!(%arena, game_id = %handle.game_id, seed = handle.seed, "simulation started");

    let mut rejections = Vec::new();
    let mut skipped = 0;
    for (index, step) in script.steps.iter().enumerate() {
        if !sink.is_empty() {
            skipped = script.steps.len() - index;
            info!(skipped, "game ended before the script did");
            break;
        }
        let refused = match step {
            ScriptStep::Submit {
                actor,
                kind,
                target,
            } => registry
                .submit_action(
                    &arena,
                    &ActorId::from(actor.as_str()),
                    *kind,
                    target.as_deref().map(ActorId::from),
                )
                .await
                .err(),
            ScriptStep::Withdraw { actor, kind } => registry
                .withdraw_action(&arena, &ActorId::from(actor.as_str()), *kind)
                .await
                .err(),
            ScriptStep::Advance => {
                registry.force_advance(&arena).await?;
                None
            }
            ScriptStep::Wait(span) => {
                wait(&registry, &clock, &arena, span).await?;
                None
            }
            ScriptStep::Modkill(actor) => {
                registry
                    .modkill(&arena, &ActorId::from(actor.as_str()))
                    .await?;
                None
            }
        };
        if let Some(rejection) = refused {
            warn!(step = index, %rejection, "step refused");
            rejections.push(StepRejection {
                step: index,
                rejection,
            });
        }
    }

    let report = sink.reports().pop();
    let log = match &report {
        Some(report) => report.log.clone(),
        None => registry.log_snapshot(&arena).await?,
    };
    registry.shutdown();

    Ok(Outcome {
        log,
        report,
        rejections,
        skipped,
    })
}

/// Moves the clock forward by `span`, stopping at every deadline on the way
/// so each expired phase ends at its own deadline.
async fn wait(
    registry: &ArenaRegistry,
    clock: &ManualClock,
    arena: &ArenaId,
    span: &str,
) -> Result<(), WolfdenError> {
    let span = humantime::parse_duration(span.trim())
        .map_err(|e| WolfdenError::Usage(format!("invalid wait '{span}': {e}")))?;
    let span = TimeDelta::from_std(span)
        .map_err(|e| WolfdenError::Usage(format!("wait too long: {e}")))?;
    let until = clock.now() + span;

    loop {
        let deadline = match registry.status(arena).await {
            Ok(status) => status.deadline,
            Err(EngineError::NoActiveGame(_)) => break,
            Err(e) => return Err(e.into()),
        };
        match deadline {
            Some(deadline) if deadline <= until => {
                clock.set(deadline.max(clock.now()));
                registry.sweep().await;
            }
            _ => break,
        }
    }
    clock.set(until);
    Ok(())
}
