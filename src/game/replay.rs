//! Rebuilding a finished game from its report.
//!
//! [`replay`] re-applies the effects stored on each record to the starting
//! roster without consulting any rules. [`verify`] goes further and reruns
//! the game: the logged submissions are fed back to a fresh [`Game`] phase
//! by phase, and every record it produces must equal the logged one.

use std::sync::Arc;

use crate::error::{ReplayError, RosterError};

use super::action::Action;
use super::catalog::RoleCatalog;
use super::log::{ActionResult, RecordKind};
use super::machine::{DEADLINE_NOTE, Game, GameReport, GameSetup};
use super::mode::GameMode;
use super::roster::{Player, Roster};
use super::types::Phase;
use super::win::WinEvaluator;

/// The rules a report is rerun under.
#[derive(Debug, Clone)]
pub struct ReplayRules {
    /// Mode the game was played in.
    pub mode: Arc<GameMode>,
    /// Role definitions.
    pub catalog: Arc<RoleCatalog>,
    /// Win conditions resolved from the mode.
    pub win: WinEvaluator,
}

/// State reconstructed from a log.
#[derive(Debug, Clone)]
pub struct ReplayState {
    /// Roster after the last record.
    pub roster: Roster,
    /// Phase of the last phase marker.
    pub phase: Phase,
    /// Cycle of the last record.
    pub cycle: u32,
    /// Records applied.
    pub records: usize,
}

/// Applies every record of `report` to its starting roster.
///
/// # Errors
///
/// [`ReplayError::OutOfOrder`] for non-increasing sequence numbers and
/// [`ReplayError::Effect`] for an effect the roster refuses.
pub fn replay(report: &GameReport) -> Result<ReplayState, ReplayError> {
    let mut roster = Roster::new(report.starting_roster.clone()).map_err(|e| {
        ReplayError::Mismatch(format!("starting roster is invalid: {e}"))
    })?;
    let mut phase = Phase::Setup;
    let mut cycle = 0;
    let mut previous: Option<u64> = None;

    for record in &report.log {
        if let Some(prev) = previous
            && record.sequence <= prev
        {
            return Err(ReplayError::OutOfOrder {
                previous: prev,
                next: record.sequence,
            });
        }
        previous = Some(record.sequence);

        for effect in &record.effects {
            roster.apply(effect).map_err(|source: RosterError| ReplayError::Effect {
                sequence: record.sequence,
                source,
            })?;
        }

        match record.kind {
            RecordKind::NightStart => phase = Phase::Night,
            RecordKind::DayStart => phase = Phase::Day,
            RecordKind::GameEnd => phase = Phase::Ended,
            _ => {}
        }
        cycle = record.cycle;
    }

    Ok(ReplayState {
        roster,
        phase,
        cycle,
        records: report.log.len(),
    })
}

/// Replays `report`, checks the result against its final roster, then
/// reruns the game under `rules`.
///
/// # Errors
///
/// Any replay failure, or [`ReplayError::Mismatch`] naming the first
/// player whose reconstructed state differs or the first record the rules
/// would not have produced.
pub fn verify(report: &GameReport, rules: &ReplayRules) -> Result<ReplayState, ReplayError> {
    let state = replay(report)?;
    let rebuilt = state.roster.snapshot();
    if rebuilt.len() != report.final_roster.len() {
        return Err(ReplayError::Mismatch(format!(
            "{} players replayed, {} reported",
            rebuilt.len(),
            report.final_roster.len()
        )));
    }
    if let Some((ours, theirs)) = rebuilt
        .iter()
        .zip(&report.final_roster)
        .find(|(ours, theirs)| ours != theirs)
    {
        return Err(ReplayError::Mismatch(describe(ours, theirs)));
    }
    if state.phase != Phase::Ended {
        return Err(ReplayError::Mismatch(format!(
            "log ends in {} without a game end record",
            state.phase
        )));
    }
    rerun(report, rules)?;
    Ok(state)
}

/// Plays the game again from its dealt roster and compares each step's
/// records with the log.
///
/// # Errors
///
/// [`ReplayError::Mismatch`] at the first divergence.
pub fn rerun(report: &GameReport, rules: &ReplayRules) -> Result<(), ReplayError> {
    if rules.mode.id != report.mode {
        return Err(ReplayError::Mismatch(format!(
            "report was played in mode {}, rules given for {}",
            report.mode, rules.mode.id
        )));
    }
    let roster = Roster::new(report.starting_roster.clone())
        .map_err(|e| ReplayError::Mismatch(format!("starting roster is invalid: {e}")))?;
    let mut game = Game::seated(
        GameSetup {
            arena: report.arena.clone(),
            mode: Arc::clone(&rules.mode),
            catalog: Arc::clone(&rules.catalog),
            win: rules.win.clone(),
            seats: Vec::new(),
            seed: report.seed,
            timings: None,
        },
        roster,
    );

    let log = &report.log;
    let mut cursor = 0;
    while let Some(record) = log.get(cursor) {
        let at = record.happened_at;
        let step = match record.kind {
            RecordKind::GameStart => game.start(at),
            RecordKind::Modkill => {
                let Some(target) = &record.target else {
                    return Err(ReplayError::Mismatch(format!(
                        "record {}: modkill without a target",
                        record.sequence
                    )));
                };
                game.modkill(target, at)
            }
            RecordKind::NightEnd | RecordKind::DayEnd => {
                for action in submissions(&log[cursor + 1..]) {
                    game.requeue(action);
                }
                let timed_out = record.annotation.as_deref() == Some(DEADLINE_NOTE);
                game.advance_at(at, timed_out)
            }
            other => {
                return Err(ReplayError::Mismatch(format!(
                    "record {}: {other:?} does not start a step",
                    record.sequence
                )));
            }
        }
        .map_err(|e| ReplayError::Mismatch(format!("record {}: {e}", record.sequence)))?;

        compare(&step.records, &log[cursor..])?;
        cursor += step.records.len();
    }

    if !game.is_ended() {
        return Err(ReplayError::Mismatch(
            "rerun stops before the game ends".to_owned(),
        ));
    }
    Ok(())
}

/// Player submissions logged in the block that follows a phase-end marker.
fn submissions(block: &[ActionResult]) -> impl Iterator<Item = Action> + '_ {
    block
        .iter()
        .take_while(|r| !r.kind.is_marker())
        .filter(|r| !r.automatic)
        .filter_map(|r| {
            Some(Action {
                actor: r.actor.clone()?,
                kind: r.kind.action_kind()?,
                target: r.target.clone(),
                submitted_at: r.submitted_at,
                cycle: r.cycle,
                phase: r.phase,
            })
        })
}

fn compare(produced: &[ActionResult], logged: &[ActionResult]) -> Result<(), ReplayError> {
    for (index, ours) in produced.iter().enumerate() {
        match logged.get(index) {
            None => {
                return Err(ReplayError::Mismatch(format!(
                    "rules produce {} after the log ends",
                    summarize(ours)
                )));
            }
            Some(theirs) if theirs != ours => {
                return Err(ReplayError::Mismatch(format!(
                    "record {}: log has {}, rules produce {}",
                    theirs.sequence,
                    summarize(theirs),
                    summarize(ours)
                )));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn summarize(record: &ActionResult) -> String {
    let mut out = format!("{:?}", record.kind);
    if let Some(actor) = &record.actor {
        out.push_str(&format!(" by {actor}"));
    }
    if let Some(target) = &record.target {
        out.push_str(&format!(" on {target}"));
    }
    if record.void {
        out.push_str(" (void)");
    }
    if let Some(note) = &record.annotation {
        out.push_str(&format!(" [{note}]"));
    }
    out.push_str(&format!(" with {} effects", record.effects.len()));
    out
}

fn describe(ours: &Player, theirs: &Player) -> String {
    if ours.id != theirs.id {
        return format!("seat order differs at {} / {}", ours.id, theirs.id);
    }
    let mut diffs = Vec::new();
    if ours.alive != theirs.alive {
        diffs.push(format!("alive {} vs {}", ours.alive, theirs.alive));
    }
    if ours.role != theirs.role {
        diffs.push(format!("role {} vs {}", ours.role, theirs.role));
    }
    if ours.alignment != theirs.alignment {
        diffs.push(format!("alignment {} vs {}", ours.alignment, theirs.alignment));
    }
    if ours.items != theirs.items {
        diffs.push(format!("items {:?} vs {:?}", ours.items, theirs.items));
    }
    if ours.death != theirs.death {
        diffs.push(format!("death {:?} vs {:?}", ours.death, theirs.death));
    }
    format!("{}: {}", ours.id, diffs.join(", "))
}
