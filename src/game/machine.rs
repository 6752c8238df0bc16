//! The game aggregate and its phase state machine.
//!
//! `Setup -> (Night <-> Day) -> Ended`. Cycle `n` holds night-`n` followed by
//! day-`n`; the counter moves when a day gives way to a night. A `Game` is
//! plain data: callers serialize access to it (the arena registry keeps it
//! behind a per-arena mutex) and pass the current time in.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{EngineError, StartError};

use super::action::{Accepted, Action, ActionQueue, Rejection, SubmissionContext, validate};
use super::catalog::RoleCatalog;
use super::log::{ActionResult, Effect, EventLog, RecordKind};
use super::mode::{GameMode, PhaseTimings};
use super::resolution::{ResolutionInput, Tally, resolve};
use super::roster::{Player, Roster};
use super::setup::{Seat, deal};
use super::types::{ActionKind, ActorId, Alignment, ArenaId, DeathCause, Phase};
use super::win::WinEvaluator;

/// Annotation on the phase-end marker of a phase that ran out its clock.
pub const DEADLINE_NOTE: &str = "deadline reached";

const PLAY_STREAM: u64 = 0x9e37_79b9_7f4a_7c15;

/// RNG for everything after dealing. Kept apart from the dealing stream so a
/// finished game can be rerun from its dealt roster.
fn play_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed ^ PLAY_STREAM)
}

/// Inputs for a new game.
#[derive(Debug, Clone)]
pub struct GameSetup {
    /// Hosting arena.
    pub arena: ArenaId,
    /// Rule snapshot.
    pub mode: Arc<GameMode>,
    /// Role definitions.
    pub catalog: Arc<RoleCatalog>,
    /// Win conditions resolved from the mode.
    pub win: WinEvaluator,
    /// Players joining.
    pub seats: Vec<Seat>,
    /// Seed for dealing, tie-breaks and present contents.
    pub seed: u64,
    /// Overrides the mode's phase lengths.
    pub timings: Option<PhaseTimings>,
}

/// Phase the game just moved into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseEntry {
    /// New phase.
    pub phase: Phase,
    /// Its cycle.
    pub cycle: u32,
    /// When it ends on its own.
    pub deadline: Option<DateTime<Utc>>,
}

/// What one state-machine step produced.
#[derive(Debug, Clone, Default)]
pub struct Step {
    /// Records appended to the log, with sequence numbers.
    pub records: Vec<ActionResult>,
    /// Set when a new playable phase began.
    pub entered: Option<PhaseEntry>,
    /// Set when this step ended the game.
    pub winner: Option<Alignment>,
}

/// Point-in-time summary for admins and transports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameStatus {
    /// Game id.
    pub game_id: Uuid,
    /// Hosting arena.
    pub arena: ArenaId,
    /// Mode id.
    pub mode: String,
    /// Current phase.
    pub phase: Phase,
    /// Current cycle.
    pub cycle: u32,
    /// Current deadline.
    pub deadline: Option<DateTime<Utc>>,
    /// Winner once ended.
    pub winner: Option<Alignment>,
    /// Seated players.
    pub players: usize,
    /// Living players in seating order.
    pub living: Vec<ActorId>,
    /// Pending actions this phase.
    pub pending: usize,
}

/// Everything the statistics side needs about a finished game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameReport {
    /// Game id.
    pub game_id: Uuid,
    /// Hosting arena.
    pub arena: ArenaId,
    /// Mode id.
    pub mode: String,
    /// RNG seed the game ran with.
    pub seed: u64,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// End time.
    pub ended_at: DateTime<Utc>,
    /// Winning alignment.
    pub winner: Alignment,
    /// Win condition that decided it.
    pub decided_by: String,
    /// Last cycle played.
    pub cycles: u32,
    /// Roster as dealt.
    pub starting_roster: Vec<Player>,
    /// Roster at the end.
    pub final_roster: Vec<Player>,
    /// Full event log.
    pub log: Vec<ActionResult>,
}

/// One game from setup to its end.
#[derive(Debug)]
pub struct Game {
    id: Uuid,
    arena: ArenaId,
    mode: Arc<GameMode>,
    catalog: Arc<RoleCatalog>,
    timings: PhaseTimings,
    roster: Roster,
    starting_roster: Vec<Player>,
    phase: Phase,
    cycle: u32,
    deadline: Option<DateTime<Utc>>,
    winner: Option<(Alignment, String)>,
    queue: ActionQueue,
    log: Arc<EventLog>,
    win: WinEvaluator,
    rng: StdRng,
    seed: u64,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    reported: bool,
}

impl Game {
    /// Deals roles and builds a game in `Setup`.
    ///
    /// # Errors
    ///
    /// Setup failures, or [`StartError::Degenerate`] if a win condition
    /// already holds for the dealt roster.
    pub fn new(setup: GameSetup) -> Result<Self, StartError> {
        let game = Self::assemble(setup)?;
        if let Some((winner, condition)) = game.win.evaluate(&game) {
            debug!(%winner, condition, "dealt roster is already decided");
            return Err(StartError::Degenerate { winner });
        }
        Ok(game)
    }

    fn assemble(mut setup: GameSetup) -> Result<Self, StartError> {
        let mut rng = StdRng::seed_from_u64(setup.seed);
        let seats = std::mem::take(&mut setup.seats);
        let players = deal(&setup.mode, seats, &setup.catalog, &mut rng)?;
        Ok(Self::seated(setup, Roster::new(players)?))
    }

    /// Builds a game in `Setup` around an already dealt roster. `setup.seats`
    /// is ignored.
    pub(crate) fn seated(setup: GameSetup, roster: Roster) -> Self {
        Self {
            id: Uuid::new_v4(),
            arena: setup.arena,
            timings: setup.timings.unwrap_or(setup.mode.timings),
            mode: setup.mode,
            catalog: setup.catalog,
            starting_roster: roster.snapshot(),
            roster,
            phase: Phase::Setup,
            cycle: 0,
            deadline: None,
            winner: None,
            queue: ActionQueue::new(),
            log: Arc::new(EventLog::new()),
            win: setup.win,
            rng: play_rng(setup.seed),
            seed: setup.seed,
            started_at: None,
            ended_at: None,
            reported: false,
        }
    }

    // ---- accessors ----

    /// Game id.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Hosting arena.
    #[must_use]
    pub const fn arena(&self) -> &ArenaId {
        &self.arena
    }

    /// Rule snapshot.
    #[must_use]
    pub fn mode(&self) -> &GameMode {
        &self.mode
    }

    /// Current roster.
    #[must_use]
    pub const fn roster(&self) -> &Roster {
        &self.roster
    }

    #[cfg(test)]
    pub(crate) fn roster_mut(&mut self) -> &mut Roster {
        &mut self.roster
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Current cycle.
    #[must_use]
    pub const fn cycle(&self) -> u32 {
        self.cycle
    }

    /// End of the current phase.
    #[must_use]
    pub const fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    /// Winner, once ended.
    #[must_use]
    pub fn winner(&self) -> Option<Alignment> {
        self.winner.as_ref().map(|(w, _)| *w)
    }

    /// Returns `true` once the game has ended.
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.phase == Phase::Ended
    }

    /// Shared handle to the log.
    #[must_use]
    pub fn log(&self) -> Arc<EventLog> {
        Arc::clone(&self.log)
    }

    /// Pending actions.
    #[must_use]
    pub const fn queue(&self) -> &ActionQueue {
        &self.queue
    }

    /// Summary of the current state.
    #[must_use]
    pub fn status(&self) -> GameStatus {
        GameStatus {
            game_id: self.id,
            arena: self.arena.clone(),
            mode: self.mode.id.clone(),
            phase: self.phase,
            cycle: self.cycle,
            deadline: self.deadline,
            winner: self.winner(),
            players: self.roster.len(),
            living: self.roster.alive().map(|p| p.id.clone()).collect(),
            pending: self.queue.len(),
        }
    }

    fn submission_context(&self) -> SubmissionContext<'_> {
        SubmissionContext {
            roster: &self.roster,
            catalog: &self.catalog,
            phase: self.phase,
            cycle: self.cycle,
            deadline: self.deadline,
        }
    }

    // ---- transitions ----

    /// Leaves `Setup` for the mode's opening phase at cycle 0.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidTransition`] if the game already started.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<Step, EngineError> {
        let opening = self.mode.opening_phase;
        if self.phase != Phase::Setup || !Phase::Setup.can_transition_to(opening) {
            return Err(EngineError::InvalidTransition {
                from: self.phase,
                to: opening,
            });
        }
        self.started_at = Some(now);

        let mut records = vec![
            ActionResult::marker(RecordKind::GameStart, 0, Phase::Setup, now).with_annotation(
                format!("{} players, mode {}", self.roster.len(), self.mode.id),
            ),
        ];
        let entry = self.enter(opening, now, &mut records);
        info!(
            arena = %self.arena,
            game_id = %self.id,
            mode = %self.mode.id,
            players = self.roster.len(),
            phase = %opening,
            "game started"
        );
        Ok(Step {
            records: self.log.extend(records),
            entered: Some(entry),
            winner: None,
        })
    }

    /// Ends the current phase: resolves pending actions, checks win
    /// conditions, and either enters the next phase or ends the game.
    ///
    /// Advancing at or past the deadline counts as the phase timing out,
    /// which some mode rules act on.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotStarted`] in `Setup`, [`EngineError::GameEnded`]
    /// once ended.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Result<Step, EngineError> {
        let timed_out = self.deadline_passed(now);
        self.advance_at(now, timed_out)
    }

    pub(crate) fn advance_at(
        &mut self,
        now: DateTime<Utc>,
        timed_out: bool,
    ) -> Result<Step, EngineError> {
        let phase = match self.phase {
            Phase::Setup => return Err(EngineError::NotStarted),
            Phase::Ended => return Err(EngineError::GameEnded),
            playable => playable,
        };
        let cycle = self.cycle;

        let mut records = Vec::new();
        if let Some(kind) = RecordKind::phase_end(phase) {
            let mut marker = ActionResult::marker(kind, cycle, phase, now);
            if timed_out {
                marker.annotate(DEADLINE_NOTE);
            }
            records.push(marker);
        }

        let pending = self.queue.take();
        let pending_count = pending.len();
        let resolution = resolve(
            pending,
            ResolutionInput {
                roster: &mut self.roster,
                catalog: &self.catalog,
                mode: &self.mode,
                rng: &mut self.rng,
                cycle,
                phase,
                now,
                timed_out,
            },
        );
        debug!(
            arena = %self.arena,
            %phase,
            cycle,
            timed_out,
            pending = pending_count,
            records = resolution.records.len(),
            "phase resolved"
        );
        records.extend(resolution.records);

        let decided = if resolution.outcome_changed {
            self.decide()
        } else {
            None
        };

        let entered = if let Some((winner, condition)) = decided {
            self.finish(winner, condition, now, &mut records);
            None
        } else {
            let next = if phase == Phase::Night {
                Phase::Day
            } else {
                self.cycle += 1;
                Phase::Night
            };
            Some(self.enter(next, now, &mut records))
        };

        Ok(Step {
            records: self.log.extend(records),
            entered,
            winner: self.winner(),
        })
    }

    /// Removes a living player on a moderator's say-so.
    ///
    /// # Errors
    ///
    /// [`EngineError::Roster`] for unknown or dead players, and the usual
    /// not-started / ended errors.
    pub fn modkill(&mut self, actor: &ActorId, now: DateTime<Utc>) -> Result<Step, EngineError> {
        match self.phase {
            Phase::Setup => return Err(EngineError::NotStarted),
            Phase::Ended => return Err(EngineError::GameEnded),
            Phase::Night | Phase::Day => {}
        }
        let effect = Effect::Died {
            actor: actor.clone(),
            cause: DeathCause::Modkill,
        };
        self.roster.apply(&effect)?;
        let dropped = self.queue.remove_actor(actor);

        let mut record = ActionResult::marker(RecordKind::Modkill, self.cycle, self.phase, now)
            .with_target(actor.clone());
        record.effects.push(effect);
        info!(arena = %self.arena, %actor, dropped, "player modkilled");

        let mut records = vec![record];
        if let Some((winner, condition)) = self.decide() {
            self.finish(winner, condition, now, &mut records);
        }
        Ok(Step {
            records: self.log.extend(records),
            entered: None,
            winner: self.winner(),
        })
    }

    fn enter(&mut self, phase: Phase, now: DateTime<Utc>, records: &mut Vec<ActionResult>) -> PhaseEntry {
        self.phase = phase;
        self.deadline = self
            .timings
            .for_phase(phase)
            .and_then(|len| TimeDelta::from_std(len).ok())
            .and_then(|len| now.checked_add_signed(len));
        if let Some(kind) = RecordKind::phase_start(phase) {
            records.push(ActionResult::marker(kind, self.cycle, phase, now));
        }
        info!(arena = %self.arena, %phase, cycle = self.cycle, deadline = ?self.deadline, "phase entered");
        PhaseEntry {
            phase,
            cycle: self.cycle,
            deadline: self.deadline,
        }
    }

    fn decide(&self) -> Option<(Alignment, String)> {
        self.win
            .evaluate(self)
            .map(|(winner, condition)| (winner, condition.to_owned()))
    }

    fn finish(
        &mut self,
        winner: Alignment,
        condition: String,
        now: DateTime<Utc>,
        records: &mut Vec<ActionResult>,
    ) {
        let dropped = self.queue.take();
        if !dropped.is_empty() {
            debug!(count = dropped.len(), "discarding pending actions at game end");
        }
        records.push(
            ActionResult::marker(RecordKind::GameEnd, self.cycle, Phase::Ended, now)
                .with_annotation(format!("{winner} win ({condition})")),
        );
        self.phase = Phase::Ended;
        self.deadline = None;
        self.ended_at = Some(now);
        info!(arena = %self.arena, game_id = %self.id, %winner, condition = %condition, "game ended");
        self.winner = Some((winner, condition));
    }

    // ---- submissions ----

    /// Validates and queues an action.
    ///
    /// # Errors
    ///
    /// The first [`Rejection`] that applies.
    pub fn submit(
        &mut self,
        actor: ActorId,
        kind: ActionKind,
        target: Option<ActorId>,
        now: DateTime<Utc>,
    ) -> Result<Accepted, Rejection> {
        validate(&self.submission_context(), &actor, kind, target.as_ref(), now)?;
        debug!(arena = %self.arena, %actor, %kind, target = ?target, "action accepted");
        Ok(self.queue.submit(Action {
            actor,
            kind,
            target,
            submitted_at: now,
            cycle: self.cycle,
            phase: self.phase,
        }))
    }

    /// Queues a logged submission again without validating it.
    pub(crate) fn requeue(&mut self, action: Action) {
        let _ = self.queue.submit(action);
    }

    /// Withdraws a pending action for the current cycle.
    ///
    /// # Errors
    ///
    /// [`Rejection::GameEnded`], [`Rejection::UnknownActor`], or
    /// [`Rejection::NothingToWithdraw`].
    pub fn withdraw(&mut self, actor: &ActorId, kind: ActionKind) -> Result<Action, Rejection> {
        if self.is_ended() {
            return Err(Rejection::GameEnded);
        }
        if self.roster.by_id(actor).is_none() {
            return Err(Rejection::UnknownActor(actor.clone()));
        }
        self.queue.withdraw(actor, kind, self.cycle)
    }

    /// Whether the mode's early-end options say the phase is over.
    #[must_use]
    pub fn early_end_due(&self) -> bool {
        if !self.phase.is_playable() || self.queue.is_empty() {
            return false;
        }
        let early = self.mode.early_end;
        if early.all_submitted && self.queue.all_submitted(&self.submission_context()) {
            return true;
        }
        early.majority_lynch
            && self.phase == Phase::Day
            && Tally::count(
                self.queue.of_kind(ActionKind::VoteLynch),
                ActionKind::VoteLynch,
                &self.roster,
                &self.catalog,
                self.phase,
            )
            .majority_holder()
            .is_some()
    }

    /// Whether the deadline of a playable phase has passed.
    #[must_use]
    pub fn deadline_passed(&self, now: DateTime<Utc>) -> bool {
        self.phase.is_playable() && self.deadline.is_some_and(|d| now >= d)
    }

    /// Builds the statistics report. Returns `Some` exactly once, after the
    /// game has ended.
    pub fn take_report(&mut self) -> Option<GameReport> {
        if self.reported || !self.is_ended() {
            return None;
        }
        let (winner, decided_by) = self.winner.clone()?;
        let ended_at = self.ended_at?;
        self.reported = true;
        Some(GameReport {
            game_id: self.id,
            arena: self.arena.clone(),
            mode: self.mode.id.clone(),
            seed: self.seed,
            started_at: self.started_at.unwrap_or(ended_at),
            ended_at,
            winner,
            decided_by,
            cycles: self.cycle,
            starting_roster: self.starting_roster.clone(),
            final_roster: self.roster.snapshot(),
            log: self.log.snapshot(),
        })
    }
}
