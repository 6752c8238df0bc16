//! Arena registry: one live game per arena, serialized per game.
//!
//! Arenas live in a sharded `DashMap`; each holds its game behind a tokio
//! mutex so submissions, timer advances and admin commands on one game never
//! interleave while different games proceed in parallel. A single background
//! task sweeps the map for expired deadlines.
//!
//! A finished game stays in its arena as a tombstone: late submissions see
//! `GameEnded`, and a report the statistics sink refused can still be
//! fetched. The next `start_game` in the arena replaces it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::{Mutex, MutexGuard, broadcast};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::{Clock, TokioClock};
use crate::config::Rules;
use crate::error::{ConfigError, EngineError, StartError};
use crate::game::action::{Accepted, Action, Rejection};
use crate::game::log::ActionResult;
use crate::game::machine::{Game, GameReport, GameSetup, GameStatus, PhaseEntry, Step};
use crate::game::mode::PhaseTimings;
use crate::game::roster::Player;
use crate::game::setup::Seat;
use crate::game::types::{ActionKind, ActorId, ArenaId, Phase};
use crate::game::win::WinConditionRegistry;
use crate::observability::events::{Event, EventEmitter};
use crate::observability::metrics;

use super::notify::Notification;
use super::stats::{NullSink, StatsSink};

/// Default sweep interval for the timer task.
pub const DEFAULT_TICK: Duration = Duration::from_millis(250);

/// Default notification channel capacity.
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 256;

/// Registry tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryOptions {
    /// How often the timer task looks for expired deadlines.
    pub tick: Duration,
    /// Messages buffered per notification subscriber.
    pub notification_capacity: usize,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
        }
    }
}

/// Request to open a game in an arena.
#[derive(Debug, Clone)]
pub struct StartRequest {
    /// Target arena.
    pub arena: ArenaId,
    /// Mode id from the loaded rules.
    pub mode: String,
    /// Players joining.
    pub seats: Vec<Seat>,
    /// RNG seed; random when absent.
    pub seed: Option<u64>,
    /// Overrides the mode's phase lengths.
    pub timings: Option<PhaseTimings>,
}

impl StartRequest {
    /// A request with a random seed and the mode's own timings.
    #[must_use]
    pub fn new(arena: impl Into<ArenaId>, mode: impl Into<String>, seats: Vec<Seat>) -> Self {
        Self {
            arena: arena.into(),
            mode: mode.into(),
            seats,
            seed: None,
            timings: None,
        }
    }

    /// Fixes the RNG seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Overrides phase lengths.
    #[must_use]
    pub const fn with_timings(mut self, timings: PhaseTimings) -> Self {
        self.timings = Some(timings);
        self
    }
}

/// What the caller learns about a freshly started game.
#[derive(Debug, Clone)]
pub struct GameHandle {
    /// Game id.
    pub game_id: Uuid,
    /// Hosting arena.
    pub arena: ArenaId,
    /// Seed the game runs with.
    pub seed: u64,
    /// Dealt roster. Contains roles; not for public display.
    pub roster: Vec<Player>,
    /// Opening phase.
    pub entered: Option<PhaseEntry>,
}

#[derive(Debug)]
struct ArenaSlot {
    game: Mutex<Game>,
    ended: AtomicBool,
    undelivered: std::sync::Mutex<Option<GameReport>>,
}

impl ArenaSlot {
    fn new(game: Game) -> Arc<Self> {
        Arc::new(Self {
            game: Mutex::new(game),
            ended: AtomicBool::new(false),
            undelivered: std::sync::Mutex::new(None),
        })
    }

    fn is_live(&self) -> bool {
        !self.ended.load(Ordering::Acquire)
    }

    fn undelivered(&self) -> std::sync::MutexGuard<'_, Option<GameReport>> {
        self.undelivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owns every live game.
#[derive(Debug)]
pub struct ArenaRegistry {
    arenas: DashMap<ArenaId, Arc<ArenaSlot>>,
    rules: Arc<Rules>,
    conditions: WinConditionRegistry,
    clock: Arc<dyn Clock>,
    notifications: broadcast::Sender<Notification>,
    stats: Arc<dyn StatsSink>,
    events: Arc<EventEmitter>,
    cancel: CancellationToken,
    options: RegistryOptions,
}

impl ArenaRegistry {
    /// A registry over `rules` with default collaborators.
    #[must_use]
    pub fn new(rules: Arc<Rules>) -> Self {
        Self::with_options(rules, RegistryOptions::default())
    }

    /// A registry with explicit tuning.
    #[must_use]
    pub fn with_options(rules: Arc<Rules>, options: RegistryOptions) -> Self {
        let (notifications, _) = broadcast::channel(options.notification_capacity.max(1));
        Self {
            arenas: DashMap::new(),
            rules,
            conditions: WinConditionRegistry::default(),
            clock: Arc::new(TokioClock::new()),
            notifications,
            stats: Arc::new(NullSink),
            events: Arc::new(EventEmitter::noop()),
            cancel: CancellationToken::new(),
            options,
        }
    }

    /// Replaces the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the statistics sink.
    #[must_use]
    pub fn with_stats(mut self, stats: Arc<dyn StatsSink>) -> Self {
        self.stats = stats;
        self
    }

    /// Replaces the engine event emitter.
    #[must_use]
    pub fn with_events(mut self, events: Arc<EventEmitter>) -> Self {
        self.events = events;
        self
    }

    /// Replaces the win-condition registry.
    #[must_use]
    pub fn with_conditions(mut self, conditions: WinConditionRegistry) -> Self {
        self.conditions = conditions;
        self
    }

    /// Loaded rules.
    #[must_use]
    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    /// Subscribes to notifications from every arena.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// Arenas whose game is still running.
    #[must_use]
    pub fn active_arenas(&self) -> Vec<ArenaId> {
        let mut arenas: Vec<ArenaId> = self
            .arenas
            .iter()
            .filter(|e| e.value().is_live())
            .map(|e| e.key().clone())
            .collect();
        arenas.sort();
        arenas
    }

    fn live_games(&self) -> usize {
        self.arenas.iter().filter(|e| e.value().is_live()).count()
    }

    /// Copy of the report the statistics sink refused for the arena's
    /// finished game, if it refused one.
    #[must_use]
    pub fn undelivered_report(&self, arena: &ArenaId) -> Option<GameReport> {
        self.slot(arena)?.undelivered().clone()
    }

    /// Offers a refused report to the statistics sink again. Returns
    /// `Ok(false)` when nothing was waiting.
    ///
    /// # Errors
    ///
    /// The sink's error; the report stays on the arena.
    pub async fn redeliver(&self, arena: &ArenaId) -> std::io::Result<bool> {
        let Some(slot) = self.slot(arena) else {
            return Ok(false);
        };
        let Some(report) = slot.undelivered().take() else {
            return Ok(false);
        };
        let game_id = report.game_id;
        match self.stats.record(report.clone()).await {
            Ok(()) => {
                info!(%arena, %game_id, "undelivered report recorded");
                Ok(true)
            }
            Err(e) => {
                metrics::record_error("stats_sink");
                *slot.undelivered() = Some(report);
                Err(e)
            }
        }
    }

    fn slot(&self, arena: &ArenaId) -> Option<Arc<ArenaSlot>> {
        self.arenas.get(arena).map(|e| Arc::clone(e.value()))
    }

    // ========================================================================
    // Inbound operations
    // ========================================================================

    /// Deals roles and opens a game in `request.arena`.
    ///
    /// An arena whose previous game has ended is reused.
    ///
    /// # Errors
    ///
    /// [`StartError::ArenaBusy`] while a live game owns the arena; mode,
    /// setup and degenerate-roster errors otherwise.
    pub async fn start_game(&self, request: StartRequest) -> Result<GameHandle, StartError> {
        if self.cancel.is_cancelled() {
            return Err(StartError::ShuttingDown);
        }
        let mode = self.rules.mode(&request.mode)?;
        let win = self.conditions.evaluator(&mode.win_conditions)?;
        let seed = request.seed.unwrap_or_else(rand::random);
        let mut game = Game::new(GameSetup {
            arena: request.arena.clone(),
            mode,
            catalog: self.rules.catalog(),
            win,
            seats: request.seats,
            seed,
            timings: request.timings,
        })?;

        let step = Self::open(&mut game, self.clock.now())?;
        let slot = ArenaSlot::new(game);
        // the slot is not shared yet, and holding its lock until the start
        // is published keeps every later step behind it
        let Ok(game) = slot.game.try_lock() else {
            return Err(StartError::ArenaBusy(request.arena));
        };

        let replaced = match self.arenas.entry(request.arena.clone()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_live() {
                    return Err(StartError::ArenaBusy(request.arena));
                }
                occupied.insert(Arc::clone(&slot)).undelivered().take()
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::clone(&slot));
                None
            }
        };
        if let Some(report) = replaced {
            metrics::record_error("stats_sink");
            warn!(
                arena = %request.arena,
                game_id = %report.game_id,
                "previous game's report was never recorded and is dropped"
            );
        }
        metrics::set_games_active(self.live_games());

        let status = game.status();
        metrics::record_game_started(&status.mode);
        self.events.emit(Event::GameStarted {
            timestamp: self.clock.now(),
            arena: request.arena.clone(),
            game_id: status.game_id,
            mode: status.mode.clone(),
            players: status.players,
            seed,
        });
        self.publish(&request.arena, &game, &step);

        Ok(GameHandle {
            game_id: status.game_id,
            arena: request.arena,
            seed,
            roster: game.roster().snapshot(),
            entered: step.entered,
        })
    }

    fn open(game: &mut Game, now: DateTime<Utc>) -> Result<Step, StartError> {
        game.start(now).map_err(|e| {
            StartError::Config(ConfigError::InvalidValue {
                field: "opening_phase".to_owned(),
                value: game.mode().opening_phase.to_string(),
                expected: e.to_string(),
            })
        })
    }

    /// Submits an action. Ends the phase early when the mode says so.
    ///
    /// # Errors
    ///
    /// The [`Rejection`] explaining why the action was refused.
    pub async fn submit_action(
        &self,
        arena: &ArenaId,
        actor: &ActorId,
        kind: ActionKind,
        target: Option<ActorId>,
    ) -> Result<Accepted, Rejection> {
        let Some(slot) = self.slot(arena) else {
            metrics::record_submission(kind, Rejection::NoActiveGame.label());
            return Err(Rejection::NoActiveGame);
        };
        let mut game = slot.game.lock().await;
        let now = self.clock.now();

        let accepted = match game.submit(actor.clone(), kind, target, now) {
            Ok(accepted) => accepted,
            Err(rejection) => {
                metrics::record_submission(kind, rejection.label());
                self.events.emit(Event::SubmissionRejected {
                    timestamp: now,
                    arena: arena.clone(),
                    actor: actor.clone(),
                    kind,
                    reason: rejection.label(),
                });
                debug!(%arena, %actor, %kind, reason = %rejection, "submission rejected");
                return Err(rejection);
            }
        };
        metrics::record_submission(
            kind,
            if accepted.replaced { "replaced" } else { "accepted" },
        );

        if game.early_end_due() {
            info!(%arena, phase = %game.phase(), "phase ending early");
            let advanced = self.advance_locked(arena, &mut game, now);
            match advanced {
                Ok(Some(report)) => self.hand_off(arena, &slot, game, report).await,
                Ok(None) => {}
                Err(e) => warn!(%arena, error = %e, "early phase end failed"),
            }
        }
        Ok(accepted)
    }

    /// Withdraws a pending action.
    ///
    /// # Errors
    ///
    /// [`Rejection::NoActiveGame`], [`Rejection::NothingToWithdraw`], and
    /// the terminal / unknown-actor rejections.
    pub async fn withdraw_action(
        &self,
        arena: &ArenaId,
        actor: &ActorId,
        kind: ActionKind,
    ) -> Result<Action, Rejection> {
        let slot = self.slot(arena).ok_or(Rejection::NoActiveGame)?;
        let mut game = slot.game.lock().await;
        let withdrawn = game.withdraw(actor, kind)?;
        metrics::record_submission(kind, "withdrawn");
        Ok(withdrawn)
    }

    /// Ends the current phase now.
    ///
    /// # Errors
    ///
    /// [`EngineError::NoActiveGame`] or the state machine's own errors.
    pub async fn force_advance(&self, arena: &ArenaId) -> Result<Step, EngineError> {
        let slot = self
            .slot(arena)
            .ok_or_else(|| EngineError::NoActiveGame(arena.clone()))?;
        let mut game = slot.game.lock().await;
        let now = self.clock.now();
        info!(%arena, phase = %game.phase(), cycle = game.cycle(), "forced advance");

        let phase = game.phase();
        let cycle = game.cycle();
        let step = Self::timed_advance(&mut game, now)?;
        self.after_resolution(arena, &game, &step, phase, cycle);
        if let Some(report) = game.take_report() {
            self.hand_off(arena, &slot, game, report).await;
        }
        Ok(step)
    }

    /// Removes a living player from the game.
    ///
    /// # Errors
    ///
    /// [`EngineError::NoActiveGame`], [`EngineError::Roster`] for unknown or
    /// dead players, and the terminal-state errors.
    pub async fn modkill(&self, arena: &ArenaId, actor: &ActorId) -> Result<Step, EngineError> {
        let slot = self
            .slot(arena)
            .ok_or_else(|| EngineError::NoActiveGame(arena.clone()))?;
        let mut game = slot.game.lock().await;
        let step = game.modkill(actor, self.clock.now())?;
        self.publish(arena, &game, &step);
        if let Some(report) = game.take_report() {
            self.hand_off(arena, &slot, game, report).await;
        }
        Ok(step)
    }

    /// Current state of the arena's game. A finished game reports `Ended`
    /// until the arena is reused.
    ///
    /// # Errors
    ///
    /// [`EngineError::NoActiveGame`] when nothing is registered.
    pub async fn status(&self, arena: &ArenaId) -> Result<GameStatus, EngineError> {
        let slot = self
            .slot(arena)
            .ok_or_else(|| EngineError::NoActiveGame(arena.clone()))?;
        let game = slot.game.lock().await;
        Ok(game.status())
    }

    /// Copy of the arena's event log.
    ///
    /// # Errors
    ///
    /// [`EngineError::NoActiveGame`] when nothing is registered.
    pub async fn log_snapshot(&self, arena: &ArenaId) -> Result<Vec<ActionResult>, EngineError> {
        let slot = self
            .slot(arena)
            .ok_or_else(|| EngineError::NoActiveGame(arena.clone()))?;
        let log = slot.game.lock().await.log();
        Ok(log.snapshot())
    }

    // ========================================================================
    // Timer
    // ========================================================================

    /// Spawns the deadline sweeper. It stops on [`shutdown`](Self::shutdown).
    pub fn start_timer_task(self: &Arc<Self>) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(registry.options.tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = registry.cancel.cancelled() => {
                        debug!("timer task cancelled");
                        break;
                    }
                    _ = interval.tick() => {
                        registry.sweep().await;
                    }
                }
            }
        })
    }

    /// Advances every game whose deadline has passed. Returns how many
    /// phases were ended.
    pub async fn sweep(&self) -> usize {
        let slots: Vec<(ArenaId, Arc<ArenaSlot>)> = self
            .arenas
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();

        let mut advanced = 0;
        for (arena, slot) in slots {
            if !slot.is_live() {
                continue;
            }
            let mut game = slot.game.lock().await;
            // the deadline may have moved while we waited for the lock
            let now = self.clock.now();
            if !game.deadline_passed(now) {
                continue;
            }
            let result = self.advance_locked(&arena, &mut game, now);
            match result {
                Ok(report) => {
                    advanced += 1;
                    if let Some(report) = report {
                        self.hand_off(&arena, &slot, game, report).await;
                    }
                }
                Err(e) => {
                    metrics::record_error("timer_advance");
                    warn!(%arena, error = %e, "deadline advance failed");
                }
            }
        }
        advanced
    }

    /// Stops the timer task and refuses new games.
    pub fn shutdown(&self) {
        info!(arenas = self.live_games(), "arena registry shutting down");
        self.cancel.cancel();
    }

    /// Returns `true` after [`shutdown`](Self::shutdown).
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn timed_advance(game: &mut Game, now: DateTime<Utc>) -> Result<Step, EngineError> {
        let started = Instant::now();
        let step = game.advance(now)?;
        let voided = step.records.iter().filter(|r| r.void).count();
        metrics::record_resolution(step.records.len(), voided, started.elapsed());
        Ok(step)
    }

    fn advance_locked(
        &self,
        arena: &ArenaId,
        game: &mut Game,
        now: DateTime<Utc>,
    ) -> Result<Option<GameReport>, EngineError> {
        let phase = game.phase();
        let cycle = game.cycle();
        let step = Self::timed_advance(game, now)?;
        self.after_resolution(arena, game, &step, phase, cycle);
        Ok(game.take_report())
    }

    fn after_resolution(
        &self,
        arena: &ArenaId,
        game: &Game,
        step: &Step,
        phase: Phase,
        cycle: u32,
    ) {
        self.events.emit(Event::ResolutionCompleted {
            timestamp: self.clock.now(),
            arena: arena.clone(),
            phase,
            cycle,
            records: step.records.len(),
            voided: step.records.iter().filter(|r| r.void).count(),
        });
        self.publish(arena, game, step);
    }

    fn publish(&self, arena: &ArenaId, game: &Game, step: &Step) {
        // send only fails when nobody is subscribed
        for record in &step.records {
            let _ = self.notifications.send(Notification::Narrative {
                arena: arena.clone(),
                record: record.clone(),
            });
        }
        if let Some(entry) = step.entered {
            metrics::record_phase_transition(entry.phase);
            self.events.emit(Event::PhaseEntered {
                timestamp: self.clock.now(),
                arena: arena.clone(),
                phase: entry.phase,
                cycle: entry.cycle,
                deadline: entry.deadline,
            });
            let _ = self.notifications.send(Notification::PhaseChanged {
                arena: arena.clone(),
                phase: entry.phase,
                cycle: entry.cycle,
                deadline: entry.deadline,
            });
        }
        if let Some(winner) = step.winner {
            metrics::record_game_ended(&game.mode().id, winner);
            self.events.emit(Event::GameEnded {
                timestamp: self.clock.now(),
                arena: arena.clone(),
                game_id: game.id(),
                winner,
                cycles: game.cycle(),
            });
            let _ = self.notifications.send(Notification::GameEnded {
                arena: arena.clone(),
                game_id: game.id(),
                winner,
            });
        }
    }

    /// Marks the slot ended while its game is still locked, then delivers
    /// the report. A refused report is kept on the slot.
    async fn hand_off(
        &self,
        arena: &ArenaId,
        slot: &ArenaSlot,
        game: MutexGuard<'_, Game>,
        report: GameReport,
    ) {
        slot.ended.store(true, Ordering::Release);
        drop(game);
        metrics::set_games_active(self.live_games());

        let game_id = report.game_id;
        match self.stats.record(report.clone()).await {
            Ok(()) => debug!(%arena, %game_id, "report recorded, arena released"),
            Err(e) => {
                metrics::record_error("stats_sink");
                warn!(%arena, %game_id, error = %e, "failed to record game report, keeping it");
                *slot.undelivered() = Some(report);
            }
        }
    }
}
