//! Resolution engine.
//!
//! Turns the pending actions of a phase into ordered log records and
//! roster mutations. Kinds resolve in the mode's configured order; within a
//! kind, actions go by submission time and then actor id. Every roster
//! change goes through [`Effect`] so the log replays to the same roster.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use crate::error::RosterError;

use super::action::Action;
use super::catalog::{Capability, RoleCatalog};
use super::log::{ActionResult, Effect, RecordKind};
use super::mode::{GameMode, GunDistribution, GunRules, Threshold, TieBreak, VotePolicy};
use super::roster::Roster;
use super::types::{ActionKind, ActorId, Alignment, DeathCause, ItemKind, Phase};

/// Annotation on actions the engine took for an idle player.
pub const DEFAULTED_NOTE: &str = "nothing submitted; target picked at random";

/// Everything a resolution pass reads or mutates.
#[derive(Debug)]
pub struct ResolutionInput<'a> {
    /// Roster to mutate.
    pub roster: &'a mut Roster,
    /// Role definitions.
    pub catalog: &'a RoleCatalog,
    /// Mode rules.
    pub mode: &'a GameMode,
    /// The game's seeded RNG.
    pub rng: &'a mut StdRng,
    /// Cycle being resolved.
    pub cycle: u32,
    /// Phase being resolved.
    pub phase: Phase,
    /// Resolution instant.
    pub now: DateTime<Utc>,
    /// The phase ran until its deadline.
    pub timed_out: bool,
}

/// Output of one pass.
#[derive(Debug, Default)]
pub struct Resolution {
    /// Records in the order they took effect.
    pub records: Vec<ActionResult>,
    /// Whether anyone died or changed alignment.
    pub outcome_changed: bool,
}

/// Resolves `pending` against the roster.
///
/// Besides the submitted actions, the mode may have the engine act on its
/// own: default actions for idle role holders, arming a gun bearer at the
/// end of a night, and removing a bearer who let the day run out. Without
/// any of those, an empty pending set produces no records and leaves the
/// roster alone.
#[must_use]
pub fn resolve(pending: Vec<Action>, input: ResolutionInput<'_>) -> Resolution {
    let shooters: BTreeSet<ActorId> = pending
        .iter()
        .filter(|a| a.kind == ActionKind::Shoot)
        .map(|a| a.actor.clone())
        .collect();
    let mut by_kind: BTreeMap<ActionKind, Vec<Action>> = BTreeMap::new();
    for action in pending {
        by_kind.entry(action.kind).or_default().push(action);
    }

    let mut pass = Pass {
        roster: input.roster,
        catalog: input.catalog,
        mode: input.mode,
        rng: input.rng,
        cycle: input.cycle,
        phase: input.phase,
        now: input.now,
        defaulted: BTreeSet::new(),
        out: Resolution::default(),
    };
    pass.fill_defaults(&mut by_kind);

    for actions in by_kind.values_mut() {
        actions.sort_by(|a, b| {
            a.submitted_at
                .cmp(&b.submitted_at)
                .then_with(|| a.actor.cmp(&b.actor))
        });
    }

    let arming = input.mode.gun.filter(|_| input.phase == Phase::Night);
    let mut armed = false;
    for kind in &input.mode.resolution_order {
        let actions = by_kind.remove(kind);
        match arming {
            Some(gun) if *kind == ActionKind::VoteGun => {
                pass.arm(gun, actions.unwrap_or_default());
                armed = true;
            }
            _ => {
                if let Some(actions) = actions {
                    pass.resolve_kind(*kind, actions);
                }
            }
        }
    }
    if let Some(gun) = arming
        && !armed
    {
        pass.arm(gun, by_kind.remove(&ActionKind::VoteGun).unwrap_or_default());
    }
    for (kind, actions) in by_kind {
        warn!(%kind, count = actions.len(), "action kind missing from resolution order, resolving last");
        pass.resolve_kind(kind, actions);
    }

    if input.timed_out
        && input.phase == Phase::Day
        && input.mode.gun.is_some_and(|gun| gun.bearer_timeout)
    {
        pass.disarm_idle(&shooters);
    }

    pass.out
}

fn pick(rng: &mut StdRng, mut candidates: Vec<ActorId>) -> Option<ActorId> {
    if candidates.is_empty() {
        return None;
    }
    let index = rng.random_range(0..candidates.len());
    Some(candidates.swap_remove(index))
}

// ============================================================================
// Vote tallies
// ============================================================================

/// Vote counts for one vote kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    /// Votes per candidate.
    pub counts: BTreeMap<ActorId, usize>,
    /// Living players entitled to cast this vote.
    pub eligible: usize,
}

impl Tally {
    /// Counts votes from living voters on living candidates.
    #[must_use]
    pub fn count<'a>(
        votes: impl IntoIterator<Item = &'a Action>,
        kind: ActionKind,
        roster: &Roster,
        catalog: &RoleCatalog,
        phase: Phase,
    ) -> Self {
        let eligible = roster
            .alive()
            .filter(|p| {
                catalog.role_of(&p.role).is_ok_and(|role| {
                    role.capability(&p.items, kind, phase) == Capability::Allowed
                })
            })
            .count();
        let mut counts = BTreeMap::new();
        for vote in votes {
            if vote.kind != kind || !roster.is_alive(&vote.actor) {
                continue;
            }
            if let Some(target) = &vote.target
                && roster.is_alive(target)
            {
                *counts.entry(target.clone()).or_insert(0) += 1;
            }
        }
        Self { counts, eligible }
    }

    /// Candidates sharing the highest count, and that count.
    #[must_use]
    pub fn leaders(&self) -> (Vec<&ActorId>, usize) {
        let top = self.counts.values().copied().max().unwrap_or(0);
        let leaders = self
            .counts
            .iter()
            .filter(|(_, n)| **n == top && top > 0)
            .map(|(id, _)| id)
            .collect();
        (leaders, top)
    }

    /// Candidate holding more than half of the eligible votes, if any.
    #[must_use]
    pub fn majority_holder(&self) -> Option<&ActorId> {
        self.counts
            .iter()
            .find(|(_, n)| **n * 2 > self.eligible)
            .map(|(id, _)| id)
    }
}

#[derive(Debug)]
enum VoteOutcome {
    Chosen {
        target: ActorId,
        note: Option<String>,
    },
    NoChoice {
        note: String,
    },
}

fn decide(tally: &Tally, policy: VotePolicy, rng: &mut StdRng) -> VoteOutcome {
    let (leaders, top) = tally.leaders();
    let names = || {
        leaders
            .iter()
            .map(|id| id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };

    if policy.threshold == Threshold::Majority {
        return tally.majority_holder().map_or_else(
            || VoteOutcome::NoChoice {
                note: if leaders.len() > 1 {
                    format!("tie between {}", names())
                } else {
                    format!(
                        "no majority: {top} of {} votes, more than half needed",
                        tally.eligible
                    )
                },
            },
            |target| VoteOutcome::Chosen {
                target: target.clone(),
                note: None,
            },
        );
    }

    match (leaders.as_slice(), policy.tie) {
        ([], _) => VoteOutcome::NoChoice {
            note: "no votes".to_owned(),
        },
        ([only], _) => VoteOutcome::Chosen {
            target: (*only).clone(),
            note: None,
        },
        (_, TieBreak::NoElimination) => VoteOutcome::NoChoice {
            note: format!("tie between {}", names()),
        },
        (tied, TieBreak::Random) => {
            let pick = tied[rng.random_range(0..tied.len())].clone();
            VoteOutcome::Chosen {
                target: pick,
                note: Some(format!("tie between {} broken at random", names())),
            }
        }
    }
}

// ============================================================================
// Pass
// ============================================================================

struct Pass<'a> {
    roster: &'a mut Roster,
    catalog: &'a RoleCatalog,
    mode: &'a GameMode,
    rng: &'a mut StdRng,
    cycle: u32,
    phase: Phase,
    now: DateTime<Utc>,
    defaulted: BTreeSet<(ActorId, ActionKind)>,
    out: Resolution,
}

impl Pass<'_> {
    fn resolve_kind(&mut self, kind: ActionKind, actions: Vec<Action>) {
        if kind.is_vote() {
            self.resolve_vote(kind, actions);
        } else {
            for action in actions {
                self.resolve_direct(action);
            }
        }
    }

    /// Explains why an action can no longer take effect, if it can't.
    fn void_reason(&self, action: &Action) -> Option<String> {
        if !self.roster.is_alive(&action.actor) {
            return Some(format!("{} died before resolution", action.actor));
        }
        match &action.target {
            Some(target) if !self.roster.is_alive(target) => {
                Some(format!("target {target} died before resolution"))
            }
            _ => None,
        }
    }

    fn push_void(&mut self, record: ActionResult, reason: String) {
        warn!(
            kind = ?record.kind,
            actor = ?record.actor,
            target = ?record.target,
            cycle = self.cycle,
            %reason,
            "voiding action"
        );
        self.out.records.push(record.voided(reason));
    }

    fn finish(&mut self, mut record: ActionResult, result: Result<(), RosterError>) {
        if let Err(e) = result {
            let reason = e.to_string();
            warn!(kind = ?record.kind, error = %reason, "resolution anomaly");
            record.void = true;
            record.annotate(&reason);
        }
        self.out.records.push(record);
    }

    fn marker(&self, kind: RecordKind) -> ActionResult {
        ActionResult::marker(kind, self.cycle, self.phase, self.now)
    }

    // ---- engine-initiated steps ----

    /// Queues a random-target action for each living player whose role
    /// grants one of the mode's default kinds and who submitted none.
    fn fill_defaults(&mut self, by_kind: &mut BTreeMap<ActionKind, Vec<Action>>) {
        let mode = self.mode;
        for &kind in &mode.default_actions {
            let submitted: BTreeSet<&ActorId> = by_kind
                .get(&kind)
                .map(|actions| actions.iter().map(|a| &a.actor).collect())
                .unwrap_or_default();
            let idle: Vec<ActorId> = self
                .roster
                .alive()
                .filter(|p| !submitted.contains(&p.id))
                .filter(|p| {
                    self.catalog
                        .role_of(&p.role)
                        .is_ok_and(|role| role.permits(kind, self.phase))
                })
                .map(|p| p.id.clone())
                .collect();

            for actor in idle {
                let Some(target) = self.random_target(&actor, kind) else {
                    continue;
                };
                debug!(%actor, %kind, %target, cycle = self.cycle, "acting for idle player");
                self.defaulted.insert((actor.clone(), kind));
                by_kind.entry(kind).or_default().push(Action {
                    actor,
                    kind,
                    target: Some(target),
                    submitted_at: self.now,
                    cycle: self.cycle,
                    phase: self.phase,
                });
            }
        }
    }

    /// A living player `actor` could legally aim `kind` at.
    fn random_target(&mut self, actor: &ActorId, kind: ActionKind) -> Option<ActorId> {
        let own = self.roster.by_id(actor).map(|p| p.alignment);
        let candidates = self
            .roster
            .alive()
            .filter(|p| &p.id != actor || kind.allows_self_target())
            .filter(|p| !kind.excludes_own_alignment() || Some(p.alignment) != own)
            .map(|p| p.id.clone())
            .collect();
        pick(self.rng, candidates)
    }

    /// Finds a bearer for the mode's gun unless a living player holds it.
    fn arm(&mut self, gun: GunRules, votes: Vec<Action>) {
        let counted = self.cast_votes(ActionKind::VoteGun, votes);
        let bearer = self
            .roster
            .alive()
            .find(|p| p.holds(ItemKind::Gun))
            .map(|p| p.id.clone());
        if let Some(bearer) = bearer {
            if !counted.is_empty() {
                let record = self
                    .marker(RecordKind::NoGun)
                    .with_annotation(format!("{bearer} still holds the gun"));
                self.out.records.push(record);
            }
            return;
        }

        let (chosen, note) = match gun.distribution {
            GunDistribution::Random => (None, Some("dealt at random".to_owned())),
            GunDistribution::Vote if counted.is_empty() => {
                (None, Some("no gun votes; dealt at random".to_owned()))
            }
            GunDistribution::Vote => {
                let tally = Tally::count(
                    &counted,
                    ActionKind::VoteGun,
                    self.roster,
                    self.catalog,
                    self.phase,
                );
                match decide(&tally, self.mode.vote_policy(ActionKind::VoteGun), self.rng) {
                    VoteOutcome::Chosen { target, note } => (Some(target), note),
                    VoteOutcome::NoChoice { note } => {
                        (None, Some(format!("{note}; dealt at random")))
                    }
                }
            }
        };
        let target = match chosen {
            Some(target) => Some(target),
            None => {
                let goodies = self
                    .roster
                    .alive()
                    .filter(|p| p.alignment == Alignment::Goodie)
                    .map(|p| p.id.clone())
                    .collect();
                pick(self.rng, goodies)
            }
        };
        let Some(target) = target else {
            let record = self
                .marker(RecordKind::NoGun)
                .with_annotation("no goodie left to arm");
            self.out.records.push(record);
            return;
        };

        let mut record = self.marker(RecordKind::GiveGun).with_target(target.clone());
        if let Some(note) = note {
            record.annotate(&note);
        }
        let result = self.gain(&mut record, &target, ItemKind::Gun);
        self.finish(record, result);
    }

    /// Modkills every living gun bearer who did not shoot this day.
    fn disarm_idle(&mut self, shooters: &BTreeSet<ActorId>) {
        let idle: Vec<ActorId> = self
            .roster
            .alive()
            .filter(|p| p.holds(ItemKind::Gun) && !shooters.contains(&p.id))
            .map(|p| p.id.clone())
            .collect();
        for bearer in idle {
            info!(%bearer, cycle = self.cycle, "gun bearer let the day run out");
            let mut record = self
                .marker(RecordKind::Modkill)
                .with_target(bearer.clone())
                .with_annotation("held the gun past the deadline");
            let result = self.kill(&mut record, &bearer, DeathCause::Modkill, false);
            self.finish(record, result);
        }
    }

    // ---- votes ----

    /// Logs each vote, voiding those that can no longer count.
    fn cast_votes(&mut self, kind: ActionKind, actions: Vec<Action>) -> Vec<Action> {
        let mut counted = Vec::with_capacity(actions.len());
        for action in actions {
            let record = ActionResult::for_action(kind.into(), &action, self.now);
            if let Some(reason) = self.void_reason(&action) {
                self.push_void(record, reason);
            } else {
                self.out.records.push(record);
                counted.push(action);
            }
        }
        counted
    }

    fn resolve_vote(&mut self, kind: ActionKind, actions: Vec<Action>) {
        let counted = self.cast_votes(kind, actions);
        if counted.is_empty() {
            return;
        }

        let tally = Tally::count(&counted, kind, self.roster, self.catalog, self.phase);
        let outcome = decide(&tally, self.mode.vote_policy(kind), self.rng);

        let (chosen_kind, none_kind) = match kind {
            ActionKind::VoteLynch => (RecordKind::Lynch, RecordKind::NoLynch),
            ActionKind::VoteNightkill => (RecordKind::NightKill, RecordKind::NoNightKill),
            _ => (RecordKind::GiveGun, RecordKind::NoGun),
        };

        match outcome {
            VoteOutcome::NoChoice { note } => {
                let record = self.marker(none_kind).with_annotation(note);
                self.out.records.push(record);
            }
            VoteOutcome::Chosen { target, note } => {
                let mut record = self.marker(chosen_kind).with_target(target.clone());
                if let Some(note) = note {
                    record.annotate(&note);
                }
                let result = match kind {
                    ActionKind::VoteLynch => {
                        self.kill(&mut record, &target, DeathCause::Lynch, false)
                    }
                    ActionKind::VoteNightkill => {
                        self.kill(&mut record, &target, DeathCause::NightKill, true)
                    }
                    _ => self.gain(&mut record, &target, ItemKind::Gun),
                };
                self.finish(record, result);
            }
        }
    }

    // ---- direct actions ----

    fn resolve_direct(&mut self, action: Action) {
        let mut record = ActionResult::for_action(action.kind.into(), &action, self.now);
        if self.defaulted.contains(&(action.actor.clone(), action.kind)) {
            record.automatic = true;
            record.annotate(DEFAULTED_NOTE);
        }
        if let Some(reason) = self.void_reason(&action) {
            self.push_void(record, reason);
            return;
        }
        let result = match (action.kind, action.target.as_ref()) {
            (ActionKind::Check, Some(target)) => self.check(&mut record, &action.actor, target),
            (ActionKind::GiveItem, Some(target)) => {
                self.gain(&mut record, target, ItemKind::Present)
            }
            (ActionKind::OpenPresent, _) => self.open_present(&mut record, &action.actor),
            (ActionKind::Shoot, Some(target)) => self.shoot(&mut record, &action.actor, target),
            (kind, _) => {
                self.push_void(record, format!("{kind} cannot be resolved without a target"));
                return;
            }
        };
        self.finish(record, result);
    }

    fn check(
        &mut self,
        record: &mut ActionResult,
        actor: &ActorId,
        target: &ActorId,
    ) -> Result<(), RosterError> {
        let role_checks = self
            .roster
            .by_id(actor)
            .and_then(|p| self.catalog.role_of(&p.role).ok())
            .is_some_and(|role| role.permits(ActionKind::Check, self.phase));
        if !role_checks {
            self.lose(record, actor, ItemKind::Magnifier)?;
        }
        let seen = self
            .roster
            .by_id(target)
            .ok_or_else(|| RosterError::UnknownPlayer(target.clone()))?;
        record.annotate(&format!("{} is {}", seen.label, seen.alignment));
        Ok(())
    }

    fn open_present(&mut self, record: &mut ActionResult, actor: &ActorId) -> Result<(), RosterError> {
        self.lose(record, actor, ItemKind::Present)?;
        let contents = ItemKind::PRESENT_CONTENTS;
        let item = contents[self.rng.random_range(0..contents.len())];
        record.annotate(&format!("found a {item}"));
        if item == ItemKind::Bomb {
            self.kill(record, actor, DeathCause::Bomb, true)
        } else {
            self.gain(record, actor, item)
        }
    }

    fn shoot(
        &mut self,
        record: &mut ActionResult,
        actor: &ActorId,
        target: &ActorId,
    ) -> Result<(), RosterError> {
        let gun = self.mode.gun;
        let target_is_baddie = self
            .roster
            .by_id(target)
            .is_some_and(|p| p.alignment == Alignment::Baddie);

        if self.mode.shoot_backfire && !target_is_baddie {
            record.annotate("the shot backfired");
            if gun.is_some_and(|g| g.pass_on_backfire) {
                self.hand_over(record, actor, target, ItemKind::Gun)?;
                record.annotate(&format!("{target} now holds the gun"));
            } else {
                self.lose(record, actor, ItemKind::Gun)?;
            }
            return self.kill(record, actor, DeathCause::Shot, true);
        }

        if target_is_baddie && gun.is_some_and(|g| g.keep_on_hit) {
            if !self.roster.by_id(actor).is_some_and(|p| p.holds(ItemKind::Gun)) {
                return Err(RosterError::MissingItem {
                    actor: actor.clone(),
                    item: ItemKind::Gun,
                });
            }
        } else {
            self.lose(record, actor, ItemKind::Gun)?;
        }
        self.kill(record, target, DeathCause::Shot, true)
    }

    // ---- effects ----

    fn apply(&mut self, record: &mut ActionResult, effect: Effect) -> Result<(), RosterError> {
        self.roster.apply(&effect)?;
        if effect.affects_outcome() {
            self.out.outcome_changed = true;
        }
        record.effects.push(effect);
        Ok(())
    }

    fn lose(&mut self, record: &mut ActionResult, holder: &ActorId, item: ItemKind) -> Result<(), RosterError> {
        self.apply(
            record,
            Effect::ItemLost {
                actor: holder.clone(),
                item,
            },
        )
    }

    /// Kills `victim` unless `angel_protects` and they hold an angel.
    fn kill(
        &mut self,
        record: &mut ActionResult,
        victim: &ActorId,
        cause: DeathCause,
        angel_protects: bool,
    ) -> Result<(), RosterError> {
        let has_angel = self
            .roster
            .by_id(victim)
            .is_some_and(|p| p.alive && p.holds(ItemKind::Angel));
        if angel_protects && has_angel {
            self.lose(record, victim, ItemKind::Angel)?;
            record.annotate(&format!("{victim} was saved by an angel"));
            return Ok(());
        }
        self.apply(
            record,
            Effect::Died {
                actor: victim.clone(),
                cause,
            },
        )
    }

    /// Hands `holder` an item and applies any role change it triggers.
    fn gain(
        &mut self,
        record: &mut ActionResult,
        holder: &ActorId,
        item: ItemKind,
    ) -> Result<(), RosterError> {
        self.apply(
            record,
            Effect::ItemGained {
                actor: holder.clone(),
                item,
            },
        )?;
        self.transition(record, holder, item)
    }

    /// Moves an item between two living players in one roster step.
    fn hand_over(
        &mut self,
        record: &mut ActionResult,
        from: &ActorId,
        to: &ActorId,
        item: ItemKind,
    ) -> Result<(), RosterError> {
        self.roster.transfer_item(from, to, item)?;
        record.effects.push(Effect::ItemLost {
            actor: from.clone(),
            item,
        });
        record.effects.push(Effect::ItemGained {
            actor: to.clone(),
            item,
        });
        self.transition(record, to, item)
    }

    fn transition(
        &mut self,
        record: &mut ActionResult,
        holder: &ActorId,
        item: ItemKind,
    ) -> Result<(), RosterError> {
        let Some(player) = self.roster.by_id(holder) else {
            return Ok(());
        };
        let current_alignment = player.alignment;
        let Some(next_role) = self
            .catalog
            .role_of(&player.role)
            .ok()
            .and_then(|role| role.transition_on(item))
            .cloned()
        else {
            return Ok(());
        };
        let next_alignment = self.catalog.role_of(&next_role).map(|r| r.alignment).ok();

        record.annotate(&format!("{holder} became {next_role}"));
        self.apply(
            record,
            Effect::RoleChanged {
                actor: holder.clone(),
                role: next_role,
            },
        )?;
        if let Some(alignment) = next_alignment
            && alignment != current_alignment
        {
            self.apply(
                record,
                Effect::AlignmentChanged {
                    actor: holder.clone(),
                    alignment,
                },
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use proptest::prelude::*;
    use rand::SeedableRng;

    use super::*;
    use crate::game::catalog::RoleTransition;
    use crate::game::catalog::tests::{role, test_catalog};
    use crate::game::mode::tests::classic_mode;
    use crate::game::roster::Player;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn roster(seats: &[(&str, &str)]) -> Roster {
        let catalog = test_catalog();
        Roster::new(
            seats
                .iter()
                .map(|(id, role)| {
                    let alignment = catalog.role_of(&(*role).into()).unwrap().alignment;
                    Player::new((*id).into(), *id, (*role).into(), alignment)
                })
                .collect(),
        )
        .unwrap()
    }

    fn action(actor: &str, kind: ActionKind, target: Option<&str>, secs: i64, phase: Phase) -> Action {
        Action {
            actor: actor.into(),
            kind,
            target: target.map(Into::into),
            submitted_at: at(secs),
            cycle: 1,
            phase,
        }
    }

    fn run(roster: &mut Roster, mode: &GameMode, phase: Phase, pending: Vec<Action>) -> Resolution {
        run_with(roster, &test_catalog(), mode, phase, pending, 42)
    }

    fn run_with(
        roster: &mut Roster,
        catalog: &RoleCatalog,
        mode: &GameMode,
        phase: Phase,
        pending: Vec<Action>,
        seed: u64,
    ) -> Resolution {
        let mut rng = StdRng::seed_from_u64(seed);
        resolve(
            pending,
            ResolutionInput {
                roster,
                catalog,
                mode,
                rng: &mut rng,
                cycle: 1,
                phase,
                now: at(100),
                timed_out: false,
            },
        )
    }

    fn kinds(res: &Resolution) -> Vec<RecordKind> {
        res.records.iter().map(|r| r.kind).collect()
    }

    #[test]
    fn empty_pending_changes_nothing() {
        let mut r = roster(&[("w", "wolf"), ("a", "vanilla"), ("b", "vanilla")]);
        let before = r.snapshot();
        let res = run(&mut r, &classic_mode(), Phase::Day, Vec::new());
        assert!(res.records.is_empty());
        assert!(!res.outcome_changed);
        assert_eq!(r.snapshot(), before);
    }

    #[test]
    fn majority_lynch_kills() {
        let mut r = roster(&[("w", "wolf"), ("a", "vanilla"), ("b", "vanilla")]);
        let res = run(
            &mut r,
            &classic_mode(),
            Phase::Day,
            vec![
                action("a", ActionKind::VoteLynch, Some("w"), 1, Phase::Day),
                action("b", ActionKind::VoteLynch, Some("w"), 2, Phase::Day),
                action("w", ActionKind::VoteLynch, Some("a"), 3, Phase::Day),
            ],
        );
        assert_eq!(
            kinds(&res),
            vec![
                RecordKind::VoteLynch,
                RecordKind::VoteLynch,
                RecordKind::VoteLynch,
                RecordKind::Lynch
            ]
        );
        assert!(res.outcome_changed);
        assert!(!r.is_alive(&"w".into()));
        assert_eq!(
            res.records[3].effects,
            vec![Effect::Died {
                actor: "w".into(),
                cause: DeathCause::Lynch
            }]
        );
    }

    #[test]
    fn lynch_tie_eliminates_nobody() {
        let mut r = roster(&[
            ("w", "wolf"),
            ("a", "vanilla"),
            ("b", "vanilla"),
            ("c", "vanilla"),
        ]);
        let res = run(
            &mut r,
            &classic_mode(),
            Phase::Day,
            vec![
                action("a", ActionKind::VoteLynch, Some("w"), 1, Phase::Day),
                action("b", ActionKind::VoteLynch, Some("w"), 2, Phase::Day),
                action("w", ActionKind::VoteLynch, Some("c"), 3, Phase::Day),
                action("c", ActionKind::VoteLynch, Some("c"), 4, Phase::Day),
            ],
        );
        let last = res.records.last().unwrap();
        assert_eq!(last.kind, RecordKind::NoLynch);
        assert!(last.annotation.as_deref().unwrap().contains("tie"));
        assert_eq!(r.alive().count(), 4);
        assert!(!res.outcome_changed);
    }

    #[test]
    fn plurality_random_tie_is_seeded() {
        let mut mode = classic_mode();
        mode.votes.insert(
            ActionKind::VoteLynch,
            VotePolicy {
                threshold: Threshold::Plurality,
                tie: TieBreak::Random,
            },
        );
        let votes = || {
            vec![
                action("a", ActionKind::VoteLynch, Some("w"), 1, Phase::Day),
                action("w", ActionKind::VoteLynch, Some("b"), 2, Phase::Day),
            ]
        };
        let seats = [("w", "wolf"), ("a", "vanilla"), ("b", "vanilla")];

        let mut first = roster(&seats);
        let res1 = run(&mut first, &mode, Phase::Day, votes());
        let mut second = roster(&seats);
        let res2 = run(&mut second, &mode, Phase::Day, votes());

        let lynch = res1.records.last().unwrap();
        assert_eq!(lynch.kind, RecordKind::Lynch);
        assert!(lynch.annotation.as_deref().unwrap().contains("at random"));
        assert_eq!(res1.records, res2.records);
        assert_eq!(first.alive().count(), 2);
    }

    #[test]
    fn vote_from_player_shot_earlier_is_void() {
        let mut r = roster(&[
            ("w", "wolf"),
            ("a", "vanilla"),
            ("b", "vanilla"),
            ("c", "vanilla"),
        ]);
        r.grant_item(&"a".into(), ItemKind::Gun).unwrap();
        let res = run(
            &mut r,
            &classic_mode(),
            Phase::Day,
            vec![
                action("w", ActionKind::VoteLynch, Some("b"), 1, Phase::Day),
                action("a", ActionKind::Shoot, Some("w"), 5, Phase::Day),
            ],
        );
        assert_eq!(
            kinds(&res),
            vec![RecordKind::Shoot, RecordKind::VoteLynch]
        );
        assert!(!res.records[0].void);
        assert!(res.records[1].void);
        assert!(res.records[1].annotation.as_deref().unwrap().contains("died before resolution"));
        assert!(r.is_alive(&"b".into()));
    }

    #[test]
    fn check_after_night_kill_is_void() {
        let mut mode = classic_mode();
        mode.resolution_order = vec![ActionKind::VoteNightkill, ActionKind::Check];
        let mut r = roster(&[("w", "wolf"), ("cop", "cop"), ("a", "vanilla"), ("b", "vanilla")]);
        let res = run(
            &mut r,
            &mode,
            Phase::Night,
            vec![
                action("cop", ActionKind::Check, Some("w"), 1, Phase::Night),
                action("w", ActionKind::VoteNightkill, Some("cop"), 2, Phase::Night),
            ],
        );
        assert_eq!(
            kinds(&res),
            vec![RecordKind::VoteNightkill, RecordKind::NightKill, RecordKind::Check]
        );
        assert!(res.records[2].void);
    }

    #[test]
    fn check_reports_alignment_and_consumes_magnifier() {
        let mut r = roster(&[("w", "wolf"), ("cop", "cop"), ("a", "vanilla")]);
        r.grant_item(&"a".into(), ItemKind::Magnifier).unwrap();
        let res = run(
            &mut r,
            &classic_mode(),
            Phase::Night,
            vec![
                action("cop", ActionKind::Check, Some("w"), 1, Phase::Night),
                action("a", ActionKind::Check, Some("w"), 2, Phase::Night),
            ],
        );
        assert_eq!(res.records[0].annotation.as_deref(), Some("w is baddie"));
        assert!(res.records[0].effects.is_empty());
        assert_eq!(
            res.records[1].effects,
            vec![Effect::ItemLost {
                actor: "a".into(),
                item: ItemKind::Magnifier
            }]
        );
        assert!(!r.by_id(&"a".into()).unwrap().holds(ItemKind::Magnifier));
    }

    #[test]
    fn angel_saves_from_night_kill_but_not_lynch() {
        let mut r = roster(&[("w", "wolf"), ("a", "vanilla"), ("b", "vanilla")]);
        r.grant_item(&"a".into(), ItemKind::Angel).unwrap();
        let res = run(
            &mut r,
            &classic_mode(),
            Phase::Night,
            vec![action("w", ActionKind::VoteNightkill, Some("a"), 1, Phase::Night)],
        );
        let kill = res.records.last().unwrap();
        assert_eq!(kill.kind, RecordKind::NightKill);
        assert!(kill.annotation.as_deref().unwrap().contains("angel"));
        assert!(r.is_alive(&"a".into()));
        assert!(!res.outcome_changed);

        r.grant_item(&"a".into(), ItemKind::Angel).unwrap();
        let res = run(
            &mut r,
            &classic_mode(),
            Phase::Day,
            vec![
                action("w", ActionKind::VoteLynch, Some("a"), 1, Phase::Day),
                action("b", ActionKind::VoteLynch, Some("a"), 2, Phase::Day),
            ],
        );
        assert_eq!(res.records.last().unwrap().kind, RecordKind::Lynch);
        assert!(!r.is_alive(&"a".into()));
    }

    #[test]
    fn santa_present_then_open() {
        let mut r = roster(&[("w", "wolf"), ("s", "santa"), ("a", "vanilla")]);
        let res = run(
            &mut r,
            &classic_mode(),
            Phase::Night,
            vec![action("s", ActionKind::GiveItem, Some("a"), 1, Phase::Night)],
        );
        assert_eq!(kinds(&res), vec![RecordKind::GiveItem]);
        assert!(r.by_id(&"a".into()).unwrap().holds(ItemKind::Present));

        let res = run(
            &mut r,
            &classic_mode(),
            Phase::Day,
            vec![action("a", ActionKind::OpenPresent, None, 2, Phase::Day)],
        );
        let open = &res.records[0];
        assert_eq!(open.kind, RecordKind::OpenPresent);
        assert!(open.annotation.as_deref().unwrap().starts_with("found a"));
        assert_eq!(
            open.effects[0],
            Effect::ItemLost {
                actor: "a".into(),
                item: ItemKind::Present
            }
        );
        assert!(!r.by_id(&"a".into()).unwrap().holds(ItemKind::Present));
    }

    #[test]
    fn shoot_backfires_on_goodie() {
        let mut mode = classic_mode();
        mode.shoot_backfire = true;
        let mut r = roster(&[("w", "wolf"), ("a", "vanilla"), ("b", "vanilla")]);
        r.grant_item(&"a".into(), ItemKind::Gun).unwrap();
        let res = run(
            &mut r,
            &mode,
            Phase::Day,
            vec![action("a", ActionKind::Shoot, Some("b"), 1, Phase::Day)],
        );
        assert!(!r.is_alive(&"a".into()));
        assert!(r.is_alive(&"b".into()));
        assert!(res.records[0].annotation.as_deref().unwrap().contains("backfired"));
    }

    #[test]
    fn shoot_without_gun_is_void() {
        let mut r = roster(&[("w", "wolf"), ("a", "vanilla"), ("b", "vanilla")]);
        let res = run(
            &mut r,
            &classic_mode(),
            Phase::Day,
            vec![action("a", ActionKind::Shoot, Some("w"), 1, Phase::Day)],
        );
        assert!(res.records[0].void);
        assert!(r.is_alive(&"w".into()));
    }

    #[test]
    fn gun_vote_grants_gun() {
        let mut r = roster(&[("w1", "wolf"), ("w2", "wolf"), ("a", "vanilla"), ("b", "vanilla"), ("c", "vanilla")]);
        let mut catalog = test_catalog();
        let mut gunwolf = catalog.role_of(&"wolf".into()).unwrap().clone();
        gunwolf.actions.insert(ActionKind::VoteGun, vec![Phase::Night]);
        catalog = RoleCatalog::new(catalog.iter().cloned().chain([gunwolf]));
        let res = run_with(
            &mut r,
            &catalog,
            &classic_mode(),
            Phase::Night,
            vec![
                action("w1", ActionKind::VoteGun, Some("a"), 1, Phase::Night),
                action("w2", ActionKind::VoteGun, Some("a"), 2, Phase::Night),
            ],
            1,
        );
        assert_eq!(res.records.last().unwrap().kind, RecordKind::GiveGun);
        assert!(r.by_id(&"a".into()).unwrap().holds(ItemKind::Gun));
    }

    #[test]
    fn receiving_item_triggers_role_change() {
        let mut apprentice = role("apprentice", Alignment::Goodie, &[(ActionKind::VoteLynch, Phase::Day)]);
        apprentice.becomes.push(RoleTransition {
            on_item: ItemKind::Present,
            role: "wolf".into(),
        });
        let catalog = RoleCatalog::new(test_catalog().iter().cloned().chain([apprentice]));
        let mut r = Roster::new(vec![
            Player::new("w".into(), "w", "wolf".into(), Alignment::Baddie),
            Player::new("s".into(), "s", "santa".into(), Alignment::Goodie),
            Player::new("p".into(), "p", "apprentice".into(), Alignment::Goodie),
            Player::new("a".into(), "a", "vanilla".into(), Alignment::Goodie),
        ])
        .unwrap();
        let res = run_with(
            &mut r,
            &catalog,
            &classic_mode(),
            Phase::Night,
            vec![action("s", ActionKind::GiveItem, Some("p"), 1, Phase::Night)],
            3,
        );
        let p = r.by_id(&"p".into()).unwrap();
        assert_eq!(p.role.as_str(), "wolf");
        assert_eq!(p.alignment, Alignment::Baddie);
        assert!(res.outcome_changed);
        assert_eq!(res.records[0].effects.len(), 3);
    }

    fn gun_mode(distribution: GunDistribution) -> GameMode {
        let mut mode = classic_mode();
        mode.shoot_backfire = true;
        mode.gun = Some(GunRules {
            distribution,
            ..GunRules::default()
        });
        mode
    }

    fn run_past_deadline(roster: &mut Roster, mode: &GameMode, pending: Vec<Action>) -> Resolution {
        let mut rng = StdRng::seed_from_u64(42);
        resolve(
            pending,
            ResolutionInput {
                roster,
                catalog: &test_catalog(),
                mode,
                rng: &mut rng,
                cycle: 1,
                phase: Phase::Day,
                now: at(100),
                timed_out: true,
            },
        )
    }

    #[test]
    fn idle_cop_checks_a_random_player() {
        let mut mode = classic_mode();
        mode.default_actions = vec![ActionKind::Check];
        let mut r = roster(&[("w", "wolf"), ("cop", "cop"), ("a", "vanilla"), ("b", "vanilla")]);
        let res = run(&mut r, &mode, Phase::Night, Vec::new());

        assert_eq!(kinds(&res), vec![RecordKind::Check]);
        let check = &res.records[0];
        assert!(check.automatic);
        assert_eq!(check.actor.as_ref().map(ActorId::as_str), Some("cop"));
        assert_ne!(check.target.as_ref().map(ActorId::as_str), Some("cop"));
        assert!(check.annotation.as_deref().unwrap().starts_with(DEFAULTED_NOTE));
        assert_eq!(check.submitted_at, at(100));
    }

    #[test]
    fn submitted_check_is_not_doubled() {
        let mut mode = classic_mode();
        mode.default_actions = vec![ActionKind::Check];
        let mut r = roster(&[("w", "wolf"), ("cop", "cop"), ("a", "vanilla")]);
        let res = run(
            &mut r,
            &mode,
            Phase::Night,
            vec![action("cop", ActionKind::Check, Some("w"), 1, Phase::Night)],
        );
        assert_eq!(kinds(&res), vec![RecordKind::Check]);
        assert!(!res.records[0].automatic);
        assert_eq!(res.records[0].annotation.as_deref(), Some("w is baddie"));

        // the cop cannot check by day, so nothing is filled in
        let res = run(&mut r, &mode, Phase::Day, Vec::new());
        assert!(res.records.is_empty());
    }

    #[test]
    fn random_distribution_arms_a_goodie_each_night() {
        let mut r = roster(&[("w", "wolf"), ("a", "vanilla"), ("b", "vanilla")]);
        let res = run(&mut r, &gun_mode(GunDistribution::Random), Phase::Night, Vec::new());

        assert_eq!(kinds(&res), vec![RecordKind::GiveGun]);
        let give = &res.records[0];
        assert_eq!(give.annotation.as_deref(), Some("dealt at random"));
        let bearer = give.target.clone().unwrap();
        assert_ne!(bearer.as_str(), "w");
        assert!(r.by_id(&bearer).unwrap().holds(ItemKind::Gun));
    }

    #[test]
    fn gun_without_votes_goes_to_a_random_goodie() {
        let mut r = roster(&[("w", "wolf"), ("a", "vanilla"), ("b", "vanilla")]);
        let res = run(&mut r, &gun_mode(GunDistribution::Vote), Phase::Night, Vec::new());

        let give = res.records.last().unwrap();
        assert_eq!(give.kind, RecordKind::GiveGun);
        assert!(give.annotation.as_deref().unwrap().contains("no gun votes"));
        assert_eq!(r.alive().filter(|p| p.holds(ItemKind::Gun)).count(), 1);
    }

    #[test]
    fn living_bearer_keeps_the_gun() {
        let mut r = roster(&[("w", "wolf"), ("a", "vanilla"), ("b", "vanilla")]);
        r.grant_item(&"a".into(), ItemKind::Gun).unwrap();
        let res = run(
            &mut r,
            &gun_mode(GunDistribution::Vote),
            Phase::Night,
            vec![action("w", ActionKind::VoteGun, Some("b"), 1, Phase::Night)],
        );
        assert_eq!(kinds(&res), vec![RecordKind::VoteGun, RecordKind::NoGun]);
        assert_eq!(res.records[1].annotation.as_deref(), Some("a still holds the gun"));
        assert!(!r.by_id(&"b".into()).unwrap().holds(ItemKind::Gun));

        // with no votes there is nothing to log
        let res = run(&mut r, &gun_mode(GunDistribution::Random), Phase::Night, Vec::new());
        assert!(res.records.is_empty());
    }

    #[test]
    fn hitting_a_baddie_keeps_the_gun() {
        let mut r = roster(&[("w1", "wolf"), ("w2", "wolf"), ("a", "vanilla"), ("b", "vanilla")]);
        r.grant_item(&"a".into(), ItemKind::Gun).unwrap();
        let res = run(
            &mut r,
            &gun_mode(GunDistribution::Vote),
            Phase::Day,
            vec![action("a", ActionKind::Shoot, Some("w1"), 1, Phase::Day)],
        );
        assert_eq!(
            res.records[0].effects,
            vec![Effect::Died {
                actor: "w1".into(),
                cause: DeathCause::Shot
            }]
        );
        assert!(r.by_id(&"a".into()).unwrap().holds(ItemKind::Gun));

        // without the rule the gun is spent
        let mut r = roster(&[("w1", "wolf"), ("w2", "wolf"), ("a", "vanilla"), ("b", "vanilla")]);
        r.grant_item(&"a".into(), ItemKind::Gun).unwrap();
        run(
            &mut r,
            &classic_mode(),
            Phase::Day,
            vec![action("a", ActionKind::Shoot, Some("w1"), 1, Phase::Day)],
        );
        assert!(!r.by_id(&"a".into()).unwrap().holds(ItemKind::Gun));
    }

    #[test]
    fn backfire_passes_the_gun_to_the_target() {
        let mut r = roster(&[("w", "wolf"), ("a", "vanilla"), ("b", "vanilla")]);
        r.grant_item(&"a".into(), ItemKind::Gun).unwrap();
        let res = run(
            &mut r,
            &gun_mode(GunDistribution::Vote),
            Phase::Day,
            vec![action("a", ActionKind::Shoot, Some("b"), 1, Phase::Day)],
        );
        let shot = &res.records[0];
        assert_eq!(
            shot.annotation.as_deref(),
            Some("the shot backfired; b now holds the gun")
        );
        assert_eq!(
            shot.effects,
            vec![
                Effect::ItemLost {
                    actor: "a".into(),
                    item: ItemKind::Gun
                },
                Effect::ItemGained {
                    actor: "b".into(),
                    item: ItemKind::Gun
                },
                Effect::Died {
                    actor: "a".into(),
                    cause: DeathCause::Shot
                },
            ]
        );
        assert!(!r.is_alive(&"a".into()));
        assert!(r.by_id(&"b".into()).unwrap().holds(ItemKind::Gun));
    }

    #[test]
    fn idle_bearer_is_removed_at_the_deadline() {
        let mut r = roster(&[("w", "wolf"), ("a", "vanilla"), ("b", "vanilla"), ("c", "vanilla")]);
        r.grant_item(&"a".into(), ItemKind::Gun).unwrap();
        let mode = gun_mode(GunDistribution::Vote);

        let res = run(&mut r, &mode, Phase::Day, Vec::new());
        assert!(res.records.is_empty());

        let res = run_past_deadline(&mut r, &mode, Vec::new());
        assert_eq!(kinds(&res), vec![RecordKind::Modkill]);
        let modkill = &res.records[0];
        assert!(modkill.actor.is_none());
        assert_eq!(modkill.target.as_ref().map(ActorId::as_str), Some("a"));
        assert_eq!(modkill.annotation.as_deref(), Some("held the gun past the deadline"));
        assert!(res.outcome_changed);
        assert!(!r.is_alive(&"a".into()));
    }

    #[test]
    fn bearer_who_fired_survives_the_deadline() {
        let mut r = roster(&[("w1", "wolf"), ("w2", "wolf"), ("a", "vanilla"), ("b", "vanilla")]);
        r.grant_item(&"a".into(), ItemKind::Gun).unwrap();
        let res = run_past_deadline(
            &mut r,
            &gun_mode(GunDistribution::Vote),
            vec![action("a", ActionKind::Shoot, Some("w1"), 1, Phase::Day)],
        );
        assert_eq!(kinds(&res), vec![RecordKind::Shoot]);
        assert!(r.is_alive(&"a".into()));
    }

    #[test]
    fn tally_majority() {
        let r = roster(&[("w", "wolf"), ("a", "vanilla"), ("b", "vanilla"), ("c", "vanilla")]);
        let votes = [
            action("a", ActionKind::VoteLynch, Some("w"), 1, Phase::Day),
            action("b", ActionKind::VoteLynch, Some("w"), 2, Phase::Day),
        ];
        let tally = Tally::count(&votes, ActionKind::VoteLynch, &r, &test_catalog(), Phase::Day);
        assert_eq!(tally.eligible, 4);
        assert!(tally.majority_holder().is_none());

        let votes = [
            action("a", ActionKind::VoteLynch, Some("w"), 1, Phase::Day),
            action("b", ActionKind::VoteLynch, Some("w"), 2, Phase::Day),
            action("c", ActionKind::VoteLynch, Some("w"), 3, Phase::Day),
        ];
        let tally = Tally::count(&votes, ActionKind::VoteLynch, &r, &test_catalog(), Phase::Day);
        assert_eq!(tally.majority_holder(), Some(&"w".into()));
    }

    proptest! {
        #[test]
        fn happened_never_precedes_submitted(offsets in prop::collection::vec(-300i64..300, 1..8)) {
            let mut r = roster(&[("w", "wolf"), ("a", "vanilla"), ("b", "vanilla"), ("c", "vanilla")]);
            let voters = ["w", "a", "b", "c"];
            let pending: Vec<Action> = offsets
                .iter()
                .zip(voters.iter().cycle())
                .map(|(offset, voter)| {
                    let mut a = action(voter, ActionKind::VoteLynch, Some("c"), 0, Phase::Day);
                    a.submitted_at = at(100) + TimeDelta::seconds(*offset);
                    a
                })
                .collect();
            let res = run(&mut r, &classic_mode(), Phase::Day, pending);
            for record in &res.records {
                prop_assert!(record.happened_at >= record.submitted_at);
            }
        }
    }
}
