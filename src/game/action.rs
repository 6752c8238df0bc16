//! Action submission, validation and the pending queue.
//!
//! At most one action per `(actor, kind, cycle)` is pending; a later
//! submission under the same key replaces the earlier one.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::catalog::{Capability, RoleCatalog};
use super::roster::Roster;
use super::types::{ActionKind, ActorId, Phase};

/// A validated submission waiting for resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Who submitted it.
    pub actor: ActorId,
    /// What they want to do.
    pub kind: ActionKind,
    /// Aimed at.
    pub target: Option<ActorId>,
    /// When it was accepted.
    pub submitted_at: DateTime<Utc>,
    /// Cycle it was submitted in.
    pub cycle: u32,
    /// Phase it was submitted in.
    pub phase: Phase,
}

impl Action {
    /// Queue key.
    #[must_use]
    pub fn key(&self) -> ActionKey {
        ActionKey {
            actor: self.actor.clone(),
            kind: self.kind,
            cycle: self.cycle,
        }
    }
}

/// Uniqueness key for pending actions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActionKey {
    /// Submitting player.
    pub actor: ActorId,
    /// Action kind.
    pub kind: ActionKind,
    /// Cycle.
    pub cycle: u32,
}

/// Successful submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accepted {
    /// Whether an earlier submission with the same key was replaced.
    pub replaced: bool,
}

/// Why a submission was turned down.
///
/// The `Display` text is written for players.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Nothing is running in the arena.
    #[error("there is no game running here")]
    NoActiveGame,

    /// The game already has a winner.
    #[error("the game is over")]
    GameEnded,

    /// The submitter is not seated in this game.
    #[error("{0} is not playing in this game")]
    UnknownActor(ActorId),

    /// The submitter is dead.
    #[error("dead players can't act")]
    ActorDead,

    /// Legal for the actor, but not now. Also returned once the phase
    /// deadline has passed.
    #[error("{kind} is not possible during the {phase}")]
    WrongPhase {
        /// Requested kind.
        kind: ActionKind,
        /// Current phase.
        phase: Phase,
    },

    /// Neither role nor items allow it.
    #[error("your role can't {kind}")]
    ActionNotPermittedForRole {
        /// Requested kind.
        kind: ActionKind,
    },

    /// Missing, unknown, dead, or otherwise illegal target.
    #[error("invalid target: {reason}")]
    InvalidTarget {
        /// Player-facing explanation.
        reason: String,
    },

    /// Only lynch votes may target their own actor.
    #[error("you can't {kind} yourself")]
    SelfTargetNotAllowed {
        /// Requested kind.
        kind: ActionKind,
    },

    /// `withdraw` found nothing pending.
    #[error("you have nothing to withdraw")]
    NothingToWithdraw,
}

impl Rejection {
    /// Bounded label for metrics and structured events.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::NoActiveGame => "no_active_game",
            Self::GameEnded => "game_ended",
            Self::UnknownActor(_) => "unknown_actor",
            Self::ActorDead => "actor_dead",
            Self::WrongPhase { .. } => "wrong_phase",
            Self::ActionNotPermittedForRole { .. } => "not_permitted",
            Self::InvalidTarget { .. } => "invalid_target",
            Self::SelfTargetNotAllowed { .. } => "self_target",
            Self::NothingToWithdraw => "nothing_to_withdraw",
        }
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Game state a submission is checked against.
#[derive(Debug, Clone, Copy)]
pub struct SubmissionContext<'a> {
    /// Current roster.
    pub roster: &'a Roster,
    /// Role definitions.
    pub catalog: &'a RoleCatalog,
    /// Current phase.
    pub phase: Phase,
    /// Current cycle.
    pub cycle: u32,
    /// End of the current phase, if one is set.
    pub deadline: Option<DateTime<Utc>>,
}

/// Checks a submission against the current game state.
///
/// Checks run in a fixed order and the first failure wins: terminal game,
/// unknown or dead actor, phase and permission, target, self-target.
///
/// # Errors
///
/// Returns the first [`Rejection`] that applies.
pub fn validate(
    ctx: &SubmissionContext<'_>,
    actor: &ActorId,
    kind: ActionKind,
    target: Option<&ActorId>,
    now: DateTime<Utc>,
) -> Result<(), Rejection> {
    if ctx.phase == Phase::Ended {
        return Err(Rejection::GameEnded);
    }
    let player = ctx
        .roster
        .by_id(actor)
        .ok_or_else(|| Rejection::UnknownActor(actor.clone()))?;
    if !player.alive {
        return Err(Rejection::ActorDead);
    }

    let wrong_phase = Rejection::WrongPhase {
        kind,
        phase: ctx.phase,
    };
    if !ctx.phase.is_playable() || ctx.deadline.is_some_and(|d| now >= d) {
        return Err(wrong_phase);
    }
    let role = ctx
        .catalog
        .role_of(&player.role)
        .map_err(|_| Rejection::ActionNotPermittedForRole { kind })?;
    match role.capability(&player.items, kind, ctx.phase) {
        Capability::Allowed => {}
        Capability::WrongPhase => return Err(wrong_phase),
        Capability::NotPermitted => return Err(Rejection::ActionNotPermittedForRole { kind }),
    }

    let target = match (kind.requires_target(), target) {
        (true, Some(target)) => target,
        (false, None) => return Ok(()),
        (true, None) => {
            return Err(Rejection::InvalidTarget {
                reason: format!("{kind} needs a target"),
            });
        }
        (false, Some(_)) => {
            return Err(Rejection::InvalidTarget {
                reason: format!("{kind} takes no target"),
            });
        }
    };
    let Some(target_player) = ctx.roster.by_id(target) else {
        return Err(Rejection::InvalidTarget {
            reason: format!("{target} is not playing in this game"),
        });
    };
    if !target_player.alive {
        return Err(Rejection::InvalidTarget {
            reason: format!("{} is dead", target_player.label),
        });
    }
    if target == actor && !kind.allows_self_target() {
        return Err(Rejection::SelfTargetNotAllowed { kind });
    }
    if kind.excludes_own_alignment() && target_player.alignment == player.alignment {
        return Err(Rejection::InvalidTarget {
            reason: format!("{} is on your own team", target_player.label),
        });
    }
    Ok(())
}

// ============================================================================
// Queue
// ============================================================================

/// Pending actions for the current phase.
#[derive(Debug, Clone, Default)]
pub struct ActionQueue {
    pending: BTreeMap<ActionKey, Action>,
}

impl ActionQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a validated action, replacing any pending one with the same key.
    pub fn submit(&mut self, action: Action) -> Accepted {
        let replaced = self.pending.insert(action.key(), action).is_some();
        Accepted { replaced }
    }

    /// Removes the pending action for `(actor, kind, cycle)`.
    ///
    /// # Errors
    ///
    /// [`Rejection::NothingToWithdraw`] if nothing is pending under the key.
    pub fn withdraw(
        &mut self,
        actor: &ActorId,
        kind: ActionKind,
        cycle: u32,
    ) -> Result<Action, Rejection> {
        let key = ActionKey {
            actor: actor.clone(),
            kind,
            cycle,
        };
        self.pending
            .remove(&key)
            .ok_or(Rejection::NothingToWithdraw)
    }

    /// Drops everything `actor` has pending.
    pub fn remove_actor(&mut self, actor: &ActorId) -> usize {
        let before = self.pending.len();
        self.pending.retain(|key, _| &key.actor != actor);
        before - self.pending.len()
    }

    /// Pending actions in key order.
    pub fn pending(&self) -> impl Iterator<Item = &Action> {
        self.pending.values()
    }

    /// Pending actions of one kind.
    pub fn of_kind(&self, kind: ActionKind) -> impl Iterator<Item = &Action> {
        self.pending.values().filter(move |a| a.kind == kind)
    }

    /// Whether `(actor, kind, cycle)` has something pending.
    #[must_use]
    pub fn contains(&self, actor: &ActorId, kind: ActionKind, cycle: u32) -> bool {
        self.pending.contains_key(&ActionKey {
            actor: actor.clone(),
            kind,
            cycle,
        })
    }

    /// Empties the queue, returning its contents.
    pub fn take(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.pending).into_values().collect()
    }

    /// Number of pending actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Whether every living player has submitted every action their role
    /// grants in the current phase. Item-granted actions are optional.
    #[must_use]
    pub fn all_submitted(&self, ctx: &SubmissionContext<'_>) -> bool {
        ctx.roster.alive().all(|player| {
            ctx.catalog.role_of(&player.role).map_or(true, |role| {
                role.kinds_in(ctx.phase)
                    .all(|kind| self.contains(&player.id, kind, ctx.cycle))
            })
        })
    }
}
