//! Append-only event log.
//!
//! Every phase marker, vote, action outcome and anomaly becomes one
//! [`ActionResult`]. Records carry the roster [`Effect`]s they caused, so
//! the log alone is enough to rebuild a game's final state.

use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::action::Action;
use super::types::{ActionKind, ActorId, Alignment, DeathCause, ItemKind, Phase, RoleId};

// ---------------------------------------------------------------------------
// Record kinds
// ---------------------------------------------------------------------------

/// What a log record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    GameStart,
    GameEnd,
    NightStart,
    NightEnd,
    DayStart,
    DayEnd,
    VoteLynch,
    Lynch,
    NoLynch,
    VoteNightkill,
    NightKill,
    NoNightKill,
    VoteGun,
    GiveGun,
    NoGun,
    Check,
    Shoot,
    GiveItem,
    OpenPresent,
    Modkill,
}

impl RecordKind {
    /// Marker written when `phase` begins.
    #[must_use]
    pub const fn phase_start(phase: Phase) -> Option<Self> {
        match phase {
            Phase::Night => Some(Self::NightStart),
            Phase::Day => Some(Self::DayStart),
            Phase::Setup | Phase::Ended => None,
        }
    }

    /// Marker written when `phase` ends.
    #[must_use]
    pub const fn phase_end(phase: Phase) -> Option<Self> {
        match phase {
            Phase::Night => Some(Self::NightEnd),
            Phase::Day => Some(Self::DayEnd),
            Phase::Setup | Phase::Ended => None,
        }
    }

    /// Returns `true` for records that bracket phases or the game.
    #[must_use]
    pub const fn is_marker(self) -> bool {
        matches!(
            self,
            Self::GameStart
                | Self::GameEnd
                | Self::NightStart
                | Self::NightEnd
                | Self::DayStart
                | Self::DayEnd
        )
    }
}

impl RecordKind {
    /// The submission kind this record logs, if it logs one.
    #[must_use]
    pub const fn action_kind(self) -> Option<ActionKind> {
        match self {
            Self::VoteLynch => Some(ActionKind::VoteLynch),
            Self::VoteNightkill => Some(ActionKind::VoteNightkill),
            Self::VoteGun => Some(ActionKind::VoteGun),
            Self::Check => Some(ActionKind::Check),
            Self::Shoot => Some(ActionKind::Shoot),
            Self::GiveItem => Some(ActionKind::GiveItem),
            Self::OpenPresent => Some(ActionKind::OpenPresent),
            _ => None,
        }
    }
}

impl From<ActionKind> for RecordKind {
    fn from(kind: ActionKind) -> Self {
        match kind {
            ActionKind::VoteLynch => Self::VoteLynch,
            ActionKind::VoteNightkill => Self::VoteNightkill,
            ActionKind::VoteGun => Self::VoteGun,
            ActionKind::Check => Self::Check,
            ActionKind::Shoot => Self::Shoot,
            ActionKind::GiveItem => Self::GiveItem,
            ActionKind::OpenPresent => Self::OpenPresent,
        }
    }
}

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

/// A roster mutation caused by a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    /// The player died.
    Died {
        /// Victim.
        actor: ActorId,
        /// How.
        cause: DeathCause,
    },
    /// The player switched teams.
    AlignmentChanged {
        /// Converted player.
        actor: ActorId,
        /// New alignment.
        alignment: Alignment,
    },
    /// The player's role was replaced.
    RoleChanged {
        /// Affected player.
        actor: ActorId,
        /// New role.
        role: RoleId,
    },
    /// The player received an item.
    ItemGained {
        /// Holder.
        actor: ActorId,
        /// Item received.
        item: ItemKind,
    },
    /// The player used up or lost an item.
    ItemLost {
        /// Former holder.
        actor: ActorId,
        /// Item removed.
        item: ItemKind,
    },
}

impl Effect {
    /// Whether win conditions need re-evaluating after this effect.
    #[must_use]
    pub const fn affects_outcome(&self) -> bool {
        matches!(self, Self::Died { .. } | Self::AlignmentChanged { .. })
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One immutable log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    /// Position in the log, assigned on append.
    pub sequence: u64,
    /// What happened.
    pub kind: RecordKind,
    /// Who did it, if anyone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<ActorId>,
    /// Who it was aimed at, if anyone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<ActorId>,
    /// Cycle the record belongs to.
    pub cycle: u32,
    /// Phase the record belongs to.
    pub phase: Phase,
    /// When the originating action was submitted.
    pub submitted_at: DateTime<Utc>,
    /// When it took effect. Never earlier than `submitted_at`.
    pub happened_at: DateTime<Utc>,
    /// Free-form narrative detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    /// Set when the action could not take effect.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub void: bool,
    /// Set when the engine acted for a player who submitted nothing.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub automatic: bool,
    /// Roster mutations caused by this record, in application order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<Effect>,
}

impl ActionResult {
    /// A record with no originating action (markers, outcomes, admin).
    #[must_use]
    pub const fn marker(kind: RecordKind, cycle: u32, phase: Phase, at: DateTime<Utc>) -> Self {
        Self {
            sequence: 0,
            kind,
            actor: None,
            target: None,
            cycle,
            phase,
            submitted_at: at,
            happened_at: at,
            annotation: None,
            void: false,
            automatic: false,
            effects: Vec::new(),
        }
    }

    /// A record produced by resolving `action` at `at`.
    #[must_use]
    pub fn for_action(kind: RecordKind, action: &Action, at: DateTime<Utc>) -> Self {
        Self {
            sequence: 0,
            kind,
            actor: Some(action.actor.clone()),
            target: action.target.clone(),
            cycle: action.cycle,
            phase: action.phase,
            submitted_at: action.submitted_at,
            happened_at: at.max(action.submitted_at),
            annotation: None,
            void: false,
            automatic: false,
            effects: Vec::new(),
        }
    }

    /// Sets the actor.
    #[must_use]
    pub fn with_actor(mut self, actor: ActorId) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Sets the target.
    #[must_use]
    pub fn with_target(mut self, target: ActorId) -> Self {
        self.target = Some(target);
        self
    }

    /// Sets the annotation.
    #[must_use]
    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotation = Some(annotation.into());
        self
    }

    /// Marks the record void and explains why.
    #[must_use]
    pub fn voided(mut self, reason: impl Into<String>) -> Self {
        self.void = true;
        self.annotation = Some(reason.into());
        self
    }

    /// Appends to the annotation, separating with `"; "`.
    pub fn annotate(&mut self, note: &str) {
        match &mut self.annotation {
            Some(existing) => {
                existing.push_str("; ");
                existing.push_str(note);
            }
            None => self.annotation = Some(note.to_owned()),
        }
    }
}

// ---------------------------------------------------------------------------
// Log
// ---------------------------------------------------------------------------

/// Append-only, shareable record store.
///
/// Writers take the lock once per batch, so a snapshot never sees part of a
/// resolution pass.
#[derive(Debug, Default)]
pub struct EventLog {
    records: RwLock<Vec<ActionResult>>,
}

impl EventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one record and returns it with its sequence number set.
    pub fn append(&self, record: ActionResult) -> ActionResult {
        self.extend(vec![record]).remove(0)
    }

    /// Appends a batch atomically and returns the stored copies.
    pub fn extend(&self, batch: Vec<ActionResult>) -> Vec<ActionResult> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let mut stored = Vec::with_capacity(batch.len());
        for mut record in batch {
            record.sequence = records.len() as u64;
            records.push(record.clone());
            stored.push(record);
        }
        stored
    }

    /// Copy of every record so far.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ActionResult> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if nothing has been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
