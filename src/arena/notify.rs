//! Messages for the chat transport.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::game::log::ActionResult;
use crate::game::types::{Alignment, ArenaId, Phase};

/// Broadcast to every subscriber of a registry.
///
/// Delivery is best effort: a lagging subscriber loses the oldest
/// messages, the engine never waits for one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A playable phase began.
    PhaseChanged {
        /// Hosting arena.
        arena: ArenaId,
        /// New phase.
        phase: Phase,
        /// Its cycle.
        cycle: u32,
        /// When it ends on its own.
        deadline: Option<DateTime<Utc>>,
    },
    /// A log record worth narrating.
    Narrative {
        /// Hosting arena.
        arena: ArenaId,
        /// The record.
        record: ActionResult,
    },
    /// The game is over.
    GameEnded {
        /// Hosting arena.
        arena: ArenaId,
        /// Game id.
        game_id: Uuid,
        /// Winning alignment.
        winner: Alignment,
    },
}

impl Notification {
    /// Arena the message belongs to.
    #[must_use]
    pub const fn arena(&self) -> &ArenaId {
        match self {
            Self::PhaseChanged { arena, .. }
            | Self::Narrative { arena, .. }
            | Self::GameEnded { arena, .. } => arena,
        }
    }
}
