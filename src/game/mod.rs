//! The rules engine.
//!
//! Everything in here is synchronous and free of I/O: callers own the
//! clock, the locking, and delivery of the records a step produces.

pub mod action;
pub mod catalog;
pub mod log;
pub mod machine;
pub mod mode;
pub mod replay;
pub mod resolution;
pub mod roster;
pub mod setup;
pub mod types;
pub mod win;

pub use action::{Accepted, Action, Rejection};
pub use catalog::{Role, RoleCatalog};
pub use log::{ActionResult, Effect, EventLog, RecordKind};
pub use machine::{Game, GameReport, GameSetup, GameStatus, PhaseEntry, Step};
pub use mode::{GameMode, GunDistribution, GunRules, PhaseTimings};
pub use roster::{Player, Roster};
pub use setup::Seat;
pub use types::{ActionKind, ActorId, Alignment, ArenaId, DeathCause, ItemKind, Phase, RoleId};
pub use win::{WinCondition, WinConditionRegistry, WinEvaluator};
