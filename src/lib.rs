//! `wolfden` - rules engine for werewolf-style social-deduction games
//!
//! Games are driven by a chat front end through [`arena::ArenaRegistry`]:
//! players submit actions, phases end on their deadline or early, and each
//! phase end resolves the pending actions into an ordered event log.

pub mod arena;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod game;
pub mod observability;
