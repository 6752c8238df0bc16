//! Error types for `wolfden`
//!
//! One top-level error aggregates the domain errors so the CLI can map any
//! failure onto a process exit code. Player-facing submission rejections are
//! not errors in this sense and live in [`crate::game::action::Rejection`].

use std::path::PathBuf;
use thiserror::Error;

use crate::game::types::{ActorId, ArenaId, ItemKind, Phase, RoleId};

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `wolfden` CLI operations.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Rules configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// A game could not be started
    pub const START_ERROR: i32 = 4;

    /// Engine error while driving a game
    pub const ENGINE_ERROR: i32 = 5;

    /// A game report failed to replay
    pub const REPLAY_ERROR: i32 = 6;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `wolfden` operations.
#[derive(Debug, Error)]
pub enum WolfdenError {
    /// Rules loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Game could not be started
    #[error(transparent)]
    Start(#[from] StartError),

    /// Engine error while driving a game
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Report replay error
    #[error(transparent)]
    Replay(#[from] ReplayError),

    /// Invalid command-line usage
    #[error("usage error: {0}")]
    Usage(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl WolfdenError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) | Self::Yaml(_) => ExitCode::CONFIG_ERROR,
            Self::Start(_) => ExitCode::START_ERROR,
            Self::Engine(_) => ExitCode::ENGINE_ERROR,
            Self::Replay(_) => ExitCode::REPLAY_ERROR,
            Self::Usage(_) => ExitCode::USAGE_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
        }
    }
}

/// Convenience alias used by the CLI layer.
pub type Result<T, E = WolfdenError> = std::result::Result<T, E>;

// ============================================================================
// Configuration Errors
// ============================================================================

/// Rules loading and validation errors.
///
/// All of these surface at load time or at game start, never mid-game.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the rules file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Rules validation failed
    #[error("validation failed for {path}")]
    ValidationError {
        /// Source of the rules (file path or `<builtin>`)
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced rules file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },

    /// A role, mode or win condition name that does not exist
    #[error("unknown {kind} '{name}'{}", suggestion.as_ref().map_or_else(String::new, |s| format!(" (did you mean '{s}'?)")))]
    UnknownReference {
        /// What was being looked up (`role`, `mode`, `win condition`)
        kind: &'static str,
        /// The name that failed to resolve
        name: String,
        /// Closest known name, if any is near enough
        suggestion: Option<String>,
    },

    /// Environment variable referenced in the rules file is not set
    #[error("environment variable '{var}' not set (referenced at {location})")]
    EnvVarNotSet {
        /// Name of the environment variable
        var: String,
        /// Location in the rules where it was referenced
        location: String,
    },
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found while checking a rules document.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the problematic field (e.g., "modes.lite.resolution_order")
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Prevents the rules from being used
    Error,
    /// Worth reporting, does not block loading
    Warning,
}

// ============================================================================
// Catalog & Roster Errors
// ============================================================================

/// Role lookup failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// The role id is not in the catalog
    #[error("role '{0}' not found in catalog")]
    NotFound(RoleId),
}

/// Roster mutation failures.
///
/// A mutation aimed at a dead player is reported, never silently ignored.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RosterError {
    /// The actor is not part of this game
    #[error("player '{0}' is not in the roster")]
    UnknownPlayer(ActorId),

    /// The actor is already dead
    #[error("player '{0}' is already dead")]
    AlreadyDead(ActorId),

    /// The actor does not hold the item being removed or transferred
    #[error("player '{actor}' does not hold a {item}")]
    MissingItem {
        /// Player expected to hold the item
        actor: ActorId,
        /// The missing item
        item: ItemKind,
    },
}

// ============================================================================
// Setup & Start Errors
// ============================================================================

/// Character setup failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SetupError {
    /// Not enough players for the mode
    #[error("mode '{mode}' needs at least {min} players, got {actual}")]
    TooFewPlayers {
        /// Mode id
        mode: String,
        /// Minimum player count
        min: usize,
        /// Players offered
        actual: usize,
    },

    /// A fixed setup whose role counts do not add up to the player count
    #[error("fixed setup assigns {assigned} roles for {players} players")]
    CountMismatch {
        /// Roles assigned by the setup
        assigned: usize,
        /// Players offered
        players: usize,
    },

    /// Some seats carry a forced role and some do not
    #[error("{assigned} of {players} players have a pre-assigned role; assign all or none")]
    PartialAssignment {
        /// Seats with a forced role
        assigned: usize,
        /// Players offered
        players: usize,
    },

    /// The same actor appears twice
    #[error("player '{0}' is listed more than once")]
    DuplicatePlayer(ActorId),

    /// Role lookup failed while dealing
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Reasons a game could not be started.
#[derive(Debug, Error)]
pub enum StartError {
    /// A non-terminal game already owns the arena
    #[error("arena '{0}' already has a game in progress")]
    ArenaBusy(ArenaId),

    /// Mode or role lookup failed
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Roles could not be dealt
    #[error(transparent)]
    Setup(#[from] SetupError),

    /// The roster already satisfies a win condition
    #[error("roster is already decided: {winner} would win before the first phase")]
    Degenerate {
        /// Alignment that would win immediately
        winner: crate::game::types::Alignment,
    },

    /// The registry has been shut down
    #[error("arena registry is shut down")]
    ShuttingDown,
}

// ============================================================================
// Engine Errors
// ============================================================================

/// Errors raised while driving a running game.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No game is registered for the arena
    #[error("no active game in arena '{0}'")]
    NoActiveGame(ArenaId),

    /// The game has already ended
    #[error("game has already ended")]
    GameEnded,

    /// The game has not been started yet
    #[error("game has not started")]
    NotStarted,

    /// A phase transition that the state machine does not allow
    #[error("invalid phase transition: {from} -> {to}")]
    InvalidTransition {
        /// Current phase
        from: Phase,
        /// Requested phase
        to: Phase,
    },

    /// Roster mutation failed
    #[error(transparent)]
    Roster(#[from] RosterError),
}

// ============================================================================
// Replay Errors
// ============================================================================

/// Errors raised while replaying a game report.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// Record sequence numbers are not strictly increasing
    #[error("record sequence out of order: {previous} followed by {next}")]
    OutOfOrder {
        /// Sequence of the earlier record
        previous: u64,
        /// Sequence of the offending record
        next: u64,
    },

    /// An effect could not be applied to the reconstructed roster
    #[error("record {sequence}: {source}")]
    Effect {
        /// Sequence of the offending record
        sequence: u64,
        /// Underlying roster failure
        #[source]
        source: RosterError,
    },

    /// The reconstructed state disagrees with the report
    #[error("replayed state differs from report: {0}")]
    Mismatch(String),
}
