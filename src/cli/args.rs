//! CLI argument definitions.
//!
//! All Clap derive structs for `wolfden` command-line parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::observability::LogFormat;

// ============================================================================
// Root CLI
// ============================================================================

/// Rules engine for werewolf-style social-deduction games.
#[derive(Parser, Debug)]
#[command(name = "wolfden", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "WOLFDEN_COLOR")]
    pub color: ColorChoice,

    /// Log line format on stderr.
    #[arg(long, default_value = "human", global = true, env = "WOLFDEN_LOG_FORMAT")]
    pub log_format: LogFormatArg,
}

// ============================================================================
// Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate rules files.
    Validate(ValidateArgs),

    /// List the roles a rules set defines.
    Roles(ListArgs),

    /// List the modes a rules set defines.
    Modes(ListArgs),

    /// Play a scripted game through the arena registry.
    Simulate(SimulateArgs),

    /// Rebuild a finished game from its report and check the result.
    Replay(ReplayArgs),
}

/// Arguments for `validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Rules files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Enable strict validation (warnings become errors).
    #[arg(long)]
    pub strict: bool,

    /// Validate each file on its own instead of over the built-in rules.
    #[arg(long)]
    pub standalone: bool,
}

/// Arguments for `roles` and `modes`.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Rules file merged over the built-in rules.
    #[arg(short, long, env = "WOLFDEN_RULES")]
    pub rules: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `simulate`.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// YAML script: players, seed, and the steps to play.
    #[arg(short, long)]
    pub script: PathBuf,

    /// Rules file merged over the built-in rules.
    #[arg(short, long, env = "WOLFDEN_RULES")]
    pub rules: Option<PathBuf>,

    /// Write engine events as JSONL to this file.
    #[arg(long, env = "WOLFDEN_EVENTS_FILE")]
    pub events_file: Option<PathBuf>,

    /// Write the final game report as JSON to this file.
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Serve Prometheus metrics on this port while simulating.
    #[arg(long, env = "WOLFDEN_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

/// Arguments for `replay`.
#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Game report JSON, as written by `simulate --report`.
    pub report: PathBuf,

    /// Rules file the game was played under, merged over the built-in rules.
    #[arg(short, long, env = "WOLFDEN_RULES")]
    pub rules: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// `--log-format` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormatArg {
    /// Human-readable lines.
    #[default]
    Human,
    /// One JSON object per line.
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Human => Self::Human,
            LogFormatArg::Json => Self::Json,
        }
    }
}

/// Output format for structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}
