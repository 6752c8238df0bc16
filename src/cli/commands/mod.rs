//! CLI command dispatch and handlers.

pub mod listing;
pub mod replay;
pub mod simulate;
pub mod validate;

use std::path::Path;
use std::sync::Arc;

use crate::cli::args::{Cli, Commands};
use crate::config::{LoaderOptions, Rules, RulesLoader};
use crate::error::WolfdenError;

/// Dispatch a parsed CLI invocation to its handler.
///
/// # Errors
///
/// Returns whatever the handler fails with.
pub async fn dispatch(cli: Cli) -> Result<(), WolfdenError> {
    match cli.command {
        Commands::Validate(args) => validate::run(&args),
        Commands::Roles(args) => listing::roles(&args),
        Commands::Modes(args) => listing::modes(&args),
        Commands::Simulate(args) => simulate::run(&args).await,
        Commands::Replay(args) => replay::run(&args),
    }
}

/// Built-in rules, overlaid with `path` when given. Warnings go to the log.
pub(crate) fn load_rules(path: Option<&Path>) -> Result<Arc<Rules>, WolfdenError> {
    let loader = RulesLoader::new(LoaderOptions::default());
    let loaded = match path {
        Some(path) => {
            tracing::info!(rules = %path.display(), "loading rules");
            loader.load(path)?
        }
        None => loader.load_builtin()?,
    };

    for warning in &loaded.warnings {
        tracing::warn!(
            location = warning.location.as_deref().unwrap_or("<unknown>"),
            "{}",
            warning.message
        );
    }
    Ok(loaded.rules)
}
