//! `wolfden roles` and `wolfden modes`.

use std::fmt::Write as _;

use crate::cli::args::{ListArgs, OutputFormat};
use crate::error::WolfdenError;
use crate::game::catalog::Role;
use crate::game::mode::GameMode;
use crate::game::types::Phase;

use super::load_rules;

/// Prints every role.
///
/// # Errors
///
/// Rules loading or JSON output failures.
pub fn roles(args: &ListArgs) -> Result<(), WolfdenError> {
    let rules = load_rules(args.rules.as_deref())?;
    match args.format {
        OutputFormat::Json => {
            let roles: Vec<&Role> = rules.roles().collect();
            println!("{}", serde_json::to_string_pretty(&roles)?);
        }
        OutputFormat::Human => {
            println!("Roles ({} defined)\n", rules.catalog().len());
            for role in rules.roles() {
                println!(
                    "  {:<12}{:<8}{}",
                    role.id.as_str(),
                    role.alignment.to_string(),
                    role.description
                );
                let night = kinds(role, Phase::Night);
                let day = kinds(role, Phase::Day);
                println!("  {:<12}night: {night}  day: {day}", "");
                for t in &role.becomes {
                    println!("  {:<12}becomes {} on receiving a {}", "", t.role, t.on_item);
                }
            }
        }
    }
    Ok(())
}

/// Prints every mode.
///
/// # Errors
///
/// Rules loading or JSON output failures.
pub fn modes(args: &ListArgs) -> Result<(), WolfdenError> {
    let rules = load_rules(args.rules.as_deref())?;
    match args.format {
        OutputFormat::Json => {
            let modes: Vec<serde_json::Value> = rules.modes().map(mode_json).collect();
            println!("{}", serde_json::to_string_pretty(&modes)?);
        }
        OutputFormat::Human => {
            let modes: Vec<&GameMode> = rules.modes().collect();
            println!("Modes ({} defined)\n", modes.len());
            for mode in modes {
                println!("  {}", describe(mode));
            }
            println!("\nSimulate a game: wolfden simulate --script <file>");
        }
    }
    Ok(())
}

fn kinds(role: &Role, phase: Phase) -> String {
    let list: Vec<&str> = role.kinds_in(phase).map(|k| k.as_str()).collect();
    if list.is_empty() {
        "-".to_string()
    } else {
        list.join(", ")
    }
}

fn describe(mode: &GameMode) -> String {
    let mut line = format!(
        "{:<10}{}+ players, opens at {}, day {}, night {}",
        mode.id,
        mode.min_players,
        mode.opening_phase,
        humantime::format_duration(mode.timings.day),
        humantime::format_duration(mode.timings.night),
    );
    if !mode.description.is_empty() {
        let _ = write!(line, "\n  {:<10}{}", "", mode.description);
    }
    line
}

fn mode_json(mode: &GameMode) -> serde_json::Value {
    serde_json::json!({
        "id": mode.id,
        "description": mode.description,
        "min_players": mode.min_players,
        "opening_phase": mode.opening_phase,
        "day": humantime::format_duration(mode.timings.day).to_string(),
        "night": humantime::format_duration(mode.timings.night).to_string(),
        "setup": mode.setup,
        "votes": mode.votes,
        "resolution_order": mode.resolution_order,
        "early_end": mode.early_end,
        "win_conditions": mode.win_conditions,
        "shoot_backfire": mode.shoot_backfire,
        "gun": mode.gun,
        "default_actions": mode.default_actions,
    })
}
