//! `wolfden replay`.

use std::path::Path;

use super::load_rules;
use crate::cli::args::{OutputFormat, ReplayArgs};
use crate::error::WolfdenError;
use crate::game::machine::GameReport;
use crate::game::replay::{ReplayState, verify};
use crate::game::win::WinConditionRegistry;

/// Reruns a report under its rules and prints the rebuilt roster.
///
/// # Errors
///
/// I/O or JSON errors reading the report, an unknown mode, or the replay
/// mismatch.
pub fn run(args: &ReplayArgs) -> Result<(), WolfdenError> {
    let report = read_report(&args.report)?;
    let rules = load_rules(args.rules.as_deref())?
        .replay_rules(&report.mode, &WinConditionRegistry::default())?;
    let state = verify(&report, &rules)?;
    tracing::info!(
        game_id = %report.game_id,
        mode = %report.mode,
        records = state.records,
        "report reruns to its final roster"
    );

    match args.format {
        OutputFormat::Json => {
            let summary = serde_json::json!({
                "game_id": report.game_id,
                "arena": report.arena,
                "mode": report.mode,
                "winner": report.winner,
                "decided_by": report.decided_by,
                "cycles": report.cycles,
                "records": state.records,
                "roster": state.roster.snapshot(),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Human => print_human(&report, &state),
    }
    Ok(())
}

pub(crate) fn read_report(path: &Path) -> Result<GameReport, WolfdenError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn print_human(report: &GameReport, state: &ReplayState) {
    println!(
        "game {} in {} ({}): {} win by {} after {} cycles",
        report.game_id,
        report.arena,
        report.mode,
        report.winner,
        report.decided_by,
        report.cycles
    );
    println!("{} records rerun, log and final roster match\n", state.records);
    for player in state.roster.iter() {
        let status = match (&player.alive, &player.death) {
            (true, _) => "alive".to_string(),
            (false, Some(cause)) => format!("dead ({cause})"),
            (false, None) => "dead".to_string(),
        };
        println!(
            "  {:<12}{:<10}{:<8}{status}",
            player.label,
            player.role.as_str(),
            player.alignment.to_string()
        );
    }
}
