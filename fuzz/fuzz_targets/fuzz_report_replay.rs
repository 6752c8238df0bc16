#![no_main]

use libfuzzer_sys::fuzz_target;
use wolfden::config::Rules;
use wolfden::game::replay::verify;
use wolfden::game::{GameReport, WinConditionRegistry};

fuzz_target!(|data: &[u8]| {
    let Ok(report) = serde_json::from_slice::<GameReport>(data) else {
        return;
    };
    let Ok(rules) = Rules::builtin() else { return };
    if let Ok(rules) = rules.replay_rules(&report.mode, &WinConditionRegistry::default()) {
        let _ = verify(&report, &rules);
    }
});
