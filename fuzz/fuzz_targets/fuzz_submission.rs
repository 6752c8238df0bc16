#![no_main]

//! Drives a popcorn game with arbitrary submissions and checks that the
//! log stays ordered and reruns to the same records and roster.

use chrono::{DateTime, TimeDelta};
use libfuzzer_sys::fuzz_target;
use wolfden::config::Rules;
use wolfden::game::replay::verify;
use wolfden::game::{ActionKind, Game, GameSetup, Seat, WinConditionRegistry};

const PLAYERS: [(&str, &str); 6] = [
    ("w1", "gunwolf"),
    ("w2", "gunwolf"),
    ("a", "vanilla"),
    ("b", "vanilla"),
    ("c", "vanilla"),
    ("d", "vanilla"),
];

fuzz_target!(|data: &[u8]| {
    let Ok(rules) = Rules::builtin() else { return };
    let Ok(mode) = rules.mode("popcorn") else { return };
    let Ok(replay_rules) = rules.replay_rules("popcorn", &WinConditionRegistry::default()) else {
        return;
    };
    let win = replay_rules.win.clone();
    let seats = PLAYERS
        .iter()
        .map(|(id, role)| Seat::new(*id, *id).with_role(*role))
        .collect();
    let Ok(mut game) = Game::new(GameSetup {
        arena: "fuzz".into(),
        mode,
        catalog: rules.catalog(),
        win,
        seats,
        seed: data.len() as u64,
        timings: None,
    }) else {
        return;
    };

    let Some(mut now) = DateTime::from_timestamp(1_700_000_000, 0) else { return };
    if game.start(now).is_err() {
        return;
    }

    for chunk in data.chunks(3) {
        now += TimeDelta::seconds(1);
        match chunk {
            [op, ..] if op % 16 == 0 => {
                let _ = game.advance(now);
            }
            [actor, kind, target] => {
                let actor = PLAYERS[usize::from(*actor) % PLAYERS.len()].0;
                let kind = ActionKind::ALL[usize::from(*kind) % ActionKind::ALL.len()];
                let target = (*target != u8::MAX)
                    .then(|| PLAYERS[usize::from(*target) % PLAYERS.len()].0.into());
                let _ = game.submit(actor.into(), kind, target, now);
            }
            _ => {}
        }
        if game.is_ended() {
            break;
        }
    }

    let log = game.log().snapshot();
    assert!(log.windows(2).all(|w| w[0].sequence < w[1].sequence));
    if let Some(report) = game.take_report() {
        let replayed = verify(&report, &replay_rules);
        assert!(replayed.is_ok(), "{replayed:?}");
    }
});
