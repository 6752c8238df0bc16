//! Whole games through the registry, one per built-in mode.

mod common;

use std::sync::Arc;

use chrono::TimeDelta;

use common::{at, registry, seats};
use wolfden::arena::StartRequest;
use wolfden::clock::ManualClock;
use wolfden::game::{
    ActionKind, ActionResult, Alignment, ArenaId, DeathCause, ItemKind, Phase, RecordKind,
    Rejection,
};

fn kinds(log: &[ActionResult]) -> Vec<RecordKind> {
    log.iter().map(|r| r.kind).collect()
}

fn is_ordered(log: &[ActionResult]) -> bool {
    log.windows(2)
        .all(|w| w[0].sequence < w[1].sequence && w[0].happened_at <= w[1].happened_at)
}

#[tokio::test]
async fn lite_cop_finds_wolf_and_village_lynches() {
    let clock = Arc::new(ManualClock::new(at(0)));
    let (reg, sink) = registry(clock.clone());
    let arena = ArenaId::from("lite");
    reg.start_game(
        StartRequest::new(
            "lite",
            "lite",
            seats(&[("w", "wolf"), ("a", "vanilla"), ("b", "vanilla"), ("c", "cop")]),
        )
        .with_seed(5),
    )
    .await
    .unwrap();

    // night 0: vanillas have nothing to do, so wolf and cop finish the night
    clock.advance(TimeDelta::seconds(10));
    reg.submit_action(&arena, &"w".into(), ActionKind::VoteNightkill, Some("a".into()))
        .await
        .unwrap();
    assert_eq!(
        reg.submit_action(&arena, &"c".into(), ActionKind::VoteLynch, Some("w".into()))
            .await,
        Err(Rejection::WrongPhase {
            kind: ActionKind::VoteLynch,
            phase: Phase::Night
        })
    );
    clock.advance(TimeDelta::seconds(5));
    reg.submit_action(&arena, &"c".into(), ActionKind::Check, Some("w".into()))
        .await
        .unwrap();

    let status = reg.status(&arena).await.unwrap();
    assert_eq!((status.phase, status.cycle), (Phase::Day, 0));
    assert_eq!(status.living.len(), 3);

    // day 0: two of three votes is a majority and ends the day
    assert_eq!(
        reg.submit_action(&arena, &"a".into(), ActionKind::VoteLynch, Some("w".into()))
            .await,
        Err(Rejection::ActorDead)
    );
    reg.submit_action(&arena, &"w".into(), ActionKind::VoteLynch, Some("c".into()))
        .await
        .unwrap();
    reg.submit_action(&arena, &"b".into(), ActionKind::VoteLynch, Some("w".into()))
        .await
        .unwrap();
    assert_eq!(sink.len(), 0);
    reg.submit_action(&arena, &"c".into(), ActionKind::VoteLynch, Some("w".into()))
        .await
        .unwrap();

    let reports = sink.reports();
    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.winner, Alignment::Goodie);
    assert_eq!(report.cycles, 0);
    assert!(is_ordered(&report.log));

    assert_eq!(
        kinds(&report.log),
        vec![
            RecordKind::GameStart,
            RecordKind::NightStart,
            RecordKind::NightEnd,
            RecordKind::Check,
            RecordKind::VoteNightkill,
            RecordKind::NightKill,
            RecordKind::DayStart,
            RecordKind::DayEnd,
            RecordKind::VoteLynch,
            RecordKind::VoteLynch,
            RecordKind::VoteLynch,
            RecordKind::Lynch,
            RecordKind::GameEnd,
        ]
    );

    let check = report.log.iter().find(|r| r.kind == RecordKind::Check).unwrap();
    assert_eq!(check.annotation.as_deref(), Some("W is baddie"));
    assert_eq!(check.submitted_at, at(15));

    let lynched = report.final_roster.iter().find(|p| p.id.as_str() == "w").unwrap();
    assert_eq!(lynched.death, Some(DeathCause::Lynch));
    let victim = report.final_roster.iter().find(|p| p.id.as_str() == "a").unwrap();
    assert_eq!(victim.death, Some(DeathCause::NightKill));
}

#[tokio::test]
async fn lite_wolves_reach_parity() {
    let clock = Arc::new(ManualClock::new(at(0)));
    let (reg, sink) = registry(clock.clone());
    let arena = ArenaId::from("lite");
    reg.start_game(StartRequest::new(
        "lite",
        "lite",
        seats(&[
            ("w1", "wolf"),
            ("w2", "wolf"),
            ("a", "vanilla"),
            ("b", "vanilla"),
            ("c", "vanilla"),
            ("d", "vanilla"),
        ]),
    ))
    .await
    .unwrap();

    reg.submit_action(&arena, &"w1".into(), ActionKind::VoteNightkill, Some("a".into()))
        .await
        .unwrap();
    assert_eq!(
        reg.submit_action(&arena, &"w2".into(), ActionKind::VoteNightkill, Some("w1".into()))
            .await,
        Err(Rejection::InvalidTarget {
            reason: "W1 is on your own team".into()
        })
    );
    reg.submit_action(&arena, &"w2".into(), ActionKind::VoteNightkill, Some("a".into()))
        .await
        .unwrap();

    let status = reg.status(&arena).await.unwrap();
    assert_eq!(status.phase, Phase::Day);

    // split day vote: no lynch, then night 1 kills again
    reg.submit_action(&arena, &"b".into(), ActionKind::VoteLynch, Some("w1".into()))
        .await
        .unwrap();
    reg.submit_action(&arena, &"c".into(), ActionKind::VoteLynch, Some("w2".into()))
        .await
        .unwrap();
    clock.advance(TimeDelta::minutes(10));
    reg.sweep().await;

    let log = reg.log_snapshot(&arena).await.unwrap();
    let no_lynch = log.iter().find(|r| r.kind == RecordKind::NoLynch).unwrap();
    assert!(no_lynch.annotation.as_deref().unwrap().contains("tie"));
    assert_eq!(reg.status(&arena).await.unwrap().cycle, 1);

    reg.submit_action(&arena, &"w1".into(), ActionKind::VoteNightkill, Some("b".into()))
        .await
        .unwrap();
    reg.submit_action(&arena, &"w2".into(), ActionKind::VoteNightkill, Some("b".into()))
        .await
        .unwrap();

    let report = &sink.reports()[0];
    assert_eq!(report.winner, Alignment::Baddie);
    assert_eq!(report.decided_by, "parity");
    assert_eq!(report.cycles, 1);
}

#[tokio::test]
async fn xmas_presents_are_handed_out_before_the_kill() {
    let clock = Arc::new(ManualClock::new(at(0)));
    let (reg, sink) = registry(clock.clone());
    let arena = ArenaId::from("xmas");
    reg.start_game(
        StartRequest::new(
            "xmas",
            "xmas",
            seats(&[("w", "wolf"), ("s1", "santa"), ("s2", "santa"), ("s3", "santa")]),
        )
        .with_seed(9),
    )
    .await
    .unwrap();

    assert_eq!(
        reg.submit_action(&arena, &"s1".into(), ActionKind::GiveItem, Some("s1".into()))
            .await,
        Err(Rejection::SelfTargetNotAllowed {
            kind: ActionKind::GiveItem
        })
    );
    for (santa, to) in [("s1", "s2"), ("s2", "s1"), ("s3", "s1")] {
        reg.submit_action(&arena, &santa.into(), ActionKind::GiveItem, Some(to.into()))
            .await
            .unwrap();
    }
    reg.submit_action(&arena, &"w".into(), ActionKind::VoteNightkill, Some("s3".into()))
        .await
        .unwrap();

    let log = reg.log_snapshot(&arena).await.unwrap();
    let gifts: Vec<&ActionResult> = log.iter().filter(|r| r.kind == RecordKind::GiveItem).collect();
    assert_eq!(gifts.len(), 3);
    assert!(gifts.iter().all(|r| !r.void));
    let kill = log.iter().position(|r| r.kind == RecordKind::NightKill).unwrap();
    let last_gift = log.iter().rposition(|r| r.kind == RecordKind::GiveItem).unwrap();
    assert!(last_gift < kill);

    // the day: presents can be opened but nobody has to
    let status = reg.status(&arena).await.unwrap();
    assert_eq!(status.phase, Phase::Day);
    assert_eq!(
        reg.submit_action(&arena, &"w".into(), ActionKind::OpenPresent, None)
            .await,
        Err(Rejection::ActionNotPermittedForRole {
            kind: ActionKind::OpenPresent
        })
    );
    reg.submit_action(&arena, &"s1".into(), ActionKind::VoteLynch, Some("w".into()))
        .await
        .unwrap();
    reg.submit_action(&arena, &"s2".into(), ActionKind::VoteLynch, Some("w".into()))
        .await
        .unwrap();

    let report = &sink.reports()[0];
    assert_eq!(report.winner, Alignment::Goodie);
    let s1 = report.final_roster.iter().find(|p| p.id.as_str() == "s1").unwrap();
    assert_eq!(s1.items, vec![ItemKind::Present, ItemKind::Present]);
    let s3 = report.final_roster.iter().find(|p| p.id.as_str() == "s3").unwrap();
    assert!(!s3.alive);
}

#[tokio::test]
async fn xmas_opened_present_is_consumed() {
    let clock = Arc::new(ManualClock::new(at(0)));
    let (reg, _) = registry(clock.clone());
    let arena = ArenaId::from("xmas");
    reg.start_game(
        StartRequest::new(
            "xmas",
            "xmas",
            seats(&[
                ("w", "wolf"),
                ("s1", "santa"),
                ("s2", "santa"),
                ("s3", "santa"),
                ("s4", "santa"),
            ]),
        )
        .with_seed(21),
    )
    .await
    .unwrap();

    reg.submit_action(&arena, &"s1".into(), ActionKind::GiveItem, Some("s2".into()))
        .await
        .unwrap();
    reg.force_advance(&arena).await.unwrap();

    reg.submit_action(&arena, &"s2".into(), ActionKind::OpenPresent, None)
        .await
        .unwrap();
    reg.force_advance(&arena).await.unwrap();

    let log = reg.log_snapshot(&arena).await.unwrap();
    let opened = log.iter().find(|r| r.kind == RecordKind::OpenPresent).unwrap();
    assert!(!opened.void);
    assert!(opened.annotation.as_deref().unwrap().starts_with("found a "));
    assert_eq!(
        opened.effects.first(),
        Some(&wolfden::game::Effect::ItemLost {
            actor: "s2".into(),
            item: ItemKind::Present,
        })
    );
}

#[tokio::test]
async fn popcorn_gun_passes_and_backfires() {
    let clock = Arc::new(ManualClock::new(at(0)));
    let (reg, sink) = registry(clock.clone());
    let arena = ArenaId::from("popcorn");
    reg.start_game(
        StartRequest::new(
            "popcorn",
            "popcorn",
            seats(&[
                ("w", "gunwolf"),
                ("a", "vanilla"),
                ("b", "vanilla"),
                ("c", "vanilla"),
            ]),
        )
        .with_seed(11),
    )
    .await
    .unwrap();

    reg.submit_action(&arena, &"w".into(), ActionKind::VoteGun, Some("a".into()))
        .await
        .unwrap();
    let status = reg.status(&arena).await.unwrap();
    assert_eq!(status.phase, Phase::Day);

    // a goodie target makes the shot turn on the shooter
    reg.submit_action(&arena, &"a".into(), ActionKind::Shoot, Some("b".into()))
        .await
        .unwrap();
    reg.force_advance(&arena).await.unwrap();

    let log = reg.log_snapshot(&arena).await.unwrap();
    let shot = log.iter().find(|r| r.kind == RecordKind::Shoot).unwrap();
    assert_eq!(
        shot.annotation.as_deref(),
        Some("the shot backfired; b now holds the gun")
    );
    let status = reg.status(&arena).await.unwrap();
    assert_eq!(
        status.living.iter().map(|id| id.as_str()).collect::<Vec<_>>(),
        vec!["w", "b", "c"]
    );

    // night 1: b still holds the gun, so the vote arms nobody
    reg.submit_action(&arena, &"w".into(), ActionKind::VoteGun, Some("c".into()))
        .await
        .unwrap();
    let log = reg.log_snapshot(&arena).await.unwrap();
    let no_gun = log.iter().find(|r| r.kind == RecordKind::NoGun).unwrap();
    assert_eq!(no_gun.annotation.as_deref(), Some("b still holds the gun"));

    reg.submit_action(&arena, &"b".into(), ActionKind::Shoot, Some("w".into()))
        .await
        .unwrap();
    reg.force_advance(&arena).await.unwrap();

    let report = &sink.reports()[0];
    assert_eq!(report.winner, Alignment::Goodie);
    assert_eq!(report.cycles, 1);
    let wolf = report.final_roster.iter().find(|p| p.id.as_str() == "w").unwrap();
    assert_eq!(wolf.death, Some(DeathCause::Shot));
    // a hit on a baddie keeps the gun
    let b = report.final_roster.iter().find(|p| p.id.as_str() == "b").unwrap();
    assert_eq!(b.items, vec![ItemKind::Gun]);
}

#[tokio::test]
async fn modkill_drops_pending_actions() {
    let clock = Arc::new(ManualClock::new(at(0)));
    let (reg, _) = registry(clock.clone());
    let arena = ArenaId::from("lite");
    reg.start_game(StartRequest::new(
        "lite",
        "lite",
        seats(&[
            ("w", "wolf"),
            ("a", "vanilla"),
            ("b", "vanilla"),
            ("c", "cop"),
            ("d", "vanilla"),
        ]),
    ))
    .await
    .unwrap();

    reg.submit_action(&arena, &"c".into(), ActionKind::Check, Some("a".into()))
        .await
        .unwrap();
    reg.modkill(&arena, &"c".into()).await.unwrap();
    assert_eq!(reg.status(&arena).await.unwrap().pending, 0);

    let log = reg.log_snapshot(&arena).await.unwrap();
    let modkill = log.last().unwrap();
    assert_eq!(modkill.kind, RecordKind::Modkill);
    assert!(modkill.annotation.is_none());
    assert!(!log.iter().any(|r| r.kind == RecordKind::Check));
}
