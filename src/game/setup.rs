//! Character setup: deciding who plays what.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::error::SetupError;

use super::catalog::RoleCatalog;
use super::mode::{GameMode, SetupRule};
use super::roster::Player;
use super::types::{ActorId, RoleId};

/// A player joining a game, optionally with a pre-assigned role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seat {
    /// Transport identity.
    pub id: ActorId,
    /// Display name.
    pub label: String,
    /// Forced role. Either every seat has one or none does.
    pub role: Option<RoleId>,
}

impl Seat {
    /// A seat whose role will be dealt.
    #[must_use]
    pub fn new(id: impl Into<ActorId>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            role: None,
        }
    }

    /// A seat with a forced role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<RoleId>) -> Self {
        self.role = Some(role.into());
        self
    }
}

/// Role counts the rule produces for `players` seats.
///
/// # Errors
///
/// [`SetupError::CountMismatch`] when a fixed setup does not add up.
pub fn composition(rule: &SetupRule, players: usize) -> Result<Vec<(RoleId, usize)>, SetupError> {
    let counts = match rule {
        SetupRule::Lite {
            cop,
            vanilla,
            baddie,
        } => {
            let cops = (players / 10).max(1).min(players);
            let baddies = (players - cops) / 4;
            vec![
                (cop.clone(), cops),
                (vanilla.clone(), players - cops - baddies),
                (baddie.clone(), baddies),
            ]
        }
        SetupRule::Xmas { cop, santa, baddie } => {
            let cops = if players >= 9 { (players / 10).max(1) } else { 0 };
            let baddies = players.saturating_sub(1) / 3;
            vec![
                (cop.clone(), cops),
                (baddie.clone(), baddies),
                (santa.clone(), players - cops - baddies),
            ]
        }
        SetupRule::Popcorn { goodie, baddie } => {
            let baddies = if players == 4 { 1 } else { players.div_ceil(3) };
            vec![
                (goodie.clone(), players - baddies),
                (baddie.clone(), baddies),
            ]
        }
        SetupRule::Fixed { roles } => {
            let assigned: usize = roles.iter().map(|rc| rc.count).sum();
            if assigned != players {
                return Err(SetupError::CountMismatch { assigned, players });
            }
            roles.iter().map(|rc| (rc.role.clone(), rc.count)).collect()
        }
    };
    Ok(counts.into_iter().filter(|(_, n)| *n > 0).collect())
}

/// Seats players with roles.
///
/// When every seat carries a role those are used as-is; otherwise roles
/// are dealt from the mode's setup rule in a shuffled order.
///
/// # Errors
///
/// Fails on too few players, a partial assignment, or an unknown role.
pub fn deal(
    mode: &GameMode,
    seats: Vec<Seat>,
    catalog: &RoleCatalog,
    rng: &mut impl Rng,
) -> Result<Vec<Player>, SetupError> {
    let assigned = seats.iter().filter(|s| s.role.is_some()).count();
    let roles: Vec<RoleId> = if assigned == seats.len() && !seats.is_empty() {
        seats.iter().filter_map(|s| s.role.clone()).collect()
    } else if assigned > 0 {
        return Err(SetupError::PartialAssignment {
            assigned,
            players: seats.len(),
        });
    } else {
        if seats.len() < mode.min_players {
            return Err(SetupError::TooFewPlayers {
                mode: mode.id.clone(),
                min: mode.min_players,
                actual: seats.len(),
            });
        }
        let mut deck: Vec<RoleId> = composition(&mode.setup, seats.len())?
            .into_iter()
            .flat_map(|(role, n)| std::iter::repeat_n(role, n))
            .collect();
        deck.shuffle(rng);
        deck
    };

    seats
        .into_iter()
        .zip(roles)
        .map(|(seat, role_id)| {
            let role = catalog.role_of(&role_id)?;
            Ok(Player::new(seat.id, seat.label, role_id, role.alignment))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::game::catalog::tests::test_catalog;
    use crate::game::mode::tests::classic_mode;
    use crate::game::types::Alignment;

    fn lite() -> SetupRule {
        SetupRule::Lite {
            cop: "cop".into(),
            vanilla: "vanilla".into(),
            baddie: "wolf".into(),
        }
    }

    fn count(counts: &[(RoleId, usize)], role: &str) -> usize {
        counts
            .iter()
            .find(|(r, _)| r.as_str() == role)
            .map_or(0, |(_, n)| *n)
    }

    #[test]
    fn lite_counts() {
        let c = composition(&lite(), 9).unwrap();
        assert_eq!(count(&c, "cop"), 1);
        assert_eq!(count(&c, "wolf"), 2);
        assert_eq!(count(&c, "vanilla"), 6);

        let c = composition(&lite(), 21).unwrap();
        assert_eq!(count(&c, "cop"), 2);
        assert_eq!(count(&c, "wolf"), 4);
        assert_eq!(count(&c, "vanilla"), 15);
    }

    #[test]
    fn xmas_counts() {
        let rule = SetupRule::Xmas {
            cop: "cop".into(),
            santa: "santa".into(),
            baddie: "wolf".into(),
        };
        let c = composition(&rule, 7).unwrap();
        assert_eq!(count(&c, "cop"), 0);
        assert_eq!(count(&c, "wolf"), 2);
        assert_eq!(count(&c, "santa"), 5);

        let c = composition(&rule, 10).unwrap();
        assert_eq!(count(&c, "cop"), 1);
        assert_eq!(count(&c, "wolf"), 3);
        assert_eq!(count(&c, "santa"), 6);
    }

    #[test]
    fn popcorn_counts() {
        let rule = SetupRule::Popcorn {
            goodie: "vanilla".into(),
            baddie: "wolf".into(),
        };
        assert_eq!(count(&composition(&rule, 3).unwrap(), "wolf"), 1);
        assert_eq!(count(&composition(&rule, 4).unwrap(), "wolf"), 1);
        assert_eq!(count(&composition(&rule, 5).unwrap(), "wolf"), 2);
        assert_eq!(count(&composition(&rule, 9).unwrap(), "wolf"), 3);
    }

    #[test]
    fn fixed_must_add_up() {
        let mode = classic_mode();
        assert_eq!(
            composition(&mode.setup, 4).unwrap_err(),
            SetupError::CountMismatch {
                assigned: 3,
                players: 4
            }
        );
    }

    #[test]
    fn deal_is_seeded() {
        let mode = classic_mode();
        let catalog = test_catalog();
        let seats = || vec![Seat::new("a", "A"), Seat::new("b", "B"), Seat::new("c", "C")];

        let first = deal(&mode, seats(), &catalog, &mut StdRng::seed_from_u64(7)).unwrap();
        let second = deal(&mode, seats(), &catalog, &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first.iter().filter(|p| p.alignment == Alignment::Baddie).count(),
            1
        );
    }

    #[test]
    fn deal_respects_assignments() {
        let mode = classic_mode();
        let catalog = test_catalog();
        let players = deal(
            &mode,
            vec![
                Seat::new("a", "A").with_role("wolf"),
                Seat::new("b", "B").with_role("cop"),
            ],
            &catalog,
            &mut StdRng::seed_from_u64(1),
        )
        .unwrap();
        assert_eq!(players[1].role, RoleId::from("cop"));
        assert_eq!(players[0].alignment, Alignment::Baddie);
    }

    #[test]
    fn deal_rejects_partial_and_small() {
        let mode = classic_mode();
        let catalog = test_catalog();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            deal(
                &mode,
                vec![Seat::new("a", "A").with_role("wolf"), Seat::new("b", "B")],
                &catalog,
                &mut rng
            ),
            Err(SetupError::PartialAssignment { .. })
        ));
        assert!(matches!(
            deal(&mode, vec![Seat::new("a", "A")], &catalog, &mut rng),
            Err(SetupError::TooFewPlayers { .. })
        ));
    }

    #[test]
    fn deal_unknown_role() {
        let mode = classic_mode();
        let catalog = test_catalog();
        assert!(matches!(
            deal(
                &mode,
                vec![Seat::new("a", "A").with_role("seer")],
                &catalog,
                &mut StdRng::seed_from_u64(1)
            ),
            Err(SetupError::Catalog(_))
        ));
    }
}
