//! Game modes.
//!
//! A mode is the rule snapshot a game is started with. It is resolved once
//! at `start_game` and never re-read while the game runs.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::types::{ActionKind, Phase, RoleId};

/// How many votes a candidate needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Threshold {
    /// More than half of the living eligible voters.
    #[default]
    Majority,
    /// The most votes, however few.
    Plurality,
}

/// What happens when several candidates share the top count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Nobody is chosen.
    #[default]
    NoElimination,
    /// One of the tied candidates is drawn with the game's seeded RNG.
    Random,
}

/// Tally rules for one vote kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VotePolicy {
    /// Required support.
    pub threshold: Threshold,
    /// Tie handling under [`Threshold::Plurality`].
    pub tie: TieBreak,
}

/// Conditions that end a phase before its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EarlyEnd {
    /// Every living player has submitted every action their role grants.
    pub all_submitted: bool,
    /// A lynch candidate already holds a strict majority.
    pub majority_lynch: bool,
}

/// How a new gun bearer is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GunDistribution {
    /// The `vote_gun` tally picks the bearer. A vote that picks nobody
    /// falls back to a random living goodie.
    #[default]
    Vote,
    /// A random living goodie gets the gun; votes are ignored.
    Random,
}

/// Rules for a single gun that circulates among the goodies.
///
/// Whenever no living player holds a gun at the end of a night, a new
/// bearer is armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GunRules {
    /// Who gets the gun.
    pub distribution: GunDistribution,
    /// A bearer who hits a baddie keeps the gun.
    pub keep_on_hit: bool,
    /// After a backfire the innocent target holds the gun.
    pub pass_on_backfire: bool,
    /// A bearer still holding the gun when the day runs out is modkilled.
    pub bearer_timeout: bool,
}

impl Default for GunRules {
    fn default() -> Self {
        Self {
            distribution: GunDistribution::Vote,
            keep_on_hit: true,
            pass_on_backfire: true,
            bearer_timeout: true,
        }
    }
}

/// Role count in a fixed setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCount {
    /// Role to deal.
    pub role: RoleId,
    /// How many seats get it.
    pub count: usize,
}

/// How roles are dealt for a given number of players.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "formula", rename_all = "snake_case")]
pub enum SetupRule {
    /// `max(1, n/10)` cops, `(n - cops)/4` baddies, the rest vanilla.
    Lite {
        /// Investigator role.
        cop: RoleId,
        /// Plain village role.
        vanilla: RoleId,
        /// Baddie role.
        baddie: RoleId,
    },
    /// Cops only from nine players, `(n - 1)/3` baddies, the rest santas.
    Xmas {
        /// Investigator role.
        cop: RoleId,
        /// Present-giving village role.
        santa: RoleId,
        /// Baddie role.
        baddie: RoleId,
    },
    /// `ceil(n/3)` baddies (one at four players), the rest goodies.
    Popcorn {
        /// Village role.
        goodie: RoleId,
        /// Baddie role.
        baddie: RoleId,
    },
    /// Explicit counts that must add up to the player count.
    Fixed {
        /// Roles and counts.
        roles: Vec<RoleCount>,
    },
}

impl SetupRule {
    /// Every role the rule can deal.
    #[must_use]
    pub fn roles(&self) -> Vec<&RoleId> {
        match self {
            Self::Lite {
                cop,
                vanilla,
                baddie,
            } => vec![cop, vanilla, baddie],
            Self::Xmas { cop, santa, baddie } => vec![cop, santa, baddie],
            Self::Popcorn { goodie, baddie } => vec![goodie, baddie],
            Self::Fixed { roles } => roles.iter().map(|rc| &rc.role).collect(),
        }
    }
}

/// Phase lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTimings {
    /// Day length.
    pub day: Duration,
    /// Night length.
    pub night: Duration,
}

impl PhaseTimings {
    /// Length of `phase`; `None` for phases without a deadline.
    #[must_use]
    pub const fn for_phase(&self, phase: Phase) -> Option<Duration> {
        match phase {
            Phase::Day => Some(self.day),
            Phase::Night => Some(self.night),
            Phase::Setup | Phase::Ended => None,
        }
    }
}

impl Default for PhaseTimings {
    fn default() -> Self {
        Self {
            day: Duration::from_secs(10 * 60),
            night: Duration::from_secs(2 * 60),
        }
    }
}

/// A complete rule set a game can be started with.
#[derive(Debug, Clone)]
pub struct GameMode {
    /// Mode id.
    pub id: String,
    /// Short description.
    pub description: String,
    /// Fewest players the setup rule supports.
    pub min_players: usize,
    /// Phase entered from setup.
    pub opening_phase: Phase,
    /// Default phase lengths.
    pub timings: PhaseTimings,
    /// Role dealing.
    pub setup: SetupRule,
    /// Tally rules per vote kind. Missing kinds use [`VotePolicy::default`].
    pub votes: BTreeMap<ActionKind, VotePolicy>,
    /// Order kinds are resolved in.
    pub resolution_order: Vec<ActionKind>,
    /// Early phase end.
    pub early_end: EarlyEnd,
    /// Win conditions by registered name, in evaluation order.
    pub win_conditions: Vec<String>,
    /// A shot at a goodie kills the shooter instead.
    pub shoot_backfire: bool,
    /// Circulating gun; `None` when guns are plain one-shot items.
    pub gun: Option<GunRules>,
    /// Role actions taken on a random target for players who submit none.
    pub default_actions: Vec<ActionKind>,
}

impl GameMode {
    /// Tally rules for `kind`.
    #[must_use]
    pub fn vote_policy(&self, kind: ActionKind) -> VotePolicy {
        self.votes.get(&kind).copied().unwrap_or_default()
    }

    /// Cycle-0 deadline length for the opening phase.
    #[must_use]
    pub const fn opening_length(&self) -> Option<Duration> {
        self.timings.for_phase(self.opening_phase)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// One wolf, two villagers, default vote policies.
    pub(crate) fn classic_mode() -> GameMode {
        GameMode {
            id: "classic".into(),
            description: "test mode".into(),
            min_players: 3,
            opening_phase: Phase::Night,
            timings: PhaseTimings::default(),
            setup: SetupRule::Fixed {
                roles: vec![
                    RoleCount {
                        role: "wolf".into(),
                        count: 1,
                    },
                    RoleCount {
                        role: "vanilla".into(),
                        count: 2,
                    },
                ],
            },
            votes: BTreeMap::new(),
            resolution_order: ActionKind::ALL.to_vec(),
            early_end: EarlyEnd::default(),
            win_conditions: vec!["parity".into(), "village_cleared".into()],
            shoot_backfire: false,
            gun: None,
            default_actions: Vec::new(),
        }
    }

    #[test]
    fn vote_policy_defaults() {
        let mode = classic_mode();
        assert_eq!(
            mode.vote_policy(ActionKind::VoteLynch),
            VotePolicy {
                threshold: Threshold::Majority,
                tie: TieBreak::NoElimination
            }
        );
    }

    #[test]
    fn setup_rule_yaml_shape() {
        let rule: SetupRule =
            serde_yaml::from_str("formula: popcorn\ngoodie: villager\nbaddie: wolf\n").unwrap();
        assert_eq!(
            rule,
            SetupRule::Popcorn {
                goodie: "villager".into(),
                baddie: "wolf".into()
            }
        );
        assert_eq!(rule.roles().len(), 2);
    }

    #[test]
    fn gun_rules_fill_defaults() {
        let gun: GunRules = serde_yaml::from_str("distribution: random\n").unwrap();
        assert_eq!(gun.distribution, GunDistribution::Random);
        assert!(gun.keep_on_hit && gun.pass_on_backfire && gun.bearer_timeout);

        let gun: GunRules = serde_yaml::from_str("bearer_timeout: false\n").unwrap();
        assert_eq!(gun.distribution, GunDistribution::Vote);
        assert!(!gun.bearer_timeout);
    }

    #[test]
    fn timings_per_phase() {
        let t = PhaseTimings::default();
        assert_eq!(t.for_phase(Phase::Day), Some(Duration::from_secs(600)));
        assert_eq!(t.for_phase(Phase::Ended), None);
    }
}
