//! Shared vocabulary for the game engine.
//!
//! Identifiers are opaque strings supplied by the transport. Enums use
//! snake_case on the wire so rules files and logs read the same way.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Returns the raw identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Chat channel (or any other venue) that hosts at most one live game.
    ArenaId
);
string_id!(
    /// Opaque player identity supplied by the transport.
    ActorId
);
string_id!(
    /// Key into the role catalog.
    RoleId
);

// ============================================================================
// Alignment
// ============================================================================

/// Team a player wins with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    /// The village.
    Goodie,
    /// The wolves.
    Baddie,
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Goodie => "goodie",
            Self::Baddie => "baddie",
        })
    }
}

// ============================================================================
// Phase
// ============================================================================

/// Phase of the game state machine.
///
/// `Setup -> (Night <-> Day) -> Ended`; `Ended` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Roster dealt, first phase not yet entered.
    Setup,
    /// Night: hidden actions.
    Night,
    /// Day: public discussion and lynch votes.
    Day,
    /// Terminal.
    Ended,
}

impl Phase {
    /// Whether the state machine allows moving from `self` to `to`.
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Setup, Self::Night | Self::Day)
                | (Self::Night, Self::Day | Self::Ended)
                | (Self::Day, Self::Night | Self::Ended)
        )
    }

    /// Returns `true` for the two playable phases.
    #[must_use]
    pub const fn is_playable(self) -> bool {
        matches!(self, Self::Night | Self::Day)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Setup => "setup",
            Self::Night => "night",
            Self::Day => "day",
            Self::Ended => "ended",
        })
    }
}

// ============================================================================
// Action kinds
// ============================================================================

/// Something a player can submit during a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Day vote to lynch a player.
    VoteLynch,
    /// Night vote among baddies for a kill.
    VoteNightkill,
    /// Night vote among baddies choosing who receives the gun.
    VoteGun,
    /// Learn a target's alignment.
    Check,
    /// Fire a held gun.
    Shoot,
    /// Hand a present to another player.
    GiveItem,
    /// Open a held present.
    OpenPresent,
}

impl ActionKind {
    /// Every action kind, in default resolution order.
    pub const ALL: [Self; 7] = [
        Self::Check,
        Self::GiveItem,
        Self::OpenPresent,
        Self::VoteGun,
        Self::VoteNightkill,
        Self::Shoot,
        Self::VoteLynch,
    ];

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::VoteLynch => "vote_lynch",
            Self::VoteNightkill => "vote_nightkill",
            Self::VoteGun => "vote_gun",
            Self::Check => "check",
            Self::Shoot => "shoot",
            Self::GiveItem => "give_item",
            Self::OpenPresent => "open_present",
        }
    }

    /// Votes are tallied together; everything else resolves one by one.
    #[must_use]
    pub const fn is_vote(self) -> bool {
        matches!(self, Self::VoteLynch | Self::VoteNightkill | Self::VoteGun)
    }

    /// Whether a submission must name a target.
    #[must_use]
    pub const fn requires_target(self) -> bool {
        !matches!(self, Self::OpenPresent)
    }

    /// Self-lynch votes are legal; nothing else may target its actor.
    #[must_use]
    pub const fn allows_self_target(self) -> bool {
        matches!(self, Self::VoteLynch)
    }

    /// Kinds whose target must not share the actor's alignment.
    #[must_use]
    pub const fn excludes_own_alignment(self) -> bool {
        matches!(self, Self::VoteNightkill | Self::VoteGun)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown action kind '{s}'"))
    }
}

// ============================================================================
// Items
// ============================================================================

/// Items a player can hold. Some of them grant an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Opens into one of [`ItemKind::PRESENT_CONTENTS`].
    Present,
    /// One shot during the day.
    Gun,
    /// One check during the night.
    Magnifier,
    /// Kills whoever unwraps it.
    Bomb,
    /// Absorbs one non-lynch death.
    Angel,
}

impl ItemKind {
    /// What a present can turn into.
    pub const PRESENT_CONTENTS: [Self; 4] = [Self::Gun, Self::Magnifier, Self::Bomb, Self::Angel];

    /// The action this item lets its holder take, and when.
    #[must_use]
    pub const fn grants(self) -> Option<(ActionKind, &'static [Phase])> {
        match self {
            Self::Gun => Some((ActionKind::Shoot, &[Phase::Day])),
            Self::Magnifier => Some((ActionKind::Check, &[Phase::Night])),
            Self::Present => Some((ActionKind::OpenPresent, &[Phase::Night, Phase::Day])),
            Self::Bomb | Self::Angel => None,
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Present => "present",
            Self::Gun => "gun",
            Self::Magnifier => "magnifier",
            Self::Bomb => "bomb",
            Self::Angel => "angel",
        })
    }
}

/// How a player died.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathCause {
    /// Day vote.
    Lynch,
    /// Night vote.
    NightKill,
    /// Gunfire, including a backfire.
    Shot,
    /// Unwrapped a bomb.
    Bomb,
    /// Removed by a moderator.
    Modkill,
}

impl fmt::Display for DeathCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Lynch => "lynch",
            Self::NightKill => "night kill",
            Self::Shot => "shot",
            Self::Bomb => "bomb",
            Self::Modkill => "modkill",
        })
    }
}
