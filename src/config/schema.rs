//! Rules file schema.
//!
//! These types mirror the YAML layout one to one. Durations stay as
//! humantime strings here; they are parsed when the document is frozen into
//! [`Rules`](super::Rules).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::game::mode::{EarlyEnd, GunRules, SetupRule, VotePolicy};
use crate::game::types::{ActionKind, Alignment, ItemKind, Phase};

// ============================================================================
// Top-Level Document
// ============================================================================

/// Root of a rules file.
///
/// Both sections are optional in a user file; whatever is present is
/// merged over the built-in rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RulesDocument {
    /// Role definitions keyed by role id.
    #[serde(default)]
    pub roles: BTreeMap<String, RoleSpec>,

    /// Mode definitions keyed by mode id.
    #[serde(default)]
    pub modes: BTreeMap<String, ModeSpec>,
}

// ============================================================================
// Roles
// ============================================================================

/// One role.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleSpec {
    /// Shown by `wolfden roles`
    #[serde(default)]
    pub description: String,

    /// Starting alignment
    pub alignment: Alignment,

    /// Legal action kinds and the phases each is legal in
    #[serde(default)]
    pub actions: BTreeMap<ActionKind, Vec<Phase>>,

    /// Item-triggered role changes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub becomes: Vec<TransitionSpec>,
}

/// `becomes` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransitionSpec {
    /// Triggering item
    pub on_item: ItemKind,

    /// Resulting role id
    pub role: String,
}

// ============================================================================
// Modes
// ============================================================================

/// One mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModeSpec {
    /// Shown by `wolfden modes`
    #[serde(default)]
    pub description: String,

    /// Fewest players a dealt game accepts
    pub min_players: usize,

    /// Phase entered from setup
    #[serde(default = "default_opening_phase")]
    pub opening_phase: Phase,

    /// Day length, e.g. `"10m"`
    #[serde(default = "default_day")]
    pub day: String,

    /// Night length, e.g. `"2m"`
    #[serde(default = "default_night")]
    pub night: String,

    /// Role dealing
    pub setup: SetupRule,

    /// Tally rules per vote kind
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub votes: BTreeMap<ActionKind, VotePolicy>,

    /// Resolution order; defaults to [`ActionKind::ALL`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_order: Option<Vec<ActionKind>>,

    /// Early phase end
    #[serde(default)]
    pub early_end: EarlyEnd,

    /// Win condition names, in evaluation order
    #[serde(default = "default_win_conditions")]
    pub win_conditions: Vec<String>,

    /// A shot at a goodie kills the shooter instead
    #[serde(default)]
    pub shoot_backfire: bool,

    /// Circulating gun rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gun: Option<GunRules>,

    /// Role actions chosen at random for players who submit nothing
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default_actions: Vec<ActionKind>,
}

impl ModeSpec {
    /// Resolution order with the default filled in.
    #[must_use]
    pub fn effective_order(&self) -> Vec<ActionKind> {
        self.resolution_order
            .clone()
            .unwrap_or_else(|| ActionKind::ALL.to_vec())
    }
}

const fn default_opening_phase() -> Phase {
    Phase::Night
}

fn default_day() -> String {
    "10m".to_string()
}

fn default_night() -> String {
    "2m".to_string()
}

fn default_win_conditions() -> Vec<String> {
    vec!["parity".to_string(), "village_cleared".to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_mode_fills_defaults() {
        let yaml = r"
modes:
  tiny:
    min_players: 3
    setup:
      formula: popcorn
      goodie: vanilla
      baddie: wolf
";
        let doc: RulesDocument = serde_yaml::from_str(yaml).unwrap();
        let mode = &doc.modes["tiny"];
        assert_eq!(mode.opening_phase, Phase::Night);
        assert_eq!(mode.day, "10m");
        assert_eq!(mode.win_conditions, vec!["parity", "village_cleared"]);
        assert_eq!(mode.effective_order(), ActionKind::ALL.to_vec());
        assert!(doc.roles.is_empty());
    }

    #[test]
    fn unknown_field_is_rejected() {
        let yaml = "roles:\n  cop:\n    alignment: goodie\n    powers: []\n";
        assert!(serde_yaml::from_str::<RulesDocument>(yaml).is_err());
    }

    #[test]
    fn role_actions_keyed_by_kind() {
        let yaml = r"
roles:
  cop:
    alignment: goodie
    actions:
      check: [night]
      vote_lynch: [day]
";
        let doc: RulesDocument = serde_yaml::from_str(yaml).unwrap();
        let cop = &doc.roles["cop"];
        assert_eq!(cop.actions[&ActionKind::Check], vec![Phase::Night]);
        assert!(cop.becomes.is_empty());
    }
}
