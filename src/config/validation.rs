//! Rules validation.
//!
//! Runs on the merged [`RulesDocument`] and collects every issue instead of
//! stopping at the first, so one `wolfden validate` run reports them all.

use std::collections::BTreeSet;

use crate::config::loader::ConfigLimits;
use crate::config::schema::{ModeSpec, RoleSpec, RulesDocument};
use crate::error::{Severity, ValidationIssue};
use crate::game::catalog::suggest;
use crate::game::mode::{GunDistribution, SetupRule, Threshold, TieBreak};
use crate::game::setup::composition;
use crate::game::types::{ActionKind, ItemKind};
use crate::game::win::WinConditionRegistry;

// ============================================================================
// Public API
// ============================================================================

/// Issues found in one document.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Issues that prevent loading.
    pub errors: Vec<ValidationIssue>,

    /// Informational issues.
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if there are no errors.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Rules validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates `doc` against `limits`, resolving win condition names in
    /// `conditions`.
    pub fn validate(
        &mut self,
        doc: &RulesDocument,
        limits: &ConfigLimits,
        conditions: &WinConditionRegistry,
    ) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        self.validate_limits(doc, limits);

        if doc.roles.is_empty() {
            self.add_error("roles", "At least one role is required");
        }
        if doc.modes.is_empty() {
            self.add_error("modes", "At least one mode is required");
        }

        for (id, role) in &doc.roles {
            self.validate_role(doc, id, role);
        }
        for (id, mode) in &doc.modes {
            self.validate_mode(doc, id, mode, conditions);
        }

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    // ========================================================================
    // Roles
    // ========================================================================

    fn validate_role(&mut self, doc: &RulesDocument, id: &str, role: &RoleSpec) {
        let base = format!("roles.{id}");
        if id.trim().is_empty() {
            self.add_error(&base, "Role id cannot be empty");
        }
        if role.actions.is_empty() {
            self.add_warning(
                &format!("{base}.actions"),
                "Role grants no actions; its players can only be acted upon",
            );
        }

        for (kind, phases) in &role.actions {
            let path = format!("{base}.actions.{kind}");
            if phases.is_empty() {
                self.add_error(&path, "Action lists no phases");
            }
            for phase in phases {
                if !phase.is_playable() {
                    self.add_error(
                        &path,
                        &format!("Phase '{phase}' is not playable; use night or day"),
                    );
                }
            }
            let unique: BTreeSet<_> = phases.iter().collect();
            if unique.len() != phases.len() {
                self.add_warning(&path, "Phase listed more than once");
            }
        }

        let mut seen_items = BTreeSet::new();
        for (index, transition) in role.becomes.iter().enumerate() {
            let path = format!("{base}.becomes[{index}]");
            if !seen_items.insert(transition.on_item) {
                self.add_error(
                    &path,
                    &format!("Second transition for item '{}'", transition.on_item),
                );
            }
            if transition.role == id {
                self.add_warning(&path, "Role transitions into itself");
            }
            self.check_role_ref(doc, &format!("{path}.role"), &transition.role);
        }
    }

    // ========================================================================
    // Modes
    // ========================================================================

    fn validate_mode(
        &mut self,
        doc: &RulesDocument,
        id: &str,
        mode: &ModeSpec,
        conditions: &WinConditionRegistry,
    ) {
        let base = format!("modes.{id}");
        if mode.min_players == 0 {
            self.add_error(&format!("{base}.min_players"), "Must be at least 1");
        }
        if !mode.opening_phase.is_playable() {
            self.add_error(
                &format!("{base}.opening_phase"),
                &format!("Phase '{}' is not playable; use night or day", mode.opening_phase),
            );
        }
        self.validate_duration(&mode.day, &format!("{base}.day"));
        self.validate_duration(&mode.night, &format!("{base}.night"));

        self.validate_setup(doc, &base, mode);
        self.validate_votes(&base, mode);
        self.validate_order(doc, &base, mode);

        if mode.win_conditions.is_empty() {
            self.add_error(
                &format!("{base}.win_conditions"),
                "At least one win condition is required",
            );
        }
        for (index, name) in mode.win_conditions.iter().enumerate() {
            if !conditions.contains(name) {
                let hint = suggest(name, conditions.names())
                    .map(|s| format!(" (did you mean '{s}'?)"))
                    .unwrap_or_default();
                self.add_error(
                    &format!("{base}.win_conditions[{index}]"),
                    &format!("Unknown win condition '{name}'{hint}"),
                );
            }
        }

        if mode.shoot_backfire && !used_kinds(doc, mode).contains(&ActionKind::Shoot) {
            self.add_warning(
                &format!("{base}.shoot_backfire"),
                "No dealt role can ever obtain a gun",
            );
        }
        self.validate_gun(doc, &base, mode);
        self.validate_default_actions(doc, &base, mode);
    }

    fn validate_gun(&mut self, doc: &RulesDocument, base: &str, mode: &ModeSpec) {
        let Some(gun) = mode.gun else {
            return;
        };
        let path = format!("{base}.gun");
        if gun.distribution == GunDistribution::Vote
            && !used_kinds(doc, mode).contains(&ActionKind::VoteGun)
        {
            self.add_warning(
                &format!("{path}.distribution"),
                "No dealt role votes on the gun; it will always be dealt at random",
            );
        }
        if gun.pass_on_backfire && !mode.shoot_backfire {
            self.add_warning(
                &format!("{path}.pass_on_backfire"),
                "Has no effect unless shoot_backfire is set",
            );
        }
    }

    fn validate_default_actions(&mut self, doc: &RulesDocument, base: &str, mode: &ModeSpec) {
        let used = used_kinds(doc, mode);
        for (index, kind) in mode.default_actions.iter().enumerate() {
            let path = format!("{base}.default_actions[{index}]");
            if kind.is_vote() || !kind.requires_target() {
                self.add_error(
                    &path,
                    &format!("'{kind}' cannot be taken at random; only targeted role actions can"),
                );
            } else if !used.contains(kind) {
                self.add_warning(&path, &format!("No dealt role can {kind}"));
            }
        }
    }

    fn validate_setup(&mut self, doc: &RulesDocument, base: &str, mode: &ModeSpec) {
        let path = format!("{base}.setup");
        for role in mode.setup.roles() {
            self.check_role_ref(doc, &path, role.as_str());
        }

        if let SetupRule::Fixed { roles } = &mode.setup {
            let total: usize = roles.iter().map(|rc| rc.count).sum();
            if total == 0 {
                self.add_error(&path, "Fixed setup deals no roles");
            } else if mode.min_players > total {
                self.add_error(
                    &format!("{base}.min_players"),
                    &format!("Fixed setup deals exactly {total} roles; {} can never start", mode.min_players),
                );
            } else if mode.min_players < total {
                self.add_warning(
                    &format!("{base}.min_players"),
                    &format!("Fixed setup needs exactly {total} players"),
                );
            }
            return;
        }

        if mode.min_players == 0 {
            return;
        }
        let Ok(counts) = composition(&mode.setup, mode.min_players) else {
            return;
        };
        let baddies: usize = counts
            .iter()
            .filter(|(role, _)| {
                doc.roles
                    .get(role.as_str())
                    .is_some_and(|r| r.alignment == crate::game::types::Alignment::Baddie)
            })
            .map(|(_, n)| n)
            .sum();
        if baddies == 0 {
            self.add_warning(
                &format!("{base}.min_players"),
                &format!("No baddie is dealt at {} players", mode.min_players),
            );
        }
    }

    fn validate_votes(&mut self, base: &str, mode: &ModeSpec) {
        for (kind, policy) in &mode.votes {
            let path = format!("{base}.votes.{kind}");
            if !kind.is_vote() {
                self.add_error(&path, &format!("'{kind}' is not a vote kind"));
            }
            if policy.threshold == Threshold::Majority && policy.tie == TieBreak::Random {
                self.add_warning(
                    &path,
                    "Tie-break only applies to plurality votes; a majority cannot tie",
                );
            }
        }
    }

    fn validate_order(&mut self, doc: &RulesDocument, base: &str, mode: &ModeSpec) {
        let path = format!("{base}.resolution_order");
        let order = mode.effective_order();
        let listed: BTreeSet<ActionKind> = order.iter().copied().collect();
        if listed.len() != order.len() {
            self.add_error(&path, "Action kind listed more than once");
        }
        for kind in used_kinds(doc, mode) {
            if !listed.contains(&kind) {
                self.add_error(
                    &path,
                    &format!("'{kind}' can be submitted in this mode but is never resolved"),
                );
            }
        }
    }

    // ========================================================================
    // Shared Checks
    // ========================================================================

    fn check_role_ref(&mut self, doc: &RulesDocument, path: &str, role: &str) {
        if doc.roles.contains_key(role) {
            return;
        }
        let hint = suggest(role, doc.roles.keys().map(String::as_str))
            .map(|s| format!(" (did you mean '{s}'?)"))
            .unwrap_or_default();
        self.add_error(path, &format!("Unknown role '{role}'{hint}"));
    }

    /// Validates a humantime duration string such as `"10m"` or `"90s"`.
    fn validate_duration(&mut self, duration: &str, path: &str) {
        let trimmed = duration.trim();
        if trimmed.is_empty() {
            self.add_error(path, "Duration cannot be empty");
            return;
        }
        match humantime::parse_duration(trimmed) {
            Ok(d) if d.is_zero() => self.add_error(path, "Duration must be greater than zero"),
            Ok(_) => {}
            Err(e) => self.add_error(
                path,
                &format!("Invalid duration '{duration}': {e}. Expected e.g. 90s, 2m, 1h"),
            ),
        }
    }

    fn validate_limits(&mut self, doc: &RulesDocument, limits: &ConfigLimits) {
        if doc.roles.len() > limits.max_roles {
            self.add_error(
                "roles",
                &format!(
                    "Too many roles: {} (maximum: {}). \
                     Set WOLFDEN_MAX_ROLES to increase the limit.",
                    doc.roles.len(),
                    limits.max_roles
                ),
            );
        }
        if doc.modes.len() > limits.max_modes {
            self.add_error(
                "modes",
                &format!(
                    "Too many modes: {} (maximum: {}). \
                     Set WOLFDEN_MAX_MODES to increase the limit.",
                    doc.modes.len(),
                    limits.max_modes
                ),
            );
        }
    }

    // ========================================================================
    // Helper Methods
    // ========================================================================

    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Kinds a player dealt into `mode` can end up submitting, directly or
/// through items that reach them.
fn used_kinds(doc: &RulesDocument, mode: &ModeSpec) -> BTreeSet<ActionKind> {
    let mut roles: Vec<&str> = mode.setup.roles().into_iter().map(|r| r.as_str()).collect();
    let mut seen = BTreeSet::new();
    let mut kinds = BTreeSet::new();
    while let Some(id) = roles.pop() {
        if !seen.insert(id) {
            continue;
        }
        let Some(role) = doc.roles.get(id) else {
            continue;
        };
        kinds.extend(role.actions.keys().copied());
        roles.extend(role.becomes.iter().map(|t| t.role.as_str()));
    }

    let mut items = BTreeSet::new();
    if kinds.contains(&ActionKind::GiveItem) {
        items.insert(ItemKind::Present);
        items.extend(ItemKind::PRESENT_CONTENTS);
    }
    if kinds.contains(&ActionKind::VoteGun) || mode.gun.is_some() {
        items.insert(ItemKind::Gun);
    }
    kinds.extend(items.into_iter().filter_map(|i| i.grants()).map(|(k, _)| k));
    kinds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TransitionSpec;
    use crate::game::types::{Alignment, Phase};

    fn parse(yaml: &str) -> RulesDocument {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn run(doc: &RulesDocument) -> ValidationResult {
        Validator::new().validate(
            doc,
            &ConfigLimits::default(),
            &WinConditionRegistry::default(),
        )
    }

    const BASE: &str = r"
roles:
  vanilla:
    alignment: goodie
    actions:
      vote_lynch: [day]
  wolf:
    alignment: baddie
    actions:
      vote_lynch: [day]
      vote_nightkill: [night]
modes:
  tiny:
    min_players: 3
    setup:
      formula: popcorn
      goodie: vanilla
      baddie: wolf
";

    #[test]
    fn valid_document_has_no_issues() {
        let result = run(&parse(BASE));
        assert!(result.is_valid(), "{:?}", result.errors);
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    }

    #[test]
    fn unknown_setup_role_suggests_match() {
        let yaml = BASE.replace("baddie: wolf", "baddie: wolff");
        let result = run(&parse(&yaml));
        assert!(result.has_errors());
        assert!(
            result.errors[0].message.contains("did you mean 'wolf'"),
            "{}",
            result.errors[0]
        );
        assert_eq!(result.errors[0].path, "modes.tiny.setup");
    }

    #[test]
    fn repeated_phase_only_warns() {
        let mut doc = parse(BASE);
        doc.roles
            .get_mut("wolf")
            .unwrap()
            .actions
            .insert(ActionKind::VoteLynch, vec![Phase::Day, Phase::Day]);
        let result = run(&doc);
        assert!(result.is_valid(), "{:?}", result.errors);
        assert!(
            result
                .warnings
                .iter()
                .any(|w| w.path.starts_with("roles.wolf") && w.message.contains("more than once")),
            "{:?}",
            result.warnings
        );
    }

    #[test]
    fn collects_every_error() {
        let mut doc = parse(BASE);
        let tiny = doc.modes.get_mut("tiny").unwrap();
        tiny.day = "soon".into();
        tiny.night = "0s".into();
        tiny.win_conditions = vec!["paritee".into()];
        let result = run(&doc);
        let paths: Vec<_> = result.errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "modes.tiny.day",
                "modes.tiny.night",
                "modes.tiny.win_conditions[0]"
            ]
        );
        assert!(result.errors[2].message.contains("did you mean 'parity'"));
    }

    #[test]
    fn resolution_order_must_cover_item_kinds() {
        let mut doc = parse(BASE);
        doc.roles.insert(
            "santa".into(),
            RoleSpec {
                description: String::new(),
                alignment: Alignment::Goodie,
                actions: [(ActionKind::GiveItem, vec![Phase::Night])].into(),
                becomes: Vec::new(),
            },
        );
        let tiny = doc.modes.get_mut("tiny").unwrap();
        tiny.setup = SetupRule::Popcorn {
            goodie: "santa".into(),
            baddie: "wolf".into(),
        };
        tiny.resolution_order = Some(vec![
            ActionKind::GiveItem,
            ActionKind::VoteNightkill,
            ActionKind::VoteLynch,
        ]);
        let result = run(&doc);
        let missing: Vec<_> = result
            .errors
            .iter()
            .filter(|e| e.message.contains("never resolved"))
            .map(|e| e.message.split('\'').nth(1).unwrap().to_string())
            .collect();
        assert_eq!(missing, vec!["check", "shoot", "open_present"]);
    }

    #[test]
    fn vote_policy_on_direct_kind_is_error() {
        let yaml = format!("{BASE}    votes:\n      shoot:\n        threshold: plurality\n");
        let result = run(&parse(&yaml));
        assert!(result.errors.iter().any(|e| e.path == "modes.tiny.votes.shoot"));
    }

    #[test]
    fn transition_to_unknown_role() {
        let mut doc = parse(BASE);
        doc.roles.get_mut("vanilla").unwrap().becomes.push(TransitionSpec {
            on_item: ItemKind::Magnifier,
            role: "cop".into(),
        });
        let result = run(&doc);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "roles.vanilla.becomes[0].role");
    }

    #[test]
    fn fixed_setup_larger_than_min_players_warns() {
        let yaml = r"
roles:
  vanilla:
    alignment: goodie
    actions: { vote_lynch: [day] }
  wolf:
    alignment: baddie
    actions: { vote_nightkill: [night] }
modes:
  fixed:
    min_players: 2
    setup:
      formula: fixed
      roles:
        - { role: vanilla, count: 2 }
        - { role: wolf, count: 1 }
";
        let result = run(&parse(yaml));
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].path, "modes.fixed.min_players");
    }

    #[test]
    fn limits_are_enforced() {
        let limits = ConfigLimits {
            max_roles: 1,
            ..ConfigLimits::default()
        };
        let result = Validator::new().validate(
            &parse(BASE),
            &limits,
            &WinConditionRegistry::default(),
        );
        assert!(result.errors[0].message.contains("WOLFDEN_MAX_ROLES"));
    }

    #[test]
    fn default_actions_must_be_targeted_role_actions() {
        let yaml = format!("{BASE}    default_actions: [vote_lynch, open_present, check]\n");
        let result = run(&parse(&yaml));
        let paths: Vec<&str> = result.errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["modes.tiny.default_actions[0]", "modes.tiny.default_actions[1]"]
        );
        assert!(
            result
                .warnings
                .iter()
                .any(|w| w.path == "modes.tiny.default_actions[2]")
        );
    }

    #[test]
    fn gun_without_gun_votes_warns() {
        let yaml = format!("{BASE}    shoot_backfire: true\n    gun:\n      distribution: vote\n");
        let result = run(&parse(&yaml));
        assert!(result.is_valid(), "{:?}", result.errors);
        let paths: Vec<&str> = result.warnings.iter().map(|w| w.path.as_str()).collect();
        assert_eq!(paths, vec!["modes.tiny.gun.distribution"]);

        let yaml = format!("{BASE}    gun:\n      distribution: random\n");
        let result = run(&parse(&yaml));
        let paths: Vec<&str> = result.warnings.iter().map(|w| w.path.as_str()).collect();
        assert_eq!(paths, vec!["modes.tiny.gun.pass_on_backfire"]);
    }

    #[test]
    fn unplayable_phase_is_error() {
        let yaml = BASE.replace("vote_lynch: [day]\n  wolf", "vote_lynch: [ended]\n  wolf");
        let result = run(&parse(&yaml));
        assert!(
            result
                .errors
                .iter()
                .any(|e| e.path == "roles.vanilla.actions.vote_lynch")
        );
    }
}
