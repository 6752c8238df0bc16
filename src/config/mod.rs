//! Rules configuration.
//!
//! Roles and modes come from YAML: the embedded built-in rules, optionally
//! overlaid with a user file. Once loaded they are frozen into [`Rules`]
//! and shared read-only between games.

pub mod loader;
pub mod schema;
pub mod validation;

use std::collections::BTreeMap;
use std::sync::Arc;

pub use loader::{
    BUILTIN_SOURCE, ConfigLimits, LoadResult, LoadWarning, LoaderOptions, RulesLoader,
};
pub use schema::{ModeSpec, RoleSpec, RulesDocument, TransitionSpec};
pub use validation::{ValidationResult, Validator};

use crate::error::ConfigError;
use crate::game::catalog::{Role, RoleCatalog, RoleTransition, suggest};
use crate::game::mode::{GameMode, PhaseTimings};
use crate::game::replay::ReplayRules;
use crate::game::win::WinConditionRegistry;
use crate::game::types::RoleId;

/// A frozen role catalog plus the modes games can be started with.
#[derive(Debug, Clone)]
pub struct Rules {
    catalog: Arc<RoleCatalog>,
    modes: BTreeMap<String, Arc<GameMode>>,
}

impl Rules {
    /// The embedded rules on their own.
    ///
    /// # Errors
    ///
    /// Only if the embedded rules are broken.
    pub fn builtin() -> Result<Self, ConfigError> {
        RulesLoader::default()
            .load_builtin()
            .map(|loaded| Arc::unwrap_or_clone(loaded.rules))
    }

    /// Converts an already validated document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidValue`] for a phase length that is not a
    /// humantime duration.
    pub fn from_document(doc: &RulesDocument) -> Result<Self, ConfigError> {
        let roles = doc.roles.iter().map(|(id, spec)| Role {
            id: RoleId::from(id.as_str()),
            description: spec.description.clone(),
            alignment: spec.alignment,
            actions: spec.actions.clone(),
            becomes: spec
                .becomes
                .iter()
                .map(|t| RoleTransition {
                    on_item: t.on_item,
                    role: RoleId::from(t.role.as_str()),
                })
                .collect(),
        });

        let modes: BTreeMap<String, Arc<GameMode>> = doc
            .modes
            .iter()
            .map(|(id, spec)| {
                let timings = PhaseTimings {
                    day: parse_duration(&format!("modes.{id}.day"), &spec.day)?,
                    night: parse_duration(&format!("modes.{id}.night"), &spec.night)?,
                };
                let mode = GameMode {
                    id: id.clone(),
                    description: spec.description.clone(),
                    min_players: spec.min_players,
                    opening_phase: spec.opening_phase,
                    timings,
                    setup: spec.setup.clone(),
                    votes: spec.votes.clone(),
                    resolution_order: spec.effective_order(),
                    early_end: spec.early_end,
                    win_conditions: spec.win_conditions.clone(),
                    shoot_backfire: spec.shoot_backfire,
                    gun: spec.gun,
                    default_actions: spec.default_actions.clone(),
                };
                Ok((id.clone(), Arc::new(mode)))
            })
            .collect::<Result<_, ConfigError>>()?;

        Ok(Self {
            catalog: Arc::new(RoleCatalog::new(roles)),
            modes,
        })
    }

    /// Looks up a mode by id.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownReference`] with the closest id as a hint.
    pub fn mode(&self, id: &str) -> Result<Arc<GameMode>, ConfigError> {
        self.modes
            .get(id)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownReference {
                kind: "mode",
                name: id.to_string(),
                suggestion: suggest(id, self.modes.keys().map(String::as_str)),
            })
    }

    /// Everything needed to rerun a report played in `mode`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownReference`] for an unknown mode or an
    /// unregistered win condition.
    pub fn replay_rules(
        &self,
        mode: &str,
        conditions: &WinConditionRegistry,
    ) -> Result<ReplayRules, ConfigError> {
        let mode = self.mode(mode)?;
        Ok(ReplayRules {
            win: conditions.evaluator(&mode.win_conditions)?,
            catalog: self.catalog(),
            mode,
        })
    }

    /// Shared role catalog.
    #[must_use]
    pub fn catalog(&self) -> Arc<RoleCatalog> {
        Arc::clone(&self.catalog)
    }

    /// Modes in id order.
    pub fn modes(&self) -> impl Iterator<Item = &GameMode> {
        self.modes.values().map(AsRef::as_ref)
    }

    /// Roles in id order.
    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.catalog.iter()
    }
}

fn parse_duration(field: &str, value: &str) -> Result<std::time::Duration, ConfigError> {
    humantime::parse_duration(value.trim()).map_err(|e| ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        expected: format!("a duration such as 90s or 2m ({e})"),
    })
}
