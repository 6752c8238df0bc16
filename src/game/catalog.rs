//! Role catalog.
//!
//! Roles are plain data: an alignment, the actions the role may take in each
//! phase, and optional transitions triggered by receiving an item. The
//! catalog is built once from the rules and shared read-only between games.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::CatalogError;

use super::types::{ActionKind, Alignment, ItemKind, Phase, RoleId};

/// Role replacement triggered by receiving an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleTransition {
    /// Item whose arrival triggers the change.
    pub on_item: ItemKind,
    /// Role the holder becomes.
    pub role: RoleId,
}

/// A role definition.
#[derive(Debug, Clone, Serialize)]
pub struct Role {
    /// Catalog key.
    pub id: RoleId,
    /// Short description shown by `wolfden roles`.
    pub description: String,
    /// Alignment a player starts with when dealt this role.
    pub alignment: Alignment,
    /// Legal action kinds and the phases each is legal in.
    pub actions: BTreeMap<ActionKind, Vec<Phase>>,
    /// Item-triggered role changes.
    pub becomes: Vec<RoleTransition>,
}

/// Outcome of asking whether a player may take an action right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Legal in this phase.
    Allowed,
    /// Legal, but only in another phase.
    WrongPhase,
    /// Neither the role nor any held item grants the action.
    NotPermitted,
}

impl Role {
    /// Whether the role itself permits `kind` during `phase`.
    #[must_use]
    pub fn permits(&self, kind: ActionKind, phase: Phase) -> bool {
        self.actions
            .get(&kind)
            .is_some_and(|phases| phases.contains(&phase))
    }

    /// Action kinds the role grants during `phase`.
    pub fn kinds_in(&self, phase: Phase) -> impl Iterator<Item = ActionKind> + '_ {
        self.actions
            .iter()
            .filter(move |(_, phases)| phases.contains(&phase))
            .map(|(kind, _)| *kind)
    }

    /// Role this one turns into when `item` arrives, if any.
    #[must_use]
    pub fn transition_on(&self, item: ItemKind) -> Option<&RoleId> {
        self.becomes
            .iter()
            .find(|t| t.on_item == item)
            .map(|t| &t.role)
    }

    /// Combines the role's own grants with those of held items.
    #[must_use]
    pub fn capability(&self, items: &[ItemKind], kind: ActionKind, phase: Phase) -> Capability {
        if self.permits(kind, phase) {
            return Capability::Allowed;
        }
        let mut in_other_phase = self.actions.contains_key(&kind);
        for item in items {
            if let Some((granted, phases)) = item.grants()
                && granted == kind
            {
                if phases.contains(&phase) {
                    return Capability::Allowed;
                }
                in_other_phase = true;
            }
        }
        if in_other_phase {
            Capability::WrongPhase
        } else {
            Capability::NotPermitted
        }
    }
}

/// Immutable set of roles keyed by id.
#[derive(Debug, Clone, Default)]
pub struct RoleCatalog {
    roles: BTreeMap<RoleId, Role>,
}

impl RoleCatalog {
    /// Builds a catalog; later duplicates replace earlier ones.
    #[must_use]
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            roles: roles.into_iter().map(|r| (r.id.clone(), r)).collect(),
        }
    }

    /// Looks up a role.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] if the id is unknown.
    pub fn role_of(&self, id: &RoleId) -> Result<&Role, CatalogError> {
        self.roles
            .get(id)
            .ok_or_else(|| CatalogError::NotFound(id.clone()))
    }

    /// Returns `true` if the catalog knows the role.
    #[must_use]
    pub fn contains(&self, id: &RoleId) -> bool {
        self.roles.contains_key(id)
    }

    /// Iterates roles in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.roles.values()
    }

    /// Number of roles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Returns `true` if there are no roles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Closest role id for typo hints.
    #[must_use]
    pub fn suggest(&self, input: &str) -> Option<String> {
        suggest(input, self.roles.keys().map(RoleId::as_str))
    }
}

/// Picks the closest candidate within a Damerau-Levenshtein distance of 3.
pub(crate) fn suggest<'a>(input: &str, candidates: impl Iterator<Item = &'a str>) -> Option<String> {
    candidates
        .map(|c| (c, strsim::damerau_levenshtein(input, c)))
        .filter(|(_, dist)| *dist <= 3)
        .min_by_key(|(_, dist)| *dist)
        .map(|(name, _)| name.to_string())
}
