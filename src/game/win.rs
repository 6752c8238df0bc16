//! Win conditions.
//!
//! Conditions are registered by name; a mode lists the names it uses and
//! the evaluator checks them in that order. The first one that reports a
//! winner ends the game.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::ConfigError;

use super::catalog::suggest;
use super::machine::Game;
use super::types::Alignment;

/// A predicate over game state that may declare a winner.
pub trait WinCondition: Send + Sync + fmt::Debug {
    /// Registry name.
    fn name(&self) -> &str;

    /// Winning alignment, or `None` while the game should continue.
    fn evaluate(&self, game: &Game) -> Option<Alignment>;
}

/// Baddies win once they are at least as many as the goodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct Parity;

impl WinCondition for Parity {
    fn name(&self) -> &str {
        "parity"
    }

    fn evaluate(&self, game: &Game) -> Option<Alignment> {
        let roster = game.roster();
        let baddies = roster.living_with_alignment(Alignment::Baddie);
        let goodies = roster.living_with_alignment(Alignment::Goodie);
        (baddies > 0 && baddies >= goodies).then_some(Alignment::Baddie)
    }
}

/// Goodies win once no baddie is alive.
#[derive(Debug, Clone, Copy, Default)]
pub struct VillageCleared;

impl WinCondition for VillageCleared {
    fn name(&self) -> &str {
        "village_cleared"
    }

    fn evaluate(&self, game: &Game) -> Option<Alignment> {
        (game.roster().living_with_alignment(Alignment::Baddie) == 0).then_some(Alignment::Goodie)
    }
}

/// Named win conditions available to modes.
#[derive(Debug, Clone)]
pub struct WinConditionRegistry {
    conditions: BTreeMap<String, Arc<dyn WinCondition>>,
}

impl Default for WinConditionRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(Parity));
        registry.register(Arc::new(VillageCleared));
        registry
    }
}

impl WinConditionRegistry {
    /// A registry with nothing in it.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            conditions: BTreeMap::new(),
        }
    }

    /// Adds or replaces a condition under its own name.
    pub fn register(&mut self, condition: Arc<dyn WinCondition>) {
        self.conditions
            .insert(condition.name().to_owned(), condition);
    }

    /// Registered names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.conditions.keys().map(String::as_str)
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.conditions.contains_key(name)
    }

    /// Builds an evaluator for the given names, in order.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownReference`] for an unregistered name.
    pub fn evaluator(&self, names: &[String]) -> Result<WinEvaluator, ConfigError> {
        let conditions = names
            .iter()
            .map(|name| {
                self.conditions
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ConfigError::UnknownReference {
                        kind: "win condition",
                        name: name.clone(),
                        suggestion: suggest(name, self.names()),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(WinEvaluator { conditions })
    }
}

/// Ordered conditions for one game.
#[derive(Debug, Clone)]
pub struct WinEvaluator {
    conditions: Vec<Arc<dyn WinCondition>>,
}

impl WinEvaluator {
    /// First winner in registration order, with the deciding condition's name.
    #[must_use]
    pub fn evaluate(&self, game: &Game) -> Option<(Alignment, &str)> {
        self.conditions
            .iter()
            .find_map(|c| c.evaluate(game).map(|winner| (winner, c.name())))
    }
}
