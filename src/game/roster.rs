//! Players and the roster.
//!
//! The roster keeps players in seating order and never removes anyone; a
//! death only clears the `alive` flag. Every mutator refuses to touch a dead
//! player so double deaths surface as [`RosterError::AlreadyDead`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{RosterError, SetupError};

use super::log::Effect;
use super::types::{ActorId, Alignment, DeathCause, ItemKind, RoleId};

/// A seat at the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Transport-supplied identity.
    pub id: ActorId,
    /// Display name.
    pub label: String,
    /// Current role.
    pub role: RoleId,
    /// Current team.
    pub alignment: Alignment,
    /// Whether the player can still act and be targeted.
    pub alive: bool,
    /// Set once, when the player dies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub death: Option<DeathCause>,
    /// Held items, in order received.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<ItemKind>,
}

impl Player {
    /// A living player with no items.
    #[must_use]
    pub fn new(id: ActorId, label: impl Into<String>, role: RoleId, alignment: Alignment) -> Self {
        Self {
            id,
            label: label.into(),
            role,
            alignment,
            alive: true,
            death: None,
            items: Vec::new(),
        }
    }

    /// Whether the player holds at least one `item`.
    #[must_use]
    pub fn holds(&self, item: ItemKind) -> bool {
        self.items.contains(&item)
    }
}

/// Ordered set of players in one game.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    players: Vec<Player>,
    index: HashMap<ActorId, usize>,
}

impl Roster {
    /// Builds a roster, rejecting duplicate ids.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::DuplicatePlayer`] if an id appears twice.
    pub fn new(players: Vec<Player>) -> Result<Self, SetupError> {
        let mut index = HashMap::with_capacity(players.len());
        for (i, p) in players.iter().enumerate() {
            if index.insert(p.id.clone(), i).is_some() {
                return Err(SetupError::DuplicatePlayer(p.id.clone()));
            }
        }
        Ok(Self { players, index })
    }

    /// All players in seating order, dead ones included.
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    /// Living players in seating order.
    pub fn alive(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.alive)
    }

    /// Looks up a player.
    #[must_use]
    pub fn by_id(&self, id: &ActorId) -> Option<&Player> {
        self.index.get(id).map(|&i| &self.players[i])
    }

    /// Whether `id` is in the roster and alive.
    #[must_use]
    pub fn is_alive(&self, id: &ActorId) -> bool {
        self.by_id(id).is_some_and(|p| p.alive)
    }

    /// Number of living players on `alignment`.
    #[must_use]
    pub fn living_with_alignment(&self, alignment: Alignment) -> usize {
        self.alive().filter(|p| p.alignment == alignment).count()
    }

    /// Number of seats.
    #[must_use]
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Returns `true` for an empty roster.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    fn living_mut(&mut self, id: &ActorId) -> Result<&mut Player, RosterError> {
        let &i = self
            .index
            .get(id)
            .ok_or_else(|| RosterError::UnknownPlayer(id.clone()))?;
        let player = &mut self.players[i];
        if !player.alive {
            return Err(RosterError::AlreadyDead(id.clone()));
        }
        Ok(player)
    }

    /// Kills a living player.
    ///
    /// # Errors
    ///
    /// [`RosterError::AlreadyDead`] on a double death.
    pub fn apply_death(&mut self, id: &ActorId, cause: DeathCause) -> Result<(), RosterError> {
        let player = self.living_mut(id)?;
        player.alive = false;
        player.death = Some(cause);
        Ok(())
    }

    /// Moves a living player to another team.
    ///
    /// # Errors
    ///
    /// Fails if the player is unknown or dead.
    pub fn apply_alignment_change(
        &mut self,
        id: &ActorId,
        alignment: Alignment,
    ) -> Result<(), RosterError> {
        self.living_mut(id)?.alignment = alignment;
        Ok(())
    }

    /// Replaces a living player's role.
    ///
    /// # Errors
    ///
    /// Fails if the player is unknown or dead.
    pub fn apply_role_change(&mut self, id: &ActorId, role: RoleId) -> Result<(), RosterError> {
        self.living_mut(id)?.role = role;
        Ok(())
    }

    /// Gives a living player an item from nowhere.
    ///
    /// # Errors
    ///
    /// Fails if the player is unknown or dead.
    pub fn grant_item(&mut self, id: &ActorId, item: ItemKind) -> Result<(), RosterError> {
        self.living_mut(id)?.items.push(item);
        Ok(())
    }

    /// Removes one `item` from a living player.
    ///
    /// # Errors
    ///
    /// [`RosterError::MissingItem`] if the player does not hold it.
    pub fn consume_item(&mut self, id: &ActorId, item: ItemKind) -> Result<(), RosterError> {
        let player = self.living_mut(id)?;
        let pos = player
            .items
            .iter()
            .position(|&i| i == item)
            .ok_or_else(|| RosterError::MissingItem {
                actor: id.clone(),
                item,
            })?;
        player.items.remove(pos);
        Ok(())
    }

    /// Moves one `item` between two living players.
    ///
    /// Checks both ends before mutating, so a failure leaves the roster
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Fails if either player is unknown or dead, or `from` lacks the item.
    pub fn transfer_item(
        &mut self,
        from: &ActorId,
        to: &ActorId,
        item: ItemKind,
    ) -> Result<(), RosterError> {
        self.living_mut(to)?;
        if !self.living_mut(from)?.holds(item) {
            return Err(RosterError::MissingItem {
                actor: from.clone(),
                item,
            });
        }
        self.consume_item(from, item)?;
        self.grant_item(to, item)
    }

    /// Applies a logged effect.
    ///
    /// # Errors
    ///
    /// Propagates the underlying mutator's error.
    pub fn apply(&mut self, effect: &Effect) -> Result<(), RosterError> {
        match effect {
            Effect::Died { actor, cause } => self.apply_death(actor, *cause),
            Effect::AlignmentChanged { actor, alignment } => {
                self.apply_alignment_change(actor, *alignment)
            }
            Effect::RoleChanged { actor, role } => self.apply_role_change(actor, role.clone()),
            Effect::ItemGained { actor, item } => self.grant_item(actor, *item),
            Effect::ItemLost { actor, item } => self.consume_item(actor, *item),
        }
    }

    /// Serializable copy of every player.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Player> {
        self.players.clone()
    }
}
