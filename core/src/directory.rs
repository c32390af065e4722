//! Entity lookup contract consumed by effects, plus an in-memory roster.
//!
//! Effects only ever hold a [`RowId`]. Every access goes back through the
//! directory, because between two ticks the entity may have logged out, died,
//! migrated away or had its slot handed to somebody else.

use hashbrown::HashMap;
use tickfx_types::{AttributeTag, EntityId, RowId};

/// Attribute access on a live entity
pub trait Entity {
    fn attribute(&self, tag: AttributeTag) -> i32;
    fn set_attribute(&mut self, tag: AttributeTag, value: i32);
}

/// Row id → live entity lookup
pub trait EntityDirectory {
    /// True iff the row currently maps to a live, queryable entity
    fn is_accessible(&self, row: RowId) -> bool;

    fn entity(&self, row: RowId) -> Option<&dyn Entity>;

    fn entity_mut(&mut self, row: RowId) -> Option<&mut dyn Entity>;

    /// Stable id of the entity at `row`, if any
    fn entity_id(&self, row: RowId) -> Option<EntityId>;

    /// Current row of a loaded entity, if any
    fn row_of(&self, id: EntityId) -> Option<RowId>;
}

/// A player or creature held by the [`Roster`]
#[derive(Debug, Clone)]
pub struct Character {
    pub entity_id: EntityId,
    pub name: String,
    accessible: bool,
    attributes: HashMap<AttributeTag, i32>,
}

impl Character {
    fn new(entity_id: EntityId, name: &str) -> Self {
        Self {
            entity_id,
            name: name.to_string(),
            accessible: true,
            attributes: HashMap::new(),
        }
    }

    pub fn is_accessible(&self) -> bool {
        self.accessible
    }

    /// Attributes that have been written at least once, sorted by name
    pub fn attributes(&self) -> Vec<(AttributeTag, i32)> {
        let mut out: Vec<_> = self.attributes.iter().map(|(k, v)| (*k, *v)).collect();
        out.sort_by_key(|(tag, _)| tag.to_string());
        out
    }
}

impl Entity for Character {
    fn attribute(&self, tag: AttributeTag) -> i32 {
        self.attributes.get(&tag).copied().unwrap_or(0)
    }

    fn set_attribute(&mut self, tag: AttributeTag, value: i32) {
        self.attributes.insert(tag, value);
    }
}

#[derive(Debug, Clone, Default)]
struct Slot {
    generation: u32,
    occupant: Option<Character>,
}

/// In-memory [`EntityDirectory`] with generational slots.
///
/// Freed slots are reused, but the generation bump means a [`RowId`] issued
/// for the previous occupant no longer resolves.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    slots: Vec<Slot>,
    free: Vec<u32>,
    by_entity: HashMap<EntityId, RowId>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load an entity and hand out its row. Loading an entity that is already
    /// present returns its existing row.
    pub fn spawn(&mut self, entity_id: EntityId, name: &str) -> RowId {
        if let Some(row) = self.by_entity.get(&entity_id) {
            return *row;
        }

        let row = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.generation = slot.generation.wrapping_add(1);
                slot.occupant = Some(Character::new(entity_id, name));
                RowId::new(index, slot.generation)
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    occupant: Some(Character::new(entity_id, name)),
                });
                RowId::new(index, 0)
            }
        };

        self.by_entity.insert(entity_id, row);
        tracing::debug!(%row, entity = %entity_id, name, "Entity loaded");
        row
    }

    /// Unload the entity at `row`, freeing the slot for reuse
    pub fn despawn(&mut self, row: RowId) -> Option<Character> {
        let slot = self.slot_mut(row)?;
        let character = slot.occupant.take()?;
        self.by_entity.remove(&character.entity_id);
        self.free.push(row.index);
        tracing::debug!(%row, entity = %character.entity_id, "Entity unloaded");
        Some(character)
    }

    /// Mark an entity reachable or not (e.g. mid-migration). Returns false if
    /// the row does not resolve.
    pub fn set_accessible(&mut self, row: RowId, accessible: bool) -> bool {
        match self.character_mut(row) {
            Some(c) => {
                c.accessible = accessible;
                true
            }
            None => false,
        }
    }

    pub fn character(&self, row: RowId) -> Option<&Character> {
        self.slot(row).and_then(|s| s.occupant.as_ref())
    }

    pub fn character_mut(&mut self, row: RowId) -> Option<&mut Character> {
        self.slot_mut(row).and_then(|s| s.occupant.as_mut())
    }

    /// Find a loaded character by name (case-insensitive)
    pub fn find_by_name(&self, name: &str) -> Option<RowId> {
        self.iter()
            .find(|(_, c)| c.name.eq_ignore_ascii_case(name))
            .map(|(row, _)| row)
    }

    pub fn iter(&self) -> impl Iterator<Item = (RowId, &Character)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.occupant
                .as_ref()
                .map(|c| (RowId::new(i as u32, slot.generation), c))
        })
    }

    pub fn len(&self) -> usize {
        self.by_entity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_entity.is_empty()
    }

    fn slot(&self, row: RowId) -> Option<&Slot> {
        self.slots
            .get(row.index as usize)
            .filter(|s| s.generation == row.generation)
    }

    fn slot_mut(&mut self, row: RowId) -> Option<&mut Slot> {
        self.slots
            .get_mut(row.index as usize)
            .filter(|s| s.generation == row.generation)
    }
}

impl EntityDirectory for Roster {
    fn is_accessible(&self, row: RowId) -> bool {
        self.character(row).is_some_and(|c| c.accessible)
    }

    fn entity(&self, row: RowId) -> Option<&dyn Entity> {
        self.character(row).map(|c| c as &dyn Entity)
    }

    fn entity_mut(&mut self, row: RowId) -> Option<&mut dyn Entity> {
        self.character_mut(row).map(|c| c as &mut dyn Entity)
    }

    fn entity_id(&self, row: RowId) -> Option<EntityId> {
        self.character(row).map(|c| c.entity_id)
    }

    fn row_of(&self, id: EntityId) -> Option<RowId> {
        self.by_entity.get(&id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickfx_types::ProtectionType;

    #[test]
    fn test_spawn_and_lookup() {
        let mut roster = Roster::new();
        let row = roster.spawn(EntityId(7), "Tank");

        assert!(roster.is_accessible(row));
        assert_eq!(roster.entity_id(row), Some(EntityId(7)));
        assert_eq!(roster.row_of(EntityId(7)), Some(row));
        assert_eq!(roster.find_by_name("tank"), Some(row));
        assert_eq!(roster.spawn(EntityId(7), "Tank"), row);
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_reused_slot_does_not_resolve_old_row() {
        let mut roster = Roster::new();
        let old = roster.spawn(EntityId(1), "First");
        roster.despawn(old);
        let new = roster.spawn(EntityId(2), "Second");

        assert_eq!(old.index, new.index);
        assert_ne!(old, new);
        assert!(!roster.is_accessible(old));
        assert!(roster.entity(old).is_none());
        assert_eq!(roster.entity_id(new), Some(EntityId(2)));
        assert_eq!(roster.row_of(EntityId(1)), None);
    }

    #[test]
    fn test_inaccessible_entity_is_still_present() {
        let mut roster = Roster::new();
        let row = roster.spawn(EntityId(3), "Ghost");
        assert!(roster.set_accessible(row, false));

        assert!(!roster.is_accessible(row));
        assert!(roster.entity(row).is_some());
    }

    #[test]
    fn test_attribute_defaults_to_zero() {
        let mut roster = Roster::new();
        let row = roster.spawn(EntityId(4), "Mage");
        let tag = AttributeTag::MagicProtection(ProtectionType::Cold);

        let entity = roster.entity_mut(row).unwrap();
        assert_eq!(entity.attribute(tag), 0);
        entity.set_attribute(tag, 12);
        assert_eq!(roster.character(row).unwrap().attributes(), vec![(tag, 12)]);
    }
}
