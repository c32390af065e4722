use std::fmt;

use serde::{Deserialize, Serialize};

/// Monotonic world tick counter.
///
/// Absolute values are only meaningful inside the running process; anything
/// persisted must be converted to a relative tick count first.
pub type GameCycle = u64;

/// Session-local handle to a live entity.
///
/// The generation is bumped every time a directory slot is reused, so a stale
/// handle never resolves to whoever took the slot over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId {
    pub index: u32,
    pub generation: u32,
}

impl RowId {
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row:{}.{}", self.index, self.generation)
    }
}

/// Persistence-stable entity identifier. Survives restarts and relogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:010x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_display_includes_generation() {
        assert_eq!(RowId::new(4, 2).to_string(), "row:4.2");
    }

    #[test]
    fn test_entity_id_is_transparent_in_toml() {
        #[derive(Serialize, Deserialize)]
        struct Holder {
            id: EntityId,
        }
        let text = toml::to_string(&Holder { id: EntityId(42) }).unwrap();
        assert_eq!(text.trim(), "id = 42");
        let back: Holder = toml::from_str(&text).unwrap();
        assert_eq!(back.id, EntityId(42));
    }

    #[test]
    fn test_entity_id_display_is_hex() {
        assert_eq!(EntityId(255).to_string(), "0x00000000ff");
    }
}
