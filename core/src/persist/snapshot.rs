use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tickfx_types::{EffectFamily, EntityId, GameCycle};

use super::record::{CodecError, EffectRecord};

/// Snapshot format version (increment when the layout changes)
pub const SNAPSHOT_VERSION: u32 = 1;

/// A family that stays locked on an entity after its effect is gone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutRecord {
    pub family: EffectFamily,
    pub remaining_ticks: u64,
}

/// Saved effects of one entity, in registration order, and its lockouts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityEffects {
    pub entity_id: EntityId,
    pub effects: Vec<EffectRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lockouts: Vec<LockoutRecord>,
}

impl EntityEffects {
    pub fn new(entity_id: EntityId, effects: Vec<EffectRecord>) -> Self {
        Self {
            entity_id,
            effects,
            lockouts: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty() && self.lockouts.is_empty()
    }
}

/// Every persistable effect in the world at one moment.
///
/// `saved_cycle` is informational only. Records hold remaining tick counts, so
/// a snapshot can be loaded into a process whose clock started anywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectSnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub saved_cycle: GameCycle,
    pub entities: Vec<EntityEffects>,
}

impl EffectSnapshot {
    pub fn new(saved_cycle: GameCycle) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            saved_cycle,
            entities: Vec::new(),
        }
    }

    pub fn effect_count(&self) -> usize {
        self.entities.iter().map(|e| e.effects.len()).sum()
    }

    pub fn entity(&self, id: EntityId) -> Option<&EntityEffects> {
        self.entities.iter().find(|e| e.entity_id == id)
    }

    pub fn to_json(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(content: &str) -> Result<Self, CodecError> {
        let snapshot: Self = serde_json::from_str(content)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(CodecError::Version {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        Ok(snapshot)
    }

    pub fn load_from_disk(path: &Path) -> Result<Self, CodecError> {
        let content = fs::read_to_string(path).map_err(|source| CodecError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn save_to_disk(&self, path: &Path) -> Result<(), CodecError> {
        let io_err = |source| CodecError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, self.to_json()?).map_err(io_err)
    }
}

/// Get the default snapshot file path
pub fn default_snapshot_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("tickfx").join("effects.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::RecordWriter;

    fn snapshot() -> EffectSnapshot {
        let mut w = RecordWriter::new(EffectFamily::DamageOverTime, 10);
        w.put_remaining("remaining_ticks", 30);
        w.put_i32("damage_per_tick", 2);
        w.put_int("period", 5);

        let mut snap = EffectSnapshot::new(10);
        snap.entities.push(EntityEffects::new(EntityId(3), vec![w.finish()]));
        snap
    }

    #[test]
    fn test_json_round_trip() {
        let snap = snapshot();
        let json = snap.to_json().unwrap();
        assert_eq!(EffectSnapshot::from_json(&json).unwrap(), snap);
        assert_eq!(snap.effect_count(), 1);
        assert!(snap.entity(EntityId(3)).is_some());
        assert!(snap.entity(EntityId(4)).is_none());
    }

    #[test]
    fn test_lockouts_are_optional_in_json() {
        let mut snap = snapshot();
        let json = snap.to_json().unwrap();
        assert!(!json.contains("lockouts"));

        snap.entities[0].lockouts.push(LockoutRecord {
            family: EffectFamily::PowerModMagicProtection,
            remaining_ticks: 40,
        });
        let json = snap.to_json().unwrap();
        assert!(json.contains("\"family\": \"power_mod_magic_protection\""));
        let back = EffectSnapshot::from_json(&json).unwrap();
        assert_eq!(back.entities[0].lockouts, snap.entities[0].lockouts);
        assert!(!back.entities[0].is_empty());
    }

    #[test]
    fn test_version_mismatch_is_rejected() {
        let mut snap = snapshot();
        snap.version = SNAPSHOT_VERSION + 1;
        let json = serde_json::to_string(&snap).unwrap();
        assert!(matches!(
            EffectSnapshot::from_json(&json),
            Err(CodecError::Version { found: 2, expected: 1 })
        ));
    }

    #[test]
    fn test_garbage_is_a_json_error() {
        assert!(matches!(
            EffectSnapshot::from_json("{ not json"),
            Err(CodecError::Json(_))
        ));
    }

    #[test]
    fn test_disk_round_trip() {
        let dir = std::env::temp_dir().join(format!("tickfx-snapshot-{}", std::process::id()));
        let path = dir.join("nested").join("effects.json");
        let snap = snapshot();

        snap.save_to_disk(&path).unwrap();
        let loaded = EffectSnapshot::load_from_disk(&path).unwrap();
        assert_eq!(loaded, snap);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let path = Path::new("/definitely/not/here/effects.json");
        let err = EffectSnapshot::load_from_disk(path).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here/effects.json"));
    }
}
