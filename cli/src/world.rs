//! The simulated world the shell drives: a clock, a roster and one engine.

use std::collections::HashMap;
use std::path::PathBuf;

use tickfx_core::config::default_config_path;
use tickfx_core::persist::default_snapshot_path;
use tickfx_core::{
    AttributeTag, EffectEngine, EngineConfig, EntityEffects, EntityId, ManualClock, Roster, RowId,
};

/// Starting hit points for a freshly spawned character
pub const DEFAULT_HIT_POINTS: i32 = 100;

/// A character that logged out, with the effects and lockouts it carried
#[derive(Debug, Clone)]
pub struct Parked {
    pub name: String,
    pub attributes: Vec<(AttributeTag, i32)>,
    pub saved: EntityEffects,
}

#[derive(Debug)]
pub struct World {
    pub clock: ManualClock,
    pub roster: Roster,
    pub engine: EffectEngine,
    pub parked: HashMap<EntityId, Parked>,
    pub config_path: Option<PathBuf>,
    pub snapshot_path: Option<PathBuf>,
    next_entity: u64,
}

impl World {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            clock: ManualClock::default(),
            roster: Roster::new(),
            engine: EffectEngine::new(config),
            parked: HashMap::new(),
            config_path: default_config_path(),
            snapshot_path: default_snapshot_path(),
            next_entity: 0x1000,
        }
    }

    pub fn mint_entity_id(&mut self) -> EntityId {
        self.next_entity += 1;
        EntityId(self.next_entity)
    }

    pub fn resolve(&self, name: &str) -> Result<RowId, String> {
        self.roster
            .find_by_name(name)
            .ok_or_else(|| format!("error: no character named '{name}' is loaded"))
    }

    pub fn parked_by_name(&self, name: &str) -> Option<EntityId> {
        self.parked
            .iter()
            .find(|(_, p)| p.name.eq_ignore_ascii_case(name))
            .map(|(id, _)| *id)
    }
}
