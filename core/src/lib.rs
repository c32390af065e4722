pub mod clock;
pub mod config;
pub mod directory;
pub mod effects;
pub mod engine;
pub mod persist;
pub mod registry;
pub mod scheduler;


// Re-exports for convenience
pub use clock::{ManualClock, TickClock};
pub use directory::{Character, Entity, EntityDirectory, Roster};
pub use engine::{EffectEngine, RestoreReport, TickReport};
pub use persist::{
    CodecError, EffectCodecs, EffectRecord, EffectSnapshot, EntityEffects, LockoutRecord,
};
pub use registry::{EffectId, EffectKey, EffectRegistry};
pub use scheduler::{Scheduler, TimerHandle};
pub use tickfx_types::{
    AttributeTag, EffectFamily, EngineConfig, EntityId, GameCycle, ProtectionType, RowId,
};
