//! Shared types for the tickfx effect engine.
//!
//! Everything in here is plain data: identifiers, classification tags and the
//! engine configuration. Behavior lives in `tickfx-core`.

pub mod config;
pub mod formatting;

mod attribute;
mod family;
mod ids;

pub use attribute::{AttributeTag, ProtectionType, UnknownName};
pub use config::EngineConfig;
pub use family::EffectFamily;
pub use ids::{EntityId, GameCycle, RowId};
