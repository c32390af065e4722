//! Timed status effects
//!
//! This module provides:
//! - **Contract**: the [`Effect`] trait every family implements, and the
//!   [`TimedEffect`] bookkeeping they all share
//! - **Families**: the concrete effects a caster can put on a target
//!
//! # Lifecycle
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 Spec (what the caster asks for)                 │
//! │   "Raise Tank's fire protection by 5-2 for 30 ticks"            │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                   EffectEngine::activate
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │              Box<dyn Effect> + pending timer                    │
//! │   update() on each firing, retry while Tank is unreachable      │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!          update() == false / dispel / teardown
//!                              │
//!                              ▼
//!                  removed() exactly once
//! ```

mod contract;
mod damage_over_time;
mod magic_protection;

pub use contract::{
    Activation, ActivationError, Effect, EffectContext, EffectFactory, Lifecycle, Rearm,
    TimedEffect, TimerEvent,
};
pub use damage_over_time::{DamageOverTime, DamageOverTimeSpec};
pub use magic_protection::{ModMagicProtection, ModMagicProtectionSpec};
