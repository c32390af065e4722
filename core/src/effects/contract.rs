//! The effect capability set and the bookkeeping every timed effect shares.

use std::fmt;

use tickfx_types::{EffectFamily, EntityId, GameCycle, RowId};

use crate::directory::{Entity, EntityDirectory};
use crate::persist::{CodecError, RecordReader, RecordWriter};
use crate::scheduler::TimerHandle;

/// Where an effect is in its life
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Registered, waiting for its next firing
    Active,
    /// Last firing found the target inaccessible; a retry is pending
    Retrying,
    /// `removed` has run. Never leaves this state.
    Removed,
}

/// Fields shared by every timed effect.
///
/// The target is only ever stored as a row id and resolved through the
/// directory on each access.
#[derive(Debug, Clone)]
pub struct TimedEffect {
    /// Who cast it, for attribution only. Never revalidated.
    pub creator: Option<RowId>,
    pub creator_entity_id: Option<EntityId>,
    pub target: RowId,
    pub family: EffectFamily,
    /// Absolute expiry cycle, valid for this process only
    pub end_cycle: GameCycle,
    pub lifecycle: Lifecycle,
    /// Consecutive firings that found the target inaccessible
    pub retries: u32,
    pub(crate) timer: Option<TimerHandle>,
}

impl TimedEffect {
    pub fn new(
        creator: Option<RowId>,
        creator_entity_id: Option<EntityId>,
        target: RowId,
        family: EffectFamily,
        end_cycle: GameCycle,
    ) -> Self {
        Self {
            creator,
            creator_entity_id,
            target,
            family,
            end_cycle,
            lifecycle: Lifecycle::Active,
            retries: 0,
            timer: None,
        }
    }

    /// Ticks left before natural expiry, zero once past due
    pub fn remaining(&self, now: GameCycle) -> u64 {
        self.end_cycle.saturating_sub(now)
    }

    /// Handle of the pending firing, if one is scheduled
    pub fn timer(&self) -> Option<TimerHandle> {
        self.timer
    }

    /// Write the shared fields. The creator is resolved to its stable id at
    /// save time, falling back to the id captured at activation.
    pub fn store(&self, writer: &mut RecordWriter, directory: &dyn EntityDirectory) {
        writer.put_remaining("remaining_ticks", self.end_cycle);
        let creator = self
            .creator
            .and_then(|row| directory.entity_id(row))
            .or(self.creator_entity_id);
        if let Some(id) = creator {
            writer.put_entity("creator_entity_id", id);
        }
        if self.retries > 0 {
            writer.put_int("retries", i64::from(self.retries));
        }
    }

    /// Read the shared fields back. The expiry is rebuilt from the remaining
    /// tick count against the reader's current cycle. A creator that is not
    /// loaded right now is tolerated.
    pub fn apply(
        reader: &mut RecordReader<'_>,
        target: RowId,
        directory: &dyn EntityDirectory,
    ) -> Result<Self, CodecError> {
        let end_cycle = reader.remaining("remaining_ticks")?;
        let creator_entity_id = reader.opt_entity("creator_entity_id")?;
        let retries = reader
            .opt_int("retries")?
            .unwrap_or(0)
            .clamp(0, i64::from(u32::MAX)) as u32;
        let creator = creator_entity_id.and_then(|id| directory.row_of(id));
        let mut timed = Self::new(
            creator,
            creator_entity_id,
            target,
            reader.family(),
            end_cycle,
        );
        timed.retries = retries;
        Ok(timed)
    }
}

/// The firing being delivered to [`Effect::update`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEvent {
    pub handle: TimerHandle,
    pub due: GameCycle,
    pub fired_at: GameCycle,
}

impl TimerEvent {
    /// Ticks between the due cycle and the actual firing
    pub fn lateness(&self) -> u64 {
        self.fired_at.saturating_sub(self.due)
    }
}

/// What the effect asked the engine to do with its timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rearm {
    /// Target was unreachable; fire again after this many ticks
    Retry(u64),
    /// Fire again after this many ticks
    After(u64),
}

/// Everything an effect may touch while it runs.
///
/// Effects never see the scheduler; they record a [`Rearm`] request and the
/// engine applies it once the call returns.
pub struct EffectContext<'a> {
    cycle: GameCycle,
    directory: &'a mut dyn EntityDirectory,
    retry_delay: u64,
    rearm: Option<Rearm>,
}

impl<'a> EffectContext<'a> {
    pub fn new(cycle: GameCycle, directory: &'a mut dyn EntityDirectory, retry_delay: u32) -> Self {
        Self {
            cycle,
            directory,
            retry_delay: u64::from(retry_delay.max(1)),
            rearm: None,
        }
    }

    pub fn cycle(&self) -> GameCycle {
        self.cycle
    }

    pub fn directory(&self) -> &dyn EntityDirectory {
        &*self.directory
    }

    /// Resolve `row` only if it is currently accessible
    pub fn accessible_target(&mut self, row: RowId) -> Option<&mut dyn Entity> {
        if !self.directory.is_accessible(row) {
            return None;
        }
        self.directory.entity_mut(row)
    }

    /// Resolve `row` whether or not it is accessible
    pub fn target(&mut self, row: RowId) -> Option<&mut dyn Entity> {
        self.directory.entity_mut(row)
    }

    /// Ask to be fired again after the configured retry delay
    pub fn retry(&mut self) {
        self.rearm = Some(Rearm::Retry(self.retry_delay));
    }

    /// Ask to be fired again after `ticks` (at least one)
    pub fn rearm_in(&mut self, ticks: u64) {
        self.rearm = Some(Rearm::After(ticks.max(1)));
    }

    pub fn rearm(&self) -> Option<Rearm> {
        self.rearm
    }

    pub(crate) fn take_rearm(&mut self) -> Option<Rearm> {
        self.rearm.take()
    }
}

/// A status effect attached to one entity.
///
/// `update` runs each time the effect's timer fires and returns whether the
/// effect is still active. `removed` runs exactly once, when the effect ends
/// for any reason, and must undo whatever the effect left applied.
///
/// Returning `true` without a rearm request holds the effect until its end
/// cycle. Once that cycle has passed, the end cycle no longer ends anything:
/// such an effect is fired again on every tick and stays registered until
/// `update` returns `false` or it is dispelled or torn down.
pub trait Effect: fmt::Debug + Send + Sync {
    fn timed(&self) -> &TimedEffect;

    fn timed_mut(&mut self) -> &mut TimedEffect;

    fn family(&self) -> EffectFamily {
        self.timed().family
    }

    fn target(&self) -> RowId {
        self.timed().target
    }

    /// Cycle of the first firing after activation or restore
    fn first_due(&self) -> GameCycle {
        self.timed().end_cycle
    }

    /// Cycle until which the same family cannot be reapplied to the target.
    /// Read once when the effect is registered; the lockout then outlives it.
    fn lockout_until(&self) -> Option<GameCycle> {
        None
    }

    fn update(
        &mut self,
        event: &TimerEvent,
        ctx: &mut EffectContext<'_>,
        apply_effect: bool,
    ) -> bool;

    fn removed(&mut self, ctx: &mut EffectContext<'_>);

    /// Write the family-specific fields, after the shared ones
    fn store(&self, writer: &mut RecordWriter);

    /// One line for listings
    fn describe(&self) -> String {
        self.family().to_string()
    }
}

/// Who, on whom, for how long
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activation {
    pub creator: Option<RowId>,
    pub target: RowId,
    pub duration: u64,
}

impl Activation {
    pub fn new(target: RowId, duration: u64) -> Self {
        Self {
            creator: None,
            target,
            duration,
        }
    }

    pub fn by(mut self, creator: RowId) -> Self {
        self.creator = Some(creator);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActivationError {
    #[error("target {0} is not loaded")]
    TargetNotFound(RowId),

    #[error("{family} is locked on the target until cycle {until}")]
    Locked { family: EffectFamily, until: GameCycle },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Caster-side description of an effect, turned into a live effect by the
/// engine during activation
pub trait EffectFactory {
    fn family(&self) -> EffectFamily;

    fn build(self, base: TimedEffect, now: GameCycle) -> Result<Box<dyn Effect>, ActivationError>;
}
