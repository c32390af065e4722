//! Periodic hit point loss.
//!
//! Every firing that reaches the target costs it `damage_per_tick` hit
//! points. Damage is cumulative per firing and is never given back, so
//! `removed` has nothing to undo.

use tickfx_types::{AttributeTag, EffectFamily, GameCycle};

use super::contract::{
    ActivationError, Effect, EffectContext, EffectFactory, Lifecycle, TimedEffect, TimerEvent,
};
use crate::persist::{CodecError, RecordReader, RecordWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageOverTimeSpec {
    pub damage_per_tick: i32,
    /// Ticks between two firings
    pub period: u64,
}

impl EffectFactory for DamageOverTimeSpec {
    fn family(&self) -> EffectFamily {
        EffectFamily::DamageOverTime
    }

    fn build(self, base: TimedEffect, now: GameCycle) -> Result<Box<dyn Effect>, ActivationError> {
        if self.period == 0 {
            return Err(ActivationError::InvalidParameter(
                "period must be at least one tick".to_string(),
            ));
        }
        let next_due = now.saturating_add(self.period).min(base.end_cycle);
        Ok(Box::new(DamageOverTime {
            timed: base,
            damage_per_tick: self.damage_per_tick,
            period: self.period,
            next_due,
            ticks_applied: 0,
        }))
    }
}

#[derive(Debug, Clone)]
pub struct DamageOverTime {
    timed: TimedEffect,
    damage_per_tick: i32,
    period: u64,
    next_due: GameCycle,
    ticks_applied: u32,
}

impl DamageOverTime {
    pub fn damage_per_tick(&self) -> i32 {
        self.damage_per_tick
    }

    pub fn ticks_applied(&self) -> u32 {
        self.ticks_applied
    }

    pub fn decode(
        reader: &mut RecordReader<'_>,
        timed: TimedEffect,
    ) -> Result<Box<dyn Effect>, CodecError> {
        let damage_per_tick = reader.i32("damage_per_tick")?;
        let period = reader.int("period")?;
        if period <= 0 {
            return Err(CodecError::OutOfRange {
                field: "period",
                value: period,
            });
        }
        let period = period as u64;
        let default_next = reader.now().saturating_add(period);
        let next_due = reader
            .opt_remaining("next_tick")?
            .unwrap_or(default_next)
            .min(timed.end_cycle);
        let ticks_applied = reader
            .opt_int("ticks_applied")?
            .unwrap_or(0)
            .clamp(0, i64::from(u32::MAX)) as u32;

        Ok(Box::new(Self {
            timed,
            damage_per_tick,
            period,
            next_due,
            ticks_applied,
        }))
    }
}

impl Effect for DamageOverTime {
    fn timed(&self) -> &TimedEffect {
        &self.timed
    }

    fn timed_mut(&mut self) -> &mut TimedEffect {
        &mut self.timed
    }

    fn first_due(&self) -> GameCycle {
        self.next_due
    }

    fn update(
        &mut self,
        event: &TimerEvent,
        ctx: &mut EffectContext<'_>,
        apply_effect: bool,
    ) -> bool {
        let now = ctx.cycle();
        let damage = self.damage_per_tick;
        let Some(entity) = ctx.accessible_target(self.timed.target) else {
            self.timed.lifecycle = Lifecycle::Retrying;
            ctx.retry();
            return true;
        };
        self.timed.lifecycle = Lifecycle::Active;

        if apply_effect {
            let hp = entity.attribute(AttributeTag::HitPoints);
            entity.set_attribute(AttributeTag::HitPoints, hp.saturating_sub(damage));
        }
        self.ticks_applied = self.ticks_applied.saturating_add(1);
        if event.lateness() > 0 {
            tracing::debug!(
                target_row = %self.timed.target,
                lateness = event.lateness(),
                "Late damage tick"
            );
        }

        let next = now.saturating_add(self.period);
        if next > self.timed.end_cycle {
            return false;
        }
        self.next_due = next;
        ctx.rearm_in(self.period);
        true
    }

    fn removed(&mut self, _ctx: &mut EffectContext<'_>) {
        tracing::debug!(
            target_row = %self.timed.target,
            ticks = self.ticks_applied,
            "Damage over time ended"
        );
    }

    fn store(&self, writer: &mut RecordWriter) {
        writer.put_i32("damage_per_tick", self.damage_per_tick);
        writer.put_int("period", self.period.min(i64::MAX as u64) as i64);
        writer.put_remaining("next_tick", self.next_due);
        writer.put_int("ticks_applied", i64::from(self.ticks_applied));
    }

    fn describe(&self) -> String {
        format!(
            "{} {} every {} ticks ({} applied)",
            self.family(),
            self.damage_per_tick,
            self.period,
            self.ticks_applied
        )
    }
}
