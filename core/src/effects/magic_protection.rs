//! Temporary change to one of the target's magic protections.
//!
//! The combined modifier is applied when the effect's timer fires with the
//! target reachable, and taken back off in `removed`. An unreachable target
//! postpones the firing one retry delay at a time, without touching anything.

use tickfx_types::formatting::format_signed;
use tickfx_types::{AttributeTag, EffectFamily, GameCycle, ProtectionType};

use super::contract::{
    ActivationError, Effect, EffectContext, EffectFactory, Lifecycle, TimedEffect, TimerEvent,
};
use crate::persist::{CodecError, RecordReader, RecordWriter};

/// What a caster asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModMagicProtectionSpec {
    pub protection: ProtectionType,
    pub modifier1: i32,
    pub modifier2: i32,
    /// Ticks during which the power cannot be used on the same target again
    pub disable_ticks: u64,
}

impl EffectFactory for ModMagicProtectionSpec {
    fn family(&self) -> EffectFamily {
        EffectFamily::PowerModMagicProtection
    }

    fn build(self, base: TimedEffect, now: GameCycle) -> Result<Box<dyn Effect>, ActivationError> {
        Ok(Box::new(ModMagicProtection {
            timed: base,
            protection: self.protection,
            modifier1: self.modifier1,
            modifier2: self.modifier2,
            target_disable_cycle: now.saturating_add(self.disable_ticks),
            applied: false,
        }))
    }
}

#[derive(Debug, Clone)]
pub struct ModMagicProtection {
    timed: TimedEffect,
    protection: ProtectionType,
    modifier1: i32,
    modifier2: i32,
    target_disable_cycle: GameCycle,
    /// Whether the modifier is currently on the target
    applied: bool,
}

impl ModMagicProtection {
    pub fn protection(&self) -> ProtectionType {
        self.protection
    }

    pub fn attribute(&self) -> AttributeTag {
        AttributeTag::MagicProtection(self.protection)
    }

    pub fn total_modifier(&self) -> i32 {
        self.modifier1.saturating_add(self.modifier2)
    }

    pub fn is_applied(&self) -> bool {
        self.applied
    }

    /// Decode the family-specific fields following the shared ones
    pub fn decode(
        reader: &mut RecordReader<'_>,
        timed: TimedEffect,
    ) -> Result<Box<dyn Effect>, CodecError> {
        let target_disable_cycle = reader.remaining_or("target_disable_time", 0)?;
        let protection = reader
            .text("affected_protection")?
            .parse::<ProtectionType>()
            .map_err(|e| CodecError::InvalidValue {
                field: "affected_protection",
                reason: e.to_string(),
            })?;
        let modifier1 = reader.i32("modifier1")?;
        let modifier2 = reader.i32("modifier2")?;
        let applied = reader.flag_or("applied", false)?;

        Ok(Box::new(Self {
            timed,
            protection,
            modifier1,
            modifier2,
            target_disable_cycle,
            applied,
        }))
    }
}

impl Effect for ModMagicProtection {
    fn timed(&self) -> &TimedEffect {
        &self.timed
    }

    fn timed_mut(&mut self) -> &mut TimedEffect {
        &mut self.timed
    }

    fn lockout_until(&self) -> Option<GameCycle> {
        Some(self.target_disable_cycle)
    }

    fn update(
        &mut self,
        _event: &TimerEvent,
        ctx: &mut EffectContext<'_>,
        apply_effect: bool,
    ) -> bool {
        let tag = self.attribute();
        let delta = self.total_modifier();
        let Some(entity) = ctx.accessible_target(self.timed.target) else {
            self.timed.lifecycle = Lifecycle::Retrying;
            ctx.retry();
            return true;
        };
        self.timed.lifecycle = Lifecycle::Active;

        if apply_effect && !self.applied {
            let current = entity.attribute(tag);
            entity.set_attribute(tag, current.saturating_add(delta));
            self.applied = true;
        }
        false
    }

    fn removed(&mut self, ctx: &mut EffectContext<'_>) {
        let tag = self.attribute();
        let delta = self.total_modifier();
        let Some(entity) = ctx.target(self.timed.target) else {
            tracing::warn!(
                target_row = %self.timed.target,
                family = %self.timed.family,
                "Cannot find target entity, modifier left in place"
            );
            return;
        };

        if self.applied {
            let current = entity.attribute(tag);
            entity.set_attribute(tag, current.saturating_sub(delta));
            self.applied = false;
        }
    }

    fn store(&self, writer: &mut RecordWriter) {
        writer.put_remaining("target_disable_time", self.target_disable_cycle);
        writer.put_text("affected_protection", self.protection.as_str());
        writer.put_i32("modifier1", self.modifier1);
        writer.put_i32("modifier2", self.modifier2);
        writer.put_flag("applied", self.applied);
    }

    fn describe(&self) -> String {
        format!(
            "{} {} {}",
            self.family(),
            self.attribute(),
            format_signed(self.total_modifier())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{Entity, EntityDirectory, Roster};
    use crate::effects::Rearm;
    use crate::scheduler::Scheduler;
    use tickfx_types::EntityId;

    fn event(at: GameCycle) -> TimerEvent {
        let mut s = Scheduler::<()>::new();
        TimerEvent {
            handle: s.schedule_at(at, ()),
            due: at,
            fired_at: at,
        }
    }

    fn make(roster: &mut Roster, m1: i32, m2: i32) -> (ModMagicProtection, AttributeTag) {
        let row = roster.spawn(EntityId(1), "Target");
        let spec = ModMagicProtectionSpec {
            protection: ProtectionType::Fire,
            modifier1: m1,
            modifier2: m2,
            disable_ticks: 0,
        };
        let base = TimedEffect::new(None, None, row, spec.family(), 110);
        let effect = ModMagicProtection {
            timed: base,
            protection: spec.protection,
            modifier1: m1,
            modifier2: m2,
            target_disable_cycle: 100,
            applied: false,
        };
        (effect, AttributeTag::MagicProtection(ProtectionType::Fire))
    }

    #[test]
    fn test_update_applies_combined_modifier_then_removed_restores() {
        let mut roster = Roster::new();
        let (mut effect, tag) = make(&mut roster, 5, -2);
        let row = effect.target();
        roster.entity_mut(row).unwrap().set_attribute(tag, 20);

        let mut ctx = EffectContext::new(110, &mut roster, 1);
        assert!(!effect.update(&event(110), &mut ctx, true));
        assert_eq!(ctx.rearm(), None);
        drop(ctx);
        assert_eq!(roster.entity(row).unwrap().attribute(tag), 23);

        let mut ctx = EffectContext::new(110, &mut roster, 1);
        effect.removed(&mut ctx);
        assert_eq!(roster.entity(row).unwrap().attribute(tag), 20);
    }

    #[test]
    fn test_inaccessible_target_requests_retry_without_mutation() {
        let mut roster = Roster::new();
        let (mut effect, tag) = make(&mut roster, 5, -2);
        let row = effect.target();
        roster.set_accessible(row, false);

        let mut ctx = EffectContext::new(110, &mut roster, 1);
        assert!(effect.update(&event(110), &mut ctx, true));
        assert_eq!(ctx.rearm(), Some(Rearm::Retry(1)));
        assert_eq!(effect.timed().lifecycle, Lifecycle::Retrying);
        drop(ctx);
        assert_eq!(roster.entity(row).unwrap().attribute(tag), 0);
    }

    #[test]
    fn test_second_firing_does_not_stack() {
        let mut roster = Roster::new();
        let (mut effect, tag) = make(&mut roster, 4, 0);
        let row = effect.target();

        let mut ctx = EffectContext::new(110, &mut roster, 1);
        effect.update(&event(110), &mut ctx, true);
        effect.update(&event(111), &mut ctx, true);
        drop(ctx);
        assert_eq!(roster.entity(row).unwrap().attribute(tag), 4);
    }

    #[test]
    fn test_removed_without_application_leaves_baseline() {
        let mut roster = Roster::new();
        let (mut effect, tag) = make(&mut roster, 5, -2);
        let row = effect.target();

        let mut ctx = EffectContext::new(105, &mut roster, 1);
        effect.removed(&mut ctx);
        drop(ctx);
        assert_eq!(roster.entity(row).unwrap().attribute(tag), 0);
    }

    #[test]
    fn test_dry_run_firing_applies_nothing() {
        let mut roster = Roster::new();
        let (mut effect, tag) = make(&mut roster, 5, -2);
        let row = effect.target();

        let mut ctx = EffectContext::new(110, &mut roster, 1);
        assert!(!effect.update(&event(110), &mut ctx, false));
        effect.removed(&mut ctx);
        drop(ctx);
        assert!(!effect.is_applied());
        assert_eq!(roster.entity(row).unwrap().attribute(tag), 0);
    }

    #[test]
    fn test_removed_with_target_gone_keeps_modifier_flag() {
        let mut roster = Roster::new();
        let (mut effect, _) = make(&mut roster, 5, -2);
        let row = effect.target();

        let mut ctx = EffectContext::new(110, &mut roster, 1);
        effect.update(&event(110), &mut ctx, true);
        drop(ctx);
        roster.despawn(row);

        let mut ctx = EffectContext::new(111, &mut roster, 1);
        effect.removed(&mut ctx);
        assert!(effect.is_applied());
    }

    #[test]
    fn test_describe() {
        let mut roster = Roster::new();
        let (effect, _) = make(&mut roster, 5, -2);
        assert_eq!(
            effect.describe(),
            "power_mod_magic_protection magic_protection.fire +3"
        );
    }
}
