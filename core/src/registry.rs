//! Per-entity ordered storage of active effects.
//!
//! The registry is the sole owner of every live effect. Scheduler payloads
//! only carry an [`EffectKey`], which stops resolving once the effect has
//! been taken out.

use std::fmt;

use hashbrown::HashMap;
use tickfx_types::{EffectFamily, RowId};

use crate::effects::{Effect, EffectContext, Lifecycle};
use crate::scheduler::Scheduler;

/// Engine-unique effect number. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(pub u64);

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where to find an effect: its target's list, then its id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectKey {
    pub target: RowId,
    pub id: EffectId,
}

impl fmt::Display for EffectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.target, self.id)
    }
}

#[derive(Debug)]
struct Slot {
    id: EffectId,
    effect: Box<dyn Effect>,
}

#[derive(Debug, Default)]
pub struct EffectRegistry {
    by_target: HashMap<RowId, Vec<Slot>>,
    next_id: u64,
    count: usize,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `effect` to its target's list and take ownership of it
    pub fn add(&mut self, effect: Box<dyn Effect>) -> EffectKey {
        self.next_id += 1;
        let key = EffectKey {
            target: effect.target(),
            id: EffectId(self.next_id),
        };
        self.by_target
            .entry(key.target)
            .or_default()
            .push(Slot { id: key.id, effect });
        self.count += 1;
        key
    }

    pub fn contains(&self, key: EffectKey) -> bool {
        self.get(key).is_some()
    }

    pub fn get(&self, key: EffectKey) -> Option<&dyn Effect> {
        self.by_target
            .get(&key.target)?
            .iter()
            .find(|s| s.id == key.id)
            .map(|s| s.effect.as_ref())
    }

    pub fn get_mut(&mut self, key: EffectKey) -> Option<&mut (dyn Effect + 'static)> {
        self.by_target
            .get_mut(&key.target)?
            .iter_mut()
            .find(|s| s.id == key.id)
            .map(|s| s.effect.as_mut())
    }

    /// Deregister one effect, keeping the order of the others
    pub fn take(&mut self, key: EffectKey) -> Option<Box<dyn Effect>> {
        let list = self.by_target.get_mut(&key.target)?;
        let pos = list.iter().position(|s| s.id == key.id)?;
        let slot = list.remove(pos);
        if list.is_empty() {
            self.by_target.remove(&key.target);
        }
        self.count -= 1;
        Some(slot.effect)
    }

    /// Effects on `target` in registration order
    pub fn effects(&self, target: RowId) -> impl Iterator<Item = (EffectKey, &dyn Effect)> {
        self.by_target
            .get(&target)
            .into_iter()
            .flatten()
            .map(move |s| (EffectKey { target, id: s.id }, s.effect.as_ref()))
    }

    pub fn find(&self, id: EffectId) -> Option<EffectKey> {
        self.by_target
            .iter()
            .find(|(_, list)| list.iter().any(|s| s.id == id))
            .map(|(target, _)| EffectKey { target: *target, id })
    }

    /// Targets that carry at least one effect, in row order
    pub fn targets(&self) -> Vec<RowId> {
        let mut targets: Vec<_> = self.by_target.keys().copied().collect();
        targets.sort_unstable();
        targets
    }

    /// Every key, grouped by target in row order
    pub fn keys(&self) -> Vec<EffectKey> {
        self.targets()
            .into_iter()
            .flat_map(|t| self.effects(t).map(|(k, _)| k))
            .collect()
    }

    pub fn families(&self, target: RowId) -> Vec<EffectFamily> {
        self.effects(target).map(|(_, e)| e.family()).collect()
    }

    pub fn count_for(&self, target: RowId) -> usize {
        self.by_target.get(&target).map_or(0, Vec::len)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Tear down every effect on `target`: each gets `removed`, then its
    /// pending timer is cancelled. Returns how many effects were dropped.
    pub fn remove_all<T>(
        &mut self,
        target: RowId,
        ctx: &mut EffectContext<'_>,
        scheduler: &mut Scheduler<T>,
    ) -> usize {
        let Some(list) = self.by_target.remove(&target) else {
            return 0;
        };
        let removed = list.len();
        for mut slot in list {
            slot.effect.removed(ctx);
            let timed = slot.effect.timed_mut();
            timed.lifecycle = Lifecycle::Removed;
            if let Some(handle) = timed.timer.take() {
                scheduler.cancel(handle);
            }
            tracing::debug!(
                target_row = %target,
                id = %slot.id,
                family = %timed.family,
                cycle = ctx.cycle(),
                "Effect torn down"
            );
        }
        self.count -= removed;
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::Roster;
    use crate::effects::{EffectFactory, ModMagicProtectionSpec, TimedEffect};
    use tickfx_types::{EntityId, ProtectionType};

    fn effect(target: RowId, end: u64) -> Box<dyn Effect> {
        let spec = ModMagicProtectionSpec {
            protection: ProtectionType::Acid,
            modifier1: 1,
            modifier2: 1,
            disable_ticks: 0,
        };
        let base = TimedEffect::new(None, None, target, spec.family(), end);
        spec.build(base, 0).unwrap()
    }

    #[test]
    fn test_effects_keep_registration_order() {
        let mut roster = Roster::new();
        let a = roster.spawn(EntityId(1), "A");
        let mut registry = EffectRegistry::new();

        let k1 = registry.add(effect(a, 10));
        let k2 = registry.add(effect(a, 20));
        let k3 = registry.add(effect(a, 30));
        assert_eq!(registry.count_for(a), 3);

        registry.take(k2).unwrap();
        let keys: Vec<_> = registry.effects(a).map(|(k, _)| k).collect();
        assert_eq!(keys, vec![k1, k3]);
        assert!(!registry.contains(k2));
        assert!(registry.take(k2).is_none());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_effects_are_per_target() {
        let mut roster = Roster::new();
        let a = roster.spawn(EntityId(1), "A");
        let b = roster.spawn(EntityId(2), "B");
        let mut registry = EffectRegistry::new();

        let ka = registry.add(effect(a, 10));
        let kb = registry.add(effect(b, 10));
        assert_eq!(registry.targets(), vec![a, b]);
        assert_eq!(registry.keys(), vec![ka, kb]);
        assert_eq!(registry.find(kb.id), Some(kb));
        assert_eq!(registry.get(ka).unwrap().target(), a);
    }

    #[test]
    fn test_remove_all_cancels_pending_timers() {
        let mut roster = Roster::new();
        let a = roster.spawn(EntityId(1), "A");
        let b = roster.spawn(EntityId(2), "B");
        let mut registry = EffectRegistry::new();
        let mut scheduler = Scheduler::new();

        let mut handles = Vec::new();
        for end in [10, 20] {
            let key = registry.add(effect(a, end));
            let handle = scheduler.schedule_at(end, key);
            registry.get_mut(key).unwrap().timed_mut().timer = Some(handle);
            handles.push(handle);
        }
        let kb = registry.add(effect(b, 15));
        let hb = scheduler.schedule_at(15, kb);

        let mut ctx = EffectContext::new(5, &mut roster, 1);
        assert_eq!(registry.remove_all(a, &mut ctx, &mut scheduler), 2);
        assert_eq!(registry.remove_all(a, &mut ctx, &mut scheduler), 0);

        assert!(handles.iter().all(|h| !scheduler.is_pending(*h)));
        assert!(scheduler.is_pending(hb));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.count_for(a), 0);
    }
}
