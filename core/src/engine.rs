//! The effect engine: registry, scheduler and codec table behind one façade.
//!
//! Nothing in here is global. The tick clock and the entity directory are
//! handed in on every call, so a server can run several engines side by side
//! and tests can drive one with a [`crate::ManualClock`] and a
//! [`crate::Roster`].
//!
//! Firing order within a tick follows the scheduler: due cycle first, then
//! the order timers were (re)armed.
//!
//! Lockouts live in their own table keyed by row and family, so a lockout
//! longer than its effect still blocks reactivation after the effect ends.
//! Expired entries are dropped lazily.

use hashbrown::HashMap;
use tickfx_types::{EffectFamily, EngineConfig, GameCycle, RowId};

use crate::clock::TickClock;
use crate::directory::EntityDirectory;
use crate::effects::{
    Activation, ActivationError, Effect, EffectContext, EffectFactory, Lifecycle, Rearm,
    TimedEffect, TimerEvent,
};
use crate::persist::{EffectCodecs, EffectSnapshot, EntityEffects, LockoutRecord, encode_effect};
use crate::registry::{EffectId, EffectKey, EffectRegistry};
use crate::scheduler::Scheduler;

/// What one [`EffectEngine::tick`] did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub cycle: GameCycle,
    /// Timers that came due
    pub fired: usize,
    /// Effects that ended naturally and ran `removed`
    pub expired: usize,
    /// Firings that found the target unreachable
    pub retried: usize,
    /// Effects that asked to fire again later
    pub rearmed: usize,
    /// Effects force-finished after too many retries
    pub abandoned: usize,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        self.fired == 0
    }
}

/// Outcome of a restore pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: usize,
    /// Records that failed to decode
    pub rejected: usize,
    /// Entities in the snapshot that are not loaded
    pub missing_entities: usize,
}

impl RestoreReport {
    fn merge(&mut self, other: RestoreReport) {
        self.restored += other.restored;
        self.rejected += other.rejected;
        self.missing_entities += other.missing_entities;
    }
}

#[derive(Debug)]
pub struct EffectEngine {
    config: EngineConfig,
    scheduler: Scheduler<EffectKey>,
    registry: EffectRegistry,
    codecs: EffectCodecs,
    /// Cycle until which a family cannot be reapplied to a row
    lockouts: HashMap<(RowId, EffectFamily), GameCycle>,
}

impl Default for EffectEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl EffectEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_codecs(config, EffectCodecs::standard())
    }

    pub fn with_codecs(config: EngineConfig, codecs: EffectCodecs) -> Self {
        Self {
            config,
            scheduler: Scheduler::new(),
            registry: EffectRegistry::new(),
            codecs,
            lockouts: HashMap::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Takes effect from the next firing on
    pub fn set_config(&mut self, config: EngineConfig) {
        tracing::info!(?config, "Engine configuration updated");
        self.config = config;
    }

    pub fn codecs_mut(&mut self) -> &mut EffectCodecs {
        &mut self.codecs
    }

    // ─── Activation ─────────────────────────────────────────────────────────

    /// Create an effect on `activation.target` lasting `activation.duration`
    /// ticks. Failure is logged and leaves the engine untouched.
    pub fn activate<F: EffectFactory>(
        &mut self,
        clock: &dyn TickClock,
        directory: &mut dyn EntityDirectory,
        activation: Activation,
        factory: F,
    ) -> Option<EffectKey> {
        let family = factory.family();
        match self.try_activate(clock, directory, activation, factory) {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    target_row = %activation.target,
                    %family,
                    "Failed to activate effect"
                );
                None
            }
        }
    }

    pub fn try_activate<F: EffectFactory>(
        &mut self,
        clock: &dyn TickClock,
        directory: &mut dyn EntityDirectory,
        activation: Activation,
        factory: F,
    ) -> Result<EffectKey, ActivationError> {
        let now = clock.current_cycle();
        self.scheduler.sync(now);

        let target = activation.target;
        if directory.entity(target).is_none() {
            return Err(ActivationError::TargetNotFound(target));
        }
        let family = factory.family();
        if let Some(until) = self.lockout(target, family, now) {
            return Err(ActivationError::Locked { family, until });
        }
        self.lockouts.remove(&(target, family));

        // Attribution only: an unresolvable creator is not an error
        let creator_entity_id = activation.creator.and_then(|row| directory.entity_id(row));
        let base = TimedEffect::new(
            activation.creator,
            creator_entity_id,
            target,
            family,
            now.saturating_add(activation.duration),
        );
        let effect = factory.build(base, now)?;
        let key = self.register(effect, now);
        tracing::debug!(
            %key,
            %family,
            cycle = now,
            duration = activation.duration,
            "Effect activated"
        );
        Ok(key)
    }

    fn register(&mut self, effect: Box<dyn Effect>, now: GameCycle) -> EffectKey {
        if let Some(until) = effect.lockout_until() {
            self.lock(effect.target(), effect.family(), until, now);
        }
        let due = effect.first_due();
        let key = self.registry.add(effect);
        let handle = self.scheduler.schedule_at(due, key);
        if let Some(effect) = self.registry.get_mut(key) {
            effect.timed_mut().timer = Some(handle);
        }
        key
    }

    /// Extend the lockout of `family` on `row` to `until`, if that is later
    fn lock(&mut self, row: RowId, family: EffectFamily, until: GameCycle, now: GameCycle) {
        if until <= now {
            return;
        }
        let entry = self.lockouts.entry((row, family)).or_insert(until);
        *entry = (*entry).max(until);
    }

    // ─── Ticking ────────────────────────────────────────────────────────────

    /// Fire every timer due at the clock's current cycle
    pub fn tick(&mut self, clock: &dyn TickClock, directory: &mut dyn EntityDirectory) -> TickReport {
        let now = clock.current_cycle();
        let mut report = TickReport {
            cycle: now,
            ..TickReport::default()
        };
        let Self {
            config,
            scheduler,
            registry,
            lockouts,
            ..
        } = self;
        lockouts.retain(|_, until| *until > now);

        while let Some(fired) = scheduler.pop_due(now) {
            report.fired += 1;
            let key = fired.payload;
            let Some(effect) = registry.get_mut(key) else {
                tracing::debug!(%key, "Timer fired for an effect that is gone");
                continue;
            };
            effect.timed_mut().timer = None;

            let event = TimerEvent {
                handle: fired.handle,
                due: fired.due,
                fired_at: now,
            };
            let mut ctx = EffectContext::new(now, &mut *directory, config.retry_delay());
            let still_active = effect.update(&event, &mut ctx, config.apply_effects);
            let rearm = ctx.take_rearm();

            if !still_active {
                finish(effect, &mut ctx);
                registry.take(key);
                report.expired += 1;
                continue;
            }

            let timed = effect.timed_mut();
            let due = match rearm {
                Some(Rearm::Retry(delay)) => {
                    timed.retries = timed.retries.saturating_add(1);
                    report.retried += 1;
                    if timed.retries == config.retry_warn_after {
                        tracing::warn!(
                            %key,
                            family = %timed.family,
                            retries = timed.retries,
                            "Effect target has been unreachable for a long time, still retrying"
                        );
                    }
                    if let Some(max) = config.max_retries
                        && timed.retries > max
                    {
                        tracing::warn!(
                            %key,
                            family = %timed.family,
                            retries = timed.retries,
                            "Giving up on unreachable effect target"
                        );
                        finish(effect, &mut ctx);
                        registry.take(key);
                        report.abandoned += 1;
                        continue;
                    }
                    now.saturating_add(delay)
                }
                Some(Rearm::After(ticks)) => {
                    timed.retries = 0;
                    report.rearmed += 1;
                    now.saturating_add(ticks)
                }
                None => {
                    timed.retries = 0;
                    let due = timed.end_cycle.max(now.saturating_add(1));
                    tracing::debug!(%key, due, "Still active without a rearm request, holding until expiry");
                    due
                }
            };

            let handle = scheduler.schedule_at(due, key);
            effect.timed_mut().timer = Some(handle);
        }

        if !report.is_idle() {
            tracing::debug!(
                cycle = now,
                fired = report.fired,
                expired = report.expired,
                retried = report.retried,
                "Tick processed"
            );
        }
        report
    }

    // ─── Forced removal ─────────────────────────────────────────────────────

    /// End one effect early. Returns false if it is not registered.
    pub fn dispel(
        &mut self,
        clock: &dyn TickClock,
        directory: &mut dyn EntityDirectory,
        key: EffectKey,
    ) -> bool {
        let now = clock.current_cycle();
        let Some(effect) = self.registry.get_mut(key) else {
            return false;
        };
        let mut ctx = EffectContext::new(now, directory, self.config.retry_delay());
        finish(effect, &mut ctx);
        if let Some(handle) = effect.timed_mut().timer.take() {
            self.scheduler.cancel(handle);
        }
        self.registry.take(key);
        tracing::debug!(%key, cycle = now, "Effect dispelled");
        true
    }

    /// Run `removed` for every effect on `row` and cancel their timers
    pub fn teardown_entity(
        &mut self,
        clock: &dyn TickClock,
        directory: &mut dyn EntityDirectory,
        row: RowId,
    ) -> usize {
        self.lockouts.retain(|(locked, _), _| *locked != row);
        let mut ctx = EffectContext::new(clock.current_cycle(), directory, self.config.retry_delay());
        self.registry.remove_all(row, &mut ctx, &mut self.scheduler)
    }

    /// Logout path: save the entity's effects and lockouts, then tear them
    /// down. `None` if the row does not resolve to an entity id, in which
    /// case nothing is torn down either.
    pub fn detach_entity(
        &mut self,
        clock: &dyn TickClock,
        directory: &mut dyn EntityDirectory,
        row: RowId,
    ) -> Option<EntityEffects> {
        let saved = self.snapshot_entity(clock, &*directory, row)?;
        let removed = self.teardown_entity(clock, directory, row);
        tracing::info!(
            target_row = %row,
            saved = saved.effects.len(),
            lockouts = saved.lockouts.len(),
            removed,
            "Entity effects detached"
        );
        Some(saved)
    }

    // ─── Persistence ────────────────────────────────────────────────────────

    /// Records for every effect on `row` in registration order, plus the
    /// lockouts still running on it. `None` if the row has no stable id.
    pub fn snapshot_entity(
        &self,
        clock: &dyn TickClock,
        directory: &dyn EntityDirectory,
        row: RowId,
    ) -> Option<EntityEffects> {
        let now = clock.current_cycle();
        let Some(entity_id) = directory.entity_id(row) else {
            tracing::warn!(
                target_row = %row,
                effects = self.registry.count_for(row),
                "Cannot resolve entity id, effects not saved"
            );
            return None;
        };
        let effects = self
            .registry
            .effects(row)
            .map(|(_, effect)| encode_effect(effect, now, directory))
            .collect();
        Some(EntityEffects {
            entity_id,
            effects,
            lockouts: self.lockouts_of(row, now),
        })
    }

    /// Every effect and lockout on every loaded entity. Rows that no longer
    /// resolve to a stable id cannot be saved and are left out.
    pub fn snapshot(&self, clock: &dyn TickClock, directory: &dyn EntityDirectory) -> EffectSnapshot {
        let now = clock.current_cycle();
        let mut rows = self.registry.targets();
        rows.extend(
            self.lockouts
                .iter()
                .filter(|(_, until)| **until > now)
                .map(|((row, _), _)| *row),
        );
        rows.sort_unstable();
        rows.dedup();

        let mut snapshot = EffectSnapshot::new(now);
        snapshot.entities = rows
            .into_iter()
            .filter_map(|row| self.snapshot_entity(clock, directory, row))
            .filter(|saved| !saved.is_empty())
            .collect();
        snapshot
    }

    /// Lockouts on `row` still running at `now`, as remaining ticks
    pub fn lockouts_of(&self, row: RowId, now: GameCycle) -> Vec<LockoutRecord> {
        let mut lockouts: Vec<_> = self
            .lockouts
            .iter()
            .filter(|((locked, _), until)| *locked == row && **until > now)
            .map(|((_, family), until)| LockoutRecord {
                family: *family,
                remaining_ticks: until - now,
            })
            .collect();
        lockouts.sort_unstable_by_key(|l| l.family.as_str());
        lockouts
    }

    /// Rebuild saved effects and lockouts on a loaded entity. Records that
    /// fail to decode are skipped; the rest still load.
    pub fn restore_entity(
        &mut self,
        clock: &dyn TickClock,
        directory: &mut dyn EntityDirectory,
        saved: &EntityEffects,
    ) -> RestoreReport {
        let now = clock.current_cycle();
        self.scheduler.sync(now);
        let mut report = RestoreReport::default();
        let entity_id = saved.entity_id;

        let Some(row) = directory.row_of(entity_id) else {
            tracing::warn!(
                entity = %entity_id,
                records = saved.effects.len(),
                "Entity not loaded, effects not restored"
            );
            report.missing_entities += 1;
            return report;
        };

        for lockout in &saved.lockouts {
            self.lock(row, lockout.family, now.saturating_add(lockout.remaining_ticks), now);
        }
        for record in &saved.effects {
            match self.codecs.decode(record, now, &*directory, row) {
                Ok(effect) => {
                    let key = self.register(effect, now);
                    tracing::debug!(%key, family = %record.family, "Effect restored");
                    report.restored += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        entity = %entity_id,
                        family = %record.family,
                        "Failed to restore effect, skipping"
                    );
                    report.rejected += 1;
                }
            }
        }
        report
    }

    pub fn restore(
        &mut self,
        clock: &dyn TickClock,
        directory: &mut dyn EntityDirectory,
        snapshot: &EffectSnapshot,
    ) -> RestoreReport {
        let mut report = RestoreReport::default();
        for entity in &snapshot.entities {
            report.merge(self.restore_entity(clock, directory, entity));
        }
        tracing::info!(
            restored = report.restored,
            rejected = report.rejected,
            missing_entities = report.missing_entities,
            "Snapshot restored"
        );
        report
    }

    // ─── Queries ────────────────────────────────────────────────────────────

    pub fn effect(&self, key: EffectKey) -> Option<&dyn Effect> {
        self.registry.get(key)
    }

    pub fn effects_of(&self, row: RowId) -> impl Iterator<Item = (EffectKey, &dyn Effect)> {
        self.registry.effects(row)
    }

    pub fn families_of(&self, row: RowId) -> Vec<EffectFamily> {
        self.registry.families(row)
    }

    pub fn find(&self, id: EffectId) -> Option<EffectKey> {
        self.registry.find(id)
    }

    /// Every registered key, grouped by target
    pub fn keys(&self) -> Vec<EffectKey> {
        self.registry.keys()
    }

    /// Cycle the effect's pending timer is due on
    pub fn next_firing(&self, key: EffectKey) -> Option<GameCycle> {
        let handle = self.registry.get(key)?.timed().timer()?;
        self.scheduler.due_cycle(handle)
    }

    /// Lockout for `family` on `row` still running at `cycle`
    pub fn lockout(&self, row: RowId, family: EffectFamily, cycle: GameCycle) -> Option<GameCycle> {
        self.lockouts
            .get(&(row, family))
            .copied()
            .filter(|until| *until > cycle)
    }

    pub fn is_locked(&self, row: RowId, family: EffectFamily, cycle: GameCycle) -> bool {
        self.lockout(row, family, cycle).is_some()
    }

    pub fn pending_timers(&self) -> usize {
        self.scheduler.len()
    }

    pub fn active_count(&self) -> usize {
        self.registry.len()
    }
}

/// Run `removed` once and mark the effect dead
fn finish(effect: &mut dyn Effect, ctx: &mut EffectContext<'_>) {
    if effect.timed().lifecycle == Lifecycle::Removed {
        return;
    }
    effect.removed(ctx);
    effect.timed_mut().lifecycle = Lifecycle::Removed;
}
