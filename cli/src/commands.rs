use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;

use tickfx_core::config::save_config;
use tickfx_core::effects::{Activation, DamageOverTimeSpec, ModMagicProtectionSpec};
use tickfx_core::{
    AttributeTag, EffectEngine, EffectId, EffectSnapshot, EngineConfig, EntityDirectory,
    ProtectionType, TickClock, TickReport,
};
use tickfx_types::formatting::{DEFAULT_TICK_MS, format_signed, format_thousands, format_ticks};

use crate::world::{DEFAULT_HIT_POINTS, Parked, World};

type Shared = Arc<RwLock<World>>;

pub async fn spawn(name: &str, hit_points: Option<i32>, state: Shared) -> Result<(), String> {
    let mut world = state.write().await;
    if world.roster.find_by_name(name).is_some() {
        return Err(format!("error: '{name}' is already loaded"));
    }
    let id = world.mint_entity_id();
    let row = world.roster.spawn(id, name);
    if let Some(entity) = world.roster.entity_mut(row) {
        entity.set_attribute(AttributeTag::HitPoints, hit_points.unwrap_or(DEFAULT_HIT_POINTS));
    }
    println!("{name} spawned as {id} at {row}");
    Ok(())
}

pub async fn set_accessible(name: &str, accessible: bool, state: Shared) -> Result<(), String> {
    let mut world = state.write().await;
    let row = world.resolve(name)?;
    world.roster.set_accessible(row, accessible);
    let verb = if accessible { "reachable" } else { "unreachable" };
    println!("{name} is now {verb}");
    Ok(())
}

pub async fn protect(
    target: &str,
    spec: ModMagicProtectionSpec,
    duration: u64,
    caster: Option<&str>,
    state: Shared,
) -> Result<(), String> {
    let mut world = state.write().await;
    let activation = activation(&world, target, duration, caster)?;
    let World {
        clock,
        roster,
        engine,
        ..
    } = &mut *world;
    let key = engine
        .try_activate(&*clock, roster, activation, spec)
        .map_err(|e| format!("error: {e}"))?;
    println!(
        "{} {} on {target} for {} (effect {})",
        AttributeTag::MagicProtection(spec.protection),
        format_signed(spec.modifier1.saturating_add(spec.modifier2)),
        format_ticks(duration, DEFAULT_TICK_MS),
        key.id
    );
    Ok(())
}

pub async fn damage_over_time(
    target: &str,
    spec: DamageOverTimeSpec,
    duration: u64,
    caster: Option<&str>,
    state: Shared,
) -> Result<(), String> {
    let mut world = state.write().await;
    let activation = activation(&world, target, duration, caster)?;
    let World {
        clock,
        roster,
        engine,
        ..
    } = &mut *world;
    let key = engine
        .try_activate(&*clock, roster, activation, spec)
        .map_err(|e| format!("error: {e}"))?;
    println!(
        "{} damage every {} ticks on {target} for {} (effect {})",
        spec.damage_per_tick,
        spec.period,
        format_ticks(duration, DEFAULT_TICK_MS),
        key.id
    );
    Ok(())
}

fn activation(
    world: &World,
    target: &str,
    duration: u64,
    caster: Option<&str>,
) -> Result<Activation, String> {
    let mut activation = Activation::new(world.resolve(target)?, duration);
    if let Some(caster) = caster {
        activation = activation.by(world.resolve(caster)?);
    }
    Ok(activation)
}

pub async fn dispel(id: u64, state: Shared) -> Result<(), String> {
    let mut world = state.write().await;
    let World {
        clock,
        roster,
        engine,
        ..
    } = &mut *world;
    let key = engine
        .find(EffectId(id))
        .ok_or_else(|| format!("error: no active effect {}", EffectId(id)))?;
    engine.dispel(&*clock, roster, key);
    println!("Effect {} dispelled", key.id);
    Ok(())
}

pub async fn tick(count: u64, state: Shared) -> Result<(), String> {
    let mut world = state.write().await;
    let World {
        clock,
        roster,
        engine,
        ..
    } = &mut *world;

    let mut total = TickReport::default();
    for _ in 0..count {
        clock.advance(1);
        let report = engine.tick(&*clock, roster);
        total.fired += report.fired;
        total.expired += report.expired;
        total.retried += report.retried;
        total.rearmed += report.rearmed;
        total.abandoned += report.abandoned;
    }
    println!(
        "cycle {}: {} fired, {} expired, {} retried, {} rearmed, {} abandoned",
        format_thousands(clock.current_cycle() as i64),
        total.fired,
        total.expired,
        total.retried,
        total.rearmed,
        total.abandoned
    );
    Ok(())
}

pub async fn status(name: Option<&str>, state: Shared) -> Result<(), String> {
    let world = state.read().await;
    let now = world.clock.current_cycle();
    println!(
        "cycle {} | {} active effects | {} pending timers",
        format_thousands(now as i64),
        world.engine.active_count(),
        world.engine.pending_timers()
    );

    let rows = match name {
        Some(name) => vec![world.resolve(name)?],
        None => world.roster.iter().map(|(row, _)| row).collect(),
    };
    for row in rows {
        let Some(character) = world.roster.character(row) else {
            continue;
        };
        let reach = if character.is_accessible() {
            ""
        } else {
            " (unreachable)"
        };
        println!("{} {} {row}{reach}", character.name, character.entity_id);
        for (tag, value) in character.attributes() {
            println!("    {tag} = {value}");
        }
        print_effects(&world.engine, row, now);
    }

    if !world.parked.is_empty() {
        println!("logged out:");
        for (id, parked) in &world.parked {
            println!(
                "    {} {} ({} saved effects)",
                parked.name,
                id,
                parked.saved.effects.len()
            );
        }
    }
    Ok(())
}

fn print_effects(engine: &EffectEngine, row: tickfx_core::RowId, now: u64) {
    for (key, effect) in engine.effects_of(row) {
        let timed = effect.timed();
        let next = engine
            .next_firing(key)
            .map(|due| format!("next in {}", format_ticks(due.saturating_sub(now), DEFAULT_TICK_MS)))
            .unwrap_or_else(|| "no timer".to_string());
        println!(
            "    {} {} | ends in {} | {next} | {:?} retries={}",
            key.id,
            effect.describe(),
            format_ticks(timed.remaining(now), DEFAULT_TICK_MS),
            timed.lifecycle,
            timed.retries
        );
    }
    for lockout in engine.lockouts_of(row, now) {
        println!(
            "    {} locked for {}",
            lockout.family,
            format_ticks(lockout.remaining_ticks, DEFAULT_TICK_MS)
        );
    }
}

/// Save the character's effects, end them, and unload it
pub async fn logout(name: &str, state: Shared) -> Result<(), String> {
    let mut world = state.write().await;
    let row = world.resolve(name)?;
    let World {
        clock,
        roster,
        engine,
        parked,
        ..
    } = &mut *world;

    let saved = engine
        .detach_entity(&*clock, roster, row)
        .ok_or_else(|| format!("error: '{name}' has no stable id"))?;
    let Some(character) = roster.despawn(row) else {
        return Err(format!("error: '{name}' vanished during logout"));
    };
    println!(
        "{} logged out with {} effects and {} lockouts saved",
        character.name,
        saved.effects.len(),
        saved.lockouts.len()
    );
    parked.insert(
        character.entity_id,
        Parked {
            name: character.name.clone(),
            attributes: character.attributes(),
            saved,
        },
    );
    Ok(())
}

/// Load a logged out character back and restore its effects
pub async fn login(name: &str, state: Shared) -> Result<(), String> {
    let mut world = state.write().await;
    let id = world
        .parked_by_name(name)
        .ok_or_else(|| format!("error: '{name}' is not logged out"))?;
    let World {
        clock,
        roster,
        engine,
        parked,
        ..
    } = &mut *world;
    let Some(character) = parked.remove(&id) else {
        return Err(format!("error: '{name}' is not logged out"));
    };

    let row = roster.spawn(id, &character.name);
    if let Some(entity) = roster.entity_mut(row) {
        for (tag, value) in &character.attributes {
            entity.set_attribute(*tag, *value);
        }
    }
    let report = engine.restore_entity(&*clock, roster, &character.saved);
    println!(
        "{} logged in at {row}: {} effects restored, {} rejected",
        character.name, report.restored, report.rejected
    );
    Ok(())
}

fn snapshot_path(path: Option<&str>, world: &World) -> Result<PathBuf, String> {
    path.map(PathBuf::from)
        .or_else(|| world.snapshot_path.clone())
        .ok_or_else(|| "error: no snapshot path given and no data directory found".to_string())
}

/// Serialize under the lock, write outside it
pub async fn save(path: Option<&str>, state: Shared) -> Result<(), String> {
    let (path, json, count) = {
        let world = state.read().await;
        let path = snapshot_path(path, &world)?;
        let snapshot = world.engine.snapshot(&world.clock, &world.roster);
        let json = snapshot.to_json().map_err(|e| format!("error: {e}"))?;
        (path, json, snapshot.effect_count())
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| format!("error: {}: {e}", parent.display()))?;
    }
    tokio::fs::write(&path, json)
        .await
        .map_err(|e| format!("error: {}: {e}", path.display()))?;
    tracing::info!(path = %path.display(), effects = count, "Snapshot written");
    println!("Saved {count} effects to {}", path.display());
    Ok(())
}

/// Read outside the lock, restore under it
pub async fn load(path: Option<&str>, state: Shared) -> Result<(), String> {
    let path = {
        let world = state.read().await;
        snapshot_path(path, &world)?
    };
    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| format!("error: {}: {e}", path.display()))?;
    let snapshot = EffectSnapshot::from_json(&content).map_err(|e| format!("error: {e}"))?;

    let mut world = state.write().await;
    let World {
        clock,
        roster,
        engine,
        ..
    } = &mut *world;
    let report = engine.restore(&*clock, roster, &snapshot);
    println!(
        "Loaded snapshot from {}: {} restored, {} rejected, {} entities not loaded",
        snapshot.saved_at.format("%Y-%m-%d %H:%M:%S"),
        report.restored,
        report.rejected,
        report.missing_entities
    );
    Ok(())
}

pub struct ConfigChange {
    pub retry_delay: Option<u32>,
    pub retry_warn_after: Option<u32>,
    pub max_retries: Option<u32>,
    pub unbounded: bool,
    pub apply_effects: Option<bool>,
    pub save: bool,
}

impl ConfigChange {
    fn is_empty(&self) -> bool {
        self.retry_delay.is_none()
            && self.retry_warn_after.is_none()
            && self.max_retries.is_none()
            && !self.unbounded
            && self.apply_effects.is_none()
    }

    fn apply(&self, config: &mut EngineConfig) {
        if let Some(delay) = self.retry_delay {
            config.retry_delay_ticks = delay;
        }
        if let Some(after) = self.retry_warn_after {
            config.retry_warn_after = after;
        }
        if self.unbounded {
            config.max_retries = None;
        } else if let Some(max) = self.max_retries {
            config.max_retries = Some(max);
        }
        if let Some(apply) = self.apply_effects {
            config.apply_effects = apply;
        }
    }
}

pub async fn config(change: ConfigChange, state: Shared) -> Result<(), String> {
    let mut world = state.write().await;
    if !change.is_empty() {
        let mut config = world.engine.config().clone();
        change.apply(&mut config);
        world.engine.set_config(config);
    }

    let config = world.engine.config().clone();
    println!("retry_delay_ticks = {}", config.retry_delay_ticks);
    println!("retry_warn_after  = {}", config.retry_warn_after);
    match config.max_retries {
        Some(max) => println!("max_retries       = {max}"),
        None => println!("max_retries       = unbounded"),
    }
    println!("apply_effects     = {}", config.apply_effects);

    if change.save {
        let path = world
            .config_path
            .clone()
            .ok_or("error: no config directory found")?;
        drop(world);
        save_config(&path, &config).map_err(|e| format!("error: {e}"))?;
        println!("Saved to {}", path.display());
    }
    Ok(())
}

pub fn parse_protection(name: &str) -> Result<ProtectionType, String> {
    name.parse::<ProtectionType>()
        .map_err(|e| format!("error: {e}"))
}

pub fn exit() {
    println!("Exiting...");
}
