use hashbrown::HashMap;
use tickfx_types::{EffectFamily, GameCycle, RowId};

use super::record::{CodecError, EffectRecord, RecordReader, RecordWriter};
use crate::directory::EntityDirectory;
use crate::effects::{DamageOverTime, Effect, ModMagicProtection, TimedEffect};

/// Rebuilds a family's effect from the fields following the shared ones
pub type DecodeFn =
    fn(&mut RecordReader<'_>, TimedEffect) -> Result<Box<dyn Effect>, CodecError>;

/// Family → decoder table used on restore
#[derive(Clone, Default)]
pub struct EffectCodecs {
    table: HashMap<EffectFamily, DecodeFn>,
}

impl std::fmt::Debug for EffectCodecs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut families: Vec<_> = self.table.keys().map(|f| f.as_str()).collect();
        families.sort_unstable();
        f.debug_struct("EffectCodecs")
            .field("families", &families)
            .finish()
    }
}

impl EffectCodecs {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every family this crate ships
    pub fn standard() -> Self {
        let mut codecs = Self::empty();
        codecs.register(EffectFamily::PowerModMagicProtection, ModMagicProtection::decode);
        codecs.register(EffectFamily::DamageOverTime, DamageOverTime::decode);
        codecs
    }

    /// Add or replace the decoder for `family`
    pub fn register(&mut self, family: EffectFamily, decode: DecodeFn) {
        self.table.insert(family, decode);
    }

    pub fn supports(&self, family: EffectFamily) -> bool {
        self.table.contains_key(&family)
    }

    /// Rebuild an effect on `target`. Remaining tick counts are turned back
    /// into absolute cycles against `now`.
    pub fn decode(
        &self,
        record: &EffectRecord,
        now: GameCycle,
        directory: &dyn EntityDirectory,
        target: RowId,
    ) -> Result<Box<dyn Effect>, CodecError> {
        let decode = self
            .table
            .get(&record.family)
            .ok_or(CodecError::UnknownFamily(record.family))?;
        let mut reader = RecordReader::new(record, now);
        let timed = TimedEffect::apply(&mut reader, target, directory)?;
        decode(&mut reader, timed)
    }
}

/// Shared fields first, then the family's own
pub fn encode_effect(
    effect: &dyn Effect,
    now: GameCycle,
    directory: &dyn EntityDirectory,
) -> EffectRecord {
    let mut writer = RecordWriter::new(effect.family(), now);
    effect.timed().store(&mut writer, directory);
    effect.store(&mut writer);
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::Roster;
    use crate::effects::{DamageOverTimeSpec, EffectFactory, ModMagicProtectionSpec};
    use crate::persist::FieldValue;
    use tickfx_types::{EntityId, ProtectionType};

    fn protection(roster: &mut Roster, now: GameCycle, duration: u64) -> Box<dyn Effect> {
        let caster = roster.spawn(EntityId(1), "Caster");
        let target = roster.spawn(EntityId(2), "Target");
        let spec = ModMagicProtectionSpec {
            protection: ProtectionType::Cold,
            modifier1: 4,
            modifier2: 1,
            disable_ticks: 25,
        };
        let base = TimedEffect::new(
            Some(caster),
            Some(EntityId(1)),
            target,
            spec.family(),
            now + duration,
        );
        spec.build(base, now).unwrap()
    }

    #[test]
    fn test_restored_expiry_is_load_cycle_plus_remaining() {
        let mut roster = Roster::new();
        let effect = protection(&mut roster, 1_000, 50);
        let record = encode_effect(effect.as_ref(), 1_020, &roster);

        let target = effect.target();
        let restored = EffectCodecs::standard()
            .decode(&record, 7, &roster, target)
            .unwrap();
        assert_eq!(restored.timed().end_cycle, 7 + 30);
        assert_eq!(restored.lockout_until(), Some(7 + 5));
        assert_eq!(restored.describe(), effect.describe());
    }

    #[test]
    fn test_creator_reresolved_by_entity_id() {
        let mut roster = Roster::new();
        let effect = protection(&mut roster, 0, 10);
        let record = encode_effect(effect.as_ref(), 0, &roster);

        let mut fresh = Roster::new();
        fresh.spawn(EntityId(99), "Filler");
        let target = fresh.spawn(EntityId(2), "Target");
        let caster = fresh.spawn(EntityId(1), "Caster");

        let restored = EffectCodecs::standard()
            .decode(&record, 0, &fresh, target)
            .unwrap();
        assert_eq!(restored.timed().creator, Some(caster));
        assert_eq!(restored.timed().creator_entity_id, Some(EntityId(1)));
    }

    #[test]
    fn test_absent_creator_is_tolerated() {
        let mut roster = Roster::new();
        let effect = protection(&mut roster, 0, 10);
        let record = encode_effect(effect.as_ref(), 0, &roster);

        let mut fresh = Roster::new();
        let target = fresh.spawn(EntityId(2), "Target");
        let restored = EffectCodecs::standard()
            .decode(&record, 0, &fresh, target)
            .unwrap();
        assert_eq!(restored.timed().creator, None);
        assert_eq!(restored.timed().creator_entity_id, Some(EntityId(1)));
    }

    #[test]
    fn test_damage_over_time_keeps_its_cadence() {
        let mut roster = Roster::new();
        let target = roster.spawn(EntityId(5), "Target");
        let spec = DamageOverTimeSpec {
            damage_per_tick: 3,
            period: 10,
        };
        let base = TimedEffect::new(None, None, target, spec.family(), 100);
        let effect = spec.build(base, 0).unwrap();
        assert_eq!(effect.first_due(), 10);

        let record = encode_effect(effect.as_ref(), 4, &roster);
        let restored = EffectCodecs::standard()
            .decode(&record, 500, &roster, target)
            .unwrap();
        assert_eq!(restored.first_due(), 506);
        assert_eq!(restored.timed().end_cycle, 596);
    }

    #[test]
    fn test_unregistered_family_is_rejected() {
        let mut roster = Roster::new();
        let effect = protection(&mut roster, 0, 10);
        let record = encode_effect(effect.as_ref(), 0, &roster);

        let codecs = EffectCodecs::empty();
        assert!(!codecs.supports(EffectFamily::PowerModMagicProtection));
        assert!(matches!(
            codecs.decode(&record, 0, &roster, effect.target()),
            Err(CodecError::UnknownFamily(EffectFamily::PowerModMagicProtection))
        ));
    }

    #[test]
    fn test_bad_field_fails_decode() {
        let mut roster = Roster::new();
        let effect = protection(&mut roster, 0, 10);
        let mut record = encode_effect(effect.as_ref(), 0, &roster);
        for field in &mut record.fields {
            if field.name == "affected_protection" {
                field.value = FieldValue::Text("plasma".into());
            }
        }

        let err = EffectCodecs::standard()
            .decode(&record, 0, &roster, effect.target())
            .unwrap_err();
        assert!(matches!(
            err,
            CodecError::InvalidValue {
                field: "affected_protection",
                ..
            }
        ));
    }
}
