use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::attribute::UnknownName;

/// Classification tag for an effect variant.
///
/// Used for listing, logging, lockouts and for picking a decoder when a
/// persisted record is loaded. Shared engine code never branches on it; each
/// concrete effect type owns its own behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectFamily {
    /// Temporary bonus or malus to one magic protection
    PowerModMagicProtection,
    /// Periodic hit point loss
    DamageOverTime,
}

impl EffectFamily {
    pub const ALL: [EffectFamily; 2] = [Self::PowerModMagicProtection, Self::DamageOverTime];

    /// Stable name, identical to the serde representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PowerModMagicProtection => "power_mod_magic_protection",
            Self::DamageOverTime => "damage_over_time",
        }
    }
}

impl fmt::Display for EffectFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EffectFamily {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|family| family.as_str() == s)
            .ok_or_else(|| UnknownName(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_names_round_trip() {
        for family in EffectFamily::ALL {
            assert_eq!(family.as_str().parse::<EffectFamily>().unwrap(), family);
        }
    }

    #[test]
    fn test_family_serde_matches_as_str() {
        #[derive(Serialize, Deserialize)]
        struct Holder {
            family: EffectFamily,
        }
        let text = toml::to_string(&Holder {
            family: EffectFamily::DamageOverTime,
        })
        .unwrap();
        assert_eq!(text.trim(), r#"family = "damage_over_time""#);
    }

    #[test]
    fn test_unknown_family_is_rejected() {
        assert!("mod_defense".parse::<EffectFamily>().is_err());
    }
}
