//! Attribute tags an effect can modify.
//!
//! Tags are written to persisted records by name, so the names returned by
//! `as_str` / `Display` must never change once shipped.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Returned when a stable name does not match any known tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownName(pub String);

impl fmt::Display for UnknownName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown name '{}'", self.0)
    }
}

impl std::error::Error for UnknownName {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionType {
    Acid,
    Cold,
    Rot,
    Fire,
    Shockwave,
    Poison,
    Electricity,
}

impl ProtectionType {
    pub const ALL: [ProtectionType; 7] = [
        Self::Acid,
        Self::Cold,
        Self::Rot,
        Self::Fire,
        Self::Shockwave,
        Self::Poison,
        Self::Electricity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Acid => "acid",
            Self::Cold => "cold",
            Self::Rot => "rot",
            Self::Fire => "fire",
            Self::Shockwave => "shockwave",
            Self::Poison => "poison",
            Self::Electricity => "electricity",
        }
    }
}

impl fmt::Display for ProtectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtectionType {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == lower)
            .ok_or_else(|| UnknownName(s.to_string()))
    }
}

/// An integer attribute on a live entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeTag {
    /// Unclamped magic protection against one damage type
    MagicProtection(ProtectionType),
    HitPoints,
}

const MAGIC_PROTECTION_PREFIX: &str = "magic_protection.";
const HIT_POINTS: &str = "hit_points";

impl fmt::Display for AttributeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MagicProtection(p) => write!(f, "{MAGIC_PROTECTION_PREFIX}{p}"),
            Self::HitPoints => f.write_str(HIT_POINTS),
        }
    }
}

impl FromStr for AttributeTag {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == HIT_POINTS {
            return Ok(Self::HitPoints);
        }
        s.strip_prefix(MAGIC_PROTECTION_PREFIX)
            .and_then(|rest| rest.parse().ok())
            .map(Self::MagicProtection)
            .ok_or_else(|| UnknownName(s.to_string()))
    }
}

impl Serialize for AttributeTag {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AttributeTag {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_names_are_stable() {
        assert_eq!(
            AttributeTag::MagicProtection(ProtectionType::Fire).to_string(),
            "magic_protection.fire"
        );
        assert_eq!(AttributeTag::HitPoints.to_string(), "hit_points");
    }

    #[test]
    fn test_attribute_parse() {
        assert_eq!(
            "magic_protection.shockwave".parse::<AttributeTag>().unwrap(),
            AttributeTag::MagicProtection(ProtectionType::Shockwave)
        );
        assert_eq!("hit_points".parse::<AttributeTag>().unwrap(), AttributeTag::HitPoints);
        assert!("magic_protection.".parse::<AttributeTag>().is_err());
        assert!("stamina".parse::<AttributeTag>().is_err());
    }

    #[test]
    fn test_protection_parse_is_case_insensitive() {
        assert_eq!("Cold".parse::<ProtectionType>().unwrap(), ProtectionType::Cold);
        assert_eq!(
            "pebkac".parse::<ProtectionType>(),
            Err(UnknownName("pebkac".to_string()))
        );
    }

    #[test]
    fn test_attribute_serde_uses_name() {
        #[derive(Serialize, Deserialize)]
        struct Holder {
            tag: AttributeTag,
        }
        let text = toml::to_string(&Holder {
            tag: AttributeTag::MagicProtection(ProtectionType::Rot),
        })
        .unwrap();
        assert_eq!(text.trim(), r#"tag = "magic_protection.rot""#);
        let back: Holder = toml::from_str(&text).unwrap();
        assert_eq!(back.tag, AttributeTag::MagicProtection(ProtectionType::Rot));
    }
}
