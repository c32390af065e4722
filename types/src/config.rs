//! Engine tuning knobs, loaded from `engine.toml`.

use serde::{Deserialize, Serialize};

fn default_retry_delay() -> u32 {
    1
}

fn default_retry_warn_after() -> u32 {
    100
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Ticks to wait before re-firing an effect whose target was not accessible
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ticks: u32,

    /// Consecutive retries after which a single warning is logged
    #[serde(default = "default_retry_warn_after")]
    pub retry_warn_after: u32,

    /// Consecutive retries after which the effect is finished anyway.
    /// Unset means retry forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    /// Passed to every firing as `apply_effect`. When false, firings only do
    /// their bookkeeping and never touch target attributes.
    #[serde(default = "default_true")]
    pub apply_effects: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry_delay_ticks: default_retry_delay(),
            retry_warn_after: default_retry_warn_after(),
            max_retries: None,
            apply_effects: true,
        }
    }
}

impl EngineConfig {
    /// Retry delay, never less than one tick
    pub fn retry_delay(&self) -> u32 {
        self.retry_delay_ticks.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.retry_delay_ticks, 1);
        assert!(config.max_retries.is_none());
        assert!(config.apply_effects);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
retry_delay_ticks = 3
retry_warn_after = 20
max_retries = 50
apply_effects = false
"#;
        let config: EngineConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.retry_delay_ticks, 3);
        assert_eq!(config.retry_warn_after, 20);
        assert_eq!(config.max_retries, Some(50));
        assert!(!config.apply_effects);
    }

    #[test]
    fn test_zero_retry_delay_is_clamped() {
        let config = EngineConfig {
            retry_delay_ticks: 0,
            ..Default::default()
        };
        assert_eq!(config.retry_delay(), 1);
    }
}
