//! # World Configuration
//!
//! Capacities and diagnostic thresholds, loaded once at startup from TOML.
//!
//! ```toml
//! initial_entity_capacity = 1024
//! leak_warning_threshold = 32
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::{StrataError, StrataResult};

/// Initial slot capacity of every entity registry and component table.
pub const DEFAULT_ENTITY_CAPACITY: usize = 256;

/// Capacity of a freshly allocated pooled entity list.
pub const DEFAULT_ENTITY_LIST_CAPACITY: usize = 128;

/// Maximum number of sub worlds in one world.
pub const DEFAULT_SUB_WORLD_CAPACITY: usize = 128;

/// Initial size of a sub world's table registry.
pub const DEFAULT_TABLE_CAPACITY_HINT: usize = 8;

/// Outstanding leases of one kind before a leak warning is logged.
pub const DEFAULT_LEAK_WARNING_THRESHOLD: usize = 20;

/// Highest slot count addressable by the 16-bit slot field.
const MAX_SLOT_SPACE: usize = 1 << 15;

/// Highest sub world count addressable by the 16-bit sub world field.
const MAX_SUB_WORLDS: usize = MAX_SLOT_SPACE - 1;

/// Configuration for a [`World`](crate::World).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldConfig {
    /// Initial slot capacity of registries and tables. Grows by doubling.
    pub initial_entity_capacity: usize,
    /// Capacity of freshly allocated pooled entity lists.
    pub entity_list_capacity: usize,
    /// Maximum number of sub worlds.
    pub sub_world_capacity: usize,
    /// Initial size of each sub world's table registry.
    pub table_capacity_hint: usize,
    /// Outstanding leases of one pooled kind that trigger a debug warning.
    pub leak_warning_threshold: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            initial_entity_capacity: DEFAULT_ENTITY_CAPACITY,
            entity_list_capacity: DEFAULT_ENTITY_LIST_CAPACITY,
            sub_world_capacity: DEFAULT_SUB_WORLD_CAPACITY,
            table_capacity_hint: DEFAULT_TABLE_CAPACITY_HINT,
            leak_warning_threshold: DEFAULT_LEAK_WARNING_THRESHOLD,
        }
    }
}

impl WorldConfig {
    /// Parses and validates a configuration from TOML text.
    ///
    /// Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::InvalidConfig`] if the text is not valid TOML,
    /// names an unknown key, or fails [`validate`](Self::validate).
    pub fn from_toml_str(text: &str) -> StrataResult<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| StrataError::InvalidConfig(format!("failed to parse world config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::InvalidConfig`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> StrataResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            StrataError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks every capacity against the limits of the identity encoding.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::InvalidConfig`] naming the first offending key.
    pub fn validate(&self) -> StrataResult<()> {
        if self.initial_entity_capacity == 0 || self.initial_entity_capacity > MAX_SLOT_SPACE {
            return Err(StrataError::InvalidConfig(format!(
                "initial_entity_capacity must be in 1..={MAX_SLOT_SPACE}, got {}",
                self.initial_entity_capacity
            )));
        }
        if self.sub_world_capacity == 0 || self.sub_world_capacity > MAX_SUB_WORLDS {
            return Err(StrataError::InvalidConfig(format!(
                "sub_world_capacity must be in 1..={MAX_SUB_WORLDS}, got {}",
                self.sub_world_capacity
            )));
        }
        if self.entity_list_capacity == 0 {
            return Err(StrataError::InvalidConfig(
                "entity_list_capacity must be greater than zero".to_string(),
            ));
        }
        if self.leak_warning_threshold == 0 {
            return Err(StrataError::InvalidConfig(
                "leak_warning_threshold must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = WorldConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.initial_entity_capacity, 256);
        assert_eq!(config.leak_warning_threshold, 20);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = WorldConfig::from_toml_str("initial_entity_capacity = 8\n").unwrap();
        assert_eq!(config.initial_entity_capacity, 8);
        assert_eq!(config.sub_world_capacity, DEFAULT_SUB_WORLD_CAPACITY);
    }

    #[test]
    fn test_rejects_out_of_range_capacity() {
        let err = WorldConfig::from_toml_str("initial_entity_capacity = 40000").unwrap_err();
        assert!(matches!(err, StrataError::InvalidConfig(_)));

        let err = WorldConfig::from_toml_str("sub_world_capacity = 0").unwrap_err();
        assert!(matches!(err, StrataError::InvalidConfig(_)));
    }

    #[test]
    fn test_capacity_limits_follow_id_width() {
        let config = WorldConfig {
            initial_entity_capacity: 32_768,
            sub_world_capacity: 32_767,
            ..WorldConfig::default()
        };
        assert!(config.validate().is_ok());

        let too_many = WorldConfig {
            sub_world_capacity: 32_768,
            ..WorldConfig::default()
        };
        assert!(matches!(too_many.validate(), Err(StrataError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_unknown_keys() {
        assert!(WorldConfig::from_toml_str("entity_capacity = 8").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = WorldConfig::load("/definitely/not/here/world.toml").unwrap_err();
        assert!(matches!(err, StrataError::InvalidConfig(_)));
    }
}
