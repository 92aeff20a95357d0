//! Session configuration
//!
//! ```toml
//! cache_capacity = 128
//!
//! [cache_capacities]
//! Foo = 16
//! ```

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::errors::{OrmError, Result};

/// Default number of entities kept per type
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

/// Tunables for a [`Session`](crate::Session)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Cache bound applied to every type without an override
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Per-type cache bounds, keyed by registered type name
    #[serde(default)]
    pub cache_capacities: BTreeMap<String, usize>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_capacities: BTreeMap::new(),
        }
    }
}

impl SessionConfig {
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn with_type_capacity(mut self, type_name: impl Into<String>, capacity: usize) -> Self {
        self.cache_capacities.insert(type_name.into(), capacity);
        self
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: SessionConfig = toml::from_str(input).map_err(|e| OrmError::InvalidConfig {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject zero capacities
    pub fn validate(&self) -> Result<()> {
        if self.cache_capacity == 0 {
            return Err(OrmError::InvalidConfig {
                reason: "cache_capacity must be at least 1".to_string(),
            });
        }
        if let Some((name, _)) = self.cache_capacities.iter().find(|(_, c)| **c == 0) {
            return Err(OrmError::InvalidConfig {
                reason: format!("cache capacity for {} must be at least 1", name),
            });
        }
        Ok(())
    }

    /// Cache bound for `type_name`
    pub fn capacity_for(&self, type_name: &str) -> usize {
        self.cache_capacities
            .get(type_name)
            .copied()
            .unwrap_or(self.cache_capacity)
    }
}
