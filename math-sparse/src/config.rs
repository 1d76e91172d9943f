//! JSON-loadable tuning for the CSR3 storage engine

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Insertion and growth policy of a [`Csr3Matrix`](crate::Csr3Matrix)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Csr3Config {
    /// How far an insertion searches for a hole before reallocating
    pub max_shifts: usize,
    /// Per-row capacity multiplier applied on reallocation (values below 1 act as 1)
    pub growth_factor: f64,
}

impl Default for Csr3Config {
    fn default() -> Self {
        Self {
            max_shifts: usize::MAX,
            growth_factor: 1.5,
        }
    }
}

impl Csr3Config {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Parse configuration from a JSON string; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Save configuration to a JSON file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// New capacity of a row that currently holds `capacity` slots.
    ///
    /// Always at least one more than before, so a full row gains a hole.
    pub(crate) fn grown_capacity(&self, capacity: usize) -> usize {
        let factor = if self.growth_factor.is_finite() {
            self.growth_factor.max(1.0)
        } else {
            1.0
        };
        let grown = (capacity as f64 * factor).ceil() as usize;
        grown.max(capacity + 1)
    }
}
