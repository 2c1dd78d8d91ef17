//! Heap configuration - sizing and growth policy for owned resource heaps
//!
//! Read from `atomheap.toml`:
//!
//! ```toml
//! initial_length = 65536
//! max_length = 16777216
//! auto_grow = true
//! growth_factor = 2
//! validate_on_open = false
//! ```

use crate::atom::MIN_CONTENTS_LENGTH;
use crate::layout::is_aligned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// File name searched for by [`HeapConfig::discover`]
pub const CONFIG_FILE_NAME: &str = "atomheap.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapConfig {
    /// Buffer length at creation
    #[serde(default = "default_initial_length")]
    pub initial_length: u32,

    /// Growth never exceeds this length
    #[serde(default = "default_max_length")]
    pub max_length: u32,

    /// Grow the buffer instead of failing with `OutOfSpace`
    #[serde(default = "default_true")]
    pub auto_grow: bool,

    /// Length multiplier per growth step
    #[serde(default = "default_growth_factor")]
    pub growth_factor: u32,

    /// Run the full layout walk whenever the heap is opened
    #[serde(default = "default_false")]
    pub validate_on_open: bool,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            initial_length: default_initial_length(),
            max_length: default_max_length(),
            auto_grow: true,
            growth_factor: default_growth_factor(),
            validate_on_open: false,
        }
    }
}

fn default_true() -> bool { true }
fn default_false() -> bool { false }
fn default_initial_length() -> u32 { 64 * 1024 }
fn default_max_length() -> u32 { 16 * 1024 * 1024 }
fn default_growth_factor() -> u32 { 2 }

impl HeapConfig {
    /// Fixed-size heap of `length` bytes that never grows
    pub fn fixed(length: u32) -> Self {
        Self {
            initial_length: length,
            max_length: length,
            auto_grow: false,
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config: {}", e))?;

        Self::parse(&content)
    }

    /// Parse and check configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self, String> {
        let config: Self = toml::from_str(content)
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        config.check()?;
        Ok(config)
    }

    /// Find `atomheap.toml` in `start` or its parents, falling back to defaults
    pub fn discover(start: &Path) -> Self {
        let mut current = Some(start.to_path_buf());

        while let Some(dir) = current {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                match Self::load(&config_path) {
                    Ok(config) => return config,
                    Err(error) => tracing::warn!(
                        path = %config_path.display(),
                        error = %error,
                        "Ignoring unreadable heap config"
                    ),
                }
            }
            current = dir.parent().map(|p| p.to_path_buf());
        }

        Self::default()
    }

    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize config: {}", e))
    }

    /// Reject lengths a heap cannot be built with
    pub fn check(&self) -> Result<(), String> {
        if !is_aligned(self.initial_length) || !is_aligned(self.max_length) {
            return Err("Heap lengths must be multiples of 16".to_string());
        }
        if self.initial_length < MIN_CONTENTS_LENGTH {
            return Err(format!(
                "initial_length {} is below the minimum of {}",
                self.initial_length, MIN_CONTENTS_LENGTH
            ));
        }
        if self.initial_length > self.max_length {
            return Err(format!(
                "initial_length {} exceeds max_length {}",
                self.initial_length, self.max_length
            ));
        }
        if self.growth_factor < 2 {
            return Err(format!("growth_factor must be at least 2, got {}", self.growth_factor));
        }
        Ok(())
    }

    /// Next buffer length able to take `required` more bytes, if growth allows
    pub fn next_length(&self, current: u32, required: u32) -> Option<u32> {
        if !self.auto_grow || self.growth_factor < 2 {
            return None;
        }
        let needed = current.checked_add(required)?;
        let mut length = current;
        while length < needed {
            let grown = length.saturating_mul(self.growth_factor);
            if grown <= length {
                return None;
            }
            length = grown;
            if length >= self.max_length {
                length = self.max_length;
                break;
            }
        }
        (length > current && length >= needed).then_some(length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_defaults() {
        let config = HeapConfig::default();
        assert_eq!(config.initial_length, 65536);
        assert_eq!(config.max_length, 16 * 1024 * 1024);
        assert!(config.auto_grow);
        assert_eq!(config.growth_factor, 2);
        assert!(!config.validate_on_open);
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_parse_partial_file() {
        let config = HeapConfig::parse("initial_length = 4096\nvalidate_on_open = true\n").unwrap();
        assert_eq!(config.initial_length, 4096);
        assert!(config.validate_on_open);
        assert_eq!(config.max_length, default_max_length());
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        assert!(HeapConfig::parse("initial_length = 100").unwrap_err().contains("multiples of 16"));
        assert!(HeapConfig::parse("initial_length = 16").unwrap_err().contains("minimum"));
        assert!(HeapConfig::parse("initial_length = 4096\nmax_length = 1024")
            .unwrap_err()
            .contains("exceeds"));
        assert!(HeapConfig::parse("growth_factor = 1").unwrap_err().contains("growth_factor"));
        assert!(HeapConfig::parse("auto_grow = \"yes\"").unwrap_err().starts_with("Failed to parse"));
    }

    #[test]
    fn test_load_and_round_trip() {
        let mut file = NamedTempFile::new().unwrap();
        let config = HeapConfig { initial_length: 1024, ..HeapConfig::fixed(2048) };
        write!(file, "{}", config.to_toml().unwrap()).unwrap();

        assert_eq!(HeapConfig::load(file.path()).unwrap(), config);
        assert!(HeapConfig::load(Path::new("/nonexistent/atomheap.toml"))
            .unwrap_err()
            .starts_with("Failed to read"));
    }

    #[test]
    fn test_discover_walks_parents() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join(CONFIG_FILE_NAME), "initial_length = 512\n").unwrap();
        let nested = root.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(HeapConfig::discover(&nested).initial_length, 512);
    }

    #[test]
    fn test_next_length_policy() {
        let config = HeapConfig { initial_length: 64, max_length: 1024, ..HeapConfig::default() };
        assert_eq!(config.next_length(64, 32), Some(128));
        assert_eq!(config.next_length(64, 200), Some(512));
        assert_eq!(config.next_length(512, 1000), None);
        assert_eq!(config.next_length(512, 400), Some(1024));
        assert_eq!(config.next_length(1024, 16), None);

        assert_eq!(HeapConfig::fixed(256).next_length(256, 16), None);
    }

    #[test]
    fn test_next_length_stops_without_progress() {
        let stalled = HeapConfig { initial_length: 64, max_length: 4096, growth_factor: 1, ..HeapConfig::default() };
        assert_eq!(stalled.next_length(64, 200), None);

        let collapsing = HeapConfig { growth_factor: 0, ..stalled.clone() };
        assert_eq!(collapsing.next_length(64, 200), None);

        let empty = HeapConfig { growth_factor: 2, ..stalled };
        assert_eq!(empty.next_length(0, 32), None);
    }
}
