// SPDX-License-Identifier: MIT OR Apache-2.0
//! Runtime configuration, stored as RON.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Error loading or saving a configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed RON
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),
}

/// Bounds for the undilated frame time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Smallest undilated delta handed to a timeline
    pub min_undilated_frame_time: f32,
    /// Largest undilated delta handed to a timeline
    pub max_undilated_frame_time: f32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            min_undilated_frame_time: 0.0005,
            max_undilated_frame_time: 0.4,
        }
    }
}

impl ClockConfig {
    /// Clamp an undilated delta into the configured bounds
    pub fn clamp_undilated(&self, delta: f32) -> f32 {
        // Inverted bounds or a NaN delta must not panic
        delta
            .max(self.min_undilated_frame_time)
            .min(self.max_undilated_frame_time)
    }
}

/// Runtime settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Clock bounds
    pub clock: ClockConfig,
    /// Default `tracing` filter directive, overridden by `RUST_LOG`
    pub log_filter: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            clock: ClockConfig::default(),
            log_filter: "object_timeline=info".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Parse from RON text
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    /// Load from a RON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_ron_str(&content)
    }

    /// Serialize to pretty RON
    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        let config = ron::ser::PrettyConfig::default().struct_names(true);
        Ok(ron::ser::to_string_pretty(self, config)?)
    }

    /// Save to a RON file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_ron_string()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(0.0, 0.0005 ; "below minimum")]
    #[test_case(0.016, 0.016 ; "inside")]
    #[test_case(2.0, 0.4 ; "above maximum")]
    #[test_case(f32::NAN, 0.0005 ; "nan")]
    fn test_clamp_undilated(delta: f32, expected: f32) {
        assert_eq!(ClockConfig::default().clamp_undilated(delta), expected);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config =
            RuntimeConfig::from_ron_str("(clock: (max_undilated_frame_time: 0.1))").unwrap();
        assert_eq!(config.clock.max_undilated_frame_time, 0.1);
        assert_eq!(config.clock.min_undilated_frame_time, 0.0005);
        assert_eq!(config.log_filter, "object_timeline=info");
    }

    #[test]
    fn test_pretty_output_parses_back() {
        let config = RuntimeConfig {
            log_filter: "object_timeline=debug".into(),
            ..RuntimeConfig::default()
        };
        let text = config.to_ron_string().unwrap();
        assert!(text.contains("RuntimeConfig"));
        assert_eq!(RuntimeConfig::from_ron_str(&text).unwrap(), config);
    }

    #[test]
    fn test_malformed_config_errors() {
        assert!(matches!(
            RuntimeConfig::from_ron_str("(clock: 3"),
            Err(ConfigError::Parse(_))
        ));
    }
}
