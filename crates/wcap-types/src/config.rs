//! Runtime configuration for a capture.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::CursorMode;
use crate::DEFAULT_NEGOTIATION_TIMEOUT_SECS;

/// Errors that can occur while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON.
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Configuration for negotiating and running a capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Seconds to wait for each portal response (None waits forever).
    pub negotiation_timeout_secs: Option<u64>,

    /// Cursor rendering mode requested from the portal.
    pub cursor_mode: CursorMode,

    /// Whether the source stamps buffers with capture time.
    pub do_timestamp: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            negotiation_timeout_secs: Some(DEFAULT_NEGOTIATION_TIMEOUT_SECS),
            cursor_mode: CursorMode::default(),
            do_timestamp: true,
        }
    }
}

impl CaptureConfig {
    /// Load a configuration from a JSON file. Missing fields use defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Parse a configuration from a JSON string. Missing fields use defaults.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Per-step negotiation timeout.
    pub fn negotiation_timeout(&self) -> Option<Duration> {
        self.negotiation_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CaptureConfig::default();
        assert_eq!(config.negotiation_timeout(), Some(Duration::from_secs(300)));
        assert_eq!(config.cursor_mode, CursorMode::Embedded);
        assert!(config.do_timestamp);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = CaptureConfig::from_json_str(r#"{ "cursor_mode": "Hidden" }"#).unwrap();
        assert_eq!(config.cursor_mode, CursorMode::Hidden);
        assert!(config.do_timestamp);
        assert_eq!(config.negotiation_timeout_secs, Some(300));
    }

    #[test]
    fn test_null_timeout_waits_forever() {
        let config =
            CaptureConfig::from_json_str(r#"{ "negotiation_timeout_secs": null }"#).unwrap();
        assert_eq!(config.negotiation_timeout(), None);
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        let err = CaptureConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
