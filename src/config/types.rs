//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/wordswall/) and project (.wordswall/) level
//! configuration.

use serde::{Deserialize, Serialize};

use crate::constants;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Generation backend settings
    pub llm: LlmConfig,

    /// Job queue settings
    pub queue: QueueConfig,

    /// Enrichment pipeline settings
    pub enrich: EnrichConfig,

    /// Word store settings
    pub store: StoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            llm: LlmConfig::default(),
            queue: QueueConfig::default(),
            enrich: EnrichConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `WallError::Config` on validation failure.
    pub fn validate(&self) -> crate::types::Result<()> {
        if self.llm.timeout_secs == 0 {
            return Err(crate::types::WallError::Config(
                "llm.timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.queue.tick_interval_ms == 0 {
            return Err(crate::types::WallError::Config(
                "queue.tick_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.queue.max_attempts == 0 {
            return Err(crate::types::WallError::Config(
                "queue.max_attempts must be at least 1".to_string(),
            ));
        }

        if self.store.db_path.trim().is_empty() {
            return Err(crate::types::WallError::Config(
                "store.db_path must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Generation Backend Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama endpoint URL
    pub endpoint: String,

    /// Model name to generate with
    pub model: String,

    /// Request timeout in seconds (generation is slow on local hardware)
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: constants::llm::DEFAULT_ENDPOINT.to_string(),
            model: constants::llm::DEFAULT_MODEL.to_string(),
            timeout_secs: constants::llm::DEFAULT_TIMEOUT_SECS,
        }
    }
}

// =============================================================================
// Job Queue Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Interval between drain ticks in milliseconds
    pub tick_interval_ms: u64,

    /// Maximum attempts per job before it is dropped
    pub max_attempts: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: constants::queue::TICK_INTERVAL_MS,
            max_attempts: constants::queue::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

// =============================================================================
// Enrichment Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichConfig {
    /// Delay between consecutive deep-section model calls in seconds
    pub section_delay_secs: u64,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            section_delay_secs: constants::enrich::SECTION_DELAY_SECS,
        }
    }
}

// =============================================================================
// Word Store Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the sqlite database file
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: "wordswall.db".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.llm.model, "qwen3:1.7b");
        assert_eq!(config.queue.max_attempts, 3);
        assert_eq!(config.enrich.section_delay_secs, 3);
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.llm.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = Config::default();
        config.queue.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_db_path() {
        let mut config = Config::default();
        config.store.db_path = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
