//! Configuration management for steppe
//!
//! This module provides the configuration loaded from `.steppe/config.toml`:
//! replication tuning for asynchronous backing-store writes, and an optional
//! declaration of the static process graph.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::process::ProcessDefinition;
use crate::retry::RetryPolicy;
use crate::{Result, SteppeError};

/// Repository-level steppe configuration
///
/// Loaded from `.steppe/config.toml` under a root directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SteppeConfig {
    /// Asynchronous replication settings
    #[serde(default)]
    pub replication: ReplicationConfig,

    /// Static process graph
    #[serde(default)]
    pub process: ProcessDefinition,
}

/// Tuning for the replicator that pushes cached writes to the backing store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationConfig {
    /// Attempts per mutation before it is dead-lettered
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Delay after the first failed attempt
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Cap on the exponential backoff
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Bound on a single backing-store call
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Pending mutations before writers wait for the replicator
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Dead letters buffered for the operator channel
    #[serde(default = "default_dead_letter_capacity")]
    pub dead_letter_capacity: usize,
}

// Default value providers
fn default_max_attempts() -> usize {
    5
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    5_000
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_dead_letter_capacity() -> usize {
    256
}

impl ReplicationConfig {
    /// Retry policy applied to every replicated mutation
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms.max(self.initial_backoff_ms)),
            attempt_timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            timeout_ms: default_timeout_ms(),
            queue_capacity: default_queue_capacity(),
            dead_letter_capacity: default_dead_letter_capacity(),
        }
    }
}

impl SteppeConfig {
    /// Load configuration from `.steppe/config.toml` or use defaults
    pub fn load_or_default(root: &Path) -> Result<Self> {
        let config_path = root.join(".steppe/config.toml");

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| SteppeError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Write default configuration to `.steppe/config.toml`
    pub fn write_default(root: &Path) -> Result<()> {
        let config_dir = root.join(".steppe");
        std::fs::create_dir_all(&config_dir)?;

        let config_path = config_dir.join("config.toml");
        let content = toml::to_string_pretty(&Self::default())
            .map_err(|e| SteppeError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }
}
