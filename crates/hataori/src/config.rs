//! Engine configuration.

use crate::error::WorkflowError;
use serde::{Deserialize, Serialize};

/// Environment variable holding the per-pass step bound.
pub const MAX_STEPS_ENV: &str = "HATAORI_MAX_STEPS_PER_PASS";

const DEFAULT_MAX_STEPS_PER_PASS: usize = 10_000;

/// Configuration for a [`WorkflowEngine`](crate::WorkflowEngine).
///
/// # Examples
///
/// ```
/// use hataori::EngineConfig;
///
/// let config = EngineConfig::default();
/// assert_eq!(config.max_steps_per_pass, Some(10_000));
///
/// let unbounded = EngineConfig::default().with_max_steps_per_pass(None);
/// assert_eq!(unbounded.max_steps_per_pass, None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum activity executions in a single pass before the instance
    /// faults. Bounds graphs whose cycles never halt. `None` means no bound.
    pub max_steps_per_pass: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps_per_pass: Some(DEFAULT_MAX_STEPS_PER_PASS),
        }
    }
}

impl EngineConfig {
    pub fn with_max_steps_per_pass(mut self, max_steps: Option<usize>) -> Self {
        self.max_steps_per_pass = max_steps;
        self
    }

    /// Reads the configuration from process environment variables.
    ///
    /// `HATAORI_MAX_STEPS_PER_PASS` accepts a positive integer, or `0` /
    /// `none` for no bound. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, WorkflowError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, WorkflowError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = lookup(MAX_STEPS_ENV) {
            config.max_steps_per_pass = parse_max_steps(&raw)?;
        }
        Ok(config)
    }
}

fn parse_max_steps(raw: &str) -> Result<Option<usize>, WorkflowError> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    match raw.parse::<usize>() {
        Ok(0) => Ok(None),
        Ok(n) => Ok(Some(n)),
        Err(_) => Err(WorkflowError::Configuration(format!(
            "{} must be a non-negative integer or 'none', got '{}'",
            MAX_STEPS_ENV, raw
        ))),
    }
}
