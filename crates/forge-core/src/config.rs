//! Layered configuration: defaults, TOML, environment, then explicit overrides

use crate::error::ConfigError;
use forge_gate::GateWeights;
use forge_model::{BackendConfig, GenerationParams, InvokeOptions, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const ENV_MAX_ITERATIONS: &str = "FORGE_MAX_ITERATIONS";
pub const ENV_ACCEPTANCE_THRESHOLD: &str = "FORGE_ACCEPTANCE_THRESHOLD";
pub const ENV_TEMPERATURE: &str = "FORGE_TEMPERATURE";
pub const ENV_MODEL: &str = "FORGE_MODEL";
pub const ENV_API_BASE: &str = "FORGE_API_BASE";
/// Checked in order; the first set variable wins
pub const ENV_API_KEYS: [&str; 2] = ["FORGE_API_KEY", "OPENAI_API_KEY"];

/// Per-stage call budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// Deadline for one generation call
    pub timeout_secs: u64,
    /// Generation-port attempts for transient failures
    pub max_attempts: u32,
    /// Reformulated attempts after an extraction or generation failure
    pub local_retries: u32,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 120,
            max_attempts: 3,
            local_retries: 2,
        }
    }
}

impl StageConfig {
    #[must_use]
    pub fn invoke_options(&self) -> InvokeOptions {
        InvokeOptions::default()
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_max_attempts(self.max_attempts)
    }
}

/// Controller configuration, read-only once a controller is built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    pub max_iterations: u32,
    pub acceptance_threshold: f64,
    pub stage: StageConfig,
    pub generation: GenerationParams,
    pub retry: RetryPolicy,
    pub weights: GateWeights,
    pub backend: BackendConfig,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            acceptance_threshold: 70.0,
            stage: StageConfig::default(),
            generation: GenerationParams::default(),
            retry: RetryPolicy::default(),
            weights: GateWeights::default(),
            backend: BackendConfig::default(),
        }
    }
}

impl ForgeConfig {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_acceptance_threshold(mut self, threshold: f64) -> Self {
        self.acceptance_threshold = threshold;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_stage(mut self, stage: StageConfig) -> Self {
        self.stage = stage;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_backend(mut self, backend: BackendConfig) -> Self {
        self.backend = backend;
        self
    }

    /// Parse a TOML document; missing keys keep their defaults
    ///
    /// # Errors
    /// [`ConfigError::Parse`] on malformed TOML or mistyped values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// # Errors
    /// [`ConfigError::Render`] if a value has no TOML representation.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Apply overrides from the process environment
    ///
    /// # Errors
    /// [`ConfigError::InvalidEnv`] when a numeric variable does not parse.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_env_from(|var| std::env::var(var).ok())
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value
    ///
    /// # Errors
    /// [`ConfigError::InvalidEnv`] when a numeric variable does not parse.
    pub fn apply_env_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_MAX_ITERATIONS) {
            self.max_iterations = parse_env(ENV_MAX_ITERATIONS, value)?;
        }
        if let Some(value) = lookup(ENV_ACCEPTANCE_THRESHOLD) {
            self.acceptance_threshold = parse_env(ENV_ACCEPTANCE_THRESHOLD, value)?;
        }
        if let Some(value) = lookup(ENV_TEMPERATURE) {
            self.generation.temperature = parse_env(ENV_TEMPERATURE, value)?;
        }
        if let Some(value) = lookup(ENV_MODEL).filter(|v| !v.trim().is_empty()) {
            self.backend.model = value;
        }
        if let Some(value) = lookup(ENV_API_BASE).filter(|v| !v.trim().is_empty()) {
            self.backend.base_url = value;
        }
        if let Some(key) = ENV_API_KEYS
            .iter()
            .find_map(|var| lookup(var).filter(|v| !v.trim().is_empty()))
        {
            self.backend.api_key = Some(key);
        }
        Ok(self)
    }

    /// # Errors
    /// [`ConfigError::Invalid`] naming the first out-of-range field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason| Err(ConfigError::Invalid { field, reason });
        if self.max_iterations == 0 {
            return invalid("max_iterations", "must be at least 1");
        }
        if !(0.0..=100.0).contains(&self.acceptance_threshold) {
            return invalid("acceptance_threshold", "must be within 0..=100");
        }
        if self.stage.timeout_secs == 0 {
            return invalid("stage.timeout_secs", "must be positive");
        }
        if self.stage.max_attempts == 0 {
            return invalid("stage.max_attempts", "must be at least 1");
        }
        if self.generation.max_tokens == 0 {
            return invalid("generation.max_tokens", "must be positive");
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return invalid("generation.temperature", "must be within 0..=2");
        }
        if !self.retry.multiplier.is_finite() || self.retry.multiplier < 1.0 {
            return invalid("retry.multiplier", "must be at least 1");
        }
        if !self.weights.is_valid() {
            return invalid("weights", "must be non-negative with a positive sum");
        }
        if self.backend.base_url.trim().is_empty() {
            return invalid("backend.base_url", "must not be empty");
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { var, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = ForgeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_iterations, 3);
        assert_eq!(config.acceptance_threshold, 70.0);
        assert_eq!(config.stage.invoke_options().timeout, Duration::from_secs(120));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ForgeConfig::from_toml_str(
            "max_iterations = 5\n[stage]\nlocal_retries = 0\n[weights]\nsecurity = 0.5\n",
        )
        .unwrap();
        assert_eq!(config.max_iterations, 5);
        assert_eq!(config.stage.local_retries, 0);
        assert_eq!(config.stage.max_attempts, 3);
        assert_eq!(config.weights.security, 0.5);
        assert_eq!(config.weights.validation, 0.40);
    }

    #[test]
    fn toml_round_trip_omits_api_key() {
        let config = ForgeConfig::default()
            .with_backend(BackendConfig::default().with_api_key("sk-secret"));
        let text = config.to_toml_string().unwrap();
        assert!(!text.contains("sk-secret"));
        let back = ForgeConfig::from_toml_str(&text).unwrap();
        assert_eq!(back.backend.api_key, None);
        assert_eq!(back.max_iterations, config.max_iterations);
    }

    #[test]
    fn environment_overrides_file_values() {
        let config = ForgeConfig::from_toml_str("max_iterations = 5")
            .unwrap()
            .apply_env_from(env(&[
                (ENV_MAX_ITERATIONS, "2"),
                (ENV_MODEL, "local-model"),
                ("OPENAI_API_KEY", "sk-fallback"),
            ]))
            .unwrap();
        assert_eq!(config.max_iterations, 2);
        assert_eq!(config.backend.model, "local-model");
        assert_eq!(config.backend.api_key.as_deref(), Some("sk-fallback"));
    }

    #[test]
    fn forge_key_takes_precedence() {
        let config = ForgeConfig::default()
            .apply_env_from(env(&[("FORGE_API_KEY", "sk-forge"), ("OPENAI_API_KEY", "sk-openai")]))
            .unwrap();
        assert_eq!(config.backend.api_key.as_deref(), Some("sk-forge"));
    }

    #[test]
    fn malformed_env_value_is_reported() {
        let err = ForgeConfig::default()
            .apply_env_from(env(&[(ENV_ACCEPTANCE_THRESHOLD, "high")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv { var: ENV_ACCEPTANCE_THRESHOLD, .. }
        ));
    }

    #[test]
    fn validation_names_the_field() {
        let err = ForgeConfig::default().with_max_iterations(0).validate().unwrap_err();
        assert_eq!(err.to_string(), "invalid configuration: max_iterations must be at least 1");
        assert!(ForgeConfig::default().with_acceptance_threshold(101.0).validate().is_err());
        assert!(ForgeConfig::default()
            .with_retry_policy(RetryPolicy::immediate())
            .validate()
            .is_ok());
    }

    #[test]
    fn oversized_retry_multiplier_stays_capped() {
        let config = ForgeConfig::from_toml_str("[retry]\nmultiplier = 1e300\n").unwrap();
        assert!(config.validate().is_ok());
        let first = config.retry.initial_delay();
        assert_eq!(config.retry.next_delay(first), config.retry.max_delay());
    }
}
