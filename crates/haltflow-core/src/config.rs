//! Engine configuration
//!
//! Defaults can be overridden through `HALTFLOW_*` environment variables.

use serde::{Deserialize, Serialize};
use std::env;
use tracing::warn;

use crate::CoreError;

/// Bounds and switches for execution attempts and tokenization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum activity executions (including resumes) within one attempt
    #[serde(default = "default_max_activity_executions")]
    pub max_activity_executions: usize,

    /// Immediate self-resumes allowed per attempt before a halt is committed
    #[serde(default = "default_max_first_pass_resumes")]
    pub max_first_pass_resumes: usize,

    /// Resolve activity types concurrently while detokenizing
    #[serde(default)]
    pub concurrent_type_resolution: bool,
}

fn default_max_activity_executions() -> usize {
    10_000
}

fn default_max_first_pass_resumes() -> usize {
    1
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_activity_executions: default_max_activity_executions(),
            max_first_pass_resumes: default_max_first_pass_resumes(),
            concurrent_type_resolution: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup on top of the defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("HALTFLOW_MAX_ACTIVITY_EXECUTIONS") {
            match value.parse::<usize>() {
                Ok(max) => config.max_activity_executions = max,
                Err(_) => warn!("Invalid HALTFLOW_MAX_ACTIVITY_EXECUTIONS value: {}", value),
            }
        }

        if let Some(value) = lookup("HALTFLOW_MAX_FIRST_PASS_RESUMES") {
            match value.parse::<usize>() {
                Ok(max) => config.max_first_pass_resumes = max,
                Err(_) => warn!("Invalid HALTFLOW_MAX_FIRST_PASS_RESUMES value: {}", value),
            }
        }

        if let Some(value) = lookup("HALTFLOW_CONCURRENT_TYPE_RESOLUTION") {
            match value.to_lowercase().as_str() {
                "true" | "1" => config.concurrent_type_resolution = true,
                "false" | "0" => config.concurrent_type_resolution = false,
                _ => warn!("Invalid HALTFLOW_CONCURRENT_TYPE_RESOLUTION value: {}", value),
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the configured bounds
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.max_activity_executions == 0 {
            return Err(CoreError::ConfigurationError(
                "max_activity_executions must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_activity_executions, 10_000);
        assert_eq!(config.max_first_pass_resumes, 1);
        assert!(!config.concurrent_type_resolution);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            ("HALTFLOW_MAX_ACTIVITY_EXECUTIONS", "50"),
            ("HALTFLOW_MAX_FIRST_PASS_RESUMES", "3"),
            ("HALTFLOW_CONCURRENT_TYPE_RESOLUTION", "TRUE"),
        ]))
        .unwrap();

        assert_eq!(config.max_activity_executions, 50);
        assert_eq!(config.max_first_pass_resumes, 3);
        assert!(config.concurrent_type_resolution);
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = EngineConfig::from_lookup(lookup_from(&[(
            "HALTFLOW_MAX_FIRST_PASS_RESUMES",
            "many",
        )]))
        .unwrap();
        assert_eq!(config.max_first_pass_resumes, 1);
    }

    #[test]
    fn test_invalid_flag_keeps_default() {
        let config = EngineConfig::from_lookup(lookup_from(&[(
            "HALTFLOW_CONCURRENT_TYPE_RESOLUTION",
            "yes",
        )]))
        .unwrap();
        assert_eq!(
            config.concurrent_type_resolution,
            EngineConfig::default().concurrent_type_resolution
        );

        let config = EngineConfig::from_lookup(lookup_from(&[(
            "HALTFLOW_CONCURRENT_TYPE_RESOLUTION",
            "0",
        )]))
        .unwrap();
        assert!(!config.concurrent_type_resolution);
    }

    #[test]
    fn test_zero_execution_bound_is_rejected() {
        let result = EngineConfig::from_lookup(lookup_from(&[(
            "HALTFLOW_MAX_ACTIVITY_EXECUTIONS",
            "0",
        )]));
        assert!(matches!(result, Err(CoreError::ConfigurationError(_))));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"max_first_pass_resumes": 0}"#).unwrap();
        assert_eq!(config.max_first_pass_resumes, 0);
        assert_eq!(config.max_activity_executions, 10_000);
    }
}
