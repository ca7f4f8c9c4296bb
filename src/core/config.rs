use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::core::errors::{CoordError, Result};

/// Opcode byte the state manager claims for guest-issued signals
pub const DEFAULT_GUEST_OPCODE: u8 = 0xAD;

/// Coordinator configuration shared by every worker of a fleet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Number of worker processes sharing the segment
    pub fleet_size: usize,
    /// Seconds without new coverage before pruning (0 disables the detector)
    pub timeout_secs: u64,
    /// Upper bound on lock and barrier waits; `None` waits forever
    pub max_lock_wait: Option<Duration>,
    /// Opcode byte matched by guest custom instructions
    pub guest_opcode: u8,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            fleet_size: 1,
            timeout_secs: 0,
            max_lock_wait: None,
            guest_opcode: DEFAULT_GUEST_OPCODE,
        }
    }
}

impl CoordinatorConfig {
    /// Create a new builder for CoordinatorConfig
    pub fn builder() -> CoordinatorConfigBuilder {
        CoordinatorConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.fleet_size == 0 {
            return Err(CoordError::InvalidConfiguration(
                "fleet_size must be greater than 0".to_string(),
            ));
        }
        // u32::MAX is the broadcast target in the mailbox word
        if self.fleet_size >= u32::MAX as usize {
            return Err(CoordError::InvalidConfiguration(format!(
                "fleet_size must be below {}",
                u32::MAX
            )));
        }
        if let Some(wait) = self.max_lock_wait {
            if wait.is_zero() {
                return Err(CoordError::InvalidConfiguration(
                    "max_lock_wait must be non-zero when set".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Configuration for local experiments with a small fleet
    pub fn development() -> Self {
        Self {
            fleet_size: 4,
            timeout_secs: 10,
            max_lock_wait: Some(Duration::from_secs(30)),
            ..Default::default()
        }
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.yaml`, `.yml` or `.json` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            Some("json") => Self::from_json_str(&content),
            other => Err(CoordError::InvalidConfiguration(format!(
                "unsupported config extension {:?} for {}",
                other,
                path.display()
            ))),
        }
    }
}

/// Builder for CoordinatorConfig
pub struct CoordinatorConfigBuilder {
    config: CoordinatorConfig,
}

impl CoordinatorConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            config: CoordinatorConfig::default(),
        }
    }

    pub fn fleet_size(mut self, fleet_size: usize) -> Self {
        self.config.fleet_size = fleet_size;
        self
    }

    pub fn timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.config.timeout_secs = timeout_secs;
        self
    }

    pub fn max_lock_wait(mut self, wait: Option<Duration>) -> Self {
        self.config.max_lock_wait = wait;
        self
    }

    pub fn guest_opcode(mut self, opcode: u8) -> Self {
        self.config.guest_opcode = opcode;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<CoordinatorConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for CoordinatorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = CoordinatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timeout_secs, 0);
        assert_eq!(config.guest_opcode, DEFAULT_GUEST_OPCODE);
    }

    #[test]
    fn test_development_config() {
        let config = CoordinatorConfig::development();
        assert!(config.validate().is_ok());
        assert_eq!(config.fleet_size, 4);
        assert_eq!(config.timeout_secs, 10);
    }

    #[test]
    fn test_validation_errors() {
        let mut config = CoordinatorConfig::default();

        config.fleet_size = 0;
        assert!(config.validate().is_err());
        config.fleet_size = 2;

        config.max_lock_wait = Some(Duration::ZERO);
        assert!(config.validate().is_err());
        config.max_lock_wait = None;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = CoordinatorConfig::builder()
            .fleet_size(8)
            .timeout_secs(60)
            .max_lock_wait(Some(Duration::from_secs(5)))
            .guest_opcode(0xAB)
            .build()
            .unwrap();

        assert_eq!(
            config,
            CoordinatorConfig {
                fleet_size: 8,
                timeout_secs: 60,
                max_lock_wait: Some(Duration::from_secs(5)),
                guest_opcode: 0xAB,
            }
        );

        assert!(CoordinatorConfig::builder().fleet_size(0).build().is_err());
    }

    #[test]
    fn test_from_yaml() {
        let config = CoordinatorConfig::from_yaml_str("fleet_size: 3\ntimeout_secs: 15\n").unwrap();
        assert_eq!(config.fleet_size, 3);
        assert_eq!(config.timeout_secs, 15);
        assert_eq!(config.max_lock_wait, None);

        assert!(CoordinatorConfig::from_yaml_str("fleet_size: 0\n").is_err());
    }

    #[test]
    fn test_from_json() {
        let json = r#"{"fleet_size": 2, "guest_opcode": 170}"#;
        let config = CoordinatorConfig::from_json_str(json).unwrap();
        assert_eq!(config.fleet_size, 2);
        assert_eq!(config.guest_opcode, 0xAA);
    }

    #[test]
    fn test_from_file_rejects_unknown_extension() {
        let path = std::env::temp_dir().join(format!("statefleet-{}.toml", std::process::id()));
        std::fs::write(&path, "fleet_size = 2").unwrap();
        let result = CoordinatorConfig::from_file(&path);
        let _ = std::fs::remove_file(&path);
        assert!(matches!(result, Err(CoordError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_from_yaml_file() {
        let path = std::env::temp_dir().join(format!("statefleet-{}.yaml", std::process::id()));
        std::fs::write(&path, "fleet_size: 5\ntimeout_secs: 30\n").unwrap();
        let result = CoordinatorConfig::from_file(&path);
        let _ = std::fs::remove_file(&path);
        let config = result.unwrap();
        assert_eq!(config.fleet_size, 5);
        assert_eq!(config.timeout_secs, 30);
    }
}
