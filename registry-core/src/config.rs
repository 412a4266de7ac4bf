//! Configuration for the registry node

use crate::types::{Address, Deposit};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for the event journal
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// HTTP listen address for the API and `/metrics`
    pub listen_addr: String,

    /// Registry variant and governance
    pub registry: RegistryConfig,

    /// Deposit-backed registry settings
    pub challenge: ChallengeConfig,

    /// List-mirroring registry settings
    pub mirror: MirrorConfig,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,

    /// Sequencer configuration
    pub sequencer: SequencerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/registry"),
            service_name: "registry-node".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            listen_addr: "0.0.0.0:8080".to_string(),
            registry: RegistryConfig::default(),
            challenge: ChallengeConfig::default(),
            mirror: MirrorConfig::default(),
            rocksdb: RocksDBConfig::default(),
            sequencer: SequencerConfig::default(),
        }
    }
}

/// Which admission policy the node runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryKind {
    /// Controller adds and removes directly
    Controlled,
    /// Follows an external curated list
    Mirrored,
    /// Deposits, challenge period and arbiter
    Challenge,
}

impl std::str::FromStr for RegistryKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "controlled" => Ok(RegistryKind::Controlled),
            "mirrored" => Ok(RegistryKind::Mirrored),
            "challenge" => Ok(RegistryKind::Challenge),
            other => Err(crate::Error::Config(format!("unknown registry kind: {}", other))),
        }
    }
}

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Admission policy
    pub kind: RegistryKind,

    /// Identity of this registry (salts recipient ids)
    pub address: Address,

    /// Controller identity
    pub controller: Address,

    /// Initial recipient limit (0 leaves the registry unconfigured)
    pub max_recipients: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            kind: RegistryKind::Controlled,
            address: Address::from_low_u64(1),
            controller: Address::ZERO,
            max_recipients: 0,
        }
    }
}

/// Deposit-backed registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChallengeConfig {
    /// Deposit required per request
    pub base_deposit: Deposit,

    /// Challenge period (seconds)
    pub challenge_period_secs: u64,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            base_deposit: Deposit::new(1, 1),   // 0.1
            challenge_period_secs: 86_400,      // 1 day
        }
    }
}

/// List-mirroring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Column of list rows holding the recipient address
    pub address_column: usize,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self { address_column: 1 }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 2,
            max_background_jobs: 2,
            enable_statistics: false,
        }
    }
}

/// Sequencer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    /// Bounded mailbox size
    pub mailbox_capacity: usize,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1000,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("REGISTRY_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(addr) = std::env::var("REGISTRY_LISTEN_ADDR") {
            config.listen_addr = addr;
        }

        if let Ok(kind) = std::env::var("REGISTRY_KIND") {
            config.registry.kind = kind.parse()?;
        }

        if let Ok(controller) = std::env::var("REGISTRY_CONTROLLER") {
            config.registry.controller = controller
                .parse()
                .map_err(|e| crate::Error::Config(format!("REGISTRY_CONTROLLER: {}", e)))?;
        }

        if let Ok(max) = std::env::var("REGISTRY_MAX_RECIPIENTS") {
            config.registry.max_recipients = max
                .parse()
                .map_err(|e| crate::Error::Config(format!("REGISTRY_MAX_RECIPIENTS: {}", e)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings no registry could run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.registry.controller.is_zero() {
            return Err(crate::Error::Config("controller address is not set".to_string()));
        }
        if self.challenge.base_deposit.is_sign_negative() {
            return Err(crate::Error::Config(format!(
                "negative base deposit: {}",
                self.challenge.base_deposit
            )));
        }
        if self.sequencer.mailbox_capacity == 0 {
            return Err(crate::Error::Config("mailbox capacity must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "registry-node");
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.registry.kind, RegistryKind::Controlled);
        assert_eq!(config.challenge.challenge_period_secs, 86_400);
        assert_eq!(config.mirror.address_column, 1);
    }

    #[test]
    fn test_default_config_needs_controller() {
        assert!(matches!(
            Config::default().validate(),
            Err(crate::Error::Config(_))
        ));
    }

    #[test]
    fn test_parse_toml() {
        let config: Config = toml::from_str(
            r#"
            data_dir = "/tmp/registry"

            [registry]
            kind = "challenge"
            controller = "0x00000000000000000000000000000000000000c0"
            max_recipients = 15

            [challenge]
            base_deposit = "0.25"
            challenge_period_secs = 3600
            "#,
        )
        .unwrap();

        assert_eq!(config.registry.kind, RegistryKind::Challenge);
        assert_eq!(config.registry.controller, Address::from_low_u64(0xc0));
        assert_eq!(config.registry.max_recipients, 15);
        assert_eq!(config.challenge.base_deposit, Deposit::new(25, 2));
        assert_eq!(config.sequencer.mailbox_capacity, 1000);
        config.validate().unwrap();
    }

    #[test]
    fn test_negative_deposit_rejected() {
        let mut config = Config::default();
        config.registry.controller = Address::from_low_u64(0xc0);
        config.challenge.base_deposit = -Deposit::ONE;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_registry_kind_from_str() {
        assert_eq!("Mirrored".parse::<RegistryKind>().unwrap(), RegistryKind::Mirrored);
        assert!("optimistic".parse::<RegistryKind>().is_err());
    }
}
