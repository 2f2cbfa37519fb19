// src/config.rs - default YAML merged with optional user YAML merged with
// environment overrides (§6).
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AnnalinkError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    pub host: String,
    pub port: u16,
    pub max_peers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsensusConfig {
    pub difficulty_target: u32,
    pub target_block_time: u64,
    pub adjustment_interval: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnnalinkConfig {
    pub network: NetworkConfig,
    pub consensus: ConsensusConfig,
    pub storage: StorageConfig,
}

impl Default for AnnalinkConfig {
    fn default() -> Self {
        AnnalinkConfig {
            network: NetworkConfig { host: "0.0.0.0".to_string(), port: 8333, max_peers: 10 },
            consensus: ConsensusConfig { difficulty_target: 4, target_block_time: 600, adjustment_interval: 10 },
            storage: StorageConfig { path: "blockchain.db".to_string() },
        }
    }
}

impl AnnalinkConfig {
    /// Load defaults, merge an optional user file on top, then apply
    /// environment overrides (`ANNALINK_HOST`, `ANNALINK_PORT`,
    /// `ANNALINK_DIFFICULTY`).
    pub fn load(user_path: Option<&Path>) -> Result<Self> {
        let mut config = AnnalinkConfig::default();

        if let Some(path) = user_path {
            if path.exists() {
                let contents = std::fs::read_to_string(path)?;
                let user: PartialConfig = serde_yaml::from_str(&contents)
                    .map_err(|e| AnnalinkError::Config(format!("invalid config YAML: {e}")))?;
                config.merge(user);
            }
        }

        config.apply_env_overrides();
        Ok(config)
    }

    fn merge(&mut self, partial: PartialConfig) {
        if let Some(network) = partial.network {
            if let Some(host) = network.host {
                self.network.host = host;
            }
            if let Some(port) = network.port {
                self.network.port = port;
            }
            if let Some(max_peers) = network.max_peers {
                self.network.max_peers = max_peers;
            }
        }
        if let Some(consensus) = partial.consensus {
            if let Some(d) = consensus.difficulty_target {
                self.consensus.difficulty_target = d;
            }
            if let Some(t) = consensus.target_block_time {
                self.consensus.target_block_time = t;
            }
            if let Some(a) = consensus.adjustment_interval {
                self.consensus.adjustment_interval = a;
            }
        }
        if let Some(storage) = partial.storage {
            if let Some(path) = storage.path {
                self.storage.path = path;
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("ANNALINK_HOST") {
            self.network.host = host;
        }
        if let Ok(port) = std::env::var("ANNALINK_PORT") {
            if let Ok(port) = port.parse() {
                self.network.port = port;
            }
        }
        if let Ok(difficulty) = std::env::var("ANNALINK_DIFFICULTY") {
            if let Ok(difficulty) = difficulty.parse() {
                self.consensus.difficulty_target = difficulty;
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    network: Option<PartialNetwork>,
    consensus: Option<PartialConsensus>,
    storage: Option<PartialStorage>,
}

#[derive(Debug, Default, Deserialize)]
struct PartialNetwork {
    host: Option<String>,
    port: Option<u16>,
    max_peers: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct PartialConsensus {
    difficulty_target: Option<u32>,
    target_block_time: Option<u64>,
    adjustment_interval: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct PartialStorage {
    path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = AnnalinkConfig::default();
        assert_eq!(config.network.port, 8333);
        assert_eq!(config.consensus.target_block_time, 600);
        assert_eq!(config.consensus.adjustment_interval, 10);
    }

    #[test]
    fn user_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "network:\n  port: 9000\nconsensus:\n  difficulty_target: 2\n").unwrap();

        let config = AnnalinkConfig::load(Some(&path)).unwrap();
        assert_eq!(config.network.port, 9000);
        assert_eq!(config.consensus.difficulty_target, 2);
        assert_eq!(config.network.host, "0.0.0.0"); // untouched default
    }

    #[test]
    fn env_overrides_take_precedence_over_file() {
        std::env::set_var("ANNALINK_PORT", "7777");
        let config = AnnalinkConfig::load(None).unwrap();
        std::env::remove_var("ANNALINK_PORT");
        assert_eq!(config.network.port, 7777);
    }
}
