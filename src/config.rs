//! Configuration management for transferdesk

use serde::{Deserialize, Deserializer};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use crate::rpc::DEFAULT_ENDPOINT;

/// Default file looked up in the working directory.
pub const CONFIG_FILE: &str = "transferdesk.toml";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub devnode: DevNodeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Per round-trip limit, written like `"10s"` or `"500ms"`.
    #[serde(default = "default_timeout", deserialize_with = "human_duration")]
    pub request_timeout: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            request_timeout: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DevNodeConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default = "default_accounts")]
    pub accounts: usize,
    /// Whole coins credited to each managed account at genesis.
    #[serde(default = "default_initial_balance")]
    pub initial_balance: u64,
    #[serde(default = "default_gas_price_gwei")]
    pub gas_price_gwei: u64,
}

impl Default for DevNodeConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            chain_id: default_chain_id(),
            accounts: default_accounts(),
            initial_balance: default_initial_balance(),
            gas_price_gwei: default_gas_price_gwei(),
        }
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

fn human_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
}

fn default_port() -> u16 {
    8545
}

fn default_chain_id() -> u64 {
    31337
}

fn default_accounts() -> usize {
    10
}

fn default_initial_balance() -> u64 {
    10_000
}

fn default_gas_price_gwei() -> u64 {
    1
}

/// Load `transferdesk.toml` from the working directory, or defaults when absent.
pub fn load_config() -> Result<Config, Box<dyn std::error::Error>> {
    match fs::read_to_string(CONFIG_FILE) {
        Ok(config_str) => parse_config(&config_str),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Config::default()),
        Err(e) => Err(format!("cannot read {}: {}", CONFIG_FILE, e).into()),
    }
}

/// Load an explicitly named config file. Unlike [`load_config`], a file
/// that cannot be read is an error.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = path.as_ref();
    let config_str = fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    parse_config(&config_str)
}

fn parse_config(config_str: &str) -> Result<Config, Box<dyn std::error::Error>> {
    let config: Config = if config_str.trim().is_empty() {
        Config::default()
    } else {
        toml::from_str(config_str)?
    };

    config.validate()?;
    Ok(config)
}

impl Config {
    /// Checks values that would make the desk or the dev node unusable.
    /// Call again after applying command-line overrides.
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.node.endpoint.trim().is_empty() {
            return Err("node.endpoint must not be empty".into());
        }

        if self.node.request_timeout.is_zero() {
            return Err("node.request_timeout must be greater than zero".into());
        }

        if self.devnode.accounts == 0 {
            return Err("devnode.accounts must be at least 1".into());
        }

        Ok(())
    }
}
