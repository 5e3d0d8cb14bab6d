// crates/aludel-cli/src/config.rs
//
// Runtime configuration for the scenario simulator.
// Loaded from a TOML file or populated with defaults.

use aludel_engine::{DEFAULT_QUEUE_DEPTH, RAGEQUIT_GAS, VAULT_RAGEQUIT_OVERHEAD};
use serde::Deserialize;
use std::fs;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "~/.aludel/config.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct SimConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    /// `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Output format: "table" or "json".
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    /// Gas handed to `rage_quit` steps that do not set their own limit.
    #[serde(default = "default_rage_quit_gas_limit")]
    pub rage_quit_gas_limit: u64,

    /// Depth of the chain service's job queue.
    #[serde(default = "default_service_queue_depth")]
    pub service_queue_depth: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_output() -> String {
    "table".to_string()
}

fn default_chain_id() -> u64 {
    1
}

fn default_rage_quit_gas_limit() -> u64 {
    RAGEQUIT_GAS + VAULT_RAGEQUIT_OVERHEAD
}

fn default_service_queue_depth() -> usize {
    DEFAULT_QUEUE_DEPTH
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            output: default_output(),
            chain_id: default_chain_id(),
            rage_quit_gas_limit: default_rage_quit_gas_limit(),
            service_queue_depth: default_service_queue_depth(),
        }
    }
}

impl SimConfig {
    /// Load configuration from a TOML file at the given path.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(expand_tilde(path))?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: SimConfig = toml::from_str(contents)?;
        Ok(config)
    }
}

/// Expand `~` at the start of a path to the user's home directory.
pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return format!("{}/{}", home.display(), rest);
        }
    }
    path.to_string()
}
