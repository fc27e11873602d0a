//! Configuration for a node process: command-line flags layered over an
//! optional TOML file, covering shard topology, the chain id, the RPC bind
//! address and the fixed block context the EVM host exposes.

mod error;
mod file;

pub use error::ConfigError;

use clap::Parser;
use file::FileConfig;
use std::path::PathBuf;

/// Default chain id, chosen (like `threepc_txcodec::DEFAULT_CHAIN_ID`) to
/// spell "CBDC" in hex.
pub const DEFAULT_CHAIN_ID: u64 = 0xCBDC;

const ZERO_HASH_HEX: &str = "0x0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Clone, Parser, serde::Serialize)]
#[command(name = "threepc-node", about = "A shard/broker/agent node in the transaction processor")]
pub struct NodeConfig {
    /// Optional TOML file to layer defaults from; CLI flags still win.
    #[arg(long)]
    #[serde(skip)]
    pub config_file: Option<PathBuf>,

    /// Number of shards in the deployment's key-space partitioning.
    #[arg(long, default_value_t = 4)]
    pub shard_count: u32,

    /// If set, this process owns (and serves RPC for) this shard id.
    #[arg(long)]
    pub shard_id: Option<u32>,

    /// Identifies this broker instance for recovery bookkeeping.
    #[arg(long, default_value_t = 0)]
    pub broker_id: u64,

    /// Chain id used in signatures and EIP-155 `v` encoding.
    #[arg(long, default_value_t = DEFAULT_CHAIN_ID)]
    pub chain_id: u64,

    /// Address the JSON-RPC server binds to.
    #[arg(long, default_value = "127.0.0.1:8545")]
    pub rpc_bind_address: String,

    /// Resumes ticket numbering from this value instead of 1 (used when
    /// restarting a broker against shards that already have state).
    #[arg(long)]
    pub resume_ticket_from: Option<u64>,

    /// Block hash the EVM host reports for the current block (hex,
    /// `0x`-prefixed, 32 bytes). Defaults to the zero hash.
    #[arg(long, default_value = ZERO_HASH_HEX)]
    pub block_hash_hex: String,

    /// Block number the EVM host reports for the current block.
    #[arg(long, default_value_t = 1)]
    pub block_number: u64,

    /// Sends a permissive `Access-Control-Allow-Origin: *` header on every
    /// RPC response. Off by default since most deployments front this with
    /// their own reverse proxy.
    #[arg(long, default_value_t = false)]
    pub cors_enabled: bool,
}

fn default_shard_count() -> u32 {
    4
}

fn default_chain_id() -> u64 {
    DEFAULT_CHAIN_ID
}

fn default_rpc_bind_address() -> String {
    "127.0.0.1:8545".to_owned()
}

fn default_block_hash_hex() -> String {
    ZERO_HASH_HEX.to_owned()
}

fn default_block_number() -> u64 {
    1
}

impl NodeConfig {
    /// Parses CLI flags and, if `--config-file` names a TOML file, uses its
    /// values to fill in anything the CLI left at its clap default (an
    /// explicit CLI flag always wins over the file).
    pub fn load() -> Result<Self, ConfigError> {
        let cli = Self::parse();
        cli.with_file_overrides()
    }

    fn with_file_overrides(mut self) -> Result<Self, ConfigError> {
        let Some(path) = self.config_file.clone() else {
            return Ok(self);
        };
        let contents = std::fs::read_to_string(&path)?;
        let file: FileConfig = toml::from_str(&contents)?;
        file.apply_to(&mut self);
        Ok(self)
    }

    /// The block hash as 32 raw bytes, parsed from `block_hash_hex`.
    pub fn block_hash_bytes(&self) -> Result<[u8; 32], ConfigError> {
        let trimmed = self.block_hash_hex.trim_start_matches("0x");
        let decoded = hex::decode(trimmed).map_err(|_| ConfigError::InvalidBlockHash(self.block_hash_hex.clone()))?;
        if decoded.len() != 32 {
            return Err(ConfigError::InvalidBlockHash(self.block_hash_hex.clone()));
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&decoded);
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_block_context() {
        let cfg = NodeConfig::parse_from(["threepc-node"]);
        assert_eq!(cfg.chain_id, DEFAULT_CHAIN_ID);
        assert_eq!(cfg.block_number, 1);
        assert_eq!(cfg.block_hash_bytes().unwrap(), [0u8; 32]);
    }

    #[test]
    fn rejects_a_malformed_block_hash() {
        let mut cfg = NodeConfig::parse_from(["threepc-node"]);
        cfg.block_hash_hex = "not-hex".to_owned();
        assert!(cfg.block_hash_bytes().is_err());
    }
}
