use crate::NodeConfig;
use serde::Deserialize;

/// The subset of `NodeConfig` that can come from a TOML file. All fields
/// are optional since the file may only override a few of them.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct FileConfig {
    pub shard_count: Option<u32>,
    pub shard_id: Option<u32>,
    pub broker_id: Option<u64>,
    pub chain_id: Option<u64>,
    pub rpc_bind_address: Option<String>,
    pub resume_ticket_from: Option<u64>,
    pub block_hash_hex: Option<String>,
    pub block_number: Option<u64>,
    pub cors_enabled: Option<bool>,
}

impl FileConfig {
    /// Fills in any field of `cfg` still at its clap default with this
    /// file's value. clap gives no way to tell "explicitly passed the
    /// default" from "not passed" once the struct is built, so a field
    /// left at its built-in default is treated as unset by the CLI.
    pub(crate) fn apply_to(&self, cfg: &mut NodeConfig) {
        if cfg.shard_count == crate::default_shard_count() {
            if let Some(v) = self.shard_count {
                cfg.shard_count = v;
            }
        }
        if cfg.shard_id.is_none() {
            cfg.shard_id = self.shard_id;
        }
        if cfg.broker_id == 0 {
            if let Some(v) = self.broker_id {
                cfg.broker_id = v;
            }
        }
        if cfg.chain_id == crate::default_chain_id() {
            if let Some(v) = self.chain_id {
                cfg.chain_id = v;
            }
        }
        if cfg.rpc_bind_address == crate::default_rpc_bind_address() {
            if let Some(v) = &self.rpc_bind_address {
                cfg.rpc_bind_address = v.clone();
            }
        }
        if cfg.resume_ticket_from.is_none() {
            cfg.resume_ticket_from = self.resume_ticket_from;
        }
        if cfg.block_hash_hex == crate::default_block_hash_hex() {
            if let Some(v) = &self.block_hash_hex {
                cfg.block_hash_hex = v.clone();
            }
        }
        if cfg.block_number == crate::default_block_number() {
            if let Some(v) = self.block_number {
                cfg.block_number = v;
            }
        }
        if !cfg.cors_enabled {
            if let Some(v) = self.cors_enabled {
                cfg.cors_enabled = v;
            }
        }
    }
}
