//! Single-process node: one `HashDirectory`-partitioned set of in-process
//! shards, a broker orchestrating two-phase commit across them, an agent
//! driving EVM transactions through the broker, and a JSON-RPC server
//! exposing the whole thing over HTTP.

mod error;
mod rpc;
mod shard_client;

use actix_web::{middleware::Condition, web, App, HttpServer};
use anyhow::Context;
use revm::primitives::B256;
use shard_client::InProcessShard;
use std::collections::HashMap;
use std::sync::Arc;
use threepc_agent::{Agent, AgentConfig};
use threepc_broker::{Broker, ShardClient};
use threepc_config::NodeConfig;
use threepc_types::{HashDirectory, ShardId};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let config = NodeConfig::load().context("loading node configuration")?;

    let directory = HashDirectory::new(config.shard_count);
    let mut shards: HashMap<ShardId, Arc<dyn ShardClient>> = HashMap::new();
    for i in 0..config.shard_count {
        shards.insert(ShardId::new(i), Arc::new(InProcessShard::new()));
    }

    let broker = Arc::new(match config.resume_ticket_from {
        Some(resume_from) => Broker::new_resuming(directory, shards, resume_from),
        None => Broker::new(directory, shards),
    });
    broker.recover().await.context("recovering in-flight tickets from a prior run")?;

    let block_hash = config.block_hash_bytes().context("parsing configured block hash")?;
    let agent = Arc::new(Agent::new(
        broker.clone(),
        AgentConfig {
            chain_id: config.chain_id,
            block_hash: B256::from(block_hash),
            block_number: config.block_number,
        },
    ));

    log::info!(
        "starting node: {} shards, chain_id=0x{:x}, rpc_bind_address={}",
        config.shard_count,
        config.chain_id,
        config.rpc_bind_address,
    );

    let bind_address = config.rpc_bind_address.clone();
    let cors_enabled = config.cors_enabled;
    let state = web::Data::new(rpc::AppState { broker, agent, config });

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Condition::new(
                cors_enabled,
                actix_web::middleware::DefaultHeaders::new().add(("Access-Control-Allow-Origin", "*")),
            ))
            .route("/", web::post().to(rpc::json_rpc))
    })
    .bind(&bind_address)
    .with_context(|| format!("binding RPC server to {bind_address}"))?
    .run()
    .await?;

    Ok(())
}
