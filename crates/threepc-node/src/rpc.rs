use crate::error::NodeError;
use actix_web::{web, HttpResponse, Responder};
use revm::primitives::B256;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use threepc_agent::{Agent, BrokerStateAccess};
use threepc_broker::Broker;
use threepc_config::NodeConfig;
use threepc_txcodec::Address;
use threepc_types::HashDirectory;
use threepc_u256::U256;

/// A fixed gas price, since fee markets are out of scope: every quote is the
/// same constant rather than derived from mempool contention.
const FIXED_GAS_PRICE_WEI: u64 = 1_000_000_000;

pub struct AppState {
    pub broker: Arc<Broker<HashDirectory>>,
    pub agent: Arc<Agent<HashDirectory>>,
    pub config: NodeConfig,
}

#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    #[serde(default)]
    id: serde_json::Value,
    method: String,
    #[serde(default)]
    params: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: &'static str,
    id: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcErrorBody>,
}

#[derive(Debug, Serialize)]
struct JsonRpcErrorBody {
    code: i64,
    message: String,
}

pub async fn json_rpc(state: web::Data<AppState>, req: web::Json<JsonRpcRequest>) -> impl Responder {
    let JsonRpcRequest { id, method, params } = req.into_inner();
    let response = match dispatch(&state, &method, &params).await {
        Ok(result) => JsonRpcResponse { jsonrpc: "2.0", id, result: Some(result), error: None },
        Err(err) => {
            log::warn!("rpc method {method} failed: {err}");
            JsonRpcResponse {
                jsonrpc: "2.0",
                id,
                result: None,
                error: Some(JsonRpcErrorBody { code: err.rpc_code(), message: err.to_string() }),
            }
        }
    };
    HttpResponse::Ok().json(response)
}

async fn dispatch(state: &AppState, method: &str, params: &[serde_json::Value]) -> Result<serde_json::Value, NodeError> {
    match method {
        "eth_chainId" => Ok(json_quantity(state.config.chain_id)),
        "eth_blockNumber" => Ok(json_quantity(state.config.block_number)),
        "eth_gasPrice" => Ok(json_quantity(FIXED_GAS_PRICE_WEI)),
        "net_version" => Ok(serde_json::Value::String(state.config.chain_id.to_string())),
        "eth_sendRawTransaction" => {
            let raw = parse_hex_bytes(param_str(params, 0)?)?;
            let receipt = state.agent.submit_transaction(&raw, false).await?;
            Ok(serde_json::Value::String(format!("0x{}", hex::encode(receipt.tx_hash.as_slice()))))
        }
        "eth_call" | "eth_estimateGas" => {
            // Accepts a signed raw transaction, same as `eth_sendRawTransaction`,
            // executed as a dry run; there is no unsigned call-object path
            // since the runner only ever executes transactions it can verify.
            let raw = parse_hex_bytes(param_str(params, 0)?)?;
            let receipt = state.agent.submit_transaction(&raw, true).await?;
            if method == "eth_estimateGas" {
                Ok(json_quantity(receipt.gas_used))
            } else {
                Ok(serde_json::Value::String(format!("0x{}", hex::encode(&receipt.output))))
            }
        }
        "eth_getTransactionCount" => {
            let addr = parse_address(param_str(params, 0)?)?;
            let account = read_account(state, addr).await?;
            Ok(json_quantity(account.nonce + 1))
        }
        "eth_getBalance" => {
            let addr = parse_address(param_str(params, 0)?)?;
            let account = read_account(state, addr).await?;
            Ok(serde_json::Value::String(u256_quantity_hex(account.balance)))
        }
        "eth_getCode" => {
            let addr = parse_address(param_str(params, 0)?)?;
            let code = read_account_code(state, addr).await?;
            Ok(serde_json::Value::String(format!("0x{}", hex::encode(code))))
        }
        "eth_getTransactionReceipt" => {
            let hash = parse_hash(param_str(params, 0)?)?;
            let receipt = read_receipt(state, hash).await?;
            Ok(match receipt {
                Some(receipt) => serde_json::json!({
                    "transactionHash": format!("0x{}", hex::encode(receipt.tx_hash.as_slice())),
                    "status": if receipt.success { "0x1" } else { "0x0" },
                    "gasUsed": json_quantity(receipt.gas_used),
                    "contractAddress": receipt.contract_address.map(|a| format!("0x{}", hex::encode(a.as_slice()))),
                    "output": format!("0x{}", hex::encode(&receipt.output)),
                }),
                None => serde_json::Value::Null,
            })
        }
        other => Err(NodeError::UnknownMethod(other.to_owned())),
    }
}

async fn read_account(
    state: &AppState,
    addr: Address,
) -> Result<threepc_evm_runner::AccountView, NodeError> {
    let ticket = state.broker.begin().await;
    let access = BrokerStateAccess::new(&state.broker);
    let result = threepc_evm_runner::read_account(&access, ticket, addr).await;
    let touched = access.touched_shards();
    state.broker.rollback(ticket, &touched).await.ok();
    Ok(result?)
}

async fn read_account_code(state: &AppState, addr: Address) -> Result<Vec<u8>, NodeError> {
    let ticket = state.broker.begin().await;
    let access = BrokerStateAccess::new(&state.broker);
    let result = threepc_evm_runner::read_account_code(&access, ticket, addr).await;
    let touched = access.touched_shards();
    state.broker.rollback(ticket, &touched).await.ok();
    Ok(result?)
}

async fn read_receipt(
    state: &AppState,
    hash: B256,
) -> Result<Option<threepc_evm_runner::Receipt>, NodeError> {
    let ticket = state.broker.begin().await;
    let access = BrokerStateAccess::new(&state.broker);
    let result = threepc_evm_runner::get_transaction_receipt(&access, ticket, hash).await;
    let touched = access.touched_shards();
    state.broker.rollback(ticket, &touched).await.ok();
    Ok(result?)
}

fn param_str<'a>(params: &'a [serde_json::Value], index: usize) -> Result<&'a str, NodeError> {
    params
        .get(index)
        .and_then(|v| v.as_str())
        .ok_or_else(|| NodeError::BadParam(format!("expected a string at position {index}")))
}

fn parse_hex_bytes(s: &str) -> Result<Vec<u8>, NodeError> {
    hex::decode(s.trim_start_matches("0x")).map_err(|e| NodeError::BadHex(e.to_string()))
}

fn parse_address(s: &str) -> Result<Address, NodeError> {
    let bytes = parse_hex_bytes(s)?;
    if bytes.len() != 20 {
        return Err(NodeError::BadParam("address must be 20 bytes".to_owned()));
    }
    let mut buf = [0u8; 20];
    buf.copy_from_slice(&bytes);
    Ok(Address::new(buf))
}

fn parse_hash(s: &str) -> Result<B256, NodeError> {
    let bytes = parse_hex_bytes(s)?;
    if bytes.len() != 32 {
        return Err(NodeError::BadParam("hash must be 32 bytes".to_owned()));
    }
    let mut buf = [0u8; 32];
    buf.copy_from_slice(&bytes);
    Ok(B256::from(buf))
}

fn json_quantity(value: u64) -> serde_json::Value {
    serde_json::Value::String(format!("0x{value:x}"))
}

fn u256_quantity_hex(value: U256) -> String {
    let full = hex::encode(value.to_be_bytes());
    let trimmed = full.trim_start_matches('0');
    format!("0x{}", if trimmed.is_empty() { "0" } else { trimmed })
}
