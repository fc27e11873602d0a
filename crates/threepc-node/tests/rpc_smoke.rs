use actix_web::{test, web, App};
use clap::Parser;
use revm::primitives::{AccountInfo, Address as RevmAddress, B256, U256 as RevmU256};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use threepc_agent::{Agent, AgentConfig};
use threepc_broker::{Broker, ShardClient};
use threepc_config::NodeConfig;
use threepc_evm_host::{account_key, encode_account};
use threepc_txcodec::{eth_sign, Address, Signature, Transaction, TxType};
use threepc_types::{HashDirectory, ShardId, StateUpdates};

#[path = "../src/error.rs"]
mod error;
#[path = "../src/rpc.rs"]
mod rpc;
#[path = "../src/shard_client.rs"]
mod shard_client;

use shard_client::InProcessShard;

fn sender_keypair() -> ([u8; 32], Address) {
    let privkey = {
        let mut k = [0x11u8; 32];
        k[31] = 0x01;
        k
    };
    let secret_key = libsecp256k1::SecretKey::parse(&privkey).unwrap();
    let pubkey = libsecp256k1::PublicKey::from_secret_key(&secret_key);
    let addr = Address::from_uncompressed_public_key(&pubkey.serialize());
    (privkey, addr)
}

fn signed_transfer(privkey: &[u8; 32], nonce: u64, to: Address, value: threepc_u256::U256) -> Transaction {
    let mut tx = Transaction {
        tx_type: TxType::Legacy,
        chain_id: Some(threepc_config::DEFAULT_CHAIN_ID),
        nonce,
        gas_price: Some(threepc_u256::U256::from_u64(1)),
        max_priority_fee_per_gas: None,
        max_fee_per_gas: None,
        gas_limit: 21_000,
        to: Some(to),
        value,
        data: Vec::new(),
        access_list: Vec::new(),
        signature: None,
    };
    let digest = *tx.sighash().as_bytes();
    let sig: Signature = eth_sign(privkey, &digest).unwrap();
    tx.signature = Some(sig);
    tx
}

async fn build_app_state() -> (web::Data<rpc::AppState>, Address) {
    let (privkey, sender) = sender_keypair();

    let directory = HashDirectory::new(1);
    let mut shards: HashMap<ShardId, Arc<dyn ShardClient>> = HashMap::new();
    shards.insert(ShardId::new(0), Arc::new(InProcessShard::new()));
    let broker = Arc::new(Broker::new(directory, shards));

    // Seed the sender with a starting balance before any RPC traffic.
    let revm_addr = RevmAddress::from_slice(sender.as_bytes());
    let key = account_key(revm_addr);
    let info = AccountInfo { balance: RevmU256::from(1_000_000u64), nonce: 0, code_hash: revm::primitives::KECCAK_EMPTY, code: None };
    let ticket = broker.begin().await;
    broker.try_lock(ticket, &[], std::slice::from_ref(&key)).await.unwrap();
    let mut updates = StateUpdates::new();
    updates.insert(key, threepc_types::Value::new(encode_account(&info)));
    broker.stage_writes(ticket, updates).await.unwrap();
    let mut touched = HashSet::new();
    touched.insert(ShardId::new(0));
    broker.prepare(ticket, &touched).await.unwrap();
    broker.commit(ticket, &touched).await.unwrap();

    let agent = Arc::new(Agent::new(
        broker.clone(),
        AgentConfig { chain_id: threepc_config::DEFAULT_CHAIN_ID, block_hash: B256::ZERO, block_number: 1 },
    ));
    let config = NodeConfig::parse_from(["threepc-node"]);
    let state = web::Data::new(rpc::AppState { broker, agent, config });

    let _ = privkey;
    (state, sender)
}

#[actix_web::test]
async fn eth_chain_id_returns_the_configured_value() {
    let (state, _sender) = build_app_state().await;
    let app = test::init_service(App::new().app_data(state.clone()).route("/", web::post().to(rpc::json_rpc))).await;

    let req = test::TestRequest::post()
        .uri("/")
        .set_json(serde_json::json!({"jsonrpc": "2.0", "id": 1, "method": "eth_chainId", "params": []}))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["result"], serde_json::json!(format!("0x{:x}", threepc_config::DEFAULT_CHAIN_ID)));
}

#[actix_web::test]
async fn send_raw_transaction_then_reads_reflect_it() {
    let (state, sender) = build_app_state().await;
    let app = test::init_service(App::new().app_data(state.clone()).route("/", web::post().to(rpc::json_rpc))).await;

    let (privkey, _) = sender_keypair();
    let recipient = Address::new([0x42; 20]);
    let tx = signed_transfer(&privkey, 0, recipient, threepc_u256::U256::from_u64(100));
    let raw = tx.encode().unwrap();
    let raw_hex = format!("0x{}", hex::encode(raw));

    let send_req = test::TestRequest::post()
        .uri("/")
        .set_json(serde_json::json!({"jsonrpc": "2.0", "id": 1, "method": "eth_sendRawTransaction", "params": [raw_hex]}))
        .to_request();
    let send_resp: serde_json::Value = test::call_and_read_body_json(&app, send_req).await;
    let tx_hash = send_resp["result"].as_str().expect("tx hash result").to_owned();
    assert!(send_resp["error"].is_null(), "unexpected error: {send_resp}");

    let nonce_req = test::TestRequest::post()
        .uri("/")
        .set_json(serde_json::json!({
            "jsonrpc": "2.0", "id": 2, "method": "eth_getTransactionCount",
            "params": [format!("0x{}", hex::encode(sender.as_bytes())), "latest"],
        }))
        .to_request();
    let nonce_resp: serde_json::Value = test::call_and_read_body_json(&app, nonce_req).await;
    assert_eq!(nonce_resp["result"], serde_json::json!("0x2"));

    let balance_req = test::TestRequest::post()
        .uri("/")
        .set_json(serde_json::json!({
            "jsonrpc": "2.0", "id": 3, "method": "eth_getBalance",
            "params": [format!("0x{}", hex::encode(recipient.as_bytes())), "latest"],
        }))
        .to_request();
    let balance_resp: serde_json::Value = test::call_and_read_body_json(&app, balance_req).await;
    assert_eq!(balance_resp["result"], serde_json::json!("0x64"));

    let receipt_req = test::TestRequest::post()
        .uri("/")
        .set_json(serde_json::json!({
            "jsonrpc": "2.0", "id": 4, "method": "eth_getTransactionReceipt", "params": [tx_hash],
        }))
        .to_request();
    let receipt_resp: serde_json::Value = test::call_and_read_body_json(&app, receipt_req).await;
    assert_eq!(receipt_resp["result"]["status"], serde_json::json!("0x1"));
}

#[actix_web::test]
async fn unknown_method_is_a_json_rpc_error() {
    let (state, _sender) = build_app_state().await;
    let app = test::init_service(App::new().app_data(state.clone()).route("/", web::post().to(rpc::json_rpc))).await;

    let req = test::TestRequest::post()
        .uri("/")
        .set_json(serde_json::json!({"jsonrpc": "2.0", "id": 1, "method": "totally_made_up", "params": []}))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["error"]["code"], serde_json::json!(-32601));
}
