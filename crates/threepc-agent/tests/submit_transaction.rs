use async_trait::async_trait;
use revm::primitives::{AccountInfo, B256, KECCAK_EMPTY, U256 as RU256};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use threepc_agent::{Agent, AgentConfig};
use threepc_broker::{Broker, LockOutcome, ShardClient, ShardTicketState};
use threepc_evm_host::{account_key, encode_account};
use threepc_shard::{LockOutcome as InnerOutcome, Shard, TicketStatus as InnerStatus};
use threepc_txcodec::{Address, Signature, Transaction, TxType};
use threepc_types::{HashDirectory, Key, LockMode, ShardError, ShardId, StateUpdates, Ticket, Value};
use threepc_u256::U256;
use tokio::sync::Mutex;

struct InProcessShard(Mutex<Shard>);

impl InProcessShard {
    fn new() -> Arc<Self> {
        Arc::new(Self(Mutex::new(Shard::new())))
    }
}

#[async_trait]
impl ShardClient for InProcessShard {
    async fn try_lock(&self, ticket: Ticket, key: Key, mode: LockMode) -> Result<LockOutcome, ShardError> {
        let outcome = self.0.lock().await.try_lock(ticket, key, mode)?;
        Ok(match outcome {
            InnerOutcome::Granted => LockOutcome::Granted,
            InnerOutcome::Queued => LockOutcome::Queued,
        })
    }

    async fn read(&self, ticket: Ticket, key: Key) -> Result<Value, ShardError> {
        self.0.lock().await.read(ticket, &key)
    }

    async fn stage_writes(&self, ticket: Ticket, updates: StateUpdates) -> Result<(), ShardError> {
        self.0.lock().await.stage_writes(ticket, updates)
    }

    async fn prepare(&self, ticket: Ticket) -> Result<(), ShardError> {
        self.0.lock().await.prepare(ticket)
    }

    async fn commit(&self, ticket: Ticket) -> Result<(), ShardError> {
        self.0.lock().await.commit(ticket)
    }

    async fn rollback(&self, ticket: Ticket) -> Result<(), ShardError> {
        self.0.lock().await.rollback(ticket)
    }

    async fn get_tickets(&self) -> Result<Vec<(Ticket, ShardTicketState)>, ShardError> {
        Ok(self
            .0
            .lock()
            .await
            .get_tickets()
            .into_iter()
            .map(|(t, s)| {
                (
                    t,
                    match s {
                        InnerStatus::Active => ShardTicketState::Active,
                        InnerStatus::Prepared => ShardTicketState::Prepared,
                        InnerStatus::Committed => ShardTicketState::Committed,
                        InnerStatus::RolledBack => ShardTicketState::RolledBack,
                        InnerStatus::Wounded => ShardTicketState::Wounded,
                    },
                )
            })
            .collect())
    }
}

fn make_broker(shard_count: u32) -> Broker<HashDirectory> {
    let directory = HashDirectory::new(shard_count);
    let mut shards: HashMap<ShardId, Arc<dyn ShardClient>> = HashMap::new();
    for i in 0..shard_count {
        shards.insert(ShardId::new(i), InProcessShard::new());
    }
    Broker::new(directory, shards)
}

const CHAIN_ID: u64 = 0xCBDC;

fn sender_keypair() -> ([u8; 32], Address) {
    let mut privkey = [0x09u8; 32];
    privkey[31] = 0x01;
    let secret_key = libsecp256k1::SecretKey::parse(&privkey).unwrap();
    let pubkey = libsecp256k1::PublicKey::from_secret_key(&secret_key);
    let address = Address::from_uncompressed_public_key(&pubkey.serialize());
    (privkey, address)
}

fn signed_transfer(privkey: &[u8; 32], nonce: u64, to: [u8; 20], value: u64) -> Transaction {
    let mut tx = Transaction {
        tx_type: TxType::Legacy,
        chain_id: Some(CHAIN_ID),
        nonce,
        gas_price: Some(U256::from_u64(1)),
        max_priority_fee_per_gas: None,
        max_fee_per_gas: None,
        gas_limit: 21_000,
        to: Some(Address::new(to)),
        value: U256::from_u64(value),
        data: Vec::new(),
        access_list: Vec::new(),
        signature: None,
    };
    let digest = *tx.sighash().as_bytes();
    let sig: Signature = threepc_txcodec::eth_sign(privkey, &digest).unwrap();
    tx.signature = Some(sig);
    tx
}

async fn seed_account(broker: &Broker<HashDirectory>, addr: revm::primitives::Address, info: AccountInfo) {
    let key = account_key(addr);
    let ticket = broker.begin().await;
    broker.try_lock(ticket, &[], &[key.clone()]).await.unwrap();
    let mut updates = StateUpdates::new();
    updates.insert(key.clone(), Value::new(encode_account(&info)));
    broker.stage_writes(ticket, updates).await.unwrap();
    let mut touched = HashSet::new();
    touched.insert(broker.shard_id_for(&key));
    broker.prepare(ticket, &touched).await.unwrap();
    broker.commit(ticket, &touched).await.unwrap();
}

fn revm_address(addr: &Address) -> revm::primitives::Address {
    revm::primitives::Address::from_slice(addr.as_bytes())
}

async fn read_account(broker: &Broker<HashDirectory>, addr: revm::primitives::Address) -> AccountInfo {
    let key = account_key(addr);
    let ticket = broker.begin().await;
    broker.try_lock(ticket, &[key.clone()], &[]).await.unwrap();
    let value = broker.read(ticket, &key).await.unwrap();
    threepc_evm_host::decode_account(value.as_bytes()).unwrap()
}

#[tokio::test]
async fn native_transfer_commits_and_updates_balances() {
    let broker = Arc::new(make_broker(4));
    let (privkey, sender) = sender_keypair();
    let recipient = [0xbb; 20];

    seed_account(
        &broker,
        revm_address(&sender),
        AccountInfo {
            balance: RU256::from(1_000_000u64),
            nonce: 0,
            code_hash: KECCAK_EMPTY,
            code: None,
        },
    )
    .await;

    let agent = Agent::new(
        broker.clone(),
        AgentConfig {
            chain_id: CHAIN_ID,
            block_hash: B256::ZERO,
            block_number: 1,
        },
    );

    let tx = signed_transfer(&privkey, 0, recipient, 100);
    let receipt = agent.submit_transaction(&tx.encode().unwrap(), false).await.unwrap();
    assert!(receipt.success);

    let recipient_info = read_account(&broker, revm::primitives::Address::from_slice(&recipient)).await;
    assert_eq!(recipient_info.balance, RU256::from(100u64));

    let sender_info = read_account(&broker, revm_address(&sender)).await;
    assert_eq!(sender_info.nonce, 1);
}

#[tokio::test]
async fn dry_run_does_not_persist_state() {
    let broker = Arc::new(make_broker(1));
    let (privkey, sender) = sender_keypair();
    let recipient = [0xcc; 20];

    seed_account(
        &broker,
        revm_address(&sender),
        AccountInfo {
            balance: RU256::from(1_000_000u64),
            nonce: 0,
            code_hash: KECCAK_EMPTY,
            code: None,
        },
    )
    .await;

    let agent = Agent::new(
        broker.clone(),
        AgentConfig {
            chain_id: CHAIN_ID,
            block_hash: B256::ZERO,
            block_number: 1,
        },
    );

    let tx = signed_transfer(&privkey, 0, recipient, 50);
    let receipt = agent.submit_transaction(&tx.encode().unwrap(), true).await.unwrap();
    assert!(receipt.success);

    let recipient_info = read_account(&broker, revm::primitives::Address::from_slice(&recipient)).await;
    assert_eq!(recipient_info.balance, RU256::ZERO);

    let sender_info = read_account(&broker, revm_address(&sender)).await;
    assert_eq!(sender_info.nonce, 0);
}

#[tokio::test]
async fn nonce_mismatch_is_a_permanent_failure() {
    let broker = Arc::new(make_broker(1));
    let (privkey, sender) = sender_keypair();
    let recipient = [0xdd; 20];

    seed_account(
        &broker,
        revm_address(&sender),
        AccountInfo {
            balance: RU256::from(1_000_000u64),
            nonce: 0,
            code_hash: KECCAK_EMPTY,
            code: None,
        },
    )
    .await;

    let agent = Agent::new(
        broker.clone(),
        AgentConfig {
            chain_id: CHAIN_ID,
            block_hash: B256::ZERO,
            block_number: 1,
        },
    );

    let tx = signed_transfer(&privkey, 5, recipient, 10);
    let result = agent.submit_transaction(&tx.encode().unwrap(), false).await;
    assert!(matches!(result, Err(threepc_types::AgentError::ExecError(_))));
}
