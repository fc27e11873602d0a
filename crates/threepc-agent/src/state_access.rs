use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use threepc_broker::Broker;
use threepc_evm_host::StateAccess;
use threepc_types::{BrokerError, Directory, Key, LockMode, ShardId, Ticket, Value};

/// Bridges a `Broker` into the EVM host's `StateAccess` seam, acquiring a
/// lock per key on demand as the interpreter touches it and recording which
/// shards were touched so the caller knows what to `prepare`/`commit`.
pub struct BrokerStateAccess<'a, D: Directory> {
    broker: &'a Broker<D>,
    touched: Mutex<HashSet<ShardId>>,
}

impl<'a, D: Directory> BrokerStateAccess<'a, D> {
    pub fn new(broker: &'a Broker<D>) -> Self {
        Self {
            broker,
            touched: Mutex::new(HashSet::new()),
        }
    }

    pub fn mark_touched(&self, key: &Key) {
        self.touched.lock().unwrap().insert(self.broker.shard_id_for(key));
    }

    pub fn touched_shards(&self) -> HashSet<ShardId> {
        self.touched.lock().unwrap().clone()
    }
}

#[async_trait]
impl<'a, D: Directory> StateAccess for BrokerStateAccess<'a, D> {
    async fn lock_and_read(&self, ticket: Ticket, key: Key, mode: LockMode) -> Result<Value, BrokerError> {
        self.mark_touched(&key);
        match mode {
            LockMode::Read => self.broker.try_lock(ticket, &[key.clone()], &[]).await?,
            LockMode::Write => self.broker.try_lock(ticket, &[], &[key.clone()]).await?,
        }
        self.broker.read(ticket, &key).await
    }
}
