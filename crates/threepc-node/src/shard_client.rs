use async_trait::async_trait;
use threepc_broker::{LockOutcome, ShardClient, ShardTicketState};
use threepc_shard::{LockOutcome as InnerOutcome, Shard, TicketStatus as InnerStatus};
use threepc_types::{Key, LockMode, ShardError, StateUpdates, Ticket, Value};
use tokio::sync::Mutex;

/// Runs a `threepc_shard::Shard` in the same process as the broker, behind
/// the broker's `ShardClient` seam. A multi-process deployment would swap
/// this for a client that speaks the shard's RPC wire format instead.
pub struct InProcessShard(Mutex<Shard>);

impl InProcessShard {
    pub fn new() -> Self {
        Self(Mutex::new(Shard::new()))
    }
}

impl Default for InProcessShard {
    fn default() -> Self {
        Self::new()
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
