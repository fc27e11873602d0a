use crate::ticket_state::ShardTicketState;
use async_trait::async_trait;
use threepc_types::{Key, LockMode, ShardError, StateUpdates, Ticket, Value};

/// Whether a lock request was granted immediately or queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    Granted,
    Queued,
}

/// The broker's view of a shard: everything it needs to drive a ticket
/// through locking and two-phase commit, expressed as an async trait so
/// production code can back it with an RPC client while tests use an
/// in-process one over `threepc_shard::Shard`.
#[async_trait]
pub trait ShardClient: Send + Sync {
    async fn try_lock(&self, ticket: Ticket, key: Key, mode: LockMode) -> Result<LockOutcome, ShardError>;
    async fn read(&self, ticket: Ticket, key: Key) -> Result<Value, ShardError>;
    async fn stage_writes(&self, ticket: Ticket, updates: StateUpdates) -> Result<(), ShardError>;
    async fn prepare(&self, ticket: Ticket) -> Result<(), ShardError>;
    async fn commit(&self, ticket: Ticket) -> Result<(), ShardError>;
    async fn rollback(&self, ticket: Ticket) -> Result<(), ShardError>;
    async fn get_tickets(&self) -> Result<Vec<(Ticket, ShardTicketState)>, ShardError>;
}
