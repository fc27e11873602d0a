//! Cross-shard transaction orchestration: the `Broker` drives a ticket
//! through locking and two-phase commit across whatever shards its keys
//! land on, and recovers in-flight tickets after a restart.

mod broker;
mod shard_client;
mod ticket_state;

pub use broker::Broker;
pub use shard_client::{LockOutcome, ShardClient};
pub use ticket_state::{ShardTicketState, TicketState};
