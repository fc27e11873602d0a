//! The runtime locking shard: one partition's key-value state plus a
//! wound-wait lock manager, and the replicated-log plumbing a real
//! deployment would wrap around it for durability.

mod lock_table;
mod replicated_log;
mod shard;
mod ticket_record;

pub use replicated_log::{ReplicatedLog, ShardOp};
pub use shard::{LockOutcome, Shard};
pub use ticket_record::TicketStatus;
