use std::collections::HashMap;
use threepc_types::{Key, LockMode, Value};

/// Where a ticket sits in its lifecycle on this shard. The shard only sees
/// a subset of the full broker-side lifecycle: it does not know about
/// `Locking`/`Committing`/`Finishing`, only the states that change what it
/// will let the ticket do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketStatus {
    Active,
    Prepared,
    Committed,
    RolledBack,
    Wounded,
}

#[derive(Debug, Default)]
pub struct TicketRecord {
    pub status: Option<TicketStatus>,
    pub held: HashMap<Key, LockMode>,
    pub pending_writes: HashMap<Key, Value>,
}

impl TicketRecord {
    pub fn new() -> Self {
        Self {
            status: Some(TicketStatus::Active),
            held: HashMap::new(),
            pending_writes: HashMap::new(),
        }
    }
}
