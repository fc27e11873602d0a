use std::fmt;

/// A ticket's position in the broker's view of its own two-phase-commit
/// lifecycle. Distinct from a shard's local view (`threepc_shard::TicketStatus`)
/// which only tracks what affects that shard's lock table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketState {
    Begun,
    Locking,
    Preparing,
    Prepared,
    Committing,
    Committed,
    Finishing,
    Done,
    Wounded,
    Failed,
}

impl TicketState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketState::Done | TicketState::Wounded | TicketState::Failed)
    }
}

impl fmt::Display for TicketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A shard's reported status for a ticket, as returned by `get_tickets`
/// during broker startup recovery. Mirrors `threepc_shard::TicketStatus`
/// without binding the broker's public API to that crate's internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardTicketState {
    Active,
    Prepared,
    Committed,
    RolledBack,
    Wounded,
}
