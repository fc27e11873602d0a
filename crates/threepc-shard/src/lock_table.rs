use std::collections::VecDeque;
use threepc_types::{LockMode, Ticket};

/// Per-key lock state: the tickets currently holding the key (multiple
/// readers, or a single writer) and a FIFO queue of tickets waiting for it.
#[derive(Debug, Default)]
pub struct LockEntry {
    pub holders: Vec<(Ticket, LockMode)>,
    pub queue: VecDeque<(Ticket, LockMode)>,
}

impl LockEntry {
    pub fn is_empty(&self) -> bool {
        self.holders.is_empty() && self.queue.is_empty()
    }

    /// Holders that conflict with a new request for `mode`, excluding the
    /// requester itself (a ticket re-requesting a lock it already holds is
    /// never a conflict with itself).
    pub fn conflicting_holders(&self, requester: Ticket, mode: LockMode) -> Vec<Ticket> {
        self.holders
            .iter()
            .filter(|(holder, held_mode)| *holder != requester && !held_mode.compatible_with(&mode))
            .map(|(holder, _)| *holder)
            .collect()
    }

    pub fn grant(&mut self, ticket: Ticket, mode: LockMode) {
        if let Some(existing) = self.holders.iter_mut().find(|(t, _)| *t == ticket) {
            if mode.is_write() {
                existing.1 = LockMode::Write;
            }
        } else {
            self.holders.push((ticket, mode));
        }
    }

    pub fn enqueue(&mut self, ticket: Ticket, mode: LockMode) {
        if !self.queue.iter().any(|(t, _)| *t == ticket) {
            self.queue.push_back((ticket, mode));
        }
    }

    pub fn release(&mut self, ticket: Ticket) {
        self.holders.retain(|(t, _)| *t != ticket);
        self.queue.retain(|(t, _)| *t != ticket);
    }
}
