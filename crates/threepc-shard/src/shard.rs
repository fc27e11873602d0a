use crate::lock_table::LockEntry;
use crate::ticket_record::{TicketRecord, TicketStatus};
use std::collections::HashMap;
use threepc_types::{Key, LockMode, ShardError, StateUpdates, Ticket, Value};

/// Whether a lock request was granted immediately or queued behind a
/// conflicting holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    Granted,
    Queued,
}

/// A single partition's in-memory key-value store plus its wound-wait lock
/// manager. A `Shard` owns no networking or persistence; callers (the
/// replicated log, the broker's RPC surface) drive it synchronously and are
/// responsible for making every mutating call idempotent across retries.
pub struct Shard {
    data: HashMap<Key, Value>,
    lock_table: HashMap<Key, LockEntry>,
    tickets: HashMap<Ticket, TicketRecord>,
}

impl Default for Shard {
    fn default() -> Self {
        Self::new()
    }
}

impl Shard {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            lock_table: HashMap::new(),
            tickets: HashMap::new(),
        }
    }

    fn ticket_mut(&mut self, ticket: Ticket) -> &mut TicketRecord {
        self.tickets.entry(ticket).or_insert_with(TicketRecord::new)
    }

    fn status_of(&self, ticket: Ticket) -> Option<TicketStatus> {
        self.tickets.get(&ticket).and_then(|r| r.status)
    }

    /// Attempts to acquire `mode` on `key` for `ticket`, applying wound-wait:
    /// an older ticket wounds younger conflicting holders and takes the
    /// lock; a younger ticket queues behind an older holder. Prepared
    /// tickets can never be wounded — a request that conflicts with one
    /// always queues, regardless of relative age.
    pub fn try_lock(&mut self, ticket: Ticket, key: Key, mode: LockMode) -> Result<LockOutcome, ShardError> {
        if matches!(self.status_of(ticket), Some(TicketStatus::Wounded)) {
            return Err(ShardError::Wounded);
        }

        loop {
            let entry = self.lock_table.entry(key.clone()).or_default();
            let conflicting = entry.conflicting_holders(ticket, mode);

            if conflicting.is_empty() && entry.queue.iter().all(|(t, _)| *t == ticket) {
                entry.grant(ticket, mode);
                let record = self.ticket_mut(ticket);
                let slot = record.held.entry(key).or_insert(mode);
                if mode.is_write() {
                    *slot = LockMode::Write;
                }
                return Ok(LockOutcome::Granted);
            }

            let mut wounded_any = false;
            for holder in conflicting {
                if self.status_of(holder) == Some(TicketStatus::Prepared) {
                    self.lock_table.get_mut(&key).unwrap().enqueue(ticket, mode);
                    return Ok(LockOutcome::Queued);
                }
                if ticket.is_older_than(&holder) {
                    self.wound(holder);
                    wounded_any = true;
                } else {
                    self.lock_table.get_mut(&key).unwrap().enqueue(ticket, mode);
                    return Ok(LockOutcome::Queued);
                }
            }

            if !wounded_any {
                self.lock_table.get_mut(&key).unwrap().enqueue(ticket, mode);
                return Ok(LockOutcome::Queued);
            }
            // Conflicting holders were wounded; loop to re-check the now-clear key.
        }
    }

    /// Aborts `ticket`: releases every lock it holds and advances each
    /// affected key's queue. Marks the ticket `Wounded` so a subsequent
    /// `try_lock`/`prepare`/`commit` on it fails fast.
    fn wound(&mut self, ticket: Ticket) {
        log::debug!("wounding ticket {:?}", ticket);
        let keys: Vec<Key> = self
            .tickets
            .get(&ticket)
            .map(|r| r.held.keys().cloned().collect())
            .unwrap_or_default();
        for key in &keys {
            if let Some(entry) = self.lock_table.get_mut(key) {
                entry.release(ticket);
            }
            self.advance_queue(key.clone());
        }
        let record = self.tickets.entry(ticket).or_insert_with(TicketRecord::new);
        record.status = Some(TicketStatus::Wounded);
        record.held.clear();
        record.pending_writes.clear();
    }

    /// After a key's lock state changes, grants the lock to as many
    /// waiters at the head of the FIFO queue as are mutually compatible.
    fn advance_queue(&mut self, key: Key) {
        loop {
            let head = match self.lock_table.get(&key).and_then(|e| e.queue.front().copied()) {
                Some(head) => head,
                None => return,
            };
            let (ticket, mode) = head;
            let entry = self.lock_table.get(&key).unwrap();
            if !entry.conflicting_holders(ticket, mode).is_empty() {
                return;
            }
            let entry = self.lock_table.get_mut(&key).unwrap();
            entry.queue.pop_front();
            entry.grant(ticket, mode);
            let record = self.tickets.entry(ticket).or_insert_with(TicketRecord::new);
            let slot = record.held.entry(key.clone()).or_insert(mode);
            if mode.is_write() {
                *slot = LockMode::Write;
            }
        }
    }

    /// Reads the currently committed value for `key`, requiring the caller
    /// to already hold some lock on it.
    pub fn read(&self, ticket: Ticket, key: &Key) -> Result<Value, ShardError> {
        let record = self.tickets.get(&ticket).ok_or(ShardError::UnknownTicket)?;
        if !record.held.contains_key(key) {
            return Err(ShardError::LockNotHeld);
        }
        if let Some(pending) = record.pending_writes.get(key) {
            return Ok(pending.clone());
        }
        Ok(self.data.get(key).cloned().unwrap_or_default())
    }

    /// Stages writes for `ticket`; every written key must be held under a
    /// write lock. Staged writes become visible to the ticket's own reads
    /// immediately but are only applied to shared state on commit.
    pub fn stage_writes(&mut self, ticket: Ticket, updates: StateUpdates) -> Result<(), ShardError> {
        let record = self.tickets.get_mut(&ticket).ok_or(ShardError::UnknownTicket)?;
        if record.status == Some(TicketStatus::Wounded) {
            return Err(ShardError::Wounded);
        }
        if record.status == Some(TicketStatus::Prepared) {
            return Err(ShardError::Prepared);
        }
        for (key, _) in &updates {
            match record.held.get(key) {
                Some(LockMode::Write) => {}
                Some(LockMode::Read) => return Err(ShardError::StateUpdateWithReadLock),
                None => return Err(ShardError::LockNotHeld),
            }
        }
        record.pending_writes.extend(updates);
        Ok(())
    }

    /// Marks `ticket` prepared: from this point its locks are immune to
    /// wounding until the broker commits or rolls it back.
    pub fn prepare(&mut self, ticket: Ticket) -> Result<(), ShardError> {
        let record = self.tickets.get_mut(&ticket).ok_or(ShardError::UnknownTicket)?;
        match record.status {
            Some(TicketStatus::Prepared) => Ok(()), // idempotent re-delivery
            Some(TicketStatus::Active) => {
                record.status = Some(TicketStatus::Prepared);
                Ok(())
            }
            Some(TicketStatus::Wounded) => Err(ShardError::Wounded),
            _ => Err(ShardError::NotPrepared),
        }
    }

    /// Applies a prepared ticket's staged writes to shared state, releases
    /// its locks, and advances any queues it was blocking.
    pub fn commit(&mut self, ticket: Ticket) -> Result<(), ShardError> {
        let status = self.status_of(ticket);
        match status {
            Some(TicketStatus::Committed) => return Ok(()), // idempotent re-delivery
            Some(TicketStatus::Prepared) => {}
            Some(TicketStatus::Wounded) => return Err(ShardError::Wounded),
            _ => return Err(ShardError::NotPrepared),
        }

        let (keys, writes) = {
            let record = self.tickets.get(&ticket).unwrap();
            (
                record.held.keys().cloned().collect::<Vec<_>>(),
                record.pending_writes.clone(),
            )
        };
        for (key, value) in writes {
            self.data.insert(key, value);
        }
        for key in &keys {
            if let Some(entry) = self.lock_table.get_mut(key) {
                entry.release(ticket);
            }
        }
        let record = self.tickets.get_mut(&ticket).unwrap();
        record.status = Some(TicketStatus::Committed);
        record.held.clear();
        record.pending_writes.clear();
        for key in keys {
            self.advance_queue(key);
        }
        Ok(())
    }

    /// Discards a ticket's staged writes and releases its locks without
    /// touching shared state. Valid from `Active` or `Prepared`.
    pub fn rollback(&mut self, ticket: Ticket) -> Result<(), ShardError> {
        let status = self.status_of(ticket);
        if status == Some(TicketStatus::RolledBack) || status == Some(TicketStatus::Wounded) {
            return Ok(()); // idempotent re-delivery
        }
        if status == Some(TicketStatus::Committed) {
            return Err(ShardError::Prepared);
        }

        let keys: Vec<Key> = self
            .tickets
            .get(&ticket)
            .map(|r| r.held.keys().cloned().collect())
            .unwrap_or_default();
        for key in &keys {
            if let Some(entry) = self.lock_table.get_mut(key) {
                entry.release(ticket);
            }
        }
        let record = self.tickets.entry(ticket).or_insert_with(TicketRecord::new);
        record.status = Some(TicketStatus::RolledBack);
        record.held.clear();
        record.pending_writes.clear();
        for key in keys {
            self.advance_queue(key);
        }
        Ok(())
    }

    /// Lists every ticket this shard has heard of and its current status,
    /// for broker-side startup recovery.
    pub fn get_tickets(&self) -> Vec<(Ticket, TicketStatus)> {
        self.tickets
            .iter()
            .filter_map(|(t, r)| r.status.map(|s| (*t, s)))
            .collect()
    }
}
