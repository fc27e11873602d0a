use crate::shard_client::{LockOutcome, ShardClient};
use crate::ticket_state::{ShardTicketState, TicketState};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use threepc_types::{BrokerError, Directory, Key, LockMode, ShardId, StateUpdates, Ticket, TicketMachine, Value};
use tokio::sync::Mutex;

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(5);
const LOCK_POLL_ATTEMPTS: u32 = 2000;

/// Orchestrates a ticket across the shards it touches: acquiring locks,
/// running two-phase commit, and recovering in-flight tickets at startup.
///
/// Generic over the `Directory` that maps keys to shards so the same
/// orchestration logic works with any partitioning scheme.
pub struct Broker<D: Directory> {
    directory: D,
    shards: HashMap<ShardId, Arc<dyn ShardClient>>,
    ticket_machine: TicketMachine,
    tickets: Mutex<HashMap<Ticket, TicketState>>,
}

impl<D: Directory> Broker<D> {
    pub fn new(directory: D, shards: HashMap<ShardId, Arc<dyn ShardClient>>) -> Self {
        Self {
            directory,
            shards,
            ticket_machine: TicketMachine::new(),
            tickets: Mutex::new(HashMap::new()),
        }
    }

    /// Resumes ticket numbering past the highest one any shard has seen, so
    /// a restarted broker never reissues a ticket number a shard already
    /// has state for.
    pub fn new_resuming(directory: D, shards: HashMap<ShardId, Arc<dyn ShardClient>>, resume_from: u64) -> Self {
        Self {
            directory,
            shards,
            ticket_machine: TicketMachine::starting_at(resume_from),
            tickets: Mutex::new(HashMap::new()),
        }
    }

    fn shard_for(&self, key: &Key) -> Result<Arc<dyn ShardClient>, BrokerError> {
        let shard_id = self.directory.shard_for(key);
        self.shards
            .get(&shard_id)
            .cloned()
            .ok_or(BrokerError::ShardUnavailable(shard_id.value()))
    }

    /// Which shard a key lands on, without resolving a client. Callers that
    /// need to track which shards a ticket touched (to know which ones to
    /// `prepare`/`commit`) can use this without reaching into the directory
    /// themselves.
    pub fn shard_id_for(&self, key: &Key) -> ShardId {
        self.directory.shard_for(key)
    }

    async fn set_state(&self, ticket: Ticket, state: TicketState) {
        self.tickets.lock().await.insert(ticket, state);
    }

    pub async fn ticket_state(&self, ticket: Ticket) -> Option<TicketState> {
        self.tickets.lock().await.get(&ticket).copied()
    }

    /// Mints a fresh ticket and registers it as `Begun`.
    pub async fn begin(&self) -> Ticket {
        let ticket = self.ticket_machine.next_ticket();
        self.set_state(ticket, TicketState::Begun).await;
        ticket
    }

    /// Acquires locks on every key in `reads` and `writes` (write locks take
    /// priority where a key appears in both), polling on `Queued` outcomes.
    /// A shard wounding this ticket while we wait surfaces as
    /// `BrokerError::Shard(ShardError::Wounded)` and the ticket moves to
    /// `Wounded`.
    pub async fn try_lock(
        &self,
        ticket: Ticket,
        reads: &[Key],
        writes: &[Key],
    ) -> Result<(), BrokerError> {
        self.set_state(ticket, TicketState::Locking).await;

        let mut wanted: HashMap<Key, LockMode> = HashMap::new();
        for key in reads {
            wanted.entry(key.clone()).or_insert(LockMode::Read);
        }
        for key in writes {
            wanted.insert(key.clone(), LockMode::Write);
        }

        for (key, mode) in wanted {
            let client = self.shard_for(&key)?;
            let mut outcome = client.try_lock(ticket, key.clone(), mode).await;
            let mut attempts = 0;
            while matches!(outcome, Ok(LockOutcome::Queued)) && attempts < LOCK_POLL_ATTEMPTS {
                tokio::time::sleep(LOCK_POLL_INTERVAL).await;
                outcome = client.try_lock(ticket, key.clone(), mode).await;
                attempts += 1;
            }
            match outcome {
                Ok(LockOutcome::Granted) => {}
                Ok(LockOutcome::Queued) => {
                    return Err(BrokerError::ShardUnavailable(self.directory.shard_for(&key).value()));
                }
                Err(err) => {
                    if matches!(err, threepc_types::ShardError::Wounded) {
                        self.set_state(ticket, TicketState::Wounded).await;
                    }
                    return Err(BrokerError::Shard(err));
                }
            }
        }
        Ok(())
    }

    /// Stages a batch of writes on whichever shard owns each key. Callers
    /// must already hold write locks on every key via `try_lock`.
    pub async fn stage_writes(&self, ticket: Ticket, updates: StateUpdates) -> Result<(), BrokerError> {
        let mut by_shard: HashMap<ShardId, StateUpdates> = HashMap::new();
        for (key, value) in updates {
            let shard_id = self.directory.shard_for(&key);
            by_shard.entry(shard_id).or_default().insert(key, value);
        }
        for (shard_id, batch) in by_shard {
            let client = self
                .shards
                .get(&shard_id)
                .cloned()
                .ok_or(BrokerError::ShardUnavailable(shard_id.value()))?;
            client.stage_writes(ticket, batch).await?;
        }
        Ok(())
    }

    pub async fn read(&self, ticket: Ticket, key: &Key) -> Result<Value, BrokerError> {
        let client = self.shard_for(key)?;
        Ok(client.read(ticket, key.clone()).await?)
    }

    /// Runs the prepare phase across every shard a ticket touched. Per the
    /// always-prepare-read-only-shards policy, `touched` should include
    /// shards whose keys were only read, not just written.
    pub async fn prepare(&self, ticket: Ticket, touched: &HashSet<ShardId>) -> Result<(), BrokerError> {
        self.set_state(ticket, TicketState::Preparing).await;
        for shard_id in touched {
            let client = self
                .shards
                .get(shard_id)
                .cloned()
                .ok_or(BrokerError::ShardUnavailable(shard_id.value()))?;
            if let Err(err) = client.prepare(ticket).await {
                self.rollback(ticket, touched).await.ok();
                return Err(BrokerError::Shard(err));
            }
        }
        self.set_state(ticket, TicketState::Prepared).await;
        Ok(())
    }

    /// Commits a prepared ticket across every touched shard.
    pub async fn commit(&self, ticket: Ticket, touched: &HashSet<ShardId>) -> Result<(), BrokerError> {
        self.set_state(ticket, TicketState::Committing).await;
        for shard_id in touched {
            let client = self
                .shards
                .get(shard_id)
                .cloned()
                .ok_or(BrokerError::ShardUnavailable(shard_id.value()))?;
            client.commit(ticket).await?;
        }
        self.set_state(ticket, TicketState::Committed).await;
        self.finish(ticket).await;
        Ok(())
    }

    /// Rolls a ticket back on every touched shard without committing.
    pub async fn rollback(&self, ticket: Ticket, touched: &HashSet<ShardId>) -> Result<(), BrokerError> {
        for shard_id in touched {
            if let Some(client) = self.shards.get(shard_id) {
                client.rollback(ticket).await.ok();
            }
        }
        self.set_state(ticket, TicketState::Failed).await;
        self.finish(ticket).await;
        Ok(())
    }

    async fn finish(&self, ticket: Ticket) {
        let mut tickets = self.tickets.lock().await;
        if let Some(state) = tickets.get_mut(&ticket) {
            if !state.is_terminal() {
                *state = TicketState::Done;
            }
        }
        tickets.remove(&ticket);
    }

    /// Startup recovery: polls every shard's ticket table and resolves each
    /// ticket found in flight. A ticket reported `Prepared` or `Committed`
    /// by any shard is (re-)committed everywhere, since the broker only
    /// ever prepares a ticket it intends to commit; anything else still
    /// `Active` never got that far and is rolled back.
    pub async fn recover(&self) -> Result<(), BrokerError> {
        let mut per_ticket: HashMap<Ticket, Vec<ShardTicketState>> = HashMap::new();
        for client in self.shards.values() {
            for (ticket, state) in client.get_tickets().await? {
                per_ticket.entry(ticket).or_default().push(state);
            }
        }

        for (ticket, states) in per_ticket {
            let should_commit = states
                .iter()
                .any(|s| matches!(s, ShardTicketState::Prepared | ShardTicketState::Committed));
            log::info!("recovering ticket {ticket}: commit={should_commit}");
            for client in self.shards.values() {
                if should_commit {
                    client.prepare(ticket).await.ok();
                    client.commit(ticket).await.ok();
                } else {
                    client.rollback(ticket).await.ok();
                }
            }
        }
        Ok(())
    }
}
