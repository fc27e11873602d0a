use crate::retry_queue::RetryQueue;
use crate::runner_kind::RunnerKind;
use crate::state_access::BrokerStateAccess;
use revm::primitives::B256;
use std::sync::Arc;
use threepc_broker::Broker;
use threepc_evm_host::{account_key, HostError};
use threepc_evm_runner::{execute_transaction, Receipt, RunnerError};
use threepc_types::{AgentError, Directory, Key};
use threepc_txcodec::{Address, Transaction};

/// Static per-deployment parameters an agent needs to build an execution
/// environment: which chain this node answers for, and the fixed block
/// context every transaction runs against (see the block-context Open
/// Question decision in DESIGN.md).
#[derive(Debug, Clone, Copy)]
pub struct AgentConfig {
    pub chain_id: u64,
    pub block_hash: B256,
    pub block_number: u64,
}

/// Owns one logical request end to end: mint a ticket, lock the sender's
/// account, run the EVM, and drive the ticket through two-phase commit (or
/// roll it back on a dry run or a permanent failure). Transient failures
/// are retried with a fresh ticket, admitted through a `RetryQueue` so
/// older retries are served first.
pub struct Agent<D: Directory> {
    broker: Arc<Broker<D>>,
    retries: RetryQueue,
    config: AgentConfig,
}

fn revm_address(addr: &Address) -> revm::primitives::Address {
    revm::primitives::Address::from_slice(addr.as_bytes())
}

fn map_runner_error(err: RunnerError) -> AgentError {
    let message = err.to_string();
    match err {
        RunnerError::Host(HostError::Broker(inner)) if inner.classify() == threepc_types::FailureClass::Transient => {
            AgentError::Wounded
        }
        RunnerError::Host(_) => AgentError::InternalError(message),
        RunnerError::Codec(_) => AgentError::FunctionLoad(message),
        _ => AgentError::ExecError(message),
    }
}

impl<D: Directory> Agent<D> {
    pub fn new(broker: Arc<Broker<D>>, config: AgentConfig) -> Self {
        Self {
            broker,
            retries: RetryQueue::new(),
            config,
        }
    }

    /// Which runner kind this agent dispatches to. Only `RunnerKind::Evm`
    /// is wired up today.
    pub fn runner_kind(&self) -> RunnerKind {
        RunnerKind::Evm
    }

    /// Decodes, recovers the sender of, and runs a raw signed transaction.
    /// On `dry_run`, the ticket is always rolled back regardless of
    /// outcome. Idempotent across wounds: each retry preserves the original
    /// decoded transaction and sender, only the ticket changes.
    pub async fn submit_transaction(&self, raw_tx: &[u8], dry_run: bool) -> Result<Receipt, AgentError> {
        let tx = Transaction::decode(raw_tx).map_err(|e| AgentError::FunctionLoad(e.to_string()))?;
        let sender = tx.recover_sender().map_err(|e| AgentError::FunctionLoad(e.to_string()))?;

        let mut first_attempt = true;
        loop {
            let ticket = self.broker.begin().await;
            if !first_attempt {
                self.retries.admit(ticket).await;
            }
            first_attempt = false;

            match self.attempt(ticket, &tx, sender, dry_run).await {
                Ok(receipt) => return Ok(receipt),
                Err(AgentError::Wounded) | Err(AgentError::Retry) => continue,
                Err(err) => return Err(err),
            }
        }
    }

    async fn attempt(
        &self,
        ticket: threepc_types::Ticket,
        tx: &Transaction,
        sender: Address,
        dry_run: bool,
    ) -> Result<Receipt, AgentError> {
        let access = BrokerStateAccess::new(&self.broker);
        let sender_key: Key = account_key(revm_address(&sender));

        // A dry run only ever needs to read the sender; a real submission
        // needs a write lock up front since it will debit the sender's
        // balance and bump its nonce.
        let lock_result = if dry_run {
            self.broker.try_lock(ticket, std::slice::from_ref(&sender_key), &[]).await
        } else {
            self.broker.try_lock(ticket, &[], std::slice::from_ref(&sender_key)).await
        };
        if let Err(err) = lock_result {
            return Err(classify_lock_failure(err));
        }
        access.mark_touched(&sender_key);

        let outcome = execute_transaction(
            &access,
            ticket,
            tx,
            sender,
            self.config.chain_id,
            self.config.block_hash,
            self.config.block_number,
            dry_run,
        );

        let touched = access.touched_shards();

        match outcome {
            Ok(exec) => {
                if dry_run {
                    self.broker.rollback(ticket, &touched).await.ok();
                    return Ok(exec.receipt);
                }
                self.broker
                    .stage_writes(ticket, exec.state_updates)
                    .await
                    .map_err(AgentError::from)?;
                self.broker.prepare(ticket, &touched).await.map_err(AgentError::from)?;
                self.broker.commit(ticket, &touched).await.map_err(AgentError::from)?;
                Ok(exec.receipt)
            }
            Err(run_err) => {
                self.broker.rollback(ticket, &touched).await.ok();
                Err(map_runner_error(run_err))
            }
        }
    }
}

fn classify_lock_failure(err: threepc_types::BrokerError) -> AgentError {
    if err.classify() == threepc_types::FailureClass::Transient {
        AgentError::Wounded
    } else {
        AgentError::Broker(err)
    }
}
