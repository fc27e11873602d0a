use thiserror::Error;

/// Failure taxonomy shared by the shard, broker and agent.
///
/// `transient` failures are retried by the agent with a fresh ticket;
/// `permanent` failures are surfaced to the caller as-is; `protocol`
/// failures indicate a shard-level contract violation and are also
/// surfaced, generally after the broker rolls the ticket back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Transient,
    Permanent,
    Protocol,
}

/// Errors a runtime locking shard can return from `try_lock`, `prepare`,
/// `commit`, `rollback` and `get_tickets`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShardError {
    #[error("ticket was wounded by an older ticket")]
    Wounded,

    #[error("ticket is already prepared and cannot be modified")]
    Prepared,

    #[error("ticket is not prepared")]
    NotPrepared,

    #[error("lock request queued, caller notified asynchronously")]
    LockQueued,

    #[error("key is already locked by another ticket")]
    LockHeld,

    #[error("ticket does not hold the lock required for this operation")]
    LockNotHeld,

    #[error("state update references a key held under only a read lock")]
    StateUpdateWithReadLock,

    #[error("unknown ticket")]
    UnknownTicket,
}

impl ShardError {
    pub fn classify(&self) -> FailureClass {
        match self {
            ShardError::Wounded => FailureClass::Transient,
            ShardError::Prepared
            | ShardError::NotPrepared
            | ShardError::LockQueued
            | ShardError::LockHeld
            | ShardError::LockNotHeld
            | ShardError::StateUpdateWithReadLock
            | ShardError::UnknownTicket => FailureClass::Protocol,
        }
    }
}

/// Errors surfaced by the broker, layering shard errors with broker-local
/// I/O and recovery failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error(transparent)]
    Shard(#[from] ShardError),

    #[error("shard {0} did not acknowledge within the retry budget")]
    ShardUnavailable(u32),

    #[error("broker recovery did not converge within the startup deadline")]
    RecoveryTimedOut,

    #[error("ticket {0} is unknown to this broker")]
    UnknownTicket(u64),
}

impl BrokerError {
    pub fn classify(&self) -> FailureClass {
        match self {
            BrokerError::Shard(inner) => inner.classify(),
            BrokerError::ShardUnavailable(_) => FailureClass::Transient,
            BrokerError::RecoveryTimedOut => FailureClass::Permanent,
            BrokerError::UnknownTicket(_) => FailureClass::Protocol,
        }
    }
}

/// Caller-visible runner/agent errors: a `permanent` bucket surfaced as-is,
/// plus the `retry`/`wounded` transients threaded through from the broker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    #[error("transient conflict, retry with a fresh ticket")]
    Retry,

    #[error("ticket was wounded, retry with a fresh ticket")]
    Wounded,

    #[error("execution error: {0}")]
    ExecError(String),

    #[error("could not load function: {0}")]
    FunctionLoad(String),

    #[error("internal error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Broker(#[from] BrokerError),
}

impl AgentError {
    pub fn classify(&self) -> FailureClass {
        match self {
            AgentError::Retry | AgentError::Wounded => FailureClass::Transient,
            AgentError::ExecError(_) | AgentError::FunctionLoad(_) | AgentError::InternalError(_) => {
                FailureClass::Permanent
            }
            AgentError::Broker(inner) => inner.classify(),
        }
    }

    /// Whether this error should be requeued by the agent's retry loop
    /// rather than reported to the RPC-layer callback.
    pub fn is_retryable(&self) -> bool {
        matches!(self.classify(), FailureClass::Transient)
    }
}
