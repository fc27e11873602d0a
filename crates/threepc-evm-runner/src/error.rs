use thiserror::Error;
use threepc_evm_host::HostError;
use threepc_types::{BrokerError, FailureClass, ShardError};

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("nonce mismatch: expected {expected}, got {got}")]
    NonceMismatch { expected: u64, got: u64 },

    #[error("gas limit {limit} is below the intrinsic gas cost {intrinsic}")]
    InsufficientGas { limit: u64, intrinsic: u64 },

    #[error("sender balance cannot cover gas_limit * gas_price plus value")]
    InsufficientFunds,

    #[error(transparent)]
    Host(#[from] HostError),

    #[error("transaction decode failed: {0}")]
    Codec(String),

    #[error("evm execution halted: {0}")]
    Halted(String),
}

impl RunnerError {
    pub fn classify(&self) -> FailureClass {
        match self {
            RunnerError::Host(HostError::Broker(BrokerError::Shard(ShardError::Wounded))) => {
                FailureClass::Transient
            }
            RunnerError::Host(_) => FailureClass::Protocol,
            _ => FailureClass::Permanent,
        }
    }
}
