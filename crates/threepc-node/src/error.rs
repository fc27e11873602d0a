use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("invalid hex parameter: {0}")]
    BadHex(String),

    #[error("invalid parameter: {0}")]
    BadParam(String),

    #[error(transparent)]
    Agent(#[from] threepc_types::AgentError),

    #[error(transparent)]
    Broker(#[from] threepc_types::BrokerError),

    #[error(transparent)]
    Runner(#[from] threepc_evm_runner::RunnerError),

    #[error("unknown method {0}")]
    UnknownMethod(String),
}

impl NodeError {
    /// JSON-RPC 2.0 error code. `-32602` (invalid params) for malformed
    /// input, `-32601` for an unrecognized method, `-32000` (server error)
    /// for everything that surfaced from the transaction processor itself.
    pub fn rpc_code(&self) -> i64 {
        match self {
            NodeError::BadHex(_) | NodeError::BadParam(_) => -32602,
            NodeError::UnknownMethod(_) => -32601,
            NodeError::Agent(_) | NodeError::Broker(_) | NodeError::Runner(_) => -32000,
        }
    }
}
