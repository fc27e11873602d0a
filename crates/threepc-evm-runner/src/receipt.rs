use revm::primitives::{Address, Log, B256};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: B256,
    pub success: bool,
    pub gas_used: u64,
    pub contract_address: Option<Address>,
    pub output: Vec<u8>,
    #[serde(skip)]
    pub logs: Vec<Log>,
}
