//! The EVM transaction runner: nonce/gas checks, execution against
//! shard-backed state, and the read-only query surface an agent exposes to
//! callers (account/code/transaction/receipt lookups).

mod error;
mod receipt;
mod runner;
mod selector;

pub use error::RunnerError;
pub use receipt::Receipt;
pub use runner::{execute_transaction, intrinsic_gas, ExecutionOutcome};
pub use selector::{get_transaction, get_transaction_receipt, read_account, read_account_code, AccountView};
