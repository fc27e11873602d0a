//! The transaction runner's external surface: the methods an agent can
//! dispatch a ticket's function call to. `execute_transaction` is the only
//! one that mutates state (via the `StateUpdates` it returns); everything
//! else is a read.

use crate::error::RunnerError;
use crate::receipt::Receipt;
use revm::primitives::B256;
use threepc_evm_host::{account_key, code_key, StateAccess};
use threepc_types::{Key, LockMode, Ticket, Value};

const TX_TAG: u8 = 0x04;
const RECEIPT_TAG: u8 = 0x05;

pub fn tx_key(tx_hash: B256) -> Key {
    let mut bytes = Vec::with_capacity(1 + 32);
    bytes.push(TX_TAG);
    bytes.extend_from_slice(tx_hash.as_slice());
    Key::from(bytes)
}

pub fn receipt_key(tx_hash: B256) -> Key {
    let mut bytes = Vec::with_capacity(1 + 32);
    bytes.push(RECEIPT_TAG);
    bytes.extend_from_slice(tx_hash.as_slice());
    Key::from(bytes)
}

pub struct AccountView {
    pub nonce: u64,
    pub balance: threepc_u256::U256,
    pub code_hash: [u8; 32],
}

/// Reads an account's nonce, balance and code hash without going through
/// the EVM at all.
pub async fn read_account(
    access: &dyn StateAccess,
    ticket: Ticket,
    addr: threepc_txcodec::Address,
) -> Result<AccountView, RunnerError> {
    let key = account_key(revm_address(&addr));
    let value = access
        .lock_and_read(ticket, key, LockMode::Read)
        .await
        .map_err(threepc_evm_host::HostError::from)?;
    if value.is_absent() {
        return Ok(AccountView {
            nonce: 0,
            balance: threepc_u256::U256::ZERO,
            code_hash: [0u8; 32],
        });
    }
    let info = threepc_evm_host::decode_account(value.as_bytes())
        .map_err(|e| RunnerError::Codec(e.to_string()))?;
    let mut code_hash = [0u8; 32];
    code_hash.copy_from_slice(info.code_hash.as_slice());
    Ok(AccountView {
        nonce: info.nonce,
        balance: threepc_u256::U256::from_be_bytes(info.balance.to_be_bytes::<32>()),
        code_hash,
    })
}

/// Reads the deployed bytecode at an account's address.
pub async fn read_account_code(
    access: &dyn StateAccess,
    ticket: Ticket,
    addr: threepc_txcodec::Address,
) -> Result<Vec<u8>, RunnerError> {
    let key = code_key(revm_address(&addr));
    let value = access
        .lock_and_read(ticket, key, LockMode::Read)
        .await
        .map_err(threepc_evm_host::HostError::from)?;
    Ok(value.into_bytes())
}

/// Fetches a previously executed transaction's raw wire encoding.
pub async fn get_transaction(
    access: &dyn StateAccess,
    ticket: Ticket,
    tx_hash: B256,
) -> Result<Option<Vec<u8>>, RunnerError> {
    let value = access
        .lock_and_read(ticket, tx_key(tx_hash), LockMode::Read)
        .await
        .map_err(threepc_evm_host::HostError::from)?;
    Ok(if value.is_absent() { None } else { Some(value.into_bytes()) })
}

/// Fetches a previously executed transaction's receipt.
pub async fn get_transaction_receipt(
    access: &dyn StateAccess,
    ticket: Ticket,
    tx_hash: B256,
) -> Result<Option<Receipt>, RunnerError> {
    let value = access
        .lock_and_read(ticket, receipt_key(tx_hash), LockMode::Read)
        .await
        .map_err(threepc_evm_host::HostError::from)?;
    if value.is_absent() {
        return Ok(None);
    }
    let receipt: Receipt =
        serde_json::from_slice(value.as_bytes()).map_err(|e| RunnerError::Codec(e.to_string()))?;
    Ok(Some(receipt))
}

pub(crate) fn encode_receipt(receipt: &Receipt) -> Value {
    Value::new(serde_json::to_vec(receipt).expect("receipt serialization cannot fail"))
}

fn revm_address(addr: &threepc_txcodec::Address) -> revm::primitives::Address {
    revm::primitives::Address::from_slice(addr.as_bytes())
}
