//! Maps EVM-level identities (an account, a storage slot, a code blob) onto
//! the flat `Key` space a shard stores. Each space is tagged so an account
//! key, a storage key and a code key can never collide even if their raw
//! address/slot/hash bytes happened to coincide.

use revm::primitives::{Address, U256};
use threepc_types::Key;

const ACCOUNT_TAG: u8 = 0x01;
const STORAGE_TAG: u8 = 0x02;
const CODE_TAG: u8 = 0x03;

pub fn account_key(addr: Address) -> Key {
    let mut bytes = Vec::with_capacity(1 + 20);
    bytes.push(ACCOUNT_TAG);
    bytes.extend_from_slice(addr.as_slice());
    Key::from(bytes)
}

pub fn storage_key(addr: Address, slot: U256) -> Key {
    let mut bytes = Vec::with_capacity(1 + 20 + 32);
    bytes.push(STORAGE_TAG);
    bytes.extend_from_slice(addr.as_slice());
    bytes.extend_from_slice(&slot.to_be_bytes::<32>());
    Key::from(bytes)
}

pub fn code_key(addr: Address) -> Key {
    let mut bytes = Vec::with_capacity(1 + 20);
    bytes.push(CODE_TAG);
    bytes.extend_from_slice(addr.as_slice());
    Key::from(bytes)
}
