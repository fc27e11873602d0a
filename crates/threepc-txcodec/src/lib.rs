//! Ethereum-format transaction codec: legacy, EIP-2930 and EIP-1559
//! transactions over RLP, secp256k1 recoverable signatures, and address
//! derivation (including `CREATE`/`CREATE2`).

mod address;
mod hash;
mod signature;
mod tx;

pub use address::{Address, ADDRESS_LEN};
pub use hash::{Hash, HASH_LEN};
pub use signature::{eth_sign, check_signature, Signature, SignatureError};
pub use tx::{AccessList, AccessListItem, StorageKey, Transaction, TxCodecError, TxType};

/// Default chain id for this network, chosen to spell "CBDC" in hex.
pub const DEFAULT_CHAIN_ID: u64 = 0xCBDC;
