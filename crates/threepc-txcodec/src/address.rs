use crate::hash::Hash;
use std::fmt;
use threepc_rlp::Value;

pub const ADDRESS_LEN: usize = 20;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Derives the address belonging to an uncompressed secp256k1 public key
    /// (65 bytes, leading `0x04` tag): the low 20 bytes of the keccak hash of
    /// the 64-byte (x, y) coordinate pair.
    pub fn from_uncompressed_public_key(pubkey: &[u8; 65]) -> Self {
        let hash = Hash::keccak256(&pubkey[1..]);
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&hash.as_bytes()[12..]);
        Self(bytes)
    }

    /// `CREATE` address: `keccak256(rlp([sender, nonce]))`, low 20 bytes.
    pub fn contract_address(sender: &Address, nonce: u64) -> Self {
        let rlp = Value::list(vec![
            Value::bytes(sender.0.to_vec()),
            Value::from_u64(nonce),
        ]);
        let hash = Hash::keccak256(&rlp.encode());
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&hash.as_bytes()[12..]);
        Self(bytes)
    }

    /// `CREATE2` address per EIP-1014:
    /// `keccak256(0xff ++ sender ++ salt ++ keccak256(init_code))[12..]`.
    pub fn contract_address2(sender: &Address, salt: &[u8; 32], init_code: &[u8]) -> Self {
        let init_code_hash = Hash::keccak256(init_code);
        let mut preimage = Vec::with_capacity(1 + ADDRESS_LEN + 32 + 32);
        preimage.push(0xff);
        preimage.extend_from_slice(&sender.0);
        preimage.extend_from_slice(salt);
        preimage.extend_from_slice(init_code_hash.as_bytes());
        let hash = Hash::keccak256(&preimage);
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&hash.as_bytes()[12..]);
        Self(bytes)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}
