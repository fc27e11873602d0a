//! Wire format for an account record: `rlp([nonce, balance, code_hash])`.
//! Storage and code are content-addressed in their own key spaces, so the
//! account record itself stays small and fixed-shape.

use revm::primitives::{AccountInfo, B256, U256};
use threepc_rlp::{RlpError, Value};

pub fn encode(info: &AccountInfo) -> Vec<u8> {
    let fields = vec![
        Value::from_u64(info.nonce),
        Value::bytes(strip_leading_zeros(&info.balance.to_be_bytes::<32>())),
        Value::bytes(info.code_hash.as_slice().to_vec()),
    ];
    Value::List(fields).encode()
}

pub fn decode(bytes: &[u8]) -> Result<AccountInfo, RlpError> {
    let fields = Value::decode(bytes)?
        .as_list()
        .ok_or(RlpError::NonCanonicalLength)?
        .to_vec();
    if fields.len() != 3 {
        return Err(RlpError::NonCanonicalLength);
    }
    let nonce = fields[0].to_u64()?;
    let balance_bytes = fields[1].as_bytes().ok_or(RlpError::NonCanonicalLength)?;
    let mut balance_buf = [0u8; 32];
    if balance_bytes.len() > 32 {
        return Err(RlpError::NonCanonicalLength);
    }
    balance_buf[32 - balance_bytes.len()..].copy_from_slice(balance_bytes);
    let balance = U256::from_be_bytes(balance_buf);

    let code_hash_bytes = fields[2].as_bytes().ok_or(RlpError::NonCanonicalLength)?;
    if code_hash_bytes.len() != 32 {
        return Err(RlpError::NonCanonicalLength);
    }
    let code_hash = B256::from_slice(code_hash_bytes);

    Ok(AccountInfo {
        balance,
        nonce,
        code_hash,
        code: None,
    })
}

fn strip_leading_zeros(bytes: &[u8]) -> Vec<u8> {
    let first_nonzero = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    bytes[first_nonzero..].to_vec()
}
