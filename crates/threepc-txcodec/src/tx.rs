//! Ethereum-format transaction encoding: legacy, EIP-2930 access-list, and
//! EIP-1559 dynamic-fee transactions, all carried over RLP.

use crate::address::Address;
use crate::hash::Hash;
use crate::signature::{self, Signature, SignatureError};
use thiserror::Error;
use threepc_rlp::{RlpError, Value};
use threepc_u256::U256;

#[derive(Debug, Error)]
pub enum TxCodecError {
    #[error(transparent)]
    Rlp(#[from] RlpError),

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error("unrecognized transaction type byte {0:#04x}")]
    UnknownType(u8),

    #[error("wrong field count for transaction type: got {0}")]
    WrongFieldCount(usize),

    #[error("empty transaction payload")]
    Empty,

    #[error("address field is not {0} bytes")]
    BadAddressLength(usize),

    #[error("{0} field does not fit in a u64")]
    FieldOverflow(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StorageKey(pub [u8; 32]);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessListItem {
    pub address: Address,
    pub storage_keys: Vec<StorageKey>,
}

pub type AccessList = Vec<AccessListItem>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxType {
    Legacy,
    AccessList,
    DynamicFee,
}

impl TxType {
    fn type_byte(&self) -> Option<u8> {
        match self {
            TxType::Legacy => None,
            TxType::AccessList => Some(0x01),
            TxType::DynamicFee => Some(0x02),
        }
    }
}

/// A decoded transaction's fields, independent of its wire encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub tx_type: TxType,
    pub chain_id: Option<u64>,
    pub nonce: u64,
    pub gas_price: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
    pub max_fee_per_gas: Option<U256>,
    pub gas_limit: u64,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Vec<u8>,
    pub access_list: AccessList,
    pub signature: Option<Signature>,
}

impl Transaction {
    pub fn is_contract_creation(&self) -> bool {
        self.to.is_none()
    }

    /// The digest that gets signed: for legacy transactions this is the
    /// EIP-155 form `rlp([nonce, gas_price, gas_limit, to, value, data,
    /// chain_id, 0, 0])`; for typed transactions it is `type_byte ++
    /// rlp([... fields without v, r, s])`.
    pub fn sighash(&self) -> Hash {
        match self.tx_type {
            TxType::Legacy => {
                let mut fields = self.legacy_body_fields();
                if let Some(chain_id) = self.chain_id {
                    fields.push(Value::from_u64(chain_id));
                    fields.push(Value::from_u64(0));
                    fields.push(Value::from_u64(0));
                }
                Hash::keccak256(&Value::List(fields).encode())
            }
            TxType::AccessList => {
                let mut payload = vec![self.tx_type.type_byte().unwrap()];
                payload.extend_from_slice(&Value::List(self.access_list_body_fields()).encode());
                Hash::keccak256(&payload)
            }
            TxType::DynamicFee => {
                let mut payload = vec![self.tx_type.type_byte().unwrap()];
                payload.extend_from_slice(&Value::List(self.dynamic_fee_body_fields()).encode());
                Hash::keccak256(&payload)
            }
        }
    }

    fn to_value(&self) -> Value {
        match &self.to {
            Some(addr) => Value::bytes(addr.as_bytes().to_vec()),
            None => Value::bytes(Vec::new()),
        }
    }

    fn legacy_body_fields(&self) -> Vec<Value> {
        vec![
            Value::from_u64(self.nonce),
            Value::bytes(strip_leading_zeros(
                &self.gas_price.unwrap_or(U256::ZERO).to_be_bytes(),
            )),
            Value::from_u64(self.gas_limit),
            self.to_value(),
            Value::bytes(strip_leading_zeros(&self.value.to_be_bytes())),
            Value::bytes(self.data.clone()),
        ]
    }

    fn access_list_value(&self) -> Value {
        Value::list(
            self.access_list
                .iter()
                .map(|item| {
                    Value::list(vec![
                        Value::bytes(item.address.as_bytes().to_vec()),
                        Value::list(
                            item.storage_keys
                                .iter()
                                .map(|k| Value::bytes(k.0.to_vec()))
                                .collect::<Vec<_>>(),
                        ),
                    ])
                })
                .collect::<Vec<_>>(),
        )
    }

    fn access_list_body_fields(&self) -> Vec<Value> {
        vec![
            Value::from_u64(self.chain_id.unwrap_or(0)),
            Value::from_u64(self.nonce),
            Value::bytes(strip_leading_zeros(
                &self.gas_price.unwrap_or(U256::ZERO).to_be_bytes(),
            )),
            Value::from_u64(self.gas_limit),
            self.to_value(),
            Value::bytes(strip_leading_zeros(&self.value.to_be_bytes())),
            Value::bytes(self.data.clone()),
            self.access_list_value(),
        ]
    }

    fn dynamic_fee_body_fields(&self) -> Vec<Value> {
        vec![
            Value::from_u64(self.chain_id.unwrap_or(0)),
            Value::from_u64(self.nonce),
            Value::bytes(strip_leading_zeros(
                &self.max_priority_fee_per_gas.unwrap_or(U256::ZERO).to_be_bytes(),
            )),
            Value::bytes(strip_leading_zeros(
                &self.max_fee_per_gas.unwrap_or(U256::ZERO).to_be_bytes(),
            )),
            Value::from_u64(self.gas_limit),
            self.to_value(),
            Value::bytes(strip_leading_zeros(&self.value.to_be_bytes())),
            Value::bytes(self.data.clone()),
            self.access_list_value(),
        ]
    }

    /// Encodes the full signed transaction, including its signature, as it
    /// appears on the wire (type byte prefix for typed transactions).
    pub fn encode(&self) -> Result<Vec<u8>, TxCodecError> {
        let signature = self.signature.ok_or(TxCodecError::Empty)?;
        let (recovery_id, r, s) = (signature.recovery_id, signature.r, signature.s);

        match self.tx_type {
            TxType::Legacy => {
                let mut fields = self.legacy_body_fields();
                let v = match self.chain_id {
                    Some(chain_id) => recovery_id as u64 + 35 + 2 * chain_id,
                    None => recovery_id as u64 + 27,
                };
                fields.push(Value::from_u64(v));
                fields.push(Value::bytes(strip_leading_zeros(&r)));
                fields.push(Value::bytes(strip_leading_zeros(&s)));
                Ok(Value::List(fields).encode())
            }
            TxType::AccessList => {
                let mut fields = self.access_list_body_fields();
                fields.push(Value::from_u64(recovery_id as u64));
                fields.push(Value::bytes(strip_leading_zeros(&r)));
                fields.push(Value::bytes(strip_leading_zeros(&s)));
                let mut out = vec![0x01];
                out.extend_from_slice(&Value::List(fields).encode());
                Ok(out)
            }
            TxType::DynamicFee => {
                let mut fields = self.dynamic_fee_body_fields();
                fields.push(Value::from_u64(recovery_id as u64));
                fields.push(Value::bytes(strip_leading_zeros(&r)));
                fields.push(Value::bytes(strip_leading_zeros(&s)));
                let mut out = vec![0x02];
                out.extend_from_slice(&Value::List(fields).encode());
                Ok(out)
            }
        }
    }

    /// Decodes a transaction from its wire encoding. A leading byte in
    /// `0x01..=0x02` selects a typed transaction; anything else (an RLP list
    /// tag, `0xc0..=0xff`) is a legacy transaction.
    pub fn decode(input: &[u8]) -> Result<Self, TxCodecError> {
        let &first = input.first().ok_or(TxCodecError::Empty)?;
        match first {
            0x01 => Self::decode_access_list(&input[1..]),
            0x02 => Self::decode_dynamic_fee(&input[1..]),
            _ => Self::decode_legacy(input),
        }
    }

    fn decode_legacy(input: &[u8]) -> Result<Self, TxCodecError> {
        let fields = Value::decode(input)?
            .as_list()
            .ok_or(RlpError::NonCanonicalLength)?
            .to_vec();
        if fields.len() != 9 {
            return Err(TxCodecError::WrongFieldCount(fields.len()));
        }
        let nonce = fields[0].to_u64().map_err(|_| TxCodecError::FieldOverflow("nonce"))?;
        let gas_price = u256_from(&fields[1])?;
        let gas_limit = fields[2].to_u64().map_err(|_| TxCodecError::FieldOverflow("gas_limit"))?;
        let to = address_from(&fields[3])?;
        let value = u256_from(&fields[4])?;
        let data = fields[5].as_bytes().ok_or(RlpError::NonCanonicalLength)?.to_vec();
        let v = fields[6].to_u64().map_err(|_| TxCodecError::FieldOverflow("v"))?;
        let r = fixed32_from(&fields[7])?;
        let s = fixed32_from(&fields[8])?;

        let (chain_id, recovery_id) = if v >= 35 {
            (Some((v - 35) / 2), ((v - 35) % 2) as u8)
        } else {
            (None, (v - 27) as u8)
        };

        Ok(Transaction {
            tx_type: TxType::Legacy,
            chain_id,
            nonce,
            gas_price: Some(gas_price),
            max_priority_fee_per_gas: None,
            max_fee_per_gas: None,
            gas_limit,
            to,
            value,
            data,
            access_list: Vec::new(),
            signature: Some(Signature { r, s, recovery_id }),
        })
    }

    fn decode_access_list(input: &[u8]) -> Result<Self, TxCodecError> {
        let fields = Value::decode(input)?
            .as_list()
            .ok_or(RlpError::NonCanonicalLength)?
            .to_vec();
        if fields.len() != 11 {
            return Err(TxCodecError::WrongFieldCount(fields.len()));
        }
        let chain_id = fields[0].to_u64().map_err(|_| TxCodecError::FieldOverflow("chain_id"))?;
        let nonce = fields[1].to_u64().map_err(|_| TxCodecError::FieldOverflow("nonce"))?;
        let gas_price = u256_from(&fields[2])?;
        let gas_limit = fields[3].to_u64().map_err(|_| TxCodecError::FieldOverflow("gas_limit"))?;
        let to = address_from(&fields[4])?;
        let value = u256_from(&fields[5])?;
        let data = fields[6].as_bytes().ok_or(RlpError::NonCanonicalLength)?.to_vec();
        let access_list = access_list_from(&fields[7])?;
        let recovery_id = fields[8].to_u64().map_err(|_| TxCodecError::FieldOverflow("y_parity"))? as u8;
        let r = fixed32_from(&fields[9])?;
        let s = fixed32_from(&fields[10])?;

        Ok(Transaction {
            tx_type: TxType::AccessList,
            chain_id: Some(chain_id),
            nonce,
            gas_price: Some(gas_price),
            max_priority_fee_per_gas: None,
            max_fee_per_gas: None,
            gas_limit,
            to,
            value,
            data,
            access_list,
            signature: Some(Signature { r, s, recovery_id }),
        })
    }

    fn decode_dynamic_fee(input: &[u8]) -> Result<Self, TxCodecError> {
        let fields = Value::decode(input)?
            .as_list()
            .ok_or(RlpError::NonCanonicalLength)?
            .to_vec();
        if fields.len() != 12 {
            return Err(TxCodecError::WrongFieldCount(fields.len()));
        }
        let chain_id = fields[0].to_u64().map_err(|_| TxCodecError::FieldOverflow("chain_id"))?;
        let nonce = fields[1].to_u64().map_err(|_| TxCodecError::FieldOverflow("nonce"))?;
        let max_priority_fee_per_gas = u256_from(&fields[2])?;
        let max_fee_per_gas = u256_from(&fields[3])?;
        let gas_limit = fields[4].to_u64().map_err(|_| TxCodecError::FieldOverflow("gas_limit"))?;
        let to = address_from(&fields[5])?;
        let value = u256_from(&fields[6])?;
        let data = fields[7].as_bytes().ok_or(RlpError::NonCanonicalLength)?.to_vec();
        let access_list = access_list_from(&fields[8])?;
        let recovery_id = fields[9].to_u64().map_err(|_| TxCodecError::FieldOverflow("y_parity"))? as u8;
        let r = fixed32_from(&fields[10])?;
        let s = fixed32_from(&fields[11])?;

        Ok(Transaction {
            tx_type: TxType::DynamicFee,
            chain_id: Some(chain_id),
            nonce,
            gas_price: None,
            max_priority_fee_per_gas: Some(max_priority_fee_per_gas),
            max_fee_per_gas: Some(max_fee_per_gas),
            gas_limit,
            to,
            value,
            data,
            access_list,
            signature: Some(Signature { r, s, recovery_id }),
        })
    }

    /// Recovers and returns the sender address, verifying the signature
    /// against this transaction's sighash.
    pub fn recover_sender(&self) -> Result<Address, TxCodecError> {
        let signature = self.signature.ok_or(SignatureError::RecoveryFailed)?;
        let digest = *self.sighash().as_bytes();
        Ok(signature::check_signature(&digest, &signature)?)
    }
}

fn strip_leading_zeros(bytes: &[u8]) -> Vec<u8> {
    let first_nonzero = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    bytes[first_nonzero..].to_vec()
}

fn u256_from(value: &Value) -> Result<U256, TxCodecError> {
    let bytes = value.as_bytes().ok_or(RlpError::NonCanonicalLength)?;
    if bytes.len() > 32 {
        return Err(TxCodecError::FieldOverflow("u256"));
    }
    let mut buf = [0u8; 32];
    buf[32 - bytes.len()..].copy_from_slice(bytes);
    Ok(U256::from_be_bytes(buf))
}

fn fixed32_from(value: &Value) -> Result<[u8; 32], TxCodecError> {
    let bytes = value.as_bytes().ok_or(RlpError::NonCanonicalLength)?;
    if bytes.len() > 32 {
        return Err(TxCodecError::FieldOverflow("fixed32"));
    }
    let mut buf = [0u8; 32];
    buf[32 - bytes.len()..].copy_from_slice(bytes);
    Ok(buf)
}

fn address_from(value: &Value) -> Result<Option<Address>, TxCodecError> {
    let bytes = value.as_bytes().ok_or(RlpError::NonCanonicalLength)?;
    if bytes.is_empty() {
        return Ok(None);
    }
    if bytes.len() != 20 {
        return Err(TxCodecError::BadAddressLength(20));
    }
    let mut buf = [0u8; 20];
    buf.copy_from_slice(bytes);
    Ok(Some(Address::new(buf)))
}

fn access_list_from(value: &Value) -> Result<AccessList, TxCodecError> {
    let items = value.as_list().ok_or(RlpError::NonCanonicalLength)?;
    items
        .iter()
        .map(|entry| {
            let entry_fields = entry.as_list().ok_or(RlpError::NonCanonicalLength)?;
            if entry_fields.len() != 2 {
                return Err(TxCodecError::WrongFieldCount(entry_fields.len()));
            }
            let addr_bytes = entry_fields[0].as_bytes().ok_or(RlpError::NonCanonicalLength)?;
            if addr_bytes.len() != 20 {
                return Err(TxCodecError::BadAddressLength(20));
            }
            let mut addr = [0u8; 20];
            addr.copy_from_slice(addr_bytes);
            let keys = entry_fields[1]
                .as_list()
                .ok_or(RlpError::NonCanonicalLength)?
                .iter()
                .map(|k| fixed32_from(k).map(StorageKey))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(AccessListItem {
                address: Address::new(addr),
                storage_keys: keys,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_legacy(chain_id: Option<u64>) -> Transaction {
        let privkey = {
            let mut k = [0x09u8; 32];
            k[31] = 0x01;
            k
        };
        let mut tx = Transaction {
            tx_type: TxType::Legacy,
            chain_id,
            nonce: 0,
            gas_price: Some(U256::from_u64(1_000_000_000)),
            max_priority_fee_per_gas: None,
            max_fee_per_gas: None,
            gas_limit: 21_000,
            to: Some(Address::new([0xaa; 20])),
            value: U256::from_u64(100),
            data: Vec::new(),
            access_list: Vec::new(),
            signature: None,
        };
        let digest = *tx.sighash().as_bytes();
        tx.signature = Some(signature::eth_sign(&privkey, &digest).unwrap());
        tx
    }

    #[test]
    fn legacy_round_trips_through_wire_encoding() {
        let tx = signed_legacy(Some(0xcbdc));
        let encoded = tx.encode().unwrap();
        let decoded = Transaction::decode(&encoded).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn legacy_eip155_v_recovers_correct_chain_id() {
        let tx = signed_legacy(Some(0xcbdc));
        let encoded = tx.encode().unwrap();
        let decoded = Transaction::decode(&encoded).unwrap();
        assert_eq!(decoded.chain_id, Some(0xcbdc));
    }

    #[test]
    fn legacy_sender_recovers_correctly() {
        let privkey = {
            let mut k = [0x09u8; 32];
            k[31] = 0x01;
            k
        };
        let secret_key = libsecp256k1::SecretKey::parse(&privkey).unwrap();
        let pubkey = libsecp256k1::PublicKey::from_secret_key(&secret_key);
        let expected = Address::from_uncompressed_public_key(&pubkey.serialize());

        let tx = signed_legacy(Some(0xcbdc));
        assert_eq!(tx.recover_sender().unwrap(), expected);
    }

    #[test]
    fn dynamic_fee_round_trips() {
        let privkey = {
            let mut k = [0x0au8; 32];
            k[31] = 0x02;
            k
        };
        let mut tx = Transaction {
            tx_type: TxType::DynamicFee,
            chain_id: Some(0xcbdc),
            nonce: 5,
            gas_price: None,
            max_priority_fee_per_gas: Some(U256::from_u64(2_000_000_000)),
            max_fee_per_gas: Some(U256::from_u64(5_000_000_000)),
            gas_limit: 100_000,
            to: None,
            value: U256::ZERO,
            data: vec![0x60, 0x80],
            access_list: vec![AccessListItem {
                address: Address::new([0xbb; 20]),
                storage_keys: vec![StorageKey([0x01; 32])],
            }],
            signature: None,
        };
        let digest = *tx.sighash().as_bytes();
        tx.signature = Some(signature::eth_sign(&privkey, &digest).unwrap());

        let encoded = tx.encode().unwrap();
        assert_eq!(encoded[0], 0x02);
        let decoded = Transaction::decode(&encoded).unwrap();
        assert_eq!(decoded, tx);
        assert!(decoded.is_contract_creation());
    }

    #[test]
    fn access_list_round_trips() {
        let privkey = {
            let mut k = [0x0bu8; 32];
            k[31] = 0x03;
            k
        };
        let mut tx = Transaction {
            tx_type: TxType::AccessList,
            chain_id: Some(0xcbdc),
            nonce: 1,
            gas_price: Some(U256::from_u64(3_000_000_000)),
            max_priority_fee_per_gas: None,
            max_fee_per_gas: None,
            gas_limit: 50_000,
            to: Some(Address::new([0xcc; 20])),
            value: U256::ZERO,
            data: Vec::new(),
            access_list: vec![AccessListItem {
                address: Address::new([0xdd; 20]),
                storage_keys: vec![],
            }],
            signature: None,
        };
        let digest = *tx.sighash().as_bytes();
        tx.signature = Some(signature::eth_sign(&privkey, &digest).unwrap());

        let encoded = tx.encode().unwrap();
        assert_eq!(encoded[0], 0x01);
        let decoded = Transaction::decode(&encoded).unwrap();
        assert_eq!(decoded, tx);
    }
}
