//! Recursive Length Prefix (RLP) encoding, as used by Ethereum-format
//! transactions.
//!
//! Kept as a single crate but split into `writer`/`reader` modules for the
//! two directions of the codec.

mod reader;
mod writer;

use thiserror::Error;

/// A recursion depth past which a decoder gives up rather than blow the
/// stack on adversarial input.
pub const MAX_DEPTH: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RlpError {
    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("length prefix declares more bytes than remain in input")]
    LengthOverrun,

    #[error("recursion depth {0} exceeds the maximum of {MAX_DEPTH}")]
    TooDeep(usize),

    #[error("non-canonical length encoding")]
    NonCanonicalLength,

    #[error("trailing bytes after a complete RLP item")]
    TrailingBytes,
}

/// A decoded or to-be-encoded RLP item: either a raw byte string or a list
/// of items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bytes(Vec<u8>),
    List(Vec<Value>),
}

impl Value {
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Value::Bytes(data.into())
    }

    pub fn list(items: impl Into<Vec<Value>>) -> Self {
        Value::List(items.into())
    }

    /// Wraps an integer as an RLP buffer with leading zero bytes stripped,
    /// and the value `0` represented as the empty buffer, per Ethereum's
    /// canonical integer encoding.
    pub fn from_u64(value: u64) -> Self {
        if value == 0 {
            return Value::Bytes(Vec::new());
        }
        let be = value.to_be_bytes();
        let first_nonzero = be.iter().position(|&b| b != 0).unwrap();
        Value::Bytes(be[first_nonzero..].to_vec())
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            Value::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            Value::Bytes(_) => None,
        }
    }

    pub fn to_u64(&self) -> Result<u64, RlpError> {
        let bytes = self.as_bytes().ok_or(RlpError::NonCanonicalLength)?;
        if bytes.len() > 8 {
            return Err(RlpError::NonCanonicalLength);
        }
        let mut buf = [0u8; 8];
        buf[8 - bytes.len()..].copy_from_slice(bytes);
        Ok(u64::from_be_bytes(buf))
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        writer::write(self, &mut out);
        out
    }

    pub fn decode(input: &[u8]) -> Result<Self, RlpError> {
        let (value, rest) = reader::read(input, 0)?;
        if !rest.is_empty() {
            return Err(RlpError::TrailingBytes);
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn single_byte_below_0x80_is_itself() {
        let v = Value::bytes(vec![0x42]);
        assert_eq!(v.encode(), vec![0x42]);
    }

    #[test]
    fn empty_buffer_encodes_to_0x80() {
        assert_eq!(Value::bytes(vec![]).encode(), vec![0x80]);
    }

    #[test]
    fn short_buffer_round_trips() {
        let v = Value::bytes(b"dog".to_vec());
        let encoded = v.encode();
        assert_eq!(encoded, vec![0x83, b'd', b'o', b'g']);
        assert_eq!(Value::decode(&encoded).unwrap(), v);
    }

    #[test]
    fn long_buffer_round_trips() {
        let data = vec![b'x'; 1024];
        let v = Value::bytes(data);
        let encoded = v.encode();
        assert_eq!(Value::decode(&encoded).unwrap(), v);
    }

    #[test]
    fn empty_list_encodes_to_0xc0() {
        assert_eq!(Value::list(vec![]).encode(), vec![0xc0]);
    }

    #[test]
    fn nested_list_round_trips() {
        let v = Value::list(vec![
            Value::bytes(b"cat".to_vec()),
            Value::list(vec![Value::bytes(vec![1]), Value::bytes(vec![2, 3])]),
        ]);
        let encoded = v.encode();
        assert_eq!(Value::decode(&encoded).unwrap(), v);
    }

    #[test]
    fn u64_round_trips_with_canonical_zero() {
        assert_eq!(Value::from_u64(0).encode(), vec![0x80]);
        assert_eq!(Value::from_u64(0).to_u64().unwrap(), 0);
        assert_eq!(Value::from_u64(1000).to_u64().unwrap(), 1000);
    }

    #[test]
    fn decode_rejects_trailing_bytes() {
        let mut encoded = Value::bytes(vec![1, 2, 3]).encode();
        encoded.push(0xff);
        assert_eq!(Value::decode(&encoded), Err(RlpError::TrailingBytes));
    }

    proptest! {
        #[test]
        fn arbitrary_bytes_round_trip(data in proptest::collection::vec(any::<u8>(), 0..300)) {
            let v = Value::bytes(data);
            let encoded = v.encode();
            prop_assert_eq!(Value::decode(&encoded).unwrap(), v);
        }

        #[test]
        fn arbitrary_u64_round_trips(n in any::<u64>()) {
            let v = Value::from_u64(n);
            prop_assert_eq!(v.to_u64().unwrap(), n);
        }
    }
}
