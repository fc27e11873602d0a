use crate::{RlpError, Value, MAX_DEPTH};

fn read_length(input: &[u8], len_of_len: usize) -> Result<(usize, &[u8]), RlpError> {
    if input.len() < len_of_len {
        return Err(RlpError::UnexpectedEof);
    }
    let (len_bytes, rest) = input.split_at(len_of_len);
    if len_bytes[0] == 0 {
        return Err(RlpError::NonCanonicalLength);
    }
    let mut buf = [0u8; 8];
    if len_of_len > 8 {
        return Err(RlpError::NonCanonicalLength);
    }
    buf[8 - len_of_len..].copy_from_slice(len_bytes);
    let len = u64::from_be_bytes(buf) as usize;
    Ok((len, rest))
}

pub fn read(input: &[u8], depth: usize) -> Result<(Value, &[u8]), RlpError> {
    if depth > MAX_DEPTH {
        return Err(RlpError::TooDeep(depth));
    }
    let &tag = input.first().ok_or(RlpError::UnexpectedEof)?;
    let rest = &input[1..];

    match tag {
        0x00..=0x7f => Ok((Value::Bytes(vec![tag]), rest)),

        0x80..=0xb7 => {
            let len = (tag - 0x80) as usize;
            if rest.len() < len {
                return Err(RlpError::LengthOverrun);
            }
            if len == 1 && rest[0] < 0x80 {
                return Err(RlpError::NonCanonicalLength);
            }
            let (data, rest) = rest.split_at(len);
            Ok((Value::Bytes(data.to_vec()), rest))
        }

        0xb8..=0xbf => {
            let len_of_len = (tag - 0xb7) as usize;
            let (len, rest) = read_length(rest, len_of_len)?;
            if len <= 55 {
                return Err(RlpError::NonCanonicalLength);
            }
            if rest.len() < len {
                return Err(RlpError::LengthOverrun);
            }
            let (data, rest) = rest.split_at(len);
            Ok((Value::Bytes(data.to_vec()), rest))
        }

        0xc0..=0xf7 => {
            let len = (tag - 0xc0) as usize;
            if rest.len() < len {
                return Err(RlpError::LengthOverrun);
            }
            let (body, rest) = rest.split_at(len);
            Ok((Value::List(read_items(body, depth + 1)?), rest))
        }

        0xf8..=0xff => {
            let len_of_len = (tag - 0xf7) as usize;
            let (len, rest) = read_length(rest, len_of_len)?;
            if len <= 55 {
                return Err(RlpError::NonCanonicalLength);
            }
            if rest.len() < len {
                return Err(RlpError::LengthOverrun);
            }
            let (body, rest) = rest.split_at(len);
            Ok((Value::List(read_items(body, depth + 1)?), rest))
        }
    }
}

fn read_items(mut body: &[u8], depth: usize) -> Result<Vec<Value>, RlpError> {
    let mut items = Vec::new();
    while !body.is_empty() {
        let (item, rest) = read(body, depth)?;
        items.push(item);
        body = rest;
    }
    Ok(items)
}
