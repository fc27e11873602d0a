use crate::Value;

/// Writes a length prefix per the RLP rules: a single byte `offset + len`
/// for `len <= 55`, otherwise `offset + 55 + sizeof(len_be)` followed by the
/// big-endian length.
fn write_length(out: &mut Vec<u8>, len: usize, offset: u8) {
    if len <= 55 {
        out.push(offset + len as u8);
        return;
    }
    let len_be = len.to_be_bytes();
    let first_nonzero = len_be.iter().position(|&b| b != 0).unwrap_or(len_be.len() - 1);
    let trimmed = &len_be[first_nonzero..];
    out.push(offset + 55 + trimmed.len() as u8);
    out.extend_from_slice(trimmed);
}

pub fn write(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Bytes(data) => write_buffer(data, out),
        Value::List(items) => write_list(items, out),
    }
}

fn write_buffer(data: &[u8], out: &mut Vec<u8>) {
    if data.len() == 1 && data[0] < 0x80 {
        out.push(data[0]);
        return;
    }
    write_length(out, data.len(), 0x80);
    out.extend_from_slice(data);
}

fn write_list(items: &[Value], out: &mut Vec<u8>) {
    let mut body = Vec::new();
    for item in items {
        write(item, &mut body);
    }
    write_length(out, body.len(), 0xc0);
    out.extend_from_slice(&body);
}
