//! # Row Value Codec
//!
//! Full rows are stored as a compact, sparse, tagged encoding. NULL columns
//! cost nothing; every other column costs one tag byte plus its payload.
//!
//! ## Layout
//!
//! ```text
//! +-----------------+-----------------------------------------------+
//! | arity (varint)  | column* (ascending column index, NULLs absent)|
//! +-----------------+-----------------------------------------------+
//!
//! column := tag [index varint if tag >> 4 == 0xF] payload
//!
//! tag     := (column_index << 4) | value_type      column_index 0..=14
//!          | 0xF0 | value_type                     column_index >= 15
//! ```
//!
//! ## Value Types
//!
//! | Type  | Code | Payload                                   |
//! |-------|------|-------------------------------------------|
//! | BOOL  | 1    | 1 byte, 0 or 1                            |
//! | INT   | 2    | zig-zag varint                            |
//! | FLOAT | 3    | 8 bytes, big-endian IEEE-754 bit pattern  |
//! | TEXT  | 4    | varint length + UTF-8 bytes               |
//! | BLOB  | 5    | varint length + raw bytes                 |
//!
//! Rows wider than [`MAX_ROW_ARITY`] columns are refused on both sides.
//!
//! ## Decoding
//!
//! The decoder pre-sizes its output to the declared arity and fills every
//! slot that has no column entry with NULL. It never panics on malformed
//! input; truncation, unknown type codes, out-of-range or out-of-order column
//! indexes and invalid UTF-8 are all reported as errors.

use eyre::{bail, ensure, Result, WrapErr};

use super::varint::{decode_varint, decode_zigzag, put_varint, put_zigzag};
use crate::config::{ROW_EXTENDED_COLUMN_NIBBLE, ROW_INLINE_COLUMN_LIMIT};
use crate::types::Value;

/// Widest row either side of the codec accepts.
pub const MAX_ROW_ARITY: usize = 1 << 15;

pub mod row_tag {
    pub const BOOL: u8 = 1;
    pub const INT: u8 = 2;
    pub const FLOAT: u8 = 3;
    pub const TEXT: u8 = 4;
    pub const BLOB: u8 = 5;
}

pub fn encode_row(values: &[Value]) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(1 + values.len() * 4);
    encode_row_to(values, &mut buf)?;
    Ok(buf)
}

pub fn encode_row_to(values: &[Value], buf: &mut Vec<u8>) -> Result<()> {
    ensure!(
        values.len() <= MAX_ROW_ARITY,
        "row arity {} exceeds limit {}",
        values.len(),
        MAX_ROW_ARITY
    );
    put_varint(buf, values.len() as u64);

    for (idx, value) in values.iter().enumerate() {
        let value_type = match value {
            Value::Null => continue,
            Value::Bool(_) => row_tag::BOOL,
            Value::Int(_) => row_tag::INT,
            Value::Float(_) => row_tag::FLOAT,
            Value::Text(_) => row_tag::TEXT,
            Value::Blob(_) => row_tag::BLOB,
        };

        if idx < ROW_INLINE_COLUMN_LIMIT {
            buf.push(((idx as u8) << 4) | value_type);
        } else {
            buf.push((ROW_EXTENDED_COLUMN_NIBBLE << 4) | value_type);
            put_varint(buf, idx as u64);
        }

        match value {
            Value::Null => {}
            Value::Bool(b) => buf.push(*b as u8),
            Value::Int(i) => put_zigzag(buf, *i),
            Value::Float(f) => buf.extend_from_slice(&f.to_bits().to_be_bytes()),
            Value::Text(s) => {
                put_varint(buf, s.len() as u64);
                buf.extend_from_slice(s.as_bytes());
            }
            Value::Blob(b) => {
                put_varint(buf, b.len() as u64);
                buf.extend_from_slice(b);
            }
        }
    }
    Ok(())
}

pub fn decode_row(buf: &[u8]) -> Result<Vec<Value>> {
    let (arity, mut pos) = decode_varint(buf).wrap_err("failed to decode row arity")?;
    ensure!(
        arity as usize <= MAX_ROW_ARITY,
        "row arity {} exceeds limit {}",
        arity,
        MAX_ROW_ARITY
    );
    let arity = arity as usize;

    let mut values = vec![Value::Null; arity];
    let mut next_min_idx = 0usize;

    while pos < buf.len() {
        let tag = buf[pos];
        pos += 1;

        let idx = if tag >> 4 == ROW_EXTENDED_COLUMN_NIBBLE {
            let (idx, n) = decode_varint(&buf[pos..])
                .wrap_err_with(|| format!("failed to decode column index at offset {}", pos))?;
            pos += n;
            usize::try_from(idx).unwrap_or(usize::MAX)
        } else {
            (tag >> 4) as usize
        };

        ensure!(
            idx < arity,
            "column index {} out of range for arity {}",
            idx,
            arity
        );
        ensure!(
            idx >= next_min_idx,
            "column index {} out of order (expected >= {})",
            idx,
            next_min_idx
        );
        next_min_idx = idx + 1;

        let rest = &buf[pos..];
        let (value, n) = match tag & 0x0F {
            row_tag::BOOL => {
                ensure!(!rest.is_empty(), "truncated BOOL in column {}", idx);
                match rest[0] {
                    0 => (Value::Bool(false), 1),
                    1 => (Value::Bool(true), 1),
                    other => bail!("invalid BOOL byte {:#04x} in column {}", other, idx),
                }
            }
            row_tag::INT => {
                let (i, n) = decode_zigzag(rest)
                    .wrap_err_with(|| format!("failed to decode INT in column {}", idx))?;
                (Value::Int(i), n)
            }
            row_tag::FLOAT => {
                ensure!(rest.len() >= 8, "truncated FLOAT in column {}", idx);
                let mut bits = [0u8; 8];
                bits.copy_from_slice(&rest[..8]);
                (Value::Float(f64::from_bits(u64::from_be_bytes(bits))), 8)
            }
            row_tag::TEXT => {
                let (bytes, n) = decode_length_prefixed(rest, idx)?;
                let text = std::str::from_utf8(bytes)
                    .wrap_err_with(|| format!("invalid UTF-8 TEXT in column {}", idx))?;
                (Value::Text(text.to_string()), n)
            }
            row_tag::BLOB => {
                let (bytes, n) = decode_length_prefixed(rest, idx)?;
                (Value::Blob(bytes.to_vec()), n)
            }
            other => bail!("unknown row tag {:#04x} (value type {})", tag, other),
        };

        values[idx] = value;
        pos += n;
    }

    Ok(values)
}

fn decode_length_prefixed(buf: &[u8], idx: usize) -> Result<(&[u8], usize)> {
    let (len, n) = decode_varint(buf)
        .wrap_err_with(|| format!("failed to decode length in column {}", idx))?;
    let available = (buf.len() - n) as u64;
    ensure!(
        len <= available,
        "truncated payload in column {}: need {} bytes, have {}",
        idx,
        len,
        available
    );
    let end = n + len as usize;
    Ok((&buf[n..end], end))
}
