//! # Variable-Length Integer Encoding
//!
//! Base-128 varints and zig-zag signed mapping, byte-for-byte compatible with
//! the protobuf wire format. The row codec uses them for the row arity, for
//! extended column indexes, for INT payloads and for TEXT/BLOB lengths.
//!
//! ## Encoding Format
//!
//! Each byte carries 7 bits of the value, least-significant group first. The
//! high bit of a byte is set when another byte follows:
//!
//! | Value                  | Bytes                          |
//! |------------------------|--------------------------------|
//! | 0                      | `00`                           |
//! | 127                    | `7F`                           |
//! | 128                    | `80 01`                        |
//! | 300                    | `AC 02`                        |
//! | u64::MAX               | `FF FF FF FF FF FF FF FF FF 01`|
//!
//! A u64 never needs more than 10 bytes; the tenth byte may only carry the
//! single remaining bit.
//!
//! ## Zig-Zag
//!
//! Signed values are mapped to unsigned so that small magnitudes stay short:
//!
//! ```text
//!  0 -> 0   -1 -> 1   1 -> 2   -2 -> 3   ...   i64::MIN -> u64::MAX
//! ```
//!
//! ## Usage Example
//!
//! ```rust
//! use maho::encoding::varint::{decode_varint, encode_varint, varint_len};
//!
//! let mut buf = [0u8; 10];
//! let written = encode_varint(300, &mut buf);
//! assert_eq!(&buf[..written], &[0xAC, 0x02]);
//! assert_eq!(varint_len(300), 2);
//!
//! let (value, read) = decode_varint(&buf).unwrap();
//! assert_eq!((value, read), (300, 2));
//! ```
//!
//! ## Error Handling
//!
//! `decode_varint` returns `eyre::Result` with descriptive error messages:
//! - Empty buffer: "empty buffer for varint decode"
//! - Missing continuation: "truncated varint"
//! - More than 64 bits: "varint overflows u64"

use eyre::{bail, ensure, Result};

use crate::config::MAX_VARINT_LEN;

pub fn varint_len(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

/// Writes `value` into `buf` and returns the number of bytes written.
/// `buf` must hold at least `varint_len(value)` bytes.
pub fn encode_varint(mut value: u64, buf: &mut [u8]) -> usize {
    let mut i = 0;
    while value >= 0x80 {
        buf[i] = (value as u8) | 0x80;
        value >>= 7;
        i += 1;
    }
    buf[i] = value as u8;
    i + 1
}

pub fn put_varint(buf: &mut Vec<u8>, value: u64) {
    let mut tmp = [0u8; MAX_VARINT_LEN];
    let n = encode_varint(value, &mut tmp);
    buf.extend_from_slice(&tmp[..n]);
}

pub fn decode_varint(buf: &[u8]) -> Result<(u64, usize)> {
    ensure!(!buf.is_empty(), "empty buffer for varint decode");

    let mut value = 0u64;
    for (i, &byte) in buf.iter().enumerate().take(MAX_VARINT_LEN) {
        if i == MAX_VARINT_LEN - 1 && byte > 1 {
            bail!("varint overflows u64");
        }
        value |= ((byte & 0x7F) as u64) << (7 * i);
        if byte < 0x80 {
            return Ok((value, i + 1));
        }
    }

    if buf.len() >= MAX_VARINT_LEN {
        bail!("varint overflows u64");
    }
    bail!("truncated varint")
}

#[inline]
pub fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

#[inline]
pub fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

pub fn put_zigzag(buf: &mut Vec<u8>, value: i64) {
    put_varint(buf, zigzag_encode(value));
}

pub fn decode_zigzag(buf: &[u8]) -> Result<(i64, usize)> {
    let (raw, n) = decode_varint(buf)?;
    Ok((zigzag_decode(raw), n))
}
