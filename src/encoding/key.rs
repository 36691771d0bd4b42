//! # Order-Preserving Key Encoding
//!
//! This module encodes `(table_id, index_id, values..., key_type)` into byte
//! strings whose `memcmp` order equals the application-level order of keys.
//! Every structure built on top of keys (range scans, version lookup, the
//! proposal/write namespaces) relies on that single invariant.
//!
//! ## Layout
//!
//! ```text
//! +-------------+-------------+-----------------------+-----------------+
//! | table_id    | index_id    | value*                | key type suffix |
//! | u32 BE      | u32 BE      | tag + payload each    | (absent = bare) |
//! +-------------+-------------+-----------------------+-----------------+
//! ```
//!
//! Ids are big-endian so that byte order equals integer order.
//!
//! ## Value Tags
//!
//! ```text
//! 0x80  NULL
//! 0x81  BOOL       + 1 byte (0 / 1)
//! 0x82  TEXT       + escaped bytes + 0x00
//! 0x83  BLOB       + escaped bytes + 0x00
//! 0x84  FLOAT NaN
//! 0x85  FLOAT < 0  + 8 bytes BE of !bits
//! 0x86  FLOAT ±0
//! 0x87  FLOAT > 0  + 8 bytes BE of bits
//! 0x88  INT        + 8 bytes BE of (value as u64) ^ (1 << 63)
//! ```
//!
//! The sign bit of an INT is flipped before writing it big-endian; without the
//! bias, negative integers would sort after positive ones.
//!
//! Negative floats store the complement of their bits: a larger magnitude has
//! a larger raw pattern and therefore a smaller complement.
//!
//! TEXT and BLOB bytes `0x00` and `0x01` are written as `01 00` and `01 01`,
//! and the value ends with a bare `00`. The terminator sorts below any
//! continuation, so a string sorts before every string it is a prefix of.
//!
//! ## Key Type Suffixes
//!
//! ```text
//! (none)  Bare
//! 0x01    Proposal
//! 0x02    ProposedWrite   + 4 bytes BE of !stmt_id
//! 0x03    Version         + 8 bytes BE of !version
//! 0x04    Transaction     + 4 bytes BE of tx_id
//! 0xFF    next-key bound  (only produced by `next_key`)
//! ```
//!
//! Suffix markers are below every value tag: all variants of a tuple sort
//! before any longer tuple that extends it. For one tuple the order is
//!
//! ```text
//! Bare < Proposal < ProposedWrite (high stmt first) < Version (newest first)
//!      < Transaction (low tx first) < next_key(bare)
//! ```
//!
//! Newest-first versions let "latest version <= snapshot" be found by seeking
//! to `Version(snapshot)` and scanning forward.
//!
//! ## Usage Example
//!
//! ```rust
//! use maho::encoding::key::{format_key, make_key, make_version_key, next_key};
//! use maho::types::Value;
//!
//! let bare = make_key(4096, 1, &[Value::Int(7)]);
//! let newer = make_version_key(4096, 1, &[Value::Int(7)], 20);
//! let older = make_version_key(4096, 1, &[Value::Int(7)], 10);
//!
//! assert!(bare < newer && newer < older && older < next_key(&bare));
//! assert_eq!(format_key(&newer), "/4096/1/7@v(20)");
//! ```

use std::cmp::Ordering;
use std::fmt::Write as _;

use eyre::{bail, ensure, Result, WrapErr};

use crate::types::Value;

pub const KEY_PREFIX_SIZE: usize = 8;

pub mod type_prefix {
    pub const NULL: u8 = 0x80;
    pub const BOOL: u8 = 0x81;
    pub const TEXT: u8 = 0x82;
    pub const BLOB: u8 = 0x83;
    pub const NAN: u8 = 0x84;
    pub const NEG_FLOAT: u8 = 0x85;
    pub const ZERO: u8 = 0x86;
    pub const POS_FLOAT: u8 = 0x87;
    pub const INT: u8 = 0x88;
}

pub mod suffix {
    pub const PROPOSAL: u8 = 0x01;
    pub const PROPOSED_WRITE: u8 = 0x02;
    pub const VERSION: u8 = 0x03;
    pub const TRANSACTION: u8 = 0x04;
    pub const NEXT_KEY: u8 = 0xFF;
}

const ESCAPE: u8 = 0x01;
const TERMINATOR: u8 = 0x00;
const INT_SIGN_BIAS: u64 = 1 << 63;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    Bare,
    Proposal,
    ProposedWrite(u32),
    Version(u64),
    Transaction(u32),
}

impl KeyType {
    fn rank(&self) -> u8 {
        match self {
            KeyType::Bare => 0,
            KeyType::Proposal => 1,
            KeyType::ProposedWrite(_) => 2,
            KeyType::Version(_) => 3,
            KeyType::Transaction(_) => 4,
        }
    }

    /// Order of suffixed variants sharing one value tuple.
    pub fn compare(&self, other: &KeyType) -> Ordering {
        match (self, other) {
            (KeyType::ProposedWrite(a), KeyType::ProposedWrite(b)) => b.cmp(a),
            (KeyType::Version(a), KeyType::Version(b)) => b.cmp(a),
            (KeyType::Transaction(a), KeyType::Transaction(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// A decoded key.
#[derive(Debug, Clone, PartialEq)]
pub struct Key {
    pub table_id: u32,
    pub index_id: u32,
    pub values: Vec<Value>,
    pub key_type: KeyType,
}

impl Key {
    pub fn new(table_id: u32, index_id: u32, values: Vec<Value>, key_type: KeyType) -> Self {
        Self {
            table_id,
            index_id,
            values,
            key_type,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        make_key_with_type(self.table_id, self.index_id, &self.values, self.key_type)
    }

    /// Application-level order; `encode` preserves it byte-wise.
    pub fn compare(&self, other: &Key) -> Ordering {
        self.table_id
            .cmp(&other.table_id)
            .then(self.index_id.cmp(&other.index_id))
            .then_with(|| {
                for (a, b) in self.values.iter().zip(other.values.iter()) {
                    let ord = compare_values(a, b);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                self.values.len().cmp(&other.values.len())
            })
            .then_with(|| self.key_type.compare(&other.key_type))
    }
}

fn value_rank(value: &Value) -> u8 {
    match value {
        Value::Null => type_prefix::NULL,
        Value::Bool(_) => type_prefix::BOOL,
        Value::Text(_) => type_prefix::TEXT,
        Value::Blob(_) => type_prefix::BLOB,
        Value::Float(f) if f.is_nan() => type_prefix::NAN,
        Value::Float(f) if *f == 0.0 => type_prefix::ZERO,
        Value::Float(f) if *f < 0.0 => type_prefix::NEG_FLOAT,
        Value::Float(_) => type_prefix::POS_FLOAT,
        Value::Int(_) => type_prefix::INT,
    }
}

/// Key ordering of single values. All NaNs are equal, as are `0.0` and `-0.0`.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    let rank = value_rank(a).cmp(&value_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Text(x), Value::Text(y)) => x.as_bytes().cmp(y.as_bytes()),
        (Value::Blob(x), Value::Blob(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

pub fn encode_null(buf: &mut Vec<u8>) {
    buf.push(type_prefix::NULL);
}

pub fn encode_bool(value: bool, buf: &mut Vec<u8>) {
    buf.push(type_prefix::BOOL);
    buf.push(value as u8);
}

pub fn encode_int(value: i64, buf: &mut Vec<u8>) {
    buf.push(type_prefix::INT);
    buf.extend_from_slice(&((value as u64) ^ INT_SIGN_BIAS).to_be_bytes());
}

pub fn encode_float(value: f64, buf: &mut Vec<u8>) {
    if value.is_nan() {
        buf.push(type_prefix::NAN);
    } else if value == 0.0 {
        buf.push(type_prefix::ZERO);
    } else if value < 0.0 {
        buf.push(type_prefix::NEG_FLOAT);
        buf.extend_from_slice(&(!value.to_bits()).to_be_bytes());
    } else {
        buf.push(type_prefix::POS_FLOAT);
        buf.extend_from_slice(&value.to_bits().to_be_bytes());
    }
}

pub fn encode_text(value: &str, buf: &mut Vec<u8>) {
    buf.push(type_prefix::TEXT);
    encode_escaped(value.as_bytes(), buf);
}

pub fn encode_blob(value: &[u8], buf: &mut Vec<u8>) {
    buf.push(type_prefix::BLOB);
    encode_escaped(value, buf);
}

fn encode_escaped(bytes: &[u8], buf: &mut Vec<u8>) {
    for &b in bytes {
        if b == TERMINATOR || b == ESCAPE {
            buf.push(ESCAPE);
        }
        buf.push(b);
    }
    buf.push(TERMINATOR);
}

pub fn encode_value(value: &Value, buf: &mut Vec<u8>) {
    match value {
        Value::Null => encode_null(buf),
        Value::Bool(b) => encode_bool(*b, buf),
        Value::Int(i) => encode_int(*i, buf),
        Value::Float(f) => encode_float(*f, buf),
        Value::Text(s) => encode_text(s, buf),
        Value::Blob(b) => encode_blob(b, buf),
    }
}

pub fn encode_key_type(key_type: KeyType, buf: &mut Vec<u8>) {
    match key_type {
        KeyType::Bare => {}
        KeyType::Proposal => buf.push(suffix::PROPOSAL),
        KeyType::ProposedWrite(stmt_id) => {
            buf.push(suffix::PROPOSED_WRITE);
            buf.extend_from_slice(&(!stmt_id).to_be_bytes());
        }
        KeyType::Version(version) => {
            buf.push(suffix::VERSION);
            buf.extend_from_slice(&(!version).to_be_bytes());
        }
        KeyType::Transaction(tx_id) => {
            buf.push(suffix::TRANSACTION);
            buf.extend_from_slice(&tx_id.to_be_bytes());
        }
    }
}

pub fn key_prefix(table_id: u32, index_id: u32) -> [u8; KEY_PREFIX_SIZE] {
    let mut prefix = [0u8; KEY_PREFIX_SIZE];
    prefix[..4].copy_from_slice(&table_id.to_be_bytes());
    prefix[4..].copy_from_slice(&index_id.to_be_bytes());
    prefix
}

pub fn make_key_with_type(
    table_id: u32,
    index_id: u32,
    values: &[Value],
    key_type: KeyType,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(KEY_PREFIX_SIZE + values.len() * 9 + 9);
    buf.extend_from_slice(&key_prefix(table_id, index_id));
    for value in values {
        encode_value(value, &mut buf);
    }
    encode_key_type(key_type, &mut buf);
    buf
}

pub fn make_key(table_id: u32, index_id: u32, values: &[Value]) -> Vec<u8> {
    make_key_with_type(table_id, index_id, values, KeyType::Bare)
}

pub fn make_proposal_key(table_id: u32, index_id: u32, values: &[Value]) -> Vec<u8> {
    make_key_with_type(table_id, index_id, values, KeyType::Proposal)
}

pub fn make_proposed_write_key(
    table_id: u32,
    index_id: u32,
    values: &[Value],
    stmt_id: u32,
) -> Vec<u8> {
    make_key_with_type(table_id, index_id, values, KeyType::ProposedWrite(stmt_id))
}

pub fn make_version_key(table_id: u32, index_id: u32, values: &[Value], version: u64) -> Vec<u8> {
    make_key_with_type(table_id, index_id, values, KeyType::Version(version))
}

pub fn make_transaction_key(table_id: u32, index_id: u32, values: &[Value], tx_id: u32) -> Vec<u8> {
    make_key_with_type(table_id, index_id, values, KeyType::Transaction(tx_id))
}

/// Smallest byte string greater than `key` and every key that extends it.
/// Use as the exclusive upper bound of `[key, next_key(key))`.
pub fn next_key(key: &[u8]) -> Vec<u8> {
    let mut next = Vec::with_capacity(key.len() + 1);
    next.extend_from_slice(key);
    next.push(suffix::NEXT_KEY);
    next
}

/// Half-open byte range covering every key of one table index.
pub fn index_range(table_id: u32, index_id: u32) -> (Vec<u8>, Vec<u8>) {
    let start = key_prefix(table_id, index_id).to_vec();
    let end = next_key(&start);
    (start, end)
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        ensure!(
            self.buf.len() - self.pos >= n,
            "truncated {} at offset {}: need {} bytes, have {}",
            what,
            self.pos,
            n,
            self.buf.len() - self.pos
        );
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn take_u32(&mut self, what: &str) -> Result<u32> {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(self.take(4, what)?);
        Ok(u32::from_be_bytes(bytes))
    }

    fn take_u64(&mut self, what: &str) -> Result<u64> {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(self.take(8, what)?);
        Ok(u64::from_be_bytes(bytes))
    }

    fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    fn take_escaped(&mut self, mut out: Option<&mut Vec<u8>>) -> Result<()> {
        loop {
            let b = self.take(1, "escaped string")?[0];
            match b {
                TERMINATOR => return Ok(()),
                ESCAPE => {
                    let escaped = self.take(1, "escaped byte")?[0];
                    ensure!(
                        escaped == TERMINATOR || escaped == ESCAPE,
                        "invalid escape sequence 01 {:02x} at offset {}",
                        escaped,
                        self.pos - 1
                    );
                    if let Some(out) = out.as_deref_mut() {
                        out.push(escaped);
                    }
                }
                other => {
                    if let Some(out) = out.as_deref_mut() {
                        out.push(other);
                    }
                }
            }
        }
    }

    /// Decodes (or, with `values == None`, skips) one value. Returns false
    /// when the next byte is not a value tag.
    fn value(&mut self, values: Option<&mut Vec<Value>>) -> Result<bool> {
        let Some(tag) = self.peek() else {
            return Ok(false);
        };
        let decoded = match tag {
            type_prefix::NULL => {
                self.pos += 1;
                Value::Null
            }
            type_prefix::BOOL => {
                self.pos += 1;
                match self.take(1, "BOOL")?[0] {
                    0 => Value::Bool(false),
                    1 => Value::Bool(true),
                    other => bail!("invalid BOOL byte {:#04x} in key", other),
                }
            }
            type_prefix::TEXT => {
                self.pos += 1;
                if values.is_none() {
                    self.take_escaped(None)?;
                    return Ok(true);
                }
                let mut bytes = Vec::new();
                self.take_escaped(Some(&mut bytes))?;
                let text = String::from_utf8(bytes).wrap_err("invalid UTF-8 TEXT in key")?;
                Value::Text(text)
            }
            type_prefix::BLOB => {
                self.pos += 1;
                if values.is_none() {
                    self.take_escaped(None)?;
                    return Ok(true);
                }
                let mut bytes = Vec::new();
                self.take_escaped(Some(&mut bytes))?;
                Value::Blob(bytes)
            }
            type_prefix::NAN => {
                self.pos += 1;
                Value::Float(f64::NAN)
            }
            type_prefix::ZERO => {
                self.pos += 1;
                Value::Float(0.0)
            }
            type_prefix::NEG_FLOAT => {
                self.pos += 1;
                let bits = !self.take_u64("FLOAT")?;
                let f = f64::from_bits(bits);
                ensure!(
                    f < 0.0,
                    "negative FLOAT tag with non-negative payload {:#018x}",
                    bits
                );
                Value::Float(f)
            }
            type_prefix::POS_FLOAT => {
                self.pos += 1;
                let bits = self.take_u64("FLOAT")?;
                let f = f64::from_bits(bits);
                ensure!(
                    f > 0.0,
                    "positive FLOAT tag with non-positive payload {:#018x}",
                    bits
                );
                Value::Float(f)
            }
            type_prefix::INT => {
                self.pos += 1;
                Value::Int((self.take_u64("INT")? ^ INT_SIGN_BIAS) as i64)
            }
            _ => return Ok(false),
        };
        if let Some(values) = values {
            values.push(decoded);
        }
        Ok(true)
    }

    fn key_type(&mut self) -> Result<KeyType> {
        let Some(tag) = self.peek() else {
            return Ok(KeyType::Bare);
        };
        let key_type = match tag {
            suffix::PROPOSAL => {
                self.pos += 1;
                KeyType::Proposal
            }
            suffix::PROPOSED_WRITE => {
                self.pos += 1;
                KeyType::ProposedWrite(!self.take_u32("proposed-write suffix")?)
            }
            suffix::VERSION => {
                self.pos += 1;
                KeyType::Version(!self.take_u64("version suffix")?)
            }
            suffix::TRANSACTION => {
                self.pos += 1;
                KeyType::Transaction(self.take_u32("transaction suffix")?)
            }
            suffix::NEXT_KEY => KeyType::Bare,
            other => bail!("unknown key tag {:#04x} at offset {}", other, self.pos),
        };
        Ok(key_type)
    }

    /// Consumes an optional trailing next-key marker and requires end of input.
    fn finish(&mut self) -> Result<bool> {
        let next = self.peek() == Some(suffix::NEXT_KEY);
        if next {
            self.pos += 1;
        }
        ensure!(
            self.pos == self.buf.len(),
            "{} trailing bytes after key suffix",
            self.buf.len() - self.pos
        );
        Ok(next)
    }
}

fn decode_key(buf: &[u8]) -> Result<(Key, bool)> {
    ensure!(
        buf.len() >= KEY_PREFIX_SIZE,
        "key too short: {} < {}",
        buf.len(),
        KEY_PREFIX_SIZE
    );
    let mut cursor = Cursor { buf, pos: 0 };
    let table_id = cursor.take_u32("table id")?;
    let index_id = cursor.take_u32("index id")?;

    let mut values = Vec::new();
    while cursor.value(Some(&mut values))? {}

    let key_type = cursor.key_type()?;
    let next = cursor.finish()?;
    Ok((Key::new(table_id, index_id, values, key_type), next))
}

pub fn parse_key(buf: &[u8]) -> Result<Key> {
    let (key, next) = decode_key(buf)?;
    ensure!(!next, "next-key bound is not a key");
    Ok(key)
}

/// Reads the key type without materializing any values.
pub fn get_key_type(buf: &[u8]) -> Result<KeyType> {
    ensure!(
        buf.len() >= KEY_PREFIX_SIZE,
        "key too short: {} < {}",
        buf.len(),
        KEY_PREFIX_SIZE
    );
    let mut cursor = Cursor {
        buf,
        pos: KEY_PREFIX_SIZE,
    };
    while cursor.value(None)? {}
    let key_type = cursor.key_type()?;
    ensure!(!cursor.finish()?, "next-key bound is not a key");
    Ok(key_type)
}

/// Human-readable `/<table>/<index>/<value>...@<suffix>` rendering for
/// diagnostics. Never fails; malformed input is rendered as such.
pub fn format_key(buf: &[u8]) -> String {
    let (key, next) = match decode_key(buf) {
        Ok(decoded) => decoded,
        Err(e) => return format!("<invalid key: {}>", e),
    };

    let mut out = String::new();
    let _ = write!(out, "/{}/{}", key.table_id, key.index_id);
    for value in &key.values {
        let _ = write!(out, "/{}", value);
    }
    let _ = match key.key_type {
        KeyType::Bare => Ok(()),
        KeyType::Proposal => write!(out, "@proposal"),
        KeyType::ProposedWrite(stmt_id) => write!(out, "@stmt({})", stmt_id),
        KeyType::Version(version) => write!(out, "@v({})", version),
        KeyType::Transaction(tx_id) => write!(out, "@txn({})", tx_id),
    };
    if next {
        out.push_str("@next");
    }
    out
}
