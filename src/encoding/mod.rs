//! # Encoding Module
//!
//! This module provides the binary encodings of the storage core:
//!
//! - **Key encoding**: order-preserving, byte-comparable keys with key-type
//!   suffixes for proposals, proposed writes, versions and transactions
//! - **Row encoding**: sparse tagged encoding of full rows
//! - **Varint encoding**: protobuf-compatible base-128 varints and zig-zag

pub mod key;
pub mod row;
pub mod varint;

pub use key::{
    format_key, get_key_type, make_key, make_key_with_type, next_key, parse_key, type_prefix, Key,
    KeyType,
};
pub use row::{decode_row, encode_row};
pub use varint::{decode_varint, encode_varint, varint_len, zigzag_decode, zigzag_encode};
