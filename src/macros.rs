//! # Internal Macros
//!
//! ## zerocopy_accessors!
//!
//! On-disk headers store integers as zerocopy little-endian wrappers so they
//! can be read straight out of a mapped page regardless of alignment. This
//! macro generates the native-typed getter and setter for each such field.
//!
//! ```ignore
//! use zerocopy::little_endian::{U16, U64};
//!
//! #[repr(C)]
//! struct DirectoryHeader {
//!     entry_count: U16,
//!     next: U64,
//! }
//!
//! impl DirectoryHeader {
//!     zerocopy_accessors! {
//!         entry_count: u16,
//!         next: u64,
//!     }
//! }
//!
//! // header.entry_count() -> u16
//! // header.set_next(7)
//! ```

/// Generates getter and setter methods for zerocopy little-endian fields.
#[macro_export]
macro_rules! zerocopy_accessors {
    ($($field:ident : $ty:ty),* $(,)?) => {
        ::paste::paste! {
            $(
                #[inline]
                pub fn $field(&self) -> $ty {
                    self.$field.get()
                }

                #[inline]
                pub fn [<set_ $field>](&mut self, val: $ty) {
                    self.$field.set(val);
                }
            )*
        }
    };
}
