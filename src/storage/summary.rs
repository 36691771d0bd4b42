//! # Summary Page
//!
//! The first bytes of page 0 identify the file and record its global state.
//!
//! ## Layout (64 bytes, little-endian)
//!
//! ```text
//! Offset  Size  Field        Description
//! ------  ----  -----------  ----------------------------------------
//! 0       16    signature    "MahoDatabaseFile"
//! 16      2     version      file format version (1)
//! 18      4     page_size    bytes per page
//! 22      8     directory    first directory page, 0 when none
//! 30      4     start_count  incremented on every open
//! 34      30    reserved     zero
//! ```
//!
//! The start count lets state left behind by an earlier, aborted run be told
//! apart from state written by the current one.
//!
//! ## Validation
//!
//! A file with the wrong signature, an unknown version or a page size that is
//! below 1024, above 65536 or not a multiple of 512 cannot be opened. These
//! are [`FormatError`]s and are never retried.

use eyre::{bail, ensure, Result};
use thiserror::Error;
use zerocopy::little_endian::{U16, U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::{
    FILE_SIGNATURE, FILE_VERSION, MAX_PAGE_SIZE, MIN_PAGE_SIZE, PAGE_SIZE_MULTIPLE,
    SUMMARY_HEADER_SIZE,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("file is too short for a summary page ({len} bytes)")]
    Truncated { len: usize },

    #[error("bad file signature {found:02x?}")]
    BadSignature { found: [u8; 16] },

    #[error("unsupported file format version {found} (expected {})", FILE_VERSION)]
    UnsupportedVersion { found: u16 },

    #[error(
        "invalid page size {size}: must be a multiple of {} between {} and {}",
        PAGE_SIZE_MULTIPLE,
        MIN_PAGE_SIZE,
        MAX_PAGE_SIZE
    )]
    BadPageSize { size: u32 },
}

pub fn validate_page_size(size: u32) -> std::result::Result<(), FormatError> {
    if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&size) || size % PAGE_SIZE_MULTIPLE != 0 {
        return Err(FormatError::BadPageSize { size });
    }
    Ok(())
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct SummaryPage {
    signature: [u8; 16],
    version: U16,
    page_size: U32,
    directory: U64,
    start_count: U32,
    reserved: [u8; 30],
}

const _: () = assert!(std::mem::size_of::<SummaryPage>() == SUMMARY_HEADER_SIZE);

impl SummaryPage {
    pub fn new(page_size: u32) -> Self {
        Self {
            signature: *FILE_SIGNATURE,
            version: U16::new(FILE_VERSION),
            page_size: U32::new(page_size),
            directory: U64::new(0),
            start_count: U32::new(1),
            reserved: [0; 30],
        }
    }

    /// Reads and validates the summary at the start of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        if bytes.len() < SUMMARY_HEADER_SIZE {
            bail!(FormatError::Truncated { len: bytes.len() });
        }

        let summary = Self::ref_from_bytes(&bytes[..SUMMARY_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to parse SummaryPage: {:?}", e))?;
        summary.validate()?;
        Ok(summary)
    }

    pub fn from_bytes_mut(bytes: &mut [u8]) -> Result<&mut Self> {
        ensure!(
            bytes.len() >= SUMMARY_HEADER_SIZE,
            "buffer too small for SummaryPage: {} < {}",
            bytes.len(),
            SUMMARY_HEADER_SIZE
        );

        let summary = Self::mut_from_bytes(&mut bytes[..SUMMARY_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to parse SummaryPage: {:?}", e))?;
        summary.validate()?;
        Ok(summary)
    }

    pub fn validate(&self) -> std::result::Result<(), FormatError> {
        if &self.signature != FILE_SIGNATURE {
            return Err(FormatError::BadSignature {
                found: self.signature,
            });
        }
        if self.version.get() != FILE_VERSION {
            return Err(FormatError::UnsupportedVersion {
                found: self.version.get(),
            });
        }
        validate_page_size(self.page_size.get())
    }

    pub fn signature(&self) -> &[u8; 16] {
        &self.signature
    }

    zerocopy_accessors! {
        version: u16,
        page_size: u32,
        directory: u64,
        start_count: u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_with(summary: SummaryPage) -> Vec<u8> {
        let mut page = vec![0u8; MIN_PAGE_SIZE as usize];
        page[..SUMMARY_HEADER_SIZE].copy_from_slice(summary.as_bytes());
        page
    }

    fn format_error(report: eyre::Report) -> FormatError {
        report.downcast::<FormatError>().unwrap()
    }

    #[test]
    fn new_summary_has_fixed_layout() {
        let summary = SummaryPage::new(4096);
        let bytes = summary.as_bytes();
        assert_eq!(&bytes[0..16], b"MahoDatabaseFile");
        assert_eq!(&bytes[16..18], &[1, 0]);
        assert_eq!(&bytes[18..22], &4096u32.to_le_bytes());
        assert_eq!(&bytes[22..30], &[0; 8]);
        assert_eq!(&bytes[30..34], &[1, 0, 0, 0]);
    }

    #[test]
    fn accessors_round_trip_through_bytes() {
        let mut page = page_with(SummaryPage::new(8192));
        {
            let summary = SummaryPage::from_bytes_mut(&mut page).unwrap();
            summary.set_directory(42);
            summary.set_start_count(7);
        }
        let summary = SummaryPage::from_bytes(&page).unwrap();
        assert_eq!(summary.page_size(), 8192);
        assert_eq!(summary.directory(), 42);
        assert_eq!(summary.start_count(), 7);
        assert_eq!(summary.version(), FILE_VERSION);
    }

    #[test]
    fn bad_signature_is_rejected() {
        let mut page = page_with(SummaryPage::new(4096));
        page[0] = b'X';
        let err = format_error(SummaryPage::from_bytes(&page).unwrap_err());
        assert!(matches!(err, FormatError::BadSignature { found } if found[0] == b'X'));
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let mut summary = SummaryPage::new(4096);
        summary.set_version(2);
        let err = format_error(SummaryPage::from_bytes(&page_with(summary)).unwrap_err());
        assert_eq!(err, FormatError::UnsupportedVersion { found: 2 });
    }

    #[test]
    fn page_size_rules() {
        assert!(validate_page_size(1024).is_ok());
        assert!(validate_page_size(1536).is_ok());
        assert!(validate_page_size(65536).is_ok());
        assert_eq!(
            validate_page_size(512),
            Err(FormatError::BadPageSize { size: 512 })
        );
        assert!(validate_page_size(1000).is_err());
        assert!(validate_page_size(1025).is_err());
        assert!(validate_page_size(65536 + 512).is_err());

        let mut summary = SummaryPage::new(4096);
        summary.set_page_size(3000);
        let err = format_error(SummaryPage::from_bytes(&page_with(summary)).unwrap_err());
        assert_eq!(err, FormatError::BadPageSize { size: 3000 });
    }

    #[test]
    fn short_buffer_is_truncated() {
        let err = format_error(SummaryPage::from_bytes(&[0u8; 10]).unwrap_err());
        assert_eq!(err, FormatError::Truncated { len: 10 });
    }
}
