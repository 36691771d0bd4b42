//! # Memory-Mapped File Storage
//!
//! `MmapStorage` maps a database file into memory and hands out pages as byte
//! slices. It knows nothing about page contents; `FileStore` builds the
//! summary, inventory and directory structure on top of it.
//!
//! ## Safety Considerations
//!
//! A mapping becomes invalid when the file is remapped in `grow()`. Page
//! references are tied to borrows of the storage:
//!
//! ```text
//! page(&self) -> &[u8]                 // shared borrow
//! page_mut(&mut self) -> &mut [u8]     // exclusive borrow
//! grow(&mut self)                      // exclusive borrow
//! ```
//!
//! Since `grow()` requires `&mut self`, no page slice can be alive while the
//! mapping is replaced. The same rule gives the page-lock contract: a page
//! obtained with `page_mut` is exclusively writable until the borrow ends.
//!
//! ## File Format
//!
//! ```text
//! Offset 0:                Page 0
//! Offset page_size:        Page 1
//! Offset 2 * page_size:    Page 2
//! ...
//! ```
//!
//! The file size is always a multiple of the page size.

use std::fs::{File, OpenOptions};
use std::path::Path;

use eyre::{ensure, Result, WrapErr};
use memmap2::MmapMut;

use super::page::PageNum;

#[derive(Debug)]
pub struct MmapStorage {
    file: File,
    mmap: MmapMut,
    page_size: usize,
    page_count: u64,
}

impl MmapStorage {
    pub fn open<P: AsRef<Path>>(path: P, page_size: u32) -> Result<Self> {
        let path = path.as_ref();
        let page_size = page_size as usize;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .wrap_err_with(|| format!("failed to open database file '{}'", path.display()))?;

        let file_size = file
            .metadata()
            .wrap_err_with(|| format!("failed to get metadata for '{}'", path.display()))?
            .len();

        ensure!(
            file_size > 0,
            "database file '{}' is empty",
            path.display()
        );
        ensure!(
            file_size % page_size as u64 == 0,
            "database file '{}' size {} is not a multiple of page size {}",
            path.display(),
            file_size,
            page_size
        );

        // SAFETY: map_mut is unsafe because the file could be changed by another
        // process while mapped. The file is opened read+write by this process
        // only, database files are not edited externally, and every access goes
        // through page()/page_mut(), which bounds-check against page_count.
        let mmap = unsafe {
            MmapMut::map_mut(&file)
                .wrap_err_with(|| format!("failed to memory-map '{}'", path.display()))?
        };

        Ok(Self {
            file,
            mmap,
            page_size,
            page_count: file_size / page_size as u64,
        })
    }

    pub fn create<P: AsRef<Path>>(path: P, page_size: u32, initial_page_count: u64) -> Result<Self> {
        let path = path.as_ref();
        let page_size = page_size as usize;

        ensure!(
            initial_page_count > 0,
            "a new file needs at least one page"
        );

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .wrap_err_with(|| format!("failed to create database file '{}'", path.display()))?;

        let file_size = initial_page_count * page_size as u64;
        file.set_len(file_size)
            .wrap_err_with(|| format!("failed to set file size to {} bytes", file_size))?;

        // SAFETY: the file was just created and truncated by this process, its
        // size is a whole number of pages, and all access is bounds-checked by
        // page()/page_mut().
        let mmap = unsafe {
            MmapMut::map_mut(&file)
                .wrap_err_with(|| format!("failed to memory-map '{}'", path.display()))?
        };

        Ok(Self {
            file,
            mmap,
            page_size,
            page_count: initial_page_count,
        })
    }

    fn offset(&self, page_no: PageNum) -> Result<usize> {
        ensure!(
            page_no < self.page_count,
            "page {} is past the end of the file ({} pages)",
            page_no,
            self.page_count
        );
        Ok(page_no as usize * self.page_size)
    }

    pub fn page(&self, page_no: PageNum) -> Result<&[u8]> {
        let offset = self.offset(page_no)?;
        Ok(&self.mmap[offset..offset + self.page_size])
    }

    pub fn page_mut(&mut self, page_no: PageNum) -> Result<&mut [u8]> {
        let offset = self.offset(page_no)?;
        Ok(&mut self.mmap[offset..offset + self.page_size])
    }

    pub fn grow(&mut self, new_page_count: u64) -> Result<()> {
        if new_page_count <= self.page_count {
            return Ok(());
        }

        self.mmap
            .flush()
            .wrap_err("flush before growing the mapping failed")?;

        let new_size = new_page_count * self.page_size as u64;
        self.file
            .set_len(new_size)
            .wrap_err_with(|| format!("failed to extend file to {} bytes", new_size))?;

        // SAFETY: grow() takes &mut self, so no page slices borrowed from the
        // old mapping are alive. The old mapping was flushed above and the file
        // was extended before remapping.
        self.mmap =
            unsafe { MmapMut::map_mut(&self.file).wrap_err("remapping grown file failed")? };
        self.page_count = new_page_count;
        Ok(())
    }

    pub fn sync(&self) -> Result<()> {
        self.mmap.flush().wrap_err("failed to flush mapped pages")
    }

    pub fn page_count(&self) -> u64 {
        self.page_count
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }
}
