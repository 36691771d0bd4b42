//! # Paged File Store
//!
//! `FileStore` is a single database file of fixed-size pages with three kinds
//! of bookkeeping pages:
//!
//! ```text
//! page 0        summary: signature, version, page size, directory, start count
//! page 1        inventory for the first section
//! page 1+S      inventory for the second section, and so on
//! any page      directory pages, linked through their `next` field
//! ```
//!
//! ## Opening
//!
//! ```text
//! FileStore::builder().path(p).open()
//!    │
//!    ├─ file missing, create enabled  → create: summary + inventory, 2 pages
//!    ├─ file missing, create disabled → error
//!    └─ file exists                   → read summary header
//!                                        validate (FormatError on failure)
//!                                        map file with the stored page size
//!                                        start_count += 1, sync
//! ```
//!
//! ## Allocation
//!
//! `allocate_page` takes the lowest clear inventory bit across all sections.
//! When every page is in use the file grows by a quarter of its size (at
//! least one page, at most 1024); inventory pages that fall inside the new
//! range are formatted as they appear. Allocated pages are zeroed.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use eyre::{bail, ensure, eyre, Result, WrapErr};
use zerocopy::IntoBytes;

use super::directory::{self, DirectoryHeader, TableLocator};
use super::inventory::{self, inventory_page_for, is_inventory_page, section_size};
use super::mmap::MmapStorage;
use super::page::PageNum;
use super::summary::{validate_page_size, SummaryPage};
use crate::config::{
    DEFAULT_PAGE_SIZE, FIRST_INVENTORY_PAGE_NUM, SUMMARY_HEADER_SIZE, SUMMARY_PAGE_NUM,
};

const MAX_GROW_PAGES: u64 = 1024;

pub struct FileStoreBuilder {
    path: Option<PathBuf>,
    page_size: u32,
    create: bool,
}

impl Default for FileStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FileStoreBuilder {
    pub fn new() -> Self {
        Self {
            path: None,
            page_size: DEFAULT_PAGE_SIZE,
            create: true,
        }
    }

    pub fn path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Page size of a newly created file. An existing file keeps the page
    /// size recorded in its summary.
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Whether a missing file is created. Enabled by default.
    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    pub fn open(self) -> Result<FileStore> {
        let path = self
            .path
            .ok_or_else(|| eyre!("no path configured for file store"))?;

        if path.exists() {
            let store = FileStore::open(&path)?;
            if store.page_size() != self.page_size {
                tracing::debug!(
                    requested = self.page_size,
                    actual = store.page_size(),
                    "existing file keeps its page size"
                );
            }
            return Ok(store);
        }

        ensure!(
            self.create,
            "database file '{}' does not exist",
            path.display()
        );
        FileStore::create(&path, self.page_size)
    }
}

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    storage: MmapStorage,
    page_size: u32,
    start_count: u32,
}

impl FileStore {
    pub fn builder() -> FileStoreBuilder {
        FileStoreBuilder::new()
    }

    pub fn create<P: AsRef<Path>>(path: P, page_size: u32) -> Result<Self> {
        let path = path.as_ref();
        validate_page_size(page_size)?;
        ensure!(
            !path.exists(),
            "database file '{}' already exists",
            path.display()
        );

        let mut storage = MmapStorage::create(path, page_size, 2)?;
        storage.page_mut(SUMMARY_PAGE_NUM)?[..SUMMARY_HEADER_SIZE]
            .copy_from_slice(SummaryPage::new(page_size).as_bytes());
        inventory::init(storage.page_mut(FIRST_INVENTORY_PAGE_NUM)?);
        storage.sync()?;

        tracing::info!(path = %path.display(), page_size, "created database file");
        Ok(Self {
            path: path.to_path_buf(),
            storage,
            page_size,
            start_count: 1,
        })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let mut header = Vec::with_capacity(SUMMARY_HEADER_SIZE);
        File::open(path)
            .wrap_err_with(|| format!("failed to open database file '{}'", path.display()))?
            .take(SUMMARY_HEADER_SIZE as u64)
            .read_to_end(&mut header)
            .wrap_err_with(|| format!("failed to read summary of '{}'", path.display()))?;
        let page_size = SummaryPage::from_bytes(&header)
            .wrap_err_with(|| format!("invalid database file '{}'", path.display()))?
            .page_size();

        let mut storage = MmapStorage::open(path, page_size)?;
        let summary = SummaryPage::from_bytes_mut(storage.page_mut(SUMMARY_PAGE_NUM)?)?;
        let start_count = summary.start_count().wrapping_add(1);
        summary.set_start_count(start_count);
        storage.sync()?;

        tracing::info!(
            path = %path.display(),
            page_size,
            start_count,
            pages = storage.page_count(),
            "opened database file"
        );
        Ok(Self {
            path: path.to_path_buf(),
            storage,
            page_size,
            start_count,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn page_count(&self) -> u64 {
        self.storage.page_count()
    }

    /// Number of times the file has been opened, creation included.
    pub fn start_count(&self) -> u32 {
        self.start_count
    }

    pub fn directory_root(&self) -> Result<PageNum> {
        Ok(self.summary()?.directory())
    }

    pub fn page(&self, page: PageNum) -> Result<&[u8]> {
        self.storage.page(page)
    }

    pub fn page_mut(&mut self, page: PageNum) -> Result<&mut [u8]> {
        self.storage.page_mut(page)
    }

    pub fn sync(&self) -> Result<()> {
        self.storage.sync()
    }

    fn summary(&self) -> Result<&SummaryPage> {
        SummaryPage::from_bytes(self.storage.page(SUMMARY_PAGE_NUM)?)
    }

    fn summary_mut(&mut self) -> Result<&mut SummaryPage> {
        SummaryPage::from_bytes_mut(self.storage.page_mut(SUMMARY_PAGE_NUM)?)
    }

    pub fn is_allocated(&self, page: PageNum) -> Result<bool> {
        if page == SUMMARY_PAGE_NUM {
            return Ok(true);
        }
        ensure!(
            page < self.page_count(),
            "page {} out of bounds (page_count={})",
            page,
            self.page_count()
        );
        let inv = inventory_page_for(page, self.page_size)?;
        inventory::is_set(self.storage.page(inv)?, page - inv)
    }

    pub fn allocate_page(&mut self) -> Result<PageNum> {
        loop {
            if let Some((inv, bit)) = self.find_free_page()? {
                inventory::set(self.storage.page_mut(inv)?, bit)?;
                let page = inv + bit;
                self.storage.page_mut(page)?.fill(0);
                tracing::trace!(page, "allocated page");
                return Ok(page);
            }
            self.extend()?;
        }
    }

    fn find_free_page(&self) -> Result<Option<(PageNum, u64)>> {
        let section = section_size(self.page_size);
        let page_count = self.page_count();

        let mut inv = FIRST_INVENTORY_PAGE_NUM;
        while inv < page_count {
            let limit = (page_count - inv).min(section);
            if let Some(bit) = inventory::first_clear(self.storage.page(inv)?, limit)? {
                return Ok(Some((inv, bit)));
            }
            inv += section;
        }
        Ok(None)
    }

    fn extend(&mut self) -> Result<()> {
        let old = self.page_count();
        let new = old + (old / 4).clamp(1, MAX_GROW_PAGES);
        self.storage.grow(new)?;

        let section = section_size(self.page_size);
        let mut inv = inventory_page_for(old, self.page_size)?;
        if inv < old {
            inv += section;
        }
        while inv < new {
            inventory::init(self.storage.page_mut(inv)?);
            tracing::debug!(page = inv, "formatted inventory page");
            inv += section;
        }

        tracing::debug!(from = old, to = new, "grew database file");
        Ok(())
    }

    pub fn free_page(&mut self, page: PageNum) -> Result<()> {
        ensure!(
            page != SUMMARY_PAGE_NUM,
            "the summary page cannot be freed"
        );
        ensure!(
            page < self.page_count(),
            "page {} out of bounds (page_count={})",
            page,
            self.page_count()
        );
        ensure!(
            !is_inventory_page(page, self.page_size),
            "inventory page {} cannot be freed",
            page
        );

        let inv = inventory_page_for(page, self.page_size)?;
        let bitmap = self.storage.page_mut(inv)?;
        if !inventory::is_set(bitmap, page - inv)? {
            bail!("page {} is not allocated", page);
        }
        inventory::clear(bitmap, page - inv)?;
        tracing::trace!(page, "freed page");
        Ok(())
    }

    fn directory_pages(&self) -> Result<Vec<PageNum>> {
        let mut pages = Vec::new();
        let mut next = self.summary()?.directory();
        while next != 0 {
            ensure!(
                pages.len() as u64 <= self.page_count(),
                "directory chain starting at page {} loops",
                self.summary()?.directory()
            );
            pages.push(next);
            next = DirectoryHeader::from_bytes(self.storage.page(next)?)
                .wrap_err_with(|| format!("corrupt directory page {}", next))?
                .next();
        }
        Ok(pages)
    }

    fn new_directory_page(&mut self) -> Result<PageNum> {
        let page = self.allocate_page()?;
        directory::init(self.storage.page_mut(page)?);
        tracing::debug!(page, "allocated directory page");
        Ok(page)
    }

    pub fn add_table_locator(&mut self, locator: TableLocator) -> Result<()> {
        let table_id = locator.table_id();
        ensure!(
            self.find_table(table_id)?.is_none(),
            "table {} already has a directory entry",
            table_id
        );

        let tail = match self.directory_pages()?.last() {
            Some(&tail) => tail,
            None => {
                let page = self.new_directory_page()?;
                self.summary_mut()?.set_directory(page);
                page
            }
        };

        if directory::push(self.storage.page_mut(tail)?, &locator)? {
            return Ok(());
        }

        let page = self.new_directory_page()?;
        DirectoryHeader::from_bytes_mut(self.storage.page_mut(tail)?)?.set_next(page);
        ensure!(
            directory::push(self.storage.page_mut(page)?, &locator)?,
            "new directory page {} has no room",
            page
        );
        Ok(())
    }

    pub fn find_table(&self, table_id: u32) -> Result<Option<TableLocator>> {
        for page in self.directory_pages()? {
            let found = directory::entries(self.storage.page(page)?)?
                .into_iter()
                .find(|entry| entry.table_id() == table_id);
            if found.is_some() {
                return Ok(found);
            }
        }
        Ok(None)
    }

    pub fn table_locators(&self) -> Result<Vec<TableLocator>> {
        let mut all = Vec::new();
        for page in self.directory_pages()? {
            all.extend(directory::entries(self.storage.page(page)?)?);
        }
        Ok(all)
    }
}
