//! # Inventory Pages
//!
//! Page allocation is tracked with bitmaps. Pages from 1 onwards are split
//! into sections; the first page of every section is its inventory page and
//! holds one bit per page of the section, itself included.
//!
//! ```text
//! section size S = (page_size - 1) * 8
//!
//! page 1          inventory for pages 1 .. 1+S
//! page 1+S        inventory for pages 1+S .. 1+2S
//! ...
//!
//! +------+----------------------------------------+
//! | 0x01 | bitmap: bit i set = page (inv + i) used |
//! +------+----------------------------------------+
//!   1 B    page_size - 1 bytes
//! ```
//!
//! Bit `i` lives in byte `1 + i / 8` under mask `1 << (i % 8)`.

use eyre::{ensure, Result};

use super::page::{PageNum, PageType};
use crate::config::{FIRST_INVENTORY_PAGE_NUM, INVENTORY_HEADER_SIZE};

pub fn section_size(page_size: u32) -> u64 {
    (page_size as u64 - INVENTORY_HEADER_SIZE as u64) * 8
}

/// Inventory page that tracks `page`.
pub fn inventory_page_for(page: PageNum, page_size: u32) -> Result<PageNum> {
    ensure!(
        page >= FIRST_INVENTORY_PAGE_NUM,
        "page {} is not tracked by an inventory page",
        page
    );
    let section = section_size(page_size);
    Ok(FIRST_INVENTORY_PAGE_NUM + ((page - FIRST_INVENTORY_PAGE_NUM) / section) * section)
}

pub fn is_inventory_page(page: PageNum, page_size: u32) -> bool {
    page >= FIRST_INVENTORY_PAGE_NUM
        && (page - FIRST_INVENTORY_PAGE_NUM) % section_size(page_size) == 0
}

/// Formats `page` as an empty inventory with its own bit set.
pub fn init(page: &mut [u8]) {
    page.fill(0);
    page[0] = PageType::Inventory as u8;
    page[INVENTORY_HEADER_SIZE] = 1;
}

fn locate(page: &[u8], bit: u64) -> Result<(usize, u8)> {
    ensure!(
        page.first() == Some(&(PageType::Inventory as u8)),
        "page is not an inventory page"
    );
    let byte = INVENTORY_HEADER_SIZE + (bit / 8) as usize;
    ensure!(
        byte < page.len(),
        "inventory bit {} out of range for {} byte page",
        bit,
        page.len()
    );
    Ok((byte, 1 << (bit % 8)))
}

pub fn is_set(page: &[u8], bit: u64) -> Result<bool> {
    let (byte, mask) = locate(page, bit)?;
    Ok(page[byte] & mask != 0)
}

pub fn set(page: &mut [u8], bit: u64) -> Result<()> {
    let (byte, mask) = locate(page, bit)?;
    page[byte] |= mask;
    Ok(())
}

pub fn clear(page: &mut [u8], bit: u64) -> Result<()> {
    let (byte, mask) = locate(page, bit)?;
    page[byte] &= !mask;
    Ok(())
}

/// First clear bit below `limit`.
pub fn first_clear(page: &[u8], limit: u64) -> Result<Option<u64>> {
    locate(page, 0)?;
    let bitmap = &page[INVENTORY_HEADER_SIZE..];
    let limit = limit.min(bitmap.len() as u64 * 8);

    for (i, &byte) in bitmap.iter().enumerate() {
        let base = i as u64 * 8;
        if base >= limit {
            break;
        }
        if byte == 0xFF {
            continue;
        }
        let bit = base + (!byte).trailing_zeros() as u64;
        return Ok((bit < limit).then_some(bit));
    }
    Ok(None)
}
