//! The pager: page number in, 4096-byte buffer out.
//!
//! Pages load lazily on first access and are written back only when the
//! table closes. New page numbers are handed out from the tail of the
//! file; nothing is ever recycled, because nothing is ever deleted.

use super::node::Node;
use crate::errors::Error;
use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::rc::Rc;
use tracing::{debug, info};

/// Page size 4 kilobytes, the same size as a page in the virtual memory
/// system of most architectures, so page I/O maps onto whole OS pages.
pub const PAGE_SIZE: usize = 4096;

/// Hard cap on the page cache, and with it the database size.
pub const TABLE_MAX_PAGES: usize = 100;

/// A shared handle to a cached page. The engine is single-threaded, so
/// plain `Rc<RefCell<_>>` is enough to let a split hold two pages at once.
pub type PageRef = Rc<RefCell<Node>>;

pub struct Pager {
    file: File,
    file_length: u64,
    num_pages: u32,
    pages: heapless::Vec<Option<PageRef>, TABLE_MAX_PAGES>,
}

impl Pager {
    /// Opens or creates the database file and validates its length.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let file_length = file.metadata()?.len();
        if file_length % PAGE_SIZE as u64 != 0 {
            return Err(err!(
                Corrupt,
                "file length {} is not a whole number of pages",
                file_length
            ));
        }
        let num_pages = (file_length / PAGE_SIZE as u64) as u32;
        debug!(file_length, num_pages, "Opened database file");
        Ok(Pager {
            file,
            file_length,
            num_pages,
            pages: heapless::Vec::new(),
        })
    }

    /// Pages known to this pager, counting unflushed in-memory ones.
    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    /// The next free page number at the tail of the file. In a database
    /// with N pages, numbers 0 through N-1 are allocated, so page N is
    /// always available. Memory is only reserved once `get` touches it.
    pub fn allocate_page(&self) -> u32 {
        self.num_pages
    }

    /// Hands out the cached page, loading or zero-filling it on a miss.
    pub fn get(&mut self, page_num: u32) -> Result<PageRef, Error> {
        if page_num as usize >= TABLE_MAX_PAGES {
            return Err(err!(
                Storage,
                "page {} out of range ({} max)",
                page_num,
                TABLE_MAX_PAGES
            ));
        }
        while self.pages.len() <= page_num as usize {
            if self.pages.push(None).is_err() {
                return Err(err!(Storage, "page cache capacity exceeded"));
            }
        }
        if self.pages[page_num as usize].is_none() {
            let mut node = Node::zeroed();
            let pages_on_disk = (self.file_length / PAGE_SIZE as u64) as u32;
            if page_num < pages_on_disk {
                self.file
                    .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
                read_page(&mut self.file, node.as_bytes_mut())?;
            }
            debug!(page_num, "Loaded page");
            self.pages[page_num as usize] = Some(Rc::new(RefCell::new(node)));
            if page_num >= self.num_pages {
                self.num_pages = page_num + 1;
            }
        }
        match &self.pages[page_num as usize] {
            Some(page) => Ok(Rc::clone(page)),
            None => Err(err!(Storage, "page {} missing after load", page_num)),
        }
    }

    /// Writes one full page back to its file offset.
    pub fn flush(&mut self, page_num: u32) -> Result<(), Error> {
        let page = match self
            .pages
            .get(page_num as usize)
            .and_then(|slot| slot.as_ref())
        {
            Some(page) => Rc::clone(page),
            None => return Err(err!(Storage, "tried to flush unloaded page {}", page_num)),
        };
        self.file
            .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
        self.file.write_all(&page.borrow().as_bytes()[..])?;
        Ok(())
    }

    /// Flushes every loaded page and syncs the file.
    pub fn close(&mut self) -> Result<(), Error> {
        let mut flushed = 0;
        for page_num in 0..self.num_pages {
            let loaded = self
                .pages
                .get(page_num as usize)
                .map_or(false, |slot| slot.is_some());
            if !loaded {
                continue;
            }
            self.flush(page_num)?;
            self.pages[page_num as usize] = None;
            flushed += 1;
        }
        self.file.sync_all()?;
        info!(pages = flushed, "Flushed database file");
        Ok(())
    }
}

/// Fills `buf` from the file's current position. A short read at the tail
/// of the file leaves the zeroed suffix in place.
fn read_page(file: &mut File, buf: &mut [u8; PAGE_SIZE]) -> Result<(), Error> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(())
}
