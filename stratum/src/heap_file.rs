use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::buffer_pool::{BufferPool, Permission};
use crate::error::{DbError, DbResult};
use crate::page::{slots_per_page, HeapPage};
use crate::schema::TupleDesc;
use crate::transaction::TransactionId;
use crate::tuple::Tuple;
use crate::PageId;

/// A table stored as a contiguous sequence of fixed-size heap pages in one
/// file. Reads and writes are synchronous; callers are expected to hold
/// the appropriate page locks, which is why every access in the ordinary
/// pull path goes through the buffer pool rather than calling
/// [`HeapFile::read_page`] directly.
pub struct HeapFile {
    path: PathBuf,
    file: Mutex<File>,
    desc: Arc<TupleDesc>,
    table_id: i32,
    page_size: usize,
    append_lock: Mutex<()>,
}

impl HeapFile {
    /// Opens (creating if absent) the heap file at `path`. The table id is
    /// the crc32 of the canonical path, which is stable across opens and
    /// across processes for the same file.
    pub fn open<P: AsRef<Path>>(
        path: P,
        desc: Arc<TupleDesc>,
        page_size: usize,
    ) -> DbResult<Self> {
        if slots_per_page(page_size, desc.byte_size()) == 0 {
            return Err(DbError::IllegalArgument(format!(
                "page size {} cannot hold a single {}-byte tuple",
                page_size,
                desc.byte_size()
            )));
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.as_ref())?;
        let path = path.as_ref().canonicalize()?;
        let table_id = crc32fast::hash(path.as_os_str().as_encoded_bytes()) as i32;
        Ok(Self {
            path,
            file: Mutex::new(file),
            desc,
            table_id,
            page_size,
            append_lock: Mutex::new(()),
        })
    }

    pub fn table_id(&self) -> i32 {
        self.table_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tuple_desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn num_pages(&self) -> DbResult<i32> {
        let file = self.lock_file();
        let len = file.metadata()?.len();
        Ok((len / self.page_size as u64) as i32)
    }

    /// Reads one page image from disk. The page number must be within the
    /// file; growing the table goes through [`HeapFile::insert_tuple`].
    pub fn read_page(&self, pid: PageId) -> DbResult<HeapPage> {
        if pid.table_id != self.table_id {
            return Err(DbError::IllegalArgument(format!(
                "page {} does not belong to table {}",
                pid, self.table_id
            )));
        }
        let mut file = self.lock_file();
        let len = file.metadata()?.len();
        let num_pages = (len / self.page_size as u64) as i32;
        if pid.page_no < 0 || pid.page_no >= num_pages {
            return Err(DbError::IllegalArgument(format!(
                "page {} out of range for a {}-page table",
                pid, num_pages
            )));
        }
        file.seek(SeekFrom::Start(pid.page_no as u64 * self.page_size as u64))?;
        let mut data = vec![0u8; self.page_size];
        file.read_exact(&mut data)?;
        drop(file);
        HeapPage::new(pid, &data, self.desc.clone(), self.page_size)
    }

    /// Writes one page image to disk and syncs it. Pages of committed
    /// transactions are forced through here before their locks release.
    pub fn write_page(&self, page: &HeapPage) -> DbResult<()> {
        let data = page.serialize()?;
        let mut file = self.lock_file();
        file.seek(SeekFrom::Start(
            page.id().page_no as u64 * self.page_size as u64,
        ))?;
        file.write_all(&data)?;
        file.sync_all()?;
        Ok(())
    }

    /// Appends a zeroed empty page at end-of-file and returns its id.
    fn append_empty_page(&self) -> DbResult<PageId> {
        let mut file = self.lock_file();
        let len = file.metadata()?.len();
        let page_no = (len / self.page_size as u64) as i32;
        file.seek(SeekFrom::End(0))?;
        file.write_all(&HeapPage::empty_image(self.page_size))?;
        file.sync_all()?;
        debug!(table = self.table_id, page_no, "appended empty page");
        Ok(PageId::new(self.table_id, page_no))
    }

    /// Inserts a tuple into the first page with a free slot, fetching every
    /// candidate page through the buffer pool with write intent. When the
    /// table is full, a fresh page is appended under the append mutex and
    /// then locked through the buffer pool like any other page.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        tuple: Tuple,
        bp: &BufferPool,
    ) -> DbResult<Vec<PageId>> {
        for page_no in 0..self.num_pages()? {
            let pid = PageId::new(self.table_id, page_no);
            let handle = bp.get_page(tid, pid, Permission::ReadWrite)?;
            let mut page = handle.write();
            if page.num_empty_slots() > 0 {
                page.insert_tuple(tuple)?;
                return Ok(vec![pid]);
            }
        }

        loop {
            let new_pid = {
                let _guard = self.lock_append();
                self.append_empty_page()?
            };
            let handle = bp.get_page(tid, new_pid, Permission::ReadWrite)?;
            let mut page = handle.write();
            if page.num_empty_slots() > 0 {
                page.insert_tuple(tuple)?;
                return Ok(vec![new_pid]);
            }
            // A concurrent transaction filled the fresh page before we
            // could lock it; append another.
        }
    }

    /// Deletes the tuple addressed by its record id.
    pub fn delete_tuple(
        &self,
        tid: TransactionId,
        tuple: &Tuple,
        bp: &BufferPool,
    ) -> DbResult<Vec<PageId>> {
        let rid = tuple
            .record_id()
            .ok_or_else(|| DbError::TupleNotFound(PageId::new(self.table_id, -1)))?;
        if rid.page_id.table_id != self.table_id {
            return Err(DbError::IllegalArgument(format!(
                "tuple at {} does not belong to table {}",
                rid, self.table_id
            )));
        }
        let handle = bp.get_page(tid, rid.page_id, Permission::ReadWrite)?;
        handle.write().delete_tuple(tuple)?;
        Ok(vec![rid.page_id])
    }

    /// A lazy page-at-a-time iterator over the table's tuples, in page
    /// then slot order. Each page is fetched with read intent when the
    /// iterator reaches it.
    pub fn iter(self: &Arc<Self>, tid: TransactionId, bp: Arc<BufferPool>) -> HeapFileIterator {
        HeapFileIterator {
            heap: Arc::clone(self),
            bp,
            tid,
            next_page: 0,
            buffered: VecDeque::new(),
            opened: false,
        }
    }

    fn lock_file(&self) -> MutexGuard<'_, File> {
        self.file
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_append(&self) -> MutexGuard<'_, ()> {
        self.append_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for HeapFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeapFile")
            .field("path", &self.path)
            .field("table_id", &self.table_id)
            .field("page_size", &self.page_size)
            .finish()
    }
}

/// Single-pass pull iterator over a heap file. Tuples of the current page
/// are buffered so that the page latch is never held across pulls; the
/// page lock itself stays with the transaction per strict 2PL.
pub struct HeapFileIterator {
    heap: Arc<HeapFile>,
    bp: Arc<BufferPool>,
    tid: TransactionId,
    next_page: i32,
    buffered: VecDeque<Tuple>,
    opened: bool,
}

impl HeapFileIterator {
    pub fn open(&mut self) -> DbResult<()> {
        self.opened = true;
        self.next_page = 0;
        self.buffered.clear();
        Ok(())
    }

    pub fn has_next(&mut self) -> DbResult<bool> {
        if !self.opened {
            return Ok(false);
        }
        while self.buffered.is_empty() && self.next_page < self.heap.num_pages()? {
            let pid = PageId::new(self.heap.table_id(), self.next_page);
            let handle = self.bp.get_page(self.tid, pid, Permission::ReadOnly)?;
            let page = handle.read();
            self.buffered.extend(page.iter_tuples().cloned());
            self.next_page += 1;
        }
        Ok(!self.buffered.is_empty())
    }

    pub fn next(&mut self) -> DbResult<Tuple> {
        if !self.has_next()? {
            return Err(DbError::NoSuchElement("heap file iterator".to_string()));
        }
        Ok(self.buffered.pop_front().expect("buffer checked non-empty"))
    }

    pub fn rewind(&mut self) -> DbResult<()> {
        self.close();
        self.open()
    }

    pub fn close(&mut self) {
        self.opened = false;
        self.buffered.clear();
    }
}
