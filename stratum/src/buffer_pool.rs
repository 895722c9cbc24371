//! The buffer pool: a bounded cache of heap pages keyed by page id.
//!
//! Every page an operator touches comes through [`BufferPool::get_page`],
//! which takes the page lock before looking at the cache. The pool runs
//! NO-STEAL / FORCE: a dirty page of an uncommitted transaction is never
//! written out (so eviction only ever picks clean victims), and a
//! committing transaction's dirty pages are flushed to disk before its
//! locks release.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::config::DbConfig;
use crate::error::{DbError, DbResult};
use crate::lock_manager::{LockKind, LockManager};
use crate::page::HeapPage;
use crate::transaction::TransactionId;
use crate::tuple::Tuple;
use crate::PageId;

/// The intent a caller declares when fetching a page. Read intent takes a
/// shared lock, write intent an exclusive one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ReadOnly,
    ReadWrite,
}

/// A shared handle to a cached page. Clones are cheap and refer to the
/// same in-memory page instance.
#[derive(Debug, Clone)]
pub struct PageHandle {
    pid: PageId,
    inner: Arc<RwLock<HeapPage>>,
}

impl PageHandle {
    fn new(page: HeapPage) -> Self {
        Self {
            pid: page.id(),
            inner: Arc::new(RwLock::new(page)),
        }
    }

    pub fn id(&self) -> PageId {
        self.pid
    }

    pub fn read(&self) -> RwLockReadGuard<'_, HeapPage> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, HeapPage> {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// The buffer pool manager.
pub struct BufferPool {
    capacity: usize,
    catalog: Arc<Catalog>,
    lock_manager: LockManager,
    pages: Mutex<HashMap<PageId, PageHandle>>,
}

impl BufferPool {
    pub fn new(catalog: Arc<Catalog>, config: &DbConfig) -> Self {
        Self {
            capacity: config.buffer_pages,
            catalog,
            lock_manager: LockManager::new(Duration::from_millis(
                config.lock_retry_quantum_ms,
            )),
            pages: Mutex::new(HashMap::new()),
        }
    }

    /// Fetches a page on behalf of a transaction. The page lock is taken
    /// first (blocking as needed; a detected deadlock surfaces as
    /// [`DbError::TransactionAborted`]); only then is the cache consulted
    /// and, on a miss, the page read from its heap file, evicting a clean
    /// victim if the pool is full.
    pub fn get_page(
        &self,
        tid: TransactionId,
        pid: PageId,
        perm: Permission,
    ) -> DbResult<PageHandle> {
        let kind = match perm {
            Permission::ReadOnly => LockKind::Shared,
            Permission::ReadWrite => LockKind::Exclusive,
        };
        self.lock_manager.acquire(tid, pid, kind)?;

        let mut pages = self.lock_pages();
        if let Some(handle) = pages.get(&pid) {
            return Ok(handle.clone());
        }
        while pages.len() >= self.capacity {
            Self::evict(&mut pages)?;
        }
        let file = self.catalog.get_table(pid.table_id)?;
        let page = file.read_page(pid)?;
        debug!(%pid, "page fetched from disk");
        let handle = PageHandle::new(page);
        pages.insert(pid, handle.clone());
        Ok(handle)
    }

    /// Removes one clean page from the cache. NO-STEAL: if every cached
    /// page is dirty under some in-flight transaction, nothing may be
    /// written out early and the fetch fails with `CachePressure`.
    fn evict(pages: &mut HashMap<PageId, PageHandle>) -> DbResult<()> {
        let victim = pages
            .iter()
            .find(|(_, handle)| handle.read().is_dirty().is_none())
            .map(|(pid, _)| *pid)
            .ok_or(DbError::CachePressure)?;
        debug!(pid = %victim, "evicting clean page");
        pages.remove(&victim);
        Ok(())
    }

    /// Inserts a tuple into the table, marking every page the insert
    /// touched as dirtied by `tid` and re-inserting it into the cache.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table_id: i32,
        tuple: Tuple,
    ) -> DbResult<()> {
        let file = self.catalog.get_table(table_id)?;
        let dirtied = file.insert_tuple(tid, tuple, self)?;
        self.admit_dirty(tid, &dirtied);
        Ok(())
    }

    /// Deletes the tuple addressed by its record id, marking the touched
    /// page as dirtied by `tid`.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> DbResult<()> {
        let rid = tuple.record_id().ok_or_else(|| {
            DbError::IllegalArgument("delete of a tuple with no on-disk address".to_string())
        })?;
        let file = self.catalog.get_table(rid.page_id.table_id)?;
        let dirtied = file.delete_tuple(tid, tuple, self)?;
        self.admit_dirty(tid, &dirtied);
        Ok(())
    }

    /// Marks the given pages dirty and makes sure they sit in the cache.
    /// A dirty page of the mutating transaction is kept even when the pool
    /// is over capacity: dropping it would lose the update, and NO-STEAL
    /// forbids writing it out before commit.
    fn admit_dirty(&self, tid: TransactionId, pids: &[PageId]) {
        let mut pages = self.lock_pages();
        for pid in pids {
            if let Some(handle) = pages.get(pid) {
                handle.write().mark_dirty(Some(tid));
            } else {
                warn!(%pid, "dirtied page fell out of the cache before dirty marking");
            }
        }
        // Opportunistically shrink back to capacity.
        while pages.len() > self.capacity {
            if Self::evict(&mut pages).is_err() {
                break;
            }
        }
    }

    /// Commits or aborts a transaction.
    ///
    /// Commit forces every page dirtied by `tid` to disk and only then
    /// releases its locks; a flush failure aborts the commit, restoring the
    /// pages before the locks go. Abort restores each dirtied page from its
    /// before-image (or from disk) before releasing, so no other
    /// transaction can observe the aborted writes through a cache hit.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> DbResult<()> {
        let outcome = if commit {
            let flushed = self.flush_pages(tid);
            if flushed.is_err() {
                warn!(%tid, "commit flush failed, forcing abort");
                if let Err(restore_err) = self.restore_pages(tid) {
                    warn!(%tid, error = %restore_err, "restore after failed flush also failed");
                }
            }
            flushed
        } else {
            self.restore_pages(tid)
        };
        self.lock_manager.release_all(tid);
        debug!(%tid, commit, "transaction complete");
        outcome
    }

    /// Writes every page dirtied by `tid` to disk and clears its dirty
    /// flag and before-image.
    fn flush_pages(&self, tid: TransactionId) -> DbResult<()> {
        let pages = self.lock_pages();
        for handle in pages.values() {
            if handle.read().is_dirty() == Some(tid) {
                let file = self.catalog.get_table(handle.id().table_id)?;
                file.write_page(&handle.read())?;
                handle.write().mark_dirty(None);
            }
        }
        Ok(())
    }

    /// Replaces every page dirtied by `tid` with its before-image, or with
    /// a fresh read from disk when no image was captured.
    fn restore_pages(&self, tid: TransactionId) -> DbResult<()> {
        let mut pages = self.lock_pages();
        let dirtied: Vec<PageId> = pages
            .iter()
            .filter(|(_, h)| h.read().is_dirty() == Some(tid))
            .map(|(pid, _)| *pid)
            .collect();
        for pid in dirtied {
            let file = self.catalog.get_table(pid.table_id)?;
            let restored = {
                let page = pages[&pid].read();
                match page.before_image() {
                    Some(image) => {
                        HeapPage::new(pid, image, file.tuple_desc().clone(), file.page_size())?
                    }
                    None => file.read_page(pid)?,
                }
            };
            pages.insert(pid, PageHandle::new(restored));
        }
        Ok(())
    }

    /// Writes every dirty page to disk regardless of owner. Recovery
    /// tooling only: this breaks NO-STEAL for in-flight transactions.
    pub fn flush_all_pages(&self) -> DbResult<()> {
        let pages = self.lock_pages();
        for handle in pages.values() {
            if handle.read().is_dirty().is_some() {
                let file = self.catalog.get_table(handle.id().table_id)?;
                file.write_page(&handle.read())?;
                handle.write().mark_dirty(None);
            }
        }
        Ok(())
    }

    /// Writes one page to disk if dirty. Bypasses locking.
    pub fn flush_page(&self, pid: PageId) -> DbResult<()> {
        let pages = self.lock_pages();
        if let Some(handle) = pages.get(&pid) {
            if handle.read().is_dirty().is_some() {
                let file = self.catalog.get_table(pid.table_id)?;
                file.write_page(&handle.read())?;
                handle.write().mark_dirty(None);
            }
        }
        Ok(())
    }

    /// Drops a page from the cache without writing it. Bypasses locking.
    pub fn discard_page(&self, pid: PageId) {
        self.lock_pages().remove(&pid);
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.lock_manager.holds(tid, pid)
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.lock_manager
    }

    /// Number of pages currently cached.
    pub fn cached_page_count(&self) -> usize {
        self.lock_pages().len()
    }

    fn lock_pages(&self) -> MutexGuard<'_, HashMap<PageId, PageHandle>> {
        self.pages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("capacity", &self.capacity)
            .field("cached", &self.cached_page_count())
            .finish()
    }
}
