use std::path::Path;
use std::sync::Arc;

use crate::buffer_pool::BufferPool;
use crate::catalog::Catalog;
use crate::config::DbConfig;
use crate::error::DbResult;
use crate::heap_file::HeapFile;
use crate::schema::TupleDesc;
use crate::transaction::{TransactionId, TransactionManager};

/// One running engine instance: the catalog, the buffer pool (which owns
/// the lock manager), and the transaction id allocator, wired together.
/// Lifecycle is caller-scoped; tests build a fresh instance per scenario.
#[derive(Debug)]
pub struct Database {
    config: DbConfig,
    catalog: Arc<Catalog>,
    buffer_pool: Arc<BufferPool>,
    transactions: TransactionManager,
}

impl Database {
    pub fn new(config: DbConfig) -> DbResult<Self> {
        config.validate()?;
        let catalog = Arc::new(Catalog::new());
        let buffer_pool = Arc::new(BufferPool::new(Arc::clone(&catalog), &config));
        Ok(Self {
            config,
            catalog,
            buffer_pool,
            transactions: TransactionManager::new(),
        })
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPool> {
        &self.buffer_pool
    }

    /// Opens a heap file with the configured page size and registers it in
    /// the catalog.
    pub fn create_table<P: AsRef<Path>>(
        &self,
        path: P,
        desc: Arc<TupleDesc>,
        name: &str,
    ) -> DbResult<Arc<HeapFile>> {
        let file = Arc::new(HeapFile::open(path, desc, self.config.page_size)?);
        self.catalog.add_table(Arc::clone(&file), name);
        Ok(file)
    }

    pub fn begin(&self) -> TransactionId {
        self.transactions.begin()
    }

    pub fn commit(&self, tid: TransactionId) -> DbResult<()> {
        self.buffer_pool.transaction_complete(tid, true)
    }

    pub fn abort(&self, tid: TransactionId) -> DbResult<()> {
        self.buffer_pool.transaction_complete(tid, false)
    }
}
