use std::sync::Arc;

use stratum::buffer_pool::BufferPool;
use stratum::catalog::Catalog;
use stratum::error::DbResult;
use stratum::heap_file::HeapFileIterator;
use stratum::schema::TupleDesc;
use stratum::transaction::TransactionId;
use stratum::tuple::Tuple;

use super::Operator;

/// Sequential scan over a table, page by page through the buffer pool
/// with read intent. When an alias is given, the emitted schema's field
/// names are prefixed with it.
pub struct SeqScan {
    iter: HeapFileIterator,
    desc: TupleDesc,
}

impl SeqScan {
    pub fn new(
        bp: Arc<BufferPool>,
        catalog: &Catalog,
        tid: TransactionId,
        table_id: i32,
        alias: &str,
    ) -> DbResult<Self> {
        let file = catalog.get_table(table_id)?;
        let desc = if alias.is_empty() {
            file.tuple_desc().as_ref().clone()
        } else {
            file.tuple_desc().with_alias(alias)
        };
        Ok(Self {
            iter: file.iter(tid, bp),
            desc,
        })
    }
}

impl Operator for SeqScan {
    fn open(&mut self) -> DbResult<()> {
        self.iter.open()
    }

    fn has_next(&mut self) -> DbResult<bool> {
        self.iter.has_next()
    }

    fn next(&mut self) -> DbResult<Tuple> {
        self.iter.next()
    }

    fn rewind(&mut self) -> DbResult<()> {
        self.iter.rewind()
    }

    fn close(&mut self) {
        self.iter.close();
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }
}
