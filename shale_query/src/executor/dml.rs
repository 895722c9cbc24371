use std::sync::Arc;

use stratum::buffer_pool::BufferPool;
use stratum::catalog::Catalog;
use stratum::error::{DbError, DbResult};
use stratum::schema::{FieldDef, TupleDesc};
use stratum::transaction::TransactionId;
use stratum::tuple::Tuple;
use stratum::types::{DataType, Value};

use super::Operator;

fn count_desc() -> Arc<TupleDesc> {
    Arc::new(
        TupleDesc::new(vec![FieldDef::named(DataType::Int, "count")])
            .expect("single-field schema"),
    )
}

/// Drains its child on the first pull, inserting every tuple into the
/// target table through the buffer pool, and emits one tuple holding the
/// insert count. Later pulls yield nothing.
pub struct Insert {
    bp: Arc<BufferPool>,
    tid: TransactionId,
    child: Box<dyn Operator>,
    table_id: i32,
    desc: Arc<TupleDesc>,
    done: bool,
}

impl Insert {
    pub fn new(
        bp: Arc<BufferPool>,
        catalog: &Catalog,
        tid: TransactionId,
        child: Box<dyn Operator>,
        table_id: i32,
    ) -> DbResult<Self> {
        let table_desc = catalog.tuple_desc(table_id)?;
        if child.tuple_desc() != table_desc.as_ref() {
            return Err(DbError::SchemaMismatch(format!(
                "child schema does not match table {}",
                table_id
            )));
        }
        Ok(Self {
            bp,
            tid,
            child,
            table_id,
            desc: count_desc(),
            done: false,
        })
    }
}

impl Operator for Insert {
    fn open(&mut self) -> DbResult<()> {
        self.done = false;
        self.child.open()
    }

    fn has_next(&mut self) -> DbResult<bool> {
        Ok(!self.done)
    }

    fn next(&mut self) -> DbResult<Tuple> {
        if self.done {
            return Err(DbError::NoSuchElement("insert already ran".to_string()));
        }
        let mut count = 0i32;
        while self.child.has_next()? {
            let tuple = self.child.next()?;
            self.bp.insert_tuple(self.tid, self.table_id, tuple)?;
            count += 1;
        }
        self.done = true;
        Tuple::from_values(self.desc.clone(), vec![Value::Int(count)])
    }

    fn rewind(&mut self) -> DbResult<()> {
        self.done = false;
        self.child.rewind()
    }

    fn close(&mut self) {
        self.child.close();
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }
}

/// Drains its child on the first pull, deleting every tuple it yields
/// (each must carry its on-disk address), and emits one tuple holding the
/// delete count.
pub struct Delete {
    bp: Arc<BufferPool>,
    tid: TransactionId,
    child: Box<dyn Operator>,
    desc: Arc<TupleDesc>,
    done: bool,
}

impl Delete {
    pub fn new(bp: Arc<BufferPool>, tid: TransactionId, child: Box<dyn Operator>) -> Self {
        Self {
            bp,
            tid,
            child,
            desc: count_desc(),
            done: false,
        }
    }
}

impl Operator for Delete {
    fn open(&mut self) -> DbResult<()> {
        self.done = false;
        self.child.open()
    }

    fn has_next(&mut self) -> DbResult<bool> {
        Ok(!self.done)
    }

    fn next(&mut self) -> DbResult<Tuple> {
        if self.done {
            return Err(DbError::NoSuchElement("delete already ran".to_string()));
        }
        let mut count = 0i32;
        while self.child.has_next()? {
            let tuple = self.child.next()?;
            self.bp.delete_tuple(self.tid, &tuple)?;
            count += 1;
        }
        self.done = true;
        Tuple::from_values(self.desc.clone(), vec![Value::Int(count)])
    }

    fn rewind(&mut self) -> DbResult<()> {
        self.done = false;
        self.child.rewind()
    }

    fn close(&mut self) {
        self.child.close();
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }
}
