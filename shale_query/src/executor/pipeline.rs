use stratum::error::{DbError, DbResult};
use stratum::schema::TupleDesc;
use stratum::tuple::Tuple;

use super::Operator;
use crate::predicate::Predicate;

/// Yields only the child tuples satisfying the predicate.
pub struct Filter {
    predicate: Predicate,
    child: Box<dyn Operator>,
    pending: Option<Tuple>,
}

impl Filter {
    pub fn new(predicate: Predicate, child: Box<dyn Operator>) -> Self {
        Self {
            predicate,
            child,
            pending: None,
        }
    }
}

impl Operator for Filter {
    fn open(&mut self) -> DbResult<()> {
        self.pending = None;
        self.child.open()
    }

    fn has_next(&mut self) -> DbResult<bool> {
        if self.pending.is_some() {
            return Ok(true);
        }
        while self.child.has_next()? {
            let tuple = self.child.next()?;
            if self.predicate.matches(&tuple)? {
                self.pending = Some(tuple);
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn next(&mut self) -> DbResult<Tuple> {
        if !self.has_next()? {
            return Err(DbError::NoSuchElement("filter exhausted".to_string()));
        }
        Ok(self.pending.take().expect("has_next buffered a tuple"))
    }

    fn rewind(&mut self) -> DbResult<()> {
        self.pending = None;
        self.child.rewind()
    }

    fn close(&mut self) {
        self.pending = None;
        self.child.close();
    }

    fn tuple_desc(&self) -> &TupleDesc {
        self.child.tuple_desc()
    }
}
