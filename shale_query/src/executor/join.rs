use std::sync::Arc;

use stratum::error::{DbError, DbResult};
use stratum::schema::TupleDesc;
use stratum::tuple::Tuple;

use super::Operator;
use crate::predicate::JoinPredicate;

/// Nested-loop join: the left child is the outer input, the right the
/// inner. Every left tuple is paired with each matching right tuple; when
/// the right child runs dry it is rewound and the next left tuple is
/// fetched. The output schema is the concatenation of both children's.
pub struct Join {
    predicate: JoinPredicate,
    left: Box<dyn Operator>,
    right: Box<dyn Operator>,
    desc: Arc<TupleDesc>,
    current_left: Option<Tuple>,
    pending: Option<Tuple>,
}

impl Join {
    pub fn new(
        predicate: JoinPredicate,
        left: Box<dyn Operator>,
        right: Box<dyn Operator>,
    ) -> Self {
        let desc = Arc::new(TupleDesc::merge(left.tuple_desc(), right.tuple_desc()));
        Self {
            predicate,
            left,
            right,
            desc,
            current_left: None,
            pending: None,
        }
    }
}

impl Operator for Join {
    fn open(&mut self) -> DbResult<()> {
        self.left.open()?;
        self.right.open()?;
        self.current_left = None;
        self.pending = None;
        Ok(())
    }

    fn has_next(&mut self) -> DbResult<bool> {
        if self.pending.is_some() {
            return Ok(true);
        }
        loop {
            if self.current_left.is_none() {
                if !self.left.has_next()? {
                    return Ok(false);
                }
                self.current_left = Some(self.left.next()?);
            }
            let outer = self
                .current_left
                .as_ref()
                .expect("outer tuple fetched above");
            while self.right.has_next()? {
                let inner = self.right.next()?;
                if self.predicate.matches(outer, &inner)? {
                    self.pending = Some(Tuple::merge(self.desc.clone(), outer, &inner)?);
                    return Ok(true);
                }
            }
            self.right.rewind()?;
            self.current_left = None;
        }
    }

    fn next(&mut self) -> DbResult<Tuple> {
        if !self.has_next()? {
            return Err(DbError::NoSuchElement("join exhausted".to_string()));
        }
        Ok(self.pending.take().expect("has_next buffered a tuple"))
    }

    fn rewind(&mut self) -> DbResult<()> {
        self.left.rewind()?;
        self.right.rewind()?;
        self.current_left = None;
        self.pending = None;
        Ok(())
    }

    fn close(&mut self) {
        self.left.close();
        self.right.close();
        self.current_left = None;
        self.pending = None;
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }
}
