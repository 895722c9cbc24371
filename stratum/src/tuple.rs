use std::sync::Arc;

use bytes::{Buf, BufMut};

use crate::error::{DbError, DbResult};
use crate::schema::TupleDesc;
use crate::types::Value;
use crate::PageId;

/// The on-disk address of a tuple: its page plus its slot on that page.
/// Immutable once the tuple has been placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: u16,
}

impl RecordId {
    pub fn new(page_id: PageId, slot: u16) -> Self {
        Self { page_id, slot }
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.page_id, self.slot)
    }
}

/// A schema-bound row. Slots may be unset while the row is under
/// construction; encoding requires every slot to be populated.
#[derive(Debug, Clone)]
pub struct Tuple {
    desc: Arc<TupleDesc>,
    values: Vec<Option<Value>>,
    record_id: Option<RecordId>,
}

impl Tuple {
    pub fn new(desc: Arc<TupleDesc>) -> Self {
        let values = vec![None; desc.num_fields()];
        Self {
            desc,
            values,
            record_id: None,
        }
    }

    /// Builds a fully populated tuple. The value count must match the
    /// schema; value types are the caller's responsibility.
    pub fn from_values(desc: Arc<TupleDesc>, values: Vec<Value>) -> DbResult<Self> {
        if values.len() != desc.num_fields() {
            return Err(DbError::SchemaMismatch(format!(
                "{} values for a {}-field schema",
                values.len(),
                desc.num_fields()
            )));
        }
        Ok(Self {
            desc,
            values: values.into_iter().map(Some).collect(),
            record_id: None,
        })
    }

    pub fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, rid: Option<RecordId>) {
        self.record_id = rid;
    }

    pub fn set_value(&mut self, index: usize, value: Value) -> DbResult<()> {
        let slot = self
            .values
            .get_mut(index)
            .ok_or_else(|| DbError::NoSuchElement(format!("field index {}", index)))?;
        *slot = Some(value);
        Ok(())
    }

    pub fn value(&self, index: usize) -> DbResult<&Value> {
        self.values
            .get(index)
            .and_then(|v| v.as_ref())
            .ok_or_else(|| DbError::NoSuchElement(format!("field index {}", index)))
    }

    pub fn values(&self) -> DbResult<Vec<Value>> {
        (0..self.values.len())
            .map(|i| self.value(i).cloned())
            .collect()
    }

    /// Writes the tuple's fields in schema order.
    pub fn write_to<B: BufMut>(&self, buf: &mut B) -> DbResult<()> {
        for i in 0..self.desc.num_fields() {
            self.value(i)?.write_to(buf);
        }
        Ok(())
    }

    /// Reads a tuple of the given schema from its on-disk encoding.
    pub fn read_from<B: Buf>(desc: Arc<TupleDesc>, buf: &mut B) -> DbResult<Self> {
        let mut values = Vec::with_capacity(desc.num_fields());
        for i in 0..desc.num_fields() {
            let dtype = desc.field_type(i)?;
            values.push(Some(Value::read_from(dtype, buf)?));
        }
        Ok(Self {
            desc,
            values,
            record_id: None,
        })
    }

    /// Concatenates two rows under a merged schema.
    pub fn merge(desc: Arc<TupleDesc>, left: &Tuple, right: &Tuple) -> DbResult<Self> {
        let mut values = left.values()?;
        values.extend(right.values()?);
        Tuple::from_values(desc, values)
    }
}

impl std::fmt::Display for Tuple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for v in &self.values {
            if !first {
                write!(f, "\t")?;
            }
            first = false;
            match v {
                Some(v) => write!(f, "{}", v)?,
                None => write!(f, "<unset>")?,
            }
        }
        Ok(())
    }
}
