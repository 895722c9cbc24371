use crate::error::{DbError, DbResult};
use crate::types::DataType;

/// One column of a schema: a type plus an optional name.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub data_type: DataType,
    pub name: Option<String>,
}

impl FieldDef {
    pub fn new(data_type: DataType, name: Option<String>) -> Self {
        Self { data_type, name }
    }

    pub fn named<S: Into<String>>(data_type: DataType, name: S) -> Self {
        Self {
            data_type,
            name: Some(name.into()),
        }
    }
}

/// The schema of a table or of an operator's output: a non-empty ordered
/// list of typed columns. Equality compares types only; names are
/// advisory.
#[derive(Debug, Clone)]
pub struct TupleDesc {
    fields: Vec<FieldDef>,
}

impl TupleDesc {
    pub fn new(fields: Vec<FieldDef>) -> DbResult<Self> {
        if fields.is_empty() {
            return Err(DbError::IllegalArgument(
                "a schema must have at least one field".to_string(),
            ));
        }
        Ok(Self { fields })
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn field_type(&self, index: usize) -> DbResult<DataType> {
        self.fields
            .get(index)
            .map(|f| f.data_type)
            .ok_or_else(|| DbError::NoSuchElement(format!("field index {}", index)))
    }

    pub fn field_name(&self, index: usize) -> Option<&str> {
        self.fields.get(index).and_then(|f| f.name.as_deref())
    }

    /// First-match lookup of a field by name.
    pub fn index_of(&self, name: &str) -> DbResult<usize> {
        self.fields
            .iter()
            .position(|f| f.name.as_deref() == Some(name))
            .ok_or_else(|| DbError::NoSuchElement(format!("field named {:?}", name)))
    }

    /// On-disk footprint of one tuple of this schema, in bytes. Stable for
    /// the life of a table.
    pub fn byte_size(&self) -> usize {
        self.fields.iter().map(|f| f.data_type.byte_len()).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter()
    }

    /// Concatenates two schemas, left fields first.
    pub fn merge(left: &TupleDesc, right: &TupleDesc) -> TupleDesc {
        let mut fields = left.fields.clone();
        fields.extend(right.fields.iter().cloned());
        TupleDesc { fields }
    }

    /// A copy of this schema with every field name prefixed by
    /// `alias.`. Unnamed fields stay unnamed.
    pub fn with_alias(&self, alias: &str) -> TupleDesc {
        let fields = self
            .fields
            .iter()
            .map(|f| FieldDef {
                data_type: f.data_type,
                name: f.name.as_ref().map(|n| format!("{}.{}", alias, n)),
            })
            .collect();
        TupleDesc { fields }
    }
}

impl PartialEq for TupleDesc {
    fn eq(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(other.fields.iter())
                .all(|(a, b)| a.data_type == b.data_type)
    }
}

impl Eq for TupleDesc {}
