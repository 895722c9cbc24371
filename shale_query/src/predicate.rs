use std::cmp::Ordering;

use stratum::error::{DbError, DbResult};
use stratum::tuple::Tuple;
use stratum::types::Value;

/// Comparison operators usable in filter and join predicates. `Like` is
/// substring containment and is defined over text only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
}

impl Op {
    /// Applies the operator to two values of the same type.
    pub fn apply(&self, left: &Value, right: &Value) -> DbResult<bool> {
        if let Op::Like = self {
            return match (left, right) {
                (Value::Text(haystack), Value::Text(needle)) => {
                    Ok(haystack.contains(needle.as_str()))
                }
                _ => Err(DbError::IllegalArgument(
                    "LIKE is defined over text fields only".to_string(),
                )),
            };
        }
        let ordering = left.try_cmp(right).ok_or_else(|| {
            DbError::SchemaMismatch(format!(
                "cannot compare {} with {}",
                left.data_type(),
                right.data_type()
            ))
        })?;
        Ok(match self {
            Op::Eq => ordering == Ordering::Equal,
            Op::NotEq => ordering != Ordering::Equal,
            Op::Lt => ordering == Ordering::Less,
            Op::LtEq => ordering != Ordering::Greater,
            Op::Gt => ordering == Ordering::Greater,
            Op::GtEq => ordering != Ordering::Less,
            Op::Like => unreachable!("handled above"),
        })
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Op::Eq => "=",
            Op::NotEq => "<>",
            Op::Lt => "<",
            Op::LtEq => "<=",
            Op::Gt => ">",
            Op::GtEq => ">=",
            Op::Like => "LIKE",
        };
        write!(f, "{}", s)
    }
}

/// `field op constant` over a single tuple.
#[derive(Debug, Clone)]
pub struct Predicate {
    pub field: usize,
    pub op: Op,
    pub operand: Value,
}

impl Predicate {
    pub fn new(field: usize, op: Op, operand: Value) -> Self {
        Self { field, op, operand }
    }

    pub fn matches(&self, tuple: &Tuple) -> DbResult<bool> {
        self.op.apply(tuple.value(self.field)?, &self.operand)
    }
}

/// `left.field op right.field` over a pair of tuples.
#[derive(Debug, Clone)]
pub struct JoinPredicate {
    pub left_field: usize,
    pub op: Op,
    pub right_field: usize,
}

impl JoinPredicate {
    pub fn new(left_field: usize, op: Op, right_field: usize) -> Self {
        Self {
            left_field,
            op,
            right_field,
        }
    }

    pub fn matches(&self, left: &Tuple, right: &Tuple) -> DbResult<bool> {
        self.op
            .apply(left.value(self.left_field)?, right.value(self.right_field)?)
    }
}
