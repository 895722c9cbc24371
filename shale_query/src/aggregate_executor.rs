use std::collections::HashMap;
use std::sync::Arc;

use stratum::error::{DbError, DbResult};
use stratum::schema::{FieldDef, TupleDesc};
use stratum::tuple::Tuple;
use stratum::types::{DataType, Value};

use crate::executor::Operator;

/// Aggregate operations. Integer columns support all five; a text column
/// supports only `Count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Min,
    Max,
    Sum,
    Avg,
    Count,
}

impl std::fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AggregateOp::Min => "MIN",
            AggregateOp::Max => "MAX",
            AggregateOp::Sum => "SUM",
            AggregateOp::Avg => "AVG",
            AggregateOp::Count => "COUNT",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Default)]
struct GroupState {
    count: i64,
    sum: i64,
    min: Option<i32>,
    max: Option<i32>,
}

impl GroupState {
    fn merge(&mut self, value: &Value) {
        self.count += 1;
        if let Value::Int(v) = value {
            self.sum += *v as i64;
            self.min = Some(self.min.map_or(*v, |m| m.min(*v)));
            self.max = Some(self.max.map_or(*v, |m| m.max(*v)));
        }
    }

    fn result(&self, op: AggregateOp) -> i32 {
        match op {
            AggregateOp::Count => self.count as i32,
            AggregateOp::Sum => self.sum as i32,
            // A group exists only once at least one tuple merged into it.
            AggregateOp::Avg => (self.sum / self.count) as i32,
            AggregateOp::Min => self.min.unwrap_or(0),
            AggregateOp::Max => self.max.unwrap_or(0),
        }
    }
}

/// Hash aggregation with full materialization: `open` consumes the child
/// completely and builds the group table, then pulls iterate the results
/// in no particular order. The aggregate column of the output is always
/// an integer; with no group field the output is a single row.
pub struct Aggregate {
    child: Box<dyn Operator>,
    agg_field: usize,
    group_field: Option<usize>,
    op: AggregateOp,
    desc: Arc<TupleDesc>,
    results: Vec<Tuple>,
    cursor: usize,
}

impl Aggregate {
    pub fn new(
        child: Box<dyn Operator>,
        agg_field: usize,
        group_field: Option<usize>,
        op: AggregateOp,
    ) -> DbResult<Self> {
        let child_desc = child.tuple_desc();
        let agg_type = child_desc.field_type(agg_field)?;
        if agg_type == DataType::Text && op != AggregateOp::Count {
            return Err(DbError::IllegalArgument(format!(
                "unsupported aggregate {} over a text field",
                op
            )));
        }

        let agg_name = child_desc
            .field_name(agg_field)
            .map(|n| format!("{}({})", op, n))
            .unwrap_or_else(|| op.to_string());
        let desc = match group_field {
            None => TupleDesc::new(vec![FieldDef::named(DataType::Int, agg_name)])?,
            Some(g) => TupleDesc::new(vec![
                FieldDef::new(
                    child_desc.field_type(g)?,
                    child_desc.field_name(g).map(str::to_string),
                ),
                FieldDef::named(DataType::Int, agg_name),
            ])?,
        };

        Ok(Self {
            child,
            agg_field,
            group_field,
            op,
            desc: Arc::new(desc),
            results: Vec::new(),
            cursor: 0,
        })
    }

    fn materialize(&mut self) -> DbResult<()> {
        let mut groups: HashMap<Option<Value>, GroupState> = HashMap::new();
        while self.child.has_next()? {
            let tuple = self.child.next()?;
            let key = match self.group_field {
                Some(g) => Some(tuple.value(g)?.clone()),
                None => None,
            };
            groups
                .entry(key)
                .or_default()
                .merge(tuple.value(self.agg_field)?);
        }

        self.results.clear();
        self.cursor = 0;
        for (key, state) in groups {
            let agg = Value::Int(state.result(self.op));
            let values = match key {
                Some(group) => vec![group, agg],
                None => vec![agg],
            };
            self.results
                .push(Tuple::from_values(self.desc.clone(), values)?);
        }
        Ok(())
    }
}

impl Operator for Aggregate {
    fn open(&mut self) -> DbResult<()> {
        self.child.open()?;
        self.materialize()
    }

    fn has_next(&mut self) -> DbResult<bool> {
        Ok(self.cursor < self.results.len())
    }

    fn next(&mut self) -> DbResult<Tuple> {
        let tuple = self
            .results
            .get(self.cursor)
            .cloned()
            .ok_or_else(|| DbError::NoSuchElement("aggregate exhausted".to_string()))?;
        self.cursor += 1;
        Ok(tuple)
    }

    fn rewind(&mut self) -> DbResult<()> {
        self.cursor = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.results.clear();
        self.cursor = 0;
        self.child.close();
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }
}
