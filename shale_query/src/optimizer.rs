//! Table statistics and join ordering.
//!
//! [`TableStats`] summarizes one table with per-column fixed-width
//! histograms and feeds the scan cost model; the join-order planner turns
//! those numbers into a left-deep execution order.

use std::sync::Arc;

use tracing::debug;

use stratum::buffer_pool::BufferPool;
use stratum::catalog::Catalog;
use stratum::error::{DbError, DbResult};
use stratum::transaction::TransactionId;
use stratum::types::{DataType, Value};

use crate::predicate::Op;

pub mod histogram;
pub mod join_order;

pub use histogram::{IntHistogram, StringHistogram};
pub use join_order::{plan_left_deep, JoinEdge, JoinRelation};

enum ColumnHistogram {
    Int(IntHistogram),
    Text(StringHistogram),
}

/// Statistics over one table: tuple count, page count, and one histogram
/// per column. Construction scans the table twice through the buffer
/// pool with read intent: once to find each integer column's range, once
/// to populate the histograms.
pub struct TableStats {
    num_tuples: usize,
    num_pages: i32,
    io_cost_per_page: f64,
    histograms: Vec<ColumnHistogram>,
}

impl TableStats {
    pub fn build(
        bp: &Arc<BufferPool>,
        catalog: &Catalog,
        tid: TransactionId,
        table_id: i32,
        io_cost_per_page: f64,
        num_hist_bins: usize,
    ) -> DbResult<Self> {
        let file = catalog.get_table(table_id)?;
        let desc = file.tuple_desc().clone();
        let num_fields = desc.num_fields();

        let mut mins = vec![i32::MAX; num_fields];
        let mut maxs = vec![i32::MIN; num_fields];
        let mut num_tuples = 0usize;

        let mut scan = file.iter(tid, Arc::clone(bp));
        scan.open()?;
        while scan.has_next()? {
            let tuple = scan.next()?;
            num_tuples += 1;
            for i in 0..num_fields {
                if let Value::Int(v) = tuple.value(i)? {
                    mins[i] = mins[i].min(*v);
                    maxs[i] = maxs[i].max(*v);
                }
            }
        }

        let mut histograms = Vec::with_capacity(num_fields);
        for i in 0..num_fields {
            match desc.field_type(i)? {
                DataType::Int => {
                    let (min, max) = if mins[i] <= maxs[i] {
                        (mins[i], maxs[i])
                    } else {
                        (0, 0)
                    };
                    histograms.push(ColumnHistogram::Int(IntHistogram::new(
                        num_hist_bins,
                        min,
                        max,
                    )));
                }
                DataType::Text => {
                    histograms.push(ColumnHistogram::Text(StringHistogram::new(num_hist_bins)));
                }
            }
        }

        scan.rewind()?;
        while scan.has_next()? {
            let tuple = scan.next()?;
            for (i, histogram) in histograms.iter_mut().enumerate() {
                match (histogram, tuple.value(i)?) {
                    (ColumnHistogram::Int(h), Value::Int(v)) => h.add_value(*v),
                    (ColumnHistogram::Text(h), Value::Text(s)) => h.add_value(s),
                    _ => {
                        return Err(DbError::SchemaMismatch(format!(
                            "stored value of field {} does not match the schema",
                            i
                        )))
                    }
                }
            }
        }
        scan.close();

        let num_pages = file.num_pages()?;
        debug!(table_id, num_tuples, num_pages, "table statistics built");
        Ok(Self {
            num_tuples,
            num_pages,
            io_cost_per_page,
            histograms,
        })
    }

    /// Cost of scanning the whole table once: every page is charged the
    /// configured I/O cost, however full it is.
    pub fn scan_cost(&self) -> f64 {
        self.num_pages as f64 * self.io_cost_per_page
    }

    /// Expected number of tuples surviving a predicate of the given
    /// selectivity.
    pub fn cardinality(&self, selectivity: f64) -> usize {
        (self.num_tuples as f64 * selectivity).round() as usize
    }

    pub fn total_tuples(&self) -> usize {
        self.num_tuples
    }

    pub fn num_pages(&self) -> i32 {
        self.num_pages
    }

    /// Estimated fraction of tuples satisfying `field op constant`.
    pub fn selectivity(&self, field: usize, op: Op, constant: &Value) -> DbResult<f64> {
        let histogram = self
            .histograms
            .get(field)
            .ok_or_else(|| DbError::NoSuchElement(format!("field index {}", field)))?;
        match (histogram, constant) {
            (ColumnHistogram::Int(h), Value::Int(v)) => Ok(h.estimate(op, *v)),
            (ColumnHistogram::Text(h), Value::Text(s)) => Ok(h.estimate(op, s)),
            _ => Err(DbError::SchemaMismatch(format!(
                "constant type {} does not match field {}",
                constant.data_type(),
                field
            ))),
        }
    }
}
