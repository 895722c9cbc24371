//! The pull-based operator pipeline.
//!
//! Operators compose into a tree built at construction time; `open`
//! propagates to children before any tuple is pulled, and the consumer
//! drives the tree through repeated `has_next`/`next` calls. Operators
//! never block on their own: any waiting happens inside a page fetch in
//! the buffer pool. Errors bubble to the caller unchanged, so a
//! `TransactionAborted` from a deadlocked lock acquisition unwinds the
//! whole tree.

use stratum::error::DbResult;
use stratum::schema::TupleDesc;
use stratum::tuple::Tuple;

mod dml;
mod join;
mod pipeline;
mod scan;

pub use dml::{Delete, Insert};
pub use join::Join;
pub use pipeline::Filter;
pub use scan::SeqScan;

/// The pull-iterator contract shared by every operator.
pub trait Operator {
    /// Prepares the operator (and its children) for iteration. Idempotent
    /// after `close`.
    fn open(&mut self) -> DbResult<()>;

    /// Whether another tuple is available.
    fn has_next(&mut self) -> DbResult<bool>;

    /// The next tuple. Calling past exhaustion is `NoSuchElement`.
    fn next(&mut self) -> DbResult<Tuple>;

    /// Restarts iteration from the beginning.
    fn rewind(&mut self) -> DbResult<()>;

    /// Releases operator-local state.
    fn close(&mut self);

    /// The schema of the tuples this operator emits.
    fn tuple_desc(&self) -> &TupleDesc;
}
