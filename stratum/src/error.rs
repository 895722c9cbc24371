use thiserror::Error;

use crate::lock_manager::LockError;
use crate::PageId;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Error, Debug)]
pub enum DbError {
    /// The deadlock detector chose this transaction as the victim. The
    /// caller must unwind to the transaction boundary and abort.
    #[error("transaction aborted by the deadlock detector")]
    TransactionAborted,

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    /// Every cached page is dirty under an in-flight transaction, so no
    /// victim can be evicted without stealing.
    #[error("buffer pool exhausted: no clean page to evict")]
    CachePressure,

    #[error("page {0} has no free slot")]
    PageFull(PageId),

    #[error("tuple not found on page {0}")]
    TupleNotFound(PageId),

    #[error("no table with id {0}")]
    TableNotFound(i32),

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("no such element: {0}")]
    NoSuchElement(String),

    #[error("invalid argument: {0}")]
    IllegalArgument(String),

    #[error("corrupt page image: {0}")]
    Corrupt(String),
}

impl From<LockError> for DbError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Deadlock(_) => DbError::TransactionAborted,
        }
    }
}
