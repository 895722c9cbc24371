use std::sync::atomic::{AtomicU64, Ordering};

/// An opaque 64-bit transaction id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub u64);

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tx{}", self.0)
    }
}

/// Allocates monotonically increasing transaction ids from a process-local
/// atomic counter. Transactions do not nest; a transaction's lifecycle is
/// `begin`, then reads and writes, then a single commit or abort through
/// the buffer pool.
#[derive(Debug, Default)]
pub struct TransactionManager {
    next_id: AtomicU64,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> TransactionId {
        TransactionId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}
