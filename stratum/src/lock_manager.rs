//! Page-level locks under strict two-phase locking.
//!
//! A transaction acquires locks on demand and releases nothing until it
//! completes; `release_all` at commit/abort is the single release point in
//! the ordinary lifecycle. Waiters poll on a small quantum rather than
//! parking on a condvar, and a wait-for graph maintained under the same
//! mutex as the lock table decides deadlocks.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::transaction::TransactionId;
use crate::wait_graph::WaitForGraph;
use crate::PageId;

/// The two lock modes. Any number of transactions may share a page for
/// reading; a writer is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKind {
    Shared,
    Exclusive,
}

#[derive(Error, Debug)]
pub enum LockError {
    #[error("deadlock: {0} chosen as victim")]
    Deadlock(TransactionId),
}

#[derive(Debug, Default)]
struct LockState {
    tid_to_pids: HashMap<TransactionId, HashSet<PageId>>,
    pid_to_tids: HashMap<PageId, HashSet<TransactionId>>,
    kinds: HashMap<PageId, LockKind>,
    waits: WaitForGraph,
}

impl LockState {
    fn holds(&self, tid: TransactionId, pid: PageId) -> bool {
        self.tid_to_pids
            .get(&tid)
            .is_some_and(|pids| pids.contains(&pid))
    }

    fn holders(&self, pid: PageId) -> impl Iterator<Item = TransactionId> + '_ {
        self.pid_to_tids.get(&pid).into_iter().flatten().copied()
    }

    /// Is `tid` locked out of taking `pid` with `kind` right now?
    ///
    /// Shared is compatible with an absent or shared lock, and with any
    /// lock the transaction already holds itself. Exclusive is granted
    /// only to a sole holder (the upgrade case) or on an unlocked page.
    fn blocked(&self, tid: TransactionId, pid: PageId, kind: LockKind) -> bool {
        match kind {
            LockKind::Shared => {
                if self.holds(tid, pid) {
                    false
                } else {
                    self.kinds.get(&pid) == Some(&LockKind::Exclusive)
                }
            }
            LockKind::Exclusive => {
                let holder_count = self.pid_to_tids.get(&pid).map_or(0, |s| s.len());
                if self.holds(tid, pid) && holder_count == 1 {
                    false
                } else {
                    holder_count >= 1
                }
            }
        }
    }

    fn grant(&mut self, tid: TransactionId, pid: PageId, kind: LockKind) {
        // An exclusive grant upgrades the recorded kind; a shared grant by
        // a holder that already has exclusive must not downgrade it.
        let entry = self.kinds.entry(pid).or_insert(kind);
        if *entry != LockKind::Exclusive {
            *entry = kind;
        }
        self.tid_to_pids.entry(tid).or_default().insert(pid);
        self.pid_to_tids.entry(pid).or_default().insert(tid);
    }

    fn release(&mut self, tid: TransactionId, pid: PageId) {
        if !self.holds(tid, pid) {
            warn!(%tid, %pid, "release of a lock the transaction does not hold");
            return;
        }
        if let Some(holders) = self.pid_to_tids.get_mut(&pid) {
            holders.remove(&tid);
            if holders.is_empty() {
                self.pid_to_tids.remove(&pid);
                self.kinds.remove(&pid);
            }
        }
        if let Some(pids) = self.tid_to_pids.get_mut(&tid) {
            pids.remove(&pid);
            if pids.is_empty() {
                self.tid_to_pids.remove(&tid);
            }
        }
    }
}

/// Process-wide lock manager. All state sits behind one mutex; the
/// cycle detector therefore always observes edges and grants from the
/// same consistent snapshot.
#[derive(Debug)]
pub struct LockManager {
    state: Mutex<LockState>,
    retry_quantum: Duration,
}

impl LockManager {
    pub fn new(retry_quantum: Duration) -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            retry_quantum,
        }
    }

    /// Acquires `kind` on `pid` for `tid`, blocking until granted or until
    /// the wait-for graph shows a cycle through `tid`, in which case the
    /// request is withdrawn and `LockError::Deadlock` tells the caller to
    /// abort this transaction.
    pub fn acquire(
        &self,
        tid: TransactionId,
        pid: PageId,
        kind: LockKind,
    ) -> Result<(), LockError> {
        loop {
            {
                let mut state = self.lock_state();
                if !state.blocked(tid, pid, kind) {
                    state.grant(tid, pid, kind);
                    // Granted: tid no longer waits on anyone.
                    state.waits.remove_edges_to(tid);
                    return Ok(());
                }

                let holders: Vec<_> =
                    state.holders(pid).filter(|h| *h != tid).collect();
                let mut added = Vec::new();
                for holder in holders {
                    if state.waits.add_edge(holder, tid) {
                        added.push(holder);
                    }
                }
                if state.waits.on_cycle(tid) {
                    for holder in added {
                        state.waits.remove_edge(holder, tid);
                    }
                    warn!(%tid, %pid, "deadlock detected, aborting requester");
                    return Err(LockError::Deadlock(tid));
                }
                debug!(%tid, %pid, ?kind, "lock contended, waiting");
            }
            std::thread::sleep(self.retry_quantum);
        }
    }

    /// Releases whatever lock `tid` has on `pid`. Waiters are not woken;
    /// they notice on their next retry quantum.
    pub fn release(&self, tid: TransactionId, pid: PageId) {
        self.lock_state().release(tid, pid);
    }

    /// Releases every lock held by `tid` and removes it from the wait-for
    /// graph. After this returns, `holds(tid, _)` is false for every page.
    pub fn release_all(&self, tid: TransactionId) {
        let mut state = self.lock_state();
        let pids: Vec<_> = state
            .tid_to_pids
            .get(&tid)
            .map(|pids| pids.iter().copied().collect())
            .unwrap_or_default();
        for pid in pids {
            state.release(tid, pid);
        }
        state.waits.remove_node(tid);
    }

    pub fn holds(&self, tid: TransactionId, pid: PageId) -> bool {
        self.lock_state().holds(tid, pid)
    }

    /// Pages currently locked by `tid`.
    pub fn pages_locked_by(&self, tid: TransactionId) -> Vec<PageId> {
        self.lock_state()
            .tid_to_pids
            .get(&tid)
            .map(|pids| pids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// The recorded lock kind on a page, if any transaction holds it.
    pub fn kind_of(&self, pid: PageId) -> Option<LockKind> {
        self.lock_state().kinds.get(&pid).copied()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, LockState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
