use serde::Deserialize;

use crate::error::{DbError, DbResult};

pub const DEFAULT_PAGE_SIZE: usize = 4096;
pub const DEFAULT_BUFFER_PAGES: usize = 50;
pub const DEFAULT_NUM_HIST_BINS: usize = 100;
pub const DEFAULT_IO_COST_PER_PAGE: f64 = 1000.0;
pub const DEFAULT_LOCK_RETRY_QUANTUM_MS: u64 = 10;

/// Engine configuration. Every field has a default; embedders can also
/// deserialize it from a config file. The text field capacity is a
/// compile-time constant ([`crate::types::STRING_CAPACITY`]) because it
/// fixes the on-disk footprint of every schema.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Bytes per page. Must hold the slot bitmap plus at least one tuple
    /// slot of every table opened with it; the per-table check happens
    /// when the heap file opens.
    pub page_size: usize,
    /// Maximum number of cached pages.
    pub buffer_pages: usize,
    /// Histogram buckets per column for table statistics.
    pub num_hist_bins: usize,
    /// Cost charged per page read by the scan cost model.
    pub io_cost_per_page: f64,
    /// Sleep between lock retry attempts.
    pub lock_retry_quantum_ms: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            buffer_pages: DEFAULT_BUFFER_PAGES,
            num_hist_bins: DEFAULT_NUM_HIST_BINS,
            io_cost_per_page: DEFAULT_IO_COST_PER_PAGE,
            lock_retry_quantum_ms: DEFAULT_LOCK_RETRY_QUANTUM_MS,
        }
    }
}

impl DbConfig {
    pub fn validate(&self) -> DbResult<()> {
        if self.page_size == 0 {
            return Err(DbError::IllegalArgument(
                "page_size must be positive".to_string(),
            ));
        }
        if self.buffer_pages == 0 {
            return Err(DbError::IllegalArgument(
                "buffer_pages must be at least 1".to_string(),
            ));
        }
        if self.num_hist_bins == 0 {
            return Err(DbError::IllegalArgument(
                "num_hist_bins must be at least 1".to_string(),
            ));
        }
        if !self.io_cost_per_page.is_finite() || self.io_cost_per_page < 0.0 {
            return Err(DbError::IllegalArgument(
                "io_cost_per_page must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }
}
