//! Durable storage for the usage ledger.

use super::usage::UsageLedger;
use crate::atomic::write_atomic;
use crate::clock::Clock;
use crate::error::{IntakeError, Result};
use crate::types::{month_key, ContentId};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Owner of the single ledger file.
///
/// Updates are serialized by an internal lock held across the whole
/// load, modify and persist cycle, so concurrent callers never lose
/// each other's updates.
pub struct LedgerStore {
    /// Path to the ledger document.
    path: PathBuf,

    clock: Arc<dyn Clock>,

    /// Maximum entries kept in the recent-activity window.
    recent_limit: usize,

    /// Lock for read-modify-write cycles.
    write_lock: Mutex<()>,
}

impl LedgerStore {
    pub fn new(path: impl AsRef<Path>, clock: Arc<dyn Clock>, recent_limit: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            clock,
            recent_limit,
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the ledger document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the ledger with a zero state for the current month if absent.
    ///
    /// Returns true when a new document was written. An existing document is
    /// left alone, even if unreadable; the next update recovers it.
    pub fn initialize(&self) -> Result<bool> {
        let _lock = self.write_lock.lock();

        if self.path.exists() {
            return Ok(false);
        }

        let ledger = UsageLedger::fresh_at(self.clock.now());
        self.persist(&ledger)
            .map_err(|source| IntakeError::LedgerUpdate {
                content_id: None,
                source,
            })?;

        info!(path = %self.path.display(), month = %ledger.month, "usage ledger created");
        Ok(true)
    }

    /// Read the ledger without modifying it.
    ///
    /// Documents that parse but break an invariant are repaired in memory.
    pub fn load(&self) -> Result<UsageLedger> {
        let data = fs::read(&self.path)?;

        let mut ledger: UsageLedger = serde_json::from_slice(&data)
            .map_err(|e| IntakeError::LedgerCorrupt(e.to_string()))?;

        let report = ledger
            .repair(self.recent_limit)
            .map_err(IntakeError::LedgerCorrupt)?;
        if !report.is_clean() {
            warn!(
                dropped_days = ?report.dropped_days,
                dropped_recent = report.dropped_recent,
                "usage ledger repaired"
            );
        }

        Ok(ledger)
    }

    /// Record one ingestion outcome and return the updated ledger.
    ///
    /// An unreadable or corrupt ledger is replaced by a zero state for the
    /// current month instead of failing. Only a failed write is an error.
    pub fn record_usage(
        &self,
        tokens_used: u64,
        content_id: ContentId,
        status: &str,
    ) -> Result<UsageLedger> {
        self.record_usage_at(self.clock.now(), tokens_used, content_id, status)
    }

    /// [`record_usage`](Self::record_usage) with the instant already read,
    /// so a caller can date its record and the ledger entry identically.
    pub(crate) fn record_usage_at(
        &self,
        now: DateTime<Utc>,
        tokens_used: u64,
        content_id: ContentId,
        status: &str,
    ) -> Result<UsageLedger> {
        let _lock = self.write_lock.lock();

        let month = month_key(now);

        let mut ledger = match self.load() {
            Ok(ledger) => ledger,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "usage ledger unreadable; reinitializing");
                UsageLedger::fresh(month.clone())
            }
        };

        if ledger.month != month {
            info!(from = %ledger.month, to = %month, "usage ledger rolled over");
        }
        ledger.record(now, tokens_used, content_id, status, self.recent_limit);

        self.persist(&ledger)
            .map_err(|source| IntakeError::LedgerUpdate {
                content_id: Some(content_id),
                source,
            })?;

        debug!(
            content_id = %content_id,
            processed_count = ledger.processed_count,
            total_tokens = ledger.total_tokens,
            "usage recorded"
        );

        Ok(ledger)
    }

    /// Overwrite the whole document.
    fn persist(&self, ledger: &UsageLedger) -> std::io::Result<()> {
        let data = serde_json::to_vec_pretty(ledger)?;
        write_atomic(&self.path, &data)
    }
}
