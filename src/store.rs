//! Main IntakeStore tying the record store and usage ledger together.

use crate::clock::{Clock, SystemClock};
use crate::error::{IntakeError, Result};
use crate::ledger::{LedgerStore, UsageLedger, DEFAULT_RECENT_LIMIT};
use crate::records::RecordStore;
use crate::types::{ContentId, DocumentRecord};
use chrono::NaiveDate;
use fs2::FileExt;
use serde::Serialize;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

/// Status written to the ledger for a successful ingestion.
const STATUS_OK: &str = "ok";

/// Token usage reported per ingestion. Documents are not metered yet.
const UNMETERED_TOKENS: u64 = 0;

/// Store configuration.
#[derive(Clone, Debug)]
pub struct IntakeConfig {
    /// Base directory holding `json/` and `usage.json`.
    pub root: PathBuf,

    /// Whether to create the store if it doesn't exist.
    pub create_if_missing: bool,

    /// Entries kept in the ledger's recent-activity window.
    pub recent_limit: usize,

    /// Record cache size (number of records).
    pub record_cache_size: usize,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./uploads"),
            create_if_missing: true,
            recent_limit: DEFAULT_RECENT_LIMIT,
            record_cache_size: 256,
        }
    }
}

/// Health snapshot. Reading it never modifies the ledger.
#[derive(Clone, Debug, Serialize)]
pub struct HealthStatus {
    pub online: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger: Option<UsageLedger>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The document intake store.
///
/// One instance owns a root directory for the life of the process:
/// - `json/<YYYY-MM-DD>/<contentId>.json` document records
/// - `usage.json` the usage ledger
///
/// The instance is `Send + Sync`; share it behind an `Arc` to ingest from
/// several threads.
pub struct IntakeStore {
    /// Store configuration.
    config: IntakeConfig,

    /// Lock file for exclusive access.
    _lock_file: File,

    clock: Arc<dyn Clock>,

    records: RecordStore,

    ledger: LedgerStore,
}

impl IntakeStore {
    /// Open an existing store or create a new one.
    pub fn open_or_create(config: IntakeConfig) -> Result<Self> {
        Self::open_or_create_with_clock(config, Arc::new(SystemClock))
    }

    /// [`open_or_create`](Self::open_or_create) with an explicit time source.
    pub fn open_or_create_with_clock(config: IntakeConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        if config.root.is_dir() {
            Self::open_with_clock(config, clock)
        } else if config.create_if_missing {
            Self::create_with_clock(config, clock)
        } else {
            Err(IntakeError::NotInitialized)
        }
    }

    /// Create a new store.
    pub fn create(config: IntakeConfig) -> Result<Self> {
        Self::create_with_clock(config, Arc::new(SystemClock))
    }

    pub fn create_with_clock(config: IntakeConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        fs::create_dir_all(&config.root)?;
        Self::start(config, clock)
    }

    /// Open an existing store.
    pub fn open(config: IntakeConfig) -> Result<Self> {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    pub fn open_with_clock(config: IntakeConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        if !config.root.is_dir() {
            return Err(IntakeError::NotInitialized);
        }
        Self::start(config, clock)
    }

    fn start(config: IntakeConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let lock_file = Self::acquire_lock(&config.root)?;

        let records = RecordStore::new(config.root.join("json"), config.record_cache_size)?;
        let ledger = LedgerStore::new(
            config.root.join("usage.json"),
            Arc::clone(&clock),
            config.recent_limit,
        );
        ledger.initialize()?;

        info!(root = %config.root.display(), "intake store opened");

        Ok(Self {
            config,
            _lock_file: lock_file,
            clock,
            records,
            ledger,
        })
    }

    /// Store configuration.
    pub fn config(&self) -> &IntakeConfig {
        &self.config
    }

    // --- Ingestion ---

    /// Ingest one document.
    ///
    /// Hashes the buffer, writes its record under today's partition, then
    /// records the outcome in the usage ledger. An empty buffer is rejected
    /// before anything is written. A `LedgerUpdate` error means the record
    /// itself was persisted but accounting did not complete.
    pub fn ingest(&self, buffer: &[u8]) -> Result<DocumentRecord> {
        if buffer.is_empty() {
            return Err(IntakeError::InvalidInput("document is empty".into()));
        }

        let now = self.clock.now();
        let content_id = ContentId::from_bytes(buffer);
        let record = DocumentRecord::submitted(content_id, now);

        self.records
            .put(now.date_naive(), &record)
            .inspect_err(|e| {
                error!(content_id = %content_id, operation = "put_record", error = %e, "ingestion failed");
            })?;

        self.ledger
            .record_usage_at(now, UNMETERED_TOKENS, content_id, STATUS_OK)
            .inspect_err(|e| {
                error!(content_id = %content_id, operation = "record_usage", error = %e, "usage accounting failed");
            })?;

        Ok(record)
    }

    // --- Records ---

    /// Get a record by ingestion day and content identifier.
    pub fn record(&self, date: NaiveDate, content_id: &ContentId) -> Result<Option<DocumentRecord>> {
        self.records.get(date, content_id)
    }

    /// Content identifiers ingested on a day.
    pub fn records_on(&self, date: NaiveDate) -> Result<Vec<ContentId>> {
        self.records.list(date)
    }

    /// Days that have at least one record, oldest first.
    pub fn dates(&self) -> Result<Vec<NaiveDate>> {
        self.records.dates()
    }

    // --- Ledger ---

    /// Current ledger contents.
    pub fn ledger(&self) -> Result<UsageLedger> {
        self.ledger.load()
    }

    /// Health snapshot for reporting.
    pub fn status(&self) -> HealthStatus {
        match self.ledger.load() {
            Ok(ledger) => HealthStatus {
                online: true,
                ledger: Some(ledger),
                error: None,
            },
            Err(IntakeError::Io(e)) if e.kind() == io::ErrorKind::NotFound => HealthStatus {
                online: true,
                ledger: None,
                error: Some("usage ledger not found".into()),
            },
            Err(e) => HealthStatus {
                online: true,
                ledger: None,
                error: Some(e.to_string()),
            },
        }
    }

    // --- Private Helpers ---

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_path = path.join("LOCK");
        let lock_file = File::create(lock_path)?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| IntakeError::Locked)?;

        Ok(lock_file)
    }
}
