//! Record storage implementation.

use crate::atomic::write_atomic;
use crate::error::{IntakeError, Result};
use crate::types::{day_key, ContentId, DocumentRecord};
use chrono::NaiveDate;
use lru::LruCache;
use parking_lot::Mutex;
use std::fs;
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extension of record files.
const RECORD_EXT: &str = "json";

/// Content-addressed, date-partitioned record storage.
pub struct RecordStore {
    /// Base directory holding one partition per day.
    path: PathBuf,

    /// LRU cache for recently written or read records.
    cache: Mutex<LruCache<(NaiveDate, ContentId), DocumentRecord>>,
}

impl RecordStore {
    /// Create a record store rooted at the given path.
    pub fn new(path: impl AsRef<Path>, cache_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path)?;

        let cache_size = NonZeroUsize::new(cache_size.max(1)).unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            path,
            cache: Mutex::new(LruCache::new(cache_size)),
        })
    }

    /// Persist a record under `(date, record.content_id)`, returning its path.
    ///
    /// An existing record at the same key is replaced. The write is atomic:
    /// a failure never leaves a partial file under the final name.
    pub fn put(&self, date: NaiveDate, record: &DocumentRecord) -> Result<PathBuf> {
        let content_id = record.content_id;
        let storage_err = |source: io::Error| IntakeError::StorageWrite { content_id, source };

        let partition = self.partition_path(date);
        fs::create_dir_all(&partition).map_err(storage_err)?;

        let data = serde_json::to_vec_pretty(record).map_err(|e| storage_err(e.into()))?;
        let record_path = self.record_path(date, &content_id);
        write_atomic(&record_path, &data).map_err(storage_err)?;

        debug!(content_id = %content_id, path = %record_path.display(), "record written");

        self.cache.lock().put((date, content_id), record.clone());

        Ok(record_path)
    }

    /// Get a record by day and content identifier.
    pub fn get(&self, date: NaiveDate, content_id: &ContentId) -> Result<Option<DocumentRecord>> {
        if let Some(cached) = self.cache.lock().get(&(date, *content_id)).cloned() {
            return Ok(Some(cached));
        }

        let data = match fs::read(self.record_path(date, content_id)) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let record: DocumentRecord = serde_json::from_slice(&data).map_err(|e| {
            IntakeError::InvalidFormat(format!("record {} on {}: {}", content_id, date, e))
        })?;

        self.cache.lock().put((date, *content_id), record.clone());

        Ok(Some(record))
    }

    /// Check if a record exists on disk.
    ///
    /// Records are plain files that can be removed underneath the store, so
    /// the cache is never trusted here; a stale entry is evicted.
    pub fn exists(&self, date: NaiveDate, content_id: &ContentId) -> bool {
        let present = self.record_path(date, content_id).exists();
        if !present {
            self.cache.lock().pop(&(date, *content_id));
        }
        present
    }

    /// List the content identifiers stored for one day.
    pub fn list(&self, date: NaiveDate) -> Result<Vec<ContentId>> {
        let partition = self.partition_path(date);
        let entries = match fs::read_dir(&partition) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXT) {
                continue;
            }
            let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned());
            if let Some(Ok(id)) = stem.map(|s| ContentId::from_hex(&s)) {
                ids.push(id);
            }
        }

        ids.sort_by_key(|id| id.0);
        Ok(ids)
    }

    /// List the days that have a partition, oldest first.
    pub fn dates(&self) -> Result<Vec<NaiveDate>> {
        let mut dates = Vec::new();

        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            if let Ok(date) = NaiveDate::parse_from_str(&name.to_string_lossy(), "%Y-%m-%d") {
                dates.push(date);
            }
        }

        dates.sort();
        Ok(dates)
    }

    /// Get the partition directory for a day.
    fn partition_path(&self, date: NaiveDate) -> PathBuf {
        self.path.join(day_key(date))
    }

    /// Get the full path for a record.
    fn record_path(&self, date: NaiveDate, content_id: &ContentId) -> PathBuf {
        self.partition_path(date)
            .join(format!("{}.{}", content_id.to_hex(), RECORD_EXT))
    }
}
