//! Date-partitioned record storage.
//!
//! Document records live at `<json>/<YYYY-MM-DD>/<contentId>.json`: one
//! directory per ingestion day, keyed by content identifier inside it.

mod storage;

pub use storage::RecordStore;
