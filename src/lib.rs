//! # Intake Ledger
//!
//! Content-addressed intake for uploaded documents, with a rolling monthly
//! usage ledger.
//!
//! ## Core Concepts
//!
//! - **Content IDs**: SHA-256 of the submitted bytes, hex encoded
//! - **Records**: One JSON record per document, partitioned by ingestion day
//! - **Ledger**: Monthly usage totals, daily breakdown and a recent-activity window
//! - **Rollover**: The first update in a new calendar month resets the ledger
//!
//! ## Example
//!
//! ```ignore
//! use intake_ledger::{IntakeConfig, IntakeStore};
//!
//! let store = IntakeStore::open_or_create(IntakeConfig {
//!     root: "./uploads".into(),
//!     ..Default::default()
//! })?;
//!
//! let record = store.ingest(&std::fs::read("invoice.pdf")?)?;
//! println!("stored {}", record.content_id);
//!
//! let status = store.status();
//! ```

mod atomic;
pub mod clock;
pub mod error;
pub mod ledger;
pub mod records;
pub mod store;
pub mod types;

// Re-exports
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ErrorKind, IntakeError, Result};
pub use ledger::{LedgerStore, RecentEntry, RepairReport, UsageLedger, DEFAULT_RECENT_LIMIT};
pub use records::RecordStore;
pub use store::{HealthStatus, IntakeConfig, IntakeStore};
pub use types::*;
