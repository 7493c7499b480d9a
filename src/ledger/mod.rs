//! Rolling monthly usage ledger.
//!
//! A single JSON document accounts tokens and ingestions for the current
//! calendar month, with a per-day breakdown and a short recent-activity
//! window. The first update in a new month resets it.

mod store;
mod usage;

pub use store::LedgerStore;
pub use usage::{RecentEntry, RepairReport, UsageLedger, DEFAULT_RECENT_LIMIT};
