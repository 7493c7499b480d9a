//! The usage ledger document and its update rules.

use crate::types::{day_key, iso_timestamp, month_key, ContentId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default size of the recent-activity window.
pub const DEFAULT_RECENT_LIMIT: usize = 5;

/// One entry of the recent-activity window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentEntry {
    #[serde(alias = "ts")]
    pub timestamp: String,

    #[serde(rename = "contentId", alias = "hash")]
    pub content_id: ContentId,

    pub status: String,

    #[serde(rename = "tokensUsed")]
    pub tokens_used: u64,
}

/// Usage accounting for one calendar month.
///
/// `daily` only ever holds days of `month`, and `recent` is ordered
/// newest first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageLedger {
    /// Month being accounted (`YYYY-MM`).
    pub month: String,

    pub total_tokens: u64,

    /// Usage per day (`YYYY-MM-DD`) within `month`.
    pub daily: BTreeMap<String, u64>,

    /// Ingestions recorded since `month` began.
    pub processed_count: u64,

    pub recent: Vec<RecentEntry>,
}

/// Outcome of [`UsageLedger::repair`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub dropped_days: Vec<String>,
    pub dropped_recent: usize,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        self.dropped_days.is_empty() && self.dropped_recent == 0
    }
}

impl UsageLedger {
    /// Zero state for a month.
    pub fn fresh(month: impl Into<String>) -> Self {
        Self {
            month: month.into(),
            total_tokens: 0,
            daily: BTreeMap::new(),
            processed_count: 0,
            recent: Vec::new(),
        }
    }

    /// Zero state for the month containing `now`.
    pub fn fresh_at(now: DateTime<Utc>) -> Self {
        Self::fresh(month_key(now))
    }

    /// Reset to the zero state if `month` differs from the stored month.
    ///
    /// Returns true when a rollover happened.
    pub fn roll_over(&mut self, month: &str) -> bool {
        if self.month == month {
            return false;
        }
        *self = Self::fresh(month);
        true
    }

    /// Apply one ingestion outcome at `now`.
    pub fn record(
        &mut self,
        now: DateTime<Utc>,
        tokens_used: u64,
        content_id: ContentId,
        status: &str,
        recent_limit: usize,
    ) {
        self.roll_over(&month_key(now));

        // Counters pin at u64::MAX rather than wrap.
        self.total_tokens = self.total_tokens.saturating_add(tokens_used);
        let today = self.daily.entry(day_key(now.date_naive())).or_insert(0);
        *today = today.saturating_add(tokens_used);
        self.processed_count = self.processed_count.saturating_add(1);

        self.recent.insert(
            0,
            RecentEntry {
                timestamp: iso_timestamp(now),
                content_id,
                status: status.to_string(),
                tokens_used,
            },
        );
        self.recent.truncate(recent_limit);
    }

    /// Bring a parsed document back within the ledger invariants.
    ///
    /// Fails if `month` itself is not a valid `YYYY-MM`, since nothing else
    /// can be trusted then.
    pub fn repair(&mut self, recent_limit: usize) -> Result<RepairReport, String> {
        let first_of_month = NaiveDate::parse_from_str(&format!("{}-01", self.month), "%Y-%m-%d")
            .map_err(|_| format!("invalid month {:?}", self.month))?;
        if first_of_month.format("%Y-%m").to_string() != self.month {
            return Err(format!("invalid month {:?}", self.month));
        }

        let mut report = RepairReport::default();

        let month = self.month.clone();
        self.daily.retain(|day, _| {
            let keep = NaiveDate::parse_from_str(day, "%Y-%m-%d")
                .map(|d| d.format("%Y-%m").to_string() == month)
                .unwrap_or(false);
            if !keep {
                report.dropped_days.push(day.clone());
            }
            keep
        });

        if self.recent.len() > recent_limit {
            report.dropped_recent = self.recent.len() - recent_limit;
            self.recent.truncate(recent_limit);
        }

        Ok(report)
    }
}
