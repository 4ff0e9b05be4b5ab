//! Incremental fetch planning.
//!
//! Decides which entities a run touches and how much history each one needs:
//! a full refetch, a delta from the day after the last stored bar, or nothing.

use crate::data::{CorporateActionSource, DataError, PriceRequest};
use crate::domain::EntityRecord;
use crate::merge::MergeMode;
use crate::registry::Registry;
use chrono::{Datelike, Days, NaiveDate};
use tracing::{info, warn};

/// Stand-in date for entities that were never fetched (or carry garbage).
pub fn oldest_sentinel() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Pick up to `max_count` active entities, least recently price-updated first.
///
/// Never-fetched entities sort as the oldest possible date. The sort is
/// stable, so ties keep registry order.
pub fn select_batch(registry: &Registry, max_count: usize) -> Vec<&EntityRecord> {
    let sentinel = oldest_sentinel();
    let mut active: Vec<&EntityRecord> = registry.active().collect();
    active.sort_by_key(|e| e.last_price_update.unwrap_or(sentinel));
    active.truncate(max_count);
    active
}

/// What to request for one entity's price history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPlan {
    /// Re-obtain everything and overwrite the store.
    Full,
    /// Request bars from this date on and append.
    IncrementalFrom(NaiveDate),
    /// Stored history already reaches today.
    UpToDate,
}

impl FetchPlan {
    pub fn request(self) -> Option<PriceRequest> {
        match self {
            FetchPlan::Full => Some(PriceRequest::FullHistory),
            FetchPlan::IncrementalFrom(start) => Some(PriceRequest::Since(start)),
            FetchPlan::UpToDate => None,
        }
    }

    pub fn merge_mode(self) -> MergeMode {
        match self {
            FetchPlan::Full => MergeMode::Full,
            FetchPlan::IncrementalFrom(_) | FetchPlan::UpToDate => MergeMode::Incremental,
        }
    }
}

/// Decide the fetch plan.
///
/// A detected corporate action forces `Full` whatever the stored state:
/// a split or consolidation invalidates every previously adjusted value.
pub fn plan_fetch(
    last_known: Option<NaiveDate>,
    has_corporate_action: bool,
    today: NaiveDate,
) -> FetchPlan {
    if has_corporate_action {
        return FetchPlan::Full;
    }
    let Some(last) = last_known else {
        return FetchPlan::Full;
    };
    match last.checked_add_days(Days::new(1)) {
        Some(next) if next <= today => FetchPlan::IncrementalFrom(next),
        _ => FetchPlan::UpToDate,
    }
}

/// Outcome of a corporate-action check, kept explicit so the fail-open path
/// is visible at the call site.
#[derive(Debug)]
pub enum ActionCheck {
    /// Nothing stored yet; no check needed.
    NotChecked,
    Detected,
    NotDetected,
    /// The detector failed; treated as "no action" so the incremental fetch
    /// still goes ahead.
    FailedOpen(DataError),
}

impl ActionCheck {
    pub fn is_detected(&self) -> bool {
        matches!(self, ActionCheck::Detected)
    }
}

/// Ask the detector whether a split happened after `last_known`.
pub fn check_corporate_action(
    detector: &dyn CorporateActionSource,
    code: &str,
    last_known: Option<NaiveDate>,
) -> ActionCheck {
    let Some(since) = last_known else {
        return ActionCheck::NotChecked;
    };
    match detector.has_action(code, since) {
        Ok(true) => {
            info!(code, %since, "split/consolidation detected; scheduling full refetch");
            ActionCheck::Detected
        }
        Ok(false) => ActionCheck::NotDetected,
        Err(e) => {
            warn!(code, error = %e, "corporate-action check failed; assuming none");
            ActionCheck::FailedOpen(e)
        }
    }
}

/// Estimate the filing date of the latest annual report.
///
/// Reports are due three months after fiscal year end; the estimate is the
/// last day of that month, this year if it has already passed, otherwise the
/// previous year.
pub fn disclosure_target_date(today: NaiveDate, fiscal_month: u32) -> NaiveDate {
    let fiscal_month = fiscal_month.clamp(1, 12);
    let report_month = (fiscal_month + 3 - 1) % 12 + 1;
    let year = if today.month() > report_month {
        today.year()
    } else {
        today.year() - 1
    };
    last_day_of_month(year, report_month)
}

fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .unwrap_or_else(oldest_sentinel)
}
