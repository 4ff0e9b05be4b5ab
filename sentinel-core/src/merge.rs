//! Series merger: append, dedup and sort for keyed time-series stores.
//!
//! Two modes:
//! - `Incremental`: existing ++ incoming, duplicate keys collapse to the record
//!   merged last (incoming wins), then sort. Merging the same batch twice gives
//!   the same store as merging it once.
//! - `Full`: incoming replaces existing outright. This is the only way a store
//!   shrinks or rewrites history, and is used when a corporate action has
//!   invalidated previously adjusted values.
//!
//! Either way the result holds at most one record per key, in store order.

use crate::domain::{FinancialRow, PriceBar, SeriesRecord};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Replace the stored series with the incoming batch.
    Full,
    /// Append the incoming batch, newest value wins per key.
    Incremental,
}

/// Direction a store keeps its keys in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Prices are stored oldest first.
pub const PRICE_ORDER: SortOrder = SortOrder::Ascending;

/// Financial periods are stored latest first.
pub const FINANCIAL_ORDER: SortOrder = SortOrder::Descending;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("stored series is not strictly {order:?} at {date}: refusing to merge into a corrupt store")]
    UnorderedStore { date: NaiveDate, order: SortOrder },
}

/// Merge `incoming` into `existing`.
///
/// In `Incremental` mode `existing` must already satisfy the store invariant
/// (strictly ordered by key in `order`); a store that does not is rejected
/// rather than silently rewritten.
pub fn merge<R: SeriesRecord>(
    existing: &[R],
    incoming: Vec<R>,
    mode: MergeMode,
    order: SortOrder,
) -> Result<Vec<R>, MergeError> {
    match mode {
        MergeMode::Full => Ok(collapse(incoming, order)),
        MergeMode::Incremental => {
            check_store_order(existing, order)?;
            let combined = existing.iter().cloned().chain(incoming);
            Ok(collapse(combined, order))
        }
    }
}

/// Merge freshly fetched price bars into a price store.
pub fn merge_prices(
    existing: &[PriceBar],
    incoming: Vec<PriceBar>,
    mode: MergeMode,
) -> Result<Vec<PriceBar>, MergeError> {
    merge(existing, incoming, mode, PRICE_ORDER)
}

/// Merge financial rows, dropping periods with no reported line items first.
pub fn merge_financials(
    existing: &[FinancialRow],
    incoming: Vec<FinancialRow>,
    mode: MergeMode,
) -> Result<Vec<FinancialRow>, MergeError> {
    merge(existing, drop_empty_rows(incoming), mode, FINANCIAL_ORDER)
}

/// Remove rows where every metric is absent.
pub fn drop_empty_rows(rows: Vec<FinancialRow>) -> Vec<FinancialRow> {
    rows.into_iter().filter(|r| !r.is_empty()).collect()
}

/// Keep the last record seen per key, then order by key.
fn collapse<R: SeriesRecord>(records: impl IntoIterator<Item = R>, order: SortOrder) -> Vec<R> {
    let mut by_key: BTreeMap<NaiveDate, R> = BTreeMap::new();
    for record in records {
        by_key.insert(record.key(), record);
    }
    match order {
        SortOrder::Ascending => by_key.into_values().collect(),
        SortOrder::Descending => by_key.into_values().rev().collect(),
    }
}

fn check_store_order<R: SeriesRecord>(records: &[R], order: SortOrder) -> Result<(), MergeError> {
    for pair in records.windows(2) {
        let (a, b) = (pair[0].key(), pair[1].key());
        let ok = match order {
            SortOrder::Ascending => a < b,
            SortOrder::Descending => a > b,
        };
        if !ok {
            return Err(MergeError::UnorderedStore { date: b, order });
        }
    }
    Ok(())
}

/// True when `records` satisfies the store invariant for `order`.
pub fn is_canonical<R: SeriesRecord>(records: &[R], order: SortOrder) -> bool {
    check_store_order(records, order).is_ok()
}
