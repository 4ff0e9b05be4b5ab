//! Listing files and the master sync job.
//!
//! A listing is a CSV export of the exchange universe. Both the English
//! column names used by our own exports and the exchange's Japanese headers
//! are accepted.

use crate::error::{ListingError, RunError};
use chrono::NaiveDate;
use csv::StringRecord;
use sentinel_core::registry::{clean_text, normalize_code, ListedEntity};
use sentinel_core::store::{DataLayout, MasterStore};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

const CODE: &[&str] = &["code", "コード"];
const NAME: &[&str] = &["name", "銘柄名", "名称"];
const MARKET: &[&str] = &["market_segment", "市場・商品区分"];
const SECTOR_33: &[&str] = &["sector_33", "33業種区分"];
const SECTOR_17: &[&str] = &["sector_17", "17業種区分"];

/// Index of the first header matching any alias.
pub(crate) fn find_column(headers: &StringRecord, aliases: &[&str]) -> Option<usize> {
    headers.iter().position(|h| {
        let h = h.trim_start_matches('\u{feff}').trim();
        aliases.iter().any(|a| h.eq_ignore_ascii_case(a))
    })
}

pub(crate) fn require_column(
    headers: &StringRecord,
    aliases: &'static [&'static str],
) -> Result<usize, ListingError> {
    find_column(headers, aliases).ok_or(ListingError::MissingColumn(aliases[0]))
}

/// Cleaned, non-empty cell value.
pub(crate) fn cell(record: &StringRecord, column: Option<usize>) -> Option<String> {
    let raw = record.get(column?)?;
    let text = clean_text(raw);
    (!text.is_empty()).then_some(text)
}

/// Parse a listing. Rows without a valid security code are dropped.
pub fn parse_listing<R: Read>(reader: R) -> Result<Vec<ListedEntity>, ListingError> {
    let mut csv = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = csv.headers()?.clone();

    let code_col = require_column(&headers, CODE)?;
    let name_col = require_column(&headers, NAME)?;
    let market_col = find_column(&headers, MARKET);
    let sector_33_col = find_column(&headers, SECTOR_33);
    let sector_17_col = find_column(&headers, SECTOR_17);

    let mut listed = Vec::new();
    let mut dropped = 0usize;
    for record in csv.records() {
        let record = record?;
        let Some(code) = record.get(code_col).and_then(normalize_code) else {
            dropped += 1;
            continue;
        };
        listed.push(ListedEntity {
            code,
            name: cell(&record, Some(name_col)),
            market_segment: cell(&record, market_col),
            sector_33: cell(&record, sector_33_col),
            sector_17: cell(&record, sector_17_col),
        });
    }
    if dropped > 0 {
        debug!(dropped, "listing rows without a security code");
    }
    Ok(listed)
}

/// Read and parse a listing file.
pub fn load_listing(path: &Path) -> Result<Vec<ListedEntity>, RunError> {
    let wrap = |source: ListingError| RunError::Listing {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(|e| wrap(e.into()))?;
    parse_listing(file).map_err(wrap)
}

/// Counts reported by [`sync_master`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterSyncReport {
    pub listed: usize,
    pub total: usize,
    pub active: usize,
    pub newly_listed: Vec<String>,
    pub deactivated: Vec<String>,
}

/// Reconcile the stored registry against `listing` and save it.
///
/// A missing master is treated as an empty one, which is how a new dataset
/// is bootstrapped.
pub fn sync_master(
    layout: &DataLayout,
    listing: &[ListedEntity],
    today: NaiveDate,
) -> Result<MasterSyncReport, RunError> {
    let master = MasterStore::new(layout);
    let before = master.load_or_empty()?;
    let after = before.reconcile(listing, Some(today));

    let previously_active: HashSet<&str> = before.active().map(|e| e.code.as_str()).collect();
    let newly_listed: Vec<String> = after
        .records()
        .iter()
        .filter(|e| before.get(&e.code).is_none())
        .map(|e| e.code.clone())
        .collect();
    let deactivated: Vec<String> = after
        .records()
        .iter()
        .filter(|e| !e.is_active && previously_active.contains(e.code.as_str()))
        .map(|e| e.code.clone())
        .collect();

    master.save(&after)?;

    let report = MasterSyncReport {
        listed: listing.len(),
        total: after.len(),
        active: after.active_count(),
        newly_listed,
        deactivated,
    };
    info!(
        total = report.total,
        active = report.active,
        new = report.newly_listed.len(),
        deactivated = report.deactivated.len(),
        "master synced"
    );
    Ok(report)
}
