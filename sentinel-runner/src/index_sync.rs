//! Index constituent sync.
//!
//! Loads an observed constituent list, diffs it against the membership log
//! and appends the JOIN/LEAVE transitions.

use crate::error::{ListingError, RunError};
use crate::universe::{cell, find_column, require_column};
use chrono::NaiveDate;
use sentinel_core::domain::EventType;
use sentinel_core::registry::normalize_code;
use sentinel_core::store::{CheckpointStore, DataLayout, MembershipStore};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

const CODE: &[&str] = &["code", "コード"];
const NAME: &[&str] = &["name", "銘柄名", "名称"];

/// Index publishers append copyright notices as trailing rows.
const NOTICE_MARKERS: &[&str] = &["著作物", "複写", "複製", "転載", "copyright"];

fn is_notice(name: &str) -> bool {
    let lower = name.to_lowercase();
    NOTICE_MARKERS.iter().any(|m| lower.contains(m))
}

/// Parse a constituent list into normalized codes.
pub fn parse_constituents<R: Read>(reader: R) -> Result<BTreeSet<String>, ListingError> {
    let mut csv = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = csv.headers()?.clone();
    let code_col = require_column(&headers, CODE)?;
    let name_col = find_column(&headers, NAME);

    let mut codes = BTreeSet::new();
    for record in csv.records() {
        let record = record?;
        if cell(&record, name_col).is_some_and(|n| is_notice(&n)) {
            continue;
        }
        match record.get(code_col).and_then(normalize_code) {
            Some(code) => {
                codes.insert(code);
            }
            None => debug!(row = ?record, "skipping constituent row without a code"),
        }
    }
    Ok(codes)
}

pub fn load_constituents(path: &Path) -> Result<BTreeSet<String>, RunError> {
    let wrap = |source: ListingError| RunError::Listing {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(|e| wrap(e.into()))?;
    parse_constituents(file).map_err(wrap)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSyncReport {
    pub index_name: String,
    pub observed: usize,
    pub joined: Vec<String>,
    pub left: Vec<String>,
}

/// Checkpoint name recorded after a sync of `index_name`.
pub fn index_job(index_name: &str) -> String {
    format!("index:{index_name}")
}

/// Record `observed` as the membership of `index_name` on `today`.
pub fn sync_index(
    layout: &DataLayout,
    observed: &BTreeSet<String>,
    index_name: &str,
    today: NaiveDate,
) -> Result<IndexSyncReport, RunError> {
    let store = MembershipStore::new(layout);
    let log = store.load()?;
    let events = log.diff(observed, index_name, today);
    store.append(&events)?;

    if !observed.is_empty() {
        CheckpointStore::new(layout).record(&index_job(index_name), today)?;
    }

    let (joined, left): (Vec<_>, Vec<_>) = events
        .iter()
        .partition(|e| e.event_type == EventType::Join);
    let report = IndexSyncReport {
        index_name: index_name.to_string(),
        observed: observed.len(),
        joined: joined.into_iter().map(|e| e.code.clone()).collect(),
        left: left.into_iter().map(|e| e.code.clone()).collect(),
    };
    info!(
        index = index_name,
        observed = report.observed,
        joined = report.joined.len(),
        left = report.left.len(),
        "index membership synced"
    );
    Ok(report)
}
