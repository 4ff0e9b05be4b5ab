//! Keyed time-series records: daily price bars and quarterly financial rows.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A record that lives in a per-entity series store, keyed by date.
pub trait SeriesRecord: Clone {
    fn key(&self) -> NaiveDate;
}

/// Daily OHLCV bar, split-adjusted by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl SeriesRecord for PriceBar {
    fn key(&self) -> NaiveDate {
        self.date
    }
}

/// One reporting period of provider-defined financial line items.
///
/// `date` is the period end. A metric mapped to `None` was not reported.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FinancialRow {
    pub date: NaiveDate,
    pub metrics: BTreeMap<String, Option<f64>>,
}

impl FinancialRow {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            metrics: BTreeMap::new(),
        }
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: Option<f64>) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    /// True when no line item carries a value for this period.
    pub fn is_empty(&self) -> bool {
        self.metrics
            .values()
            .all(|v| v.map_or(true, |x| x.is_nan()))
    }
}

impl SeriesRecord for FinancialRow {
    fn key(&self) -> NaiveDate {
        self.date
    }
}
