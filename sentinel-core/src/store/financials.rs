//! Per-entity quarterly financials: `{code}/financials.parquet`.
//!
//! Columns are `date` plus one nullable Float64 column per metric name seen in
//! any row; the metric set is whatever the provider reported.

use super::prices::{date_column, read_dates, read_parquet};
use super::{write_atomically, DataLayout, StoreError};
use crate::domain::FinancialRow;
use polars::prelude::*;
use std::collections::BTreeSet;
use std::path::Path;

pub struct FinancialsStore {
    layout: DataLayout,
}

impl FinancialsStore {
    pub fn new(layout: DataLayout) -> Self {
        Self { layout }
    }

    /// Stored rows in file order. A missing file is an empty series.
    pub fn load(&self, code: &str) -> Result<Vec<FinancialRow>, StoreError> {
        let path = self.layout.financials(code);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let df = read_parquet(&path)?;
        dataframe_to_rows(&df, &path)
    }

    pub fn write(&self, code: &str, rows: &[FinancialRow]) -> Result<(), StoreError> {
        let path = self.layout.financials(code);
        if rows.is_empty() {
            return Err(StoreError::EmptySeries { path });
        }
        let mut df = rows_to_dataframe(rows, &path)?;
        write_atomically(&path, |file| {
            ParquetWriter::new(file)
                .finish(&mut df)
                .map(|_| ())
                .map_err(|e| StoreError::parquet(&path, "write", e))
        })
    }
}

fn rows_to_dataframe(rows: &[FinancialRow], path: &Path) -> Result<DataFrame, StoreError> {
    let metrics: BTreeSet<&str> = rows
        .iter()
        .flat_map(|r| r.metrics.keys().map(String::as_str))
        .collect();

    let mut columns = Vec::with_capacity(metrics.len() + 1);
    columns.push(date_column(rows.iter().map(|r| r.date), path)?);
    for name in metrics {
        let values: Vec<Option<f64>> = rows
            .iter()
            .map(|r| r.metrics.get(name).copied().flatten().filter(|v| !v.is_nan()))
            .collect();
        columns.push(Column::new(name.into(), values));
    }

    DataFrame::new(columns).map_err(|e| StoreError::parquet(path, "dataframe creation", e))
}

fn dataframe_to_rows(df: &DataFrame, path: &Path) -> Result<Vec<FinancialRow>, StoreError> {
    let dates = read_dates(df, path)?;
    let mut rows: Vec<FinancialRow> = dates.into_iter().map(FinancialRow::new).collect();

    for column in df.get_columns() {
        let name = column.name().to_string();
        if name == "date" {
            continue;
        }
        let values = column
            .cast(&DataType::Float64)
            .and_then(|c| c.f64().cloned())
            .map_err(|e| StoreError::parquet(path, &name, e))?;
        for (i, row) in rows.iter_mut().enumerate() {
            row.metrics.insert(name.clone(), values.get(i));
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn missing_store_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FinancialsStore::new(DataLayout::new(dir.path()));
        assert!(store.load("7203.T").unwrap().is_empty());
    }

    #[test]
    fn sparse_metrics_roundtrip_as_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let store = FinancialsStore::new(DataLayout::new(dir.path()));
        let rows = vec![
            FinancialRow::new(d(2024, 3, 31))
                .with_metric("TotalRevenue", Some(1.0e12))
                .with_metric("NetIncome", Some(2.5e11)),
            FinancialRow::new(d(2023, 12, 31)).with_metric("TotalRevenue", Some(9.0e11)),
        ];
        store.write("7203.T", &rows).unwrap();

        let loaded = store.load("7203.T").unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].date, d(2024, 3, 31));
        assert_eq!(loaded[0].metrics["NetIncome"], Some(2.5e11));
        assert_eq!(loaded[1].metrics["NetIncome"], None);
        assert_eq!(loaded[1].metrics["TotalRevenue"], Some(9.0e11));
    }

    #[test]
    fn empty_series_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = FinancialsStore::new(DataLayout::new(dir.path()));
        assert!(matches!(
            store.write("7203.T", &[]),
            Err(StoreError::EmptySeries { .. })
        ));
    }
}
