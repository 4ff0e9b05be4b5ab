//! Per-entity price store: `{code}/prices.parquet` plus a metadata sidecar.
//!
//! Features:
//! - Atomic writes (write to .tmp, rename into place)
//! - Schema check on load
//! - Sidecar with date range, bar count and a BLAKE3 hash of the bars

use super::{read_json, write_atomically, write_json_atomically, DataLayout, StoreError};
use crate::domain::PriceBar;
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const COLUMNS: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

/// Metadata sidecar for a stored price series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceMeta {
    pub code: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub bar_count: usize,
    pub data_hash: String,
    pub source: String,
    pub written_at: NaiveDateTime,
}

pub struct PriceStore {
    layout: DataLayout,
}

impl PriceStore {
    pub fn new(layout: DataLayout) -> Self {
        Self { layout }
    }

    /// Stored bars in file order. A missing file is an empty series.
    pub fn load(&self, code: &str) -> Result<Vec<PriceBar>, StoreError> {
        let path = self.layout.prices(code);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let df = read_parquet(&path)?;
        for name in COLUMNS {
            if df.column(name).is_err() {
                return Err(StoreError::parquet(&path, "schema", format!("missing column '{name}'")));
            }
        }
        dataframe_to_bars(&df, &path)
    }

    /// Replace the stored series with `bars` and refresh the sidecar.
    pub fn write(&self, code: &str, bars: &[PriceBar], source: &str) -> Result<(), StoreError> {
        let path = self.layout.prices(code);
        let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
            return Err(StoreError::EmptySeries { path });
        };

        let mut df = bars_to_dataframe(bars, &path)?;
        write_atomically(&path, |file| {
            ParquetWriter::new(file)
                .finish(&mut df)
                .map(|_| ())
                .map_err(|e| StoreError::parquet(&path, "write", e))
        })?;

        let meta_path = self.layout.price_meta(code);
        let hash_input = serde_json::to_vec(bars).map_err(StoreError::json(&meta_path))?;
        let meta = PriceMeta {
            code: code.to_string(),
            start_date: first.date,
            end_date: last.date,
            bar_count: bars.len(),
            data_hash: blake3::hash(&hash_input).to_hex().to_string(),
            source: source.to_string(),
            written_at: chrono::Local::now().naive_local(),
        };
        write_json_atomically(&meta_path, &meta)
    }

    /// The sidecar, if present and readable.
    pub fn meta(&self, code: &str) -> Option<PriceMeta> {
        read_json(&self.layout.price_meta(code)).ok().flatten()
    }
}

pub(crate) fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN)
}

pub(crate) fn read_parquet(path: &Path) -> Result<DataFrame, StoreError> {
    let file = fs::File::open(path).map_err(StoreError::io(path))?;
    ParquetReader::new(file)
        .finish()
        .map_err(|e| StoreError::parquet(path, "read", e))
}

pub(crate) fn date_column(dates: impl Iterator<Item = NaiveDate>, path: &Path) -> Result<Column, StoreError> {
    let epoch = epoch();
    let days: Vec<i32> = dates.map(|d| (d - epoch).num_days() as i32).collect();
    Column::new("date".into(), days)
        .cast(&DataType::Date)
        .map_err(|e| StoreError::parquet(path, "date cast", e))
}

pub(crate) fn read_dates(df: &DataFrame, path: &Path) -> Result<Vec<NaiveDate>, StoreError> {
    let col = df
        .column("date")
        .map_err(|e| StoreError::parquet(path, "date column", e))?;
    let ca = col
        .date()
        .map_err(|e| StoreError::parquet(path, "date column type", e))?;
    let epoch = epoch();
    (0..df.height())
        .map(|i| {
            ca.get(i)
                .map(|days| epoch + chrono::Duration::days(days as i64))
                .ok_or_else(|| StoreError::parquet(path, "date column", format!("null date at row {i}")))
        })
        .collect()
}

fn bars_to_dataframe(bars: &[PriceBar], path: &Path) -> Result<DataFrame, StoreError> {
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<u64> = bars.iter().map(|b| b.volume).collect();

    DataFrame::new(vec![
        date_column(bars.iter().map(|b| b.date), path)?,
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
    ])
    .map_err(|e| StoreError::parquet(path, "dataframe creation", e))
}

fn dataframe_to_bars(df: &DataFrame, path: &Path) -> Result<Vec<PriceBar>, StoreError> {
    let f64_col = |name: &str| -> Result<Float64Chunked, StoreError> {
        df.column(name)
            .and_then(|c| c.cast(&DataType::Float64))
            .and_then(|c| c.f64().cloned())
            .map_err(|e| StoreError::parquet(path, name, e))
    };

    let dates = read_dates(df, path)?;
    let open = f64_col("open")?;
    let high = f64_col("high")?;
    let low = f64_col("low")?;
    let close = f64_col("close")?;
    let volume = df
        .column("volume")
        .and_then(|c| c.cast(&DataType::UInt64))
        .and_then(|c| c.u64().cloned())
        .map_err(|e| StoreError::parquet(path, "volume", e))?;

    Ok(dates
        .into_iter()
        .enumerate()
        .map(|(i, date)| PriceBar {
            date,
            open: open.get(i).unwrap_or(f64::NAN),
            high: high.get(i).unwrap_or(f64::NAN),
            low: low.get(i).unwrap_or(f64::NAN),
            close: close.get(i).unwrap_or(f64::NAN),
            volume: volume.get(i).unwrap_or(0),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, close: f64) -> PriceBar {
        PriceBar {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            volume: 1_000 * day as u64,
        }
    }

    #[test]
    fn missing_store_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = PriceStore::new(DataLayout::new(dir.path()));
        assert!(store.load("7203.T").unwrap().is_empty());
        assert!(store.meta("7203.T").is_none());
    }

    #[test]
    fn write_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = PriceStore::new(DataLayout::new(dir.path()));
        let bars = vec![bar(4, 100.0), bar(5, 101.5), bar(9, 99.0)];

        store.write("7203.T", &bars, "yahoo").unwrap();
        assert_eq!(store.load("7203.T").unwrap(), bars);
    }

    #[test]
    fn sidecar_tracks_range_and_hash() {
        let dir = tempfile::tempdir().unwrap();
        let store = PriceStore::new(DataLayout::new(dir.path()));
        let bars = vec![bar(4, 100.0), bar(5, 101.5)];
        store.write("7203.T", &bars, "yahoo").unwrap();
        let first = store.meta("7203.T").unwrap();

        assert_eq!(first.bar_count, 2);
        assert_eq!(first.end_date, bars[1].date);
        assert_eq!(first.data_hash.len(), 64);

        store.write("7203.T", &[bar(4, 100.0), bar(5, 102.0)], "yahoo").unwrap();
        assert_ne!(store.meta("7203.T").unwrap().data_hash, first.data_hash);
    }

    #[test]
    fn empty_series_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = PriceStore::new(DataLayout::new(dir.path()));
        assert!(matches!(
            store.write("7203.T", &[], "yahoo"),
            Err(StoreError::EmptySeries { .. })
        ));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        fs::create_dir_all(layout.entity_dir("7203.T")).unwrap();
        fs::write(layout.prices("7203.T"), b"not parquet").unwrap();

        let err = PriceStore::new(layout).load("7203.T").unwrap_err();
        assert!(matches!(err, StoreError::Parquet { .. }));
    }
}
