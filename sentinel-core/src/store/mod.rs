//! On-disk stores.
//!
//! Layout under the data directory:
//!
//! ```text
//! master/stocks_master.csv              entity master (compacted)
//! master/stocks_master.journal.jsonl    per-entity commits since last compaction
//! master/index_history.csv              membership events (append-only)
//! master/checkpoints.json               job -> last completed run date
//! {code}/prices.parquet                 daily bars, oldest first
//! {code}/meta.json                      price metadata sidecar
//! {code}/financials.parquet             quarterly rows, latest first
//! {code}/info.json                      qualitative document
//! ```
//!
//! Whole-file rewrites go through a `.tmp` sibling and a rename, so a crash
//! never leaves a half-written table in place.

pub mod checkpoint;
pub mod documents;
pub mod financials;
pub mod master;
pub mod membership;
pub mod prices;

pub use checkpoint::CheckpointStore;
pub use documents::DocumentStore;
pub use financials::FinancialsStore;
pub use master::MasterStore;
pub use membership::MembershipStore;
pub use prices::{PriceMeta, PriceStore};

use crate::registry::RegistryError;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("entity master not found at {}", path.display())]
    RegistryMissing { path: PathBuf },

    #[error("entity master at {} is unreadable: {reason}", path.display())]
    RegistryLoad { path: PathBuf, reason: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CSV error in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("JSON error in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Parquet error in {}: {reason}", path.display())]
    Parquet { path: PathBuf, reason: String },

    #[error("refusing to write an empty series to {}", path.display())]
    EmptySeries { path: PathBuf },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl StoreError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
        move |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn csv(path: &Path) -> impl FnOnce(csv::Error) -> StoreError + '_ {
        move |source| StoreError::Csv {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn json(path: &Path) -> impl FnOnce(serde_json::Error) -> StoreError + '_ {
        move |source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn parquet(path: &Path, what: &str, e: impl std::fmt::Display) -> StoreError {
        StoreError::Parquet {
            path: path.to_path_buf(),
            reason: format!("{what}: {e}"),
        }
    }
}

/// Paths of every store under one data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn master_dir(&self) -> PathBuf {
        self.root.join("master")
    }

    pub fn master_csv(&self) -> PathBuf {
        self.master_dir().join("stocks_master.csv")
    }

    pub fn master_journal(&self) -> PathBuf {
        self.master_dir().join("stocks_master.journal.jsonl")
    }

    pub fn index_history(&self) -> PathBuf {
        self.master_dir().join("index_history.csv")
    }

    pub fn checkpoints(&self) -> PathBuf {
        self.master_dir().join("checkpoints.json")
    }

    /// Directory holding every per-entity file: `{root}/{code}/`.
    pub fn entity_dir(&self, code: &str) -> PathBuf {
        self.root.join(code)
    }

    pub fn prices(&self, code: &str) -> PathBuf {
        self.entity_dir(code).join("prices.parquet")
    }

    pub fn price_meta(&self, code: &str) -> PathBuf {
        self.entity_dir(code).join("meta.json")
    }

    pub fn financials(&self, code: &str) -> PathBuf {
        self.entity_dir(code).join("financials.parquet")
    }

    pub fn info(&self, code: &str) -> PathBuf {
        self.entity_dir(code).join("info.json")
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn ensure_parent(path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(StoreError::io(parent))?;
    }
    Ok(())
}

/// Replace `path` with whatever `write` produces, via a temp file and rename.
pub(crate) fn write_atomically<F>(path: &Path, write: F) -> Result<(), StoreError>
where
    F: FnOnce(&mut fs::File) -> Result<(), StoreError>,
{
    ensure_parent(path)?;
    let tmp_path = tmp_sibling(path);

    let result = (|| {
        let mut file = fs::File::create(&tmp_path).map_err(StoreError::io(&tmp_path))?;
        write(&mut file)?;
        file.flush().map_err(StoreError::io(&tmp_path))?;
        file.sync_all().map_err(StoreError::io(&tmp_path))?;
        fs::rename(&tmp_path, path).map_err(StoreError::io(path))
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

/// Atomically write a serializable value as pretty JSON.
pub(crate) fn write_json_atomically<T: serde::Serialize>(
    path: &Path,
    value: &T,
) -> Result<(), StoreError> {
    let json = serde_json::to_vec_pretty(value).map_err(StoreError::json(path))?;
    write_atomically(path, |file| file.write_all(&json).map_err(StoreError::io(path)))
}

/// Read a JSON file, `None` when it does not exist.
pub(crate) fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path)(e)),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(StoreError::json(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let layout = DataLayout::new("/data");
        assert_eq!(layout.master_csv(), PathBuf::from("/data/master/stocks_master.csv"));
        assert_eq!(layout.prices("7203.T"), PathBuf::from("/data/7203.T/prices.parquet"));
        assert_eq!(layout.info("7203.T"), PathBuf::from("/data/7203.T/info.json"));
    }

    #[test]
    fn tmp_sibling_keeps_full_name() {
        assert_eq!(
            tmp_sibling(Path::new("/d/stocks_master.csv")),
            PathBuf::from("/d/stocks_master.csv.tmp")
        );
    }

    #[test]
    fn failed_write_leaves_target_and_no_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.json");
        fs::write(&path, "old").unwrap();

        let err = write_atomically(&path, |_| {
            Err(StoreError::EmptySeries {
                path: PathBuf::from("x"),
            })
        });
        assert!(err.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "old");
        assert!(!tmp_sibling(&path).exists());
    }

    #[test]
    fn read_json_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let got: Option<serde_json::Value> = read_json(&dir.path().join("nope.json")).unwrap();
        assert!(got.is_none());
    }
}
