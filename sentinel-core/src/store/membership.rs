//! Append-only membership history: `master/index_history.csv`.

use super::{ensure_parent, DataLayout, StoreError};
use crate::domain::MembershipEvent;
use crate::membership::MembershipLog;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

pub struct MembershipStore {
    path: PathBuf,
}

impl MembershipStore {
    pub fn new(layout: &DataLayout) -> Self {
        Self {
            path: layout.index_history(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The full log. A missing file is an empty log; unparseable rows are
    /// skipped with a warning.
    pub fn load(&self) -> Result<MembershipLog, StoreError> {
        if !self.path.exists() {
            return Ok(MembershipLog::empty());
        }
        let mut reader = csv::Reader::from_path(&self.path).map_err(StoreError::csv(&self.path))?;
        let mut events = Vec::new();
        for (i, row) in reader.deserialize::<MembershipEvent>().enumerate() {
            match row {
                Ok(event) => events.push(event),
                Err(e) => warn!(row = i + 1, error = %e, "skipping malformed membership row"),
            }
        }
        Ok(MembershipLog::new(events))
    }

    /// Append events. Past rows are never rewritten.
    pub fn append(&self, events: &[MembershipEvent]) -> Result<(), StoreError> {
        if events.is_empty() {
            return Ok(());
        }
        ensure_parent(&self.path)?;
        let needs_header = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(StoreError::io(&self.path))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        for event in events {
            writer.serialize(event).map_err(StoreError::csv(&self.path))?;
        }
        writer.flush().map_err(StoreError::io(&self.path))?;
        let file = writer
            .into_inner()
            .map_err(|e| StoreError::io(&self.path)(e.into_error()))?;
        file.sync_data().map_err(StoreError::io(&self.path))
    }
}
