//! Entity master persistence with a per-entity commit journal.
//!
//! The CSV is the compacted snapshot. Every successful per-entity update is
//! appended to the JSONL journal and flushed before the next entity starts;
//! loading replays the journal over the CSV. `save` rewrites the CSV
//! atomically and clears the journal.

use super::{ensure_parent, write_atomically, DataLayout, StoreError};
use crate::domain::{EntityRecord, UpdateKind};
use crate::registry::Registry;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use tracing::{debug, warn};

/// One journaled timestamp update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub code: String,
    pub kind: UpdateKind,
    pub date: NaiveDate,
}

pub struct MasterStore {
    csv_path: PathBuf,
    journal_path: PathBuf,
}

impl MasterStore {
    pub fn new(layout: &DataLayout) -> Self {
        Self {
            csv_path: layout.master_csv(),
            journal_path: layout.master_journal(),
        }
    }

    pub fn exists(&self) -> bool {
        self.csv_path.exists()
    }

    /// Load the registry, failing if the master has never been built.
    pub fn load(&self) -> Result<Registry, StoreError> {
        if !self.exists() {
            return Err(StoreError::RegistryMissing {
                path: self.csv_path.clone(),
            });
        }
        let registry = self.read_csv()?;
        self.replay_journal(registry)
    }

    /// Load the registry, or an empty one on first use.
    pub fn load_or_empty(&self) -> Result<Registry, StoreError> {
        if self.exists() {
            self.load()
        } else {
            Ok(Registry::empty())
        }
    }

    fn read_csv(&self) -> Result<Registry, StoreError> {
        let load_err = |reason: String| StoreError::RegistryLoad {
            path: self.csv_path.clone(),
            reason,
        };
        let mut reader = csv::Reader::from_path(&self.csv_path).map_err(|e| load_err(e.to_string()))?;
        let records: Vec<EntityRecord> = reader
            .deserialize()
            .collect::<Result<_, _>>()
            .map_err(|e| load_err(e.to_string()))?;
        Registry::new(records).map_err(|e| load_err(e.to_string()))
    }

    /// Apply journaled commits on top of the compacted snapshot.
    ///
    /// Malformed lines and codes the snapshot does not know are skipped.
    fn replay_journal(&self, mut registry: Registry) -> Result<Registry, StoreError> {
        let entries = self.read_journal()?;
        let count = entries.len();
        for entry in entries {
            if registry.get(&entry.code).is_none() {
                warn!(code = %entry.code, "journal entry for unknown code; skipping");
                continue;
            }
            registry = registry.mark_updated(&entry.code, entry.kind, entry.date)?;
        }
        if count > 0 {
            debug!(entries = count, "replayed registry journal");
        }
        Ok(registry)
    }

    /// Journaled commits not yet compacted into the CSV.
    pub fn read_journal(&self) -> Result<Vec<JournalEntry>, StoreError> {
        let file = match fs::File::open(&self.journal_path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.journal_path)(e)),
        };
        let mut entries = Vec::new();
        for (i, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(StoreError::io(&self.journal_path))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<JournalEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(line = i + 1, error = %e, "skipping malformed journal line"),
            }
        }
        Ok(entries)
    }

    /// Durably record one entity's progress marker.
    pub fn commit(&self, code: &str, kind: UpdateKind, date: NaiveDate) -> Result<(), StoreError> {
        let entry = JournalEntry {
            code: code.to_string(),
            kind,
            date,
        };
        let json = serde_json::to_string(&entry).map_err(StoreError::json(&self.journal_path))?;

        ensure_parent(&self.journal_path)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.journal_path)
            .map_err(StoreError::io(&self.journal_path))?;
        writeln!(file, "{json}").map_err(StoreError::io(&self.journal_path))?;
        file.flush().map_err(StoreError::io(&self.journal_path))?;
        file.sync_data().map_err(StoreError::io(&self.journal_path))
    }

    /// Compact: rewrite the CSV from `registry` and clear the journal.
    pub fn save(&self, registry: &Registry) -> Result<(), StoreError> {
        let path = self.csv_path.clone();
        write_atomically(&self.csv_path, |file| {
            let mut writer = csv::Writer::from_writer(file);
            for record in registry.records() {
                writer.serialize(record).map_err(StoreError::csv(&path))?;
            }
            writer.flush().map_err(StoreError::io(&path))
        })?;

        match fs::remove_file(&self.journal_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&self.journal_path)(e)),
        }
    }
}
