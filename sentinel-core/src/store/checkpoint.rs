//! Last completed run date per periodic job: `master/checkpoints.json`.

use super::{read_json, write_json_atomically, DataLayout, StoreError};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(layout: &DataLayout) -> Self {
        Self {
            path: layout.checkpoints(),
        }
    }

    pub fn all(&self) -> Result<BTreeMap<String, NaiveDate>, StoreError> {
        Ok(read_json(&self.path)?.unwrap_or_default())
    }

    pub fn last_run(&self, job: &str) -> Result<Option<NaiveDate>, StoreError> {
        Ok(self.all()?.get(job).copied())
    }

    pub fn record(&self, job: &str, date: NaiveDate) -> Result<(), StoreError> {
        let mut all = self.all()?;
        all.insert(job.to_string(), date);
        write_json_atomically(&self.path, &all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_per_job() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(&DataLayout::new(dir.path()));
        let day = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();

        assert_eq!(store.last_run("disclosures").unwrap(), None);
        store.record("disclosures", day).unwrap();
        store.record("index:Nikkei225", day.succ_opt().unwrap()).unwrap();

        assert_eq!(store.last_run("disclosures").unwrap(), Some(day));
        assert_eq!(store.all().unwrap().len(), 2);
    }
}
