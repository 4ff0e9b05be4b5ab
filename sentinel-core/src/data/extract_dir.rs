//! Disclosure source backed by a directory of pre-extracted documents.
//!
//! An external extractor (document download + XBRL/HTML text extraction)
//! drops one JSON file per entity into the inbox:
//!
//! ```json
//! { "period_key": "2024-03-31", "sections": { "dividend_policy": "..." } }
//! ```
//!
//! File name is `{code}.json`. A missing file means "not found".

use super::provider::{Credential, DataError, Disclosure, DisclosureSource};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
struct ExtractFile {
    #[serde(default, alias = "fiscal_year_end")]
    period_key: Option<String>,
    #[serde(default)]
    sections: BTreeMap<String, String>,
}

pub struct ExtractDirSource {
    dir: PathBuf,
}

impl ExtractDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, code: &str) -> PathBuf {
        self.dir.join(format!("{code}.json"))
    }
}

impl DisclosureSource for ExtractDirSource {
    fn extract(
        &self,
        code: &str,
        _target_date: NaiveDate,
        _credential: &Credential,
    ) -> Result<Option<Disclosure>, DataError> {
        let path = self.path_for(code);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(DataError::SourceUnreadable(format!(
                    "{}: {e}",
                    path.display()
                )))
            }
        };
        let file: ExtractFile = serde_json::from_str(&content).map_err(|e| {
            DataError::SourceUnreadable(format!("{}: {e}", path.display()))
        })?;

        let sections: BTreeMap<String, String> = file
            .sections
            .into_iter()
            .filter(|(_, text)| !text.trim().is_empty())
            .collect();
        if sections.is_empty() {
            return Ok(None);
        }

        Ok(Some(Disclosure {
            period_key: file.period_key.filter(|k| !k.trim().is_empty()),
            sections,
        }))
    }
}
