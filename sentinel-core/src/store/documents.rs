//! Qualitative documents: `{code}/info.json`.

use super::{read_json, write_json_atomically, DataLayout, StoreError};
use crate::qualitative::QualitativeDocument;

pub struct DocumentStore {
    layout: DataLayout,
}

impl DocumentStore {
    pub fn new(layout: DataLayout) -> Self {
        Self { layout }
    }

    /// `None` if the entity has never had a successful extraction. A file
    /// that exists but does not parse is an error, not a fresh document.
    pub fn load(&self, code: &str) -> Result<Option<QualitativeDocument>, StoreError> {
        read_json(&self.layout.info(code))
    }

    pub fn load_or_new(&self, code: &str) -> Result<QualitativeDocument, StoreError> {
        Ok(self
            .load(code)?
            .unwrap_or_else(|| QualitativeDocument::new(code)))
    }

    pub fn save(&self, document: &QualitativeDocument) -> Result<(), StoreError> {
        write_json_atomically(&self.layout.info(&document.code), document)
    }
}
