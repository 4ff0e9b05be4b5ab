//! Run-level and per-entity error types.

use crate::config::ConfigError;
use sentinel_core::data::DataError;
use sentinel_core::merge::MergeError;
use sentinel_core::store::StoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop a job before or after its per-entity loop.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("cannot use listing {}: {source}", path.display())]
    Listing {
        path: PathBuf,
        #[source]
        source: ListingError,
    },
}

/// Problems with an observed listing or constituent file.
#[derive(Debug, Error)]
pub enum ListingError {
    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A failure confined to one entity and one data category.
#[derive(Debug, Error)]
pub enum EntityError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
