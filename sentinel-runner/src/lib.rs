//! Sentinel Runner: job orchestration on top of `sentinel-core`.
//!
//! This crate provides:
//! - The harvest coordinator (batch selection, per-entity price / financials /
//!   disclosure steps, journal commits, circuit-breaker bail-out)
//! - Master, index membership and weekly disclosure sync jobs
//! - TOML configuration, run gate and clock, inter-entity pacing
//! - Run summaries, progress callbacks and the dataset status report

pub mod config;
pub mod coordinator;
pub mod disclosure_sync;
pub mod error;
pub mod gate;
pub mod index_sync;
pub mod pacing;
pub mod progress;
pub mod status;
pub mod summary;
pub mod universe;

pub use config::{ConfigError, SentinelConfig};
pub use coordinator::{PriceOutcome, RunCoordinator, Sources};
pub use disclosure_sync::{
    refresh_disclosure, DisclosureOutcome, DisclosureSync, DisclosureSyncOutcome, DISCLOSURE_JOB,
};
pub use error::{EntityError, ListingError, RunError};
pub use gate::{Clock, FixedClock, GateDecision, RunGate, SystemClock};
pub use index_sync::{load_constituents, parse_constituents, sync_index, IndexSyncReport};
pub use pacing::{NoPause, Pacer, RandomPacer};
pub use progress::{EntityOutcome, HarvestProgress, LogProgress, SilentProgress};
pub use status::{collect_status, StatusReport};
pub use summary::{Category, CategoryCounts, Failure, RunSummary};
pub use universe::{load_listing, parse_listing, sync_master, MasterSyncReport};
