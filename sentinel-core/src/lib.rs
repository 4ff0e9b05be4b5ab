//! Sentinel Core: the incremental reconciliation and merge engine.
//!
//! This crate holds everything that decides *what* to fetch and *how* fresh
//! records land in the long-lived dataset:
//! - Domain types (entities, price bars, financial rows, membership events)
//! - Master registry reconciliation against an observed listing
//! - Generic keyed time-series merge (append, dedup, sort, full overwrite)
//! - Incremental fetch planning with corporate-action detection
//! - Event-sourced index membership log
//! - Qualitative disclosure documents with per-period history
//! - On-disk stores and data-provider collaborators

pub mod data;
pub mod domain;
pub mod membership;
pub mod merge;
pub mod planner;
pub mod qualitative;
pub mod registry;
pub mod store;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: snapshot types can move across threads.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::EntityRecord>();
        require_sync::<domain::EntityRecord>();
        require_send::<domain::PriceBar>();
        require_sync::<domain::PriceBar>();
        require_send::<domain::FinancialRow>();
        require_sync::<domain::FinancialRow>();
        require_send::<domain::MembershipEvent>();
        require_sync::<domain::MembershipEvent>();

        require_send::<registry::Registry>();
        require_sync::<registry::Registry>();
        require_send::<membership::MembershipLog>();
        require_sync::<membership::MembershipLog>();
        require_send::<qualitative::QualitativeDocument>();
        require_sync::<qualitative::QualitativeDocument>();

        require_send::<data::DataError>();
        require_sync::<data::DataError>();
        require_send::<store::StoreError>();
        require_sync::<store::StoreError>();
    }
}
