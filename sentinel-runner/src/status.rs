//! Dataset status report.

use crate::error::RunError;
use chrono::NaiveDate;
use sentinel_core::store::{CheckpointStore, DataLayout, MasterStore, MembershipStore};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub master_present: bool,
    pub entities: usize,
    pub active: usize,
    pub never_fetched: usize,
    /// Journal commits not yet compacted into the master CSV.
    pub pending_commits: usize,
    /// Current member count per group.
    pub groups: BTreeMap<String, usize>,
    pub checkpoints: BTreeMap<String, NaiveDate>,
}

pub fn collect_status(layout: &DataLayout) -> Result<StatusReport, RunError> {
    let master = MasterStore::new(layout);
    let registry = master.load_or_empty()?;
    let pending_commits = master.read_journal()?.len();

    let log = MembershipStore::new(layout).load()?;
    let groups = log
        .groups()
        .into_iter()
        .map(|g| (g.to_string(), log.current_members(g).len()))
        .collect();

    Ok(StatusReport {
        master_present: master.exists(),
        entities: registry.len(),
        active: registry.active_count(),
        never_fetched: registry
            .active()
            .filter(|e| e.last_price_update.is_none())
            .count(),
        pending_commits,
        groups,
        checkpoints: CheckpointStore::new(layout).all()?,
    })
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.master_present {
            writeln!(f, "No entity master yet; run `sentinel sync-master <listing.csv>` first.")?;
        }
        writeln!(f, "Entities:        {}", self.entities)?;
        writeln!(f, "  active:        {}", self.active)?;
        writeln!(f, "  never fetched: {}", self.never_fetched)?;
        writeln!(f, "Pending commits: {}", self.pending_commits)?;
        if !self.groups.is_empty() {
            writeln!(f, "Groups:")?;
            for (name, members) in &self.groups {
                writeln!(f, "  {name:<20} {members}")?;
            }
        }
        if !self.checkpoints.is_empty() {
            writeln!(f, "Last runs:")?;
            for (job, date) in &self.checkpoints {
                writeln!(f, "  {job:<20} {date}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::domain::{EntityRecord, MembershipEvent, UpdateKind};
    use sentinel_core::registry::Registry;
    use tempfile::TempDir;

    #[test]
    fn empty_dataset() {
        let dir = TempDir::new().unwrap();
        let report = collect_status(&DataLayout::new(dir.path())).unwrap();
        assert!(!report.master_present);
        assert_eq!(report.entities, 0);
        assert!(report.to_string().contains("sync-master"));
    }

    #[test]
    fn counts_registry_journal_and_groups() {
        let dir = TempDir::new().unwrap();
        let layout = DataLayout::new(dir.path());
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();

        let master = MasterStore::new(&layout);
        let mut inactive = EntityRecord::new("1332.T", "Nissui");
        inactive.is_active = false;
        master
            .save(
                &Registry::new(vec![
                    EntityRecord::new("1301.T", "Kyokuyo"),
                    EntityRecord::new("7203.T", "Toyota"),
                    inactive,
                ])
                .unwrap(),
            )
            .unwrap();
        master.commit("7203.T", UpdateKind::Price, day).unwrap();

        MembershipStore::new(&layout)
            .append(&[
                MembershipEvent::join("7203.T", "Nikkei225", day),
                MembershipEvent::join("1301.T", "Nikkei225", day),
            ])
            .unwrap();
        CheckpointStore::new(&layout).record("disclosures", day).unwrap();

        let report = collect_status(&layout).unwrap();
        assert_eq!(report.entities, 3);
        assert_eq!(report.active, 2);
        assert_eq!(report.never_fetched, 1);
        assert_eq!(report.pending_commits, 1);
        assert_eq!(report.groups.get("Nikkei225"), Some(&2));
        assert_eq!(report.checkpoints.get("disclosures"), Some(&day));
    }
}
