//! Sync jobs: weekly disclosure gate, listing and constituent files.

use chrono::{Days, NaiveDate};
use proptest::prelude::*;
use sentinel_core::data::{Credential, DataError, Disclosure, DisclosureSource};
use sentinel_core::store::{CheckpointStore, DataLayout, MasterStore};
use sentinel_runner::{
    load_constituents, load_listing, sync_index, sync_master, DisclosureSync,
    DisclosureSyncOutcome, GateDecision, ListingError, NoPause, RunError, RunGate, SentinelConfig,
    SilentProgress, DISCLOSURE_JOB,
};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use tempfile::TempDir;

fn d(m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, day).unwrap()
}

#[derive(Default)]
struct Recording {
    seen: RefCell<Vec<String>>,
}

impl DisclosureSource for Recording {
    fn extract(
        &self,
        code: &str,
        _target_date: NaiveDate,
        _credential: &Credential,
    ) -> Result<Option<Disclosure>, DataError> {
        self.seen.borrow_mut().push(code.to_string());
        Ok(Some(Disclosure {
            period_key: Some("2024-03-31".into()),
            sections: BTreeMap::from([("dividend_policy".to_string(), "Progressive".to_string())]),
        }))
    }
}

fn seeded_dataset() -> (TempDir, SentinelConfig) {
    let dir = TempDir::new().unwrap();
    let listing = dir.path().join("listing.csv");
    fs::write(
        &listing,
        "コード,銘柄名,市場・商品区分,33業種区分,17業種区分\n\
         1301,極洋,プライム（内国株式）,水産・農林業,食品\n\
         1332,ニッスイ,プライム（内国株式）,水産・農林業,食品\n\
         7203,トヨタ自動車,プライム（内国株式）,輸送用機器,自動車・輸送機\n",
    )
    .unwrap();
    let layout = DataLayout::new(dir.path());
    let listed = load_listing(&listing).unwrap();
    sync_master(&layout, &listed, d(4, 1)).unwrap();

    let config = SentinelConfig {
        data_dir: dir.path().to_path_buf(),
        ..SentinelConfig::default()
    };
    (dir, config)
}

#[test]
fn disclosure_job_is_weekly() {
    let (dir, config) = seeded_dataset();
    let source = Recording::default();
    let mut job = DisclosureSync::new(&config, &source, Credential::new("key"))
        .with_pacer(Box::new(NoPause))
        .with_progress(&SilentProgress);

    let first = job.run(d(5, 1), false, Some(2)).unwrap();
    match first {
        DisclosureSyncOutcome::Completed { decision, summary } => {
            assert_eq!(decision, GateDecision::FirstRun);
            assert_eq!(summary.qualitative.succeeded, 2);
        }
        other => panic!("expected a completed run, got {other:?}"),
    }
    // Registry order, limited to two.
    assert_eq!(*source.seen.borrow(), vec!["1301.T", "1332.T"]);

    let too_soon = job.run(d(5, 7), false, None).unwrap();
    assert_eq!(
        too_soon,
        DisclosureSyncOutcome::NotDue {
            last_run: d(5, 1),
            next_due: d(5, 8)
        }
    );

    let forced = job.run(d(5, 7), true, None).unwrap();
    assert!(matches!(
        forced,
        DisclosureSyncOutcome::Completed {
            decision: GateDecision::Forced,
            ..
        }
    ));
    assert_eq!(source.seen.borrow().len(), 5);

    let layout = DataLayout::new(dir.path());
    let checkpoints = CheckpointStore::new(&layout);
    assert_eq!(checkpoints.last_run(DISCLOSURE_JOB).unwrap(), Some(d(5, 7)));
    let registry = MasterStore::new(&layout).load().unwrap();
    assert_eq!(registry.get("7203.T").unwrap().last_info_update, Some(d(5, 7)));
}

#[test]
fn listing_without_name_column_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("listing.csv");
    fs::write(&path, "コード,市場・商品区分\n1301,プライム\n").unwrap();

    let err = load_listing(&path).unwrap_err();
    assert!(matches!(
        err,
        RunError::Listing {
            source: ListingError::MissingColumn("name"),
            ..
        }
    ));
}

#[test]
fn constituent_file_feeds_the_membership_log() {
    let (dir, _config) = seeded_dataset();
    let path = dir.path().join("nikkei.csv");
    fs::write(
        &path,
        "コード,銘柄名\n1332,ニッスイ\n7203,トヨタ自動車\n,この資料の転載を禁じます\n",
    )
    .unwrap();

    let observed = load_constituents(&path).unwrap();
    let report = sync_index(&DataLayout::new(dir.path()), &observed, "Nikkei225", d(4, 1)).unwrap();
    assert_eq!(report.joined, vec!["1332.T".to_string(), "7203.T".to_string()]);
}

proptest! {
    #[test]
    fn gate_opens_exactly_after_the_interval(elapsed in 0u64..30, interval in 1i64..14) {
        let dir = TempDir::new().unwrap();
        let layout = DataLayout::new(dir.path());
        let checkpoints = CheckpointStore::new(&layout);
        let gate = RunGate::new("job", interval, &checkpoints);

        let last = d(1, 1);
        gate.record(last).unwrap();
        let today = last.checked_add_days(Days::new(elapsed)).unwrap();

        let decision = gate.check(today, false).unwrap();
        prop_assert_eq!(decision.should_run(), elapsed as i64 >= interval);
        prop_assert!(gate.check(today, true).unwrap().should_run());
    }
}
