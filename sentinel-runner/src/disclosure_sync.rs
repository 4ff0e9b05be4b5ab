//! Qualitative disclosure refresh.
//!
//! [`refresh_disclosure`] is the per-entity step shared by the harvest and by
//! the weekly [`DisclosureSync`] job, which walks every active entity behind a
//! [`RunGate`].

use crate::config::SentinelConfig;
use crate::error::{EntityError, RunError};
use crate::gate::{GateDecision, RunGate};
use crate::pacing::{Pacer, RandomPacer};
use crate::progress::{EntityOutcome, HarvestProgress, LogProgress};
use crate::summary::{Category, RunSummary};
use chrono::NaiveDate;
use sentinel_core::data::{Credential, DisclosureSource};
use sentinel_core::domain::UpdateKind;
use sentinel_core::planner::disclosure_target_date;
use sentinel_core::store::{CheckpointStore, DataLayout, DocumentStore, MasterStore, StoreError};
use tracing::{debug, info, warn};

/// Checkpoint name of the weekly disclosure job.
pub const DISCLOSURE_JOB: &str = "disclosures";

/// Result of refreshing one entity's qualitative document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisclosureOutcome {
    Updated { period_key: String, sections: usize },
    /// The extractor had no document for the target date.
    NotFound,
}

/// Extract the latest annual disclosure for `code` and fold it into its
/// stored document.
///
/// The period key is the one reported by the extractor, or the estimated
/// target date when it could not tell.
pub fn refresh_disclosure(
    source: &dyn DisclosureSource,
    documents: &DocumentStore,
    credential: &Credential,
    code: &str,
    today: NaiveDate,
    fiscal_month: u32,
) -> Result<DisclosureOutcome, EntityError> {
    let target = disclosure_target_date(today, fiscal_month);
    let Some(disclosure) = source.extract(code, target, credential)? else {
        debug!(code, %target, "no disclosure document");
        return Ok(DisclosureOutcome::NotFound);
    };

    let period_key = disclosure
        .period_key
        .unwrap_or_else(|| target.format("%Y-%m-%d").to_string());
    let document = documents
        .load_or_new(code)?
        .upsert(&disclosure.sections, &period_key, today);
    documents.save(&document)?;

    Ok(DisclosureOutcome::Updated {
        period_key,
        sections: disclosure.sections.len(),
    })
}

/// What the weekly job did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisclosureSyncOutcome {
    /// No credential configured; nothing was attempted.
    NoCredential,
    /// The gate said the last run is too recent.
    NotDue { last_run: NaiveDate, next_due: NaiveDate },
    Completed { decision: GateDecision, summary: RunSummary },
}

/// Weekly extraction over all active entities.
pub struct DisclosureSync<'a> {
    layout: DataLayout,
    source: &'a dyn DisclosureSource,
    credential: Option<Credential>,
    fiscal_month: u32,
    min_interval_days: i64,
    pacer: Box<dyn Pacer + 'a>,
    progress: &'a dyn HarvestProgress,
}

impl<'a> DisclosureSync<'a> {
    pub fn new(
        config: &SentinelConfig,
        source: &'a dyn DisclosureSource,
        credential: Option<Credential>,
    ) -> Self {
        Self {
            layout: DataLayout::new(&config.data_dir),
            source,
            credential,
            fiscal_month: config.disclosures.fiscal_month,
            min_interval_days: config.disclosures.min_interval_days,
            pacer: Box::new(RandomPacer::new(
                config.harvest.min_sleep_secs,
                config.harvest.max_sleep_secs,
            )),
            progress: &LogProgress,
        }
    }

    pub fn with_pacer(mut self, pacer: Box<dyn Pacer + 'a>) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn with_progress(mut self, progress: &'a dyn HarvestProgress) -> Self {
        self.progress = progress;
        self
    }

    /// Run the job if it is due (or `force`d), touching at most `limit`
    /// entities in registry order.
    pub fn run(
        &mut self,
        today: NaiveDate,
        force: bool,
        limit: Option<usize>,
    ) -> Result<DisclosureSyncOutcome, RunError> {
        let Some(credential) = self.credential.clone() else {
            warn!("no disclosure credential configured; skipping disclosure sync");
            return Ok(DisclosureSyncOutcome::NoCredential);
        };

        let checkpoints = CheckpointStore::new(&self.layout);
        let gate = RunGate::new(DISCLOSURE_JOB, self.min_interval_days, &checkpoints);
        let decision = gate.check(today, force)?;
        if let GateDecision::NotDue { last_run, next_due } = decision {
            info!(%last_run, %next_due, "disclosure sync not due");
            return Ok(DisclosureSyncOutcome::NotDue { last_run, next_due });
        }

        let master = MasterStore::new(&self.layout);
        let documents = DocumentStore::new(self.layout.clone());
        let mut registry = master.load()?;

        let targets: Vec<(String, String)> = registry
            .active()
            .take(limit.unwrap_or(usize::MAX))
            .map(|e| (e.code.clone(), e.name.clone()))
            .collect();
        let total = targets.len();
        let mut summary = RunSummary::new(total);
        info!(total, ?decision, "starting disclosure sync");

        for (i, (code, name)) in targets.iter().enumerate() {
            self.progress.on_start(code, name, i, total);
            let outcome = match refresh_disclosure(
                self.source,
                &documents,
                &credential,
                code,
                today,
                self.fiscal_month,
            ) {
                Ok(DisclosureOutcome::Updated { .. }) => match master.commit(code, UpdateKind::Info, today) {
                    Ok(()) => {
                        registry = registry
                            .mark_updated(code, UpdateKind::Info, today)
                            .map_err(StoreError::from)?;
                        summary.succeeded(Category::Qualitative);
                        EntityOutcome::Ok
                    }
                    Err(e) => {
                        summary.succeeded(Category::Qualitative);
                        summary.failed(code, Category::Registry, &e);
                        EntityOutcome::Failed(vec![format!("registry: {e}")])
                    }
                },
                Ok(DisclosureOutcome::NotFound) => {
                    summary.skipped(Category::Qualitative);
                    EntityOutcome::Ok
                }
                Err(e) => {
                    summary.failed(code, Category::Qualitative, &e);
                    EntityOutcome::Failed(vec![format!("qualitative: {e}")])
                }
            };
            self.progress.on_complete(code, i, total, &outcome);

            if i + 1 < total {
                self.pacer.pause();
            }
        }

        if let Err(e) = master.save(&registry) {
            warn!(error = %e, "registry compaction failed; journal kept for next load");
            summary.failed("", Category::Registry, &e);
        }
        gate.record(today)?;
        self.progress.on_batch_complete(&summary);

        Ok(DisclosureSyncOutcome::Completed { decision, summary })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::data::{DataError, Disclosure};
    use sentinel_core::qualitative::Label;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    struct OneDoc;

    impl DisclosureSource for OneDoc {
        fn extract(
            &self,
            code: &str,
            _target_date: NaiveDate,
            _credential: &Credential,
        ) -> Result<Option<Disclosure>, DataError> {
            match code {
                "1301.T" => Ok(Some(Disclosure {
                    period_key: None,
                    sections: BTreeMap::from([(
                        "dividend_policy".to_string(),
                        "Stable dividends".to_string(),
                    )]),
                })),
                "9999.T" => Err(DataError::ResponseFormatChanged("bad xbrl".into())),
                _ => Ok(None),
            }
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn missing_period_key_falls_back_to_target_date() {
        let dir = TempDir::new().unwrap();
        let documents = DocumentStore::new(DataLayout::new(dir.path()));
        let credential = Credential::new("k").unwrap();

        let outcome =
            refresh_disclosure(&OneDoc, &documents, &credential, "1301.T", d(2024, 10, 1), 3)
                .unwrap();
        assert_eq!(
            outcome,
            DisclosureOutcome::Updated {
                period_key: "2024-06-30".into(),
                sections: 1
            }
        );

        let doc = documents.load("1301.T").unwrap().unwrap();
        let history = doc.history(Label::DividendPolicy);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].observed_at, d(2024, 10, 1));
    }

    #[test]
    fn not_found_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let documents = DocumentStore::new(DataLayout::new(dir.path()));
        let credential = Credential::new("k").unwrap();

        let outcome =
            refresh_disclosure(&OneDoc, &documents, &credential, "7203.T", d(2024, 10, 1), 3)
                .unwrap();
        assert_eq!(outcome, DisclosureOutcome::NotFound);
        assert!(documents.load("7203.T").unwrap().is_none());
    }

    #[test]
    fn extractor_failure_is_an_entity_error() {
        let dir = TempDir::new().unwrap();
        let documents = DocumentStore::new(DataLayout::new(dir.path()));
        let credential = Credential::new("k").unwrap();

        let err = refresh_disclosure(&OneDoc, &documents, &credential, "9999.T", d(2024, 10, 1), 3)
            .unwrap_err();
        assert!(matches!(err, EntityError::Data(_)));
    }

    #[test]
    fn job_without_credential_is_skipped() {
        let dir = TempDir::new().unwrap();
        let config = SentinelConfig {
            data_dir: dir.path().to_path_buf(),
            ..SentinelConfig::default()
        };
        let mut job = DisclosureSync::new(&config, &OneDoc, None);
        let outcome = job.run(d(2024, 10, 1), false, None).unwrap();
        assert_eq!(outcome, DisclosureSyncOutcome::NoCredential);
        assert!(!DataLayout::new(dir.path()).checkpoints().exists());
    }
}
