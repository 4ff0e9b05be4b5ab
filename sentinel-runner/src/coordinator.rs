//! Harvest coordinator.
//!
//! Owns no state of its own beyond its collaborators: every run loads the
//! registry, walks a batch of stale entities strictly in sequence, and leaves
//! a progress commit in the master journal after each successful step so an
//! interrupted run resumes where it stopped.

use crate::config::SentinelConfig;
use crate::disclosure_sync::{refresh_disclosure, DisclosureOutcome};
use crate::error::{EntityError, RunError};
use crate::pacing::{Pacer, RandomPacer};
use crate::progress::{EntityOutcome, HarvestProgress, LogProgress};
use crate::summary::{Category, RunSummary};
use chrono::NaiveDate;
use sentinel_core::data::{
    CorporateActionSource, Credential, DataError, DisclosureSource, FinancialsSource, PriceSource,
};
use sentinel_core::domain::{EntityRecord, UpdateKind};
use sentinel_core::merge::{drop_empty_rows, merge_financials, merge_prices, MergeMode};
use sentinel_core::planner::{check_corporate_action, plan_fetch, select_batch};
use sentinel_core::registry::Registry;
use sentinel_core::store::{
    DataLayout, DocumentStore, FinancialsStore, MasterStore, PriceStore, StoreError,
};
use tracing::{debug, info, warn};

/// External collaborators for a harvest.
///
/// Financials and disclosures are optional: a missing source counts the
/// category as skipped for every entity.
#[derive(Clone, Copy)]
pub struct Sources<'a> {
    pub prices: &'a dyn PriceSource,
    pub actions: &'a dyn CorporateActionSource,
    pub financials: Option<&'a dyn FinancialsSource>,
    pub disclosures: Option<&'a dyn DisclosureSource>,
}

/// Result of the price step for one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceOutcome {
    Written {
        fetched: usize,
        stored: usize,
        /// History was replaced after a split or consolidation.
        refetched: bool,
    },
    /// Already current, or the provider returned nothing new.
    NoNewData,
}

pub struct RunCoordinator<'a> {
    max_entities: usize,
    fetch_financials: bool,
    fiscal_month: u32,
    master: MasterStore,
    prices: PriceStore,
    financials: FinancialsStore,
    documents: DocumentStore,
    sources: Sources<'a>,
    credential: Option<Credential>,
    pacer: Box<dyn Pacer + 'a>,
    progress: &'a dyn HarvestProgress,
}

impl<'a> RunCoordinator<'a> {
    pub fn new(config: &SentinelConfig, sources: Sources<'a>) -> Self {
        let layout = DataLayout::new(&config.data_dir);
        Self {
            max_entities: config.harvest.max_entities_per_run,
            fetch_financials: config.harvest.fetch_financials,
            fiscal_month: config.disclosures.fiscal_month,
            master: MasterStore::new(&layout),
            prices: PriceStore::new(layout.clone()),
            financials: FinancialsStore::new(layout.clone()),
            documents: DocumentStore::new(layout),
            sources,
            credential: None,
            pacer: Box::new(RandomPacer::new(
                config.harvest.min_sleep_secs,
                config.harvest.max_sleep_secs,
            )),
            progress: &LogProgress,
        }
    }

    /// Enables the qualitative step.
    pub fn with_credential(mut self, credential: Option<Credential>) -> Self {
        self.credential = credential;
        self
    }

    pub fn with_pacer(mut self, pacer: Box<dyn Pacer + 'a>) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn with_progress(mut self, progress: &'a dyn HarvestProgress) -> Self {
        self.progress = progress;
        self
    }

    /// Run one batch.
    ///
    /// Only a missing or unreadable registry fails the call; everything that
    /// goes wrong for a single entity lands in the returned summary.
    pub fn harvest(&mut self, today: NaiveDate) -> Result<RunSummary, RunError> {
        let mut registry = self.master.load()?;

        let batch: Vec<EntityRecord> = select_batch(&registry, self.max_entities)
            .into_iter()
            .cloned()
            .collect();
        let total = batch.len();
        let mut summary = RunSummary::new(total);

        info!(
            entities = registry.len(),
            active = registry.active_count(),
            selected = total,
            %today,
            "starting harvest"
        );

        for (i, entity) in batch.iter().enumerate() {
            let code = entity.code.as_str();
            self.progress.on_start(code, &entity.name, i, total);
            let failures_before = summary.failures.len();

            registry = self.harvest_entity(registry, code, today, &mut summary)?;

            let reasons: Vec<String> = summary.failures[failures_before..]
                .iter()
                .map(|f| format!("{}: {}", f.category, f.reason))
                .collect();
            let outcome = if reasons.is_empty() {
                EntityOutcome::Ok
            } else {
                EntityOutcome::Failed(reasons)
            };
            self.progress.on_complete(code, i, total, &outcome);

            if !self.sources.prices.is_available() {
                warn!(
                    remaining = total - i - 1,
                    "price provider is blocking requests; stopping the batch"
                );
                for rest in &batch[i + 1..] {
                    summary.failed(&rest.code, Category::Price, DataError::CircuitBreakerTripped);
                }
                summary.aborted = true;
                break;
            }

            if i + 1 < total {
                self.pacer.pause();
            }
        }

        if let Err(e) = self.master.save(&registry) {
            warn!(error = %e, "registry compaction failed; journal kept for next load");
            summary.failed("", Category::Registry, &e);
        }

        self.progress.on_batch_complete(&summary);
        Ok(summary)
    }

    fn harvest_entity(
        &self,
        mut registry: Registry,
        code: &str,
        today: NaiveDate,
        summary: &mut RunSummary,
    ) -> Result<Registry, RunError> {
        match self.harvest_prices(code, today) {
            Ok(PriceOutcome::Written {
                fetched,
                stored,
                refetched,
            }) => {
                debug!(code, fetched, stored, refetched, "prices written");
                summary.succeeded(Category::Price);
                if refetched {
                    summary.full_refetches += 1;
                }
                registry = self.commit(registry, code, UpdateKind::Price, today, summary)?;
            }
            Ok(PriceOutcome::NoNewData) => summary.no_new_data(),
            Err(e) => {
                warn!(code, error = %e, "price update failed");
                summary.failed(code, Category::Price, &e);
            }
        }

        match self.sources.financials.filter(|_| self.fetch_financials) {
            None => summary.skipped(Category::Financials),
            Some(source) => match self.harvest_financials(source, code) {
                Ok(Some(rows)) => {
                    debug!(code, rows, "financials written");
                    summary.succeeded(Category::Financials);
                }
                Ok(None) => summary.skipped(Category::Financials),
                Err(e) => {
                    warn!(code, error = %e, "financials update failed");
                    summary.failed(code, Category::Financials, &e);
                }
            },
        }

        match (self.sources.disclosures, self.credential.as_ref()) {
            (Some(source), Some(credential)) => {
                match refresh_disclosure(
                    source,
                    &self.documents,
                    credential,
                    code,
                    today,
                    self.fiscal_month,
                ) {
                    Ok(DisclosureOutcome::Updated { period_key, sections }) => {
                        debug!(code, %period_key, sections, "disclosure updated");
                        summary.succeeded(Category::Qualitative);
                        registry = self.commit(registry, code, UpdateKind::Info, today, summary)?;
                    }
                    Ok(DisclosureOutcome::NotFound) => summary.skipped(Category::Qualitative),
                    Err(e) => {
                        warn!(code, error = %e, "disclosure update failed");
                        summary.failed(code, Category::Qualitative, &e);
                    }
                }
            }
            _ => summary.skipped(Category::Qualitative),
        }

        Ok(registry)
    }

    /// Persist one progress marker, then advance the in-memory snapshot.
    ///
    /// A journal write failure leaves the snapshot untouched so the entity is
    /// picked up again next run.
    fn commit(
        &self,
        registry: Registry,
        code: &str,
        kind: UpdateKind,
        today: NaiveDate,
        summary: &mut RunSummary,
    ) -> Result<Registry, RunError> {
        if let Err(e) = self.master.commit(code, kind, today) {
            warn!(code, error = %e, "journal commit failed");
            summary.failed(code, Category::Registry, &e);
            return Ok(registry);
        }
        let registry = registry
            .mark_updated(code, kind, today)
            .map_err(StoreError::from)?;
        Ok(registry)
    }

    /// Plan, fetch, merge and write one entity's price history.
    pub fn harvest_prices(&self, code: &str, today: NaiveDate) -> Result<PriceOutcome, EntityError> {
        let existing = self.prices.load(code)?;
        let last_known = existing.iter().map(|b| b.date).max();

        let action = check_corporate_action(self.sources.actions, code, last_known);
        let plan = plan_fetch(last_known, action.is_detected(), today);
        let Some(request) = plan.request() else {
            debug!(code, ?last_known, "prices up to date");
            return Ok(PriceOutcome::NoNewData);
        };

        let incoming = self.sources.prices.fetch_prices(code, request)?;
        if incoming.is_empty() {
            debug!(code, ?request, "no new bars");
            return Ok(PriceOutcome::NoNewData);
        }
        let fetched = incoming.len();

        let merged = merge_prices(&existing, incoming, plan.merge_mode())?;
        self.prices.write(code, &merged, self.sources.prices.name())?;

        Ok(PriceOutcome::Written {
            fetched,
            stored: merged.len(),
            refetched: action.is_detected(),
        })
    }

    /// Fetch and merge quarterly financials. `None` when the provider had no
    /// usable rows.
    pub fn harvest_financials(
        &self,
        source: &dyn FinancialsSource,
        code: &str,
    ) -> Result<Option<usize>, EntityError> {
        let incoming = drop_empty_rows(source.fetch_quarterly_financials(code)?);
        if incoming.is_empty() {
            return Ok(None);
        }
        let existing = self.financials.load(code)?;
        let merged = merge_financials(&existing, incoming, MergeMode::Incremental)?;
        self.financials.write(code, &merged)?;
        Ok(Some(merged.len()))
    }
}
