//! Qualitative disclosure documents.
//!
//! One document per entity. Some sections are plain "latest" text that each
//! extraction overwrites; others keep one entry per reporting period, newest
//! period first.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// A section the extractor can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    BusinessDescription,
    HistorySummary,
    DividendPolicy,
    ShareholderBenefits,
}

/// How a section is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    /// Overwritten unconditionally.
    LatestWins,
    /// One entry per period key, most recent period at index 0.
    Historical,
}

impl Label {
    /// Recognize a section label, accepting the filing's own section titles.
    pub fn parse(raw: &str) -> Option<Label> {
        match raw.trim() {
            "business_description" | "事業の内容" => Some(Label::BusinessDescription),
            "history_summary" | "沿革" => Some(Label::HistorySummary),
            "dividend_policy" | "配当政策" => Some(Label::DividendPolicy),
            "shareholder_benefits" | "株主に対する特典" => Some(Label::ShareholderBenefits),
            _ => None,
        }
    }

    pub fn kind(self) -> LabelKind {
        match self {
            Label::BusinessDescription | Label::HistorySummary => LabelKind::LatestWins,
            Label::DividendPolicy | Label::ShareholderBenefits => LabelKind::Historical,
        }
    }
}

/// One period's text for a historical section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodEntry {
    #[serde(alias = "fiscal_year_end")]
    pub period_key: String,
    #[serde(alias = "report_date")]
    pub observed_at: NaiveDate,
    pub text: String,
}

/// Per-entity qualitative record, persisted as `{code}/info.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualitativeDocument {
    #[serde(alias = "ticker")]
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_summary: Option<String>,
    #[serde(default)]
    pub dividend_policy_history: Vec<PeriodEntry>,
    #[serde(default)]
    pub benefits_history: Vec<PeriodEntry>,
    #[serde(default)]
    pub last_updated: Option<NaiveDate>,
}

impl QualitativeDocument {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            business_description: None,
            history_summary: None,
            dividend_policy_history: Vec::new(),
            benefits_history: Vec::new(),
            last_updated: None,
        }
    }

    /// Fold one extraction into the document, returning the new snapshot.
    ///
    /// Unknown labels are ignored. `last_updated` becomes `observed_at` even
    /// when no recognized label was present.
    pub fn upsert(
        mut self,
        extraction: &BTreeMap<String, String>,
        period_key: &str,
        observed_at: NaiveDate,
    ) -> Self {
        for (raw_label, text) in extraction {
            let Some(label) = Label::parse(raw_label) else {
                debug!(code = %self.code, label = %raw_label, "ignoring unknown disclosure section");
                continue;
            };
            match label.kind() {
                LabelKind::LatestWins => {
                    if let Some(slot) = self.latest_mut(label) {
                        *slot = Some(text.clone());
                    }
                }
                LabelKind::Historical => {
                    if let Some(entries) = self.history_mut(label) {
                        upsert_period(entries, period_key, observed_at, text);
                    }
                }
            }
        }
        self.last_updated = Some(observed_at);
        self
    }

    fn latest_mut(&mut self, label: Label) -> Option<&mut Option<String>> {
        match label {
            Label::BusinessDescription => Some(&mut self.business_description),
            Label::HistorySummary => Some(&mut self.history_summary),
            Label::DividendPolicy | Label::ShareholderBenefits => None,
        }
    }

    fn history_mut(&mut self, label: Label) -> Option<&mut Vec<PeriodEntry>> {
        match label {
            Label::DividendPolicy => Some(&mut self.dividend_policy_history),
            Label::ShareholderBenefits => Some(&mut self.benefits_history),
            Label::BusinessDescription | Label::HistorySummary => None,
        }
    }

    /// Historical entries for a section, most recent first.
    pub fn history(&self, label: Label) -> &[PeriodEntry] {
        match label {
            Label::DividendPolicy => &self.dividend_policy_history,
            Label::ShareholderBenefits => &self.benefits_history,
            Label::BusinessDescription | Label::HistorySummary => &[],
        }
    }
}

fn upsert_period(entries: &mut Vec<PeriodEntry>, period_key: &str, observed_at: NaiveDate, text: &str) {
    if let Some(entry) = entries.iter_mut().find(|e| e.period_key == period_key) {
        entry.text = text.to_string();
        entry.observed_at = observed_at;
        return;
    }
    entries.insert(
        0,
        PeriodEntry {
            period_key: period_key.to_string(),
            observed_at,
            text: text.to_string(),
        },
    );
}
