//! Master registry: one record per tracked entity.
//!
//! The registry is an immutable snapshot. Reconciliation against a freshly
//! observed listing and timestamp updates each return a new `Registry`; callers
//! hold on to the newest snapshot explicitly.
//!
//! Invariants:
//! - exactly one record per `code`
//! - the registry never shrinks: codes missing from a listing are deactivated

use crate::domain::entity::UNCLASSIFIED;
use crate::domain::{EntityRecord, UpdateKind};
use chrono::NaiveDate;
use std::collections::HashMap;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("duplicate entity code '{0}' in registry")]
    DuplicateCode(String),

    #[error("unknown entity code '{0}'")]
    UnknownCode(String),
}

/// One row of an observed listing (exchange universe file).
///
/// `None` means the listing did not carry that column for this row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListedEntity {
    pub code: String,
    pub name: Option<String>,
    pub market_segment: Option<String>,
    pub sector_33: Option<String>,
    pub sector_17: Option<String>,
}

impl ListedEntity {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// Immutable snapshot of the entity master.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registry {
    records: Vec<EntityRecord>,
    index: HashMap<String, usize>,
}

impl Registry {
    /// Build a registry, rejecting duplicate codes.
    pub fn new(records: Vec<EntityRecord>) -> Result<Self, RegistryError> {
        let mut index = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if index.insert(record.code.clone(), i).is_some() {
                return Err(RegistryError::DuplicateCode(record.code.clone()));
            }
        }
        Ok(Self { records, index })
    }

    fn from_unique(records: Vec<EntityRecord>) -> Self {
        let index = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.code.clone(), i))
            .collect();
        Self { records, index }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Records in registry order.
    pub fn records(&self) -> &[EntityRecord] {
        &self.records
    }

    pub fn get(&self, code: &str) -> Option<&EntityRecord> {
        self.index.get(code).map(|&i| &self.records[i])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn active(&self) -> impl Iterator<Item = &EntityRecord> {
        self.records.iter().filter(|r| r.is_active)
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    /// Full outer join of this snapshot with an observed listing, keyed by code.
    ///
    /// - name and classification: observed value, else existing, else default
    /// - `is_active`: true iff the code is in `observed`
    /// - `last_price_update` / `last_info_update`: always carried over
    /// - `last_updated`: `observed_on` for observed codes, else existing
    ///
    /// Existing records keep their order; new codes follow in listing order.
    /// Repeated codes in `observed` resolve to the last occurrence.
    pub fn reconcile(&self, observed: &[ListedEntity], observed_on: Option<NaiveDate>) -> Registry {
        let mut latest: HashMap<&str, &ListedEntity> = HashMap::with_capacity(observed.len());
        let mut listing_order: Vec<&str> = Vec::with_capacity(observed.len());
        for row in observed {
            if latest.insert(row.code.as_str(), row).is_none() {
                listing_order.push(row.code.as_str());
            }
        }

        let mut records = Vec::with_capacity(self.records.len() + observed.len());

        for existing in &self.records {
            let merged = match latest.get(existing.code.as_str()) {
                Some(seen) => merge_observed(Some(existing), seen, observed_on),
                None => EntityRecord {
                    is_active: false,
                    ..existing.clone()
                },
            };
            records.push(merged);
        }

        for code in listing_order {
            if self.index.contains_key(code) {
                continue;
            }
            if let Some(seen) = latest.get(code) {
                records.push(merge_observed(None, seen, observed_on));
            }
        }

        Registry::from_unique(records)
    }

    /// Set a progress timestamp for one entity, returning the new snapshot.
    pub fn mark_updated(
        mut self,
        code: &str,
        kind: UpdateKind,
        date: NaiveDate,
    ) -> Result<Registry, RegistryError> {
        let i = *self
            .index
            .get(code)
            .ok_or_else(|| RegistryError::UnknownCode(code.to_string()))?;
        let record = &mut self.records[i];
        match kind {
            UpdateKind::Price => record.last_price_update = Some(date),
            UpdateKind::Info => record.last_info_update = Some(date),
        }
        Ok(self)
    }
}

fn merge_observed(
    existing: Option<&EntityRecord>,
    seen: &ListedEntity,
    observed_on: Option<NaiveDate>,
) -> EntityRecord {
    let pick = |new: &Option<String>, old: Option<&String>, default: &str| -> String {
        new.clone()
            .filter(|s| !s.is_empty())
            .or_else(|| old.cloned())
            .unwrap_or_else(|| default.to_string())
    };

    EntityRecord {
        code: seen.code.clone(),
        name: pick(&seen.name, existing.map(|e| &e.name), ""),
        market_segment: pick(
            &seen.market_segment,
            existing.map(|e| &e.market_segment),
            UNCLASSIFIED,
        ),
        sector_33: pick(&seen.sector_33, existing.map(|e| &e.sector_33), UNCLASSIFIED),
        sector_17: pick(&seen.sector_17, existing.map(|e| &e.sector_17), UNCLASSIFIED),
        is_active: true,
        last_price_update: existing.and_then(|e| e.last_price_update),
        last_info_update: existing.and_then(|e| e.last_info_update),
        last_updated: observed_on.or_else(|| existing.and_then(|e| e.last_updated)),
    }
}

// ── Listing cleanup ─────────────────────────────────────────────────

/// Suffix the exchange appends to local security codes.
pub const EXCHANGE_SUFFIX: &str = ".T";

/// Normalize a raw listing code to the canonical `NNNN.T` form.
///
/// Accepts `7203`, `7203.0` (spreadsheet float), full-width `７２０３` and
/// already-suffixed codes.
/// Alphanumeric codes such as `130A` are kept as-is with the suffix added.
/// Returns `None` for blanks and anything that is not a security code.
pub fn normalize_code(raw: &str) -> Option<String> {
    let trimmed = clean_text(raw);
    if trimmed.is_empty() {
        return None;
    }
    if let Some(base) = trimmed.strip_suffix(EXCHANGE_SUFFIX) {
        return normalize_code(base);
    }
    let base = match trimmed.strip_suffix(".0") {
        Some(b) => b,
        None => trimmed.as_str(),
    };
    if base.is_empty() || !base.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    if !base.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return None;
    }
    let base = if base.chars().all(|c| c.is_ascii_digit()) {
        base.trim_start_matches('0').to_string()
    } else {
        base.to_ascii_uppercase()
    };
    if base.is_empty() {
        return None;
    }
    Some(format!("{base}{EXCHANGE_SUFFIX}"))
}

/// NFKC-fold listing text, then strip the invisible and full-width spacing
/// that listing spreadsheets carry.
pub fn clean_text(raw: &str) -> String {
    raw.nfkc()
        .collect::<String>()
        .replace('\u{a0}', " ")
        .replace('\u{3000}', " ")
        .replace('\u{200b}', "")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn existing() -> Registry {
        let mut a = EntityRecord::new("1111.T", "Alpha");
        a.sector_33 = "Banks".into();
        a.last_price_update = Some(d(2024, 1, 10));
        let mut b = EntityRecord::new("2222.T", "Beta");
        b.last_info_update = Some(d(2023, 7, 1));
        Registry::new(vec![a, b]).unwrap()
    }

    #[test]
    fn rejects_duplicate_codes() {
        let err = Registry::new(vec![
            EntityRecord::new("1111.T", "A"),
            EntityRecord::new("1111.T", "B"),
        ])
        .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateCode("1111.T".into()));
    }

    #[test]
    fn reconcile_never_drops_a_key() {
        let observed = vec![
            ListedEntity::new("2222.T", "Beta Holdings"),
            ListedEntity::new("3333.T", "Gamma"),
        ];
        let next = existing().reconcile(&observed, Some(d(2024, 2, 1)));

        let codes: Vec<&str> = next.records().iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["1111.T", "2222.T", "3333.T"]);
        assert!(!next.get("1111.T").unwrap().is_active);
        assert!(next.get("2222.T").unwrap().is_active);
        assert!(next.get("3333.T").unwrap().is_active);
    }

    #[test]
    fn reconcile_observed_values_win_with_fallback() {
        let observed = vec![ListedEntity {
            code: "1111.T".into(),
            name: Some("Alpha Corp".into()),
            market_segment: Some("Prime".into()),
            sector_33: None,
            sector_17: None,
        }];
        let next = existing().reconcile(&observed, None);
        let a = next.get("1111.T").unwrap();

        assert_eq!(a.name, "Alpha Corp");
        assert_eq!(a.market_segment, "Prime");
        assert_eq!(a.sector_33, "Banks");
        assert_eq!(a.sector_17, "-");
    }

    #[test]
    fn reconcile_preserves_timestamps() {
        let observed = vec![
            ListedEntity::new("1111.T", "Alpha"),
            ListedEntity::new("2222.T", "Beta"),
        ];
        let next = existing().reconcile(&observed, Some(d(2024, 5, 1)));

        assert_eq!(next.get("1111.T").unwrap().last_price_update, Some(d(2024, 1, 10)));
        assert_eq!(next.get("2222.T").unwrap().last_info_update, Some(d(2023, 7, 1)));
        assert_eq!(next.get("2222.T").unwrap().last_updated, Some(d(2024, 5, 1)));
    }

    #[test]
    fn deactivated_entity_reactivates_when_relisted() {
        let gone = existing().reconcile(&[ListedEntity::new("2222.T", "Beta")], None);
        assert!(!gone.get("1111.T").unwrap().is_active);

        let back = gone.reconcile(&[ListedEntity::new("1111.T", "Alpha")], None);
        assert!(back.get("1111.T").unwrap().is_active);
        assert!(!back.get("2222.T").unwrap().is_active);
    }

    #[test]
    fn reconcile_leaves_input_snapshot_untouched() {
        let before = existing();
        let _ = before.reconcile(&[], None);
        assert_eq!(before.active_count(), 2);
    }

    #[test]
    fn mark_updated_sets_only_requested_kind() {
        let next = existing()
            .mark_updated("2222.T", UpdateKind::Price, d(2024, 3, 3))
            .unwrap();
        let b = next.get("2222.T").unwrap();
        assert_eq!(b.last_price_update, Some(d(2024, 3, 3)));
        assert_eq!(b.last_info_update, Some(d(2023, 7, 1)));
    }

    #[test]
    fn mark_updated_unknown_code_errors() {
        let err = existing()
            .mark_updated("9999.T", UpdateKind::Info, d(2024, 3, 3))
            .unwrap_err();
        assert_eq!(err, RegistryError::UnknownCode("9999.T".into()));
    }

    #[test]
    fn normalizes_listing_codes() {
        assert_eq!(normalize_code("7203"), Some("7203.T".into()));
        assert_eq!(normalize_code("7203.0"), Some("7203.T".into()));
        assert_eq!(normalize_code(" 7203.T "), Some("7203.T".into()));
        assert_eq!(normalize_code("130a"), Some("130A.T".into()));
        assert_eq!(normalize_code("著作物"), None);
        assert_eq!(normalize_code(""), None);
    }

    #[test]
    fn cleans_spreadsheet_whitespace() {
        assert_eq!(clean_text("\u{3000}トヨタ\u{a0}自動車\u{200b} "), "トヨタ 自動車");
    }

    #[test]
    fn folds_full_width_listing_text() {
        assert_eq!(normalize_code("７２０３"), Some("7203.T".into()));
        assert_eq!(normalize_code("１３０Ａ"), Some("130A.T".into()));
        assert_eq!(clean_text("ＡＢＣ　ホールディングス"), "ABC ホールディングス");
        assert_eq!(clean_text("ｶﾌﾞｼｷｶﾞｲｼｬ"), "カブシキガイシャ");
    }
}
