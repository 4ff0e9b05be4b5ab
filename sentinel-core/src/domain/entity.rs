//! EntityRecord: one row of the entity master table.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// Placeholder for a classification field nobody has observed yet.
pub const UNCLASSIFIED: &str = "-";

/// One tracked equity.
///
/// Field order is the column order of `stocks_master.csv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "unclassified")]
    pub market_segment: String,
    #[serde(default = "unclassified")]
    pub sector_33: String,
    #[serde(default = "unclassified")]
    pub sector_17: String,
    #[serde(default = "active_by_default", deserialize_with = "lenient_bool")]
    pub is_active: bool,
    #[serde(default, deserialize_with = "lenient_date")]
    pub last_price_update: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub last_info_update: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub last_updated: Option<NaiveDate>,
}

impl EntityRecord {
    /// A freshly listed, never-fetched entity.
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            market_segment: unclassified(),
            sector_33: unclassified(),
            sector_17: unclassified(),
            is_active: true,
            last_price_update: None,
            last_info_update: None,
            last_updated: None,
        }
    }
}

/// Which progress marker a successful fetch advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    /// Price (and financials) harvest.
    Price,
    /// Qualitative disclosure extraction.
    Info,
}

fn unclassified() -> String {
    UNCLASSIFIED.to_string()
}

fn active_by_default() -> bool {
    true
}

/// Accepts `true`/`false` in any case plus `1`/`0`; tables written by
/// spreadsheet tools use `True`/`False`.
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(true),
        Some(s) if s.eq_ignore_ascii_case("true") || s == "1" => Ok(true),
        Some(s) if s.eq_ignore_ascii_case("false") || s == "0" => Ok(false),
        Some(other) => Err(serde::de::Error::custom(format!(
            "invalid is_active value '{other}'"
        ))),
    }
}

/// Empty, `nan`, `None` and other unparseable values all mean "never".
fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| parse_date_prefix(s.trim())))
}

/// Parse `YYYY-MM-DD`, tolerating a trailing time component.
pub fn parse_date_prefix(s: &str) -> Option<NaiveDate> {
    let head = s.get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entity_is_active_and_unfetched() {
        let e = EntityRecord::new("7203.T", "Toyota");
        assert!(e.is_active);
        assert_eq!(e.sector_33, "-");
        assert_eq!(e.last_price_update, None);
    }

    #[test]
    fn parses_date_with_time_suffix() {
        assert_eq!(
            parse_date_prefix("2024-06-30 00:00:00"),
            NaiveDate::from_ymd_opt(2024, 6, 30)
        );
        assert_eq!(parse_date_prefix("nan"), None);
        assert_eq!(parse_date_prefix(""), None);
    }

    #[test]
    fn csv_row_with_spreadsheet_booleans_and_nan_dates() {
        let data = "code,name,is_active,last_price_update,last_info_update\n\
                    7203.T,Toyota,True,2024-01-05,nan\n\
                    6758.T,Sony,False,,\n";
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let rows: Vec<EntityRecord> = reader.deserialize().collect::<Result<_, _>>().unwrap();

        assert_eq!(rows.len(), 2);
        assert!(rows[0].is_active);
        assert_eq!(rows[0].last_price_update, NaiveDate::from_ymd_opt(2024, 1, 5));
        assert_eq!(rows[0].last_info_update, None);
        assert_eq!(rows[0].market_segment, "-");
        assert!(!rows[1].is_active);
        assert_eq!(rows[1].last_price_update, None);
    }
}
