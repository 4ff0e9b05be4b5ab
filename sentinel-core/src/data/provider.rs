//! Data provider traits and structured error types.
//!
//! Every external collaborator (price history, quarterly financials,
//! corporate-action detection, disclosure extraction) sits behind a narrow
//! trait so providers can be swapped and mocked in tests. Calls return an
//! explicit `Result`; callers decide per call site whether a failure is
//! recoverable.

use crate::domain::{FinancialRow, PriceBar};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Structured error types for provider calls.
///
/// Displayable in the CLI and in the run summary.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("entity not found at provider: {code}")]
    EntityNotFound { code: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("source unreadable: {0}")]
    SourceUnreadable(String),

    #[error("data error: {0}")]
    Other(String),
}

/// How much price history to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceRequest {
    /// Entire available history.
    FullHistory,
    /// Bars dated on or after this day.
    Since(NaiveDate),
}

/// Daily price history.
pub trait PriceSource {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch split-adjusted daily bars. An empty vector means "no new data".
    fn fetch_prices(&self, code: &str, request: PriceRequest) -> Result<Vec<PriceBar>, DataError>;

    /// Check if the provider is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool;
}

/// Quarterly financial statements.
pub trait FinancialsSource {
    fn fetch_quarterly_financials(&self, code: &str) -> Result<Vec<FinancialRow>, DataError>;
}

/// Split / consolidation detection.
pub trait CorporateActionSource {
    /// True if any non-zero split ratio is dated strictly after `since`.
    fn has_action(&self, code: &str, since: NaiveDate) -> Result<bool, DataError>;
}

/// A qualitative extraction for one entity and one reporting period.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Disclosure {
    /// Fiscal period the document covers (e.g. `2024-03-31`), when the
    /// extractor could determine it.
    pub period_key: Option<String>,
    /// Section label → extracted text.
    pub sections: BTreeMap<String, String>,
}

/// Document extraction collaborator.
pub trait DisclosureSource {
    /// Returns `Ok(None)` when no document exists for the target date.
    fn extract(
        &self,
        code: &str,
        target_date: NaiveDate,
        credential: &Credential,
    ) -> Result<Option<Disclosure>, DataError>;
}

/// Opaque API credential for the disclosure service.
///
/// `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Option<Self> {
        let secret = secret.into();
        if secret.trim().is_empty() {
            None
        } else {
            Some(Self(secret))
        }
    }

    /// Read the credential from an environment variable.
    pub fn from_env(var: &str) -> Option<Self> {
        std::env::var(var).ok().and_then(Self::new)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}
