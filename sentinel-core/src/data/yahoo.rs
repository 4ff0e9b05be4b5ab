//! Yahoo Finance provider.
//!
//! - daily bars from the v8 chart API, split-adjusted with the `adjclose`
//!   ratio so stored prices are comparable across corporate actions
//! - split events from the same endpoint (`events=split`)
//! - quarterly income-statement lines from the fundamentals time-series API
//!
//! Every request goes through retry with exponential backoff and the shared
//! circuit breaker. Yahoo has no official API; format drift surfaces as
//! `DataError::ResponseFormatChanged`.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{
    CorporateActionSource, DataError, FinancialsSource, PriceRequest, PriceSource,
};
use crate::domain::{FinancialRow, PriceBar};
use chrono::{Days, NaiveDate};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const CHART_BASE: &str = "https://query2.finance.yahoo.com/v8/finance/chart";
const TIMESERIES_BASE: &str =
    "https://query2.finance.yahoo.com/ws/fundamentals-timeseries/v1/finance/timeseries";

/// Income-statement lines requested for quarterly financials.
pub const QUARTERLY_METRICS: &[&str] = &[
    "TotalRevenue",
    "CostOfRevenue",
    "GrossProfit",
    "OperatingExpense",
    "OperatingIncome",
    "PretaxIncome",
    "TaxProvision",
    "NetIncome",
    "EBITDA",
    "BasicEPS",
    "DilutedEPS",
];

// ── Chart API response ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
    events: Option<ChartEvents>,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct ChartEvents {
    splits: Option<HashMap<String, SplitEvent>>,
}

#[derive(Debug, Deserialize)]
struct SplitEvent {
    date: i64,
    numerator: f64,
    denominator: f64,
}

// ── Provider ────────────────────────────────────────────────────────

pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    fn chart_url(code: &str, request: PriceRequest) -> String {
        match request {
            PriceRequest::FullHistory => format!(
                "{CHART_BASE}/{code}?range=max&interval=1d&includeAdjustedClose=true&events=split"
            ),
            PriceRequest::Since(start) => {
                // One day of slack: exchanges east of UTC stamp bars the previous UTC day.
                let from = start.checked_sub_days(Days::new(1)).unwrap_or(start);
                format!(
                    "{CHART_BASE}/{code}?period1={}&period2={}&interval=1d\
                     &includeAdjustedClose=true&events=split",
                    day_start_ts(from),
                    chrono::Utc::now().timestamp()
                )
            }
        }
    }

    fn timeseries_url(code: &str) -> String {
        let types: Vec<String> = QUARTERLY_METRICS
            .iter()
            .map(|m| format!("quarterly{m}"))
            .collect();
        format!(
            "{TIMESERIES_BASE}/{code}?symbol={code}&type={}&period1=493590046&period2={}",
            types.join(","),
            chrono::Utc::now().timestamp()
        )
    }

    fn chart_data(code: &str, resp: ChartResponse) -> Result<ChartData, DataError> {
        let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) if err.code == "Not Found" => DataError::EntityNotFound {
                code: code.to_string(),
            },
            Some(err) => {
                DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
            }
            None => DataError::ResponseFormatChanged("empty result with no error".into()),
        })?;

        result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))
    }

    /// Convert chart data into split-adjusted bars dated in exchange-local time.
    fn parse_bars(data: ChartData, not_before: Option<NaiveDate>) -> Result<Vec<PriceBar>, DataError> {
        let offset = data.meta.as_ref().and_then(|m| m.gmtoffset).unwrap_or(0);
        let Some(timestamps) = data.timestamp else {
            // No trading days in the requested window.
            return Ok(Vec::new());
        };

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;
        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let date = local_date(ts, offset)?;
            if not_before.is_some_and(|start| date < start) {
                continue;
            }

            let open = quote.open.get(i).copied().flatten();
            let high = quote.high.get(i).copied().flatten();
            let low = quote.low.get(i).copied().flatten();
            let close = quote.close.get(i).copied().flatten();
            let volume = quote.volume.get(i).copied().flatten();

            // Holidays and suspended days come back with every field null.
            let Some(close) = close else { continue };
            if open.is_none() && high.is_none() && low.is_none() && volume.is_none() {
                continue;
            }

            let factor = adj_closes
                .as_ref()
                .and_then(|v| v.get(i).copied().flatten())
                .filter(|adj| adj.is_finite() && close != 0.0)
                .map_or(1.0, |adj| adj / close);

            bars.push(PriceBar {
                date,
                open: open.unwrap_or(f64::NAN) * factor,
                high: high.unwrap_or(f64::NAN) * factor,
                low: low.unwrap_or(f64::NAN) * factor,
                close: close * factor,
                volume: volume.unwrap_or(0),
            });
        }
        Ok(bars)
    }

    fn parse_splits(data: &ChartData) -> Result<Vec<(NaiveDate, f64)>, DataError> {
        let offset = data.meta.as_ref().and_then(|m| m.gmtoffset).unwrap_or(0);
        let Some(splits) = data.events.as_ref().and_then(|e| e.splits.as_ref()) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::with_capacity(splits.len());
        for split in splits.values() {
            let ratio = if split.denominator == 0.0 {
                0.0
            } else {
                split.numerator / split.denominator
            };
            out.push((local_date(split.date, offset)?, ratio));
        }
        out.sort_by_key(|(date, _)| *date);
        Ok(out)
    }

    /// Parse a fundamentals time-series payload into one row per period end.
    ///
    /// Each result carries one metric (`meta.type[0]`) as an array of nullable
    /// `{asOfDate, reportedValue: {raw}}` points. Every row gets every metric
    /// column so the stored table has a stable schema.
    fn parse_timeseries(code: &str, body: serde_json::Value) -> Result<Vec<FinancialRow>, DataError> {
        let results = body
            .pointer("/timeseries/result")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                DataError::ResponseFormatChanged(format!("no timeseries result for {code}"))
            })?;

        let mut by_period: BTreeMap<NaiveDate, FinancialRow> = BTreeMap::new();
        for result in results {
            let Some(type_key) = result.pointer("/meta/type/0").and_then(|v| v.as_str()) else {
                continue;
            };
            let metric = type_key.strip_prefix("quarterly").unwrap_or(type_key);
            let Some(points) = result.get(type_key).and_then(|v| v.as_array()) else {
                continue;
            };
            for point in points.iter().filter(|p| !p.is_null()) {
                let date = point
                    .get("asOfDate")
                    .and_then(|v| v.as_str())
                    .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
                    .ok_or_else(|| {
                        DataError::ResponseFormatChanged(format!(
                            "timeseries point without asOfDate for {code}"
                        ))
                    })?;
                let value = point.pointer("/reportedValue/raw").and_then(|v| v.as_f64());
                by_period
                    .entry(date)
                    .or_insert_with(|| FinancialRow::new(date))
                    .metrics
                    .insert(metric.to_string(), value);
            }
        }

        let rows = by_period
            .into_values()
            .map(|mut row| {
                for name in QUARTERLY_METRICS {
                    row.metrics.entry((*name).to_string()).or_insert(None);
                }
                row
            })
            .collect();
        Ok(rows)
    }

    /// GET a JSON document with retry and circuit breaker logic.
    fn get_json<T: DeserializeOwned>(&self, code: &str, url: &str) -> Result<T, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                debug!(code, attempt, ?delay, "retrying provider request");
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            match self.client.get(url).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::FORBIDDEN {
                        self.circuit_breaker.trip();
                        return Err(DataError::CircuitBreakerTripped);
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        self.circuit_breaker.record_failure();
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        last_error = Some(DataError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if status == reqwest::StatusCode::UNAUTHORIZED {
                        return Err(DataError::AuthenticationRequired(
                            "Yahoo Finance requires authentication".into(),
                        ));
                    }

                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(DataError::EntityNotFound {
                            code: code.to_string(),
                        });
                    }

                    if !status.is_success() {
                        self.circuit_breaker.record_failure();
                        last_error = Some(DataError::Other(format!("HTTP {status} for {code}")));
                        continue;
                    }

                    let body: T = resp.json().map_err(|e| {
                        DataError::ResponseFormatChanged(format!(
                            "failed to parse response for {code}: {e}"
                        ))
                    })?;
                    self.circuit_breaker.record_success();
                    return Ok(body);
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(DataError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

impl PriceSource for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_prices(&self, code: &str, request: PriceRequest) -> Result<Vec<PriceBar>, DataError> {
        let resp: ChartResponse = self.get_json(code, &Self::chart_url(code, request))?;
        let data = Self::chart_data(code, resp)?;
        let not_before = match request {
            PriceRequest::FullHistory => None,
            PriceRequest::Since(start) => Some(start),
        };
        Self::parse_bars(data, not_before)
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}

impl FinancialsSource for YahooProvider {
    fn fetch_quarterly_financials(&self, code: &str) -> Result<Vec<FinancialRow>, DataError> {
        let body: serde_json::Value = self.get_json(code, &Self::timeseries_url(code))?;
        Self::parse_timeseries(code, body)
    }
}

impl CorporateActionSource for YahooProvider {
    fn has_action(&self, code: &str, since: NaiveDate) -> Result<bool, DataError> {
        let resp: ChartResponse =
            self.get_json(code, &Self::chart_url(code, PriceRequest::Since(since)))?;
        let data = Self::chart_data(code, resp)?;
        let splits = Self::parse_splits(&data)?;
        Ok(splits
            .iter()
            .any(|(date, ratio)| *date > since && *ratio != 0.0 && ratio.is_finite()))
    }
}

fn day_start_ts(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

fn local_date(ts: i64, gmtoffset: i64) -> Result<NaiveDate, DataError> {
    chrono::DateTime::from_timestamp(ts + gmtoffset, 0)
        .map(|dt| dt.naive_utc().date())
        .ok_or_else(|| DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}")))
}
