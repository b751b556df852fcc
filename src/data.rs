use crate::config::{
    self, DATE_FORMAT, FETCH_ATTEMPTS, FETCH_RETRY_DELAY_SECS, FETCH_TIMEOUT_SECS, YAHOO_CHART_URL,
};
use crate::error::InputError;
use anyhow::{Context, Result};
use chrono::{Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One trading day's closing price.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Closing prices for a symbol, ascending by date with no duplicate days.
#[derive(Clone, Debug)]
pub struct PriceSeries {
    pub symbol: String,
    pub points: Vec<PricePoint>,
}

/// Half-open date interval `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, InputError> {
        if start >= end {
            return Err(InputError::EmptyRange {
                start: start.format(DATE_FORMAT).to_string(),
                end: end.format(DATE_FORMAT).to_string(),
            });
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }
}

pub fn parse_date(text: &str) -> Result<NaiveDate, InputError> {
    let trimmed = text.trim();
    // chrono accepts "2024-1-5"; the format is strictly zero-padded.
    if trimmed.len() != 10 {
        return Err(InputError::InvalidDate { input: trimmed.to_string() });
    }
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .map_err(|_| InputError::InvalidDate { input: trimmed.to_string() })
}

pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// Normalizes `text` and checks it only uses ticker characters
/// (`A-Z`, `0-9`, `.`, `^`, `=`, `-`). The result is safe in URLs and file names.
pub fn parse_symbol(text: &str) -> Result<String, InputError> {
    let symbol = normalize_symbol(text);
    if symbol.is_empty() {
        return Err(InputError::MissingFields);
    }
    let valid = symbol
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, '.' | '^' | '=' | '-'));
    if !valid || symbol.chars().all(|c| c == '.') {
        return Err(InputError::InvalidSymbol { input: text.trim().to_string() });
    }
    Ok(symbol)
}

/// Weekdays are trading days. Exchange holidays are not modelled.
pub fn is_trading_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

pub fn next_trading_day(date: NaiveDate) -> NaiveDate {
    let mut next = date + Duration::days(1);
    while !is_trading_day(next) {
        next += Duration::days(1);
    }
    next
}

impl PriceSeries {
    /// Builds a series from unordered points, sorting and dropping repeated dates.
    pub fn new(symbol: &str, mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.date);
        points.dedup_by_key(|p| p.date);
        Self {
            symbol: normalize_symbol(symbol),
            points,
        }
    }

    /// Lays `closes` out on consecutive weekdays starting at `start`.
    pub fn from_closes(symbol: &str, start: NaiveDate, closes: &[f64]) -> Self {
        let mut date = start;
        while !is_trading_day(date) {
            date += Duration::days(1);
        }
        let mut points = Vec::with_capacity(closes.len());
        for &close in closes {
            points.push(PricePoint { date, close });
            date = next_trading_day(date);
        }
        Self::new(symbol, points)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn within(&self, range: &DateRange) -> Self {
        Self {
            symbol: self.symbol.clone(),
            points: self
                .points
                .iter()
                .filter(|p| range.contains(p.date))
                .copied()
                .collect(),
        }
    }

    /// Lowest and highest close, or `None` for an empty series.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        if self.is_empty() {
            return None;
        }
        let min = self.points.iter().map(|p| p.close).fold(f64::INFINITY, f64::min);
        let max = self.points.iter().map(|p| p.close).fold(f64::NEG_INFINITY, f64::max);
        Some((min, max))
    }

    pub fn ensure_not_empty(self) -> Result<Self, InputError> {
        if self.is_empty() {
            return Err(InputError::NoData { symbol: self.symbol });
        }
        Ok(self)
    }

    /// Random-walk series ending today.
    #[cfg(test)]
    pub fn new_mock(symbol: &str, days: usize) -> Self {
        let start = Utc::now().date_naive() - Duration::days((days as i64 * 7) / 5 + 2);
        Self::from_closes(symbol, start, &random_walk(days))
    }

    /// Random-walk series covering every weekday of `range`.
    pub fn mock_between(symbol: &str, range: &DateRange) -> Self {
        let mut days = 0;
        let mut date = range.start;
        while date < range.end {
            if is_trading_day(date) {
                days += 1;
            }
            date += Duration::days(1);
        }
        Self::from_closes(symbol, range.start, &random_walk(days))
    }
}

fn random_walk(days: usize) -> Vec<f64> {
    let mut rng = rand::thread_rng();
    let mut closes = Vec::with_capacity(days);
    let mut current_price: f64 = 100.0;
    for _ in 0..days {
        let volatility = 0.02; // 2% daily volatility
        let change_pct: f64 = rng.gen_range(-volatility..volatility);
        current_price *= 1.0 + change_pct;
        closes.push(current_price);
    }
    closes
}

// ── Yahoo chart endpoint ────────────────────────────────────────────────────

#[derive(Deserialize, Serialize, Debug)]
struct YahooChartResponse {
    chart: YahooChart,
}

#[derive(Deserialize, Serialize, Debug)]
struct YahooChart {
    result: Option<Vec<YahooResult>>,
    error: Option<YahooError>,
}

#[derive(Deserialize, Serialize, Debug)]
struct YahooError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Deserialize, Serialize, Debug)]
struct YahooResult {
    meta: Option<YahooMeta>,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: YahooIndicators,
}

#[derive(Deserialize, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct YahooMeta {
    exchange_timezone_name: Option<String>,
}

#[derive(Deserialize, Serialize, Debug)]
struct YahooIndicators {
    quote: Vec<YahooQuote>,
}

#[derive(Deserialize, Serialize, Debug)]
struct YahooQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

fn cache_file_path(cache_dir: &Path, symbol: &str, range: &DateRange) -> PathBuf {
    cache_dir.join(format!(
        "{}_{}_{}.json",
        symbol,
        range.start.format(DATE_FORMAT),
        range.end.format(DATE_FORMAT)
    ))
}

fn read_cache(path: &Path, ttl_secs: u64) -> Option<YahooChartResponse> {
    let metadata = std::fs::metadata(path).ok()?;
    let modified = metadata.modified().ok()?;
    let age = std::time::SystemTime::now()
        .duration_since(modified)
        .unwrap_or_default();
    if age.as_secs() >= ttl_secs {
        info!("Cache expired for {}", path.display());
        return None;
    }
    let file = std::fs::File::open(path).ok()?;
    let reader = std::io::BufReader::new(file);
    match serde_json::from_reader(reader) {
        Ok(resp) => Some(resp),
        Err(e) => {
            warn!("Ignoring unreadable cache file {}: {}", path.display(), e);
            None
        }
    }
}

fn write_cache(path: &Path, response: &YahooChartResponse) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    let writer = std::io::BufWriter::new(file);
    serde_json::to_writer(writer, response)?;
    Ok(())
}

fn midnight_utc(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| Utc.from_utc_datetime(&dt).timestamp())
        .unwrap_or_default()
}

async fn fetch_from_api(symbol: &str, range: &DateRange) -> Result<YahooChartResponse> {
    let url = format!(
        "{}/{}?period1={}&period2={}&interval=1d&events=history",
        YAHOO_CHART_URL,
        symbol,
        midnight_utc(range.start),
        midnight_utc(range.end)
    );
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(FETCH_TIMEOUT_SECS))
        .build()?;

    let mut attempts = 0;
    loop {
        attempts += 1;
        let result: Result<YahooChartResponse, reqwest::Error> = async {
            let resp = client
                .get(&url)
                .header("User-Agent", "Mozilla/5.0")
                .send()
                .await?
                .error_for_status()?;
            resp.json::<YahooChartResponse>().await
        }
        .await;

        match result {
            Ok(resp) => return Ok(resp),
            Err(e) => {
                if attempts >= FETCH_ATTEMPTS {
                    return Err(e).with_context(|| format!("Failed to fetch chart data for {}", symbol));
                }
                warn!(
                    "Failed to fetch data for {} (attempt {}/{}): {}",
                    symbol, attempts, FETCH_ATTEMPTS, e
                );
            }
        }

        tokio::time::sleep(std::time::Duration::from_secs(FETCH_RETRY_DELAY_SECS)).await;
    }
}

fn chart_to_series(symbol: &str, range: &DateRange, response: &YahooChartResponse) -> Result<PriceSeries, InputError> {
    if let Some(err) = &response.chart.error {
        warn!(
            "Chart endpoint returned an error for {}: {} {}",
            symbol,
            err.code.as_deref().unwrap_or("?"),
            err.description.as_deref().unwrap_or("")
        );
    }

    let Some(result) = response.chart.result.as_ref().and_then(|r| r.first()) else {
        return Err(InputError::NoData { symbol: symbol.to_string() });
    };
    let Some(quote) = result.indicators.quote.first() else {
        return Err(InputError::NoData { symbol: symbol.to_string() });
    };

    let tz: Tz = result
        .meta
        .as_ref()
        .and_then(|m| m.exchange_timezone_name.as_deref())
        .and_then(|name| name.parse().ok())
        .unwrap_or(chrono_tz::America::New_York);

    let mut points = Vec::with_capacity(result.timestamp.len());
    for (i, &timestamp) in result.timestamp.iter().enumerate() {
        let Some(Some(close)) = quote.close.get(i).copied() else {
            continue;
        };
        let Some(utc) = Utc.timestamp_opt(timestamp, 0).single() else {
            continue;
        };
        let date = utc.with_timezone(&tz).date_naive();
        if range.contains(date) {
            points.push(PricePoint { date, close });
        }
    }

    PriceSeries::new(symbol, points).ensure_not_empty()
}

/// Series from a fresh cache entry, if one exists and holds data.
fn series_from_cache(path: &Path, ttl_secs: u64, symbol: &str, range: &DateRange) -> Option<PriceSeries> {
    let response = read_cache(path, ttl_secs)?;
    match chart_to_series(symbol, range, &response) {
        Ok(series) => Some(series),
        Err(e) => {
            warn!("Ignoring cache file {}: {}", path.display(), e);
            None
        }
    }
}

/// Converts a fetched response and caches it only when it yields closes.
fn series_from_response(
    path: &Path,
    symbol: &str,
    range: &DateRange,
    response: &YahooChartResponse,
) -> Result<PriceSeries, InputError> {
    let series = chart_to_series(symbol, range, response)?;
    if let Err(e) = write_cache(path, response) {
        warn!("Failed to write cache for {}: {}", symbol, e);
    }
    Ok(series)
}

/// Fetches daily closing prices for `symbol` over `range` from Yahoo Finance.
///
/// Responses with data are cached on disk per (symbol, start, end) and reused
/// while younger than the configured TTL.
pub async fn fetch_closing_prices(symbol: &str, range: &DateRange) -> Result<PriceSeries> {
    let symbol = parse_symbol(symbol)?;
    let settings = config::settings();
    let cache_file = cache_file_path(&settings.cache_dir, &symbol, range);

    let series = match series_from_cache(&cache_file, settings.cache_ttl_secs, &symbol, range) {
        Some(series) => {
            info!("Loading {} from cache...", symbol);
            series
        }
        None => {
            info!("Cache miss for {}, fetching...", symbol);
            let resp = fetch_from_api(&symbol, range).await?;
            series_from_response(&cache_file, &symbol, range, &resp)?
        }
    };

    debug!("{}: {} closes in range", symbol, series.len());
    Ok(series)
}

/// Loads closing prices from a CSV export with `Date` and `Close` columns.
pub fn load_csv(path: &Path, symbol: &str) -> Result<PriceSeries> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let headers = reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let date_idx = column("date").ok_or_else(|| anyhow::anyhow!("{}: missing Date column", path.display()))?;
    let close_idx = column("close").ok_or_else(|| anyhow::anyhow!("{}: missing Close column", path.display()))?;

    let mut points = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let (Some(raw_date), Some(raw_close)) = (record.get(date_idx), record.get(close_idx)) else {
            continue;
        };
        if raw_close.is_empty() || raw_close.eq_ignore_ascii_case("null") {
            continue;
        }
        // Exports often carry a time suffix: "2024-01-02 00:00:00-05:00".
        let day = raw_date.split(|c: char| c == ' ' || c == 'T').next().unwrap_or(raw_date);
        let date = parse_date(day).with_context(|| format!("{}: row {}", path.display(), line + 2))?;
        let close: f64 = raw_close
            .parse()
            .with_context(|| format!("{}: row {}: bad close '{}'", path.display(), line + 2, raw_close))?;
        if !close.is_finite() {
            continue;
        }
        points.push(PricePoint { date, close });
    }

    info!("Loaded {} closes for {} from {}", points.len(), normalize_symbol(symbol), path.display());
    Ok(PriceSeries::new(symbol, points))
}

/// Where closing prices come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PriceSource {
    Yahoo,
    Csv(PathBuf),
    Mock,
}

impl PriceSource {
    /// Loads `symbol` over `range`; an empty result is [`InputError::NoData`].
    pub async fn load(&self, symbol: &str, range: &DateRange) -> Result<PriceSeries> {
        let symbol = parse_symbol(symbol)?;
        let series = match self {
            Self::Yahoo => fetch_closing_prices(&symbol, range).await?,
            Self::Csv(path) => load_csv(path, &symbol)?.within(range),
            Self::Mock => PriceSeries::mock_between(&symbol, range),
        };
        Ok(series.ensure_not_empty()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn dates(series: &PriceSeries) -> Vec<NaiveDate> {
        series.points.iter().map(|p| p.date).collect()
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2024-03-15").unwrap(), d("2024-03-15"));
        assert_eq!(parse_date(" 2024-03-15 ").unwrap(), d("2024-03-15"));
        assert!(matches!(parse_date("2024/03/15"), Err(InputError::InvalidDate { .. })));
        assert!(matches!(parse_date("2024-3-5"), Err(InputError::InvalidDate { .. })));
        assert!(matches!(parse_date("2024-02-30"), Err(InputError::InvalidDate { .. })));
        assert!(parse_date("").is_err());
    }

    #[test]
    fn test_date_range_is_half_open() {
        let range = DateRange::new(d("2024-01-01"), d("2024-01-10")).unwrap();
        assert!(range.contains(d("2024-01-01")));
        assert!(range.contains(d("2024-01-09")));
        assert!(!range.contains(d("2024-01-10")));
        assert!(DateRange::new(d("2024-01-10"), d("2024-01-10")).is_err());
        assert!(DateRange::new(d("2024-01-11"), d("2024-01-10")).is_err());
    }

    #[test]
    fn test_next_trading_day_skips_weekend() {
        // 2024-03-15 is a Friday.
        assert_eq!(next_trading_day(d("2024-03-15")), d("2024-03-18"));
        assert_eq!(next_trading_day(d("2024-03-18")), d("2024-03-19"));
    }

    #[test]
    fn test_parse_symbol() {
        assert_eq!(parse_symbol(" brk.b ").unwrap(), "BRK.B");
        assert_eq!(parse_symbol("^GSPC").unwrap(), "^GSPC");
        assert_eq!(parse_symbol("eurusd=x").unwrap(), "EURUSD=X");
        assert_eq!(parse_symbol("  "), Err(InputError::MissingFields));
        for bad in ["../x", "a/b", "AA PL", "..", "a\\b", "A?B"] {
            assert!(
                matches!(parse_symbol(bad), Err(InputError::InvalidSymbol { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_is_trading_day() {
        assert!(is_trading_day(d("2024-03-22")));
        assert!(!is_trading_day(d("2024-03-23")));
        assert!(!is_trading_day(d("2024-03-24")));
    }

    #[test]
    fn test_series_sorted_and_deduplicated() {
        let series = PriceSeries::new(
            " aapl ",
            vec![
                PricePoint { date: d("2024-01-03"), close: 3.0 },
                PricePoint { date: d("2024-01-02"), close: 2.0 },
                PricePoint { date: d("2024-01-03"), close: 9.0 },
            ],
        );
        assert_eq!(series.symbol, "AAPL");
        assert_eq!(dates(&series), vec![d("2024-01-02"), d("2024-01-03")]);
        assert_eq!(series.bounds(), Some((2.0, 3.0)));
    }

    #[test]
    fn test_from_closes_uses_weekdays() {
        let series = PriceSeries::from_closes("T", d("2024-03-16"), &[1.0, 2.0, 3.0]);
        assert_eq!(dates(&series), vec![d("2024-03-18"), d("2024-03-19"), d("2024-03-20")]);
        assert_eq!(series.closes(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_within_and_empty_check() {
        let series = PriceSeries::from_closes("T", d("2024-03-18"), &[1.0, 2.0, 3.0, 4.0]);
        let range = DateRange::new(d("2024-03-19"), d("2024-03-21")).unwrap();
        assert_eq!(series.within(&range).closes(), vec![2.0, 3.0]);

        let later = DateRange::new(d("2025-01-01"), d("2025-02-01")).unwrap();
        let err = series.within(&later).ensure_not_empty().unwrap_err();
        assert_eq!(err, InputError::NoData { symbol: "T".into() });
    }

    #[test]
    fn test_chart_to_series_converts_to_exchange_date() {
        // 2024-01-02 14:30 UTC is 09:30 in New York.
        let json = r#"{
            "chart": {
                "result": [{
                    "meta": { "exchangeTimezoneName": "America/New_York" },
                    "timestamp": [1704205800, 1704292200, 1704378600],
                    "indicators": { "quote": [{ "close": [185.64, null, 181.91] }] }
                }],
                "error": null
            }
        }"#;
        let resp: YahooChartResponse = serde_json::from_str(json).unwrap();
        let range = DateRange::new(d("2024-01-01"), d("2024-01-31")).unwrap();
        let series = chart_to_series("AAPL", &range, &resp).unwrap();
        assert_eq!(dates(&series), vec![d("2024-01-02"), d("2024-01-04")]);
        assert_eq!(series.closes(), vec![185.64, 181.91]);
    }

    #[test]
    fn test_chart_to_series_no_result_is_no_data() {
        let json = r#"{ "chart": { "result": null, "error": { "code": "Not Found", "description": "No data found, symbol may be delisted" } } }"#;
        let resp: YahooChartResponse = serde_json::from_str(json).unwrap();
        let range = DateRange::new(d("2024-01-01"), d("2024-01-31")).unwrap();
        let err = chart_to_series("ZZZZ", &range, &resp).unwrap_err();
        assert!(matches!(err, InputError::NoData { .. }));
    }

    #[test]
    fn test_cache_roundtrip_respects_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let range = DateRange::new(d("2024-01-01"), d("2024-02-01")).unwrap();
        let path = cache_file_path(dir.path(), "MSFT", &range);
        assert!(path.ends_with("MSFT_2024-01-01_2024-02-01.json"));

        let resp = YahooChartResponse {
            chart: YahooChart { result: Some(Vec::new()), error: None },
        };
        write_cache(&path, &resp).unwrap();
        assert!(read_cache(&path, 3600).is_some());
        assert!(read_cache(&path, 0).is_none());
    }

    #[test]
    fn test_error_response_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let range = DateRange::new(d("2024-01-01"), d("2024-01-31")).unwrap();
        let path = cache_file_path(dir.path(), "ZZZZ", &range);

        let json = r#"{ "chart": { "result": null, "error": { "code": "Not Found", "description": "No data found, symbol may be delisted" } } }"#;
        let resp: YahooChartResponse = serde_json::from_str(json).unwrap();
        let err = series_from_response(&path, "ZZZZ", &range, &resp).unwrap_err();
        assert!(matches!(err, InputError::NoData { .. }));
        assert!(!path.exists());

        // A bad entry left on disk is skipped rather than served.
        write_cache(&path, &resp).unwrap();
        assert!(series_from_cache(&path, 3600, "ZZZZ", &range).is_none());
    }

    #[test]
    fn test_good_response_is_cached_and_reused() {
        let dir = tempfile::tempdir().unwrap();
        let range = DateRange::new(d("2024-01-01"), d("2024-01-31")).unwrap();
        let path = cache_file_path(dir.path(), "AAPL", &range);

        let json = r#"{
            "chart": {
                "result": [{
                    "meta": { "exchangeTimezoneName": "America/New_York" },
                    "timestamp": [1704205800],
                    "indicators": { "quote": [{ "close": [185.64] }] }
                }],
                "error": null
            }
        }"#;
        let resp: YahooChartResponse = serde_json::from_str(json).unwrap();
        let series = series_from_response(&path, "AAPL", &range, &resp).unwrap();
        assert!(path.exists());

        let cached = series_from_cache(&path, 3600, "AAPL", &range).unwrap();
        assert_eq!(cached.points, series.points);
    }

    #[tokio::test]
    async fn test_price_source_rejects_path_like_symbols() {
        let range = DateRange::new(d("2024-01-01"), d("2024-01-31")).unwrap();
        let err = PriceSource::Mock.load("../x", &range).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<InputError>(),
            Some(&InputError::InvalidSymbol { input: "../x".into() })
        );
    }

    #[test]
    fn test_load_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Date,Open,High,Low,Close,Adj Close,Volume").unwrap();
        writeln!(file, "2024-01-03,1,1,1,11.5,11.0,100").unwrap();
        writeln!(file, "2024-01-02 00:00:00-05:00,1,1,1,10.25,10.0,100").unwrap();
        writeln!(file, "2024-01-04,1,1,1,null,null,100").unwrap();
        writeln!(file, "2024-01-05,1,1,1,,,100").unwrap();
        file.flush().unwrap();

        let series = load_csv(file.path(), "msft").unwrap();
        assert_eq!(series.symbol, "MSFT");
        assert_eq!(dates(&series), vec![d("2024-01-02"), d("2024-01-03")]);
        assert_eq!(series.closes(), vec![10.25, 11.5]);
    }

    #[test]
    fn test_load_csv_missing_close_column() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Date,Adj Close").unwrap();
        writeln!(file, "2024-01-02,10.0").unwrap();
        file.flush().unwrap();
        assert!(load_csv(file.path(), "X").is_err());
    }

    #[test]
    fn test_new_mock() {
        let series = PriceSeries::new_mock("TEST", 50);
        assert_eq!(series.len(), 50);
        for w in series.points.windows(2) {
            assert!(w[0].date < w[1].date);
            assert!(w[1].close > 0.0);
        }
    }

    #[test]
    fn test_mock_between_covers_weekdays() {
        let range = DateRange::new(d("2024-01-01"), d("2024-01-15")).unwrap();
        let series = PriceSeries::mock_between("mock", &range);
        assert_eq!(series.symbol, "MOCK");
        assert_eq!(series.len(), 10);
        assert_eq!(series.points[0].date, d("2024-01-01"));
        assert_eq!(series.last().unwrap().date, d("2024-01-12"));
    }

    #[tokio::test]
    async fn test_price_source_csv_filters_range() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Date,Close").unwrap();
        writeln!(file, "2024-01-02,10.0").unwrap();
        writeln!(file, "2024-01-03,11.0").unwrap();
        writeln!(file, "2024-01-04,12.0").unwrap();
        file.flush().unwrap();

        let source = PriceSource::Csv(file.path().to_path_buf());
        let range = DateRange::new(d("2024-01-03"), d("2024-01-04")).unwrap();
        let series = source.load("x", &range).await.unwrap();
        assert_eq!(series.closes(), vec![11.0]);

        let empty = DateRange::new(d("2023-01-01"), d("2023-02-01")).unwrap();
        let err = source.load("x", &empty).await.unwrap_err();
        assert_eq!(err.downcast_ref::<InputError>(), Some(&InputError::NoData { symbol: "X".into() }));
    }
}
