//! Market-move trigger for breaking-news posts.
//!
//! The latest close is compared with the one before it. When the absolute
//! change reaches the threshold a post is written. There is no smoothing
//! and no memory between runs: a move that crosses the threshold triggers
//! every time it is evaluated.

use crate::error::{PostError, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Percent change from `previous` to `current`.
pub fn percent_change(previous: f64, current: f64) -> f64 {
    (current - previous) / previous * 100.0
}

/// Whether the move from `previous` to `current` is big enough to post about.
pub fn should_emit(previous: f64, current: f64, threshold_percent: f64) -> bool {
    percent_change(previous, current).abs() >= threshold_percent
}

/// The two closes a decision is based on.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    pub ticker: String,
    pub previous: f64,
    pub price: f64,
    pub change_percent: f64,
}

impl MarketSnapshot {
    /// Build a snapshot from a close history, oldest first.
    ///
    /// Fails with [`PostError::DataUnavailable`] when there are fewer than
    /// two closes or the previous close can't be divided by.
    pub fn from_closes(ticker: &str, closes: &[f64]) -> Result<Self> {
        let [.., previous, price] = closes else {
            return Err(PostError::DataUnavailable(format!(
                "{ticker}: need two closes, got {}",
                closes.len()
            )));
        };
        if !(previous.is_finite() && price.is_finite()) || *previous <= 0.0 {
            return Err(PostError::DataUnavailable(format!(
                "{ticker}: unusable closes {previous} -> {price}"
            )));
        }

        Ok(Self {
            ticker: ticker.to_string(),
            previous: *previous,
            price: *price,
            change_percent: percent_change(*previous, *price),
        })
    }

    pub fn should_emit(&self, threshold_percent: f64) -> bool {
        should_emit(self.previous, self.price, threshold_percent)
    }

    /// `+1.52` / `-2.00`
    pub fn signed_change(&self) -> String {
        let sign = if self.change_percent > 0.0 { "+" } else { "" };
        format!("{sign}{:.2}", self.change_percent)
    }

    pub fn trend(&self) -> &'static str {
        if self.change_percent > 0.0 { "surge" } else { "plunge" }
    }
}

/// Source of daily closing prices.
pub trait QuoteSource {
    /// Recent daily closes for `ticker`, oldest first.
    async fn closes(&self, ticker: &str) -> Result<Vec<f64>>;
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// Extract closes from a Yahoo Finance chart payload, skipping the nulls
/// Yahoo emits for sessions without a trade.
pub fn parse_chart_closes(payload: &str) -> Result<Vec<f64>> {
    let resp: ChartResponse = serde_json::from_str(payload)?;
    if let Some(err) = resp.chart.error.filter(|e| !e.is_null()) {
        return Err(PostError::DataUnavailable(format!("chart API error: {err}")));
    }
    let closes = resp
        .chart
        .result
        .unwrap_or_default()
        .into_iter()
        .next()
        .and_then(|r| r.indicators.quote.into_iter().next())
        .map(|q| q.close.into_iter().flatten().collect())
        .unwrap_or_default();
    Ok(closes)
}

/// Daily closes from the Yahoo Finance chart API over a five-day window.
#[derive(Debug)]
pub struct YahooQuotes {
    client: reqwest::Client,
    base_url: String,
}

impl YahooQuotes {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: "https://query1.finance.yahoo.com/v8/finance/chart".to_string(),
        })
    }
}

impl QuoteSource for YahooQuotes {
    #[instrument(level = "info", skip(self))]
    async fn closes(&self, ticker: &str) -> Result<Vec<f64>> {
        let url = format!(
            "{}/{}?range=5d&interval=1d",
            self.base_url,
            urlencoding::encode(ticker)
        );
        let unavailable = |e: PostError| match e {
            PostError::DataUnavailable(_) => e,
            other => PostError::DataUnavailable(format!("{ticker}: {other}")),
        };

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| unavailable(e.into()))?;
        if !resp.status().is_success() {
            return Err(PostError::DataUnavailable(format!(
                "{ticker}: quote API returned HTTP {}",
                resp.status()
            )));
        }
        let body = resp.text().await.map_err(|e| unavailable(e.into()))?;
        let closes = parse_chart_closes(&body).map_err(unavailable)?;
        debug!(?closes, "Fetched closes");
        info!(count = closes.len(), "Fetched market history");
        Ok(closes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_emit_at_and_above_threshold() {
        assert!(should_emit(100.0, 101.5, 1.0));
        assert!(!should_emit(100.0, 100.5, 1.0));
        assert!(should_emit(100.0, 98.0, 1.0));
        assert!(should_emit(100.0, 101.0, 1.0));
    }

    #[test]
    fn test_percent_change_sign() {
        assert!((percent_change(200.0, 190.0) + 5.0).abs() < 1e-9);
        assert!((percent_change(50.0, 51.0) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_uses_last_two_closes() {
        let snap = MarketSnapshot::from_closes("VOO", &[90.0, 100.0, 101.5]).unwrap();
        assert_eq!(snap.previous, 100.0);
        assert_eq!(snap.price, 101.5);
        assert_eq!(snap.signed_change(), "+1.50");
        assert_eq!(snap.trend(), "surge");
        assert!(snap.should_emit(1.0));
        assert!(!snap.should_emit(2.0));
    }

    #[test]
    fn test_snapshot_negative_move() {
        let snap = MarketSnapshot::from_closes("VOO", &[100.0, 98.0]).unwrap();
        assert_eq!(snap.signed_change(), "-2.00");
        assert_eq!(snap.trend(), "plunge");
    }

    #[test]
    fn test_snapshot_needs_two_closes() {
        for closes in [&[][..], &[100.0][..]] {
            let err = MarketSnapshot::from_closes("VOO", closes).unwrap_err();
            assert!(matches!(err, PostError::DataUnavailable(_)));
            assert!(!err.is_fatal());
        }
    }

    #[test]
    fn test_snapshot_rejects_zero_previous() {
        assert!(MarketSnapshot::from_closes("X", &[0.0, 1.0]).is_err());
    }

    #[test]
    fn test_parse_chart_closes_skips_nulls() {
        let payload = r#"{"chart":{"result":[{"meta":{"symbol":"VOO"},"timestamp":[1,2,3],
            "indicators":{"quote":[{"close":[500.1,null,505.25],"open":[1,2,3]}]}}],"error":null}}"#;
        assert_eq!(parse_chart_closes(payload).unwrap(), vec![500.1, 505.25]);
    }

    #[test]
    fn test_parse_chart_error() {
        let payload = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found"}}}"#;
        let err = parse_chart_closes(payload).unwrap_err();
        assert!(matches!(err, PostError::DataUnavailable(_)));
    }
}
