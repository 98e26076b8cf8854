//! Data source abstraction for fetching the event log, the live position
//! snapshot, the earned-yield breakdown, and historical daily prices.

use crate::domain::{Account, AssetId, Decimal, EarnedReport, LiveSnapshot, RawEvent};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;

pub mod ledger;
pub mod mock;

pub use ledger::LedgerDataSource;
pub use mock::MockDataSource;

/// One historical daily closing price for an asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyPrice {
    pub asset: AssetId,
    pub day: NaiveDate,
    pub price_usd: Decimal,
}

/// Data source trait for the engine's external inputs.
///
/// Implementations must handle pagination, retry/backoff, and rate
/// limiting; the engine always consumes fully materialized arrays.
#[async_trait]
pub trait DataSource: Send + Sync + fmt::Debug {
    /// Fetch the complete raw event log for an account.
    async fn fetch_events(&self, account: &Account) -> Result<Vec<RawEvent>, DataSourceError>;

    /// Fetch the current position snapshot for an account.
    async fn fetch_snapshot(&self, account: &Account) -> Result<LiveSnapshot, DataSourceError>;

    /// Fetch the earned-yield breakdown for an account, when the
    /// collaborator can produce one.
    async fn fetch_earned(
        &self,
        account: &Account,
    ) -> Result<Option<EarnedReport>, DataSourceError>;

    /// Fetch historical daily prices for a batch of (asset, day) pairs.
    ///
    /// Pairs with no recorded price are simply absent from the result;
    /// the valuation resolver handles the fallback.
    async fn fetch_daily_prices(
        &self,
        pairs: &[(AssetId, NaiveDate)],
    ) -> Result<Vec<DailyPrice>, DataSourceError>;
}

/// Error type for data source operations.
#[derive(Debug, Clone, Error)]
pub enum DataSourceError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Rate limited")]
    RateLimited,
    #[error("Error: {0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datasource_error_display() {
        let err = DataSourceError::Network("connection timeout".to_string());
        assert_eq!(err.to_string(), "Network error: connection timeout");

        let err = DataSourceError::Http {
            status: 429,
            message: "Too many requests".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP error 429: Too many requests");

        let err = DataSourceError::Parse("invalid JSON".to_string());
        assert_eq!(err.to_string(), "Parse error: invalid JSON");

        assert_eq!(DataSourceError::RateLimited.to_string(), "Rate limited");
    }
}
