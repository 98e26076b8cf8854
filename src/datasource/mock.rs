//! Mock data source for testing without network calls.

use super::{DailyPrice, DataSource, DataSourceError};
use crate::domain::{Account, AssetId, EarnedReport, LiveSnapshot, RawEvent, TimeMs};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Mock data source that returns predefined test data and counts calls.
#[derive(Debug, Clone, Default)]
pub struct MockDataSource {
    events: Vec<RawEvent>,
    snapshots: Vec<LiveSnapshot>,
    earned: Option<EarnedReport>,
    daily_prices: Vec<DailyPrice>,
    snapshot_fetches: Arc<AtomicUsize>,
    price_fetches: Arc<AtomicUsize>,
}

impl MockDataSource {
    /// Create a new mock data source with empty data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event.
    pub fn with_event(mut self, event: RawEvent) -> Self {
        self.events.push(event);
        self
    }

    /// Add multiple events.
    pub fn with_events(mut self, events: Vec<RawEvent>) -> Self {
        self.events.extend(events);
        self
    }

    /// Set the snapshot returned by every fetch.
    pub fn with_snapshot(mut self, snapshot: LiveSnapshot) -> Self {
        self.snapshots = vec![snapshot];
        self
    }

    /// Queue snapshots returned by successive fetches (last one repeats).
    pub fn with_snapshots(mut self, snapshots: Vec<LiveSnapshot>) -> Self {
        self.snapshots = snapshots;
        self
    }

    /// Set the earned report.
    pub fn with_earned(mut self, earned: EarnedReport) -> Self {
        self.earned = Some(earned);
        self
    }

    /// Add a historical daily price.
    pub fn with_daily_price(mut self, price: DailyPrice) -> Self {
        self.daily_prices.push(price);
        self
    }

    /// Number of snapshot fetches so far.
    pub fn snapshot_fetch_count(&self) -> usize {
        self.snapshot_fetches.load(Ordering::SeqCst)
    }

    /// Number of daily-price fetches so far.
    pub fn price_fetch_count(&self) -> usize {
        self.price_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSource for MockDataSource {
    async fn fetch_events(&self, _account: &Account) -> Result<Vec<RawEvent>, DataSourceError> {
        Ok(self.events.clone())
    }

    async fn fetch_snapshot(&self, _account: &Account) -> Result<LiveSnapshot, DataSourceError> {
        let n = self.snapshot_fetches.fetch_add(1, Ordering::SeqCst);
        match self.snapshots.get(n).or_else(|| self.snapshots.last()) {
            Some(snapshot) => Ok(snapshot.clone()),
            None => Ok(LiveSnapshot::empty(TimeMs::new(0))),
        }
    }

    async fn fetch_earned(
        &self,
        _account: &Account,
    ) -> Result<Option<EarnedReport>, DataSourceError> {
        Ok(self.earned.clone())
    }

    async fn fetch_daily_prices(
        &self,
        pairs: &[(AssetId, NaiveDate)],
    ) -> Result<Vec<DailyPrice>, DataSourceError> {
        if !pairs.is_empty() {
            self.price_fetches.fetch_add(1, Ordering::SeqCst);
        }
        Ok(self
            .daily_prices
            .iter()
            .filter(|p| pairs.iter().any(|(a, d)| a == &p.asset && d == &p.day))
            .cloned()
            .collect())
    }
}
