//! USD valuation resolver.
//!
//! Resolves a token amount to a USD value from a historical daily price
//! map with live-price fallback. Composite lookups are keyed by
//! `(AssetId, NaiveDate)` tuples, never by concatenated strings, so asset
//! identifiers containing separators cannot alias.

use crate::domain::{AssetId, Decimal};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

/// Which price basis a valuation uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceMode {
    /// Price on the day of the transaction, live fallback when absent.
    Historical,
    /// Current price only.
    Live,
}

/// The result of resolving one amount to USD.
///
/// `price_usd` is `None` when no price could be found at all; the value
/// then aggregates as zero rather than poisoning every downstream sum,
/// and the caller can render the missing valuation distinctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Valued {
    pub price_usd: Option<Decimal>,
    pub value_usd: Decimal,
}

/// Historical and live prices plus the pegged-asset set.
#[derive(Debug, Clone, Default)]
pub struct PriceBook {
    historical: BTreeMap<(AssetId, NaiveDate), Decimal>,
    live: BTreeMap<AssetId, Decimal>,
    pegged: BTreeSet<AssetId>,
}

impl PriceBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_historical(&mut self, asset: AssetId, day: NaiveDate, price: Decimal) {
        self.historical.insert((asset, day), price);
    }

    pub fn insert_live(&mut self, asset: AssetId, price: Decimal) {
        self.live.insert(asset, price);
    }

    pub fn mark_pegged(&mut self, asset: AssetId) {
        self.pegged.insert(asset);
    }

    pub fn with_historical(mut self, asset: AssetId, day: NaiveDate, price: Decimal) -> Self {
        self.insert_historical(asset, day, price);
        self
    }

    pub fn with_live(mut self, asset: AssetId, price: Decimal) -> Self {
        self.insert_live(asset, price);
        self
    }

    pub fn with_pegged(mut self, asset: AssetId) -> Self {
        self.mark_pegged(asset);
        self
    }

    /// True when the asset's price is defined as 1 in the display currency.
    pub fn is_pegged(&self, asset: &AssetId) -> bool {
        self.pegged.contains(asset)
    }

    pub fn live_price(&self, asset: &AssetId) -> Option<Decimal> {
        self.live.get(asset).copied()
    }

    pub fn historical_price(&self, asset: &AssetId, day: NaiveDate) -> Option<Decimal> {
        self.historical.get(&(asset.clone(), day)).copied()
    }

    /// The price in effect for (asset, day) under the given mode.
    ///
    /// Historical mode prefers the day's recorded price and falls back to
    /// the live price; Live mode ignores history entirely.
    pub fn price_at(&self, asset: &AssetId, day: NaiveDate, mode: PriceMode) -> Option<Decimal> {
        if self.is_pegged(asset) {
            return Some(Decimal::one());
        }
        match mode {
            PriceMode::Historical => self
                .historical_price(asset, day)
                .or_else(|| self.live_price(asset)),
            PriceMode::Live => self.live_price(asset),
        }
    }

    /// Resolve a USD valuation for an amount of an asset.
    ///
    /// Returns `None` for a zero amount: an absent valuation, not a zero
    /// one. Callers must treat it as "cannot display USD for this leg".
    pub fn value(
        &self,
        amount: Decimal,
        asset: &AssetId,
        day: NaiveDate,
        mode: PriceMode,
    ) -> Option<Valued> {
        if amount.is_zero() {
            return None;
        }
        if self.is_pegged(asset) {
            return Some(Valued {
                price_usd: Some(Decimal::one()),
                value_usd: amount,
            });
        }
        match self.price_at(asset, day, mode) {
            Some(price) => Some(Valued {
                price_usd: Some(price),
                value_usd: amount * price,
            }),
            None => Some(Valued {
                price_usd: None,
                value_usd: Decimal::zero(),
            }),
        }
    }
}
