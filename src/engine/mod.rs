//! Pure P&L computation engine.
//!
//! The whole pipeline — classify, aggregate, reconcile, borrow-cost — is
//! one synchronous pure function of `(events, snapshot, earned, flags)`.
//! Nothing in here reads ambient state; preference flags arrive as
//! explicit parameters and any change to any input means a full
//! recomputation from scratch.

use crate::domain::{
    sort_events_deterministic, ActionType, AssetId, Decimal, EarnedReport, FlowSource,
    LiveSnapshot, NormalizedTransaction, PoolId, RawEvent,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub mod aggregate;
pub mod borrow;
pub mod classify;
pub mod reconcile;
pub mod valuation;

pub use aggregate::{
    aggregate, Aggregates, CumulativePoint, EmissionTotals, PoolBreakdown, SourceTotals,
};
pub use borrow::{compute_borrow_cost, BorrowCosts, DebtCost};
pub use classify::{classify, classify_all, Classified};
pub use reconcile::{reconcile, PoolPnl, Reconciled, SourcePnl};
pub use valuation::{PriceBook, PriceMode, Valued};

/// Display preference flags. Externally owned and persisted; the engine
/// only ever receives them as parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePreferences {
    /// Include market price movement in headline unrealized figures.
    pub show_price_changes: bool,
    /// Value BLND claims at the price in effect when claimed, rather
    /// than today's price.
    pub use_historical_blnd_prices: bool,
}

impl Default for PricePreferences {
    fn default() -> Self {
        Self {
            show_price_changes: false,
            use_historical_blnd_prices: true,
        }
    }
}

/// Which headline the caller should render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Headline {
    /// No open borrows: plain total P&L.
    TotalPnl,
    /// Open debt exists: supply-side P&L net of borrow costs.
    NetPnl,
}

/// The engine's output. Rebuilt from scratch on every input change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PnlResult {
    pub total_deposited_usd: Decimal,
    pub total_withdrawn_usd: Decimal,
    /// Cumulative-series definition of realized profit: claimed
    /// emissions USD only.
    pub realized_pnl: Decimal,
    pub pool: SourcePnl,
    pub backstop: SourcePnl,
    pub per_pool: BTreeMap<PoolId, PoolPnl>,
    pub emissions: EmissionTotals,
    pub cumulative_realized: Vec<CumulativePoint>,
    pub cumulative_by_source: BTreeMap<FlowSource, Vec<CumulativePoint>>,
    pub cumulative_by_pool: BTreeMap<PoolId, Vec<CumulativePoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_activity: Option<NaiveDate>,
    pub days_active: i64,
    pub total_pnl: Decimal,
    pub headline_unrealized: Decimal,
    pub borrow: BorrowCosts,
    pub headline: Headline,
    /// `total_pnl - borrow.total_cost_usd`; present only under the
    /// NetPnl headline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_pnl: Option<Decimal>,
    pub transactions: Vec<NormalizedTransaction>,
}

/// Assemble the price book the valuation resolver works from.
///
/// Live prices come from snapshot positions; emission assets observed in
/// the event log but absent from positions bind to the snapshot's BLND
/// and LP-token scalar prices.
fn build_price_book(
    events: &[RawEvent],
    snapshot: &LiveSnapshot,
    historical: &BTreeMap<(AssetId, NaiveDate), Decimal>,
    pegged: &BTreeSet<AssetId>,
) -> PriceBook {
    let mut book = PriceBook::new();
    for ((asset, day), price) in historical {
        book.insert_historical(asset.clone(), *day, *price);
    }
    for asset in pegged {
        book.mark_pegged(asset.clone());
    }
    for (asset, price) in snapshot.live_prices() {
        book.insert_live(asset, price);
    }
    for event in events {
        if book.live_price(&event.asset_address).is_some() {
            continue;
        }
        let scalar = if event.asset_symbol.is_blnd() {
            snapshot.blnd_price
        } else {
            match event.action {
                ActionType::BackstopDeposit
                | ActionType::BackstopWithdraw
                | ActionType::BackstopClaim => snapshot.lp_token_price,
                _ => None,
            }
        };
        if let Some(price) = scalar {
            book.insert_live(event.asset_address.clone(), price);
        }
    }
    book
}

/// Days from the first activity through the snapshot time, inclusive.
fn days_active(first_activity: Option<NaiveDate>, snapshot: &LiveSnapshot) -> i64 {
    match first_activity {
        Some(first) => {
            let span = (snapshot.fetched_at.day() - first).num_days() + 1;
            span.max(0)
        }
        None => 0,
    }
}

/// Run the full P&L pipeline.
///
/// Callers must gate invocation on readiness: both the event log and the
/// snapshot must have loaded (see the orchestration layer). Re-running
/// with identical inputs reproduces identical output.
pub fn compute_pnl(
    events: &[RawEvent],
    snapshot: &LiveSnapshot,
    historical: &BTreeMap<(AssetId, NaiveDate), Decimal>,
    pegged: &BTreeSet<AssetId>,
    earned: Option<&EarnedReport>,
    prefs: &PricePreferences,
) -> PnlResult {
    let mut ordered = events.to_vec();
    sort_events_deterministic(&mut ordered);

    let book = build_price_book(&ordered, snapshot, historical, pegged);
    let classified = classify_all(&ordered, &book, prefs);
    let agg = aggregate(&classified.transactions);
    let reconciled = reconcile(&agg, snapshot, earned, prefs);
    let borrow = compute_borrow_cost(&classified.borrow_flows, snapshot, prefs);

    let headline = if borrow.has_open_debt {
        Headline::NetPnl
    } else {
        Headline::TotalPnl
    };
    let net_pnl = match headline {
        Headline::NetPnl => Some(reconciled.total_pnl - borrow.total_cost_usd),
        Headline::TotalPnl => None,
    };

    PnlResult {
        total_deposited_usd: agg.total_deposited(),
        total_withdrawn_usd: agg.total_withdrawn(),
        realized_pnl: agg.emissions.usd_value,
        pool: reconciled.pool,
        backstop: reconciled.backstop,
        per_pool: reconciled.per_pool,
        emissions: agg.emissions,
        cumulative_realized: agg.series,
        cumulative_by_source: agg.series_by_source,
        cumulative_by_pool: agg.series_by_pool,
        first_activity: agg.first_activity,
        days_active: days_active(agg.first_activity, snapshot),
        total_pnl: reconciled.total_pnl,
        headline_unrealized: reconciled.headline_unrealized,
        borrow,
        headline,
        net_pnl,
        transactions: classified.transactions,
    }
}
