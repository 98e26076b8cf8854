//! Live position snapshot and earned-yield breakdown inputs.

use crate::domain::{AssetId, Decimal, PoolId, TimeMs};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A current lending-pool position for one (pool, asset).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolPosition {
    pub pool_id: PoolId,
    pub asset: AssetId,
    /// USD value of supplied (incl. collateral) tokens right now.
    pub supply_usd: Decimal,
    /// Outstanding borrowed token amount (human units).
    pub borrow_amount: Decimal,
    /// Current USD price of the asset.
    pub price_usd: Decimal,
}

/// A current backstop position for one pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackstopPosition {
    pub pool_id: PoolId,
    /// USD value of backstop shares right now.
    pub lp_tokens_usd: Decimal,
    /// Unclaimed emissions, in BLND.
    pub claimable_blnd: Decimal,
}

/// Point-in-time truth source for current balances and prices.
///
/// Supplied per refresh by the external position source; never
/// retroactively edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveSnapshot {
    pub positions: Vec<PoolPosition>,
    pub backstop_positions: Vec<BackstopPosition>,
    pub blnd_price: Option<Decimal>,
    pub lp_token_price: Option<Decimal>,
    pub total_backstop_usd: Decimal,
    pub total_emissions: Decimal,
    /// When the position source produced this snapshot.
    pub fetched_at: TimeMs,
}

impl LiveSnapshot {
    /// An empty snapshot: no positions anywhere.
    pub fn empty(fetched_at: TimeMs) -> Self {
        Self {
            positions: Vec::new(),
            backstop_positions: Vec::new(),
            blnd_price: None,
            lp_token_price: None,
            total_backstop_usd: Decimal::zero(),
            total_emissions: Decimal::zero(),
            fetched_at,
        }
    }

    /// Current per-asset live prices observed in pool positions.
    pub fn live_prices(&self) -> BTreeMap<AssetId, Decimal> {
        self.positions
            .iter()
            .map(|p| (p.asset.clone(), p.price_usd))
            .collect()
    }

    /// Total current supply-side USD value across pools.
    pub fn total_supply_usd(&self) -> Decimal {
        let mut total = Decimal::zero();
        for p in &self.positions {
            total += p.supply_usd;
        }
        total
    }

    /// Current supply-side USD value for one pool.
    pub fn pool_supply_usd(&self, pool_id: &PoolId) -> Decimal {
        let mut total = Decimal::zero();
        for p in self.positions.iter().filter(|p| &p.pool_id == pool_id) {
            total += p.supply_usd;
        }
        total
    }

    /// Current backstop USD value for one pool.
    pub fn pool_backstop_usd(&self, pool_id: &PoolId) -> Decimal {
        let mut total = Decimal::zero();
        for p in self
            .backstop_positions
            .iter()
            .filter(|p| &p.pool_id == pool_id)
        {
            total += p.lp_tokens_usd;
        }
        total
    }

    /// True if any position carries nonzero outstanding debt.
    pub fn has_open_debt(&self) -> bool {
        self.positions.iter().any(|p| p.borrow_amount.is_positive())
    }
}

/// Protocol-yield vs. price-movement split of a current unrealized gain.
///
/// Computed by the external yield-breakdown collaborator; this engine only
/// selects and sums the components, it never derives the split itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarnedBreakdown {
    pub yield_usd: Decimal,
    pub price_change_usd: Decimal,
}

impl EarnedBreakdown {
    /// The component sum the display toggle selects.
    pub fn select(&self, include_price_changes: bool) -> Decimal {
        if include_price_changes {
            self.yield_usd + self.price_change_usd
        } else {
            self.yield_usd
        }
    }
}

/// Earned breakdowns for every pool, lending and backstop legs
/// separately, per refresh.
///
/// Source-level figures are always derived by summing the per-pool
/// entries, so the hero total, per-source and per-pool numbers cannot
/// disagree.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarnedReport {
    pub lending: BTreeMap<PoolId, EarnedBreakdown>,
    pub backstop: BTreeMap<PoolId, EarnedBreakdown>,
}

impl EarnedReport {
    fn sum(map: &BTreeMap<PoolId, EarnedBreakdown>) -> EarnedBreakdown {
        let mut total = EarnedBreakdown::default();
        for breakdown in map.values() {
            total.yield_usd += breakdown.yield_usd;
            total.price_change_usd += breakdown.price_change_usd;
        }
        total
    }

    /// Lending-side breakdown summed across pools.
    pub fn lending_total(&self) -> EarnedBreakdown {
        Self::sum(&self.lending)
    }

    /// Backstop-side breakdown summed across pools.
    pub fn backstop_total(&self) -> EarnedBreakdown {
        Self::sum(&self.backstop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn snapshot() -> LiveSnapshot {
        LiveSnapshot {
            positions: vec![
                PoolPosition {
                    pool_id: PoolId::new("pool-1"),
                    asset: AssetId::new("CUSDC"),
                    supply_usd: d("1000"),
                    borrow_amount: Decimal::zero(),
                    price_usd: d("1"),
                },
                PoolPosition {
                    pool_id: PoolId::new("pool-1"),
                    asset: AssetId::new("CXLM"),
                    supply_usd: d("250"),
                    borrow_amount: d("100"),
                    price_usd: d("0.12"),
                },
                PoolPosition {
                    pool_id: PoolId::new("pool-2"),
                    asset: AssetId::new("CUSDC"),
                    supply_usd: d("500"),
                    borrow_amount: Decimal::zero(),
                    price_usd: d("1"),
                },
            ],
            backstop_positions: vec![BackstopPosition {
                pool_id: PoolId::new("pool-1"),
                lp_tokens_usd: d("300"),
                claimable_blnd: d("12"),
            }],
            blnd_price: Some(d("0.05")),
            lp_token_price: Some(d("0.5")),
            total_backstop_usd: d("300"),
            total_emissions: d("12"),
            fetched_at: TimeMs::new(1_700_000_000_000),
        }
    }

    #[test]
    fn test_totals_per_pool() {
        let snap = snapshot();
        assert_eq!(snap.total_supply_usd(), d("1750"));
        assert_eq!(snap.pool_supply_usd(&PoolId::new("pool-1")), d("1250"));
        assert_eq!(snap.pool_supply_usd(&PoolId::new("pool-2")), d("500"));
        assert_eq!(snap.pool_backstop_usd(&PoolId::new("pool-1")), d("300"));
        assert_eq!(snap.pool_backstop_usd(&PoolId::new("pool-2")), Decimal::zero());
    }

    #[test]
    fn test_has_open_debt() {
        let mut snap = snapshot();
        assert!(snap.has_open_debt());
        snap.positions[1].borrow_amount = Decimal::zero();
        assert!(!snap.has_open_debt());
    }

    #[test]
    fn test_live_prices_keyed_by_asset() {
        let prices = snapshot().live_prices();
        assert_eq!(prices.get(&AssetId::new("CXLM")), Some(&d("0.12")));
        assert_eq!(prices.get(&AssetId::new("CUSDC")), Some(&d("1")));
    }

    #[test]
    fn test_earned_breakdown_select() {
        let earned = EarnedBreakdown {
            yield_usd: d("40"),
            price_change_usd: d("-15"),
        };
        assert_eq!(earned.select(false), d("40"));
        assert_eq!(earned.select(true), d("25"));
    }
}
