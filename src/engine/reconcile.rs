//! Reconciliation engine: combine aggregated history with the live
//! snapshot into cost basis, unrealized and total P&L per source and pool.

use crate::domain::{Decimal, EarnedBreakdown, EarnedReport, LiveSnapshot, PoolId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::aggregate::{Aggregates, SourceTotals};
use super::PricePreferences;

/// Reconciled P&L figures for one source (pool lending or backstop) or
/// one per-pool leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcePnl {
    pub deposited: Decimal,
    pub withdrawn: Decimal,
    /// Current USD value from the snapshot.
    pub current_value: Decimal,
    /// `deposited - withdrawn`. Emissions are yield, not principal, so
    /// claims never enter the cost basis.
    pub cost_basis: Decimal,
    /// `current_value - cost_basis`.
    pub unrealized: Decimal,
    /// The unrealized figure the display toggle selected: protocol yield
    /// only, or yield plus market price movement.
    pub headline_unrealized: Decimal,
    /// `(current_value + withdrawn) - deposited`: net economic gain.
    pub total_pnl: Decimal,
    /// For a fully exited source, `max(0, withdrawn - deposited)`.
    /// Loss-capped at zero by display policy: a net loss on an exited
    /// position is absorbed into total figures, not shown as negative
    /// realized yield. Zero while a position remains open.
    pub exit_realized: Decimal,
    /// `total_pnl / deposited * 100`; omitted when nothing was deposited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_pct: Option<Decimal>,
}

impl SourcePnl {
    fn build(
        totals: &SourceTotals,
        current_value: Decimal,
        earned: Option<&EarnedBreakdown>,
        prefs: &PricePreferences,
    ) -> Self {
        let cost_basis = totals.deposited - totals.withdrawn;
        let unrealized = current_value - cost_basis;
        let headline_unrealized = match earned {
            Some(e) => e.select(prefs.show_price_changes),
            None => unrealized,
        };
        let total_pnl = (current_value + totals.withdrawn) - totals.deposited;
        let exit_realized = if current_value.is_zero() {
            (totals.withdrawn - totals.deposited).max(Decimal::zero())
        } else {
            Decimal::zero()
        };

        SourcePnl {
            deposited: totals.deposited,
            withdrawn: totals.withdrawn,
            current_value,
            cost_basis,
            unrealized,
            headline_unrealized,
            total_pnl,
            exit_realized,
            return_pct: total_pnl.pct_of(totals.deposited),
        }
    }
}

/// Per-pool reconciled figures, lending and backstop legs separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolPnl {
    pub pool_id: PoolId,
    pub pool_name: String,
    pub lending: SourcePnl,
    pub backstop: SourcePnl,
}

/// Output of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciled {
    pub pool: SourcePnl,
    pub backstop: SourcePnl,
    pub per_pool: BTreeMap<PoolId, PoolPnl>,
    /// Hero figure: pool + backstop total P&L.
    pub total_pnl: Decimal,
    /// Toggle-consistent sum of headline unrealized across sources.
    pub headline_unrealized: Decimal,
}

/// Reconcile aggregated history against the live snapshot.
///
/// The earned report supplies the yield/price-change split; when the
/// collaborator did not provide one, the headline falls back to the
/// cost-basis-derived unrealized figure for every level at once, so the
/// hero total, per-source and per-pool numbers always agree.
pub fn reconcile(
    agg: &Aggregates,
    snapshot: &LiveSnapshot,
    earned: Option<&EarnedReport>,
    prefs: &PricePreferences,
) -> Reconciled {
    let lending_total = earned.map(|report| report.lending_total());
    let backstop_total = earned.map(|report| report.backstop_total());

    let pool = SourcePnl::build(
        &agg.pool,
        snapshot.total_supply_usd(),
        lending_total.as_ref(),
        prefs,
    );
    let backstop = SourcePnl::build(
        &agg.backstop,
        snapshot.total_backstop_usd,
        backstop_total.as_ref(),
        prefs,
    );

    let mut per_pool = BTreeMap::new();
    for (pool_id, breakdown) in &agg.per_pool {
        per_pool.insert(
            pool_id.clone(),
            PoolPnl {
                pool_id: pool_id.clone(),
                pool_name: breakdown.pool_name.clone(),
                lending: SourcePnl::build(
                    &breakdown.lending,
                    snapshot.pool_supply_usd(pool_id),
                    earned.and_then(|report| report.lending.get(pool_id)),
                    prefs,
                ),
                backstop: SourcePnl::build(
                    &breakdown.backstop,
                    snapshot.pool_backstop_usd(pool_id),
                    earned.and_then(|report| report.backstop.get(pool_id)),
                    prefs,
                ),
            },
        );
    }

    Reconciled {
        total_pnl: pool.total_pnl + backstop.total_pnl,
        headline_unrealized: pool.headline_unrealized + backstop.headline_unrealized,
        pool,
        backstop,
        per_pool,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AssetId, PoolPosition, TimeMs};

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn prefs(show_price_changes: bool) -> PricePreferences {
        PricePreferences {
            show_price_changes,
            use_historical_blnd_prices: true,
        }
    }

    fn totals(deposited: &str, withdrawn: &str) -> SourceTotals {
        SourceTotals {
            deposited: d(deposited),
            withdrawn: d(withdrawn),
            emissions_claimed: Decimal::zero(),
        }
    }

    fn snapshot_with_supply(supply: &str) -> LiveSnapshot {
        let mut snap = LiveSnapshot::empty(TimeMs::new(1_700_000_000_000));
        if supply != "0" {
            snap.positions.push(PoolPosition {
                pool_id: PoolId::new("pool-1"),
                asset: AssetId::new("CUSDC"),
                supply_usd: d(supply),
                borrow_amount: Decimal::zero(),
                price_usd: Decimal::one(),
            });
        }
        snap
    }

    #[test]
    fn test_cost_basis_and_unrealized() {
        let agg = Aggregates {
            pool: totals("1000", "200"),
            ..Default::default()
        };
        let rec = reconcile(&agg, &snapshot_with_supply("900"), None, &prefs(true));
        assert_eq!(rec.pool.cost_basis, d("800"));
        assert_eq!(rec.pool.unrealized, d("100"));
        assert_eq!(rec.pool.total_pnl, d("100"));
    }

    #[test]
    fn test_total_pnl_identity() {
        let agg = Aggregates {
            pool: totals("1000", "400"),
            ..Default::default()
        };
        let rec = reconcile(&agg, &snapshot_with_supply("700"), None, &prefs(true));
        // (current + withdrawn) - deposited
        assert_eq!(rec.pool.total_pnl, d("100"));
        assert_eq!(
            rec.pool.total_pnl,
            (rec.pool.current_value + rec.pool.withdrawn) - rec.pool.deposited
        );
    }

    #[test]
    fn test_exit_realized_loss_capped_at_zero() {
        // Policy, not arithmetic: an exited position at a net loss shows
        // zero realized yield, never a negative figure.
        let agg = Aggregates {
            pool: totals("1000", "900"),
            ..Default::default()
        };
        let rec = reconcile(&agg, &snapshot_with_supply("0"), None, &prefs(true));
        assert_eq!(rec.pool.exit_realized, Decimal::zero());
        assert_eq!(rec.pool.total_pnl, d("-100"));
    }

    #[test]
    fn test_exit_realized_gain() {
        let agg = Aggregates {
            pool: totals("1000", "1100"),
            ..Default::default()
        };
        let rec = reconcile(&agg, &snapshot_with_supply("0"), None, &prefs(true));
        assert_eq!(rec.pool.exit_realized, d("100"));
    }

    #[test]
    fn test_open_position_has_no_exit_realized() {
        let agg = Aggregates {
            pool: totals("1000", "1100"),
            ..Default::default()
        };
        let rec = reconcile(&agg, &snapshot_with_supply("50"), None, &prefs(true));
        assert_eq!(rec.pool.exit_realized, Decimal::zero());
    }

    #[test]
    fn test_headline_toggle_selects_earned_component() {
        let agg = Aggregates {
            pool: totals("1000", "0"),
            ..Default::default()
        };
        let mut earned = EarnedReport::default();
        earned.lending.insert(
            PoolId::new("pool-1"),
            EarnedBreakdown {
                yield_usd: d("40"),
                price_change_usd: d("60"),
            },
        );

        let yield_only = reconcile(&agg, &snapshot_with_supply("1100"), Some(&earned), &prefs(false));
        assert_eq!(yield_only.pool.headline_unrealized, d("40"));

        let with_price = reconcile(&agg, &snapshot_with_supply("1100"), Some(&earned), &prefs(true));
        assert_eq!(with_price.pool.headline_unrealized, d("100"));

        // The toggle never moves deposit/withdraw totals.
        assert_eq!(yield_only.pool.deposited, with_price.pool.deposited);
        assert_eq!(yield_only.pool.withdrawn, with_price.pool.withdrawn);
    }

    #[test]
    fn test_return_pct_omitted_on_zero_cost() {
        let agg = Aggregates::default();
        let rec = reconcile(&agg, &snapshot_with_supply("0"), None, &prefs(true));
        assert_eq!(rec.pool.return_pct, None);
    }
}
