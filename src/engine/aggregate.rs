//! Aggregation engine: fold the normalized transaction stream into running
//! totals, per-pool breakdowns, and cumulative day series.

use crate::domain::{Decimal, FlowKind, FlowSource, NormalizedTransaction, PoolId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Running USD totals for one source (pool lending or backstop).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceTotals {
    pub deposited: Decimal,
    pub withdrawn: Decimal,
    pub emissions_claimed: Decimal,
}

impl SourceTotals {
    fn record(&mut self, tx: &NormalizedTransaction) {
        match tx.kind {
            FlowKind::Deposit => self.deposited += tx.value_usd,
            FlowKind::Withdraw => self.withdrawn += tx.value_usd,
            FlowKind::Claim => self.emissions_claimed += tx.value_usd,
        }
    }
}

/// Emission claim totals, split by token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmissionTotals {
    /// BLND tokens claimed (token amount).
    pub blnd_claimed: Decimal,
    /// Backstop LP tokens claimed (token amount).
    pub lp_claimed: Decimal,
    /// USD value of all claims, at the price basis the flags selected.
    pub usd_value: Decimal,
}

/// Per-pool lending/backstop breakdown. Pool display name first-seen wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolBreakdown {
    pub pool_id: PoolId,
    pub pool_name: String,
    pub lending: SourceTotals,
    pub backstop: SourceTotals,
}

/// One point of a cumulative chart series: running totals up to and
/// including `day`.
///
/// `cumulative_realized_pnl` is cumulative claimed emissions USD only —
/// a withdrawal of principal is not profit, so withdrawal proceeds never
/// enter the chart series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CumulativePoint {
    pub day: NaiveDate,
    pub cumulative_deposited: Decimal,
    pub cumulative_withdrawn: Decimal,
    pub cumulative_realized_pnl: Decimal,
}

/// Builds a day-bucketed cumulative series from an ascending transaction
/// stream. Multiple same-day transactions fold into one point: sums are
/// monotonic, so last-wins per day is exact.
#[derive(Debug, Default)]
struct SeriesBuilder {
    deposited: Decimal,
    withdrawn: Decimal,
    realized: Decimal,
    points: BTreeMap<NaiveDate, CumulativePoint>,
}

impl SeriesBuilder {
    fn record(&mut self, tx: &NormalizedTransaction) {
        match tx.kind {
            FlowKind::Deposit => self.deposited += tx.value_usd,
            FlowKind::Withdraw => self.withdrawn += tx.value_usd,
            FlowKind::Claim => self.realized += tx.value_usd,
        }
        self.points.insert(
            tx.day,
            CumulativePoint {
                day: tx.day,
                cumulative_deposited: self.deposited,
                cumulative_withdrawn: self.withdrawn,
                cumulative_realized_pnl: self.realized,
            },
        );
    }

    fn finish(self) -> Vec<CumulativePoint> {
        self.points.into_values().collect()
    }
}

/// Everything one aggregation pass produces.
#[derive(Debug, Clone, Default)]
pub struct Aggregates {
    pub pool: SourceTotals,
    pub backstop: SourceTotals,
    pub emissions: EmissionTotals,
    pub per_pool: BTreeMap<PoolId, PoolBreakdown>,
    pub series: Vec<CumulativePoint>,
    pub series_by_source: BTreeMap<FlowSource, Vec<CumulativePoint>>,
    pub series_by_pool: BTreeMap<PoolId, Vec<CumulativePoint>>,
    pub first_activity: Option<NaiveDate>,
    pub last_activity: Option<NaiveDate>,
}

impl Aggregates {
    /// Total deposited USD across both sources.
    pub fn total_deposited(&self) -> Decimal {
        self.pool.deposited + self.backstop.deposited
    }

    /// Total withdrawn USD across both sources.
    pub fn total_withdrawn(&self) -> Decimal {
        self.pool.withdrawn + self.backstop.withdrawn
    }
}

/// Fold a transaction stream into aggregates in a single forward pass.
///
/// Downstream running sums are only correct under ascending order, so the
/// input is re-sorted internally by (time, event key); callers may pass
/// transactions in any order.
pub fn aggregate(transactions: &[NormalizedTransaction]) -> Aggregates {
    let mut sorted: Vec<&NormalizedTransaction> = transactions.iter().collect();
    sorted.sort_by(|a, b| {
        (a.time, a.event_key.as_str()).cmp(&(b.time, b.event_key.as_str()))
    });

    let mut agg = Aggregates::default();
    let mut series = SeriesBuilder::default();
    let mut by_source: BTreeMap<FlowSource, SeriesBuilder> = BTreeMap::new();
    let mut by_pool: BTreeMap<PoolId, SeriesBuilder> = BTreeMap::new();

    for tx in sorted {
        match tx.source {
            FlowSource::Pool => agg.pool.record(tx),
            FlowSource::Backstop => agg.backstop.record(tx),
        }

        if tx.kind == FlowKind::Claim {
            if tx.asset.is_blnd() {
                agg.emissions.blnd_claimed += tx.amount;
            } else {
                agg.emissions.lp_claimed += tx.amount;
            }
            agg.emissions.usd_value += tx.value_usd;
        }

        let breakdown = agg
            .per_pool
            .entry(tx.pool_id.clone())
            .or_insert_with(|| PoolBreakdown {
                pool_id: tx.pool_id.clone(),
                pool_name: tx.pool_name.clone(),
                lending: SourceTotals::default(),
                backstop: SourceTotals::default(),
            });
        match tx.source {
            FlowSource::Pool => breakdown.lending.record(tx),
            FlowSource::Backstop => breakdown.backstop.record(tx),
        }

        series.record(tx);
        by_source.entry(tx.source).or_default().record(tx);
        by_pool.entry(tx.pool_id.clone()).or_default().record(tx);

        if agg.first_activity.is_none() {
            agg.first_activity = Some(tx.day);
        }
        agg.last_activity = Some(tx.day);
    }

    agg.series = series.finish();
    agg.series_by_source = by_source.into_iter().map(|(k, v)| (k, v.finish())).collect();
    agg.series_by_pool = by_pool.into_iter().map(|(k, v)| (k, v.finish())).collect();
    agg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AssetId, Symbol, TimeMs};

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn tx(
        key: &str,
        time_ms: i64,
        kind: FlowKind,
        source: FlowSource,
        pool: &str,
        value: &str,
    ) -> NormalizedTransaction {
        let time = TimeMs::new(time_ms);
        NormalizedTransaction {
            event_key: key.to_string(),
            time,
            day: time.day(),
            kind,
            source,
            asset: Symbol::new("USDC"),
            asset_address: AssetId::new("CUSDC"),
            amount: d(value),
            price_usd: Some(Decimal::one()),
            value_usd: d(value),
            pool_id: PoolId::new(pool),
            pool_name: format!("{} name", pool),
            tx_hash: Some(key.to_string()),
        }
    }

    fn blnd_claim(key: &str, time_ms: i64, amount: &str, value: &str) -> NormalizedTransaction {
        let time = TimeMs::new(time_ms);
        NormalizedTransaction {
            event_key: key.to_string(),
            time,
            day: time.day(),
            kind: FlowKind::Claim,
            source: FlowSource::Pool,
            asset: Symbol::new("BLND"),
            asset_address: AssetId::new("CBLND"),
            amount: d(amount),
            price_usd: Some(d("0.5")),
            value_usd: d(value),
            pool_id: PoolId::new("pool-1"),
            pool_name: "pool-1 name".to_string(),
            tx_hash: Some(key.to_string()),
        }
    }

    const DAY_MS: i64 = 86_400_000;
    const T0: i64 = 1_700_000_000_000;

    #[test]
    fn test_totals_split_by_source() {
        let agg = aggregate(&[
            tx("a", T0, FlowKind::Deposit, FlowSource::Pool, "pool-1", "1000"),
            tx("b", T0 + 1, FlowKind::Deposit, FlowSource::Backstop, "pool-1", "200"),
            tx("c", T0 + 2, FlowKind::Withdraw, FlowSource::Pool, "pool-1", "300"),
        ]);
        assert_eq!(agg.pool.deposited, d("1000"));
        assert_eq!(agg.pool.withdrawn, d("300"));
        assert_eq!(agg.backstop.deposited, d("200"));
        assert_eq!(agg.total_deposited(), d("1200"));
        assert_eq!(agg.total_withdrawn(), d("300"));
    }

    #[test]
    fn test_emissions_split_blnd_vs_lp() {
        let lp = NormalizedTransaction {
            asset: Symbol::new("BLND-USDC LP"),
            source: FlowSource::Backstop,
            ..blnd_claim("lp", T0 + 5, "4", "2")
        };
        let agg = aggregate(&[blnd_claim("blnd", T0, "100", "50"), lp]);
        assert_eq!(agg.emissions.blnd_claimed, d("100"));
        assert_eq!(agg.emissions.lp_claimed, d("4"));
        assert_eq!(agg.emissions.usd_value, d("52"));
    }

    #[test]
    fn test_per_pool_first_seen_name_wins() {
        let mut renamed = tx("b", T0 + 1, FlowKind::Deposit, FlowSource::Pool, "pool-1", "5");
        renamed.pool_name = "Renamed".to_string();
        let agg = aggregate(&[
            tx("a", T0, FlowKind::Deposit, FlowSource::Pool, "pool-1", "10"),
            renamed,
        ]);
        let breakdown = &agg.per_pool[&PoolId::new("pool-1")];
        assert_eq!(breakdown.pool_name, "pool-1 name");
        assert_eq!(breakdown.lending.deposited, d("15"));
    }

    #[test]
    fn test_series_one_point_per_day_last_wins() {
        let agg = aggregate(&[
            tx("a", T0, FlowKind::Deposit, FlowSource::Pool, "pool-1", "100"),
            tx("b", T0 + 1000, FlowKind::Deposit, FlowSource::Pool, "pool-1", "50"),
            tx("c", T0 + DAY_MS, FlowKind::Withdraw, FlowSource::Pool, "pool-1", "30"),
        ]);
        assert_eq!(agg.series.len(), 2);
        assert_eq!(agg.series[0].cumulative_deposited, d("150"));
        assert_eq!(agg.series[0].cumulative_withdrawn, Decimal::zero());
        assert_eq!(agg.series[1].cumulative_deposited, d("150"));
        assert_eq!(agg.series[1].cumulative_withdrawn, d("30"));
    }

    #[test]
    fn test_series_realized_is_claims_only() {
        let agg = aggregate(&[
            tx("a", T0, FlowKind::Deposit, FlowSource::Pool, "pool-1", "1000"),
            blnd_claim("b", T0 + DAY_MS, "50", "25"),
            tx("c", T0 + 2 * DAY_MS, FlowKind::Withdraw, FlowSource::Pool, "pool-1", "1100"),
        ]);
        let last = agg.series.last().unwrap();
        assert_eq!(last.cumulative_realized_pnl, d("25"));
        assert_eq!(last.cumulative_withdrawn, d("1100"));
    }

    #[test]
    fn test_order_insensitive() {
        let txs = vec![
            tx("a", T0, FlowKind::Deposit, FlowSource::Pool, "pool-1", "100"),
            tx("b", T0 + DAY_MS, FlowKind::Withdraw, FlowSource::Pool, "pool-1", "40"),
            blnd_claim("c", T0 + 2 * DAY_MS, "10", "5"),
        ];
        let mut reversed = txs.clone();
        reversed.reverse();

        let forward = aggregate(&txs);
        let backward = aggregate(&reversed);
        assert_eq!(forward.series, backward.series);
        assert_eq!(forward.pool, backward.pool);
        assert_eq!(forward.per_pool, backward.per_pool);
    }

    #[test]
    fn test_pool_sums_reconcile_with_source_totals() {
        let agg = aggregate(&[
            tx("a", T0, FlowKind::Deposit, FlowSource::Pool, "pool-1", "100"),
            tx("b", T0 + 1, FlowKind::Deposit, FlowSource::Pool, "pool-2", "250"),
            tx("c", T0 + 2, FlowKind::Deposit, FlowSource::Backstop, "pool-1", "80"),
        ]);
        let mut lending_sum = Decimal::zero();
        let mut backstop_sum = Decimal::zero();
        for breakdown in agg.per_pool.values() {
            lending_sum += breakdown.lending.deposited;
            backstop_sum += breakdown.backstop.deposited;
        }
        assert_eq!(lending_sum, agg.pool.deposited);
        assert_eq!(backstop_sum, agg.backstop.deposited);
    }

    #[test]
    fn test_first_and_last_activity() {
        let agg = aggregate(&[
            tx("b", T0 + DAY_MS, FlowKind::Withdraw, FlowSource::Pool, "pool-1", "1"),
            tx("a", T0, FlowKind::Deposit, FlowSource::Pool, "pool-1", "2"),
        ]);
        assert_eq!(agg.first_activity, Some(TimeMs::new(T0).day()));
        assert_eq!(agg.last_activity, Some(TimeMs::new(T0 + DAY_MS).day()));
    }

    #[test]
    fn test_empty_input() {
        let agg = aggregate(&[]);
        assert_eq!(agg.total_deposited(), Decimal::zero());
        assert!(agg.series.is_empty());
        assert!(agg.first_activity.is_none());
    }
}
