//! Borrow-cost engine: principal, interest accrued, and price-change
//! impact on debt positions, netted against supply-side profit.

use crate::domain::{
    AssetId, BorrowFlow, DebtDirection, Decimal, LiveSnapshot, PoolId, Symbol,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::PricePreferences;

/// Net borrow principal for one (pool, asset), folded from borrow/repay
/// flows at their event-time valuations.
#[derive(Debug, Clone)]
struct PrincipalState {
    pool_name: String,
    symbol: Symbol,
    tokens: Decimal,
    value_usd: Decimal,
}

/// Borrow cost for one (pool, asset) debt position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtCost {
    pub pool_id: PoolId,
    pub pool_name: String,
    pub asset: Symbol,
    /// Net borrowed USD at event-time prices (cost basis of the debt).
    pub principal_usd: Decimal,
    /// Outstanding debt valued at the current price.
    pub current_debt_usd: Decimal,
    /// Growth of the owed token amount, valued at the entry price basis.
    pub interest_accrued_usd: Decimal,
    /// Repricing of the principal at the current price. Positive when the
    /// debt got more expensive to repay (a cost), negative when cheaper
    /// (a gain).
    pub price_change_on_debt_usd: Decimal,
    /// Cost figure the display toggle selected.
    pub total_cost_usd: Decimal,
}

/// Aggregated borrow costs across all debt positions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowCosts {
    pub positions: Vec<DebtCost>,
    pub principal_usd: Decimal,
    pub current_debt_usd: Decimal,
    pub interest_accrued_usd: Decimal,
    pub price_change_on_debt_usd: Decimal,
    pub total_cost_usd: Decimal,
    /// True when any position still owes tokens; gates the Net P&L
    /// headline.
    pub has_open_debt: bool,
}

/// Compute borrow costs from historical flows and current snapshot debt.
///
/// The entry price basis p0 for each position is `principal_usd /
/// principal_tokens`; interest is token growth valued at p0, and the
/// price leg reprices the principal at the current price p1. The price
/// leg enters `total_cost_usd` only when the user shows price changes.
pub fn compute_borrow_cost(
    flows: &[BorrowFlow],
    snapshot: &LiveSnapshot,
    prefs: &PricePreferences,
) -> BorrowCosts {
    let mut principals: BTreeMap<(PoolId, AssetId), PrincipalState> = BTreeMap::new();

    for flow in flows {
        let state = principals
            .entry((flow.pool_id.clone(), flow.asset_address.clone()))
            .or_insert_with(|| PrincipalState {
                pool_name: flow.pool_name.clone(),
                symbol: flow.asset.clone(),
                tokens: Decimal::zero(),
                value_usd: Decimal::zero(),
            });
        match flow.direction {
            DebtDirection::Borrow => {
                state.tokens += flow.amount;
                state.value_usd += flow.value_usd;
            }
            DebtDirection::Repay => {
                state.tokens -= flow.amount;
                state.value_usd -= flow.value_usd;
            }
        }
    }

    let mut costs = BorrowCosts::default();

    for ((pool_id, asset), state) in principals {
        let position = snapshot
            .positions
            .iter()
            .find(|p| p.pool_id == pool_id && p.asset == asset);
        let (debt_tokens, current_price) = match position {
            Some(p) => (p.borrow_amount, p.price_usd),
            None => (Decimal::zero(), Decimal::zero()),
        };

        if state.tokens.is_zero() && debt_tokens.is_zero() {
            continue;
        }

        // Entry price basis; a fully repaid principal with residual
        // snapshot debt has no basis, so fall back to the current price
        // (interest-only reading of the whole residual).
        let entry_price = state
            .value_usd
            .checked_div(state.tokens)
            .unwrap_or(current_price);

        let principal_usd = state.value_usd;
        let current_debt_usd = debt_tokens * current_price;
        let interest_accrued_usd = debt_tokens * entry_price - principal_usd;
        let price_change_on_debt_usd = (current_price - entry_price) * state.tokens;
        let total_cost_usd = if prefs.show_price_changes {
            interest_accrued_usd + price_change_on_debt_usd
        } else {
            interest_accrued_usd
        };

        costs.principal_usd += principal_usd;
        costs.current_debt_usd += current_debt_usd;
        costs.interest_accrued_usd += interest_accrued_usd;
        costs.price_change_on_debt_usd += price_change_on_debt_usd;
        costs.total_cost_usd += total_cost_usd;
        costs.has_open_debt |= debt_tokens.is_positive();

        costs.positions.push(DebtCost {
            pool_id,
            pool_name: state.pool_name,
            asset: state.symbol,
            principal_usd,
            current_debt_usd,
            interest_accrued_usd,
            price_change_on_debt_usd,
            total_cost_usd,
        });
    }

    // A debt the event window never saw still gates the Net P&L headline.
    costs.has_open_debt |= snapshot.has_open_debt();

    costs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PoolPosition, TimeMs};

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn prefs(show_price_changes: bool) -> PricePreferences {
        PricePreferences {
            show_price_changes,
            use_historical_blnd_prices: true,
        }
    }

    fn flow(direction: DebtDirection, amount: &str, value: &str, time_ms: i64) -> BorrowFlow {
        let time = TimeMs::new(time_ms);
        BorrowFlow {
            event_key: format!("flow-{}", time_ms),
            time,
            day: time.day(),
            direction,
            asset: Symbol::new("XLM"),
            asset_address: AssetId::new("CXLM"),
            amount: d(amount),
            price_usd: Some(d(value)).and_then(|v| v.checked_div(d(amount))),
            value_usd: d(value),
            pool_id: PoolId::new("pool-1"),
            pool_name: "Prime Pool".to_string(),
        }
    }

    fn snapshot(borrow_amount: &str, price: &str) -> LiveSnapshot {
        let mut snap = LiveSnapshot::empty(TimeMs::new(1_700_000_000_000));
        snap.positions.push(PoolPosition {
            pool_id: PoolId::new("pool-1"),
            asset: AssetId::new("CXLM"),
            supply_usd: Decimal::zero(),
            borrow_amount: d(borrow_amount),
            price_usd: d(price),
        });
        snap
    }

    #[test]
    fn test_interest_only_view() {
        // Borrow 5000 XLM worth $500 (p0 = 0.1); owe 5200 now.
        let flows = vec![flow(DebtDirection::Borrow, "5000", "500", 1_700_000_000_000)];
        let costs = compute_borrow_cost(&flows, &snapshot("5200", "0.1"), &prefs(false));

        assert_eq!(costs.principal_usd, d("500"));
        assert_eq!(costs.interest_accrued_usd, d("20"));
        assert_eq!(costs.total_cost_usd, d("20"));
        assert!(costs.has_open_debt);
    }

    #[test]
    fn test_price_change_view_adds_repricing_cost() {
        // Same debt, asset price up 5%: repricing the 5000-token principal
        // costs another $25; total cost $45.
        let flows = vec![flow(DebtDirection::Borrow, "5000", "500", 1_700_000_000_000)];
        let costs = compute_borrow_cost(&flows, &snapshot("5200", "0.105"), &prefs(true));

        assert_eq!(costs.interest_accrued_usd, d("20"));
        assert_eq!(costs.price_change_on_debt_usd, d("25"));
        assert_eq!(costs.total_cost_usd, d("45"));
        assert_eq!(costs.current_debt_usd, d("546"));
    }

    #[test]
    fn test_price_drop_is_a_gain() {
        let flows = vec![flow(DebtDirection::Borrow, "5000", "500", 1_700_000_000_000)];
        let costs = compute_borrow_cost(&flows, &snapshot("5000", "0.09"), &prefs(true));

        assert_eq!(costs.price_change_on_debt_usd, d("-50"));
        assert_eq!(costs.total_cost_usd, d("-50"));
    }

    #[test]
    fn test_repay_reduces_principal() {
        let flows = vec![
            flow(DebtDirection::Borrow, "5000", "500", 1_700_000_000_000),
            flow(DebtDirection::Repay, "2000", "200", 1_700_000_100_000),
        ];
        let costs = compute_borrow_cost(&flows, &snapshot("3100", "0.1"), &prefs(false));

        assert_eq!(costs.principal_usd, d("300"));
        assert_eq!(costs.interest_accrued_usd, d("10"));
    }

    #[test]
    fn test_fully_repaid_no_debt() {
        let flows = vec![
            flow(DebtDirection::Borrow, "5000", "500", 1_700_000_000_000),
            flow(DebtDirection::Repay, "5000", "500", 1_700_000_100_000),
        ];
        let costs = compute_borrow_cost(&flows, &snapshot("0", "0.1"), &prefs(true));

        assert!(!costs.has_open_debt);
        assert!(costs.positions.is_empty());
    }

    #[test]
    fn test_no_flows_no_cost() {
        let costs = compute_borrow_cost(&[], &snapshot("0", "0.1"), &prefs(true));
        assert_eq!(costs, BorrowCosts::default());
    }
}
