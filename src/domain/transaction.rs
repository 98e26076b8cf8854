//! Normalized transaction and borrow-flow records derived from raw events.

use crate::domain::{AssetId, Decimal, PoolId, Symbol, TimeMs};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Direction of capital movement for a normalized transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowKind {
    Deposit,
    Withdraw,
    Claim,
}

/// Which protocol surface a transaction touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowSource {
    Pool,
    Backstop,
}

impl std::fmt::Display for FlowSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowSource::Pool => write!(f, "pool"),
            FlowSource::Backstop => write!(f, "backstop"),
        }
    }
}

/// One qualifying raw event, normalized for aggregation.
///
/// Created once during classification, immutable thereafter.
/// `value_usd = amount * price_usd` at the price basis the classification
/// flags selected; when no price could be resolved at all, `price_usd` is
/// `None` and `value_usd` aggregates as zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedTransaction {
    /// Ordering tiebreaker inherited from the source event.
    pub event_key: String,
    pub time: TimeMs,
    pub day: NaiveDate,
    pub kind: FlowKind,
    pub source: FlowSource,
    pub asset: Symbol,
    pub asset_address: AssetId,
    /// Human-unit token amount.
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_usd: Option<Decimal>,
    pub value_usd: Decimal,
    pub pool_id: PoolId,
    pub pool_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
}

/// Direction of a debt-side flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebtDirection {
    Borrow,
    Repay,
}

/// A borrow or repay leg, valued at event time.
///
/// Borrows are not deposits of user capital, so they never enter the
/// deposit/withdraw totals; they feed the borrow-cost engine instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowFlow {
    pub event_key: String,
    pub time: TimeMs,
    pub day: NaiveDate,
    pub direction: DebtDirection,
    pub asset: Symbol,
    pub asset_address: AssetId,
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_usd: Option<Decimal>,
    pub value_usd: Decimal,
    pub pool_id: PoolId,
    pub pool_name: String,
}
