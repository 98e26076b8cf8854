//! Raw on-chain ledger event.

use crate::domain::{AssetId, PoolId, Symbol, TimeMs};
use serde::{Deserialize, Serialize};

/// The base asset precision of the chain. Events that omit
/// `asset_decimals` scale by this.
pub const BASE_ASSET_DECIMALS: u32 = 7;

/// Every action the protocol emits to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Supply,
    SupplyCollateral,
    Withdraw,
    WithdrawCollateral,
    Borrow,
    Repay,
    Claim,
    BackstopDeposit,
    BackstopWithdraw,
    BackstopQueueWithdrawal,
    BackstopDequeueWithdrawal,
    BackstopClaim,
    Liquidate,
    FillAuction,
    NewAuction,
}

/// A raw ledger event as reported by the indexer. Created by the chain;
/// read-only to this system.
///
/// Raw amounts are integers in the chain's smallest unit, carried in three
/// optional fields; [`RawEvent::raw_amount`] selects the one the action
/// type requires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Stable unique identifier for this event.
    ///
    /// Priority: `tx_hash` (if present) > hash of deterministic fields.
    pub event_key: String,
    pub pool_id: PoolId,
    pub pool_name: String,
    pub asset_address: AssetId,
    pub asset_symbol: Symbol,
    /// Token precision; `None` means the chain's base precision.
    pub asset_decimals: Option<u32>,
    pub action: ActionType,
    /// Underlying-token amount for supply/withdraw/borrow/repay legs.
    pub amount_underlying: Option<i64>,
    /// Emission-token amount for claim legs.
    pub claim_amount: Option<i64>,
    /// Backstop share amount for backstop deposit/withdraw legs.
    pub lp_tokens: Option<i64>,
    pub ledger_closed_at: TimeMs,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
}

impl RawEvent {
    /// Create a new RawEvent and compute its `event_key`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool_id: PoolId,
        pool_name: impl Into<String>,
        asset_address: AssetId,
        asset_symbol: Symbol,
        asset_decimals: Option<u32>,
        action: ActionType,
        amount_underlying: Option<i64>,
        claim_amount: Option<i64>,
        lp_tokens: Option<i64>,
        ledger_closed_at: TimeMs,
        tx_hash: Option<String>,
    ) -> Self {
        let tx_hash = normalize_tx_hash(tx_hash);
        let event_key = Self::compute_event_key(
            &pool_id,
            &asset_address,
            action,
            ledger_closed_at,
            amount_underlying,
            claim_amount,
            lp_tokens,
            tx_hash.as_deref(),
        );
        Self {
            event_key,
            pool_id,
            pool_name: pool_name.into(),
            asset_address,
            asset_symbol,
            asset_decimals,
            action,
            amount_underlying,
            claim_amount,
            lp_tokens,
            ledger_closed_at,
            tx_hash,
        }
    }

    /// Compute a stable unique key for this event.
    ///
    /// Priority: `tx_hash` (if present) > truncated SHA-256 of the
    /// deterministic fields. 128 bits of hash gives ~2^64 collision
    /// resistance via the birthday bound, far beyond any wallet's event
    /// count.
    #[allow(clippy::too_many_arguments)]
    pub fn compute_event_key(
        pool_id: &PoolId,
        asset_address: &AssetId,
        action: ActionType,
        ledger_closed_at: TimeMs,
        amount_underlying: Option<i64>,
        claim_amount: Option<i64>,
        lp_tokens: Option<i64>,
        tx_hash: Option<&str>,
    ) -> String {
        if let Some(tx) = tx_hash.filter(|s| !s.trim().is_empty()) {
            return tx.trim().to_lowercase();
        }

        use sha2::{Digest, Sha256};

        fn hash_var(hasher: &mut Sha256, data: &str) {
            hasher.update((data.len() as u32).to_le_bytes());
            hasher.update(data.as_bytes());
        }

        fn hash_opt(hasher: &mut Sha256, value: Option<i64>) {
            match value {
                Some(v) => {
                    hasher.update([1u8]);
                    hasher.update(v.to_le_bytes());
                }
                None => hasher.update([0u8]),
            }
        }

        let mut hasher = Sha256::new();
        hash_var(&mut hasher, pool_id.as_str());
        hash_var(&mut hasher, asset_address.as_str());
        hash_var(&mut hasher, &format!("{:?}", action));
        hasher.update(ledger_closed_at.as_ms().to_le_bytes());
        hash_opt(&mut hasher, amount_underlying);
        hash_opt(&mut hasher, claim_amount);
        hash_opt(&mut hasher, lp_tokens);

        let hash = hasher.finalize();
        format!("hash:{}", hex::encode(&hash[..16]))
    }

    /// Borrow the precomputed event key.
    pub fn event_key(&self) -> &str {
        &self.event_key
    }

    /// The raw integer amount this action type moves, or `None` when the
    /// required field is missing (a malformed event).
    pub fn raw_amount(&self) -> Option<i64> {
        match self.action {
            ActionType::Claim | ActionType::BackstopClaim => self.claim_amount,
            ActionType::BackstopDeposit
            | ActionType::BackstopWithdraw
            | ActionType::BackstopQueueWithdrawal
            | ActionType::BackstopDequeueWithdrawal => self.lp_tokens,
            _ => self.amount_underlying,
        }
    }

    /// Token precision for scaling this event's raw amount.
    pub fn decimals(&self) -> u32 {
        self.asset_decimals.unwrap_or(BASE_ASSET_DECIMALS)
    }
}

fn normalize_tx_hash(tx_hash: Option<String>) -> Option<String> {
    tx_hash
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
}
