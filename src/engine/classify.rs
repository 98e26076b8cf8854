//! Transaction classifier: raw ledger events into normalized records.

use crate::domain::{
    ActionType, BorrowFlow, DebtDirection, Decimal, FlowKind, FlowSource, NormalizedTransaction,
    RawEvent,
};
use tracing::{debug, warn};

use super::valuation::{PriceBook, PriceMode};
use super::PricePreferences;

/// Output of classifying a full event log.
#[derive(Debug, Clone, Default)]
pub struct Classified {
    pub transactions: Vec<NormalizedTransaction>,
    pub borrow_flows: Vec<BorrowFlow>,
}

/// Map an action type to its flow kind and source, or `None` for actions
/// that never enter P&L accounting.
fn flow_for(action: ActionType) -> Option<(FlowKind, FlowSource)> {
    match action {
        ActionType::Supply | ActionType::SupplyCollateral => {
            Some((FlowKind::Deposit, FlowSource::Pool))
        }
        ActionType::Withdraw | ActionType::WithdrawCollateral => {
            Some((FlowKind::Withdraw, FlowSource::Pool))
        }
        ActionType::Claim => Some((FlowKind::Claim, FlowSource::Pool)),
        ActionType::BackstopDeposit => Some((FlowKind::Deposit, FlowSource::Backstop)),
        ActionType::BackstopWithdraw => Some((FlowKind::Withdraw, FlowSource::Backstop)),
        ActionType::BackstopClaim => Some((FlowKind::Claim, FlowSource::Backstop)),
        // Queuing is not an executed transfer; liquidation and auction
        // legs are multi-asset and excluded from this P&L model.
        ActionType::BackstopQueueWithdrawal
        | ActionType::BackstopDequeueWithdrawal
        | ActionType::Liquidate
        | ActionType::FillAuction
        | ActionType::NewAuction => None,
        // Borrow/repay are tracked separately via BorrowFlow.
        ActionType::Borrow | ActionType::Repay => None,
    }
}

/// The price mode a transaction's valuation uses.
///
/// BLND-denominated claims have their own historical-vs-live toggle,
/// independent of anything else: emissions price volatility materially
/// moves headline P&L, so the user pins claims to "price at claim time"
/// or "price today".
fn mode_for(kind: FlowKind, is_blnd: bool, prefs: &PricePreferences) -> PriceMode {
    if kind == FlowKind::Claim && is_blnd && !prefs.use_historical_blnd_prices {
        PriceMode::Live
    } else {
        PriceMode::Historical
    }
}

/// Classify a single raw event.
///
/// Returns `None` for excluded action types and for malformed events
/// (missing the amount field their type requires). Pure transform.
pub fn classify(
    event: &RawEvent,
    book: &PriceBook,
    prefs: &PricePreferences,
) -> Option<NormalizedTransaction> {
    let (kind, source) = flow_for(event.action)?;

    let Some(raw) = event.raw_amount() else {
        warn!(
            event_key = %event.event_key(),
            action = ?event.action,
            "skipping malformed event: missing amount for action type"
        );
        return None;
    };

    let amount = Decimal::from_raw(raw, event.decimals());
    let day = event.ledger_closed_at.day();
    let mode = mode_for(kind, event.asset_symbol.is_blnd(), prefs);

    let (price_usd, value_usd) = match book.value(amount, &event.asset_address, day, mode) {
        Some(valued) => (valued.price_usd, valued.value_usd),
        None => (None, Decimal::zero()),
    };

    Some(NormalizedTransaction {
        event_key: event.event_key().to_string(),
        time: event.ledger_closed_at,
        day,
        kind,
        source,
        asset: event.asset_symbol.clone(),
        asset_address: event.asset_address.clone(),
        amount,
        price_usd,
        value_usd,
        pool_id: event.pool_id.clone(),
        pool_name: event.pool_name.clone(),
        tx_hash: event.tx_hash.clone(),
    })
}

/// Classify a borrow or repay leg, valued at the event-time price.
fn classify_borrow(event: &RawEvent, book: &PriceBook) -> Option<BorrowFlow> {
    let direction = match event.action {
        ActionType::Borrow => DebtDirection::Borrow,
        ActionType::Repay => DebtDirection::Repay,
        _ => return None,
    };

    let Some(raw) = event.raw_amount() else {
        warn!(
            event_key = %event.event_key(),
            action = ?event.action,
            "skipping malformed event: missing amount for action type"
        );
        return None;
    };

    let amount = Decimal::from_raw(raw, event.decimals());
    let day = event.ledger_closed_at.day();
    let (price_usd, value_usd) =
        match book.value(amount, &event.asset_address, day, PriceMode::Historical) {
            Some(valued) => (valued.price_usd, valued.value_usd),
            None => (None, Decimal::zero()),
        };

    Some(BorrowFlow {
        event_key: event.event_key().to_string(),
        time: event.ledger_closed_at,
        day,
        direction,
        asset: event.asset_symbol.clone(),
        asset_address: event.asset_address.clone(),
        amount,
        price_usd,
        value_usd,
        pool_id: event.pool_id.clone(),
        pool_name: event.pool_name.clone(),
    })
}

/// Classify a full, deterministically ordered event log.
///
/// One bad event never blanks the batch: malformed events are skipped
/// with a warning and their neighbors classify normally.
pub fn classify_all(events: &[RawEvent], book: &PriceBook, prefs: &PricePreferences) -> Classified {
    let mut out = Classified::default();
    let mut skipped = 0usize;

    for event in events {
        match event.action {
            ActionType::Borrow | ActionType::Repay => {
                if let Some(flow) = classify_borrow(event, book) {
                    out.borrow_flows.push(flow);
                }
            }
            _ => {
                if let Some(tx) = classify(event, book, prefs) {
                    out.transactions.push(tx);
                } else if flow_for(event.action).is_none() {
                    skipped += 1;
                }
            }
        }
    }

    if skipped > 0 {
        debug!(skipped, "excluded non-P&L actions from classification");
    }

    out
}
