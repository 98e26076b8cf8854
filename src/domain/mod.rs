//! Domain types and determinism layer for the lending P&L ledger.
//!
//! This module provides:
//! - Lossless numeric handling via the Decimal wrapper
//! - Domain primitives: TimeMs, Account, PoolId, AssetId, Symbol
//! - RawEvent / NormalizedTransaction / BorrowFlow records
//! - Live snapshot and earned-breakdown inputs
//! - Stable event ordering for deterministic processing

pub mod decimal;
pub mod event;
pub mod ordering;
pub mod primitives;
pub mod snapshot;
pub mod transaction;

pub use decimal::Decimal;
pub use event::{ActionType, RawEvent, BASE_ASSET_DECIMALS};
pub use ordering::{sort_events_deterministic, EventOrderingKey};
pub use primitives::{Account, AssetId, PoolId, Symbol, TimeMs};
pub use snapshot::{BackstopPosition, EarnedBreakdown, EarnedReport, LiveSnapshot, PoolPosition};
pub use transaction::{BorrowFlow, DebtDirection, FlowKind, FlowSource, NormalizedTransaction};
