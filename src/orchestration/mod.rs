//! Orchestration: the fetch boundary around the pure engine.

pub mod refresher;

pub use refresher::{RefreshError, RefreshOutcome, Refresher};
