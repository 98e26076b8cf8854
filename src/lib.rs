pub mod api;
pub mod config;
pub mod datasource;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;

pub use config::Config;
pub use datasource::{DataSource, DataSourceError, LedgerDataSource, MockDataSource};
pub use db::{init_db, Repository};
pub use domain::{
    Account, ActionType, AssetId, Decimal, EarnedBreakdown, EarnedReport, FlowKind, FlowSource,
    LiveSnapshot, NormalizedTransaction, PoolId, RawEvent, Symbol, TimeMs,
};
pub use engine::{compute_pnl, Headline, PnlResult, PricePreferences};
pub use error::AppError;
pub use orchestration::Refresher;
