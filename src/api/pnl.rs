use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::AppState;
use crate::domain::Account;
use crate::engine::{PnlResult, PricePreferences};
use crate::error::AppError;

pub(crate) fn parse_account(input: &str) -> Result<Account, AppError> {
    let trimmed = input.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::BadRequest("Invalid account".to_string()));
    }
    Ok(Account::new(trimmed))
}

/// Resolve effective preference flags: stored per-account values,
/// overridden field-by-field by query parameters.
pub(crate) async fn effective_prefs(
    state: &AppState,
    account: &Account,
    show_price_changes: Option<bool>,
    use_historical_blnd_prices: Option<bool>,
) -> Result<PricePreferences, AppError> {
    let stored = state
        .repo
        .get_preferences(account)
        .await?
        .unwrap_or_default();
    Ok(PricePreferences {
        show_price_changes: show_price_changes.unwrap_or(stored.show_price_changes),
        use_historical_blnd_prices: use_historical_blnd_prices
            .unwrap_or(stored.use_historical_blnd_prices),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PnlQuery {
    pub account: String,
    pub show_price_changes: Option<bool>,
    pub use_historical_blnd_prices: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PnlResponse {
    pub snapshot_stale: bool,
    #[serde(flatten)]
    pub result: Arc<PnlResult>,
}

pub async fn get_pnl(
    Query(params): Query<PnlQuery>,
    State(state): State<AppState>,
) -> Result<Json<PnlResponse>, AppError> {
    let account = parse_account(&params.account)?;
    let prefs = effective_prefs(
        &state,
        &account,
        params.show_price_changes,
        params.use_historical_blnd_prices,
    )
    .await?;

    let outcome = state.refresher.refresh(&account, prefs).await?;

    Ok(Json(PnlResponse {
        snapshot_stale: outcome.snapshot_stale,
        result: outcome.result,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_account_accepts_alphanumeric() {
        assert!(parse_account("GA7QYNF7SOWQ3GLR2BGMZEHXAVIRZA4KVWLTJJFC7MGXUA74P7UJVSGZ").is_ok());
        assert!(parse_account(" GABC ").is_ok());
    }

    #[test]
    fn test_parse_account_rejects_garbage() {
        assert!(parse_account("").is_err());
        assert!(parse_account("  ").is_err());
        assert!(parse_account("G!; DROP").is_err());
    }
}
