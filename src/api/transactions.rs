use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::pnl::{effective_prefs, parse_account};
use crate::api::AppState;
use crate::domain::NormalizedTransaction;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsQuery {
    pub account: String,
    pub use_historical_blnd_prices: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsResponse {
    pub account: String,
    pub transactions: Vec<NormalizedTransaction>,
}

/// The normalized transaction list, newest first, as the history table
/// renders it.
pub async fn get_transactions(
    Query(params): Query<TransactionsQuery>,
    State(state): State<AppState>,
) -> Result<Json<TransactionsResponse>, AppError> {
    let account = parse_account(&params.account)?;
    let prefs = effective_prefs(&state, &account, None, params.use_historical_blnd_prices).await?;

    let outcome = state.refresher.refresh(&account, prefs).await?;

    let mut transactions = outcome.result.transactions.clone();
    transactions.reverse();

    Ok(Json(TransactionsResponse {
        account: account.to_string(),
        transactions,
    }))
}
