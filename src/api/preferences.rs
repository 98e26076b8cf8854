use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::pnl::parse_account;
use crate::api::AppState;
use crate::engine::PricePreferences;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesQuery {
    pub account: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesBody {
    pub account: String,
    pub show_price_changes: bool,
    pub use_historical_blnd_prices: bool,
}

pub async fn get_preferences(
    Query(params): Query<PreferencesQuery>,
    State(state): State<AppState>,
) -> Result<Json<PricePreferences>, AppError> {
    let account = parse_account(&params.account)?;
    let prefs = state
        .repo
        .get_preferences(&account)
        .await?
        .unwrap_or_default();
    Ok(Json(prefs))
}

pub async fn put_preferences(
    State(state): State<AppState>,
    Json(body): Json<PreferencesBody>,
) -> Result<StatusCode, AppError> {
    let account = parse_account(&body.account)?;
    let prefs = PricePreferences {
        show_price_changes: body.show_price_changes,
        use_historical_blnd_prices: body.use_historical_blnd_prices,
    };
    state.repo.put_preferences(&account, &prefs).await?;
    Ok(StatusCode::NO_CONTENT)
}
