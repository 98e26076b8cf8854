//! Ledger indexer API client implementation.

use super::{DailyPrice, DataSource, DataSourceError};
use crate::domain::{
    Account, ActionType, AssetId, BackstopPosition, Decimal, EarnedBreakdown, EarnedReport,
    LiveSnapshot, PoolId, PoolPosition, RawEvent, Symbol, TimeMs,
};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use chrono::NaiveDate;
use reqwest::Client;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Data source backed by a ledger indexer's JSON API.
#[derive(Debug, Clone)]
pub struct LedgerDataSource {
    client: Client,
    base_url: String,
}

impl LedgerDataSource {
    /// Create a new ledger data source.
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    async fn get_json(&self, path: &str) -> Result<serde_json::Value, DataSourceError> {
        let url = format!("{}{}", self.base_url, path);
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self.client.get(&url).send().await.map_err(|e| {
                backoff::Error::transient(DataSourceError::Network(e.to_string()))
            })?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(DataSourceError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(DataSourceError::Http {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(DataSourceError::Http {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| backoff::Error::permanent(DataSourceError::Parse(e.to_string())))
        })
        .await
    }
}

#[async_trait]
impl DataSource for LedgerDataSource {
    async fn fetch_events(&self, account: &Account) -> Result<Vec<RawEvent>, DataSourceError> {
        debug!("Fetching events for account={}", account);

        let mut events = Vec::new();
        let mut cursor: Option<String> = None;

        // The indexer pages the event log; the engine wants all of it.
        loop {
            let path = match &cursor {
                Some(c) => format!("/v1/accounts/{}/events?cursor={}", account, c),
                None => format!("/v1/accounts/{}/events", account),
            };
            let response = self.get_json(&path).await?;

            let page = response
                .get("events")
                .and_then(|v| v.as_array())
                .ok_or_else(|| DataSourceError::Parse("Expected events array".to_string()))?;

            for event_json in page {
                match parse_event(event_json) {
                    Ok(event) => events.push(event),
                    Err(e) => {
                        warn!("Failed to parse event: {}", e);
                    }
                }
            }

            cursor = response
                .get("nextCursor")
                .and_then(|v| v.as_str())
                .map(String::from);
            if cursor.is_none() {
                break;
            }
        }

        Ok(events)
    }

    async fn fetch_snapshot(&self, account: &Account) -> Result<LiveSnapshot, DataSourceError> {
        debug!("Fetching position snapshot for account={}", account);

        let response = self
            .get_json(&format!("/v1/accounts/{}/positions", account))
            .await?;
        parse_snapshot(&response)
    }

    async fn fetch_earned(
        &self,
        account: &Account,
    ) -> Result<Option<EarnedReport>, DataSourceError> {
        debug!("Fetching earned breakdown for account={}", account);

        let response = self
            .get_json(&format!("/v1/accounts/{}/earned", account))
            .await?;
        if response.is_null() {
            return Ok(None);
        }
        parse_earned(&response).map(Some)
    }

    async fn fetch_daily_prices(
        &self,
        pairs: &[(AssetId, NaiveDate)],
    ) -> Result<Vec<DailyPrice>, DataSourceError> {
        if pairs.is_empty() {
            return Ok(Vec::new());
        }
        debug!("Fetching {} historical price pairs", pairs.len());

        let query: Vec<String> = pairs
            .iter()
            .map(|(asset, day)| format!("{}:{}", asset, day))
            .collect();
        let response = self
            .get_json(&format!("/v1/prices/daily?pairs={}", query.join(",")))
            .await?;

        let rows = response
            .get("prices")
            .and_then(|v| v.as_array())
            .ok_or_else(|| DataSourceError::Parse("Expected prices array".to_string()))?;

        let mut prices = Vec::new();
        for row in rows {
            match parse_daily_price(row) {
                Ok(price) => prices.push(price),
                Err(e) => {
                    warn!("Failed to parse daily price: {}", e);
                }
            }
        }

        Ok(prices)
    }
}

fn str_field<'a>(json: &'a serde_json::Value, field: &str) -> Result<&'a str, DataSourceError> {
    json.get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| DataSourceError::Parse(format!("Missing {} field", field)))
}

fn decimal_field(json: &serde_json::Value, field: &str) -> Result<Decimal, DataSourceError> {
    let s = str_field(json, field)?;
    Decimal::from_str_canonical(s)
        .map_err(|e| DataSourceError::Parse(format!("Invalid {}: {}", field, e)))
}

fn opt_decimal_field(json: &serde_json::Value, field: &str) -> Option<Decimal> {
    json.get(field)
        .and_then(|v| v.as_str())
        .and_then(|s| Decimal::from_str_canonical(s).ok())
}

fn parse_event(event_json: &serde_json::Value) -> Result<RawEvent, DataSourceError> {
    let action_value = event_json
        .get("action")
        .cloned()
        .ok_or_else(|| DataSourceError::Parse("Missing action field".to_string()))?;
    let action: ActionType = serde_json::from_value(action_value)
        .map_err(|e| DataSourceError::Parse(format!("Invalid action: {}", e)))?;

    let ledger_closed_at = event_json
        .get("ledgerClosedAt")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| DataSourceError::Parse("Missing ledgerClosedAt field".to_string()))?;

    let asset_decimals = event_json
        .get("assetDecimals")
        .and_then(|v| v.as_u64())
        .map(|v| v as u32);

    Ok(RawEvent::new(
        PoolId::new(str_field(event_json, "poolId")?),
        str_field(event_json, "poolName").unwrap_or(""),
        AssetId::new(str_field(event_json, "assetAddress")?),
        Symbol::new(str_field(event_json, "assetSymbol")?),
        asset_decimals,
        action,
        event_json.get("amountUnderlying").and_then(|v| v.as_i64()),
        event_json.get("claimAmount").and_then(|v| v.as_i64()),
        event_json.get("lpTokens").and_then(|v| v.as_i64()),
        TimeMs::new(ledger_closed_at),
        event_json
            .get("txHash")
            .and_then(|v| v.as_str())
            .map(String::from),
    ))
}

fn parse_snapshot(json: &serde_json::Value) -> Result<LiveSnapshot, DataSourceError> {
    let mut positions = Vec::new();
    if let Some(rows) = json.get("positions").and_then(|v| v.as_array()) {
        for row in rows {
            match parse_pool_position(row) {
                Ok(position) => positions.push(position),
                Err(e) => warn!("Failed to parse position: {}", e),
            }
        }
    }

    let mut backstop_positions = Vec::new();
    if let Some(rows) = json.get("backstopPositions").and_then(|v| v.as_array()) {
        for row in rows {
            match parse_backstop_position(row) {
                Ok(position) => backstop_positions.push(position),
                Err(e) => warn!("Failed to parse backstop position: {}", e),
            }
        }
    }

    let fetched_at = json
        .get("fetchedAt")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| DataSourceError::Parse("Missing fetchedAt field".to_string()))?;

    Ok(LiveSnapshot {
        positions,
        backstop_positions,
        blnd_price: opt_decimal_field(json, "blndPrice"),
        lp_token_price: opt_decimal_field(json, "lpTokenPrice"),
        total_backstop_usd: opt_decimal_field(json, "totalBackstopUsd")
            .unwrap_or_else(Decimal::zero),
        total_emissions: opt_decimal_field(json, "totalEmissions").unwrap_or_else(Decimal::zero),
        fetched_at: TimeMs::new(fetched_at),
    })
}

fn parse_pool_position(json: &serde_json::Value) -> Result<PoolPosition, DataSourceError> {
    Ok(PoolPosition {
        pool_id: PoolId::new(str_field(json, "poolId")?),
        asset: AssetId::new(str_field(json, "assetId")?),
        supply_usd: decimal_field(json, "supplyUsdValue")?,
        borrow_amount: decimal_field(json, "borrowAmount")?,
        price_usd: decimal_field(json, "usdPrice")?,
    })
}

fn parse_backstop_position(json: &serde_json::Value) -> Result<BackstopPosition, DataSourceError> {
    Ok(BackstopPosition {
        pool_id: PoolId::new(str_field(json, "poolId")?),
        lp_tokens_usd: decimal_field(json, "lpTokensUsd")?,
        claimable_blnd: decimal_field(json, "claimableBlnd")?,
    })
}

fn parse_earned(json: &serde_json::Value) -> Result<EarnedReport, DataSourceError> {
    fn parse_side(
        json: &serde_json::Value,
        field: &str,
    ) -> Result<BTreeMap<PoolId, EarnedBreakdown>, DataSourceError> {
        let mut side = BTreeMap::new();
        if let Some(rows) = json.get(field).and_then(|v| v.as_array()) {
            for row in rows {
                let pool_id = PoolId::new(str_field(row, "poolId")?);
                side.insert(
                    pool_id,
                    EarnedBreakdown {
                        yield_usd: decimal_field(row, "yieldUsd")?,
                        price_change_usd: decimal_field(row, "priceChangeUsd")?,
                    },
                );
            }
        }
        Ok(side)
    }

    Ok(EarnedReport {
        lending: parse_side(json, "lending")?,
        backstop: parse_side(json, "backstop")?,
    })
}

fn parse_daily_price(json: &serde_json::Value) -> Result<DailyPrice, DataSourceError> {
    let day: NaiveDate = str_field(json, "day")?
        .parse()
        .map_err(|e| DataSourceError::Parse(format!("Invalid day: {}", e)))?;

    Ok(DailyPrice {
        asset: AssetId::new(str_field(json, "asset")?),
        day,
        price_usd: decimal_field(json, "priceUsd")?,
    })
}
