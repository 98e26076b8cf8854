//! Repository layer for database operations.

use crate::datasource::DailyPrice;
use crate::domain::{Account, AssetId, Decimal};
use crate::engine::PricePreferences;
use chrono::NaiveDate;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use tracing::warn;

/// Repository for the price cache and the preference store.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Cheap connectivity check for the readiness probe.
    ///
    /// # Errors
    /// Returns an error if the database does not answer.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Insert a daily price idempotently. Returns true if a row was
    /// written, false if the (asset, day) pair was already cached.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn upsert_daily_price(&self, price: &DailyPrice) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO daily_prices (asset, day, price_usd, fetched_at_ms)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(asset, day) DO NOTHING
            "#,
        )
        .bind(price.asset.as_str())
        .bind(price.day.to_string())
        .bind(price.price_usd.to_canonical_string())
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Fetch cached daily prices for a batch of (asset, day) pairs.
    /// Uncached pairs are simply absent from the result.
    ///
    /// # Errors
    /// Returns an error if a query fails.
    pub async fn get_daily_prices(
        &self,
        pairs: &[(AssetId, NaiveDate)],
    ) -> Result<Vec<DailyPrice>, sqlx::Error> {
        let mut prices = Vec::new();

        for (asset, day) in pairs {
            let row = sqlx::query(
                "SELECT price_usd FROM daily_prices WHERE asset = ? AND day = ?",
            )
            .bind(asset.as_str())
            .bind(day.to_string())
            .fetch_optional(&self.pool)
            .await?;

            if let Some(row) = row {
                let raw: String = row.get(0);
                match Decimal::from_str_canonical(&raw) {
                    Ok(price_usd) => prices.push(DailyPrice {
                        asset: asset.clone(),
                        day: *day,
                        price_usd,
                    }),
                    Err(e) => {
                        warn!(asset = %asset, %day, "corrupt cached price, ignoring: {}", e);
                    }
                }
            }
        }

        Ok(prices)
    }

    /// Fetch stored preference flags for an account, if any.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_preferences(
        &self,
        account: &Account,
    ) -> Result<Option<PricePreferences>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT show_price_changes, use_historical_blnd_prices
            FROM preferences WHERE account = ?
            "#,
        )
        .bind(account.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let show: i64 = row.get(0);
            let historical: i64 = row.get(1);
            PricePreferences {
                show_price_changes: show != 0,
                use_historical_blnd_prices: historical != 0,
            }
        }))
    }

    /// Store preference flags for an account, replacing any prior row.
    ///
    /// # Errors
    /// Returns an error if the upsert fails.
    pub async fn put_preferences(
        &self,
        account: &Account,
        prefs: &PricePreferences,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO preferences
                (account, show_price_changes, use_historical_blnd_prices, updated_at_ms)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(account) DO UPDATE SET
                show_price_changes = excluded.show_price_changes,
                use_historical_blnd_prices = excluded.use_historical_blnd_prices,
                updated_at_ms = excluded.updated_at_ms
            "#,
        )
        .bind(account.as_str())
        .bind(prefs.show_price_changes as i64)
        .bind(prefs.use_historical_blnd_prices as i64)
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
