//! SQLite database for per-user trading settings

use crate::types::{BotSettings, NewBotSettings, UserId};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info};

/// Result of an upsert: the stored record and whether it was newly created
#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub settings: BotSettings,
    pub created: bool,
}

/// Database connection pool
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(path)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        let db = Self { pool };
        db.initialize().await?;

        info!(path, "Settings database ready");
        Ok(db)
    }

    /// Private in-memory database; a single connection so every query sees the same data
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("Failed to open in-memory database")?;

        let db = Self { pool };
        db.initialize().await?;
        Ok(db)
    }

    /// Initialize database schema
    async fn initialize(&self) -> Result<()> {
        // One record per user in practice; the upsert keeps it that way but the
        // schema does not enforce it.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bot_settings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                target_price REAL NOT NULL,
                lower_target_price REAL NOT NULL,
                sell_amount_usd TEXT NOT NULL,
                approval_required INTEGER NOT NULL DEFAULT 0,
                router_address TEXT,
                token_address TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_bot_settings_user ON bot_settings(user_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // ==================== SETTINGS ====================

    /// Get the settings record owned by a user
    pub async fn get_settings_for_user(&self, user_id: &UserId) -> Result<Option<BotSettings>> {
        let row = sqlx::query("SELECT * FROM bot_settings WHERE user_id = ? ORDER BY id LIMIT 1")
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_settings(&r)).transpose()
    }

    /// Create the user's settings, or overwrite them if a record already exists
    pub async fn upsert_settings(&self, new: &NewBotSettings) -> Result<UpsertOutcome> {
        let now = Utc::now();

        match self.get_settings_for_user(&new.user_id).await? {
            Some(existing) => {
                sqlx::query(
                    r#"
                    UPDATE bot_settings
                    SET target_price = ?, lower_target_price = ?, sell_amount_usd = ?,
                        approval_required = ?, router_address = ?, token_address = ?,
                        updated_at = ?
                    WHERE id = ?
                    "#,
                )
                .bind(new.target_price)
                .bind(new.lower_target_price)
                .bind(new.sell_amount_usd.to_string())
                .bind(new.approval_required as i64)
                .bind(new.router_address.as_deref())
                .bind(new.token_address.as_deref())
                .bind(now.to_rfc3339())
                .bind(existing.id)
                .execute(&self.pool)
                .await?;

                debug!(user_id = %new.user_id, id = existing.id, "Settings updated");

                Ok(UpsertOutcome {
                    settings: settings_from_new(existing.id, new, existing.created_at, now),
                    created: false,
                })
            }
            None => {
                let result = sqlx::query(
                    r#"
                    INSERT INTO bot_settings (
                        user_id, target_price, lower_target_price, sell_amount_usd,
                        approval_required, router_address, token_address, created_at, updated_at
                    )
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(new.user_id.to_string())
                .bind(new.target_price)
                .bind(new.lower_target_price)
                .bind(new.sell_amount_usd.to_string())
                .bind(new.approval_required as i64)
                .bind(new.router_address.as_deref())
                .bind(new.token_address.as_deref())
                .bind(now.to_rfc3339())
                .bind(now.to_rfc3339())
                .execute(&self.pool)
                .await?;

                let id = result.last_insert_rowid();
                debug!(user_id = %new.user_id, id, "Settings created");

                Ok(UpsertOutcome {
                    settings: settings_from_new(id, new, now, now),
                    created: true,
                })
            }
        }
    }

    /// Number of stored settings records
    pub async fn count_settings(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bot_settings")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn settings_from_new(
    id: i64,
    new: &NewBotSettings,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
) -> BotSettings {
    BotSettings {
        id,
        user_id: new.user_id,
        target_price: new.target_price,
        lower_target_price: new.lower_target_price,
        sell_amount_usd: new.sell_amount_usd,
        approval_required: new.approval_required,
        router_address: new.router_address.clone(),
        token_address: new.token_address.clone(),
        created_at,
        updated_at,
    }
}

fn row_to_settings(r: &SqliteRow) -> Result<BotSettings> {
    let user_id: String = r.get("user_id");
    let sell_amount_usd: String = r.get("sell_amount_usd");
    let approval_required: i64 = r.get("approval_required");
    let created_at: String = r.get("created_at");
    let updated_at: String = r.get("updated_at");

    Ok(BotSettings {
        id: r.get("id"),
        user_id: UserId::parse(&user_id)
            .with_context(|| format!("Corrupt user_id in settings: {user_id}"))?,
        target_price: r.get("target_price"),
        lower_target_price: r.get("lower_target_price"),
        sell_amount_usd: Decimal::from_str(&sell_amount_usd)
            .with_context(|| format!("Corrupt sell_amount_usd: {sell_amount_usd}"))?,
        approval_required: approval_required != 0,
        router_address: r.get("router_address"),
        token_address: r.get("token_address"),
        created_at: DateTime::parse_from_rfc3339(&created_at)?.with_timezone(&Utc),
        updated_at: DateTime::parse_from_rfc3339(&updated_at)?.with_timezone(&Utc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn new_settings(user_id: UserId) -> NewBotSettings {
        NewBotSettings {
            user_id,
            target_price: 0.5,
            lower_target_price: 0.3,
            sell_amount_usd: dec!(25),
            approval_required: false,
            router_address: Some("0x10ED43C718714eb63d5aA57B78B54704E256024E".to_string()),
            token_address: Some("0x4dB7B2fD0a370170a874926B6Fd98d34d3D488B5".to_string()),
        }
    }

    #[tokio::test]
    async fn test_missing_settings() {
        let db = Database::in_memory().await.unwrap();
        let found = db.get_settings_for_user(&UserId::new()).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_upsert_creates_then_updates() {
        let db = Database::in_memory().await.unwrap();
        let user = UserId::new();

        let first = db.upsert_settings(&new_settings(user)).await.unwrap();
        assert!(first.created);

        let mut changed = new_settings(user);
        changed.target_price = 0.8;
        changed.sell_amount_usd = dec!(12.5);
        changed.approval_required = true;

        let second = db.upsert_settings(&changed).await.unwrap();
        assert!(!second.created);
        assert_eq!(second.settings.id, first.settings.id);
        assert_eq!(db.count_settings().await.unwrap(), 1);

        let stored = db.get_settings_for_user(&user).await.unwrap().unwrap();
        assert_eq!(stored.target_price, 0.8);
        assert_eq!(stored.lower_target_price, 0.3);
        assert_eq!(stored.sell_amount_usd, dec!(12.5));
        assert!(stored.approval_required);
        assert_eq!(stored.created_at, first.settings.created_at);
    }

    #[tokio::test]
    async fn test_settings_are_per_user() {
        let db = Database::in_memory().await.unwrap();
        let alice = UserId::new();
        let bob = UserId::new();

        db.upsert_settings(&new_settings(alice)).await.unwrap();
        let mut bobs = new_settings(bob);
        bobs.router_address = None;
        db.upsert_settings(&bobs).await.unwrap();

        assert_eq!(db.count_settings().await.unwrap(), 2);
        let stored = db.get_settings_for_user(&bob).await.unwrap().unwrap();
        assert_eq!(stored.user_id, bob);
        assert!(stored.router_address.is_none());
    }
}
