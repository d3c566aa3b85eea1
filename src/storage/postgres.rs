use crate::models::RawDailyRecord;
use crate::storage::rows::{
    domain_pairs, format_date, parse_date, records_from_rows, store_error, to_db_counter,
    AliasRow, DomainRow, UsageRow,
};
use crate::storage::{RecordStore, StoreError, StoreResult};
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Insert or replace one user's record for one day, domains included
    pub async fn upsert_record(&self, record: &RawDailyRecord) -> Result<()> {
        let date = format_date(record.date);
        let updated_at = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO daily_usage (date, user_id, traffic_bytes, connections, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (date, user_id) DO UPDATE SET
                traffic_bytes = EXCLUDED.traffic_bytes,
                connections = EXCLUDED.connections,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&date)
        .bind(&record.user_id)
        .bind(to_db_counter(record.traffic_bytes)?)
        .bind(to_db_counter(record.connections)?)
        .bind(updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM daily_domains WHERE date = $1 AND user_id = $2")
            .bind(&date)
            .bind(&record.user_id)
            .execute(&mut *tx)
            .await?;

        for (domain, (bytes, conns)) in domain_pairs(record) {
            sqlx::query(
                r#"
                INSERT INTO daily_domains (date, user_id, domain, traffic_bytes, connections)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(&date)
            .bind(&record.user_id)
            .bind(domain)
            .bind(to_db_counter(bytes)?)
            .bind(to_db_counter(conns)?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn set_alias(&self, user_id: &str, alias: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_aliases (user_id, alias)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET alias = EXCLUDED.alias
            "#,
        )
        .bind(user_id)
        .bind(alias)
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for PostgresStore {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS daily_usage (
                date TEXT NOT NULL,
                user_id TEXT NOT NULL,
                traffic_bytes BIGINT NOT NULL DEFAULT 0,
                connections BIGINT NOT NULL DEFAULT 0,
                updated_at BIGINT NOT NULL,
                PRIMARY KEY (date, user_id)
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS daily_domains (
                date TEXT NOT NULL,
                user_id TEXT NOT NULL,
                domain TEXT NOT NULL,
                traffic_bytes BIGINT NOT NULL DEFAULT 0,
                connections BIGINT NOT NULL DEFAULT 0,
                PRIMARY KEY (date, user_id, domain)
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_aliases (
                user_id TEXT PRIMARY KEY,
                alias TEXT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(self.pool.as_ref())
            .await
            .map(|_| ())
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn load_day(&self, date: NaiveDate) -> StoreResult<Vec<RawDailyRecord>> {
        let day = format_date(date);

        let usage = sqlx::query_as::<_, UsageRow>(
            r#"
            SELECT user_id, traffic_bytes, connections
            FROM daily_usage
            WHERE date = $1
            "#,
        )
        .bind(&day)
        .fetch_all(self.pool.as_ref())
        .await
        .map_err(store_error)?;

        let domains = sqlx::query_as::<_, DomainRow>(
            r#"
            SELECT user_id, domain, traffic_bytes, connections
            FROM daily_domains
            WHERE date = $1
            "#,
        )
        .bind(&day)
        .fetch_all(self.pool.as_ref())
        .await
        .map_err(store_error)?;

        records_from_rows(date, usage, domains)
    }

    async fn list_dates(&self) -> StoreResult<Vec<NaiveDate>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT date FROM daily_usage ORDER BY date")
                .fetch_all(self.pool.as_ref())
                .await
                .map_err(store_error)?;

        rows.iter().map(|(raw,)| parse_date(raw)).collect()
    }

    async fn aliases(&self) -> StoreResult<BTreeMap<String, String>> {
        let rows = sqlx::query_as::<_, AliasRow>("SELECT user_id, alias FROM user_aliases")
            .fetch_all(self.pool.as_ref())
            .await
            .map_err(store_error)?;

        Ok(rows.into_iter().map(|r| (r.user_id, r.alias)).collect())
    }
}
