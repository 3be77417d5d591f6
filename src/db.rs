use crate::api::*;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{query, Executor, Row, SqlitePool};

/// Append-only journal of published events, read by indexers.
#[async_trait]
pub trait DB {
    async fn add_event(&self, record: &EventRecord) -> Result<()>;
    async fn get_events(&self, market: Option<MarketId>, since: u64) -> Result<Vec<EventRecord>>;
    async fn get_last_seq(&self) -> Result<Option<u64>>;
}
pub struct SQLite {
    connection: SqlitePool,
}
impl SQLite {
    pub async fn new(db_conn: Option<String>) -> Result<Self> {
        let db_conn = db_conn.unwrap_or("sqlite::memory:".to_string());
        let mut options = SqlitePoolOptions::new();
        if db_conn.contains(":memory:") {
            // An in-memory database lives only as long as one of its connections.
            options = options
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let connection: SqlitePool = options
            .connect(db_conn.as_str())
            .await
            .with_context(|| format!("couldn't open database {}", db_conn))?;
        connection
            .execute(
                "CREATE TABLE IF NOT EXISTS events (\
                seq INTEGER PRIMARY KEY,\
                at INTEGER NOT NULL,\
                market INTEGER NOT NULL,\
                kind TEXT NOT NULL,\
                record TEXT NOT NULL\
                )",
            )
            .await?;
        Ok(Self { connection })
    }
}
#[async_trait]
impl DB for SQLite {
    async fn add_event(&self, record: &EventRecord) -> Result<()> {
        self.connection
            .execute(
                query(
                    "INSERT INTO events (\
                seq,\
                at,\
                market,\
                kind,\
                record)\
                VALUES (?,?,?,?,?)",
                )
                .bind(i64::try_from(record.seq)?)
                .bind(record.at.timestamp())
                .bind(i64::try_from(record.event.market())?)
                .bind(record.event.kind())
                .bind(serde_json::to_string(record)?),
            )
            .await
            .with_context(|| format!("couldn't journal event {}", record.seq))?;
        Ok(())
    }
    async fn get_events(&self, market: Option<MarketId>, since: u64) -> Result<Vec<EventRecord>> {
        let market = market.map(i64::try_from).transpose()?;
        let rows = self
            .connection
            .fetch_all(
                query(
                    "SELECT record FROM events \
                WHERE seq >= ? AND (? IS NULL OR market = ?) \
                ORDER BY seq",
                )
                .bind(i64::try_from(since)?)
                .bind(market)
                .bind(market),
            )
            .await?;
        let mut records = vec![];
        for row in rows {
            let record: String = row.get("record");
            records.push(serde_json::from_str(&record)?);
        }
        Ok(records)
    }
    async fn get_last_seq(&self) -> Result<Option<u64>> {
        let seq: Option<i64> = self
            .connection
            .fetch_one(query("SELECT MAX(seq) AS seq FROM events"))
            .await?
            .get("seq");
        Ok(seq.map(|seq| seq as u64))
    }
}
