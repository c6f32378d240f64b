use async_trait::async_trait;
use clickhouse::{Client, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::config::ClickHouseConfig;
use crate::events::{KillEventRow, PlayerEventRow};
use crate::query::{EventQueryConfig, KillEventQueryConfig, QueryFilter};
use crate::store::{
    EventStore, StoreBatch, StoreError, KILL_EVENTS_TABLE, PLAYER_EVENTS_TABLE,
};

const CREATE_PLAYER_EVENTS: &str = "
CREATE TABLE IF NOT EXISTS cs2_player_events (
    match_id String,
    round UInt32,
    map String,
    team String,
    steamid String,
    name String,
    mode String,
    health UInt32,
    armor UInt32,
    helmet Bool,
    money UInt32,
    equip_value UInt32,
    round_kills Int32,
    round_killhs Int32,
    kills Int32,
    assists Int32,
    deaths Int32,
    mvps Int32,
    score Int32,
    event_timestamp Int64,
    win_team String
)
ENGINE = MergeTree
PARTITION BY toDate(fromUnixTimestamp(event_timestamp))
ORDER BY (match_id, event_timestamp)";

const CREATE_KILL_EVENTS: &str = "
CREATE TABLE IF NOT EXISTS cs2_kill_events (
    match_id String,
    round UInt32,
    map String,
    team String,
    steamid String,
    name String,
    mode String,
    weapon_name String,
    weapon_type String,
    weapon_ammo UInt32,
    weapon_reserve UInt32,
    weapon_skin String,
    weapon_headshot Bool,
    timestamp Int64
)
ENGINE = MergeTree
PARTITION BY toDate(fromUnixTimestamp(timestamp))
ORDER BY (match_id, timestamp)";

#[derive(Clone)]
pub struct ClickHouseStore {
    client: Client,
}

impl ClickHouseStore {
    pub fn new(config: &ClickHouseConfig) -> Self {
        let client = Client::default()
            .with_url(config.clickhouse_url.clone())
            .with_database(config.clickhouse_database.clone())
            .with_user(config.clickhouse_user.clone())
            .with_password(config.clickhouse_password.clone());
        Self { client }
    }

    async fn write<T: Row + Serialize>(&self, table: &str, rows: &[T]) -> Result<(), StoreError> {
        let mut insert = self.client.insert(table)?;
        for row in rows {
            insert.write(row).await?;
        }
        insert.end().await?;
        Ok(())
    }

    async fn select<T, F>(
        &self,
        table: &str,
        ts_column: &str,
        filter: &F,
    ) -> Result<Vec<T>, StoreError>
    where
        T: Row + DeserializeOwned,
        F: QueryFilter,
    {
        let sql = select_sql(table, ts_column, filter);
        debug!("store query: {}", sql);
        let mut query = self.client.query(&sql);
        for value in filter.binds() {
            query = query.bind(value);
        }
        Ok(query.fetch_all::<T>().await?)
    }
}

pub(crate) fn select_sql<F: QueryFilter>(table: &str, ts_column: &str, filter: &F) -> String {
    format!(
        "SELECT ?fields FROM {table}{} ORDER BY match_id, {ts_column}",
        filter.where_sql()
    )
}

#[async_trait]
impl EventStore for ClickHouseStore {
    async fn ensure_tables(&self) -> Result<(), StoreError> {
        for ddl in [CREATE_PLAYER_EVENTS, CREATE_KILL_EVENTS] {
            self.client.query(ddl).execute().await?;
        }
        info!("store tables ready");
        Ok(())
    }

    #[instrument(skip_all, fields(rows = batch.len()))]
    async fn insert(&self, batch: StoreBatch) -> Result<(), StoreError> {
        match batch {
            StoreBatch::Players(rows) => self.write(PLAYER_EVENTS_TABLE, &rows).await,
            StoreBatch::Kills(rows) => self.write(KILL_EVENTS_TABLE, &rows).await,
        }
    }

    async fn player_events(
        &self,
        filter: &EventQueryConfig,
    ) -> Result<Vec<PlayerEventRow>, StoreError> {
        self.select(PLAYER_EVENTS_TABLE, "event_timestamp", filter)
            .await
    }

    async fn kill_events(
        &self,
        filter: &KillEventQueryConfig,
    ) -> Result<Vec<KillEventRow>, StoreError> {
        self.select(KILL_EVENTS_TABLE, "timestamp", filter).await
    }
}
