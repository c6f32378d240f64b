use async_trait::async_trait;
use thiserror::Error;

use crate::events::{KillEventRow, PlayerEventRow};
use crate::query::{EventQueryConfig, KillEventQueryConfig};

pub mod clickhouse;
pub mod memory;

pub const PLAYER_EVENTS_TABLE: &str = "cs2_player_events";
pub const KILL_EVENTS_TABLE: &str = "cs2_kill_events";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("clickhouse error: {0}")]
    ClickHouse(#[from] ::clickhouse::error::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Rows of one table, inserted together.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreBatch {
    Players(Vec<PlayerEventRow>),
    Kills(Vec<KillEventRow>),
}

impl StoreBatch {
    pub fn len(&self) -> usize {
        match self {
            StoreBatch::Players(rows) => rows.len(),
            StoreBatch::Kills(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Append-only analytical store. Reads come back ordered by
/// `(match_id, timestamp)`.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn ensure_tables(&self) -> Result<(), StoreError>;
    async fn insert(&self, batch: StoreBatch) -> Result<(), StoreError>;
    async fn player_events(
        &self,
        filter: &EventQueryConfig,
    ) -> Result<Vec<PlayerEventRow>, StoreError>;
    async fn kill_events(
        &self,
        filter: &KillEventQueryConfig,
    ) -> Result<Vec<KillEventRow>, StoreError>;
}
