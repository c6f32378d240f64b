use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::events::{KillEventRow, PlayerEventRow};
use crate::query::{EventQueryConfig, KillEventQueryConfig, QueryFilter};
use crate::store::{EventStore, StoreBatch, StoreError};

/// Store kept in process memory, for local runs and tests. Rows are held in
/// their column form so filters apply exactly as the SQL clauses would.
#[derive(Default)]
pub struct MemoryStore {
    players: Mutex<Vec<Value>>,
    kills: Mutex<Vec<Value>>,
    unavailable: AtomicBool,
}

fn lock(rows: &Mutex<Vec<Value>>) -> Result<MutexGuard<'_, Vec<Value>>, StoreError> {
    rows.lock()
        .map_err(|_| StoreError::Unavailable("poisoned lock".to_string()))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While unavailable every call fails, like a store that went away.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn player_row_count(&self) -> usize {
        self.players.lock().map(|rows| rows.len()).unwrap_or_default()
    }

    pub fn kill_row_count(&self) -> usize {
        self.kills.lock().map(|rows| rows.len()).unwrap_or_default()
    }

    fn check(&self) -> Result<(), StoreError> {
        match self.unavailable.load(Ordering::SeqCst) {
            true => Err(StoreError::Unavailable("memory store switched off".to_string())),
            false => Ok(()),
        }
    }

    fn append<T: Serialize>(rows: &Mutex<Vec<Value>>, batch: &[T]) -> Result<(), StoreError> {
        let values = batch
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        lock(rows)?.extend(values);
        Ok(())
    }

    fn select<T: DeserializeOwned, F: QueryFilter>(
        rows: &Mutex<Vec<Value>>,
        ts_column: &str,
        filter: &F,
    ) -> Result<Vec<T>, StoreError> {
        let clauses = filter.clauses();
        let mut matching: Vec<Value> = lock(rows)?
            .iter()
            .filter(|row| clauses.iter().all(|c| c.value.matches(&row[c.column])))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            let key = |row: &Value| (row["match_id"].as_str().map(str::to_owned), row[ts_column].as_i64());
            key(a).cmp(&key(b))
        });
        matching
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn ensure_tables(&self) -> Result<(), StoreError> {
        self.check()
    }

    async fn insert(&self, batch: StoreBatch) -> Result<(), StoreError> {
        self.check()?;
        match batch {
            StoreBatch::Players(rows) => Self::append(&self.players, &rows),
            StoreBatch::Kills(rows) => Self::append(&self.kills, &rows),
        }
    }

    async fn player_events(
        &self,
        filter: &EventQueryConfig,
    ) -> Result<Vec<PlayerEventRow>, StoreError> {
        self.check()?;
        Self::select(&self.players, "event_timestamp", filter)
    }

    async fn kill_events(
        &self,
        filter: &KillEventQueryConfig,
    ) -> Result<Vec<KillEventRow>, StoreError> {
        self.check()?;
        Self::select(&self.kills, "timestamp", filter)
    }
}
