use std::sync::Arc;

use common_redis::{Client, CustomRedisError};
use thiserror::Error;
use tracing::warn;

use crate::events::{BusEvent, EventKind};

/// Every cached event key starts with this prefix.
const KEY_PREFIX: &str = "matches:";

#[derive(Error, Debug)]
pub enum CacheError {
    #[error(transparent)]
    Redis(#[from] CustomRedisError),
    #[error("failed to serialize event: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Latest event per `(match, round, player, kind)`, kept in Redis for hot reads.
#[derive(Clone)]
pub struct EventCache {
    client: Arc<dyn Client + Send + Sync>,
}

impl EventCache {
    pub fn new(client: Arc<dyn Client + Send + Sync>) -> Self {
        Self { client }
    }

    /// Overwrites the key, a redelivered event leaves the cache unchanged.
    pub async fn upsert<E: BusEvent>(&self, event: &E) -> Result<(), CacheError> {
        let value = serde_json::to_string(event)?;
        self.client.set(event.cache_key(), value).await?;
        Ok(())
    }

    /// Cached events of one kind, for every player or only `steamid`.
    /// Values that no longer decode are skipped.
    pub async fn list<E: BusEvent>(&self, steamid: Option<&str>) -> Result<Vec<E>, CacheError> {
        let keys = self.client.scan_keys(pattern(E::KIND, steamid)).await?;
        let values = self.client.mget(keys.clone()).await?;

        let mut events = Vec::with_capacity(values.len());
        for (key, value) in keys.iter().zip(values) {
            let Some(value) = value else { continue };
            match serde_json::from_str(&value) {
                Ok(event) => events.push(event),
                Err(e) => warn!("skipping undecodable cache entry {}: {}", key, e),
            }
        }
        Ok(events)
    }

    /// Number of cached event keys, both kinds.
    pub async fn size(&self) -> Result<usize, CacheError> {
        Ok(self.client.scan_keys(all_keys()).await?.len())
    }

    /// Removes every cached event, returns how many keys went away.
    pub async fn clear(&self) -> Result<u64, CacheError> {
        let keys = self.client.scan_keys(all_keys()).await?;
        Ok(self.client.batch_del(keys).await?)
    }
}

fn pattern(kind: EventKind, steamid: Option<&str>) -> String {
    format!(
        "{KEY_PREFIX}*:round:*:player:{}:{}",
        steamid.map_or_else(|| "*".to_string(), escape_glob),
        kind.cache_suffix()
    )
}

/// Makes a caller-supplied value match only itself in a SCAN pattern.
fn escape_glob(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn all_keys() -> String {
    format!("{KEY_PREFIX}*")
}

#[cfg(test)]
mod tests {
    use common_redis::{MockRedisCall, MockRedisClient, MockRedisValue};

    use super::*;
    use crate::events::{KillEvent, PlayerEvent};

    fn player(match_id: &str, round: u32, steamid: &str, money: u32) -> PlayerEvent {
        PlayerEvent {
            match_id: match_id.into(),
            round,
            steamid: steamid.into(),
            money,
            ..Default::default()
        }
    }

    #[test]
    fn key_patterns() {
        assert_eq!(
            pattern(EventKind::Player, None),
            "matches:*:round:*:player:*:events"
        );
        assert_eq!(
            pattern(EventKind::Kill, Some("s1")),
            "matches:*:round:*:player:s1:kills"
        );
    }

    #[test]
    fn steamid_wildcards_are_escaped() {
        assert_eq!(
            pattern(EventKind::Player, Some("*")),
            r"matches:*:round:*:player:\*:events"
        );
        assert_eq!(
            pattern(EventKind::Kill, Some(r"s?[1]\")),
            r"matches:*:round:*:player:s\?\[1\]\\:kills"
        );
    }

    #[tokio::test]
    async fn wildcard_steamid_does_not_widen_the_scan() {
        let redis = MockRedisClient::new();
        let cache = EventCache::new(Arc::new(redis.clone()));
        cache.upsert(&player("m1", 1, "s1", 800)).await.unwrap();
        cache.upsert(&player("m1", 1, "s2", 800)).await.unwrap();

        assert!(cache.list::<PlayerEvent>(Some("*")).await.unwrap().is_empty());
        assert_eq!(
            redis.get_calls().last(),
            Some(&MockRedisCall {
                op: "mget".to_string(),
                key: String::new(),
                value: MockRedisValue::VecString(Vec::new()),
            })
        );
        assert!(redis.get_calls().contains(&MockRedisCall {
            op: "scan_keys".to_string(),
            key: r"matches:*:round:*:player:\*:events".to_string(),
            value: MockRedisValue::None,
        }));
    }

    #[tokio::test]
    async fn upsert_overwrites_the_key() {
        let redis = MockRedisClient::new();
        let cache = EventCache::new(Arc::new(redis.clone()));

        cache.upsert(&player("m1", 1, "s1", 800)).await.unwrap();
        cache.upsert(&player("m1", 1, "s1", 1400)).await.unwrap();

        let stored = redis.snapshot();
        assert_eq!(stored.len(), 1);
        let cached: PlayerEvent =
            serde_json::from_str(&stored["matches:m1:round:1:player:s1:events"]).unwrap();
        assert_eq!(cached.money, 1400);
    }

    #[tokio::test]
    async fn lists_by_kind_and_player() {
        let cache = EventCache::new(Arc::new(MockRedisClient::new()));
        cache.upsert(&player("m1", 1, "s1", 800)).await.unwrap();
        cache.upsert(&player("m1", 1, "s2", 800)).await.unwrap();
        cache.upsert(&player("m1", 2, "s1", 800)).await.unwrap();
        cache
            .upsert(&KillEvent {
                match_id: "m1".into(),
                round: 1,
                steamid: "s1".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(cache.list::<PlayerEvent>(None).await.unwrap().len(), 3);
        assert_eq!(cache.list::<PlayerEvent>(Some("s1")).await.unwrap().len(), 2);
        assert_eq!(cache.list::<KillEvent>(None).await.unwrap().len(), 1);
        assert!(cache.list::<KillEvent>(Some("s2")).await.unwrap().is_empty());
        assert_eq!(cache.size().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn undecodable_entries_are_skipped() {
        let redis = MockRedisClient::new()
            .with_value("matches:m1:round:1:player:s1:events", "{broken")
            .with_value(
                "matches:m1:round:2:player:s1:events",
                &serde_json::to_string(&player("m1", 2, "s1", 800)).unwrap(),
            );
        let cache = EventCache::new(Arc::new(redis));

        let events = cache.list::<PlayerEvent>(None).await.unwrap();
        assert_eq!(events, vec![player("m1", 2, "s1", 800)]);
    }

    #[tokio::test]
    async fn clear_only_touches_event_keys() {
        let redis = MockRedisClient::new().with_value("unrelated", "1");
        let cache = EventCache::new(Arc::new(redis.clone()));
        cache.upsert(&player("m1", 1, "s1", 800)).await.unwrap();
        cache.upsert(&player("m2", 1, "s1", 800)).await.unwrap();

        assert_eq!(cache.clear().await.unwrap(), 2);
        assert_eq!(cache.size().await.unwrap(), 0);
        assert!(redis.snapshot().contains_key("unrelated"));
    }

    #[tokio::test]
    async fn redis_errors_surface() {
        let redis = MockRedisClient::new().with_error("set", CustomRedisError::Timeout);
        let cache = EventCache::new(Arc::new(redis));
        assert!(matches!(
            cache.upsert(&player("m1", 1, "s1", 800)).await,
            Err(CacheError::Redis(CustomRedisError::Timeout))
        ));
    }
}
