use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::{Client, CustomRedisError};

const SCAN_BATCH_SIZE: usize = 1000;

#[derive(Clone)]
pub struct RedisClient {
    connection: MultiplexedConnection,
}

impl RedisClient {
    pub async fn new(addr: String) -> Result<RedisClient, CustomRedisError> {
        let client = redis::Client::open(addr)?;
        let connection = client.get_multiplexed_async_connection().await?;
        Ok(RedisClient { connection })
    }
}

#[async_trait]
impl Client for RedisClient {
    async fn set(&self, k: String, v: String) -> Result<(), CustomRedisError> {
        let mut conn = self.connection.clone();
        conn.set::<_, _, ()>(k, v).await?;
        Ok(())
    }

    async fn scan_keys(&self, pattern: String) -> Result<Vec<String>, CustomRedisError> {
        let mut conn = self.connection.clone();
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH_SIZE)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        // SCAN may return a key more than once
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }

    async fn mget(&self, keys: Vec<String>) -> Result<Vec<Option<String>>, CustomRedisError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.connection.clone();
        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await?;
        Ok(values)
    }

    async fn batch_del(&self, keys: Vec<String>) -> Result<u64, CustomRedisError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection.clone();
        let removed: u64 = conn.del(keys).await?;
        Ok(removed)
    }
}
