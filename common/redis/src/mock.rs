use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::{glob_match, Client, CustomRedisError};

/// In-memory stand-in for Redis. Writes are applied to a shared keyspace so
/// reads observe them, every call is recorded, and errors can be injected per
/// operation.
#[derive(Clone, Default)]
pub struct MockRedisClient {
    values: Arc<Mutex<BTreeMap<String, String>>>,
    errors: HashMap<String, CustomRedisError>,
    calls: Arc<Mutex<Vec<MockRedisCall>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MockRedisValue {
    None,
    String(String),
    VecString(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockRedisCall {
    pub op: String,
    pub key: String,
    pub value: MockRedisValue,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl MockRedisClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a value without recording a call.
    pub fn with_value(self, key: &str, value: &str) -> Self {
        lock(&self.values).insert(key.to_owned(), value.to_owned());
        self
    }

    /// Makes every call of `op` ("set", "scan_keys", "mget", "batch_del") fail.
    pub fn with_error(mut self, op: &str, err: CustomRedisError) -> Self {
        self.errors.insert(op.to_owned(), err);
        self
    }

    pub fn get_calls(&self) -> Vec<MockRedisCall> {
        lock(&self.calls).clone()
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        lock(&self.values).clone()
    }

    fn record(&self, op: &str, key: &str, value: MockRedisValue) -> Result<(), CustomRedisError> {
        lock(&self.calls).push(MockRedisCall {
            op: op.to_owned(),
            key: key.to_owned(),
            value,
        });
        match self.errors.get(op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Client for MockRedisClient {
    async fn set(&self, k: String, v: String) -> Result<(), CustomRedisError> {
        self.record("set", &k, MockRedisValue::String(v.clone()))?;
        lock(&self.values).insert(k, v);
        Ok(())
    }

    async fn scan_keys(&self, pattern: String) -> Result<Vec<String>, CustomRedisError> {
        self.record("scan_keys", &pattern, MockRedisValue::None)?;
        Ok(lock(&self.values)
            .keys()
            .filter(|k| glob_match(&pattern, k))
            .cloned()
            .collect())
    }

    async fn mget(&self, keys: Vec<String>) -> Result<Vec<Option<String>>, CustomRedisError> {
        self.record("mget", "", MockRedisValue::VecString(keys.clone()))?;
        let values = lock(&self.values);
        Ok(keys.iter().map(|k| values.get(k).cloned()).collect())
    }

    async fn batch_del(&self, keys: Vec<String>) -> Result<u64, CustomRedisError> {
        self.record("batch_del", "", MockRedisValue::VecString(keys.clone()))?;
        let mut values = lock(&self.values);
        Ok(keys.iter().filter(|k| values.remove(*k).is_some()).count() as u64)
    }
}
