use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum CustomRedisError {
    #[error("Timeout error")]
    Timeout,
    #[error(transparent)]
    Redis(#[from] Arc<redis::RedisError>),
}

impl From<redis::RedisError> for CustomRedisError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            CustomRedisError::Timeout
        } else {
            CustomRedisError::Redis(Arc::new(err))
        }
    }
}

/// The subset of Redis used as a hot event cache: plain string values,
/// glob-pattern key scans and bulk reads/deletes.
#[async_trait]
pub trait Client {
    async fn set(&self, k: String, v: String) -> Result<(), CustomRedisError>;

    /// Iterates the keyspace with SCAN, never KEYS, so large caches do not block the server.
    async fn scan_keys(&self, pattern: String) -> Result<Vec<String>, CustomRedisError>;

    /// Values in the order of `keys`, `None` for keys that vanished in between.
    async fn mget(&self, keys: Vec<String>) -> Result<Vec<Option<String>>, CustomRedisError>;

    /// Returns the number of keys actually removed.
    async fn batch_del(&self, keys: Vec<String>) -> Result<u64, CustomRedisError>;
}

mod client;
mod mock;

pub use client::RedisClient;
pub use mock::{MockRedisCall, MockRedisClient, MockRedisValue};

/// Glob matching restricted to `*`, the only wildcard the cache key patterns
/// use. A backslash makes the next character literal.
pub(crate) fn glob_match(pattern: &str, candidate: &str) -> bool {
    let parts = glob_parts(pattern);
    if parts.len() == 1 {
        return parts[0] == candidate;
    }

    let (first, last) = (parts[0].as_str(), parts[parts.len() - 1].as_str());
    if !candidate.starts_with(first) || candidate.len() < first.len() + last.len() {
        return false;
    }
    if !candidate[first.len()..].ends_with(last) {
        return false;
    }

    let mut rest = &candidate[first.len()..candidate.len() - last.len()];
    for middle in &parts[1..parts.len() - 1] {
        match rest.find(middle.as_str()) {
            Some(idx) => rest = &rest[idx + middle.len()..],
            None => return false,
        }
    }
    true
}

/// Literal segments between unescaped `*`.
fn glob_parts(pattern: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => current.extend(chars.next()),
            '*' => parts.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    parts.push(current);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_without_wildcard_is_equality() {
        assert!(glob_match("matches:m1", "matches:m1"));
        assert!(!glob_match("matches:m1", "matches:m12"));
    }

    #[test]
    fn glob_matches_cache_key_patterns() {
        let key = "matches:m1:round:3:player:765:events";
        assert!(glob_match("matches:*:events", key));
        assert!(glob_match("matches:*:player:765:events", key));
        assert!(glob_match("*", key));
        assert!(!glob_match("matches:*:kills", key));
        assert!(!glob_match("matches:*:player:999:events", key));
    }

    #[test]
    fn escaped_wildcards_are_literal() {
        let pattern = r"matches:*:player:\*:events";
        assert!(glob_match(pattern, "matches:m1:player:*:events"));
        assert!(!glob_match(pattern, "matches:m1:player:765:events"));
        assert!(glob_match(r"a\\b", r"a\b"));
    }

    #[test]
    fn glob_does_not_overlap_prefix_and_suffix() {
        assert!(!glob_match("ab*ba", "aba"));
        assert!(glob_match("ab*ba", "abba"));
    }

    #[test]
    fn timeout_errors_are_mapped() {
        let err: CustomRedisError =
            redis::RedisError::from((redis::ErrorKind::IoError, "broken pipe")).into();
        assert!(matches!(err, CustomRedisError::Redis(_)));
    }
}
