use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::metrics::track_store_operation;
use crate::models::SessionData;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("Failed to serialize session: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Server-side state keyed by the signed session id, plus the fixed-window
/// counters used for rate limiting.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<SessionData>, StoreError>;

    /// Overwrites the whole record and restarts its idle TTL.
    async fn save(&self, session_id: &str, data: &SessionData) -> Result<(), StoreError>;

    /// Counts one hit against `key`; false once `limit` hits were already
    /// counted in the current window.
    async fn check_rate_limit(
        &self,
        key: &str,
        limit: u32,
        window_seconds: u64,
    ) -> Result<bool, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    fn backend_name(&self) -> &'static str;
}

fn session_key(session_id: &str) -> String {
    format!("session:{}", session_id)
}

pub struct RedisSessionStore {
    redis: ConnectionManager,
    ttl_seconds: u64,
}

impl RedisSessionStore {
    pub async fn connect(redis_uri: &str, ttl_seconds: u64) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_uri)?;

        tracing::info!("Attempting to connect to Redis...");

        let redis = tokio::time::timeout(Duration::from_secs(30), ConnectionManager::new(client))
            .await
            .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

        let mut conn = redis.clone();
        tokio::time::timeout(
            Duration::from_secs(5),
            redis::cmd("PING").query_async::<String>(&mut conn),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

        tracing::info!("Redis connection established successfully");

        Ok(Self { redis, ttl_seconds })
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<SessionData>, StoreError> {
        let mut conn = self.redis.clone();
        let key = session_key(session_id);

        let payload: Option<String> = track_store_operation("get", async {
            redis::cmd("GET").arg(&key).query_async(&mut conn).await
        })
        .await?;

        let Some(payload) = payload else {
            return Ok(None);
        };

        match serde_json::from_str(&payload) {
            Ok(data) => Ok(Some(data)),
            Err(e) => {
                tracing::warn!("Discarding unreadable session {}: {}", session_id, e);
                Ok(None)
            }
        }
    }

    async fn save(&self, session_id: &str, data: &SessionData) -> Result<(), StoreError> {
        let mut conn = self.redis.clone();
        let key = session_key(session_id);
        let payload = serde_json::to_string(data)?;

        track_store_operation("setex", async {
            redis::cmd("SETEX")
                .arg(&key)
                .arg(self.ttl_seconds)
                .arg(payload)
                .query_async::<()>(&mut conn)
                .await
        })
        .await?;

        Ok(())
    }

    async fn check_rate_limit(
        &self,
        key: &str,
        limit: u32,
        window_seconds: u64,
    ) -> Result<bool, StoreError> {
        let mut conn = self.redis.clone();

        // Lua script for atomic fixed-window increment
        let lua_script = r#"
            local key = KEYS[1]
            local limit = tonumber(ARGV[1])
            local window = tonumber(ARGV[2])

            local current = redis.call('GET', key)

            if current == false then
                redis.call('SET', key, 1, 'EX', window)
                return 1
            end

            current = tonumber(current)

            if current >= limit then
                return 0
            end

            redis.call('INCR', key)
            return 1
        "#;

        let allowed: u32 = track_store_operation("ratelimit", async {
            redis::Script::new(lua_script)
                .key(key)
                .arg(limit)
                .arg(window_seconds)
                .invoke_async(&mut conn)
                .await
        })
        .await?;

        Ok(allowed == 1)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.redis.clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

/// In-process store for local development and tests. State is lost on
/// restart and is not shared between instances.
pub struct MemorySessionStore {
    ttl: Duration,
    sessions: Mutex<HashMap<String, (SessionData, Instant)>>,
    counters: Mutex<HashMap<String, (u32, Instant)>>,
}

impl MemorySessionStore {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            ttl: Duration::from_secs(ttl_seconds),
            sessions: Mutex::new(HashMap::new()),
            counters: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<SessionData>, StoreError> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        sessions.retain(|_, (_, expires_at)| *expires_at > now);
        Ok(sessions.get(session_id).map(|(data, _)| data.clone()))
    }

    async fn save(&self, session_id: &str, data: &SessionData) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.insert(
            session_id.to_string(),
            (data.clone(), Instant::now() + self.ttl),
        );
        Ok(())
    }

    async fn check_rate_limit(
        &self,
        key: &str,
        limit: u32,
        window_seconds: u64,
    ) -> Result<bool, StoreError> {
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        counters.retain(|_, (_, expires_at)| *expires_at > now);

        match counters.get_mut(key) {
            Some((count, _)) => {
                if *count >= limit {
                    return Ok(false);
                }
                *count += 1;
                Ok(true)
            }
            None => {
                counters.insert(
                    key.to_string(),
                    (1, now + Duration::from_secs(window_seconds)),
                );
                Ok(true)
            }
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_round_trips_sessions() {
        let store = MemorySessionStore::new(60);
        assert!(store.load("abc").await.unwrap().is_none());

        let data = SessionData {
            language: Some("fr".into()),
            score: 4,
            ..Default::default()
        };
        store.save("abc", &data).await.unwrap();

        assert_eq!(store.load("abc").await.unwrap(), Some(data));
        assert!(store.load("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_expires_idle_sessions() {
        let store = MemorySessionStore::new(0);
        store.save("abc", &SessionData::default()).await.unwrap();
        assert!(store.load("abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_rate_limit_fixed_window() {
        let store = MemorySessionStore::new(60);
        for _ in 0..3 {
            assert!(store.check_rate_limit("k", 3, 60).await.unwrap());
        }
        assert!(!store.check_rate_limit("k", 3, 60).await.unwrap());
        assert!(store.check_rate_limit("other", 3, 60).await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_rate_limit_window_resets() {
        let store = MemorySessionStore::new(60);
        assert!(store.check_rate_limit("k", 1, 0).await.unwrap());
        // window of zero seconds has already elapsed
        assert!(store.check_rate_limit("k", 1, 0).await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_rate_limit_drops_expired_counters() {
        let store = MemorySessionStore::new(60);
        for i in 0..500 {
            let key = format!("ratelimit:generate:192.0.2.{}", i);
            assert!(store.check_rate_limit(&key, 3, 0).await.unwrap());
        }
        assert!(store.check_rate_limit("ratelimit:ip:live", 3, 60).await.unwrap());

        let counters = store.counters.lock().unwrap();
        assert_eq!(counters.len(), 1);
        assert!(counters.contains_key("ratelimit:ip:live"));
    }
}
