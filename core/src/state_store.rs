//! # State Store (C13 persistence)
//!
//! Persists the serialized [`crate::state::SystemState`] to a single external
//! key under `autobot:system_state`, with a TTL, rewritten on every mutation and
//! reloaded at startup. [`RedisStateStore`] is the production backend; a
//! connection pool with retry-with-backoff absorbs transient Redis errors
//! without ever blocking the orchestrator on a persistent one.

use crate::settings::StateStoreSettings;
use crate::state::SystemState;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{error, warn};

pub const STATE_KEY: &str = "autobot:system_state";

#[derive(Debug, thiserror::Error)]
pub enum StateStoreError {
    #[error("state store transport error: {0}")]
    Transport(#[from] redis::RedisError),
    #[error("failed to (de)serialize system state: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self) -> Result<Option<SystemState>, StateStoreError>;
    async fn save(&self, state: &SystemState, ttl: Duration) -> Result<(), StateStoreError>;
}

/// Redis-backed store. Transient errors are retried ×3 with exponential
/// backoff; a persistent failure is logged as critical and the caller falls
/// back to continuing with in-memory state (it never panics or aborts the
/// orchestrator loop).
#[derive(Debug, Clone)]
pub struct RedisStateStore {
    manager: ConnectionManager,
}

impl RedisStateStore {
    pub async fn connect(settings: &StateStoreSettings) -> Result<Self, StateStoreError> {
        let auth = settings.password.as_deref().map(|pw| format!(":{pw}@")).unwrap_or_default();
        let url = format!("redis://{auth}{}:{}/{}", settings.host, settings.port, settings.db);
        let client = redis::Client::open(url)?;
        let manager = client.get_connection_manager().await?;
        Ok(Self { manager })
    }

    async fn with_retry<T, F, Fut>(&self, operation: &'static str, mut f: F) -> Result<T, StateStoreError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, redis::RedisError>>,
    {
        let mut attempt = 0;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(error) if attempt < 3 => {
                    attempt += 1;
                    let backoff = Duration::from_millis(100 * 2u64.pow(attempt));
                    warn!(operation, attempt, %error, ?backoff, "state store operation failed, retrying");
                    tokio::time::sleep(backoff).await;
                }
                Err(error) => {
                    error!(operation, %error, "state store operation failed persistently");
                    return Err(StateStoreError::Transport(error));
                }
            }
        }
    }
}

#[async_trait]
impl StateStore for RedisStateStore {
    async fn load(&self) -> Result<Option<SystemState>, StateStoreError> {
        let mut manager = self.manager.clone();
        let raw: Option<String> =
            self.with_retry("load", || { let mut m = manager.clone(); async move { m.get(STATE_KEY).await } }).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, state: &SystemState, ttl: Duration) -> Result<(), StateStoreError> {
        let json = serde_json::to_string(state)?;
        let manager = self.manager.clone();
        self.with_retry("save", || {
            let mut m = manager.clone();
            let json = json.clone();
            let ttl_secs = ttl.as_secs();
            async move { m.set_ex::<_, _, ()>(STATE_KEY, json, ttl_secs).await }
        })
        .await
    }
}

/// Non-persistent fallback used when Redis is unreachable at startup or in
/// tests; the orchestrator continues operating purely in-memory.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    state: tokio::sync::Mutex<Option<SystemState>>,
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn load(&self) -> Result<Option<SystemState>, StateStoreError> {
        Ok(self.state.lock().await.clone())
    }

    async fn save(&self, state: &SystemState, _ttl: Duration) -> Result<(), StateStoreError> {
        *self.state.lock().await = Some(state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn in_memory_store_round_trips_state() {
        let store = InMemoryStateStore::default();
        assert!(store.load().await.unwrap().is_none());

        let state = SystemState::starting(10_000.0, Utc::now());
        store.save(&state, Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.load().await.unwrap().unwrap(), state);
    }
}
