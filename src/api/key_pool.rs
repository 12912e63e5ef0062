//! Cooldown-aware rotation over a pool of per-credential sub-clients.
//!
//! Guarded by a dedicated mutex held only during rotation decisions, per the
//! shared-resource model: the cooldown map is small, contended briefly, and
//! must never be held across an API call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::api::provider::GenerativeClient;
use crate::api::retry::QUOTA_COOLDOWN;
use crate::error::ApiError;

struct KeyState {
    client: Arc<dyn GenerativeClient>,
    last_quota_failure: Option<Instant>,
}

/// A pool of eagerly constructed sub-clients with a currently-selected
/// index, rotated on failure.
pub struct KeyPool {
    keys: Mutex<Vec<KeyState>>,
    current: Mutex<usize>,
    cooldown: Duration,
}

impl KeyPool {
    /// Builds a pool from one client per credential. `clients` must be
    /// non-empty.
    #[must_use]
    pub fn new(clients: Vec<Arc<dyn GenerativeClient>>) -> Self {
        Self::with_cooldown(clients, QUOTA_COOLDOWN)
    }

    /// Like [`Self::new`] but with an overridden cooldown window, used in
    /// tests to avoid waiting out the real 100-second window.
    #[must_use]
    pub fn with_cooldown(clients: Vec<Arc<dyn GenerativeClient>>, cooldown: Duration) -> Self {
        let keys = clients
            .into_iter()
            .map(|client| KeyState {
                client,
                last_quota_failure: None,
            })
            .collect();
        Self {
            keys: Mutex::new(keys),
            current: Mutex::new(0),
            cooldown,
        }
    }

    /// Number of keys in the pool.
    pub async fn len(&self) -> usize {
        self.keys.lock().await.len()
    }

    /// Whether the pool is empty.
    pub async fn is_empty(&self) -> bool {
        self.keys.lock().await.is_empty()
    }

    /// Index of the currently selected key.
    pub async fn current_index(&self) -> usize {
        *self.current.lock().await
    }

    /// Runs `f` against the currently selected client. The pool lock is
    /// released before `f` is awaited, so concurrent calls through distinct
    /// keys never block each other.
    pub async fn with_current<F, Fut, T>(&self, f: F) -> T
    where
        F: FnOnce(Arc<dyn GenerativeClient>) -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let index = self.current_index().await;
        self.with_index(index, f).await
    }

    /// Runs `f` against the client at `index`.
    async fn with_index<F, Fut, T>(&self, index: usize, f: F) -> T
    where
        F: FnOnce(Arc<dyn GenerativeClient>) -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let client = self.keys.lock().await[index].client.clone();
        f(client).await
    }

    /// Marks the key at `index` as quota-exhausted right now.
    pub async fn mark_quota_exhausted(&self, index: usize) {
        let mut keys = self.keys.lock().await;
        if let Some(state) = keys.get_mut(index) {
            state.last_quota_failure = Some(Instant::now());
        }
    }

    /// Advances to the next key, skipping any still in cooldown.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::AllKeysExhausted`] if every key is in cooldown.
    pub async fn rotate(&self) -> Result<usize, ApiError> {
        let keys = self.keys.lock().await;
        if keys.is_empty() {
            return Err(ApiError::AllKeysExhausted);
        }

        let mut current = self.current.lock().await;
        let start = *current;
        let n = keys.len();

        for step in 1..=n {
            let candidate = (start + step) % n;
            if !Self::in_cooldown(&keys[candidate], self.cooldown) {
                *current = candidate;
                return Ok(candidate);
            }
        }

        Err(ApiError::AllKeysExhausted)
    }

    fn in_cooldown(state: &KeyState, cooldown: Duration) -> bool {
        state
            .last_quota_failure
            .is_some_and(|t| t.elapsed() < cooldown)
    }

    /// Whether the key at `index` is currently in cooldown.
    pub async fn is_in_cooldown(&self, index: usize) -> bool {
        let keys = self.keys.lock().await;
        keys.get(index)
            .is_some_and(|s| Self::in_cooldown(s, self.cooldown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::provider::{GenerateRequest, GenerateResponse, ModelInfo};
    use async_trait::async_trait;

    struct StubClient;

    #[async_trait]
    impl GenerativeClient for StubClient {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn generate(
            &self,
            _request: &GenerateRequest,
            _timeout: Duration,
        ) -> Result<GenerateResponse, ApiError> {
            Ok(GenerateResponse::Text("ok".to_string()))
        }

        async fn list_models(&self) -> Result<Vec<ModelInfo>, ApiError> {
            Ok(Vec::new())
        }
    }

    fn pool(n: usize, cooldown: Duration) -> KeyPool {
        let clients: Vec<Arc<dyn GenerativeClient>> =
            (0..n).map(|_| Arc::new(StubClient) as Arc<dyn GenerativeClient>).collect();
        KeyPool::with_cooldown(clients, cooldown)
    }

    #[tokio::test]
    async fn rotate_cycles_through_all_healthy_keys() {
        let pool = pool(3, Duration::from_secs(100));
        let mut seen = std::collections::HashSet::new();
        seen.insert(pool.current_index().await);
        for _ in 0..2 {
            seen.insert(pool.rotate().await.unwrap_or_else(|e| unreachable!("{e}")));
        }
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test]
    async fn rotate_skips_keys_in_cooldown() {
        let pool = pool(3, Duration::from_secs(100));
        pool.mark_quota_exhausted(1).await;
        let next = pool.rotate().await.unwrap_or_else(|e| unreachable!("{e}"));
        assert_ne!(next, 1);
    }

    #[tokio::test]
    async fn rotate_fails_when_all_keys_in_cooldown() {
        let pool = pool(2, Duration::from_secs(100));
        pool.mark_quota_exhausted(0).await;
        pool.mark_quota_exhausted(1).await;
        assert!(matches!(pool.rotate().await, Err(ApiError::AllKeysExhausted)));
    }

    #[tokio::test]
    async fn cooldown_expires_after_window() {
        let pool = pool(2, Duration::from_millis(20));
        pool.mark_quota_exhausted(0).await;
        assert!(pool.is_in_cooldown(0).await);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!pool.is_in_cooldown(0).await);
    }

    #[tokio::test]
    async fn empty_pool_reports_exhausted() {
        let pool = KeyPool::new(Vec::new());
        assert!(matches!(pool.rotate().await, Err(ApiError::AllKeysExhausted)));
    }
}
