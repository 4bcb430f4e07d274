use async_trait::async_trait;
use lens_model::SessionId;
use lens_store::{KeyValueStore, MemoryStore, SaveMethod, StorageGuard, StoreError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Store that fails `set` with a scripted error before delegating
#[derive(Default)]
struct ScriptedFailureStore {
    inner: MemoryStore,
    failures: Mutex<VecDeque<StoreError>>,
    set_calls: AtomicUsize,
}

impl ScriptedFailureStore {
    fn failing_with(failures: Vec<StoreError>) -> Self {
        Self {
            failures: Mutex::new(failures.into()),
            ..Self::default()
        }
    }

    fn quota_error() -> StoreError {
        StoreError::QuotaExceeded { needed_bytes: 64 }
    }
}

#[async_trait]
impl KeyValueStore for ScriptedFailureStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.failures.lock().pop_front() {
            return Err(failure);
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.remove(key).await
    }

    async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        self.inner.list_keys().await
    }
}

#[tokio::test]
async fn quota_failure_recovers_after_one_cleanup() {
    let store = Arc::new(ScriptedFailureStore::failing_with(vec![
        ScriptedFailureStore::quota_error(),
    ]));
    // A snapshot from an earlier session is occupying space
    store.inner.set("lens:stale-session:d", "{}").await.unwrap();

    let guard = StorageGuard::new(store.clone(), SessionId::new());
    let outcome = guard.try_save(&"d".into(), &"payload").await;

    assert_eq!(outcome.method, SaveMethod::Persisted);
    assert!(outcome.note.unwrap().contains("1 stale entries"));
    assert_eq!(store.set_calls.load(Ordering::SeqCst), 2);

    // The stale entry was reclaimed, the new snapshot landed
    let keys = store.list_keys().await.unwrap();
    assert_eq!(keys.len(), 1);
    assert!(!keys.contains(&"lens:stale-session:d".to_string()));
}

#[tokio::test]
async fn second_quota_failure_degrades_to_memory_only() {
    let store = Arc::new(ScriptedFailureStore::failing_with(vec![
        ScriptedFailureStore::quota_error(),
        ScriptedFailureStore::quota_error(),
    ]));

    let guard = StorageGuard::new(store.clone(), SessionId::new());
    let outcome = guard.try_save(&"d".into(), &"payload").await;

    assert_eq!(outcome.method, SaveMethod::MemoryOnly);
    assert!(outcome.note.unwrap().contains("cleanup did not help"));
    // Exactly one retry, never more
    assert_eq!(store.set_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn non_quota_failure_is_not_retried() {
    let store = Arc::new(ScriptedFailureStore::failing_with(vec![
        StoreError::Backend("store is sealed".to_string()),
    ]));

    let guard = StorageGuard::new(store.clone(), SessionId::new());
    let outcome = guard.try_save(&"d".into(), &"payload").await;

    assert_eq!(outcome.method, SaveMethod::MemoryOnly);
    assert!(outcome.note.unwrap().contains("store is sealed"));
    assert_eq!(store.set_calls.load(Ordering::SeqCst), 1);
}
