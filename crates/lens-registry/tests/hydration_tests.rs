use lens_model::{AnalysisState, DatasetId, ModelResult, SessionId};
use lens_registry::ResultRegistry;
use lens_store::{FileStore, StorageGuard};
use std::sync::Arc;

fn run(dataset: &str, models: Vec<(&str, f64)>) -> AnalysisState {
    AnalysisState::new(DatasetId::new(dataset)).with_models(
        models
            .into_iter()
            .map(|(name, score)| ModelResult::new(name, score))
            .collect(),
    )
}

#[tokio::test]
async fn registry_hydrates_through_a_real_backend() {
    let dir = tempfile::tempdir().unwrap();
    let session = SessionId::new();

    {
        let store = Arc::new(FileStore::open(dir.path()).await.unwrap());
        let registry = ResultRegistry::new(Arc::new(StorageGuard::new(store, session)));
        registry
            .absorb(run("housing", vec![("forest", 0.91), ("linear", 0.72)]))
            .await;
    }

    // Full page reload: new store handle, new registry, same session
    let store = Arc::new(FileStore::open(dir.path()).await.unwrap());
    let registry = ResultRegistry::new(Arc::new(StorageGuard::new(store, session)));

    let hydrated = registry.get(&"housing".into()).await.unwrap();
    assert_eq!(hydrated.model_names(), vec!["forest", "linear"]);

    // And the next run still accumulates on top of the hydrated state
    let merged = registry.absorb(run("housing", vec![("xgboost", 0.95)])).await;
    assert_eq!(merged.model_names(), vec!["xgboost", "forest", "linear"]);
}

#[tokio::test]
async fn cleanup_reclaims_previous_session_snapshots() {
    let dir = tempfile::tempdir().unwrap();

    {
        let store = Arc::new(FileStore::open(dir.path()).await.unwrap());
        let old = ResultRegistry::new(Arc::new(StorageGuard::new(store, SessionId::new())));
        old.absorb(run("housing", vec![("forest", 0.91)])).await;
    }

    // A later session starts and sweeps speculatively
    let store = Arc::new(FileStore::open(dir.path()).await.unwrap());
    let guard = Arc::new(StorageGuard::new(store, SessionId::new()));
    assert_eq!(guard.cleanup().await, 1);
    assert_eq!(guard.cleanup().await, 0);

    let registry = ResultRegistry::new(guard);
    assert!(registry.get(&"housing".into()).await.is_none());
}
