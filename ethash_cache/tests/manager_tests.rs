mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{wait_until, CountingLoader};
use containers::Epoch;
use ethash_cache::{CacheError, EpochProofCacheManager};
use rstest::rstest;

async fn manager_with_next(
    init_number: u64,
    loader: &Arc<CountingLoader>,
) -> EpochProofCacheManager<Arc<CountingLoader>> {
    let manager = EpochProofCacheManager::new(init_number, loader.clone())
        .await
        .unwrap();
    let expected = Epoch::of(init_number).next();
    wait_until(|| async { manager.next_epoch() == Some(expected) }).await;
    manager
}

#[tokio::test]
async fn test_construction_loads_current_and_prepares_next() {
    let loader = Arc::new(CountingLoader::new());
    let manager = manager_with_next(0, &loader).await;

    assert_eq!(manager.current_epoch(), Epoch(0));
    assert_eq!(manager.next_epoch(), Some(Epoch(1)));
    assert_eq!(loader.calls(0), 1);
    assert_eq!(loader.calls(1), 1);
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(15_000)]
#[case(29_999)]
#[tokio::test]
async fn test_same_epoch_never_loads(#[case] number: u64) {
    let loader = Arc::new(CountingLoader::new());
    let manager = manager_with_next(0, &loader).await;
    let before = loader.total_calls();

    let cache = manager.get_cache(number).await.unwrap();

    assert_eq!(cache.epoch, Epoch(0));
    assert_eq!(loader.total_calls(), before);
}

#[tokio::test]
async fn test_epoch_advance_scenario() {
    let loader = Arc::new(CountingLoader::new());
    let manager = manager_with_next(0, &loader).await;
    assert_eq!(loader.total_calls(), 2);

    // Still epoch 0: nothing new.
    assert_eq!(manager.get_cache(29_999).await.unwrap().epoch, Epoch(0));
    assert_eq!(loader.total_calls(), 2);

    // Epoch 1 is promoted, epoch 2 is prepared in the background.
    assert_eq!(manager.get_cache(30_000).await.unwrap().epoch, Epoch(1));
    wait_until(|| async { manager.next_epoch() == Some(Epoch(2)) }).await;
    assert_eq!(loader.calls(1), 1);
    assert_eq!(loader.calls(2), 1);
    assert_eq!(loader.total_calls(), 3);

    // One epoch back: epoch 0 is reloaded and epoch 1 becomes next.
    assert_eq!(manager.get_cache(29_999).await.unwrap().epoch, Epoch(0));
    assert_eq!(manager.next_epoch(), Some(Epoch(1)));
    assert_eq!(loader.calls(0), 2);
    assert_eq!(loader.total_calls(), 4);

    // Jump to epoch 2: loaded synchronously, epoch 3 prepared.
    assert_eq!(manager.get_cache(60_000).await.unwrap().epoch, Epoch(2));
    wait_until(|| async { manager.next_epoch() == Some(Epoch(3)) }).await;
    assert_eq!(loader.calls(2), 2);
    assert_eq!(loader.calls(3), 1);
    assert_eq!(loader.total_calls(), 6);
}

#[tokio::test]
async fn test_backward_step_demotes_current() {
    let loader = Arc::new(CountingLoader::new());
    let manager = manager_with_next(90_000, &loader).await;
    assert_eq!(manager.current_epoch(), Epoch(3));

    let cache = manager.get_cache(89_999).await.unwrap();

    assert_eq!(cache.epoch, Epoch(2));
    assert_eq!(manager.current_epoch(), Epoch(2));
    assert_eq!(manager.next_epoch(), Some(Epoch(3)));
    assert_eq!(loader.calls(3), 1);

    // Stepping forward again reuses the demoted cache.
    let cache = manager.get_cache(90_000).await.unwrap();
    assert_eq!(cache.epoch, Epoch(3));
    assert_eq!(loader.calls(3), 1);
}

#[tokio::test]
async fn test_startup_failure_is_fatal() {
    let result = EpochProofCacheManager::new(0, CountingLoader::failing(&[0])).await;
    assert!(matches!(result, Err(CacheError::Load { .. })));
}

#[tokio::test]
async fn test_background_failure_falls_back_to_sync_load() {
    let loader = Arc::new(CountingLoader::failing_once(&[1]));
    let manager = EpochProofCacheManager::new(0, loader.clone()).await.unwrap();

    wait_until(|| async { loader.calls(1) == 1 }).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(manager.next_epoch(), None);

    let cache = manager.get_cache(30_000).await.unwrap();
    assert_eq!(cache.epoch, Epoch(1));
    assert_eq!(loader.calls(1), 2);
}

#[tokio::test]
async fn test_sync_load_failure_is_returned() {
    let loader = Arc::new(CountingLoader::failing(&[5]));
    let manager = manager_with_next(0, &loader).await;

    let result = manager.get_cache(150_000).await;

    assert!(matches!(result, Err(CacheError::Load { epoch: Epoch(5), .. })));
    assert_eq!(manager.current_epoch(), Epoch(0));
}

#[tokio::test]
async fn test_wrong_epoch_from_loader_is_rejected() {
    let result = EpochProofCacheManager::new(0, CountingLoader::mislabelling()).await;
    assert!(matches!(
        result,
        Err(CacheError::EpochMismatch {
            expected: Epoch(0),
            got: Epoch(1)
        })
    ));
}

#[tokio::test]
async fn test_concurrent_jump_loads_once() {
    let loader = Arc::new(CountingLoader::new());
    let manager = Arc::new(manager_with_next(0, &loader).await);

    let first = tokio::spawn({
        let manager = manager.clone();
        async move { manager.get_cache(300_000).await }
    });
    let second = tokio::spawn({
        let manager = manager.clone();
        async move { manager.get_cache(300_001).await }
    });

    assert_eq!(first.await.unwrap().unwrap().epoch, Epoch(10));
    assert_eq!(second.await.unwrap().unwrap().epoch, Epoch(10));
    assert_eq!(loader.calls(10), 1);
}
