use std::sync::Arc;

use containers::Header;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;

use crate::sync::tests::mock::{numbers, test_config, MockChain};
use crate::sync::{CatchUpSync, SharedSyncStatus, SyncConfig, SyncState, SyncStatus};

fn catching_up(
    chain: &Arc<MockChain>,
    init_height: u64,
    config: &SyncConfig,
) -> (CatchUpSync<MockChain>, mpsc::Receiver<Header>, SharedSyncStatus) {
    let mut status = SyncStatus::new(chain.best().number, init_height);
    status.transition(SyncState::CatchingUp);
    let status = Arc::new(Mutex::new(status));

    let (output, receiver) = mpsc::channel(config.output_queue_capacity);
    let catch_up = CatchUpSync::new(
        chain.clone(),
        status.clone(),
        output,
        init_height,
        config,
        None,
    );
    (catch_up, receiver, status)
}

async fn collect(mut receiver: mpsc::Receiver<Header>) -> Vec<Header> {
    let mut headers = Vec::new();
    while let Some(header) = receiver.recv().await {
        headers.push(header);
    }
    headers
}

#[tokio::test]
async fn test_fetches_up_to_finality_boundary() {
    let chain = Arc::new(MockChain::new(50));
    let (catch_up, receiver, status) = catching_up(&chain, 5, &test_config(10));

    catch_up.run().await.unwrap();

    assert_eq!(collect(receiver).await, chain.canonical_range(5, 40));
    let status = status.lock();
    assert_eq!(status.state, SyncState::Following);
    assert!(status.latest.fetch_finalized_done);
    assert_eq!(status.latest.live_start_height, 41);
}

#[tokio::test]
async fn test_start_above_boundary_hands_over_immediately() {
    let chain = Arc::new(MockChain::new(50));
    let (catch_up, receiver, status) = catching_up(&chain, 45, &test_config(10));

    catch_up.run().await.unwrap();

    assert!(collect(receiver).await.is_empty());
    assert_eq!(chain.number_requests(), 0);
    let status = status.lock();
    assert!(status.latest.fetch_finalized_done);
    assert_eq!(status.latest.live_start_height, 45);
}

#[tokio::test]
async fn test_failed_height_is_retried_in_order() {
    let chain = Arc::new(MockChain::new(20));
    chain.fail_by_number(7, 3);
    let (catch_up, receiver, _) = catching_up(&chain, 0, &test_config(5));

    catch_up.run().await.unwrap();

    assert_eq!(numbers(&collect(receiver).await), (0..=15).collect::<Vec<_>>());
    assert_eq!(chain.number_requests(), 16 + 3);
}

#[tokio::test]
async fn test_follows_rising_head() {
    let chain = Arc::new(MockChain::new(20));
    let config = SyncConfig {
        output_queue_capacity: 1,
        ..test_config(5)
    };
    let (catch_up, receiver, status) = catching_up(&chain, 0, &config);

    let task = tokio::spawn(catch_up.run());
    // Catch-up blocks on the full queue long before the old boundary.
    chain.extend(10);
    status.lock().latest.height = 30;

    assert_eq!(collect(receiver).await, chain.canonical_range(0, 25));
    task.await.unwrap().unwrap();
    assert_eq!(status.lock().latest.live_start_height, 26);
}

#[tokio::test]
async fn test_closed_output_queue_is_fatal() {
    let chain = Arc::new(MockChain::new(20));
    let (catch_up, receiver, status) = catching_up(&chain, 0, &test_config(5));
    drop(receiver);

    assert!(catch_up.run().await.is_err());
    assert!(!status.lock().latest.fetch_finalized_done);
}
