//! Integration tests for core-async on native platforms.

use core_async::{deferred, sync, task, time};

#[tokio::test]
async fn test_task_spawn() {
    let handle = task::spawn(async { 42 });
    let result = handle.await.unwrap();
    assert_eq!(result, 42);
}

#[tokio::test]
async fn test_timeout_failure() {
    let result = time::timeout(time::Duration::from_millis(10), async {
        time::sleep(time::Duration::from_millis(100)).await;
        42
    })
    .await;

    assert!(result.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_delayed_interval_skips_immediate_tick() {
    let start = tokio::time::Instant::now();
    let mut ticker = time::delayed_interval(time::Duration::from_millis(250));
    ticker.tick().await;
    assert!(start.elapsed() >= time::Duration::from_millis(250));
}

#[tokio::test(start_paused = true)]
async fn test_delayed_interval_tolerates_zero_period() {
    let mut ticker = time::delayed_interval(time::Duration::ZERO);
    ticker.tick().await;
    ticker.tick().await;
}

#[tokio::test]
async fn test_mpsc_preserves_submission_order() {
    let (tx, mut rx) = sync::mpsc::unbounded_channel();

    for i in 0..5 {
        tx.send(i).unwrap();
    }
    drop(tx);

    let mut received = Vec::new();
    while let Some(value) = rx.recv().await {
        received.push(value);
    }
    assert_eq!(received, vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn test_deferred_across_tasks() {
    let (resolver, pending) = deferred::channel::<Result<u32, String>>();

    task::spawn(async move {
        time::sleep(time::Duration::from_millis(5)).await;
        resolver.settle(Ok(9));
    });

    assert_eq!(pending.await.unwrap(), Ok(9));
}
