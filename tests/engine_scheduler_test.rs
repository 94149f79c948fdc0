use catapult::engine::scheduler::PeriodicScheduler;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// * Polls instead of sleeping a fixed time; panic output can slow the first tick down
async fn wait_for_calls(calls: &AtomicUsize, wanted: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while calls.load(Ordering::SeqCst) < wanted && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_double_start_keeps_one_worker() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);

    let scheduler = PeriodicScheduler::new(Duration::from_secs(60));
    scheduler.configure(Duration::from_secs(60), move || {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    scheduler.start();
    scheduler.start();
    wait_for_calls(&calls, 1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    // * One worker ticks once immediately, then sleeps for the interval
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(scheduler.status().running);

    scheduler.stop().await;
}

#[tokio::test]
async fn test_double_stop_is_safe() {
    let scheduler = PeriodicScheduler::new(Duration::from_millis(20));
    scheduler.start();

    scheduler.stop().await;
    scheduler.stop().await;

    let status = scheduler.status();
    assert!(!status.running);
    assert!(!status.worker_alive);
}

#[tokio::test]
async fn test_ticks_repeat_without_overlap() {
    let calls = Arc::new(AtomicUsize::new(0));
    let in_flight = Arc::new(AtomicBool::new(false));
    let overlapped = Arc::new(AtomicBool::new(false));

    let (c, f, o) = (Arc::clone(&calls), Arc::clone(&in_flight), Arc::clone(&overlapped));
    let scheduler = PeriodicScheduler::new(Duration::from_secs(60));
    scheduler.configure(Duration::from_millis(50), move || {
        if f.swap(true, Ordering::SeqCst) {
            o.store(true, Ordering::SeqCst);
        }
        std::thread::sleep(Duration::from_millis(10));
        c.fetch_add(1, Ordering::SeqCst);
        f.store(false, Ordering::SeqCst);
        Ok(())
    });

    scheduler.start();
    wait_for_calls(&calls, 2).await;
    scheduler.stop().await;

    assert!(calls.load(Ordering::SeqCst) >= 2);
    assert!(!overlapped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_failing_callback_keeps_running() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);

    let scheduler = PeriodicScheduler::new(Duration::from_secs(60));
    scheduler.configure(Duration::from_millis(20), move || {
        seen.fetch_add(1, Ordering::SeqCst);
        Err("integration unreachable".into())
    });

    scheduler.start();
    wait_for_calls(&calls, 2).await;

    assert!(calls.load(Ordering::SeqCst) >= 2);
    assert!(scheduler.status().running);
    assert!(scheduler.status().worker_alive);

    scheduler.stop().await;
}

#[tokio::test]
async fn test_panicking_callback_keeps_running() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);

    let scheduler = PeriodicScheduler::new(Duration::from_secs(60));
    scheduler.configure(Duration::from_millis(20), move || {
        seen.fetch_add(1, Ordering::SeqCst);
        panic!("state check blew up");
    });

    scheduler.start();
    wait_for_calls(&calls, 2).await;

    assert!(calls.load(Ordering::SeqCst) >= 2);
    assert!(scheduler.status().worker_alive);

    scheduler.stop().await;
}

#[tokio::test]
async fn test_restart_after_stop() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);

    let scheduler = PeriodicScheduler::new(Duration::from_secs(60));
    scheduler.configure(Duration::from_millis(20), move || {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    scheduler.start();
    wait_for_calls(&calls, 1).await;
    scheduler.stop().await;
    let after_first = calls.load(Ordering::SeqCst);

    scheduler.start();
    wait_for_calls(&calls, after_first + 1).await;
    scheduler.stop().await;

    assert!(calls.load(Ordering::SeqCst) > after_first);
}
