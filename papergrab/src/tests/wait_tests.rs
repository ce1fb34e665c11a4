use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::wait::{await_condition, AbortHandle, WaitConfig, WaitOutcome};

fn cfg(interval_ms: u64, max_attempts: u32) -> WaitConfig {
    WaitConfig {
        poll_interval: Duration::from_millis(interval_ms),
        max_attempts,
    }
}

fn counting_probe(
    probes: &Arc<AtomicU32>,
    succeed_on: u32,
) -> impl FnMut() -> std::pin::Pin<Box<dyn std::future::Future<Output = Option<u32>> + Send>> {
    let probes = probes.clone();
    move || {
        let probes = probes.clone();
        Box::pin(async move {
            let n = probes.fetch_add(1, Ordering::SeqCst) + 1;
            (n == succeed_on).then_some(n)
        })
    }
}

#[tokio::test(start_paused = true)]
async fn resolves_on_nth_poll() {
    let probes = Arc::new(AtomicU32::new(0));
    let start = tokio::time::Instant::now();

    let outcome = await_condition(&cfg(100, 5), &AbortHandle::new(), counting_probe(&probes, 3)).await;

    match outcome {
        WaitOutcome::Found { value, attempts } => {
            assert_eq!(attempts, 3);
            assert_eq!(value, 3);
        }
        other => panic!("expected Found, got {other:?}"),
    }
    assert_eq!(start.elapsed(), Duration::from_millis(300));

    // No polling may survive resolution: advancing time afterwards must not
    // run the probe again.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(probes.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_max_attempts() {
    let probes = Arc::new(AtomicU32::new(0));
    let start = tokio::time::Instant::now();

    let outcome = await_condition(&cfg(100, 5), &AbortHandle::new(), counting_probe(&probes, u32::MAX)).await;

    match outcome {
        WaitOutcome::TimedOut { attempts } => assert_eq!(attempts, 5),
        other => panic!("expected TimedOut, got {other:?}"),
    }
    assert_eq!(probes.load(Ordering::SeqCst), 5);
    assert_eq!(start.elapsed(), Duration::from_millis(500));

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(probes.load(Ordering::SeqCst), 5);
}

#[tokio::test(start_paused = true)]
async fn abort_ends_the_wait_early() {
    let probes = Arc::new(AtomicU32::new(0));
    let abort = AbortHandle::new();

    let stopper = abort.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(250)).await;
        stopper.abort();
    });

    let outcome = await_condition(&cfg(100, 30), &abort, counting_probe(&probes, u32::MAX)).await;

    match outcome {
        WaitOutcome::Aborted { attempts } => assert_eq!(attempts, 2),
        other => panic!("expected Aborted, got {other:?}"),
    }
    assert_eq!(probes.load(Ordering::SeqCst), 2);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(probes.load(Ordering::SeqCst), 2);
}

#[test]
fn default_policy_matches_the_portal() {
    let cfg = WaitConfig::default();
    assert_eq!(cfg.poll_interval, Duration::from_millis(1000));
    assert_eq!(cfg.max_attempts, 30);
    assert_eq!(cfg.ceiling(), Duration::from_secs(30));
}
