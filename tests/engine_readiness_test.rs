use catapult::engine::readiness::{
    ProbeFuture, ReadinessAggregator, ReadinessProbe, ServiceStatus,
};
use catapult::network::ClientError;
use std::sync::Arc;
use std::time::{Duration, Instant};

// * Sleeps, then answers with a fixed outcome
struct SlowProbe {
    delay: Duration,
    ok: bool,
}

impl ReadinessProbe for SlowProbe {
    fn probe(&self) -> ProbeFuture<'_> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            if self.ok {
                Ok(())
            } else {
                Err(ClientError::Status(500))
            }
        })
    }
}

fn slow(ms: u64, ok: bool) -> Option<Arc<dyn ReadinessProbe>> {
    Some(Arc::new(SlowProbe {
        delay: Duration::from_millis(ms),
        ok,
    }))
}

#[tokio::test]
async fn test_mixed_outcomes() {
    let report = ReadinessAggregator::new()
        .with_target("tracker", true, slow(0, true))
        .with_target("deployment", false, slow(0, false))
        .with_target("incident", true, slow(0, false))
        .check()
        .await;

    assert!(!report.is_ready());
    assert_eq!(report.services.len(), 2);
    assert_eq!(report.services["tracker"], ServiceStatus::Ready);
    assert_eq!(report.services["incident"], ServiceStatus::NotReady);
    assert!(!report.services.contains_key("deployment"));
}

#[tokio::test]
async fn test_probes_run_concurrently() {
    let aggregator = ReadinessAggregator::new()
        .with_target("tracker", true, slow(200, true))
        .with_target("deployment", true, slow(200, true))
        .with_target("incident", true, slow(200, true));

    let started = Instant::now();
    let report = aggregator.check().await;

    assert!(report.is_ready());
    assert!(started.elapsed() < Duration::from_millis(550));
}

#[tokio::test]
async fn test_report_serialization() {
    let report = ReadinessAggregator::new()
        .with_target("tracker", true, None)
        .check()
        .await;

    let body = serde_json::to_value(&report).unwrap();
    assert_eq!(body["status"], "not ready");
    assert_eq!(body["services"]["tracker"], "not configured");
    assert!(body["timestamp"].is_string());
}
