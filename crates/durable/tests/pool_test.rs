// Integration tests for the bounded task pool and the retry governor
//
// Timing-sensitive tests run on a paused clock so sleeps advance
// deterministically.

use parking_lot::Mutex;
use scrivener_durable::{retry, RetryError, RetryPolicy, TaskPool, TaskStatus};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

#[derive(Debug, thiserror::Error)]
#[error("backend unavailable (attempt {0})")]
struct Flaky(u32);

/// Layer recording the fields of every ERROR event
#[derive(Clone, Default)]
struct ErrorEvents(Arc<Mutex<Vec<String>>>);

impl<S: Subscriber> Layer<S> for ErrorEvents {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() != Level::ERROR {
            return;
        }
        let mut fields = FieldText::default();
        event.record(&mut fields);
        self.0.lock().push(fields.0);
    }
}

#[derive(Default)]
struct FieldText(String);

impl Visit for FieldText {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.0.push_str(&format!("{}={:?} ", field.name(), value));
    }
}

// =============================================================================
// Pool
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_concurrency_ceiling_never_exceeded() {
    let pool = TaskPool::new(3).unwrap();
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    for i in 0..20u64 {
        let in_flight = Arc::clone(&in_flight);
        let peak = Arc::clone(&peak);
        pool.submit(format!("chapter-{i}"), async move {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10 + (i * 7) % 30)).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        });
        assert!(pool.running() <= 3);
    }

    assert_eq!(pool.running(), 3);
    assert_eq!(pool.queued(), 17);

    pool.join().await;

    assert_eq!(peak.load(Ordering::SeqCst), 3);
    let report = pool.report();
    assert_eq!(report.submitted, 20);
    assert_eq!(report.succeeded, 20);
    assert_eq!(report.running, 0);
    assert_eq!(report.queued, 0);
}

#[tokio::test(start_paused = true)]
async fn test_fifo_promotion_order() {
    let pool = TaskPool::new(2).unwrap();
    let finished = Arc::new(Mutex::new(Vec::new()));

    let durations = [(1, 100), (2, 120), (3, 30), (4, 40), (5, 20)];
    for (n, ms) in durations {
        let finished = Arc::clone(&finished);
        pool.submit(format!("T{n}"), async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            finished.lock().push(n);
            Ok(())
        });
    }

    pool.join().await;

    assert_eq!(*finished.lock(), vec![1, 2, 3, 5, 4]);
}

#[tokio::test(start_paused = true)]
async fn test_join_waits_for_work_submitted_after_join() {
    let pool = TaskPool::new(2).unwrap();
    let late_done = Arc::new(AtomicBool::new(false));
    let start = Instant::now();

    pool.submit("early", async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(())
    });

    let drain = pool.join();

    tokio::time::sleep(Duration::from_millis(10)).await;
    let flag = Arc::clone(&late_done);
    pool.submit("late", async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        flag.store(true, Ordering::SeqCst);
        Ok(())
    });

    drain.await;

    assert!(late_done.load(Ordering::SeqCst));
    assert!(start.elapsed() >= Duration::from_millis(110));
    assert!(pool.is_idle());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_joins_resolve_together() {
    let pool = TaskPool::new(1).unwrap();
    for i in 0..3 {
        pool.submit(format!("job-{i}"), async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            Ok(())
        });
    }

    let a = pool.join();
    let b = pool.join();
    assert!(a.shares_signal_with(&b));

    let start = Instant::now();
    let (ta, tb) = tokio::join!(
        async {
            a.await;
            start.elapsed()
        },
        async {
            b.await;
            start.elapsed()
        }
    );

    assert_eq!(ta, tb);
    assert_eq!(ta, Duration::from_millis(90));
}

#[tokio::test]
async fn test_failure_is_isolated() {
    // Current-thread runtime: every pool task logs on this thread
    let errors = ErrorEvents::default();
    let _guard =
        tracing::subscriber::set_default(tracing_subscriber::registry().with(errors.clone()));

    let pool = TaskPool::new(2).unwrap();
    let ran = Arc::new(AtomicUsize::new(0));

    for (label, fail) in [("ok-1", false), ("broken", true), ("ok-2", false)] {
        let ran = Arc::clone(&ran);
        pool.submit(label, async move {
            ran.fetch_add(1, Ordering::SeqCst);
            if fail {
                anyhow::bail!("translation backend returned garbage");
            }
            Ok(())
        });
    }

    pool.join().await;

    assert_eq!(ran.load(Ordering::SeqCst), 3);
    let report = pool.report();
    assert_eq!(report.executed(), 3);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);

    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].label, "broken");
    assert_eq!(
        failures[0].status,
        TaskStatus::Failed("translation backend returned garbage".into())
    );

    let logged = errors.0.lock().clone();
    assert_eq!(logged.len(), 1, "{logged:?}");
    assert!(logged[0].contains("task=broken"), "{logged:?}");
    assert!(logged[0].contains("translation backend returned garbage"));
}

// =============================================================================
// Retry governor
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_retry_succeeds_on_third_attempt_with_growing_delays() {
    let policy = RetryPolicy::linear(Duration::from_millis(200)).with_max_attempts(3);
    let attempts_at = Arc::new(Mutex::new(Vec::new()));

    let recorded = Arc::clone(&attempts_at);
    let result = retry(&policy, "chapter-7", move |attempt| {
        let recorded = Arc::clone(&recorded);
        async move {
            recorded.lock().push(Instant::now());
            if attempt < 3 {
                Err(Flaky(attempt))
            } else {
                Ok("translated")
            }
        }
    })
    .await;

    assert_eq!(result.unwrap(), "translated");

    let times = attempts_at.lock().clone();
    assert_eq!(times.len(), 3);
    let first_gap = times[1] - times[0];
    let second_gap = times[2] - times[1];
    assert_eq!(first_gap, Duration::from_millis(200));
    assert_eq!(second_gap, Duration::from_millis(400));
    assert!(second_gap > first_gap);
}

#[tokio::test(start_paused = true)]
async fn test_retry_exhaustion_stops_at_max_attempts() {
    let policy = RetryPolicy::linear(Duration::from_millis(10)).with_max_attempts(3);
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&calls);
    let result: Result<(), _> = retry(&policy, "chapter-9", move |attempt| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move { Err(Flaky(attempt)) }
    })
    .await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    match result {
        Err(RetryError::ExhaustedRetries { attempts, source }) => {
            assert_eq!(attempts, 3);
            assert_eq!(source.0, 3);
        }
        other => panic!("expected ExhaustedRetries, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_retry_if_stops_on_permanent_error() {
    let policy = RetryPolicy::linear(Duration::from_millis(10)).with_max_attempts(5);
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&calls);
    let result: Result<(), _> = scrivener_durable::retry_if(
        &policy,
        "chapter-3",
        move |attempt| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { Err(Flaky(attempt)) }
        },
        |e: &Flaky| e.0 < 2,
    )
    .await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let err = result.unwrap_err();
    assert!(matches!(err, RetryError::Permanent { attempt: 2, .. }));
    assert_eq!(err.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_pool_task_wrapping_retry() {
    let pool = TaskPool::new(2).unwrap();
    let policy = RetryPolicy::linear(Duration::from_millis(5)).with_max_attempts(2);

    for chapter in 1..=4u32 {
        let policy = policy.clone();
        pool.submit(format!("chapter-{chapter}"), async move {
            retry(&policy, "translate", |attempt| async move {
                if chapter % 2 == 0 {
                    Err(Flaky(attempt))
                } else {
                    Ok(())
                }
            })
            .await?;
            Ok(())
        });
    }

    pool.join().await;

    let report = pool.report();
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 2);
    for failure in report.failures() {
        assert!(failure.status.error().unwrap().contains("exhausted 2 attempts"));
    }
}
