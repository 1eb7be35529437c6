//! Tests for the Harness module

use super::*;
use crate::arena::{ItemHandle, RawToken};
use crate::config::{HarnessConfig, PollPolicy};
use crate::error::HarnessError;
use crate::shutdown::StopReason;
use crate::traits::{BaitError, RaceBait};

use std::collections::HashSet;
use std::io;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

// ============================================================================
// Mock RaceBait
// ============================================================================

/// Tracks every token it hands out so leaks and use-after-release show up
#[derive(Default)]
struct TrackingBait {
    next_token: AtomicI32,
    triggered: AtomicU64,
    live: Mutex<HashSet<RawToken>>,
    slow_first_item: Option<Duration>,
    fail_prepare: bool,
}

impl TrackingBait {
    fn new() -> Self {
        Self::default()
    }

    fn with_slow_first_item(mut self, delay: Duration) -> Self {
        self.slow_first_item = Some(delay);
        self
    }

    fn with_failing_prepare(mut self) -> Self {
        self.fail_prepare = true;
        self
    }

    fn live_tokens(&self) -> usize {
        self.live.lock().unwrap().len()
    }
}

impl RaceBait for TrackingBait {
    fn name(&self) -> &str {
        "tracking"
    }

    fn prepare(&self, _capacity: usize) -> Result<(), BaitError> {
        if self.fail_prepare {
            return Err(BaitError::Prepare(io::Error::other("no such directory")));
        }
        Ok(())
    }

    fn create(&self, _item: ItemHandle) -> Result<RawToken, BaitError> {
        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
        assert!(self.live.lock().unwrap().insert(token));
        Ok(token)
    }

    fn trigger(&self, _item: ItemHandle, token: RawToken) -> Result<(), BaitError> {
        assert!(self.live.lock().unwrap().contains(&token), "trigger after release");
        self.triggered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn mutate(&self, item: ItemHandle, token: RawToken) -> Result<(), BaitError> {
        assert!(self.live.lock().unwrap().contains(&token), "mutate after release");
        if let Some(delay) = self.slow_first_item {
            if item.index() == 0 {
                thread::sleep(delay);
            }
        }
        Ok(())
    }

    fn release(&self, _item: ItemHandle, token: Option<RawToken>) -> Result<(), BaitError> {
        if let Some(token) = token {
            assert!(self.live.lock().unwrap().remove(&token), "double release");
        }
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn config(dir: &tempfile::TempDir) -> HarnessConfig {
    HarnessConfig::new(dir.path())
        .with_items(40)
        .with_accumulators(2)
        .with_mutators(4)
        .with_state_path(dir.path().join("state"))
        .with_worker_poll(PollPolicy::Yield)
        .with_orchestrator_poll(PollPolicy::Yield)
        .with_stall_timeout(Some(Duration::from_secs(10)))
        .with_snapshot_interval(Duration::from_millis(10))
        .with_report_every(1)
        .with_pin_threads(false)
}

// ============================================================================
// Builder Tests
// ============================================================================

#[test]
fn test_builder_missing_bait() {
    let result = HarnessBuilder::new().build();
    match result {
        Err(HarnessError::MissingConfig(field)) => assert_eq!(field, "bait"),
        other => panic!("expected missing bait, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_builder_clamps_config() {
    let (harness, _rx) = HarnessBuilder::new()
        .items(5)
        .mutators(500)
        .bait(Arc::new(TrackingBait::new()))
        .build()
        .unwrap();

    let config = harness.context().config();
    assert_eq!(config.items, 10);
    assert_eq!(config.mutators, 64);
}

// ============================================================================
// Integration Tests
// ============================================================================

#[test]
fn test_harness_run_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let bait = Arc::new(TrackingBait::new());
    let (harness, samples) = HarnessBuilder::new()
        .config(config(&dir))
        .bait(Arc::clone(&bait) as Arc<dyn RaceBait>)
        .build()
        .unwrap();
    let ctx = Arc::clone(harness.context());

    let drain = thread::spawn(move || samples.iter().count());
    let summary = harness
        .run_with_timeout(Duration::from_millis(300))
        .expect("run failed");
    let sample_count = drain.join().unwrap();

    assert_eq!(summary.stop_reason, Some(StopReason::Completed));
    assert_eq!(summary.thread_failures, 0);
    assert!(summary.totals.bursts > 0);
    assert!(sample_count > 0);

    // Exact flushing: the global counter is the sum of per-worker mutations.
    assert_eq!(summary.totals.operations, summary.workers.total_mutated);
    assert_eq!(summary.workers.total_workers, 6);

    // Every created item was released by cleanup or by the final sweep.
    assert_eq!(
        summary.workers.total_created,
        summary.workers.total_released + summary.swept
    );
    assert_eq!(bait.live_tokens(), 0);
    assert_eq!(ctx.arena().live_count(), 0);
    assert!(bait.triggered.load(Ordering::SeqCst) >= summary.totals.bursts);

    assert_eq!(summary.record, RecordDisposition::Removed);
    assert!(!dir.path().join("state").exists());
}

#[test]
fn test_harness_shutdown_before_run() {
    let dir = tempfile::tempdir().unwrap();
    let bait = Arc::new(TrackingBait::new());
    let (harness, _samples) = HarnessBuilder::new()
        .config(config(&dir))
        .bait(Arc::clone(&bait) as Arc<dyn RaceBait>)
        .build()
        .unwrap();

    harness.shutdown();
    let summary = harness.run().unwrap();

    assert_eq!(summary.stop_reason, Some(StopReason::UserRequest));
    assert_eq!(summary.totals.operations, summary.workers.total_mutated);
    assert_eq!(bait.live_tokens(), 0);
    assert_eq!(summary.record, RecordDisposition::Removed);
}

#[test]
fn test_harness_stall_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let bait = Arc::new(TrackingBait::new().with_slow_first_item(Duration::from_millis(500)));
    let config = config(&dir).with_stall_timeout(Some(Duration::from_millis(50)));
    let (harness, _samples) = HarnessBuilder::new()
        .config(config)
        .bait(Arc::clone(&bait) as Arc<dyn RaceBait>)
        .build()
        .unwrap();

    let summary = harness.run().unwrap();

    assert!(summary.stalled());
    assert!(summary.thread_failures > 0);
    assert_eq!(bait.live_tokens(), 0);
    assert_eq!(summary.record, RecordDisposition::Removed);
    assert!(!dir.path().join("state").exists());
}

#[test]
fn test_harness_prepare_failure() {
    let dir = tempfile::tempdir().unwrap();
    let (harness, _samples) = HarnessBuilder::new()
        .config(config(&dir))
        .bait(Arc::new(TrackingBait::new().with_failing_prepare()))
        .build()
        .unwrap();

    let err = harness.run().unwrap_err();
    assert!(matches!(err, HarnessError::Bait(BaitError::Prepare(_))));
    assert!(!dir.path().join("state").exists());
}

#[test]
fn test_harness_debug_format() {
    let (harness, _rx) = HarnessBuilder::new()
        .state_path("/tmp/somewhere")
        .bait(Arc::new(TrackingBait::new()))
        .build()
        .unwrap();

    let text = format!("{:?}", harness);
    assert!(text.contains("tracking"));
    assert!(text.contains("/tmp/somewhere"));
}
