//! Integration tests for the Worker module

use super::*;
use crate::arena::{ItemHandle, ItemState, RawToken};
use crate::barrier::Phase;
use crate::config::{HarnessConfig, PollPolicy};
use crate::context::RunContext;
use crate::error::HarnessError;
use crate::partition::Partition;
use crate::shutdown::StopReason;
use crate::traits::{BaitError, RaceBait};

use std::collections::HashSet;
use std::io;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

// ============================================================================
// Mock RaceBait
// ============================================================================

#[derive(Default)]
struct MockBait {
    next_token: AtomicI32,
    created: AtomicU64,
    mutated: AtomicU64,
    released: AtomicU64,
    live: Mutex<HashSet<RawToken>>,
    fail_odd_mutations: bool,
    panic_on_create: bool,
}

impl MockBait {
    fn new() -> Self {
        Self::default()
    }

    fn with_failing_odd_mutations(mut self) -> Self {
        self.fail_odd_mutations = true;
        self
    }

    fn with_panic_on_create(mut self) -> Self {
        self.panic_on_create = true;
        self
    }

    fn live_tokens(&self) -> usize {
        self.live.lock().unwrap().len()
    }
}

impl RaceBait for MockBait {
    fn name(&self) -> &str {
        "mock"
    }

    fn create(&self, _item: ItemHandle) -> Result<RawToken, BaitError> {
        if self.panic_on_create {
            panic!("create exploded");
        }
        let token = self.next_token.fetch_add(1, Ordering::SeqCst) + 100;
        self.live.lock().unwrap().insert(token);
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(token)
    }

    fn trigger(&self, _item: ItemHandle, _token: RawToken) -> Result<(), BaitError> {
        Ok(())
    }

    fn mutate(&self, item: ItemHandle, token: RawToken) -> Result<(), BaitError> {
        assert!(self.live.lock().unwrap().contains(&token), "mutate after release");
        if self.fail_odd_mutations && item.index() % 2 == 1 {
            return Err(BaitError::io("mutate", item, io::Error::other("odd")));
        }
        self.mutated.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release(&self, _item: ItemHandle, token: Option<RawToken>) -> Result<(), BaitError> {
        if let Some(token) = token {
            assert!(self.live.lock().unwrap().remove(&token), "double release");
            self.released.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn context(items: usize, accumulators: usize, mutators: usize) -> Arc<RunContext> {
    let config = HarnessConfig::default()
        .with_items(items)
        .with_accumulators(accumulators)
        .with_mutators(mutators)
        .with_worker_poll(PollPolicy::Yield)
        .with_stall_timeout(Some(Duration::from_secs(10)))
        .with_pin_threads(false);
    Arc::new(RunContext::new(config).unwrap())
}

fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

fn spawn(
    ctx: &Arc<RunContext>,
    bait: &Arc<MockBait>,
    id: usize,
    role: Role,
) -> thread::JoinHandle<crate::error::HarnessResult<WorkerStats>> {
    let worker = WorkerBuilder::new(id, role)
        .context(Arc::clone(ctx))
        .bait(Arc::clone(bait) as Arc<dyn RaceBait>)
        .build()
        .unwrap();
    thread::spawn(move || worker.run())
}

fn prefill(ctx: &RunContext, bait: &MockBait) {
    for index in 0..ctx.arena().capacity() {
        let item = ctx.arena().handle(index).unwrap();
        ctx.arena().install(item, bait.create(item).unwrap());
    }
}

// ============================================================================
// Mutator
// ============================================================================

#[test]
fn test_mutator_acts_only_in_race() {
    let ctx = context(10, 1, 1);
    let bait = Arc::new(MockBait::new());
    prefill(&ctx, &bait);

    let handle = spawn(&ctx, &bait, 0, Role::Mutator);
    thread::sleep(Duration::from_millis(20));
    assert_eq!(bait.mutated.load(Ordering::SeqCst), 0);

    ctx.barrier().advance_phase(Phase::Race);
    assert!(wait_until(|| ctx.barrier().current_phase() == Phase::Cleanup));

    assert_eq!(bait.mutated.load(Ordering::SeqCst), 10);
    assert_eq!(ctx.stats().operations(), 10);
    let item = ctx.arena().handle(3).unwrap();
    assert_eq!(ctx.arena().state(item), ItemState::Mutated);

    ctx.shutdown().request(StopReason::UserRequest);
    let stats = handle.join().unwrap().unwrap();
    assert_eq!(stats.mutated, 10);
    assert_eq!(stats.cycles, 1);
}

#[test]
fn test_mutators_split_the_partition() {
    let ctx = context(10, 1, 4);
    let bait = Arc::new(MockBait::new());
    prefill(&ctx, &bait);

    let handles: Vec<_> = (0..4)
        .map(|id| spawn(&ctx, &bait, id, Role::Mutator))
        .collect();

    ctx.barrier().advance_phase(Phase::Race);
    assert!(wait_until(|| ctx.barrier().current_phase() == Phase::Cleanup));
    ctx.shutdown().request(StopReason::UserRequest);

    let total: u64 = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap().mutated)
        .sum();
    assert_eq!(total, 10);
    assert_eq!(bait.mutated.load(Ordering::SeqCst), 10);
    assert_eq!(ctx.stats().operations(), total);
}

#[test]
fn test_mutation_failures_are_misses() {
    let ctx = context(10, 1, 1);
    let bait = Arc::new(MockBait::new().with_failing_odd_mutations());
    prefill(&ctx, &bait);

    let handle = spawn(&ctx, &bait, 0, Role::Mutator);
    ctx.barrier().advance_phase(Phase::Race);
    assert!(wait_until(|| ctx.barrier().current_phase() == Phase::Cleanup));
    ctx.shutdown().request(StopReason::UserRequest);

    let stats = handle.join().unwrap().unwrap();
    assert_eq!(stats.mutated, 5);
    assert_eq!(stats.misses, 5);
    let snapshot = ctx.stats().snapshot();
    assert_eq!(snapshot.operations, 5);
    assert_eq!(snapshot.misses, 5);
}

// ============================================================================
// Accumulator
// ============================================================================

#[test]
fn test_accumulator_creates_then_releases() {
    let ctx = context(10, 1, 1);
    let bait = Arc::new(MockBait::new());

    let handle = spawn(&ctx, &bait, 0, Role::Accumulator);
    assert!(wait_until(|| ctx.barrier().current_phase() == Phase::Trigger));
    assert_eq!(ctx.arena().live_count(), 10);
    assert_eq!(bait.live_tokens(), 10);

    ctx.barrier().advance_phase(Phase::Cleanup);
    assert!(wait_until(|| ctx.barrier().bursts() == 1));
    assert!(wait_until(|| ctx.barrier().current_phase() == Phase::Trigger));

    ctx.shutdown().request(StopReason::UserRequest);
    let stats = handle.join().unwrap().unwrap();
    assert_eq!(stats.created, 20);
    assert_eq!(stats.released, 10);
    assert_eq!(stats.cycles, 1);
    assert_eq!(bait.released.load(Ordering::SeqCst), 10);
    assert_eq!(ctx.arena().live_count(), 10);
}

// ============================================================================
// Bindings outside the quorum
// ============================================================================

#[test]
fn test_non_quorum_binding_waits_for_phase_change() {
    let ctx = context(10, 1, 1);
    let bait = Arc::new(MockBait::new());
    prefill(&ctx, &bait);

    let record = Arc::new(WorkerRecord::new(
        0,
        Role::Mutator,
        None,
        Partition::of(10, 1, 0),
    ));
    let worker = Worker::new(
        Arc::clone(&record),
        vec![Binding::new(Phase::Race, Action::Mutate, None)],
        Arc::clone(&ctx),
        Arc::clone(&bait) as Arc<dyn RaceBait>,
    );
    let handle = thread::spawn(move || worker.run());

    ctx.barrier().advance_phase(Phase::Race);
    assert!(wait_until(|| record.state() == WorkerState::Arrive));
    assert_eq!(bait.mutated.load(Ordering::SeqCst), 10);
    assert_eq!(ctx.stats().operations(), 10);

    // Acting without a quorum never moves the barrier.
    thread::sleep(Duration::from_millis(20));
    assert_eq!(ctx.barrier().current_phase(), Phase::Race);
    assert_eq!(ctx.barrier().arrivals(), 0);

    ctx.barrier().advance_phase(Phase::Cleanup);
    assert!(wait_until(|| record.state() == WorkerState::WaitForPhase));

    ctx.shutdown().request(StopReason::UserRequest);
    let stats = handle.join().unwrap().unwrap();
    assert_eq!(stats.cycles, 1);
    assert_eq!(stats.mutated, 10);
    assert_eq!(bait.mutated.load(Ordering::SeqCst), 10);
}

// ============================================================================
// Shutdown, stall and panic
// ============================================================================

#[test]
fn test_shutdown_releases_idle_worker() {
    let ctx = context(10, 1, 1);
    let bait = Arc::new(MockBait::new());
    let handle = spawn(&ctx, &bait, 0, Role::Mutator);

    thread::sleep(Duration::from_millis(10));
    ctx.shutdown().request(StopReason::UserRequest);

    let stats = handle.join().unwrap().unwrap();
    assert_eq!(stats.mutated, 0);
    assert_eq!(stats.cycles, 0);
}

#[test]
fn test_missing_party_stalls_and_reports() {
    let config = HarnessConfig::default()
        .with_items(10)
        .with_mutators(2)
        .with_stall_timeout(Some(Duration::from_millis(50)))
        .with_pin_threads(false);
    let ctx = Arc::new(RunContext::new(config).unwrap());
    let bait = Arc::new(MockBait::new());
    prefill(&ctx, &bait);

    let handle = spawn(&ctx, &bait, 0, Role::Mutator);
    ctx.barrier().advance_phase(Phase::Race);

    let result = handle.join().unwrap();
    match result {
        Err(HarnessError::BarrierStall(info)) => {
            assert_eq!(info.observed, Phase::Race);
            assert_eq!(info.arrivals, 1);
            assert_eq!(info.quorum, Some(2));
        }
        other => panic!("expected stall, got {:?}", other),
    }
    assert!(matches!(ctx.shutdown().reason(), Some(StopReason::Stall(_))));
    assert_eq!(ctx.stats().operations(), 5, "counts flushed before arriving");
}

#[test]
fn test_panicking_worker_raises_shutdown() {
    let ctx = context(10, 1, 1);
    let bait = Arc::new(MockBait::new().with_panic_on_create());

    let handle = spawn(&ctx, &bait, 0, Role::Accumulator);
    assert!(handle.join().is_err());
    assert_eq!(
        ctx.shutdown().reason(),
        Some(StopReason::Error("accumulator-0 panicked".to_owned()))
    );
}
