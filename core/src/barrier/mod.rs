//! Phase-synchronized rendezvous barrier
//!
//! The barrier is three atomics: the phase register, an arrival counter and
//! a burst counter. Parties either arrive (counting toward a quorum whose
//! last member advances the phase) or poll the register until the phase
//! they care about becomes current.
//!
//! Publishing a phase is a release store and every poll is an acquire load,
//! so everything a party did before its arrival happens-before anything a
//! party does after observing the next phase. Nothing orders the actions of
//! parties *within* a phase; that is where the race lives.
//!
//! # Example
//!
//! ```ignore
//! use burst_race_core::barrier::{PhaseBarrier, Phase, Waiter};
//!
//! let barrier = PhaseBarrier::new();
//! let waiter = Waiter::new(&shutdown, PollPolicy::Yield);
//!
//! // Four mutators each call this; the fourth releases the others.
//! barrier.arrive(4, &waiter);
//! ```

mod phase;

pub use phase::Phase;

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::config::PollPolicy;
use crate::shutdown::ShutdownSignal;

/// Busy polls between clock reads when a stall timeout is armed
const STALL_CHECK_STRIDE: u32 = 1024;

/// Diagnostic for a wait that exceeded the stall timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StallInfo {
    /// Phase current when the wait gave up
    pub observed: Phase,
    /// Arrival counter when the wait gave up
    pub arrivals: u32,
    /// Quorum the waiter was part of, if it had arrived
    pub quorum: Option<u32>,
    /// How long the wait lasted
    pub waited: Duration,
}

impl std::fmt::Display for StallInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.quorum {
            Some(quorum) => write!(
                f,
                "stuck in {} with {}/{} arrivals after {:?}",
                self.observed, self.arrivals, quorum, self.waited
            ),
            None => write!(
                f,
                "stuck in {} ({} arrivals) after {:?}",
                self.observed, self.arrivals, self.waited
            ),
        }
    }
}

/// How a party waits: shutdown signal, poll policy and stall timeout
#[derive(Debug, Clone, Copy)]
pub struct Waiter<'a> {
    shutdown: &'a ShutdownSignal,
    poll: PollPolicy,
    stall_timeout: Option<Duration>,
}

impl<'a> Waiter<'a> {
    /// Waiter that polls with `poll` and never times out
    pub fn new(shutdown: &'a ShutdownSignal, poll: PollPolicy) -> Self {
        Self {
            shutdown,
            poll,
            stall_timeout: None,
        }
    }

    /// Arm (or disarm) the stall timeout
    pub fn with_stall_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stall_timeout = timeout;
        self
    }

    /// Whether shutdown has been requested
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.is_requested()
    }
}

/// Result of polling for a phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The awaited condition holds; carries the phase observed
    Ready(Phase),
    /// Shutdown was observed first
    Shutdown,
    /// The stall timeout elapsed first
    Stalled(StallInfo),
}

/// Result of the non-blocking half of an arrival
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    /// This arrival completed the quorum and published the carried phase
    Advanced(Phase),
    /// The quorum is not yet complete
    Pending {
        /// Phase the arrival was registered in
        phase: Phase,
        /// Arrivals so far, this one included
        arrived: u32,
    },
}

/// Result of a blocking arrival
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArriveOutcome {
    /// This caller completed the quorum and published the carried phase
    Advanced(Phase),
    /// Another caller completed the quorum; carries the phase observed
    Released(Phase),
    /// Shutdown was observed before the quorum completed
    Shutdown,
    /// The stall timeout elapsed before the quorum completed
    Stalled(StallInfo),
}

/// Atomic phase register with quorum arrivals
#[derive(Debug)]
pub struct PhaseBarrier {
    phase: AtomicU32,
    arrivals: AtomicU32,
    bursts: AtomicU64,
}

impl Default for PhaseBarrier {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseBarrier {
    /// New barrier in `Accumulate` with no arrivals
    pub const fn new() -> Self {
        Self {
            phase: AtomicU32::new(Phase::Accumulate.as_u32()),
            arrivals: AtomicU32::new(0),
            bursts: AtomicU64::new(0),
        }
    }

    /// Wait-free read of the current phase
    #[inline]
    pub fn current_phase(&self) -> Phase {
        Phase::from_u32(self.phase.load(Ordering::Acquire))
    }

    /// Arrivals registered toward the current quorum
    pub fn arrivals(&self) -> u32 {
        self.arrivals.load(Ordering::Acquire)
    }

    /// Completed cycles (wraps from `Cleanup` back to `Accumulate`)
    pub fn bursts(&self) -> u64 {
        self.bursts.load(Ordering::Acquire)
    }

    /// Publish `phase` unconditionally
    ///
    /// Used for phases whose end is not quorum-driven.
    pub fn advance_phase(&self, phase: Phase) {
        let from = self.current_phase();
        self.publish(from, phase);
    }

    /// Count one arrival without waiting
    ///
    /// The caller that brings the counter to exactly `quorum` resets it to
    /// zero and advances the phase. A quorum of zero is treated as one.
    pub fn register_arrival(&self, quorum: u32) -> Arrival {
        let quorum = quorum.max(1);
        // Parties of this phase cannot see it change until they all arrive,
        // so the phase read here is the arrival phase.
        let phase = self.current_phase();
        let arrived = self.arrivals.fetch_add(1, Ordering::AcqRel) + 1;

        if arrived == quorum {
            self.arrivals.store(0, Ordering::Release);
            let next = phase.next();
            self.publish(phase, next);
            Arrival::Advanced(next)
        } else {
            Arrival::Pending { phase, arrived }
        }
    }

    /// Arrive and wait until the phase leaves the arrival phase
    ///
    /// A waiter descheduled for a whole cycle may observe its arrival phase
    /// again; a changed burst count releases it as well.
    pub fn arrive(&self, quorum: u32, waiter: &Waiter<'_>) -> ArriveOutcome {
        // Cannot change before this arrival completes its quorum.
        let generation = self.bursts();
        match self.register_arrival(quorum) {
            Arrival::Advanced(next) => ArriveOutcome::Advanced(next),
            Arrival::Pending { phase, .. } => {
                let released = |current: Phase| current != phase || self.bursts() != generation;
                match self.poll(waiter, Some(quorum.max(1)), released) {
                    WaitOutcome::Ready(current) => ArriveOutcome::Released(current),
                    WaitOutcome::Shutdown => ArriveOutcome::Shutdown,
                    WaitOutcome::Stalled(info) => ArriveOutcome::Stalled(info),
                }
            }
        }
    }

    /// Wait until `phase` is current
    pub fn wait_for(&self, phase: Phase, waiter: &Waiter<'_>) -> WaitOutcome {
        self.poll(waiter, None, |current| current == phase)
    }

    /// Wait until `phase` is no longer current
    pub fn wait_while(&self, phase: Phase, waiter: &Waiter<'_>) -> WaitOutcome {
        self.poll(waiter, None, |current| current != phase)
    }

    fn publish(&self, from: Phase, to: Phase) {
        if from == Phase::Cleanup && to == Phase::Accumulate {
            self.bursts.fetch_add(1, Ordering::AcqRel);
        }
        self.phase.store(to.as_u32(), Ordering::Release);
    }

    fn poll(
        &self,
        waiter: &Waiter<'_>,
        quorum: Option<u32>,
        mut done: impl FnMut(Phase) -> bool,
    ) -> WaitOutcome {
        let started = Instant::now();
        let mut polls: u32 = 0;

        loop {
            let current = self.current_phase();
            if done(current) {
                return WaitOutcome::Ready(current);
            }
            if waiter.shutdown_requested() {
                return WaitOutcome::Shutdown;
            }
            if let Some(limit) = waiter.stall_timeout {
                if !waiter.poll.is_busy() || polls % STALL_CHECK_STRIDE == 0 {
                    let waited = started.elapsed();
                    if waited >= limit {
                        return WaitOutcome::Stalled(StallInfo {
                            observed: current,
                            arrivals: self.arrivals(),
                            quorum,
                            waited,
                        });
                    }
                }
            }
            polls = polls.wrapping_add(1);
            waiter.poll.pause();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    use crate::shutdown::{ShutdownSignal, StopReason};

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

    #[test]
    fn test_starts_in_accumulate() {
        let barrier = PhaseBarrier::new();
        assert_eq!(barrier.current_phase(), Phase::Accumulate);
        assert_eq!(barrier.arrivals(), 0);
        assert_eq!(barrier.bursts(), 0);
    }

    #[test]
    fn test_current_phase_is_stable() {
        let barrier = PhaseBarrier::new();
        barrier.advance_phase(Phase::Race);
        for _ in 0..1000 {
            assert_eq!(barrier.current_phase(), Phase::Race);
        }
    }

    #[test]
    fn test_quorum_advances_exactly_once() {
        for quorum in 1..=8u32 {
            let barrier = PhaseBarrier::new();
            for i in 1..quorum {
                assert_eq!(
                    barrier.register_arrival(quorum),
                    Arrival::Pending {
                        phase: Phase::Accumulate,
                        arrived: i
                    }
                );
                assert_eq!(barrier.current_phase(), Phase::Accumulate);
            }
            assert_eq!(
                barrier.register_arrival(quorum),
                Arrival::Advanced(Phase::Trigger)
            );
            assert_eq!(barrier.current_phase(), Phase::Trigger);
            assert_eq!(barrier.arrivals(), 0);
        }
    }

    #[test]
    fn test_zero_quorum_treated_as_one() {
        let barrier = PhaseBarrier::new();
        assert_eq!(barrier.register_arrival(0), Arrival::Advanced(Phase::Trigger));
    }

    #[test]
    fn test_burst_counter_increments_on_wrap() {
        let barrier = PhaseBarrier::new();
        barrier.advance_phase(Phase::Cleanup);
        assert_eq!(barrier.bursts(), 0);
        assert_eq!(barrier.register_arrival(1), Arrival::Advanced(Phase::Accumulate));
        assert_eq!(barrier.bursts(), 1);
    }

    #[test]
    fn test_fourth_arrival_releases_three_waiters() {
        let barrier = Arc::new(PhaseBarrier::new());
        let shutdown = Arc::new(ShutdownSignal::new());
        barrier.advance_phase(Phase::Race);

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let shutdown = Arc::clone(&shutdown);
                thread::spawn(move || {
                    let waiter = Waiter::new(&shutdown, PollPolicy::Yield);
                    barrier.arrive(4, &waiter)
                })
            })
            .collect();

        assert!(wait_until(|| barrier.arrivals() == 3));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(barrier.current_phase(), Phase::Race);

        let waiter = Waiter::new(&shutdown, PollPolicy::Yield);
        assert_eq!(
            barrier.arrive(4, &waiter),
            ArriveOutcome::Advanced(Phase::Cleanup)
        );
        assert_eq!(barrier.current_phase(), Phase::Cleanup);

        for handle in handles {
            assert_eq!(
                handle.join().unwrap(),
                ArriveOutcome::Released(Phase::Cleanup)
            );
        }
        assert_eq!(barrier.arrivals(), 0);
    }

    #[test]
    fn test_shutdown_releases_waiters_without_phase_change() {
        let barrier = Arc::new(PhaseBarrier::new());
        let shutdown = Arc::new(ShutdownSignal::new());

        let mut handles = Vec::new();
        for _ in 0..2 {
            let barrier = Arc::clone(&barrier);
            let shutdown = Arc::clone(&shutdown);
            handles.push(thread::spawn(move || {
                let waiter = Waiter::new(&shutdown, PollPolicy::Spin);
                let released = matches!(barrier.arrive(5, &waiter), ArriveOutcome::Shutdown);
                (released, Instant::now())
            }));
        }
        for _ in 0..2 {
            let barrier = Arc::clone(&barrier);
            let shutdown = Arc::clone(&shutdown);
            handles.push(thread::spawn(move || {
                let waiter =
                    Waiter::new(&shutdown, PollPolicy::Sleep(Duration::from_millis(1)));
                let released =
                    matches!(barrier.wait_for(Phase::Race, &waiter), WaitOutcome::Shutdown);
                (released, Instant::now())
            }));
        }

        assert!(wait_until(|| barrier.arrivals() == 2));
        // Let the sleeping waiters settle into their poll loop.
        thread::sleep(Duration::from_millis(20));
        let requested_at = Instant::now();
        shutdown.request(StopReason::UserRequest);

        for handle in handles {
            let (released, left_at) = handle.join().unwrap();
            assert!(released);
            // One 1 ms poll interval plus scheduling slack.
            let latency = left_at.saturating_duration_since(requested_at);
            assert!(latency < Duration::from_millis(50), "left after {:?}", latency);
        }
        assert_eq!(barrier.current_phase(), Phase::Accumulate);
    }

    #[test]
    fn test_stall_timeout_reports_instead_of_hanging() {
        let barrier = PhaseBarrier::new();
        let shutdown = ShutdownSignal::new();
        let waiter = Waiter::new(&shutdown, PollPolicy::Yield)
            .with_stall_timeout(Some(Duration::from_millis(30)));

        let started = Instant::now();
        match barrier.arrive(2, &waiter) {
            ArriveOutcome::Stalled(info) => {
                assert_eq!(info.observed, Phase::Accumulate);
                assert_eq!(info.arrivals, 1);
                assert_eq!(info.quorum, Some(2));
                assert!(info.waited >= Duration::from_millis(30));
                assert!(info.to_string().contains("1/2"));
            }
            other => panic!("expected stall, got {:?}", other),
        }
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(barrier.current_phase(), Phase::Accumulate);
    }

    #[test]
    fn test_wait_for_returns_immediately_when_current() {
        let barrier = PhaseBarrier::new();
        let shutdown = ShutdownSignal::new();
        let waiter = Waiter::new(&shutdown, PollPolicy::Spin);
        assert_eq!(
            barrier.wait_for(Phase::Accumulate, &waiter),
            WaitOutcome::Ready(Phase::Accumulate)
        );
    }

    #[test]
    fn test_wait_while_sees_advance_from_other_thread() {
        let barrier = Arc::new(PhaseBarrier::new());
        let shutdown = Arc::new(ShutdownSignal::new());
        barrier.advance_phase(Phase::Trigger);

        let handle = {
            let barrier = Arc::clone(&barrier);
            let shutdown = Arc::clone(&shutdown);
            thread::spawn(move || {
                let waiter = Waiter::new(&shutdown, PollPolicy::Yield);
                barrier.wait_while(Phase::Trigger, &waiter)
            })
        };

        thread::sleep(Duration::from_millis(10));
        barrier.advance_phase(Phase::Race);
        assert_eq!(handle.join().unwrap(), WaitOutcome::Ready(Phase::Race));
    }
}
