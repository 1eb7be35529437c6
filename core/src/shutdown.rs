//! Cooperative shutdown shared by every role thread
//!
//! One flag, polled at every wait and sleep boundary. Nothing is ever
//! interrupted preemptively: an in-flight race-bait call always returns
//! before its thread notices the flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::{HarnessError, HarnessResult};
#[cfg(unix)]
use crate::persistence::StateStore;

/// Window in which a second SIGINT forces an immediate exit
pub const FORCE_EXIT_WINDOW: Duration = Duration::from_secs(3);

/// Exit status of a forced exit
pub const FORCE_EXIT_CODE: i32 = 130;

/// Why a run stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// A process signal arrived
    Signal(i32),
    /// The configured run duration elapsed
    Completed,
    /// Stopped by an explicit request
    UserRequest,
    /// A barrier wait exceeded the stall timeout
    Stall(String),
    /// A role thread failed
    Error(String),
}

impl StopReason {
    /// Status text written into the final persisted record
    pub fn status_text(&self) -> &'static str {
        match self {
            StopReason::Signal(_) => "stopped by signal",
            StopReason::Completed | StopReason::UserRequest => "completed",
            StopReason::Stall(_) => "stalled",
            StopReason::Error(_) => "error",
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Signal(signal) => write!(f, "signal {}", signal),
            StopReason::Completed => f.write_str("completed"),
            StopReason::UserRequest => f.write_str("user request"),
            StopReason::Stall(detail) => write!(f, "barrier stall ({})", detail),
            StopReason::Error(detail) => write!(f, "error ({})", detail),
        }
    }
}

/// Shared shutdown flag plus the reason it was raised
#[derive(Debug, Default)]
pub struct ShutdownSignal {
    requested: AtomicBool,
    reason: Mutex<Option<StopReason>>,
}

impl ShutdownSignal {
    /// New, unraised signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether shutdown has been requested
    #[inline]
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Raise the signal; the first reason wins
    ///
    /// Returns `true` if this call raised it.
    pub fn request(&self, reason: StopReason) -> bool {
        let mut slot = lock_or_recover(&self.reason);
        if slot.is_none() {
            tracing::info!(reason = %reason, "Shutdown requested");
            *slot = Some(reason);
        }
        drop(slot);
        !self.requested.swap(true, Ordering::AcqRel)
    }

    /// The reason recorded by the first request
    pub fn reason(&self) -> Option<StopReason> {
        lock_or_recover(&self.reason).clone()
    }
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Raises shutdown if the owning thread unwinds
///
/// Held for the lifetime of a role thread so a panicking party cannot leave
/// its peers waiting on a quorum it will never join.
#[derive(Debug)]
pub struct PanicGuard<'a> {
    signal: &'a ShutdownSignal,
    name: &'a str,
}

impl<'a> PanicGuard<'a> {
    /// Guard the current thread, labelled `name` in the stop reason
    pub fn new(signal: &'a ShutdownSignal, name: &'a str) -> Self {
        Self { signal, name }
    }
}

impl Drop for PanicGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            tracing::error!(thread = self.name, "Thread panicked");
            self.signal
                .request(StopReason::Error(format!("{} panicked", self.name)));
        }
    }
}

/// Decides whether a SIGINT escalates from graceful shutdown to exit
#[cfg(unix)]
#[derive(Debug, Default)]
struct SigintTracker {
    first_at: Option<Instant>,
}

#[cfg(unix)]
impl SigintTracker {
    /// Record a SIGINT at `now`; true when it follows another inside the
    /// force-exit window
    fn force_exit(&mut self, now: Instant) -> bool {
        match self.first_at {
            Some(first) if now.saturating_duration_since(first) <= FORCE_EXIT_WINDOW => true,
            _ => {
                self.first_at = Some(now);
                false
            }
        }
    }
}

/// Background thread turning SIGINT/SIGTERM into a shutdown request
///
/// A second SIGINT within [`FORCE_EXIT_WINDOW`] of the first exits the
/// process with [`FORCE_EXIT_CODE`], removing the run record first when a
/// store was given.
#[cfg(unix)]
pub struct SignalListener {
    handle: signal_hook::iterator::Handle,
    thread: Option<thread::JoinHandle<()>>,
}

#[cfg(unix)]
impl SignalListener {
    /// Register the listener for `signal`
    ///
    /// # Errors
    ///
    /// Returns an error when the handlers cannot be installed or the listener
    /// thread cannot be started.
    pub fn register(signal: Arc<ShutdownSignal>) -> HarnessResult<Self> {
        Self::register_with_store(signal, None)
    }

    /// Register the listener, removing `store`'s record on a forced exit
    ///
    /// # Errors
    ///
    /// Same as [`SignalListener::register`].
    pub fn register_with_store(
        signal: Arc<ShutdownSignal>,
        store: Option<Arc<StateStore>>,
    ) -> HarnessResult<Self> {
        use signal_hook::consts::signal::{SIGINT, SIGTERM};

        let mut signals = signal_hook::iterator::Signals::new([SIGINT, SIGTERM])?;
        let handle = signals.handle();

        let thread = thread::Builder::new()
            .name("signal-listener".to_owned())
            .spawn(move || {
                let mut sigint = SigintTracker::default();
                for number in signals.forever() {
                    if number == SIGINT && sigint.force_exit(Instant::now()) {
                        tracing::warn!("Second SIGINT, forcing immediate exit");
                        if let Some(store) = &store {
                            if let Err(e) = store.remove() {
                                tracing::warn!(error = %e, "Could not remove run record");
                            }
                        }
                        std::process::exit(FORCE_EXIT_CODE);
                    }
                    tracing::info!(signal = number, "Received signal, stopping...");
                    signal.request(StopReason::Signal(number));
                }
            })
            .map_err(|source| HarnessError::Spawn {
                name: "signal-listener".to_owned(),
                source,
            })?;

        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }

    /// Stop listening and join the listener thread
    pub fn close(mut self) {
        self.shutdown_listener();
    }

    fn shutdown_listener(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("signal listener thread panicked while stopping");
            }
        }
    }
}

#[cfg(unix)]
impl Drop for SignalListener {
    fn drop(&mut self) {
        self.shutdown_listener();
    }
}
