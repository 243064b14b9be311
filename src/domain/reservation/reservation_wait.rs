use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::domain::reservation::reservation::Reservation;
use crate::domain::utils::id::ReservationWaitId;
use crate::error::{AllocationCause, Error, Result};

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_REQUEST_SLEEP_PERIOD_SECONDS: u64 = 5;

/// Status of the single allocation attempt behind a [`ReservationWait`].
///
/// `Pending` moves to exactly one of the terminal states and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReservationStatus {
    /// The allocation has not produced a result yet.
    Pending,
    /// The allocation returned a reservation.
    Success,
    /// The allocation failed, panicked, or was cancelled before it started.
    Failed,
}

impl ReservationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReservationStatus::Pending)
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReservationStatus::Pending => write!(f, "PENDING"),
            ReservationStatus::Success => write!(f, "SUCCESS"),
            ReservationStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Polling parameters for [`ReservationWait::get_with_settings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WaitSettings {
    pub timeout_seconds: u64,
    pub request_sleep_period: u64,
}

impl Default for WaitSettings {
    fn default() -> Self {
        WaitSettings { timeout_seconds: DEFAULT_TIMEOUT_SECONDS, request_sleep_period: DEFAULT_REQUEST_SLEEP_PERIOD_SECONDS }
    }
}

impl WaitSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn request_sleep_period(&self) -> Duration {
        Duration::from_secs(self.request_sleep_period)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("allocation panicked: {0}")]
pub struct AllocationPanic(String);

impl AllocationPanic {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(msg) = payload.downcast_ref::<&str>() {
            msg.to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "unknown panic payload".to_string()
        };
        AllocationPanic(message)
    }
}

#[derive(Debug, Clone)]
enum Outcome {
    Reserved(Arc<Reservation>),
    Failed(AllocationCause),
}

#[derive(Debug)]
struct WaitState {
    status: ReservationStatus,
    /// Set by the worker right before it invokes the allocation function.
    started: bool,
    /// Set by `shutdown` when it got to the allocation before the worker did.
    cancelled: bool,
    /// Present once the allocation function has returned (or panicked).
    outcome: Option<Outcome>,
}

/// Status and outcome, guarded by a single lock, plus the condition the
/// worker signals once it stores an outcome (or `shutdown` cancels).
#[derive(Debug)]
struct Shared {
    state: Mutex<WaitState>,
    finished: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, WaitState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to a single in-flight reservation attempt.
///
/// Creating a `ReservationWait` immediately starts the allocation function on
/// a dedicated worker thread owned by this instance. The caller can poll
/// ([`get`](Self::get) with `blocking = false`), block
/// ([`get`](Self::get) with `blocking = true`) or wait with a deadline
/// ([`get_or_timeout`](Self::get_or_timeout)), all over the same single
/// computation.
///
/// [`shutdown`](Self::shutdown) cancels the allocation if it has not started
/// and releases the worker. Dropping the wait shuts it down as well.
pub struct ReservationWait {
    id: ReservationWaitId,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ReservationWait {
    pub fn new<F, E>(allocate_fn: F) -> Self
    where
        F: FnOnce() -> std::result::Result<Reservation, E> + Send + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::with_status(allocate_fn, ReservationStatus::Pending)
    }

    /// Like [`new`](Self::new), but with a caller-chosen starting status.
    ///
    /// A terminal starting status is final: the allocation still runs, and
    /// `get` still reports its result, but `status` never moves away from
    /// the seeded value. A `Failed` seed makes every `get` fail right away.
    pub fn with_status<F, E>(allocate_fn: F, initial_status: ReservationStatus) -> Self
    where
        F: FnOnce() -> std::result::Result<Reservation, E> + Send + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::spawn(allocate_fn, initial_status, None)
    }

    /// Spawns the worker. If `start_gate` is given the worker blocks on it
    /// before claiming the allocation.
    pub(crate) fn spawn<F, E>(allocate_fn: F, initial_status: ReservationStatus, start_gate: Option<Receiver<()>>) -> Self
    where
        F: FnOnce() -> std::result::Result<Reservation, E> + Send + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let id = ReservationWaitId::generate("reservation-wait");
        let shared = Arc::new(Shared {
            state: Mutex::new(WaitState { status: initial_status, started: false, cancelled: false, outcome: None }),
            finished: Condvar::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let worker_id = id.clone();
        let spawned = thread::Builder::new().name(id.to_string()).spawn(move || {
            if let Some(gate) = start_gate {
                // A dropped sender opens the gate as well.
                let _ = gate.recv();
            }
            run_allocation(&worker_id, &worker_shared, allocate_fn);
        });

        let worker = match spawned {
            Ok(handle) => {
                log::debug!("{}: allocation scheduled on dedicated worker.", id);
                Some(handle)
            }
            Err(e) => {
                log::error!("{}: could not spawn worker thread: {}", id, e);
                let mut state = shared.lock();
                if state.status == ReservationStatus::Pending {
                    state.status = ReservationStatus::Failed;
                }
                state.outcome = Some(Outcome::Failed(Arc::new(e)));
                None
            }
        };

        ReservationWait { id, shared, worker: Mutex::new(worker) }
    }

    pub fn id(&self) -> &ReservationWaitId {
        &self.id
    }

    pub fn status(&self) -> ReservationStatus {
        self.shared.lock().status
    }

    /// True once the allocation function has returned, failed or panicked.
    pub fn is_finished(&self) -> bool {
        self.shared.lock().outcome.is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.lock().cancelled
    }

    /// Gets the reservation.
    ///
    /// With `blocking` set, blocks until the allocation has finished.
    /// Otherwise returns `Ok(None)` right away if it is still running.
    ///
    /// # Errors
    /// `Error::ReservationFailed` if the allocation failed or was cancelled.
    /// Repeated calls on a failed wait return equivalent errors.
    pub fn get(&self, blocking: bool) -> Result<Option<Arc<Reservation>>> {
        let mut state = self.shared.lock();

        if state.status == ReservationStatus::Failed {
            return Err(self.failure(&state));
        }
        if state.cancelled {
            return Err(self.failure(&state));
        }
        if !blocking && state.outcome.is_none() {
            return Ok(None);
        }

        while state.outcome.is_none() && !state.cancelled {
            state = self.shared.finished.wait(state).unwrap_or_else(PoisonError::into_inner);
        }

        match state.outcome.clone() {
            Some(Outcome::Reserved(reservation)) => Ok(Some(reservation)),
            Some(Outcome::Failed(_)) | None => {
                if state.status == ReservationStatus::Pending {
                    state.status = ReservationStatus::Failed;
                }
                Err(self.failure(&state))
            }
        }
    }

    /// Gets the reservation, polling every `request_sleep_period` until
    /// `timeout` has passed. Returns `Ok(None)` on timeout; the allocation
    /// keeps running and can still be picked up with a later `get`.
    ///
    /// # Errors
    /// - `Error::InvalidArgument` if `request_sleep_period >= timeout`.
    /// - Any error of [`get`](Self::get).
    pub fn get_or_timeout(&self, timeout: Duration, request_sleep_period: Duration) -> Result<Option<Arc<Reservation>>> {
        if request_sleep_period >= timeout {
            return Err(Error::InvalidArgument(format!(
                "Cannot wait more than (or equal to) {:?} per period (specified {:?})",
                timeout, request_sleep_period
            )));
        }

        // A timeout past the clock's range waits without a deadline.
        let deadline = Instant::now().checked_add(timeout);
        while deadline.is_none_or(|deadline| Instant::now() < deadline) {
            if let Some(reservation) = self.get(false)? {
                return Ok(Some(reservation));
            }
            thread::sleep(request_sleep_period);
        }

        log::info!("{}: no reservation within {:?}, giving up waiting.", self.id, timeout);
        Ok(None)
    }

    pub fn get_with_settings(&self, settings: &WaitSettings) -> Result<Option<Arc<Reservation>>> {
        self.get_or_timeout(settings.timeout(), settings.request_sleep_period())
    }

    /// Cancels the allocation if the worker has not started it yet, then
    /// releases the worker. A running allocation is left to finish on its own.
    /// Calling this more than once is harmless.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.lock();
            if state.outcome.is_none() && !state.started && !state.cancelled {
                state.cancelled = true;
                if state.status == ReservationStatus::Pending {
                    state.status = ReservationStatus::Failed;
                }
                self.shared.finished.notify_all();
                log::info!("{}: allocation cancelled before it started.", self.id);
            } else if state.outcome.is_none() && state.started {
                log::debug!("{}: allocation still running, leaving it to finish in the background.", self.id);
            }
        }

        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = worker {
            if handle.is_finished() {
                if handle.join().is_err() {
                    log::warn!("{}: worker thread terminated abnormally.", self.id);
                }
            }
            log::debug!("{}: worker released.", self.id);
        }
    }

    fn failure(&self, state: &WaitState) -> Error {
        match &state.outcome {
            Some(Outcome::Failed(cause)) => Error::reservation_failed(format!("{}: {}", self.id, cause), Some(Arc::clone(cause))),
            _ if state.cancelled => Error::reservation_failed(format!("{}: allocation was cancelled before it started", self.id), None),
            _ => Error::reservation_failed(format!("{}: reservation marked as failed", self.id), None),
        }
    }
}

impl fmt::Debug for ReservationWait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("ReservationWait")
            .field("id", &self.id)
            .field("status", &state.status)
            .field("started", &state.started)
            .field("cancelled", &state.cancelled)
            .field("finished", &state.outcome.is_some())
            .finish()
    }
}

impl Drop for ReservationWait {
    fn drop(&mut self) {
        let still_owned = self.worker.get_mut().map(|worker| worker.is_some()).unwrap_or(true);
        if still_owned {
            log::warn!("{}: dropped without shutdown, shutting down now.", self.id);
            self.shutdown();
        }
    }
}

/// Worker body: claims the allocation unless it was cancelled, runs it
/// outside the lock and publishes the outcome.
fn run_allocation<F, E>(id: &ReservationWaitId, shared: &Shared, allocate_fn: F)
where
    F: FnOnce() -> std::result::Result<Reservation, E>,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    {
        let mut state = shared.lock();
        if state.cancelled {
            log::debug!("{}: worker found allocation cancelled, not running it.", id);
            return;
        }
        state.started = true;
    }

    let outcome = match panic::catch_unwind(AssertUnwindSafe(allocate_fn)) {
        Ok(Ok(reservation)) => {
            log::info!("{}: allocation succeeded with {} node(s).", id, reservation.len());
            Outcome::Reserved(Arc::new(reservation))
        }
        Ok(Err(e)) => {
            let boxed: Box<dyn std::error::Error + Send + Sync> = e.into();
            let cause: AllocationCause = Arc::from(boxed);
            log::warn!("{}: allocation failed: {}", id, cause);
            Outcome::Failed(cause)
        }
        Err(payload) => {
            let cause = AllocationPanic::from_payload(payload);
            log::error!("{}: {}", id, cause);
            Outcome::Failed(Arc::new(cause))
        }
    };

    let mut state = shared.lock();
    if state.status == ReservationStatus::Pending {
        state.status = match outcome {
            Outcome::Reserved(_) => ReservationStatus::Success,
            Outcome::Failed(_) => ReservationStatus::Failed,
        };
    }
    state.outcome = Some(outcome);
    shared.finished.notify_all();
}
