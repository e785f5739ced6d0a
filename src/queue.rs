//! Execution context and low-latency command submission
//!
//! A [`Context`] binds one enumerated device to an immutable [`QueueConfig`]
//! fixed at construction time. The reference configuration
//! ([`QueueConfig::low_latency`]) combines *immediate dispatch* — work is
//! handed straight to the command processor on the submitting thread, with no
//! intermediate software batching — with *strict in-order execution*: each
//! launch's effects are complete before the next submitted launch begins, so
//! chained launches need no caller-side synchronization.
//!
//! Deferred in-order submission runs through a single scheduler thread that
//! executes launches in FIFO order; completion is observed through the
//! future-style [`CompletionHandle`] either way. Within one launch the tile
//! grid still fans out with full parallelism — ordering holds *between*
//! launches, never inside one.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::device::{self, DeviceInfo};
use crate::error::{Result, TeselaError};
use crate::metrics::{LaunchMetrics, MetricsSnapshot};

/// How submitted commands reach the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchMode {
    /// Hand commands directly to the command processor on the submitting
    /// thread, bypassing software scheduling queues. Minimizes the time
    /// between submission and execution start.
    Immediate,
    /// Queue commands through the context's scheduler thread.
    Deferred,
}

/// Ordering guarantee between launches submitted to one context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderingMode {
    /// Strict submission-order completion: launch N+1 begins only after
    /// launch N's effects are visible.
    InOrder,
    /// No cross-launch ordering; the device scheduler is free to overlap
    /// launches. Callers synchronize through completion handles.
    OutOfOrder,
}

/// Scheduling priority hint for the context's command stream.
///
/// A hint only: the emulated device records it but does not act on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueuePriority {
    /// Default priority
    Normal,
    /// Prefer this context's commands when the device arbitrates
    High,
}

/// Submission properties of an execution context.
///
/// Immutable once the context is constructed; there is no way to reconfigure
/// a live queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Dispatch path for submitted commands
    pub dispatch: DispatchMode,
    /// Cross-launch ordering guarantee
    pub ordering: OrderingMode,
    /// Scheduling priority hint
    pub priority: QueuePriority,
}

impl QueueConfig {
    /// The reference low-latency configuration: immediate dispatch, strict
    /// in-order execution, high-priority hint.
    #[must_use]
    pub fn low_latency() -> Self {
        Self {
            dispatch: DispatchMode::Immediate,
            ordering: OrderingMode::InOrder,
            priority: QueuePriority::High,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::low_latency()
    }
}

/// Pending-or-done state shared between a launch and its handle.
#[derive(Debug, Default)]
struct CompletionState {
    result: Mutex<Option<Result<()>>>,
    cond: Condvar,
}

impl CompletionState {
    fn set(&self, result: Result<()>) {
        let mut guard = self
            .result
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = Some(result);
        self.cond.notify_all();
    }
}

/// Future-style completion signal for one submitted launch.
///
/// On an in-order context a later launch already waits for this one's
/// effects; the handle is for observing completion (or the fault) on the
/// host side.
#[derive(Debug)]
pub struct CompletionHandle {
    state: Arc<CompletionState>,
}

impl CompletionHandle {
    /// Block until the launch finishes and return its outcome.
    ///
    /// # Errors
    ///
    /// Returns the launch's [`TeselaError::ExecutionFault`] — including a
    /// kernel panic, which is contained and attributed to the launch — or
    /// [`TeselaError::QueueClosed`] if the scheduler shut down before the
    /// launch ran.
    pub fn wait(self) -> Result<()> {
        let mut guard = self
            .state
            .result
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(result) = guard.take() {
                return result;
            }
            guard = self
                .state
                .cond
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Non-blocking probe: has the launch finished (successfully or not)?
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state
            .result
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// Completion side of a handle. If a launch is dropped unexecuted (scheduler
/// torn down with work still queued), the drop marks it [`TeselaError::QueueClosed`]
/// so waiters never hang.
struct CompletionToken {
    state: Arc<CompletionState>,
    done: bool,
}

impl CompletionToken {
    fn complete(mut self, result: Result<()>) {
        self.done = true;
        self.state.set(result);
    }
}

impl Drop for CompletionToken {
    fn drop(&mut self) {
        if !self.done {
            self.state.set(Err(TeselaError::QueueClosed));
        }
    }
}

fn completion_pair() -> (CompletionHandle, CompletionToken) {
    let state = Arc::new(CompletionState::default());
    (
        CompletionHandle {
            state: Arc::clone(&state),
        },
        CompletionToken { state, done: false },
    )
}

/// One queued command: the kernel closure plus everything needed to report
/// its completion.
struct Launch {
    job: Box<dyn FnOnce() -> Result<()> + Send>,
    token: CompletionToken,
    operation: String,
    tiles: u64,
    metrics: LaunchMetrics,
}

impl Launch {
    /// Runs the job and completes the token. A panicking job is contained
    /// here and reported as [`TeselaError::ExecutionFault`], so the scheduler
    /// thread outlives any single faulty launch.
    fn execute(self) {
        let Launch {
            job,
            token,
            operation,
            tiles,
            metrics,
        } = self;
        let started = Instant::now();
        let result = panic::catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|payload| {
            Err(TeselaError::ExecutionFault {
                operation,
                reason: format!("kernel panicked: {}", panic_payload_message(payload.as_ref())),
            })
        });
        match &result {
            Ok(()) => metrics.record_completed(tiles, started.elapsed()),
            Err(_) => metrics.record_failed(),
        }
        token.complete(result);
    }
}

fn panic_payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else {
        "unknown panic".to_string()
    }
}

/// FIFO scheduler thread used by deferred in-order contexts.
struct CommandProcessor {
    sender: Option<std::sync::mpsc::Sender<Launch>>,
    worker: Option<JoinHandle<()>>,
}

impl CommandProcessor {
    fn spawn() -> Result<Self> {
        let (sender, receiver) = std::sync::mpsc::channel::<Launch>();
        let worker = thread::Builder::new()
            .name("tesela-queue".to_string())
            .spawn(move || {
                for launch in receiver {
                    launch.execute();
                }
            })
            .map_err(|e| TeselaError::ExecutionFault {
                operation: "command processor spawn".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    fn enqueue(&self, launch: Launch) -> Result<()> {
        match &self.sender {
            Some(sender) => sender.send(launch).map_err(|_| TeselaError::QueueClosed),
            None => Err(TeselaError::QueueClosed),
        }
    }
}

impl Drop for CommandProcessor {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain queued launches and exit.
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Execution context: one device plus an immutable submission configuration.
///
/// Shared read-only by every launch; lives as long as the surrounding
/// runtime. Dropping the context drains any queued launches before tearing
/// the scheduler down.
pub struct Context {
    device: DeviceInfo,
    config: QueueConfig,
    metrics: LaunchMetrics,
    processor: Option<CommandProcessor>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("device", &self.device)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Create a context for `device_index` with the low-latency reference
    /// configuration, rejecting out-of-range indices.
    ///
    /// # Errors
    ///
    /// Returns [`TeselaError::DeviceIndexOutOfRange`] if `device_index` is
    /// not in the enumerated device list.
    pub fn new(device_index: usize) -> Result<Self> {
        Self::with_config(device_index, QueueConfig::low_latency())
    }

    /// Create a context with the reference index-clamping policy: an
    /// out-of-range `device_index` silently falls back to device 0.
    ///
    /// Prefer [`Context::new`] when the caller can handle the error; this
    /// constructor preserves the original usability-over-correctness default.
    ///
    /// # Errors
    ///
    /// Does not fail today: the low-latency configuration dispatches inline
    /// and spawns no scheduler thread. Returns `Result` to keep the
    /// constructor signatures uniform.
    pub fn with_fallback(device_index: usize) -> Result<Self> {
        let available = device::enumerate().len();
        let index = if device_index < available {
            device_index
        } else {
            0
        };
        Self::with_config(index, QueueConfig::low_latency())
    }

    /// Create a context with an explicit submission configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TeselaError::DeviceIndexOutOfRange`] for an invalid index,
    /// or [`TeselaError::ExecutionFault`] if the scheduler thread cannot be
    /// created.
    pub fn with_config(device_index: usize, config: QueueConfig) -> Result<Self> {
        let devices = device::enumerate();
        let available = devices.len();
        let device = devices
            .into_iter()
            .find(|d| d.index == device_index)
            .ok_or(TeselaError::DeviceIndexOutOfRange {
                requested: device_index,
                available,
            })?;

        let needs_scheduler =
            config.dispatch == DispatchMode::Deferred && config.ordering == OrderingMode::InOrder;
        let processor = if needs_scheduler {
            Some(CommandProcessor::spawn()?)
        } else {
            None
        };

        Ok(Self {
            device,
            config,
            metrics: LaunchMetrics::new(),
            processor,
        })
    }

    /// The device this context is bound to.
    #[must_use]
    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    /// The submission configuration fixed at construction.
    #[must_use]
    pub fn config(&self) -> QueueConfig {
        self.config
    }

    /// Snapshot of the context's launch metrics.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Submit one kernel launch.
    ///
    /// `tiles` is the number of cooperative groups the launch fans out into,
    /// recorded in the context metrics on completion.
    ///
    /// # Errors
    ///
    /// Returns [`TeselaError::QueueClosed`] if the scheduler is gone, or
    /// [`TeselaError::ExecutionFault`] if an out-of-order worker cannot be
    /// spawned. Faults from the launch itself surface through the handle.
    pub(crate) fn submit_launch<F>(
        &self,
        operation: &str,
        tiles: u64,
        job: F,
    ) -> Result<CompletionHandle>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.metrics.record_submitted();
        let (handle, token) = completion_pair();
        let launch = Launch {
            job: Box::new(job),
            token,
            operation: operation.to_string(),
            tiles,
            metrics: self.metrics.clone(),
        };

        match self.config.dispatch {
            DispatchMode::Immediate => {
                // Straight to the command processor on this thread; the
                // handle is already complete when submit returns.
                launch.execute();
                Ok(handle)
            }
            DispatchMode::Deferred => match self.config.ordering {
                OrderingMode::InOrder => {
                    let processor = self.processor.as_ref().ok_or(TeselaError::QueueClosed)?;
                    processor.enqueue(launch)?;
                    Ok(handle)
                }
                OrderingMode::OutOfOrder => {
                    thread::Builder::new()
                        .name("tesela-launch".to_string())
                        .spawn(move || launch.execute())
                        .map_err(|e| TeselaError::ExecutionFault {
                            operation: operation.to_string(),
                            reason: format!("worker spawn failed: {e}"),
                        })?;
                    Ok(handle)
                }
            },
        }
    }

    /// Block until every previously submitted launch has completed.
    ///
    /// # Errors
    ///
    /// Returns [`TeselaError::QueueClosed`] if the scheduler is gone.
    pub fn synchronize(&self) -> Result<()> {
        self.submit_launch("synchronize", 0, || Ok(()))?.wait()
    }
}

/// Create an execution context for `device_index`, configured for
/// minimum-latency, strictly-ordered submission.
///
/// Preserves the reference fallback policy: an index past the end of the
/// enumerated device list clamps to device 0 rather than failing, and the
/// resulting context is fully usable.
///
/// # Errors
///
/// Never errors on the index itself; see [`Context::with_fallback`].
pub fn create_context(device_index: usize) -> Result<Context> {
    Context::with_fallback(device_index)
}
