//! Scheduler Adapter
//!
//! The single synchronization boundary between the network tasks and the host.
//!
//! ```text
//! Network task ──on_message──> run_now(dispatch) ──┐
//! Network task ──on_open────> run_now(burst)    ──┼──> Cooperative context (one thread)
//!                             run_periodic(send) ──┘      runs tasks one at a time
//! ```
//!
//! Anything that touches host-visible state (sending a scheduled message,
//! dispatching a command) goes through this trait instead of running on the
//! network callback.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One-shot unit of work for the cooperative context
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Repeating unit of work
///
/// Returning `ControlFlow::Break(())` unschedules the task.
pub type PeriodicTask = Box<dyn FnMut() -> ControlFlow<()> + Send + 'static>;

/// Capability to run work on the host's cooperative execution context
///
/// Implementations must execute every task on a single context, one at a
/// time, in submission order for immediate tasks. Tasks must never run on
/// the caller's thread concurrently with other tasks.
pub trait Scheduler: Send + Sync + 'static {
    /// Run a task as soon as the context is free
    fn run_now(&self, task: Task);

    /// Run a task after `initial_delay`, then every `interval`
    ///
    /// The task keeps running until it returns `ControlFlow::Break` or the
    /// returned handle is cancelled.
    fn run_periodic(
        &self,
        task: PeriodicTask,
        initial_delay: Duration,
        interval: Duration,
    ) -> PeriodicHandle;
}

/// Cancellation handle for a periodic task
#[derive(Debug, Clone, Default)]
pub struct PeriodicHandle {
    cancelled: Arc<AtomicBool>,
}

impl PeriodicHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the task; it will not run again after its current execution
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
