//! Scheduler implementations
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   run_now / run_periodic   ┌──────────────────────────┐
//! │ Network task │ ─────> Unbounded Channel ─>│ Cooperative thread       │
//! │ (tokio)      │                            │  1. run due periodic jobs│
//! └──────────────┘                            │  2. wait for next job or │
//! ┌──────────────┐                            │     next deadline        │
//! │ Network task │ ─────────────────────────> │  3. run job, repeat      │
//! └──────────────┘                            └──────────────────────────┘
//! ```
//!
//! [`CooperativeScheduler`] is the production context: one dedicated OS
//! thread, so dispatch and scheduled sends never overlap.
//! [`ManualScheduler`] is a synchronous fake driven by a virtual clock.

use crate::traits::{BridgeError, PeriodicHandle, PeriodicTask, Result, Scheduler, Task};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::ops::ControlFlow;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Smallest period accepted; a zero interval would spin the context
const MIN_INTERVAL: Duration = Duration::from_millis(1);

enum Job {
    Now(Task),
    Periodic {
        task: PeriodicTask,
        initial_delay: Duration,
        interval: Duration,
        handle: PeriodicHandle,
    },
    Shutdown,
}

struct Timer {
    task: PeriodicTask,
    next_due: Instant,
    interval: Duration,
    handle: PeriodicHandle,
}

/// Single-threaded cooperative execution context
///
/// Periodic registrations travel through the same channel as immediate
/// tasks, so a task submitted before a periodic job with zero delay always
/// runs first.
pub struct CooperativeScheduler {
    name: String,
    job_tx: Sender<Job>,
    thread: Mutex<Option<JoinHandle<()>>>,
    running: AtomicBool,
}

impl CooperativeScheduler {
    /// Spawn the context thread
    pub fn start(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let (job_tx, job_rx) = unbounded();

        let thread = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || host_loop(job_rx))
            .map_err(|e| BridgeError::Scheduler(format!("Failed to spawn scheduler thread: {}", e)))?;

        info!("Cooperative scheduler '{}' started", name);

        Ok(Self {
            name,
            job_tx,
            thread: Mutex::new(Some(thread)),
            running: AtomicBool::new(true),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop the context after the tasks already queued, then join it
    ///
    /// Periodic jobs are dropped. Idempotent. Safe to call from a task
    /// running on the context itself, in which case it does not join.
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }

        let _ = self.job_tx.send(Job::Shutdown);

        let Some(handle) = self.thread.lock().take() else {
            return;
        };

        if handle.thread().id() == std::thread::current().id() {
            debug!("Scheduler '{}' shut down from its own thread", self.name);
            return;
        }

        if handle.join().is_err() {
            warn!("Scheduler thread '{}' panicked", self.name);
        }
        info!("Cooperative scheduler '{}' stopped", self.name);
    }

    fn submit(&self, job: Job) {
        if !self.is_running() {
            debug!("Scheduler '{}' is stopped, dropping task", self.name);
            return;
        }
        if let Err(e) = self.job_tx.send(job) {
            let err = BridgeError::ChannelSend(e.to_string());
            debug!("Scheduler '{}' dropping task: {}", self.name, err);
        }
    }
}

impl Scheduler for CooperativeScheduler {
    fn run_now(&self, task: Task) {
        self.submit(Job::Now(task));
    }

    fn run_periodic(
        &self,
        task: PeriodicTask,
        initial_delay: Duration,
        interval: Duration,
    ) -> PeriodicHandle {
        let handle = PeriodicHandle::new();
        self.submit(Job::Periodic {
            task,
            initial_delay,
            interval: interval.max(MIN_INTERVAL),
            handle: handle.clone(),
        });
        handle
    }
}

impl Drop for CooperativeScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Body of the context thread
fn host_loop(job_rx: Receiver<Job>) {
    let mut timers: Vec<Timer> = Vec::new();

    loop {
        run_due_timers(&mut timers);

        let job = match timers.iter().map(|t| t.next_due).min() {
            Some(deadline) => match job_rx.recv_deadline(deadline) {
                Ok(job) => job,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match job_rx.recv() {
                Ok(job) => job,
                Err(_) => break,
            },
        };

        match job {
            Job::Now(task) => {
                if catch_unwind(AssertUnwindSafe(task)).is_err() {
                    error!("Scheduled task panicked");
                }
            }
            Job::Periodic {
                task,
                initial_delay,
                interval,
                handle,
            } => {
                timers.push(Timer {
                    task,
                    next_due: Instant::now() + initial_delay,
                    interval,
                    handle,
                });
            }
            Job::Shutdown => break,
        }
    }

    debug!("Scheduler loop exiting ({} periodic jobs dropped)", timers.len());
}

fn run_due_timers(timers: &mut Vec<Timer>) {
    let now = Instant::now();

    timers.retain_mut(|timer| {
        if timer.handle.is_cancelled() {
            return false;
        }
        if timer.next_due > now {
            return true;
        }

        match catch_unwind(AssertUnwindSafe(&mut timer.task)) {
            Ok(ControlFlow::Continue(())) => {}
            Ok(ControlFlow::Break(())) => return false,
            Err(_) => {
                error!("Periodic task panicked, unscheduling it");
                return false;
            }
        }

        // Skip missed ticks rather than bursting to catch up; measured after
        // the task returns so a slow execution does not count as a tick
        let finished = Instant::now();
        timer.next_due += timer.interval;
        if timer.next_due <= finished {
            timer.next_due = finished + timer.interval;
        }

        !timer.handle.is_cancelled()
    });
}

struct ManualTimer {
    seq: u64,
    task: PeriodicTask,
    next_due: Duration,
    interval: Duration,
    handle: PeriodicHandle,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    queue: VecDeque<Task>,
    timers: Vec<ManualTimer>,
    next_seq: u64,
}

/// Deterministic scheduler for tests
///
/// Nothing runs until [`run_pending`](Self::run_pending) or
/// [`advance`](Self::advance) is called, and both run every task on the
/// calling thread. Time only moves through `advance`.
///
/// ```ignore
/// let scheduler = ManualScheduler::new();
/// scheduler.run_periodic(task, Duration::ZERO, Duration::from_millis(250));
///
/// scheduler.run_pending();                       // fires at t=0
/// scheduler.advance(Duration::from_millis(500)); // fires at t=250 and t=500
/// ```
#[derive(Default)]
pub struct ManualScheduler {
    state: Mutex<ManualState>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since creation
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// Immediate tasks waiting to run
    pub fn pending_tasks(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Periodic jobs still scheduled
    pub fn active_periodic(&self) -> usize {
        self.state
            .lock()
            .timers
            .iter()
            .filter(|t| !t.handle.is_cancelled())
            .count()
    }

    /// Run queued tasks and every periodic job due at the current time
    ///
    /// Tasks submitted while running are run too. Returns the number of
    /// executions.
    pub fn run_pending(&self) -> usize {
        let mut executed = 0;

        loop {
            let task = self.state.lock().queue.pop_front();
            if let Some(task) = task {
                task();
                executed += 1;
                continue;
            }

            let Some(mut timer) = self.take_due_timer() else {
                break;
            };

            executed += 1;
            let flow = (timer.task)();
            if flow.is_continue() && !timer.handle.is_cancelled() {
                timer.next_due += timer.interval;
                self.state.lock().timers.push(timer);
            }
        }

        executed
    }

    /// Move the virtual clock forward, firing every job that comes due
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.state.lock().now + by;
        let mut executed = self.run_pending();

        loop {
            let next_due = {
                let state = self.state.lock();
                state
                    .timers
                    .iter()
                    .filter(|t| !t.handle.is_cancelled())
                    .map(|t| t.next_due)
                    .min()
            };

            match next_due {
                Some(due) if due <= target => {
                    {
                        let mut state = self.state.lock();
                        state.now = state.now.max(due);
                    }
                    executed += self.run_pending();
                }
                _ => break,
            }
        }

        self.state.lock().now = target;
        executed + self.run_pending()
    }

    fn take_due_timer(&self) -> Option<ManualTimer> {
        let mut state = self.state.lock();
        state.timers.retain(|t| !t.handle.is_cancelled());

        let now = state.now;
        let index = state
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.next_due <= now)
            .min_by_key(|(_, t)| (t.next_due, t.seq))
            .map(|(i, _)| i)?;

        Some(state.timers.remove(index))
    }
}

impl Scheduler for ManualScheduler {
    fn run_now(&self, task: Task) {
        self.state.lock().queue.push_back(task);
    }

    fn run_periodic(
        &self,
        task: PeriodicTask,
        initial_delay: Duration,
        interval: Duration,
    ) -> PeriodicHandle {
        let handle = PeriodicHandle::new();
        let mut state = self.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;

        let next_due = state.now + initial_delay;
        state.timers.push(ManualTimer {
            seq,
            task,
            next_due,
            interval: interval.max(MIN_INTERVAL),
            handle: handle.clone(),
        });
        handle
    }
}
