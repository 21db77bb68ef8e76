use crate::core::client::run_session;
use crate::core::dispatcher::CommandDispatcher;
use crate::core::session::{SessionId, SocketSession};
use crate::core::session_state::SessionState;
use crate::core::spec::ConnectionSpec;
use crate::manager::registry::ConnectionRegistry;
use crate::traits::{CommandSink, Scheduler};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Supervisor for every configured endpoint
///
/// Starts one session per [`ConnectionSpec`], each driven by its own tokio
/// task, so a slow or hanging dial never holds up the others. Shutdown
/// asks every open session to close and returns without waiting.
///
/// # Example
/// ```ignore
/// let scheduler = Arc::new(CooperativeScheduler::start("bridge-host")?);
/// let bridge = Bridge::new(scheduler.clone(), Arc::new(StdoutSink));
///
/// bridge.connect_all(config.endpoints);
/// // ...
/// bridge.shutdown();
/// ```
pub struct Bridge {
    registry: Arc<ConnectionRegistry>,
    scheduler: Arc<dyn Scheduler>,
    dispatcher: CommandDispatcher,
    /// Running flag shared with every driver; `false` once shutdown began
    shutdown_flag: Arc<AtomicBool>,
    /// Every session ever started, in any state
    sessions: RwLock<Vec<Arc<SocketSession>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Bridge {
    pub fn new(scheduler: Arc<dyn Scheduler>, sink: Arc<dyn CommandSink>) -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new()),
            scheduler,
            dispatcher: CommandDispatcher::new(sink),
            shutdown_flag: Arc::new(AtomicBool::new(true)),
            sessions: RwLock::new(Vec::new()),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Start a session for `spec`
    ///
    /// Must be called from within a tokio runtime. Returns `None` once
    /// shutdown has begun.
    pub fn connect(&self, spec: ConnectionSpec) -> Option<Arc<SocketSession>> {
        if !self.is_running() {
            warn!("Bridge is shutting down, not connecting to {}", spec.url());
            return None;
        }

        // Ids are list positions, assigned under the write lock
        let mut sessions = self.sessions.write();
        let id: SessionId = sessions.len();
        let session = SocketSession::new(
            id,
            Arc::new(spec),
            Arc::clone(&self.scheduler),
            self.dispatcher.clone(),
            Arc::clone(&self.registry),
        );
        sessions.push(Arc::clone(&session));
        drop(sessions);

        // One task per endpoint: a dial that never answers only stalls itself
        let task = tokio::spawn(run_session(
            Arc::clone(&session),
            Arc::clone(&self.shutdown_flag),
        ));
        self.tasks.lock().push(task);

        Some(session)
    }

    /// Start a session for every spec; returns how many were started
    pub fn connect_all(&self, specs: impl IntoIterator<Item = ConnectionSpec>) -> usize {
        specs
            .into_iter()
            .filter_map(|spec| self.connect(spec))
            .count()
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn sessions(&self) -> Vec<Arc<SocketSession>> {
        self.sessions.read().clone()
    }

    pub fn session(&self, id: SessionId) -> Option<Arc<SocketSession>> {
        self.sessions.read().get(id).cloned()
    }

    /// `(id, url, state)` of every session
    pub fn statuses(&self) -> Vec<(SessionId, String, SessionState)> {
        self.sessions
            .read()
            .iter()
            .map(|s| (s.id(), s.spec().url(), s.state()))
            .collect()
    }

    /// Number of sessions currently open or closing
    pub fn open_count(&self) -> usize {
        self.registry.len()
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.shutdown_flag.load(Ordering::Acquire)
    }

    /// Close every open session with code 1000 "Server stopping"
    ///
    /// Only the first call does anything; it returns the number of sessions
    /// asked to close. Never waits for the peers to acknowledge.
    pub fn shutdown(&self) -> usize {
        // Drivers still dialing see the flag and close their socket themselves
        if !self.shutdown_flag.swap(false, Ordering::AcqRel) {
            debug!("Bridge shutdown already requested");
            return 0;
        }

        info!("Shutting down bridge ({} open sessions)", self.registry.len());
        self.registry.close_all()
    }

    /// Wait until no session is open or closing, up to `timeout`
    ///
    /// Returns whether the registry drained in time.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let check_interval = Duration::from_millis(10);
        let mut elapsed = Duration::ZERO;

        while !self.registry.is_empty() {
            if elapsed >= timeout {
                return false;
            }
            tokio::time::sleep(check_interval).await;
            elapsed += check_interval;
        }
        true
    }

    /// Stop every network driver immediately, releasing their sockets
    pub fn abort_all(&self) {
        // Dropping the socket halves releases the transport without a handshake
        let tasks = std::mem::take(&mut *self.tasks.lock());
        let running = tasks.iter().filter(|t| !t.is_finished()).count();
        for task in tasks {
            task.abort();
        }
        if running > 0 {
            debug!("Aborted {} network tasks", running);
        }
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.abort_all();
    }
}
