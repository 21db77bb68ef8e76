//! Per-endpoint session
//!
//! A [`SocketSession`] owns one connection's state machine. The network
//! driver ([`run_session`](crate::core::client::run_session)) feeds it
//! transport events; the session never touches the socket directly and
//! instead queues [`Outbound`] frames on its [`ConnectionHandle`].
//!
//! Work that has host-visible effects (burst and periodic sends, command
//! dispatch) is handed to the [`Scheduler`] so it runs on the cooperative
//! context, not on the network task that delivered the event.

use crate::core::dispatcher::CommandDispatcher;
use crate::core::session_state::{AtomicMetrics, AtomicSessionState, SessionState};
use crate::core::spec::ConnectionSpec;
use crate::manager::ConnectionRegistry;
use crate::traits::{BridgeError, PeriodicHandle, Scheduler};
use parking_lot::Mutex;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Identifier of a session within one bridge
pub type SessionId = usize;

/// Close code sent to every open session at shutdown
pub const SHUTDOWN_CLOSE_CODE: u16 = 1000;

/// Close reason sent to every open session at shutdown
pub const SHUTDOWN_CLOSE_REASON: &str = "Server stopping";

/// Frame queued for the network driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Close { code: u16, reason: String },
}

/// Write side of a live connection
///
/// Sends are best-effort: nothing acknowledges delivery, and a handle whose
/// driver has gone away silently drops frames.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl ConnectionHandle {
    pub fn new(tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self { tx }
    }

    /// Create a handle together with the receiver the driver drains
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.tx.send(Outbound::Text(text.into())).is_ok()
    }

    pub fn close(&self, code: u16, reason: impl Into<String>) -> bool {
        self.tx
            .send(Outbound::Close {
                code,
                reason: reason.into(),
            })
            .is_ok()
    }
}

/// One managed WebSocket connection and its send/receive behavior
pub struct SocketSession {
    id: SessionId,
    spec: Arc<ConnectionSpec>,
    state: AtomicSessionState,
    handle: Mutex<Option<ConnectionHandle>>,
    periodic: Mutex<Option<PeriodicHandle>>,
    last_error: Mutex<Option<BridgeError>>,
    metrics: AtomicMetrics,
    scheduler: Arc<dyn Scheduler>,
    dispatcher: CommandDispatcher,
    registry: Arc<ConnectionRegistry>,
}

impl SocketSession {
    /// Create a session in `Connecting`
    pub fn new(
        id: SessionId,
        spec: Arc<ConnectionSpec>,
        scheduler: Arc<dyn Scheduler>,
        dispatcher: CommandDispatcher,
        registry: Arc<ConnectionRegistry>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            spec,
            state: AtomicSessionState::new(SessionState::Connecting),
            handle: Mutex::new(None),
            periodic: Mutex::new(None),
            last_error: Mutex::new(None),
            metrics: AtomicMetrics::new(),
            scheduler,
            dispatcher,
            registry,
        })
    }

    #[inline]
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn spec(&self) -> &Arc<ConnectionSpec> {
        &self.spec
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    pub fn metrics(&self) -> &AtomicMetrics {
        &self.metrics
    }

    /// Error that moved the session to `Failed`, if any
    pub fn last_error(&self) -> Option<BridgeError> {
        self.last_error.lock().clone()
    }

    /// The connection is established
    ///
    /// Moves `Connecting → Open`, joins the registry, queues the connect
    /// burst, then schedules the keep-alive send with zero initial delay so
    /// the burst always goes out first. Returns false if the session was
    /// not `Connecting`.
    pub fn on_open(self: &Arc<Self>, handle: ConnectionHandle) -> bool {
        *self.handle.lock() = Some(handle);

        let opened = self.registry.add_with(Arc::clone(self), || {
            self.state
                .transition(&[SessionState::Connecting], SessionState::Open)
                .is_ok()
        });

        if !opened {
            warn!(
                "[session {}] open event ignored in state {}",
                self.id,
                self.state()
            );
            self.handle.lock().take();
            return false;
        }

        info!("[session {}] WebSocket connected to {}", self.id, self.spec.url());

        let session = Arc::downgrade(self);
        self.scheduler.run_now(Box::new(move || {
            if let Some(session) = session.upgrade() {
                session.send_burst();
            }
        }));

        let session = Arc::downgrade(self);
        let job = self.scheduler.run_periodic(
            Box::new(move || match session.upgrade() {
                Some(session) => session.send_periodic(),
                None => ControlFlow::Break(()),
            }),
            Duration::ZERO,
            self.spec.interval(),
        );
        *self.periodic.lock() = Some(job);

        true
    }

    /// A text message arrived
    ///
    /// Dispatch is queued on the scheduler; this returns immediately.
    pub fn on_message(self: &Arc<Self>, text: String) {
        self.metrics.increment_received();
        info!("[session {}] Received message: {}", self.id, text);

        if self.state().is_terminal() {
            debug!("[session {}] message after {}, not dispatching", self.id, self.state());
            return;
        }

        let session = Arc::clone(self);
        self.scheduler.run_now(Box::new(move || {
            let count = session
                .dispatcher
                .execute(session.spec.command_templates(), &text);
            session.metrics.add_dispatched(count as u64);
        }));
    }

    /// The initial handshake failed
    pub fn on_connect_failure(&self, reason: impl Into<String>) {
        let reason = reason.into();
        error!(
            "[session {}] Failed to connect to {}: {}",
            self.id,
            self.spec.url(),
            reason
        );
        self.fail(BridgeError::ConnectFailure(reason));
    }

    /// The transport failed
    ///
    /// Moves `Connecting | Open → Failed` and leaves the registry.
    pub fn on_failure(&self, error: BridgeError) {
        error!("[session {}] WebSocket failure: {}", self.id, error);
        self.fail(error);
    }

    /// The peer started the close handshake
    ///
    /// Moves `Open → Closing` and echoes the same code and reason back.
    ///
    /// When the session is already `Closing` this is the peer acknowledging
    /// our own close, so nothing is sent.
    pub fn on_closing(&self, code: u16, reason: &str) {
        info!("[session {}] WebSocket closing: {} ({})", self.id, reason, code);

        match self
            .state
            .transition(&[SessionState::Open, SessionState::Closing], SessionState::Closing)
        {
            Ok(SessionState::Open) => {
                self.cancel_periodic();
                if let Some(handle) = self.handle.lock().as_ref() {
                    handle.close(code, reason);
                }
            }
            Ok(_) => {
                debug!("[session {}] close acknowledged by peer", self.id);
            }
            Err(actual) => {
                debug!("[session {}] closing event ignored in state {}", self.id, actual);
            }
        }
    }

    /// The close handshake completed
    ///
    /// Moves to `Closed` and leaves the registry. Idempotent.
    pub fn on_closed(&self, code: u16, reason: &str) {
        let closed = self.registry.remove_with(self.id, || {
            self.state
                .transition(&[SessionState::Open, SessionState::Closing], SessionState::Closed)
                .is_ok()
        });

        if closed {
            info!("[session {}] WebSocket closed: {} ({})", self.id, reason, code);
            self.release();
        }
    }

    /// Request a graceful close for shutdown
    ///
    /// Sends code 1000 "Server stopping" if the session is `Open`. Any other
    /// state is a no-op. Returns whether a close was requested.
    pub fn close(&self) -> bool {
        if self
            .state
            .transition(&[SessionState::Open], SessionState::Closing)
            .is_err()
        {
            return false;
        }

        info!("[session {}] Closing connection to {}", self.id, self.spec.url());
        self.cancel_periodic();
        if let Some(handle) = self.handle.lock().as_ref() {
            handle.close(SHUTDOWN_CLOSE_CODE, SHUTDOWN_CLOSE_REASON);
        }
        true
    }

    fn fail(&self, error: BridgeError) {
        let failed = self.registry.remove_with(self.id, || {
            self.state
                .transition(&[SessionState::Connecting, SessionState::Open], SessionState::Failed)
                .is_ok()
        });

        if failed {
            *self.last_error.lock() = Some(error);
            self.release();
        } else {
            debug!("[session {}] failure ignored in state {}", self.id, self.state());
        }
    }

    fn send_burst(&self) {
        if !self.state.is_open() {
            debug!("[session {}] no longer open, skipping connect burst", self.id);
            return;
        }

        for message in self.spec.on_connect_messages() {
            self.send_text(message);
        }
        debug!(
            "[session {}] Sent {} connect messages",
            self.id,
            self.spec.on_connect_messages().len()
        );
    }

    fn send_periodic(&self) -> ControlFlow<()> {
        if !self.state.is_open() {
            debug!("[session {}] no longer open, stopping periodic send", self.id);
            return ControlFlow::Break(());
        }

        self.send_text(self.spec.periodic_message());
        ControlFlow::Continue(())
    }

    fn send_text(&self, text: &str) {
        let queued = self
            .handle
            .lock()
            .as_ref()
            .is_some_and(|handle| handle.send_text(text));

        if !queued {
            debug!("[session {}] connection gone, dropped outbound message", self.id);
        }
    }

    fn cancel_periodic(&self) {
        if let Some(job) = self.periodic.lock().take() {
            job.cancel();
        }
    }

    fn release(&self) {
        self.cancel_periodic();
        self.handle.lock().take();
    }
}

impl std::fmt::Debug for SocketSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketSession")
            .field("id", &self.id)
            .field("url", &self.spec.url())
            .field("state", &self.state())
            .finish()
    }
}
