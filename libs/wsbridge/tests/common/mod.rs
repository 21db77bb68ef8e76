//! Common test utilities for WsBridge integration tests
//!
//! This module provides a scriptable mock WebSocket server, a recording
//! command sink and small polling helpers.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use wsbridge::CommandSink;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

enum ServerCommand {
    Text(String),
    Binary(Vec<u8>),
    Close(u16, String),
    /// Drop the TCP connection without a close handshake
    Drop,
}

#[derive(Default)]
struct ServerLog {
    received: Mutex<Vec<String>>,
    closes: Mutex<Vec<(u16, String)>>,
    clients: Mutex<Vec<mpsc::UnboundedSender<ServerCommand>>>,
    connections: AtomicUsize,
}

/// A mock WebSocket server that records what clients send
pub struct MockWsServer {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
    log: Arc<ServerLog>,
}

impl MockWsServer {
    /// Create and start a new mock WebSocket server
    pub async fn start() -> Self {
        Self::start_with_handshake_delay(Duration::ZERO).await
    }

    /// Start a server that holds every TCP connection for `delay` before
    /// answering the WebSocket handshake
    pub async fn start_with_handshake_delay(delay: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let log = Arc::new(ServerLog::default());

        let shutdown_clone = shutdown.clone();
        let log_clone = log.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let shutdown = shutdown_clone.clone();
                                let log = log_clone.clone();
                                tokio::spawn(async move {
                                    if !delay.is_zero() {
                                        tokio::time::sleep(delay).await;
                                    }
                                    Self::handle_connection(stream, shutdown, log).await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown_clone.notified() => {
                        break;
                    }
                }
            }
        });

        Self { addr, shutdown, log }
    }

    async fn handle_connection(stream: tokio::net::TcpStream, shutdown: Arc<Notify>, log: Arc<ServerLog>) {
        let ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };

        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
        log.clients.lock().push(cmd_tx);
        log.connections.fetch_add(1, Ordering::SeqCst);

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            log.received.lock().push(text);
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let entry = frame
                                .map(|f| (u16::from(f.code), f.reason.into_owned()))
                                .unwrap_or((1005, String::new()));
                            log.closes.lock().push(entry);
                        }
                        Some(Ok(_)) => {}
                        Some(Err(_)) | None => break,
                    }
                }
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(ServerCommand::Text(text)) => {
                            if write.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Some(ServerCommand::Binary(data)) => {
                            if write.send(Message::Binary(data)).await.is_err() {
                                break;
                            }
                        }
                        Some(ServerCommand::Close(code, reason)) => {
                            let frame = CloseFrame {
                                code: CloseCode::from(code),
                                reason: reason.into(),
                            };
                            let _ = write.send(Message::Close(Some(frame))).await;
                        }
                        Some(ServerCommand::Drop) | None => break,
                    }
                }
                _ = shutdown.notified() => {
                    break;
                }
            }
        }
    }

    /// Get the WebSocket URL for this server
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Host part as the bridge expects it, separator included
    pub fn host(&self) -> String {
        format!("ws://{}:", self.addr.ip())
    }

    pub fn port(&self) -> String {
        self.addr.port().to_string()
    }

    /// Text messages received from all clients, in arrival order
    pub fn received(&self) -> Vec<String> {
        self.log.received.lock().clone()
    }

    /// Close frames received from clients
    pub fn closes(&self) -> Vec<(u16, String)> {
        self.log.closes.lock().clone()
    }

    /// Number of accepted WebSocket connections
    pub fn connections(&self) -> usize {
        self.log.connections.load(Ordering::SeqCst)
    }

    /// Send a text message to every connected client
    pub fn broadcast(&self, text: &str) {
        for client in self.log.clients.lock().iter() {
            let _ = client.send(ServerCommand::Text(text.to_string()));
        }
    }

    /// Send a binary frame to every connected client
    pub fn broadcast_binary(&self, data: &[u8]) {
        for client in self.log.clients.lock().iter() {
            let _ = client.send(ServerCommand::Binary(data.to_vec()));
        }
    }

    /// Start a close handshake with every connected client
    pub fn close_all(&self, code: u16, reason: &str) {
        for client in self.log.clients.lock().iter() {
            let _ = client.send(ServerCommand::Close(code, reason.to_string()));
        }
    }

    /// Drop every connection without a close handshake
    pub fn drop_all(&self) {
        for client in self.log.clients.lock().iter() {
            let _ = client.send(ServerCommand::Drop);
        }
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockWsServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Address with nothing listening on it
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Command sink that records every command and the thread it ran on
#[derive(Default)]
pub struct RecordingSink {
    commands: Mutex<Vec<String>>,
    threads: Mutex<Vec<Option<String>>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().clone()
    }

    pub fn threads(&self) -> Vec<Option<String>> {
        self.threads.lock().clone()
    }
}

impl CommandSink for RecordingSink {
    fn dispatch(&self, command: &str) {
        self.commands.lock().push(command.to_string());
        self.threads
            .lock()
            .push(std::thread::current().name().map(str::to_string));
    }
}

/// Poll `condition` every 10ms until it holds or `timeout` passes
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
