use crate::core::session::{
    ConnectionHandle, Outbound, SocketSession, SHUTDOWN_CLOSE_CODE, SHUTDOWN_CLOSE_REASON,
};
use crate::core::session_state::SessionState;
use crate::traits::BridgeError;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Close code reported when the peer's close frame carries no status
const NO_STATUS_CODE: u16 = 1005;

/// Close code reported when the connection drops mid-handshake
const ABNORMAL_CLOSE_CODE: u16 = 1006;

/// Network driver for one session
///
/// Dials the session's URL, then shuttles frames between the socket and the
/// session until it reaches `Closed` or `Failed`. Events for one session
/// are delivered strictly one after another from this task.
///
/// There is no dial timeout and no reconnection: a session that fails or
/// closes stays down.
///
/// # Arguments
/// * `session` - The session to drive; must be `Connecting`
/// * `shutdown_flag` - Shared running flag; `false` means shutdown has begun
pub async fn run_session(session: Arc<SocketSession>, shutdown_flag: Arc<AtomicBool>) {
    let url = session.spec().url();
    info!("[session {}] Connecting to: {}", session.id(), url);

    let ws_stream = match connect_async(url.as_str()).await {
        Ok((ws_stream, _response)) => ws_stream,
        Err(e) => {
            session.on_connect_failure(e.to_string());
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();

    // No new sessions once shutdown has started. The registry was already
    // closed out, so this socket would never get its shutdown close
    if !shutdown_flag.load(Ordering::Acquire) {
        debug!("[session {}] Shutdown began while dialing, dropping connection", session.id());
        let frame = CloseFrame {
            code: CloseCode::from(SHUTDOWN_CLOSE_CODE),
            reason: SHUTDOWN_CLOSE_REASON.into(),
        };
        let _ = write.send(Message::Close(Some(frame))).await;
        session.on_connect_failure("shutdown began before the connection opened");
        return;
    }

    // The session queues frames here; only this task touches the write half
    let (handle, mut outbound_rx) = ConnectionHandle::channel();
    if !session.on_open(handle) {
        let _ = write.close().await;
        return;
    }

    // Shutdown may have snapshotted the registry just before we joined it
    if !shutdown_flag.load(Ordering::Acquire) {
        session.close();
    }

    message_loop(&session, &mut write, &mut read, &mut outbound_rx).await;
    debug!("[session {}] Driver exiting in state {}", session.id(), session.state());
}

/// Main frame loop for an open session
async fn message_loop(
    session: &Arc<SocketSession>,
    write: &mut SplitSink<WsStream, Message>,
    read: &mut SplitStream<WsStream>,
    outbound_rx: &mut mpsc::UnboundedReceiver<Outbound>,
) {
    // Close frame seen from the peer, reported once the stream ends
    let mut close_frame: Option<(u16, String)> = None;

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        // Dispatch is queued on the scheduler, so this never blocks reads
                        session.on_message(text);
                    }
                    Some(Ok(Message::Binary(data))) => {
                        // Payloads are opaque text; binary frames carry no command
                        debug!("[session {}] Ignoring {} byte binary frame", session.id(), data.len());
                    }
                    Some(Ok(Message::Close(frame))) => {
                        // Peer started the handshake, or answered ours. The stream
                        // ends right after, and `finish` reports this frame
                        let (code, reason) = frame
                            .map(|f| (u16::from(f.code), f.reason.into_owned()))
                            .unwrap_or((NO_STATUS_CODE, String::new()));
                        session.on_closing(code, &reason);
                        close_frame = Some((code, reason));
                    }
                    Some(Ok(_)) => {
                        // Ping/pong frames are answered by tungstenite
                    }
                    Some(Err(e)) => {
                        // Reset, protocol error, or the end of a completed handshake
                        finish(session, close_frame, Some(e.to_string()));
                        return;
                    }
                    None => {
                        finish(session, close_frame, None);
                        return;
                    }
                }
            }

            out = outbound_rx.recv() => {
                match out {
                    Some(Outbound::Text(text)) => {
                        match write.send(Message::Text(text)).await {
                            Ok(()) => session.metrics().increment_sent(),
                            // A send racing our own close is expected, not a failure
                            Err(e) if session.state() == SessionState::Closing => {
                                debug!("[session {}] Dropped message while closing: {}", session.id(), e);
                            }
                            Err(e) => {
                                session.on_failure(BridgeError::RuntimeFailure(format!(
                                    "Failed to send message: {}", e
                                )));
                                return;
                            }
                        }
                    }
                    Some(Outbound::Close { code, reason }) => {
                        // Keep reading: the session ends when the peer's reply arrives
                        let frame = CloseFrame {
                            code: CloseCode::from(code),
                            reason: reason.into(),
                        };
                        if let Err(e) = write.send(Message::Close(Some(frame))).await {
                            debug!("[session {}] Close frame not sent: {}", session.id(), e);
                        }
                    }
                    None => {
                        // Handle released: the session already reached a terminal state
                        debug!("[session {}] Outbound channel closed", session.id());
                        return;
                    }
                }
            }
        }
    }
}

/// Report the end of the inbound stream to the session
///
/// While closing, the end of the stream completes the handshake. While
/// open, it is a transport failure.
fn finish(session: &SocketSession, close_frame: Option<(u16, String)>, error: Option<String>) {
    if session.state() == SessionState::Closing {
        let (code, reason) = close_frame.unwrap_or_else(|| {
            (
                ABNORMAL_CLOSE_CODE,
                error.unwrap_or_else(|| "connection dropped during close".to_string()),
            )
        });
        session.on_closed(code, &reason);
        return;
    }

    let reason = error.unwrap_or_else(|| "stream ended without a close handshake".to_string());
    warn!("[session {}] Connection lost: {}", session.id(), reason);
    session.on_failure(BridgeError::RuntimeFailure(reason));
}
