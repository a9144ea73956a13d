//! Duplex connection client.
//!
//! # Lifecycle
//!
//! ```text
//! 1. Connection::new(connect_timeout, close_timeout)
//! 2. connection.connect(addr)          ← idempotent while Open
//!       └─ spawns the single background receive loop
//! 3. connection.take_events()          ← exactly one subscriber
//! 4. connection.send_binary / send_text
//! 5. connection.disconnect()           ← close handshake, bounded wait
//! ```
//!
//! The receive loop never reconnects on its own: a mid-stream failure marks
//! the connection `Faulted`, emits [`TransportEvent::Error`] and ends.
//! Reconnection is an explicit decision by the session owner.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use vigil_core::{ConnectionState, InboundMessage, TransportError};

use crate::reassembly::Reassembler;
use crate::wire::{read_frame, write_frame, Opcode, WireFrame};

/// Inbound events surfaced by the receive loop, in receipt order.
#[derive(Debug)]
pub enum TransportEvent {
    /// One complete reassembled logical message.
    Message(InboundMessage),
    /// The peer closed the connection normally (close frame echoed).
    Closed,
    /// Mid-stream I/O failure; the receive loop has ended.
    Error(TransportError),
}

const EVENT_CHANNEL_CAPACITY: usize = 64;

// ── Connection ────────────────────────────────────────────────────────────────

/// Handle to the single duplex channel. Cheap to clone — all clones share
/// one underlying connection.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<ConnectionState>,
    writer: tokio::sync::Mutex<Option<OwnedWriteHalf>>,
    events: Mutex<Option<mpsc::Receiver<TransportEvent>>>,
    recv_task: Mutex<Option<JoinHandle<()>>>,
    connect_timeout: Duration,
    close_timeout: Duration,
}

impl Connection {
    pub fn new(connect_timeout: Duration, close_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(ConnectionState::Disconnected),
                writer: tokio::sync::Mutex::new(None),
                events: Mutex::new(None),
                recv_task: Mutex::new(None),
                connect_timeout,
                close_timeout,
            }),
        }
    }

    /// Current lifecycle state snapshot.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock().unwrap()
    }

    /// Take the inbound event stream. Returns `Some` exactly once per
    /// connect; one active subscriber per connection instance.
    pub fn take_events(&self) -> Option<mpsc::Receiver<TransportEvent>> {
        self.inner.events.lock().unwrap().take()
    }

    // ── Connect ───────────────────────────────────────────────────────────────

    /// Open the duplex channel and start the receive loop.
    ///
    /// A no-op while already `Open`; fails with `AlreadyConnecting` if a
    /// second attempt races an in-flight one.
    pub async fn connect(&self, addr: &str) -> Result<(), TransportError> {
        {
            let mut state = self.inner.state.lock().unwrap();
            match *state {
                ConnectionState::Open => {
                    debug!("connect() while already open; ignored");
                    return Ok(());
                }
                ConnectionState::Connecting => return Err(TransportError::AlreadyConnecting),
                _ => *state = ConnectionState::Connecting,
            }
        }

        // Clear leftovers from a previous life of this handle before dialing.
        if let Some(task) = self.inner.recv_task.lock().unwrap().take() {
            task.abort();
        }
        *self.inner.writer.lock().await = None;
        *self.inner.events.lock().unwrap() = None;

        let stream = match timeout(self.inner.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                *self.inner.state.lock().unwrap() = ConnectionState::Disconnected;
                return Err(TransportError::ConnectFailed { reason: e.to_string() });
            }
            Err(_) => {
                *self.inner.state.lock().unwrap() = ConnectionState::Disconnected;
                return Err(TransportError::Timeout {
                    ms: self.inner.connect_timeout.as_millis() as u64,
                });
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            *self.inner.state.lock().unwrap() = ConnectionState::Disconnected;
            return Err(TransportError::Io(e));
        }

        let (read_half, write_half) = stream.into_split();
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        *self.inner.writer.lock().await = Some(write_half);
        *self.inner.events.lock().unwrap() = Some(event_rx);

        let cancelled = {
            let mut state = self.inner.state.lock().unwrap();
            if *state == ConnectionState::Connecting {
                *state = ConnectionState::Open;
                false
            } else {
                true
            }
        };
        if cancelled {
            // disconnect() raced the dial; drop the fresh socket.
            *self.inner.writer.lock().await = None;
            *self.inner.events.lock().unwrap() = None;
            return Err(TransportError::ConnectFailed {
                reason: "connection attempt cancelled".to_owned(),
            });
        }

        let task = tokio::spawn(recv_loop(read_half, event_tx, Arc::clone(&self.inner)));
        *self.inner.recv_task.lock().unwrap() = Some(task);

        info!("Connected to {addr}");
        Ok(())
    }

    // ── Send ──────────────────────────────────────────────────────────────────

    /// Send one complete binary message (an encoded frame payload).
    pub async fn send_binary(&self, payload: Bytes) -> Result<(), TransportError> {
        self.send_data(WireFrame::binary(payload)).await
    }

    /// Send one complete text message (a control payload).
    pub async fn send_text(&self, text: &str) -> Result<(), TransportError> {
        self.send_data(WireFrame::text(text)).await
    }

    async fn send_data(&self, frame: WireFrame) -> Result<(), TransportError> {
        if !self.state().is_open() {
            return Err(TransportError::NotConnected);
        }
        // The writer lock serializes concurrent sends so a message is
        // always written whole, never interleaved with another.
        let mut writer = self.inner.writer.lock().await;
        let stream = writer.as_mut().ok_or(TransportError::NotConnected)?;
        write_frame(stream, &frame).await
    }

    // ── Disconnect ────────────────────────────────────────────────────────────

    /// Graceful close: send a close frame, wait (bounded) for the receive
    /// loop to observe the peer's echo, then release the socket. The socket
    /// is released on every exit path (success, timeout, or error).
    pub async fn disconnect(&self) -> Result<(), TransportError> {
        {
            let mut state = self.inner.state.lock().unwrap();
            match *state {
                ConnectionState::Open => *state = ConnectionState::Closing,
                _ => {
                    drop(state);
                    self.release().await;
                    return Ok(());
                }
            }
        }

        {
            let mut writer = self.inner.writer.lock().await;
            if let Some(stream) = writer.as_mut() {
                if let Err(e) = write_frame(stream, &WireFrame::close()).await {
                    debug!("Close frame not delivered: {e}");
                }
            }
        }

        let task = self.inner.recv_task.lock().unwrap().take();
        if let Some(mut task) = task {
            if timeout(self.inner.close_timeout, &mut task).await.is_err() {
                warn!(
                    "Peer did not acknowledge close within {}ms; forcing release",
                    self.inner.close_timeout.as_millis()
                );
                task.abort();
            }
        }

        self.release().await;
        info!("Disconnected");
        Ok(())
    }

    /// Drop the socket halves and any stale receive loop, exactly once per
    /// teardown, and settle the state in `Closed`.
    async fn release(&self) {
        if let Some(task) = self.inner.recv_task.lock().unwrap().take() {
            task.abort();
        }
        *self.inner.writer.lock().await = None;
        *self.inner.events.lock().unwrap() = None;
        *self.inner.state.lock().unwrap() = ConnectionState::Closed;
    }
}

// ── Background receive loop ───────────────────────────────────────────────────

async fn recv_loop(
    mut reader: OwnedReadHalf,
    events: mpsc::Sender<TransportEvent>,
    inner: Arc<Inner>,
) {
    // Owned by this loop: dropped with it, so a connection closing
    // mid-message cannot leak partial state into a later connection.
    let mut reassembler = Reassembler::new();

    loop {
        match read_frame(&mut reader).await {
            Ok(frame) if frame.opcode == Opcode::Close => {
                let we_initiated =
                    matches!(*inner.state.lock().unwrap(), ConnectionState::Closing);
                if we_initiated {
                    debug!("Peer acknowledged close");
                } else {
                    info!("Close received from peer; ending cleanly");
                    let mut writer = inner.writer.lock().await;
                    if let Some(stream) = writer.as_mut() {
                        if let Err(e) = write_frame(stream, &WireFrame::close()).await {
                            debug!("Close echo not delivered: {e}");
                        }
                    }
                    drop(writer);
                    *inner.state.lock().unwrap() = ConnectionState::Closed;
                    let _ = events.send(TransportEvent::Closed).await;
                }
                return;
            }
            Ok(frame) => match reassembler.push(frame) {
                Ok(Some(message)) => {
                    if events.send(TransportEvent::Message(message)).await.is_err() {
                        debug!("Event subscriber gone; ending receive loop");
                        return;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    fault(&inner, &events, e).await;
                    return;
                }
            },
            Err(e) => {
                // A read failure while we are closing just means the peer
                // dropped without echoing. Not a fault.
                let closing = matches!(
                    *inner.state.lock().unwrap(),
                    ConnectionState::Closing | ConnectionState::Closed
                );
                if closing {
                    debug!("Receive loop ended during close: {e}");
                } else {
                    fault(&inner, &events, e).await;
                }
                return;
            }
        }
    }
}

async fn fault(inner: &Inner, events: &mpsc::Sender<TransportEvent>, err: TransportError) {
    warn!("Receive failed: {err}");
    *inner.state.lock().unwrap() = ConnectionState::Faulted;
    let _ = events.send(TransportEvent::Error(err)).await;
}
