//! Connection manager for a danmaku room subscription.
//!
//! [`DanmakuClient`] owns the socket, drives the greeting handshake, wires
//! decoder output to the consumer, and owns the heartbeat scheduler's
//! lifecycle.
//!
//! # Architecture
//!
//! ```text
//! DanmakuClient
//!     │ connect()          opens socket, sends greeting, spawns reader
//!     │
//!     ├── reader task      frames → decode_all → (inflate) → events
//!     │       └── starts HeartbeatScheduler on GreetingAck
//!     │
//!     └── HeartbeatScheduler
//!             └── WriterSink → shared socket writer
//! ```
//!
//! Decoded messages and lifecycle notifications are published on an
//! unbounded channel. [`DanmakuClient::take_events`] hands the receiving end
//! out once; dropping it unsubscribes. A closed consumer never makes the
//! reader task error or block.
//!
//! There is no reconnection policy in this layer. When the server or the
//! network drops the connection, a [`DanmakuEvent::Closed`] is emitted and
//! the client stays idle until the host calls [`DanmakuClient::connect`]
//! again.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::constants::{BROADCAST_HOST, HEARTBEAT_INTERVAL, SUB_PATH, WSS_PORT, WS_PORT};
use crate::error::DanmakuError;
use crate::heartbeat::{HeartbeatScheduler, HeartbeatSink};
use crate::inflate;
use crate::message::{decode_all, DanmakuMessage};
use crate::packet::{greeting_packet, heartbeat_packet, Operation};
use crate::transport::{self, WsMessage, WsWriter};

/// Event published to the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DanmakuEvent {
    /// Socket opened; the greeting is sent right after this.
    Opened,
    /// Raw text delivery, forwarded verbatim (diagnostic path).
    Text(String),
    /// One decoded protocol message. Batched compressed chat blocks are
    /// inflated and emitted as their inner messages.
    Message(DanmakuMessage),
    /// Connection closed by the remote side or the network.
    Closed {
        /// WebSocket close code (1006 when the stream ended without one).
        code: u16,
        /// Close reason supplied by the remote, possibly empty.
        reason: String,
    },
    /// Connection closed by a local `close()` call.
    ClosedByClient,
    /// Decode, decompression, or transport failure. The connection itself
    /// stays up unless the transport also closed it.
    Error(DanmakuError),
}

/// Receiving end of the event channel.
pub type DanmakuEvents = mpsc::UnboundedReceiver<DanmakuEvent>;

/// Heartbeat sink writing through the shared socket writer.
///
/// Sharing the writer behind a mutex serializes heartbeat sends against
/// manual `send()` calls, since the transport forbids concurrent writes on one
/// connection.
#[derive(Debug)]
struct WriterSink {
    writer: Arc<Mutex<WsWriter>>,
}

#[async_trait]
impl HeartbeatSink for WriterSink {
    async fn send_packet(&self, packet: Vec<u8>) {
        if let Err(e) = self.writer.lock().await.send_binary(packet).await {
            log::warn!("Heartbeat send failed: {e}");
        }
    }
}

/// Live state held only while a socket exists.
#[derive(Debug)]
struct Connection {
    writer: Arc<Mutex<WsWriter>>,
    heartbeat: Arc<HeartbeatScheduler>,
    reader_task: JoinHandle<()>,
}

/// Client for one broadcast room subscription.
#[derive(Debug)]
pub struct DanmakuClient {
    room_id: u64,
    uid: u64,
    use_wss: bool,
    endpoint: Option<String>,
    heartbeat_interval: Duration,
    event_tx: mpsc::UnboundedSender<DanmakuEvent>,
    event_rx: Option<DanmakuEvents>,
    conn: Option<Connection>,
}

impl DanmakuClient {
    /// New disconnected client for `room_id`, identifying as viewer `uid`.
    ///
    /// `use_wss` selects TLS and with it the server port (2245 vs 2244).
    #[must_use]
    pub fn new(room_id: u64, uid: u64, use_wss: bool) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            room_id,
            uid,
            use_wss,
            endpoint: None,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            event_tx,
            event_rx: Some(event_rx),
            conn: None,
        }
    }

    /// Override the full WebSocket URL (local brokers, tests).
    #[must_use]
    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    /// Override the keep-alive interval. The production server expects the
    /// default 30 seconds.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Take the event receiver. Returns `None` after the first call.
    ///
    /// Dropping the receiver unsubscribes; events produced afterwards are
    /// discarded.
    pub fn take_events(&mut self) -> Option<DanmakuEvents> {
        self.event_rx.take()
    }

    /// Whether a socket currently exists.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Whether the keep-alive timer is currently active.
    ///
    /// Becomes true once the server acknowledges the greeting, and false
    /// again after [`close`](Self::close) or a remote disconnect (close
    /// frame or bare stream end).
    #[must_use]
    pub fn is_heartbeat_running(&self) -> bool {
        self.conn
            .as_ref()
            .is_some_and(|conn| conn.heartbeat.is_running())
    }

    /// URL this client connects to.
    #[must_use]
    pub fn endpoint_url(&self) -> String {
        self.endpoint.clone().unwrap_or_else(|| {
            let (scheme, port) = if self.use_wss {
                ("wss", WSS_PORT)
            } else {
                ("ws", WS_PORT)
            };
            format!("{scheme}://{BROADCAST_HOST}:{port}{SUB_PATH}")
        })
    }

    /// Open the socket, send the greeting, and start consuming frames.
    ///
    /// Idempotent: when a socket already exists the call is a no-op and the
    /// existing connection is kept.
    pub async fn connect(&mut self) -> Result<(), DanmakuError> {
        if self.conn.is_some() {
            log::debug!("connect() with existing socket, reusing it");
            return Ok(());
        }

        let url = self.endpoint_url();
        log::info!("Connecting to {url} (room {}, uid {})", self.room_id, self.uid);
        let (writer, mut reader) = transport::connect(&url).await?;
        let writer = Arc::new(Mutex::new(writer));

        emit(&self.event_tx, DanmakuEvent::Opened);

        writer
            .lock()
            .await
            .send_binary(greeting_packet(self.uid, self.room_id))
            .await?;
        log::debug!("Greeting sent for room {}", self.room_id);

        let heartbeat = Arc::new(HeartbeatScheduler::new(
            self.heartbeat_interval,
            heartbeat_packet(self.uid, self.room_id),
            Arc::new(WriterSink {
                writer: Arc::clone(&writer),
            }),
        ));

        let event_tx = self.event_tx.clone();
        let task_heartbeat = Arc::clone(&heartbeat);
        let reader_task = tokio::spawn(async move {
            loop {
                match reader.recv().await {
                    Some(Ok(WsMessage::Text(text))) => {
                        emit(&event_tx, DanmakuEvent::Text(text));
                    }
                    Some(Ok(WsMessage::Binary(buffer))) => {
                        handle_binary(&buffer, &event_tx, &task_heartbeat);
                    }
                    Some(Ok(WsMessage::Close { code, reason })) => {
                        log::info!("Remote closed connection: {code} {reason}");
                        task_heartbeat.stop();
                        emit(&event_tx, DanmakuEvent::Closed { code, reason });
                        break;
                    }
                    Some(Err(e)) => {
                        emit(&event_tx, DanmakuEvent::Error(e));
                    }
                    None => {
                        log::info!("Connection stream ended");
                        task_heartbeat.stop();
                        emit(
                            &event_tx,
                            DanmakuEvent::Closed {
                                code: 1006,
                                reason: String::new(),
                            },
                        );
                        break;
                    }
                }
            }
        });

        self.conn = Some(Connection {
            writer,
            heartbeat,
            reader_task,
        });
        Ok(())
    }

    /// Write raw bytes to the socket.
    ///
    /// Serialized against the heartbeat timer through the internal writer
    /// lock. Silently does nothing when no socket exists, and a write
    /// failure is logged rather than returned; this path carries no
    /// success/failure signaling.
    pub async fn send(&self, bytes: Vec<u8>) {
        let Some(conn) = &self.conn else {
            log::debug!("send() without a socket, dropping {} bytes", bytes.len());
            return;
        };
        if let Err(e) = conn.writer.lock().await.send_binary(bytes).await {
            log::warn!("Send failed: {e}");
        }
    }

    /// Stop the heartbeat, close the socket, and emit
    /// [`DanmakuEvent::ClosedByClient`].
    ///
    /// Safe to call when already closed. Afterwards [`connect`](Self::connect)
    /// may be called again.
    pub async fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.heartbeat.stop();
            if let Err(e) = conn.writer.lock().await.close().await {
                log::debug!("Socket close: {e}");
            }
            conn.reader_task.abort();
        }
        emit(&self.event_tx, DanmakuEvent::ClosedByClient);
    }
}

/// Decode one binary delivery and publish the resulting messages.
///
/// Inflation failures and trailing decode errors become [`DanmakuEvent::Error`]s
/// without discarding the sibling messages already decoded.
fn handle_binary(
    buffer: &[u8],
    event_tx: &mpsc::UnboundedSender<DanmakuEvent>,
    heartbeat: &HeartbeatScheduler,
) {
    let (messages, decode_err) = decode_all(buffer);

    for message in messages {
        if inflate::is_compressed(&message) {
            match inflate::inflate_body(message.version, &message.body) {
                Ok(inner) => {
                    let (inner_messages, inner_err) = decode_all(&inner);
                    for inner_message in inner_messages {
                        publish(inner_message, event_tx, heartbeat);
                    }
                    if let Some(err) = inner_err {
                        emit(event_tx, DanmakuEvent::Error(err));
                    }
                }
                Err(err) => {
                    log::warn!("Dropping corrupt compressed chat block: {err}");
                    emit(event_tx, DanmakuEvent::Error(err));
                }
            }
        } else {
            publish(message, event_tx, heartbeat);
        }
    }

    if let Some(err) = decode_err {
        log::warn!("Malformed trailing frame region: {err}");
        emit(event_tx, DanmakuEvent::Error(err));
    }
}

/// Emit one decoded message, starting the heartbeat on the greeting ack.
fn publish(
    message: DanmakuMessage,
    event_tx: &mpsc::UnboundedSender<DanmakuEvent>,
    heartbeat: &HeartbeatScheduler,
) {
    // The greeting ack means the server accepted the subscription; keep-alive
    // starts here, at most once.
    if message.operation == Operation::GreetingAck {
        heartbeat.start();
    }
    emit(event_tx, DanmakuEvent::Message(message));
}

/// Send an event, discarding it if the consumer unsubscribed.
fn emit(event_tx: &mpsc::UnboundedSender<DanmakuEvent>, event: DanmakuEvent) {
    if event_tx.send(event).is_err() {
        log::trace!("Event receiver dropped, discarding event");
    }
}
