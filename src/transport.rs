//! WebSocket transport.
//!
//! Thin wrapper around `tokio-tungstenite` providing type-isolated
//! reader/writer halves. The rest of the crate goes through this module
//! rather than `tokio-tungstenite` directly, so TLS configuration and any
//! future transport tuning live in one place.

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite;

use crate::error::DanmakuError;

/// Concrete WebSocket stream type (avoids repeating the generic everywhere).
type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Received WebSocket message, reduced to what the danmaku protocol uses.
///
/// Ping/pong frames are handled inside the reader and never surface here.
#[derive(Debug)]
pub enum WsMessage {
    /// UTF-8 text frame (diagnostic path, not protocol-parsed).
    Text(String),
    /// Binary frame carrying one or more protocol messages.
    Binary(Vec<u8>),
    /// Close frame with status code and reason.
    Close {
        /// WebSocket close code (1000 = normal, 1005 = no code).
        code: u16,
        /// Human-readable close reason.
        reason: String,
    },
}

/// Write half of a WebSocket connection.
#[derive(Debug)]
pub struct WsWriter {
    sink: futures_util::stream::SplitSink<WsStream, tungstenite::Message>,
}

impl WsWriter {
    /// Send a binary frame.
    pub async fn send_binary(&mut self, data: Vec<u8>) -> Result<(), DanmakuError> {
        self.sink
            .send(tungstenite::Message::Binary(data))
            .await
            .map_err(|e| DanmakuError::Transport(format!("send failed: {e}")))
    }

    /// Flush pending writes and close the sink.
    pub async fn close(&mut self) -> Result<(), DanmakuError> {
        self.sink
            .close()
            .await
            .map_err(|e| DanmakuError::Transport(format!("close failed: {e}")))
    }
}

/// Read half of a WebSocket connection.
#[derive(Debug)]
pub struct WsReader {
    stream: futures_util::stream::SplitStream<WsStream>,
}

impl WsReader {
    /// Receive the next message, returning `None` when the stream ends.
    ///
    /// Ping, pong, and raw frame variants are consumed internally
    /// (tungstenite queues pong replies on its own).
    pub async fn recv(&mut self) -> Option<Result<WsMessage, DanmakuError>> {
        loop {
            match self.stream.next().await {
                Some(Ok(tungstenite::Message::Text(text))) => {
                    return Some(Ok(WsMessage::Text(text.to_string())));
                }
                Some(Ok(tungstenite::Message::Binary(data))) => {
                    return Some(Ok(WsMessage::Binary(data.to_vec())));
                }
                Some(Ok(tungstenite::Message::Close(close_frame))) => {
                    let (code, reason) = close_frame
                        .map(|cf| (cf.code.into(), cf.reason.to_string()))
                        .unwrap_or((1005, String::new()));
                    return Some(Ok(WsMessage::Close { code, reason }));
                }
                Some(Ok(
                    tungstenite::Message::Ping(_)
                    | tungstenite::Message::Pong(_)
                    | tungstenite::Message::Frame(_),
                )) => {
                    continue;
                }
                Some(Err(e)) => {
                    return Some(Err(DanmakuError::Transport(format!("read error: {e}"))));
                }
                None => return None,
            }
        }
    }
}

/// Connect to a WebSocket URL.
///
/// Performs the HTTP upgrade (and TLS negotiation for `wss://`) and returns
/// split (writer, reader) halves for independent use.
pub async fn connect(url: &str) -> Result<(WsWriter, WsReader), DanmakuError> {
    let (ws_stream, _response) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| DanmakuError::Transport(format!("connect to {url} failed: {e}")))?;

    let (sink, stream) = ws_stream.split();

    Ok((WsWriter { sink }, WsReader { stream }))
}
