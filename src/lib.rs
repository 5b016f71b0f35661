//! bili-danmaku: client for the Bilibili live danmaku protocol.
//!
//! Danmaku rooms speak a binary-framed message protocol over a persistent
//! WebSocket: subscribe with a greeting packet, keep the subscription alive
//! with a 30-second heartbeat, and receive chat/gift/notice events, often
//! several packed into one delivery and sometimes batched inside a
//! compressed block.
//!
//! # Architecture
//!
//! - [`codec`] - big-endian integer and buffer primitives
//! - [`packet`] - outgoing packet encoder (greeting, heartbeat)
//! - [`message`] - frame decoder over multi-message buffers
//! - [`inflate`] - deflate/gzip inflation of batched chat payloads
//! - [`heartbeat`] - keep-alive scheduler
//! - [`transport`] - tokio-tungstenite wrapper (split writer/reader)
//! - [`client`] - connection manager tying it all together
//!
//! # Usage
//!
//! ```ignore
//! let mut client = DanmakuClient::new(room_id, uid, true);
//! let mut events = client.take_events().expect("first take");
//! client.connect().await?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         DanmakuEvent::Message(msg) => println!("{}", msg.body_text()),
//!         DanmakuEvent::Closed { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```
//!
//! This crate logs through the [`log`] facade and configures no backend;
//! reconnection policy is deliberately left to the host application.

pub mod client;
pub mod codec;
pub mod constants;
pub mod error;
pub mod heartbeat;
pub mod inflate;
pub mod message;
pub mod packet;
pub mod transport;

// Re-export commonly used types
pub use client::{DanmakuClient, DanmakuEvent, DanmakuEvents};
pub use error::DanmakuError;
pub use message::DanmakuMessage;
pub use packet::Operation;
