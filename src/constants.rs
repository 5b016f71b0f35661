//! Protocol-wide constants.
//!
//! Centralizes endpoint addressing and timing values so the numbers live in
//! one place with documentation explaining their purpose.

use std::time::Duration;

/// Danmaku broadcast host for all live rooms.
pub const BROADCAST_HOST: &str = "broadcastlv.chat.bilibili.com";

/// Plain (`ws://`) subscription port.
pub const WS_PORT: u16 = 2244;

/// TLS (`wss://`) subscription port.
pub const WSS_PORT: u16 = 2245;

/// Subscription path on the broadcast host.
pub const SUB_PATH: &str = "/sub";

/// Keep-alive interval expected by the server.
///
/// The server drops subscriptions that stay silent; a heartbeat every
/// 30 seconds keeps the room subscription alive without meaningful
/// network overhead.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Fixed sequence number on every outgoing packet.
///
/// The protocol carries a sequence field but performs no request/response
/// correlation with it; the server always sees and sends `1`.
pub const FIXED_SEQUENCE: u32 = 1;
