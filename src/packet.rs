//! Outgoing packet encoder and operation codes.
//!
//! Every danmaku packet is a 16-byte big-endian header followed by a UTF-8
//! body. The header layout (offsets in bytes):
//!
//! ```text
//! 0   u32  packet_length   header + body
//! 4   u16  header_length   always 16
//! 6   u16  version         0 text, 1 JSON, 2 deflate block, 3 gzip block
//! 8   u32  operation       see Operation
//! 12  u32  sequence        always 1, no correlation
//! 16  ..   body
//! ```
//!
//! The two packets this client ever sends, the greeting that subscribes a
//! room and the periodic heartbeat, share the same JSON body shape
//! `{"uid":…,"roomid":…}`.

use crate::codec;
use crate::constants::FIXED_SEQUENCE;

/// Fixed header size in bytes.
pub const HEADER_LENGTH: usize = 16;
/// Byte offset of `packet_length`.
pub const PACKET_OFFSET: usize = 0;
/// Byte offset of `header_length`.
pub const HEADER_OFFSET: usize = 4;
/// Byte offset of `version`.
pub const VERSION_OFFSET: usize = 6;
/// Byte offset of `operation`.
pub const OPERATION_OFFSET: usize = 8;
/// Byte offset of `sequence`.
pub const SEQUENCE_OFFSET: usize = 12;

/// Operation kind carried in the packet header.
///
/// Codes the server may introduce later decode to [`Operation::Unknown`]
/// and flow through unchanged rather than erroring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Client keep-alive request.
    HeartbeatRequest,
    /// Server acknowledgment of a heartbeat.
    HeartbeatAck,
    /// Chat/gift/notice event from the server.
    Chat,
    /// Client room-subscription request.
    GreetingRequest,
    /// Server acknowledgment of the greeting; heartbeats start here.
    GreetingAck,
    /// Operation code this client does not recognize.
    Unknown(u32),
}

impl Operation {
    /// Decode a wire operation code.
    #[must_use]
    pub fn from_code(code: u32) -> Self {
        match code {
            2 => Self::HeartbeatRequest,
            3 => Self::HeartbeatAck,
            5 => Self::Chat,
            7 => Self::GreetingRequest,
            8 => Self::GreetingAck,
            other => Self::Unknown(other),
        }
    }

    /// Wire code for this operation.
    #[must_use]
    pub fn code(self) -> u32 {
        match self {
            Self::HeartbeatRequest => 2,
            Self::HeartbeatAck => 3,
            Self::Chat => 5,
            Self::GreetingRequest => 7,
            Self::GreetingAck => 8,
            Self::Unknown(other) => other,
        }
    }
}

/// Build a packet from header fields and a UTF-8 body.
///
/// Always succeeds: `packet_length` is derived from the body, and the body
/// is taken as already valid UTF-8 (`&str`).
#[must_use]
pub fn build_packet(version: u16, operation: Operation, sequence: u32, body: &str) -> Vec<u8> {
    let body_bytes = body.as_bytes();
    let mut header = [0u8; HEADER_LENGTH];
    codec::put_u32(&mut header, PACKET_OFFSET, (HEADER_LENGTH + body_bytes.len()) as u32);
    codec::put_u16(&mut header, HEADER_OFFSET, HEADER_LENGTH as u16);
    codec::put_u16(&mut header, VERSION_OFFSET, version);
    codec::put_u32(&mut header, OPERATION_OFFSET, operation.code());
    codec::put_u32(&mut header, SEQUENCE_OFFSET, sequence);
    codec::merge(&[&header, body_bytes])
}

/// JSON body shared by the greeting and heartbeat packets.
fn handshake_body(uid: u64, room_id: u64) -> String {
    serde_json::json!({ "uid": uid, "roomid": room_id }).to_string()
}

/// Greeting packet subscribing `uid` to `room_id`.
#[must_use]
pub fn greeting_packet(uid: u64, room_id: u64) -> Vec<u8> {
    build_packet(
        1,
        Operation::GreetingRequest,
        FIXED_SEQUENCE,
        &handshake_body(uid, room_id),
    )
}

/// Keep-alive packet for `uid` in `room_id`.
#[must_use]
pub fn heartbeat_packet(uid: u64, room_id: u64) -> Vec<u8> {
    build_packet(
        1,
        Operation::HeartbeatRequest,
        FIXED_SEQUENCE,
        &handshake_body(uid, room_id),
    )
}
