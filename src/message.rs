//! Inbound protocol messages and the frame decoder.
//!
//! A single WebSocket binary delivery from the broadcast server frequently
//! packs several protocol messages back-to-back. [`decode_all`] walks the
//! buffer eagerly: parse one header at the front, validate the declared
//! length, slice out the body, advance by exactly that length, repeat until
//! the buffer is empty.
//!
//! A declared length that is below the header size or beyond what remains
//! stops decoding at that point. The messages already decoded are kept and
//! the malformed remainder is reported as a [`DanmakuError::Decode`]; the
//! loop can therefore never stall without progress and never index past the
//! end of the buffer.

use crate::codec;
use crate::error::DanmakuError;
use crate::packet::{
    Operation, HEADER_LENGTH, HEADER_OFFSET, OPERATION_OFFSET, PACKET_OFFSET, SEQUENCE_OFFSET,
    VERSION_OFFSET,
};

/// One decoded unit of the wire protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanmakuMessage {
    /// Declared total byte length including the 16-byte header.
    pub packet_length: u32,
    /// Declared header size; the protocol fixes this at 16.
    pub header_length: u16,
    /// Body format: 0 plain text, 1 JSON, 2 deflate block, 3 gzip block.
    pub version: u16,
    /// Operation kind from the header.
    pub operation: Operation,
    /// Sequence field; the server always sends 1.
    pub sequence: u32,
    /// Raw body bytes, `packet_length - header_length` long.
    pub body: Vec<u8>,
}

impl DanmakuMessage {
    /// Body rendered as UTF-8 text, lossily.
    ///
    /// Consumers treat bodies as UTF-8 JSON or text; compressed bodies
    /// (version 2/3) are binary and should go through the decompressor
    /// instead.
    #[must_use]
    pub fn body_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Parse the message at the front of `buffer`.
///
/// Caller guarantees `buffer.len() >= HEADER_LENGTH` and that the declared
/// packet length has been validated against the remaining bytes.
fn parse_first(buffer: &[u8], packet_length: u32) -> DanmakuMessage {
    DanmakuMessage {
        packet_length,
        header_length: codec::get_u16(buffer, HEADER_OFFSET),
        version: codec::get_u16(buffer, VERSION_OFFSET),
        operation: Operation::from_code(codec::get_u32(buffer, OPERATION_OFFSET)),
        sequence: codec::get_u32(buffer, SEQUENCE_OFFSET),
        body: buffer[HEADER_LENGTH..packet_length as usize].to_vec(),
    }
}

/// Decode every message packed into `buffer`, in declaration order.
///
/// Returns the decoded messages together with an error for the trailing
/// region if it was malformed. An empty buffer decodes to `([], None)`.
#[must_use]
pub fn decode_all(buffer: &[u8]) -> (Vec<DanmakuMessage>, Option<DanmakuError>) {
    let mut messages = Vec::new();
    let mut remaining = buffer;

    while !remaining.is_empty() {
        if remaining.len() < HEADER_LENGTH {
            return (
                messages,
                Some(DanmakuError::Decode(format!(
                    "truncated header: {} bytes remaining, need {HEADER_LENGTH}",
                    remaining.len()
                ))),
            );
        }

        let packet_length = codec::get_u32(remaining, PACKET_OFFSET);
        if (packet_length as usize) < HEADER_LENGTH {
            return (
                messages,
                Some(DanmakuError::Decode(format!(
                    "declared packet length {packet_length} below header size {HEADER_LENGTH}"
                ))),
            );
        }
        if packet_length as usize > remaining.len() {
            return (
                messages,
                Some(DanmakuError::Decode(format!(
                    "declared packet length {packet_length} exceeds {} remaining bytes",
                    remaining.len()
                ))),
            );
        }

        messages.push(parse_first(remaining, packet_length));
        // packet_length >= HEADER_LENGTH > 0, so this always makes progress
        remaining = codec::slice_from(remaining, packet_length as usize);
    }

    (messages, None)
}
