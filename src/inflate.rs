//! Inflation of batched chat payloads.
//!
//! Chat messages above a size the server considers worth compressing arrive
//! as a single compressed block whose inflated bytes are themselves a run of
//! concatenated protocol messages. Two sub-formats exist, selected by the
//! `version` header field:
//!
//! - version 2: the body starts with a 2-byte sub-header to skip, then a raw
//!   deflate stream (no zlib/gzip container).
//! - version 3: the body is a standard gzip container, no sub-header.
//!
//! The inflated buffer goes back through [`decode_all`](crate::message::decode_all)
//! at the call site; this module only produces bytes. A corrupt stream is a
//! [`DanmakuError::Decompress`] scoped to the one message it came from;
//! sibling messages decoded from the same outer delivery are unaffected.

use std::io::Read;

use flate2::read::{DeflateDecoder, GzDecoder};

use crate::error::DanmakuError;
use crate::message::DanmakuMessage;
use crate::packet::Operation;

/// Bytes of sub-header preceding the deflate stream in version-2 bodies.
const DEFLATE_SUBHEADER_LEN: usize = 2;

/// Whether `message` carries a compressed batch that [`inflate_body`]
/// understands.
#[must_use]
pub fn is_compressed(message: &DanmakuMessage) -> bool {
    message.operation == Operation::Chat && matches!(message.version, 2 | 3)
}

/// Inflate a compressed chat body into its inner message buffer.
pub fn inflate_body(version: u16, body: &[u8]) -> Result<Vec<u8>, DanmakuError> {
    match version {
        2 => {
            if body.len() < DEFLATE_SUBHEADER_LEN {
                return Err(DanmakuError::Decompress(format!(
                    "deflate body too short: {} bytes, need at least {DEFLATE_SUBHEADER_LEN}",
                    body.len()
                )));
            }
            let mut decoder = DeflateDecoder::new(&body[DEFLATE_SUBHEADER_LEN..]);
            let mut inflated = Vec::new();
            decoder
                .read_to_end(&mut inflated)
                .map_err(|e| DanmakuError::Decompress(format!("deflate stream: {e}")))?;
            Ok(inflated)
        }
        3 => {
            let mut decoder = GzDecoder::new(body);
            let mut inflated = Vec::new();
            decoder
                .read_to_end(&mut inflated)
                .map_err(|e| DanmakuError::Decompress(format!("gzip stream: {e}")))?;
            Ok(inflated)
        }
        other => Err(DanmakuError::Decompress(format!(
            "version {other} is not a known compressed format"
        ))),
    }
}
