//! Error types for the danmaku client.
//!
//! One enum covers the three failure domains of the protocol core: frame
//! decoding, payload inflation, and the underlying transport. Unrecognized
//! operation codes are deliberately *not* an error: the protocol grows new
//! codes over time and the client carries them through as
//! [`Operation::Unknown`](crate::packet::Operation::Unknown).
//!
//! Nothing in this crate retries on error: no reconnect, no resend. Every
//! error is surfaced to the consumer exactly once, as an event.

/// Errors surfaced by the protocol core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DanmakuError {
    /// Malformed or truncated frame header/length. Scoped to the remainder
    /// of the buffer it was found in; messages decoded before it are
    /// unaffected.
    Decode(String),
    /// Corrupt compressed chat body. Scoped to that single message.
    Decompress(String),
    /// Underlying socket failure (DNS, TCP reset, TLS). Forwarded verbatim;
    /// the connection stays open unless the transport itself closed it.
    Transport(String),
}

impl std::fmt::Display for DanmakuError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decode(msg) => write!(f, "Frame decode error: {msg}"),
            Self::Decompress(msg) => write!(f, "Decompression error: {msg}"),
            Self::Transport(msg) => write!(f, "Transport error: {msg}"),
        }
    }
}

impl std::error::Error for DanmakuError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_detail() {
        let err = DanmakuError::Decode("declared length 3 below header size".into());
        assert!(err.to_string().contains("declared length 3"));
    }
}
