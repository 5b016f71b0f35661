//! Big-endian byte codec primitives.
//!
//! The danmaku wire protocol stores every header integer big-endian.
//! These helpers read and write at explicit byte offsets, plus buffer
//! concatenation and slicing used by the packet encoder and frame decoder.
//!
//! Offsets are the caller's responsibility: every function here panics on an
//! out-of-range access rather than returning an error. Malformed *lengths
//! declared by the remote* are validated by the frame decoder before it ever
//! touches the codec, so a panic in this module indicates a local bug, not a
//! bad peer.

/// Read a big-endian `u16` at `offset`.
///
/// # Panics
///
/// Panics if `offset + 2 > bytes.len()`.
#[must_use]
pub fn get_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}

/// Read a big-endian `u32` at `offset`.
///
/// # Panics
///
/// Panics if `offset + 4 > bytes.len()`.
#[must_use]
pub fn get_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// Write a big-endian `u16` at `offset`.
///
/// # Panics
///
/// Panics if `offset + 2 > bytes.len()`.
pub fn put_u16(bytes: &mut [u8], offset: usize, value: u16) {
    bytes[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
}

/// Write a big-endian `u32` at `offset`.
///
/// # Panics
///
/// Panics if `offset + 4 > bytes.len()`.
pub fn put_u32(bytes: &mut [u8], offset: usize, value: u32) {
    bytes[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

/// Concatenate an ordered sequence of buffers into one.
#[must_use]
pub fn merge(buffers: &[&[u8]]) -> Vec<u8> {
    let total: usize = buffers.iter().map(|b| b.len()).sum();
    let mut merged = Vec::with_capacity(total);
    for buffer in buffers {
        merged.extend_from_slice(buffer);
    }
    merged
}

/// Sub-slice of `bytes` from `offset` through the end.
///
/// # Panics
///
/// Panics if `offset > bytes.len()`. `offset == bytes.len()` yields an
/// empty slice.
#[must_use]
pub fn slice_from(bytes: &[u8], offset: usize) -> &[u8] {
    &bytes[offset..]
}
