//! Memory-mapped register window.
//!
//! An 8 KiB byte buffer with three reserved regions: the command trigger
//! register at offset 0, the response-ready flag at offset 1, and the
//! response area at `0x1000`. Every access is bounds-checked; out-of-range
//! reads return zero, out-of-range writes are dropped, and both log a
//! warning instead of faulting the host.

use crate::command::{CommandId, CommandParams, CommandReply, ErrorCode};
use crate::dispatch::Dispatcher;
use tracing::{debug, warn};

/// Length of the mapped window in bytes.
pub const WINDOW_LEN: usize = 0x2000;

/// Suggested guest-physical base address for hosts mapping the window.
pub const WINDOW_BASE: u32 = 0x1500_0000;

/// Offset of the 4-byte command trigger register.
pub const TRIGGER_OFFSET: usize = 0x0;

/// Offset of the response-ready flag byte.
pub const READY_FLAG_OFFSET: usize = 0x1;

/// Offset of the 4-byte big-endian response length.
pub const RESPONSE_LEN_OFFSET: usize = 0x1000;

/// Offset of the first response payload byte.
pub const RESPONSE_PAYLOAD_OFFSET: usize = 0x1004;

/// Width of a register access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessSize {
    /// 1 byte.
    Byte,
    /// 2 bytes, big-endian.
    Half,
    /// 4 bytes, big-endian.
    Word,
}

impl AccessSize {
    /// Access width in bytes.
    #[must_use]
    pub fn len(self) -> usize {
        match self {
            Self::Byte => 1,
            Self::Half => 2,
            Self::Word => 4,
        }
    }
}

/// The register window and its trigger decoding.
pub struct RegisterBridge {
    buffer: Vec<u8>,
    dispatcher: Dispatcher,
}

impl RegisterBridge {
    /// Creates a zeroed window bound to `dispatcher`.
    #[must_use]
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            buffer: vec![0; WINDOW_LEN],
            dispatcher,
        }
    }

    /// Reads a big-endian integer of the given width. Out-of-range reads
    /// return 0.
    #[must_use]
    pub fn read(&self, offset: usize, size: AccessSize) -> u32 {
        let len = size.len();
        let Some(bytes) = self.checked_range(offset, len, "read") else {
            return 0;
        };
        bytes.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b))
    }

    /// Copies `len` raw bytes out of the window. Out-of-range reads return
    /// an empty vector.
    #[must_use]
    pub fn read_block(&self, offset: usize, len: usize) -> Vec<u8> {
        match self.checked_range(offset, len, "read_block") {
            Some(bytes) => bytes.to_vec(),
            None => Vec::new(),
        }
    }

    /// Writes a big-endian integer of the given width. A 4-byte write at
    /// offset 0 additionally fires the command trigger. Out-of-range
    /// writes are dropped.
    pub fn write(&mut self, offset: usize, value: u32, size: AccessSize) {
        let len = size.len();
        if !self.check_bounds(offset, len, "write") {
            return;
        }
        for i in 0..len {
            let shift = 8 * (len - 1 - i);
            self.buffer[offset + i] = (value >> shift) as u8;
        }
        if offset == TRIGGER_OFFSET && size == AccessSize::Word {
            self.trigger(value);
        }
    }

    /// Copies raw bytes into the window, clipping at the window end.
    pub fn write_block(&mut self, offset: usize, bytes: &[u8]) {
        if offset >= WINDOW_LEN {
            warn!(offset, len = bytes.len(), "write_block out of range");
            return;
        }
        let available = WINDOW_LEN - offset;
        let take = bytes.len().min(available);
        if take < bytes.len() {
            warn!(
                offset,
                len = bytes.len(),
                clipped = take,
                "write_block clipped at window end"
            );
        }
        self.buffer[offset..offset + take].copy_from_slice(&bytes[..take]);
    }

    /// Returns the response bytes and clears the ready flag, or `None`
    /// when no unread response is pending.
    pub fn take_response(&mut self) -> Option<Vec<u8>> {
        if self.buffer[READY_FLAG_OFFSET] != 1 {
            return None;
        }
        self.buffer[READY_FLAG_OFFSET] = 0;
        let len = self.read(RESPONSE_LEN_OFFSET, AccessSize::Word) as usize;
        let max = WINDOW_LEN - RESPONSE_PAYLOAD_OFFSET;
        Some(self.read_block(RESPONSE_PAYLOAD_OFFSET, len.min(max)))
    }

    /// Decodes and runs a trigger word: top byte = command id, low 24 bits
    /// = parameter pointer.
    fn trigger(&mut self, word: u32) {
        let raw_id = (word >> 24) as u8;
        let pointer = (word & 0x00ff_ffff) as usize;
        let payload = self.parameter_payload(pointer);

        let params = match CommandId::from_raw(raw_id) {
            Some(id) => CommandParams::decode(id, payload.as_deref()),
            None => CommandParams::None,
        };

        debug!(raw_id, pointer, "command trigger");
        let reply = self.dispatcher.dispatch(raw_id, params);
        self.publish(&reply);
    }

    /// Extracts the length-prefixed parameter payload, if the pointer and
    /// prefix are valid.
    fn parameter_payload(&self, pointer: usize) -> Option<Vec<u8>> {
        if pointer < 4 || pointer + 4 > WINDOW_LEN {
            return None;
        }
        let plen = self.read(pointer, AccessSize::Word) as usize;
        if plen == 0 || pointer + 4 + plen > WINDOW_LEN {
            return None;
        }
        Some(self.buffer[pointer + 4..pointer + 4 + plen].to_vec())
    }

    /// Serializes `reply` into the response area and raises the ready
    /// flag. Oversized payloads are truncated at the window end.
    fn publish(&mut self, reply: &CommandReply) {
        let bytes = match reply.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "reply failed to encode");
                match CommandReply::error(ErrorCode::Internal).encode() {
                    Ok(bytes) => bytes,
                    Err(_) => Vec::new(),
                }
            }
        };

        let max = WINDOW_LEN - RESPONSE_PAYLOAD_OFFSET;
        let take = bytes.len().min(max);
        if take < bytes.len() {
            warn!(len = bytes.len(), clipped = take, "response truncated");
        }

        let len_bytes = (take as u32).to_be_bytes();
        self.buffer[RESPONSE_LEN_OFFSET..RESPONSE_LEN_OFFSET + 4].copy_from_slice(&len_bytes);
        self.buffer[RESPONSE_PAYLOAD_OFFSET..RESPONSE_PAYLOAD_OFFSET + take]
            .copy_from_slice(&bytes[..take]);
        self.buffer[READY_FLAG_OFFSET] = 1;
    }

    fn checked_range(&self, offset: usize, len: usize, what: &str) -> Option<&[u8]> {
        if self.check_bounds(offset, len, what) {
            Some(&self.buffer[offset..offset + len])
        } else {
            None
        }
    }

    fn check_bounds(&self, offset: usize, len: usize, what: &str) -> bool {
        let end = offset.checked_add(len);
        match end {
            Some(end) if end <= WINDOW_LEN => true,
            _ => {
                warn!(offset, len, "{what} out of range");
                false
            }
        }
    }
}
