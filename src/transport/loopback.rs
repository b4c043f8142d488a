// MIT License - Copyright (c) 2026 Peter Wright
// In-memory link for tests, demos and running without hardware

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{ControlByte, SerialLink};
use crate::codec::{append_checksum, encode_hex};
use crate::constants::MSG_START;
use crate::error::Result;

#[derive(Debug, Default)]
struct Wire {
    inbound: VecDeque<u8>,
    outbound: Vec<u8>,
    closed: bool,
}

fn lock(wire: &Mutex<Wire>) -> MutexGuard<'_, Wire> {
    // A panic while holding the lock cannot leave the buffers inconsistent.
    wire.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Link end owned by the engine. Reads never block: an empty inbound
/// buffer behaves like a per-byte timeout.
#[derive(Debug)]
pub struct LoopbackLink {
    wire: Arc<Mutex<Wire>>,
}

/// The "panel" end of a [`LoopbackLink`].
#[derive(Debug, Clone)]
pub struct LoopbackHandle {
    wire: Arc<Mutex<Wire>>,
}

impl LoopbackLink {
    pub fn new() -> (Self, LoopbackHandle) {
        let wire = Arc::new(Mutex::new(Wire::default()));
        (
            Self { wire: wire.clone() },
            LoopbackHandle { wire },
        )
    }
}

impl SerialLink for LoopbackLink {
    fn bytes_waiting(&mut self) -> Result<bool> {
        Ok(!lock(&self.wire).inbound.is_empty())
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        Ok(lock(&self.wire).inbound.pop_front())
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        lock(&self.wire).outbound.extend_from_slice(data);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        lock(&self.wire).closed = true;
        Ok(())
    }
}

impl LoopbackHandle {
    /// Queue raw bytes for the engine to read.
    pub fn push_bytes(&self, bytes: &[u8]) {
        lock(&self.wire).inbound.extend(bytes.iter().copied());
    }

    /// Queue a binary frame (length byte onward) with its checksum appended,
    /// framed and hex-encoded the way the panel sends it.
    pub fn push_frame(&self, frame: &[u8]) {
        let mut frame = frame.to_vec();
        append_checksum(&mut frame);
        self.push_raw_frame(&frame);
    }

    /// Queue a frame exactly as given, checksum included.
    pub fn push_raw_frame(&self, frame: &[u8]) {
        let mut wire = vec![MSG_START];
        wire.extend_from_slice(encode_hex(frame).as_bytes());
        self.push_bytes(&wire);
    }

    pub fn push_control(&self, cc: ControlByte) {
        self.push_bytes(&[cc.as_byte()]);
    }

    /// Everything the engine has written since the last call.
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut lock(&self.wire).outbound)
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.wire).closed
    }
}
