// MIT License - Copyright (c) 2026 Peter Wright
// Framing layer over the half-duplex serial link

pub mod loopback;
pub mod serial;

use tracing::trace;

use crate::codec::{encode_hex, hex_pair};
use crate::constants::{ACK, MSG_START, NAK};
use crate::error::{ConcordError, Result};

pub use loopback::{LoopbackHandle, LoopbackLink};
pub use serial::SerialPortLink;

/// Byte-level access to the serial line.
///
/// `read_byte` blocks for at most the link's per-byte deadline and returns
/// `Ok(None)` when nothing arrived in time.
pub trait SerialLink: Send {
    /// Whether at least one byte is ready to be read without waiting.
    fn bytes_waiting(&mut self) -> Result<bool>;

    fn read_byte(&mut self) -> Result<Option<u8>>;

    fn write_all(&mut self, data: &[u8]) -> Result<()>;

    fn close(&mut self) -> Result<()>;
}

impl SerialLink for Box<dyn SerialLink> {
    fn bytes_waiting(&mut self) -> Result<bool> {
        (**self).bytes_waiting()
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        (**self).read_byte()
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        (**self).write_all(data)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// Single-byte control signals that may appear anywhere outside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlByte {
    Ack,
    Nak,
}

impl ControlByte {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            ACK => Some(Self::Ack),
            NAK => Some(Self::Nak),
            _ => None,
        }
    }

    pub fn as_byte(&self) -> u8 {
        match self {
            Self::Ack => ACK,
            Self::Nak => NAK,
        }
    }
}

/// Frames and unframes messages on a [`SerialLink`].
///
/// Never validates checksums or looks at command codes. Control bytes seen
/// while reading are queued in encounter order; the owner drains them with
/// [`Transport::take_control_bytes`] after each read call.
pub struct Transport<L: SerialLink> {
    link: L,
    controls: Vec<ControlByte>,
}

impl<L: SerialLink> Transport<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            controls: Vec::new(),
        }
    }

    /// Cheap check used to avoid waiting on a quiet line.
    pub fn message_chars_maybe_available(&mut self) -> Result<bool> {
        self.link.bytes_waiting()
    }

    /// Consume bytes until the message-start character.
    ///
    /// Returns `false` if the line went quiet first. Control bytes are
    /// queued; anything else is discarded.
    pub fn wait_for_message_start(&mut self) -> Result<bool> {
        loop {
            match self.link.read_byte()? {
                None => return Ok(false),
                Some(MSG_START) => return Ok(true),
                Some(b) => {
                    if let Some(cc) = ControlByte::from_byte(b) {
                        self.controls.push(cc);
                    } else {
                        trace!("Discarding byte 0x{:02x} outside frame", b);
                    }
                }
            }
        }
    }

    /// Read the frame following a message-start character.
    ///
    /// The returned bytes start with the length byte and end with the
    /// (unvalidated) checksum. A length of zero yields a one-byte frame.
    pub fn read_next_message(&mut self) -> Result<Vec<u8>> {
        let mut controls = Vec::new();
        let result = self.read_frame(&mut controls);
        self.controls.extend(controls);
        result
    }

    fn read_frame(&mut self, controls: &mut Vec<ControlByte>) -> Result<Vec<u8>> {
        let len_chars = self.read_chars(2, controls)?;
        let len = hex_pair(len_chars[0], len_chars[1]).map_err(|_| ConcordError::BadEncoding {
            details: format!(
                "invalid length encoding 0x{:02x} 0x{:02x}",
                len_chars[0], len_chars[1]
            ),
        })?;

        let body = self.read_chars(usize::from(len) * 2, controls)?;
        let mut frame = Vec::with_capacity(usize::from(len) + 1);
        frame.push(len);
        for pair in body.chunks(2) {
            let b = hex_pair(pair[0], pair[1]).map_err(|_| ConcordError::BadEncoding {
                details: format!(
                    "invalid message encoding {:?}",
                    String::from_utf8_lossy(&body)
                ),
            })?;
            frame.push(b);
        }
        Ok(frame)
    }

    /// Read `n` message characters, setting aside control bytes.
    fn read_chars(&mut self, n: usize, controls: &mut Vec<ControlByte>) -> Result<Vec<u8>> {
        let mut chars = Vec::with_capacity(n);
        while chars.len() < n {
            let b = self.link.read_byte()?.ok_or(ConcordError::Timeout)?;
            match ControlByte::from_byte(b) {
                Some(cc) => controls.push(cc),
                None => chars.push(b),
            }
        }
        Ok(chars)
    }

    /// Control bytes seen since the last call, in encounter order.
    pub fn take_control_bytes(&mut self) -> Vec<ControlByte> {
        std::mem::take(&mut self.controls)
    }

    /// Write a checksummed binary frame, preceded by the message-start character.
    pub fn write_message(&mut self, frame: &[u8]) -> Result<()> {
        let mut wire = Vec::with_capacity(frame.len() * 2 + 1);
        wire.push(MSG_START);
        wire.extend_from_slice(encode_hex(frame).as_bytes());
        self.link.write_all(&wire)
    }

    pub fn send_control(&mut self, cc: ControlByte) -> Result<()> {
        self.link.write_all(&[cc.as_byte()])
    }

    pub fn close(&mut self) -> Result<()> {
        self.link.close()
    }
}
