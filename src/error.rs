// MIT License - Copyright (c) 2026 Peter Wright
// Error taxonomy for the Concord automation-module engine

use crate::protocol::CommandCode;

/// All errors that can occur in the concord-bridge library.
#[derive(Debug, thiserror::Error)]
pub enum ConcordError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Expected bytes did not arrive within the per-byte deadline, mid-frame.
    #[error("Timeout in the middle of reading a message from the panel")]
    Timeout,

    #[error("Bad ASCII-hex encoding: {details}")]
    BadEncoding { details: String },

    #[error("Bad checksum")]
    BadChecksum,

    /// A decoder's length precondition was violated.
    #[error("Bad message for command {command}: expected {expected} bytes but got {actual}")]
    BadMessage {
        command: CommandCode,
        expected: LengthRule,
        actual: usize,
    },

    #[error("Keypress too long: {len} keys (max {max})")]
    KeypressTooLong { len: usize, max: usize },

    #[error("Unknown key: {key}")]
    UnknownKey { key: String },

    #[error("Invalid keypress code: 0x{code:02X}")]
    InvalidKeyCode { code: u8 },

    #[error("Engine queue closed")]
    ChannelClosed,
}

/// How a decoder constrains the length field of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthRule {
    Exactly(u8),
    AtLeast(u8),
}

impl std::fmt::Display for LengthRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LengthRule::Exactly(n) => write!(f, "exactly {}", n),
            LengthRule::AtLeast(n) => write!(f, "at least {}", n),
        }
    }
}

impl ConcordError {
    /// Whether this error came from the serial link or framing layer.
    ///
    /// The engine answers these with a NAK and keeps looping.
    pub fn is_link_error(&self) -> bool {
        matches!(
            self,
            ConcordError::Io(_)
                | ConcordError::Serial(_)
                | ConcordError::Timeout
                | ConcordError::BadEncoding { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ConcordError>;
