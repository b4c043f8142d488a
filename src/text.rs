// MIT License - Copyright (c) 2026 Peter Wright
// Touchpad/zone text token decoding

use tracing::debug;

/// Token that erases the previously emitted character.
pub const TOKEN_BACKSPACE: u8 = 0xFD;

/// Converts the panel's text token stream into display text.
pub trait TextDecoder: Send + Sync {
    fn decode(&self, tokens: &[u8]) -> String;
}

/// Decoder for the single-character token range.
///
/// Word tokens (0x30 and up, other than the control tokens) are not
/// covered and are skipped; plug in a fuller [`TextDecoder`] when the
/// panel's vocabulary is needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenTextDecoder;

impl TokenTextDecoder {
    fn char_for(token: u8) -> Option<char> {
        match token {
            0x00..=0x09 => Some((b'0' + token) as char),
            0x0C => Some('#'),
            0x0D => Some(':'),
            0x0E => Some('/'),
            0x0F => Some('?'),
            0x10 => Some('.'),
            0x11..=0x2A => Some((b'A' + (token - 0x11)) as char),
            0x2B => Some(' '),
            0x2C => Some('\''),
            0x2D => Some('-'),
            0x2E => Some('_'),
            0x2F => Some('*'),
            _ => None,
        }
    }
}

impl TextDecoder for TokenTextDecoder {
    fn decode(&self, tokens: &[u8]) -> String {
        let mut text = String::new();
        for &token in tokens {
            if token == TOKEN_BACKSPACE {
                text.pop();
                continue;
            }
            match Self::char_for(token) {
                Some(c) => text.push(c),
                None => debug!("Skipping text token 0x{:02x}", token),
            }
        }
        text.trim().to_string()
    }
}
