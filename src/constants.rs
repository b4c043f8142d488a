// MIT License - Copyright (c) 2026 Peter Wright
// Wire constants and lookup tables for the Concord automation protocol

use std::time::Duration;

/// Protocol framing bytes.
pub const MSG_START: u8 = 0x0A; // Line feed, precedes every frame
pub const ACK: u8 = 0x06;
pub const NAK: u8 = 0x15;

/// Fixed serial parameters: 9600 8-O-1.
pub const BAUD_RATE: u32 = 9600;

/// A keypress frame carries fewer than this many key codes.
pub const MAX_KEYPRESS_KEYS: usize = 55;

/// How long we wait for the panel to ACK one of our frames.
pub const ACK_TIMEOUT_INBOUND: Duration = Duration::from_millis(1000);

/// Attempts (first send included) before an outbound frame is abandoned.
pub const MAX_SEND_ATTEMPTS: u32 = 3;

pub const STAR: u8 = 0x0A;
pub const HASH: u8 = 0x0B;
/// Keyfob disarm key, sent by the disarm command.
pub const KEY_DISARM: u8 = 0x20;

/// Keypress codes and their names, in code order.
pub const KEYPRESS_CODES: [(u8, &str); 42] = [
    (0x00, "0"),
    (0x01, "1"),
    (0x02, "2"),
    (0x03, "3"),
    (0x04, "4"),
    (0x05, "5"),
    (0x06, "6"),
    (0x07, "7"),
    (0x08, "8"),
    (0x09, "9"),
    (0x0A, "*"),
    (0x0B, "#"),
    (0x0C, "Police Panic"),
    (0x0D, "Aux. Panic"),
    (0x0E, "Fire Panic"),
    (0x10, "Lights On"),
    (0x11, "Lights Off"),
    (0x12, "Lights Toggle"),
    (0x13, "Keyswitch On"),
    (0x14, "Keyswitch Off"),
    (0x15, "Keyswitch Toggle"),
    (0x1C, "Fire TP - Acknowledge"),
    (0x1D, "Fire TP - Silence"),
    (0x1E, "Fire TP - Fire Test"),
    (0x1F, "Fire TP - Smoke Reset"),
    (0x20, "Keyfob Disarm"),
    (0x21, "Keyfob Arm"),
    (0x22, "Keyfob Lights"),
    (0x23, "Keyfob Star"),
    (0x24, "Keyfob Arm/Disarm"),
    (0x25, "Keyfob Lights/Star"),
    (0x26, "Keyfob Long Lights"),
    (0x27, "Keyfob Direct Arm to Level 3"),
    (0x28, "Keyfob Direct Arm to Level 2"),
    (0x29, "Keyfob Arm/Star"),
    (0x2A, "Keyfob Disarm/Lights"),
    (0x2C, "TP A Key"),
    (0x2D, "TP C Key"),
    (0x2E, "TP E Key"),
    (0x30, "TP B Key"),
    (0x33, "TP D Key"),
    (0x36, "TP F Key"),
];

/// Look up a key name by code.
pub fn keypress_name(code: u8) -> Option<&'static str> {
    KEYPRESS_CODES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// Look up a key code by name (e.g. `"1"`, `"*"`, `"Fire Panic"`).
pub fn keypress_code(name: &str) -> Option<u8> {
    KEYPRESS_CODES
        .iter()
        .find(|(_, n)| *n == name)
        .map(|(code, _)| *code)
}

/// Panel type codes reported by PANEL_TYPE.
pub const PANEL_TYPES: [(u8, &str); 12] = [
    (0x14, "Concord"),
    (0x0B, "Concord Express"),
    (0x1E, "Concord Express 4"),
    (0x0E, "Concord Euro"),
    (0x0D, "Advent Commercial Fire 250"),
    (0x0F, "Advent Home Navigator 132"),
    (0x10, "Advent Commercial Burg 250"),
    (0x11, "Advent Home Navigator 250"),
    (0x15, "Advent Commercial Burg 500"),
    (0x16, "Advent Commercial Fire 500"),
    (0x17, "Advent Commercial Fire 132"),
    (0x18, "Advent Commercial Burg 132"),
];

/// Panel type codes that belong to the Concord family.
pub const PANEL_TYPES_CONCORD: [u8; 4] = [0x14, 0x0B, 0x1E, 0x0E];

pub fn panel_type_name(code: u8) -> Option<&'static str> {
    PANEL_TYPES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// Alarm source types carried in ALARM frames.
pub const ALARM_SOURCE_TYPES: [(u8, &str); 5] = [
    (0, "Bus Device"),
    (1, "Local Phone"),
    (2, "Zone"),
    (3, "System"),
    (4, "Remote Phone"),
];

/// Alarm general types.
pub const ALARM_GENERAL_TYPES: [(u8, &str); 18] = [
    (1, "Alarm"),
    (2, "Alarm Cancel"),
    (3, "Alarm Restoral"),
    (4, "Fire Trouble"),
    (5, "Fire Trouble Restoral"),
    (6, "Non-Fire Trouble"),
    (7, "Non-Fire Trouble Restoral"),
    (8, "Bypass"),
    (9, "Unbypass"),
    (10, "Opening"),
    (11, "Closing"),
    (12, "Partition Configuration Change"),
    (13, "Partition Event"),
    (14, "Partition Test"),
    (15, "System Trouble"),
    (16, "System Trouble Restoral"),
    (17, "System Configuration Change"),
    (18, "System Event"),
];

/// Specific types shared by the alarm, alarm cancel and alarm restoral general types.
pub const ALARM_SPECIFIC_TYPES: [(u8, &str); 7] = [
    (0, "Unspecified"),
    (1, "Fire"),
    (2, "Fire Panic"),
    (3, "Police"),
    (4, "Police Panic"),
    (5, "Auxiliary"),
    (6, "Auxiliary Panic"),
];

/// Resolve `(general, specific)` alarm codes to their names.
///
/// Unrecognized codes come back as `"Unknown"`.
pub fn alarm_type_names(general: u8, specific: u8) -> (&'static str, &'static str) {
    let Some(gen_name) = lookup(&ALARM_GENERAL_TYPES, general) else {
        return ("Unknown", "Unknown");
    };
    let spec_name = match general {
        1..=3 => lookup(&ALARM_SPECIFIC_TYPES, specific).unwrap_or("Unknown"),
        _ => "Unknown",
    };
    (gen_name, spec_name)
}

/// Touchpad display message types.
pub const TOUCHPAD_MSG_TYPES: [(u8, &str); 2] = [(0, "Normal"), (1, "Broadcast")];

/// Named user numbers.
pub const USER_NUMBERS: [(u8, &str); 7] = [
    (246, "System Master Code"),
    (247, "Installer Code"),
    (248, "Dealer Code"),
    (249, "AVM Code"),
    (250, "Quick Arm"),
    (251, "Key Switch Arm"),
    (252, "System"),
];

pub(crate) fn lookup(table: &[(u8, &'static str)], code: u8) -> Option<&'static str> {
    table.iter().find(|(c, _)| *c == code).map(|(_, name)| *name)
}
