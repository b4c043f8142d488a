// MIT License - Copyright (c) 2026 Peter Wright
// Builders for automation-to-panel frames
//
// Every builder returns a frame without its checksum; the engine appends
// it when the frame is queued.

use super::EquipmentCategory;
use crate::codec::num_to_bytes;
use crate::constants::{keypress_name, MAX_KEYPRESS_KEYS};
use crate::error::{ConcordError, Result};

pub fn build_equipment_list(category: EquipmentCategory) -> Vec<u8> {
    match category {
        EquipmentCategory::All => vec![0x02, 0x02],
        other => vec![0x03, 0x02, other.code()],
    }
}

pub fn build_dynamic_data_refresh() -> Vec<u8> {
    vec![0x02, 0x20]
}

/// Keypress frame for `partition`/`area`.
///
/// With `check` set, every code must be a known keypress code.
pub fn build_keypress(keys: &[u8], partition: u8, area: u8, check: bool) -> Result<Vec<u8>> {
    if keys.len() >= MAX_KEYPRESS_KEYS {
        return Err(ConcordError::KeypressTooLong {
            len: keys.len(),
            max: MAX_KEYPRESS_KEYS - 1,
        });
    }
    if check {
        if let Some(&code) = keys.iter().find(|k| keypress_name(**k).is_none()) {
            return Err(ConcordError::InvalidKeyCode { code });
        }
    }
    // Length is bounded above, so this fits a byte
    let mut frame = Vec::with_capacity(keys.len() + 4);
    frame.extend_from_slice(&[4 + keys.len() as u8, 0x40, partition, area]);
    frame.extend_from_slice(keys);
    Ok(frame)
}

/// ALARM frame, as the panel would send it. Used to inject synthetic
/// alarms into the receive path.
pub fn build_alarm_trouble(
    partition: u8,
    source_type: u8,
    source_number: u32,
    general_type: u8,
    specific_type: u8,
    event_data: u16,
) -> Vec<u8> {
    let source = num_to_bytes(source_number);
    let data = event_data.to_be_bytes();
    vec![
        0x0D,
        0x22,
        0x02,
        partition,
        0,
        source_type,
        source[1],
        source[2],
        source[3],
        general_type,
        specific_type,
        data[0],
        data[1],
    ]
}
