// MIT License - Copyright (c) 2026 Peter Wright
// Zone records populated by ZONE_DATA and ZONE_STATUS

use bitflags::bitflags;
use serde::Serialize;

bitflags! {
    /// Zone state bits as reported in ZONE_DATA and ZONE_STATUS.
    ///
    /// An empty set means the zone is normal.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
    #[serde(transparent)]
    pub struct ZoneState: u8 {
        /// Bit 0 - Tripped
        const TRIPPED  = 0x01;
        /// Bit 1 - Faulted
        const FAULTED  = 0x02;
        /// Bit 2 - Alarm
        const ALARM    = 0x04;
        /// Bit 3 - Trouble
        const TROUBLE  = 0x08;
        /// Bit 4 - Bypassed
        const BYPASSED = 0x10;
    }
}

const ZONE_STATE_LABELS: [(ZoneState, &str); 5] = [
    (ZoneState::TRIPPED, "Tripped"),
    (ZoneState::FAULTED, "Faulted"),
    (ZoneState::ALARM, "Alarm"),
    (ZoneState::TROUBLE, "Trouble"),
    (ZoneState::BYPASSED, "Bypassed"),
];

impl ZoneState {
    /// Decode the raw state byte. Reserved bits are dropped.
    pub fn from_code(code: u8) -> Self {
        Self::from_bits_truncate(code)
    }

    /// Ordered state labels; `["Normal"]` when no bit is set.
    pub fn labels(&self) -> Vec<&'static str> {
        if self.is_empty() {
            return vec!["Normal"];
        }
        ZONE_STATE_LABELS
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, label)| *label)
            .collect()
    }
}

/// Zone wiring type (Concord panels only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ZoneType {
    Hardwired,
    Rf,
    RfTouchpad,
    Other(u8),
}

impl ZoneType {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Hardwired,
            1 => Self::Rf,
            2 => Self::RfTouchpad,
            other => Self::Other(other),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Hardwired => "Hardwired",
            Self::Rf => "RF",
            Self::RfTouchpad => "RF Touchpad",
            Self::Other(_) => "Unknown",
        }
    }
}

/// Composite zone identity. Zone numbers are only unique within a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ZoneKey {
    pub partition_number: u8,
    pub zone_number: u16,
}

impl ZoneKey {
    pub fn new(partition_number: u8, zone_number: u16) -> Self {
        Self {
            partition_number,
            zone_number,
        }
    }
}

/// A single alarm zone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Zone {
    pub partition_number: u8,
    pub area_number: u8,
    /// Unknown until the first ZONE_DATA.
    pub group_number: Option<u8>,
    pub zone_number: u16,
    /// Unknown until the first ZONE_DATA.
    pub zone_type: Option<ZoneType>,
    pub zone_state: ZoneState,
    pub zone_text: String,
    pub zone_text_tokens: Vec<u8>,
}

impl Zone {
    /// Placeholder record for a zone first seen through ZONE_STATUS.
    pub fn stub(partition_number: u8, area_number: u8, zone_number: u16) -> Self {
        Self {
            partition_number,
            area_number,
            group_number: None,
            zone_number,
            zone_type: None,
            zone_state: ZoneState::empty(),
            zone_text: String::new(),
            zone_text_tokens: Vec::new(),
        }
    }

    pub fn key(&self) -> ZoneKey {
        ZoneKey::new(self.partition_number, self.zone_number)
    }

    /// Replace the state, returning the bits that changed.
    pub fn update_state(&mut self, state: ZoneState) -> ZoneState {
        let changed = self.zone_state ^ state;
        self.zone_state = state;
        changed
    }

    // Convenience accessors
    pub fn is_normal(&self) -> bool { self.zone_state.is_empty() }
    pub fn is_tripped(&self) -> bool { self.zone_state.contains(ZoneState::TRIPPED) }
    pub fn is_faulted(&self) -> bool { self.zone_state.contains(ZoneState::FAULTED) }
    pub fn is_alarm(&self) -> bool { self.zone_state.contains(ZoneState::ALARM) }
    pub fn is_trouble(&self) -> bool { self.zone_state.contains(ZoneState::TROUBLE) }
    pub fn is_bypassed(&self) -> bool { self.zone_state.contains(ZoneState::BYPASSED) }
}
