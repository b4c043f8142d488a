// MIT License - Copyright (c) 2026 Peter Wright
// Panel identity and panel-wide status

use std::collections::BTreeMap;

use bitflags::bitflags;
use serde::Serialize;

use crate::constants::{panel_type_name, PANEL_TYPES_CONCORD};

bitflags! {
    /// Per-partition feature state reported by FEAT_STATE.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
    #[serde(transparent)]
    pub struct FeatureState: u8 {
        const CHIME         = 0x01;
        const ENERGY_SAVER  = 0x02;
        const NO_DELAY      = 0x04;
        const LATCHKEY      = 0x08;
        const SILENT_ARMING = 0x10;
        const QUICK_ARM     = 0x20;
    }
}

const FEATURE_LABELS: [(FeatureState, &str); 6] = [
    (FeatureState::CHIME, "Chime"),
    (FeatureState::ENERGY_SAVER, "Energy saver"),
    (FeatureState::NO_DELAY, "No delay"),
    (FeatureState::LATCHKEY, "Latchkey"),
    (FeatureState::SILENT_ARMING, "Silent arming"),
    (FeatureState::QUICK_ARM, "Quick arm"),
];

impl FeatureState {
    pub fn labels(&self) -> Vec<&'static str> {
        FEATURE_LABELS
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, label)| *label)
            .collect()
    }
}

/// Panel identity reported by PANEL_TYPE.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelInfo {
    pub panel_type_code: u8,
    pub panel_type: String,
    pub is_concord: bool,
    pub hardware_revision: u16,
    pub software_revision: u16,
    pub serial_number: u32,
}

impl PanelInfo {
    pub fn new(
        panel_type_code: u8,
        hardware_revision: u16,
        software_revision: u16,
        serial_number: u32,
    ) -> Self {
        let panel_type = match panel_type_name(panel_type_code) {
            Some(name) => name.to_string(),
            None => format!("Unknown Panel Type 0x{:02x}", panel_type_code),
        };
        Self {
            panel_type_code,
            panel_type,
            is_concord: PANEL_TYPES_CONCORD.contains(&panel_type_code),
            hardware_revision,
            software_revision,
            serial_number,
        }
    }
}

/// Panel-wide status owned by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PanelStatus {
    pub info: Option<PanelInfo>,
    /// Latest feature state per partition number.
    pub feature_states: BTreeMap<u8, FeatureState>,
    /// Times the panel reported its automation buffer overflowed.
    pub events_lost: u32,
    /// Times the panel asked us to discard our image of its state.
    pub image_clears: u32,
    /// Set when an equipment list response has been fully received.
    pub equipment_list_complete: bool,
}
