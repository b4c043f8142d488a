// MIT License - Copyright (c) 2026 Peter Wright
// Decoders for panel-to-automation frames

use chrono::Utc;
use serde::Serialize;

use super::{Action, CommandCode};
use crate::codec::{bcd_decode, bytes_to_num};
use crate::config::EngineConfig;
use crate::constants::{alarm_type_names, lookup, ALARM_SOURCE_TYPES, TOUCHPAD_MSG_TYPES};
use crate::devices::{
    ArmingLevel, DisplayMessage, FeatureState, PanelInfo, User, UserInfo, UserRole, Zone,
    ZoneState, ZoneType,
};
use crate::error::{ConcordError, LengthRule, Result};
use crate::state::StateStore;
use crate::text::TextDecoder;

/// Everything a decoder may read or mutate.
pub struct DecodeContext<'a> {
    pub state: &'a mut StateStore,
    pub text: &'a dyn TextDecoder,
    pub config: &'a EngineConfig,
}

/// Outcome of decoding one frame.
///
/// `message` is `None` when the command was recognized but produced no
/// caller-visible event; handlers only run when it is `Some`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decoded {
    pub message: Option<PanelMessage>,
    pub action: Option<Action>,
}

impl Decoded {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn message(message: PanelMessage) -> Self {
        Self {
            message: Some(message),
            action: None,
        }
    }

    fn with_action(mut self, action: Option<Action>) -> Self {
        self.action = action;
        self
    }
}

/// A decoded panel event, as delivered to handlers and subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PanelMessage {
    PanelType(PanelInfo),
    ZoneData(Zone),
    PartitionData {
        partition_number: u8,
        area_number: u8,
        arming_level: ArmingLevel,
        arming_level_code: u8,
        arming_level_text: &'static str,
        partition_text: String,
    },
    EquipmentListComplete,
    UserData(User),
    ZoneStatus {
        partition_number: u8,
        area_number: u8,
        zone_number: u16,
        zone_state: ZoneState,
    },
    ArmLevel {
        partition_number: u8,
        area_number: u8,
        user: UserInfo,
        arming_level: ArmingLevel,
        arming_level_code: u8,
        arming_level_text: &'static str,
    },
    Alarm(AlarmEvent),
    Delay(DelayEvent),
    Touchpad(DisplayMessage),
    FeatureState {
        partition_number: u8,
        area_number: u8,
        feature_state: FeatureState,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlarmEvent {
    pub partition_number: u8,
    pub area_number: u8,
    pub source_type_code: u8,
    pub source_type: &'static str,
    pub source_number: u32,
    pub general_type_code: u8,
    pub general_type: &'static str,
    pub specific_type_code: u8,
    pub specific_type: &'static str,
    pub event_specific_data: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DelayLength {
    Standard,
    Extended,
    TwiceExtended,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DelayEvent {
    pub partition_number: u8,
    pub area_number: u8,
    pub length: DelayLength,
    pub is_exit: bool,
    pub is_end: bool,
    pub delay_seconds: u16,
}

impl DelayEvent {
    /// Human-readable flag list, e.g. `["extended", "exit delay", "start delay"]`.
    pub fn labels(&self) -> Vec<&'static str> {
        let mut v = Vec::with_capacity(3);
        match self.length {
            DelayLength::Standard => v.push("standard"),
            DelayLength::Extended => v.push("extended"),
            DelayLength::TwiceExtended => v.push("twice extended"),
            DelayLength::Unknown => {}
        }
        v.push(if self.is_exit { "exit delay" } else { "entry delay" });
        v.push(if self.is_end { "end delay" } else { "start delay" });
        v
    }
}

/// Check the frame's length field rule. `frame` includes the length byte
/// and the checksum, so its size is the length value plus one.
fn check_len(frame: &[u8], command: CommandCode, expected: LengthRule) -> Result<()> {
    let actual = frame.len().saturating_sub(1);
    let ok = match expected {
        LengthRule::Exactly(n) => actual == usize::from(n),
        LengthRule::AtLeast(n) => actual >= usize::from(n),
    };
    if ok {
        Ok(())
    } else {
        Err(ConcordError::BadMessage {
            command,
            expected,
            actual,
        })
    }
}

/// Bytes between `start` and the checksum, or nothing if the frame ends first.
fn text_tokens(frame: &[u8], start: usize) -> &[u8] {
    let end = frame.len().saturating_sub(1);
    if end > start {
        &frame[start..end]
    } else {
        &[]
    }
}

fn be16(hi: u8, lo: u8) -> u16 {
    (u16::from(hi) << 8) | u16::from(lo)
}

pub(crate) fn panel_type(ctx: &mut DecodeContext<'_>, m: &[u8]) -> Result<Decoded> {
    check_len(m, CommandCode::Single(0x01), LengthRule::Exactly(0x0B))?;
    let info = PanelInfo::new(
        m[2],
        be16(m[3], m[4]),
        be16(m[5], m[6]),
        bytes_to_num(&m[7..11]),
    );
    ctx.state.panel.info = Some(info.clone());
    Ok(Decoded::message(PanelMessage::PanelType(info)))
}

fn image_refresh_action(ctx: &DecodeContext<'_>) -> Option<Action> {
    ctx.config.refresh_on_image_loss.then_some(Action::RefreshImage)
}

/// The panel's automation buffer overflowed and events were dropped.
pub(crate) fn event_lost(ctx: &mut DecodeContext<'_>, _m: &[u8]) -> Result<Decoded> {
    ctx.state.panel.events_lost += 1;
    Ok(Decoded::empty().with_action(image_refresh_action(ctx)))
}

/// Sent on panel power-up, after a link failure is restored, and on leaving
/// programming mode. Our image of the panel is stale from here on.
pub(crate) fn clear_image(ctx: &mut DecodeContext<'_>, _m: &[u8]) -> Result<Decoded> {
    ctx.state.panel.image_clears += 1;
    ctx.state.panel.equipment_list_complete = false;
    Ok(Decoded::empty().with_action(image_refresh_action(ctx)))
}

pub(crate) fn zone_data(ctx: &mut DecodeContext<'_>, m: &[u8]) -> Result<Decoded> {
    check_len(m, CommandCode::Single(0x03), LengthRule::AtLeast(0x09))?;
    let tokens = text_tokens(m, 9);
    let zone = Zone {
        partition_number: m[2],
        area_number: m[3],
        group_number: Some(m[4]),
        zone_number: be16(m[5], m[6]),
        zone_type: Some(ZoneType::from_code(m[7])),
        zone_state: ZoneState::from_code(m[8]),
        zone_text: ctx.text.decode(tokens),
        zone_text_tokens: tokens.to_vec(),
    };
    ctx.state.apply_zone_data(zone.clone());
    Ok(Decoded::message(PanelMessage::ZoneData(zone)))
}

pub(crate) fn partition_data(ctx: &mut DecodeContext<'_>, m: &[u8]) -> Result<Decoded> {
    check_len(m, CommandCode::Single(0x04), LengthRule::AtLeast(0x05))?;
    let (partition_number, area_number) = (m[2], m[3]);
    let arming_level = ArmingLevel::from_code(m[4]);
    let partition_text = ctx.text.decode(text_tokens(m, 5));
    ctx.state.apply_partition_data(
        partition_number,
        area_number,
        arming_level,
        partition_text.clone(),
    );
    Ok(Decoded::message(PanelMessage::PartitionData {
        partition_number,
        area_number,
        arming_level,
        arming_level_code: m[4],
        arming_level_text: arming_level.partition_label(),
        partition_text,
    }))
}

pub(crate) fn equipment_list_done(ctx: &mut DecodeContext<'_>, _m: &[u8]) -> Result<Decoded> {
    ctx.state.panel.equipment_list_complete = true;
    Ok(Decoded::message(PanelMessage::EquipmentListComplete))
}

pub(crate) fn user_data(ctx: &mut DecodeContext<'_>, m: &[u8]) -> Result<Decoded> {
    check_len(m, CommandCode::Single(0x09), LengthRule::AtLeast(0x04))?;
    // The code is two BCD bytes after the user number and a reserved byte
    let user_code = (m.len() >= 8).then(|| format!("{:04}", bcd_decode(&m[5..7])));
    let user = User {
        user_number: be16(m[2], m[3]),
        user_code,
    };
    ctx.state.apply_user(user.clone());
    Ok(Decoded::message(PanelMessage::UserData(user)))
}

pub(crate) fn zone_status(ctx: &mut DecodeContext<'_>, m: &[u8]) -> Result<Decoded> {
    check_len(m, CommandCode::Single(0x21), LengthRule::Exactly(0x07))?;
    let (partition_number, area_number) = (m[2], m[3]);
    let zone_number = be16(m[4], m[5]);
    let zone_state = ZoneState::from_code(m[6]);
    ctx.state
        .apply_zone_status(partition_number, area_number, zone_number, zone_state);
    Ok(Decoded::message(PanelMessage::ZoneStatus {
        partition_number,
        area_number,
        zone_number,
        zone_state,
    }))
}

pub(crate) fn arming_level(ctx: &mut DecodeContext<'_>, m: &[u8]) -> Result<Decoded> {
    check_len(m, CommandCode::Double(0x22, 0x01), LengthRule::Exactly(0x08))?;
    let (partition_number, area_number) = (m[3], m[4]);
    let user = UserInfo {
        is_keyfob: m[5] > 0,
        user_number_high: m[5],
        user_number_low: m[6],
        role: UserRole::from_user_number(m[6]),
    };
    let arming_level = ArmingLevel::from_code(m[7]);
    ctx.state
        .apply_arming_level(partition_number, arming_level, user.clone());

    let action = ctx
        .config
        .resend_master_code_on_arm
        .then_some(Action::SendMasterCode {
            partition: partition_number,
        });
    Ok(Decoded::message(PanelMessage::ArmLevel {
        partition_number,
        area_number,
        user,
        arming_level,
        arming_level_code: m[7],
        arming_level_text: arming_level.label(),
    })
    .with_action(action))
}

pub(crate) fn alarm_trouble(_ctx: &mut DecodeContext<'_>, m: &[u8]) -> Result<Decoded> {
    check_len(m, CommandCode::Double(0x22, 0x02), LengthRule::Exactly(0x0D))?;
    let (general_type, specific_type) = alarm_type_names(m[9], m[10]);
    Ok(Decoded::message(PanelMessage::Alarm(AlarmEvent {
        partition_number: m[3],
        area_number: m[4],
        source_type_code: m[5],
        source_type: lookup(&ALARM_SOURCE_TYPES, m[5]).unwrap_or("Unknown Source"),
        source_number: bytes_to_num(&m[6..9]),
        general_type_code: m[9],
        general_type,
        specific_type_code: m[10],
        specific_type,
        event_specific_data: be16(m[11], m[12]),
    })))
}

pub(crate) fn entry_exit_delay(_ctx: &mut DecodeContext<'_>, m: &[u8]) -> Result<Decoded> {
    check_len(m, CommandCode::Double(0x22, 0x03), LengthRule::Exactly(0x08))?;
    let flags = m[5];
    let length = match (flags >> 4) & 0x03 {
        0 => DelayLength::Standard,
        1 => DelayLength::Extended,
        2 => DelayLength::TwiceExtended,
        _ => DelayLength::Unknown,
    };
    Ok(Decoded::message(PanelMessage::Delay(DelayEvent {
        partition_number: m[3],
        area_number: m[4],
        length,
        is_exit: flags & 0x40 != 0,
        is_end: flags & 0x80 != 0,
        delay_seconds: be16(m[6], m[7]),
    })))
}

pub(crate) fn touchpad(ctx: &mut DecodeContext<'_>, m: &[u8]) -> Result<Decoded> {
    check_len(m, CommandCode::Double(0x22, 0x09), LengthRule::AtLeast(0x06))?;
    // Partition 0 is shown on every touchpad
    if m[3] != 0 && m[3] != ctx.config.display_partition {
        return Ok(Decoded::empty());
    }
    let message = DisplayMessage {
        partition_number: m[3],
        area_number: m[4],
        message_type: lookup(&TOUCHPAD_MSG_TYPES, m[5]).unwrap_or("Unknown Message Type"),
        display_text: ctx.text.decode(text_tokens(m, 6)),
        received_at: Utc::now(),
    };
    ctx.state.display.push(message.clone());
    Ok(Decoded::message(PanelMessage::Touchpad(message)))
}

pub(crate) fn feature_state(ctx: &mut DecodeContext<'_>, m: &[u8]) -> Result<Decoded> {
    check_len(m, CommandCode::Double(0x22, 0x0C), LengthRule::Exactly(0x06))?;
    let feature_state = FeatureState::from_bits_truncate(m[5]);
    ctx.state.panel.feature_states.insert(m[3], feature_state);
    Ok(Decoded::message(PanelMessage::FeatureState {
        partition_number: m[3],
        area_number: m[4],
        feature_state,
    }))
}
