// MIT License - Copyright (c) 2026 Peter Wright
// Command table and dispatch key resolution

pub mod build;
pub mod decode;

use std::fmt;

use serde::Serialize;

pub use build::{
    build_alarm_trouble, build_dynamic_data_refresh, build_equipment_list, build_keypress,
};
pub use decode::{AlarmEvent, DecodeContext, Decoded, DelayEvent, DelayLength, PanelMessage};

use crate::error::Result;

/// Numeric command code: one byte, or two for the 0x22/0x23 families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandCode {
    Single(u8),
    Double(u8, u8),
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandCode::Single(c) => write!(f, "0x{:02x}", c),
            CommandCode::Double(c, s) => write!(f, "0x{:02x}/0x{:02x}", c, s),
        }
    }
}

/// Stable short identifier of a panel-to-automation command.
///
/// Handlers are registered against these rather than numeric codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandId {
    PanelType,
    EventLost,
    ZoneData,
    PartData,
    BusDevData,
    BusCapData,
    OutputData,
    EqptListDone,
    UserData,
    SchedData,
    EventData,
    LightAttach,
    ClearImage,
    ZoneStatus,
    ArmLevel,
    Alarm,
    Delay,
    SirenSetup,
    SirenSync,
    SirenGo,
    Touchpad,
    SirenStop,
    FeatState,
    Temp,
    Time,
    LightsState,
    UserLights,
    KeyfobCmd,
}

impl CommandId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PanelType => "PANEL_TYPE",
            Self::EventLost => "EVENT_LOST",
            Self::ZoneData => "ZONE_DATA",
            Self::PartData => "PART_DATA",
            Self::BusDevData => "BUS_DEV_DATA",
            Self::BusCapData => "BUS_CAP_DATA",
            Self::OutputData => "OUTPUT_DATA",
            Self::EqptListDone => "EQPT_LIST_DONE",
            Self::UserData => "USER_DATA",
            Self::SchedData => "SCHED_DATA",
            Self::EventData => "EVENT_DATA",
            Self::LightAttach => "LIGHT_ATTACH",
            Self::ClearImage => "CLEAR_IMAGE",
            Self::ZoneStatus => "ZONE_STATUS",
            Self::ArmLevel => "ARM_LEVEL",
            Self::Alarm => "ALARM",
            Self::Delay => "DELAY",
            Self::SirenSetup => "SIREN_SETUP",
            Self::SirenSync => "SIREN_SYNC",
            Self::SirenGo => "SIREN_GO",
            Self::Touchpad => "TOUCHPAD",
            Self::SirenStop => "SIREN_STOP",
            Self::FeatState => "FEAT_STATE",
            Self::Temp => "TEMP",
            Self::Time => "TIME",
            Self::LightsState => "LIGHTS_STATE",
            Self::UserLights => "USER_LIGHTS",
            Self::KeyfobCmd => "KEYFOB_CMD",
        }
    }

    /// Look up an identifier by its short name, e.g. `"ZONE_STATUS"`.
    pub fn from_name(name: &str) -> Option<Self> {
        RX_COMMANDS
            .iter()
            .find(|cmd| cmd.id.as_str() == name)
            .map(|cmd| cmd.id)
    }

    /// Row of this identifier in [`RX_COMMANDS`].
    fn index(&self) -> usize {
        match self {
            Self::PanelType => 0,
            Self::EventLost => 1,
            Self::ZoneData => 2,
            Self::PartData => 3,
            Self::BusDevData => 4,
            Self::BusCapData => 5,
            Self::OutputData => 6,
            Self::EqptListDone => 7,
            Self::UserData => 8,
            Self::SchedData => 9,
            Self::EventData => 10,
            Self::LightAttach => 11,
            Self::ClearImage => 12,
            Self::ZoneStatus => 13,
            Self::ArmLevel => 14,
            Self::Alarm => 15,
            Self::Delay => 16,
            Self::SirenSetup => 17,
            Self::SirenSync => 18,
            Self::SirenGo => 19,
            Self::Touchpad => 20,
            Self::SirenStop => 21,
            Self::FeatState => 22,
            Self::Temp => 23,
            Self::Time => 24,
            Self::LightsState => 25,
            Self::UserLights => 26,
            Self::KeyfobCmd => 27,
        }
    }

    pub fn entry(&self) -> &'static RxCommand {
        &RX_COMMANDS[self.index()]
    }

    pub fn code(&self) -> CommandCode {
        self.entry().code
    }

    pub fn display_name(&self) -> &'static str {
        self.entry().name
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decodes a checksum-validated frame, possibly merging into the state store.
pub type Decoder = fn(&mut DecodeContext<'_>, &[u8]) -> Result<Decoded>;

/// One row of the receive command table. A `None` decoder means the
/// command is acknowledged and otherwise ignored.
pub struct RxCommand {
    pub code: CommandCode,
    pub id: CommandId,
    pub name: &'static str,
    pub decoder: Option<Decoder>,
}

impl fmt::Debug for RxCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RxCommand")
            .field("code", &self.code)
            .field("id", &self.id)
            .field("name", &self.name)
            .field("decodes", &self.decoder.is_some())
            .finish()
    }
}

const fn rx(
    code: CommandCode,
    id: CommandId,
    name: &'static str,
    decoder: Option<Decoder>,
) -> RxCommand {
    RxCommand {
        code,
        id,
        name,
        decoder,
    }
}

use CommandCode::{Double, Single};

/// Commands sent by the panel to the automation module.
pub static RX_COMMANDS: [RxCommand; 28] = [
    rx(Single(0x01), CommandId::PanelType, "Panel Type", Some(decode::panel_type)),
    rx(Single(0x02), CommandId::EventLost, "Automation Event Lost", Some(decode::event_lost)),
    rx(Single(0x03), CommandId::ZoneData, "Zone Data", Some(decode::zone_data)),
    rx(Single(0x04), CommandId::PartData, "Partition Data", Some(decode::partition_data)),
    rx(Single(0x05), CommandId::BusDevData, "SuperBus Device Data", None),
    rx(Single(0x06), CommandId::BusCapData, "SuperBus Device Capabilities Data", None),
    rx(Single(0x07), CommandId::OutputData, "Output Data", None),
    // Sent after the last zone and SuperBus device of an equipment list
    rx(Single(0x08), CommandId::EqptListDone, "Equipment List Complete", Some(decode::equipment_list_done)),
    rx(Single(0x09), CommandId::UserData, "User Data", Some(decode::user_data)),
    rx(Single(0x0A), CommandId::SchedData, "Schedule Data", None),
    rx(Single(0x0B), CommandId::EventData, "Scheduled Event Data", None),
    rx(Single(0x0C), CommandId::LightAttach, "Light to Sensor Attachment", None),
    rx(Single(0x20), CommandId::ClearImage, "Clear Automation Image", Some(decode::clear_image)),
    rx(Single(0x21), CommandId::ZoneStatus, "Zone Status", Some(decode::zone_status)),
    rx(Double(0x22, 0x01), CommandId::ArmLevel, "Arming Level", Some(decode::arming_level)),
    rx(Double(0x22, 0x02), CommandId::Alarm, "Alarm/Trouble", Some(decode::alarm_trouble)),
    rx(Double(0x22, 0x03), CommandId::Delay, "Entry/Exit Delay", Some(decode::entry_exit_delay)),
    rx(Double(0x22, 0x04), CommandId::SirenSetup, "Siren Setup", None),
    rx(Double(0x22, 0x05), CommandId::SirenSync, "Siren Synchronize", None),
    rx(Double(0x22, 0x06), CommandId::SirenGo, "Siren Go", None),
    rx(Double(0x22, 0x09), CommandId::Touchpad, "Touchpad Display", Some(decode::touchpad)),
    rx(Double(0x22, 0x0B), CommandId::SirenStop, "Siren Stop", None),
    rx(Double(0x22, 0x0C), CommandId::FeatState, "Feature State", Some(decode::feature_state)),
    rx(Double(0x22, 0x0D), CommandId::Temp, "Temperature", None),
    rx(Double(0x22, 0x0E), CommandId::Time, "Time and Date", None),
    rx(Double(0x23, 0x01), CommandId::LightsState, "Lights State Command", None),
    rx(Double(0x23, 0x02), CommandId::UserLights, "User Lights Command", None),
    rx(Double(0x23, 0x03), CommandId::KeyfobCmd, "Keyfob Command", None),
];

pub fn rx_command(code: CommandCode) -> Option<&'static RxCommand> {
    RX_COMMANDS.iter().find(|cmd| cmd.code == code)
}

/// Resolve the table entry for a validated frame.
///
/// The first payload byte wins if it is registered on its own; otherwise
/// the first two payload bytes are looked up together. Returns the code
/// that was tried last on failure, for logging.
pub fn resolve(frame: &[u8]) -> std::result::Result<&'static RxCommand, Option<CommandCode>> {
    let Some(&b1) = frame.get(1) else {
        return Err(None);
    };
    if let Some(cmd) = rx_command(Single(b1)) {
        return Ok(cmd);
    }
    // frame[2] is the checksum on a three-byte frame, never a subcommand
    if frame.len() <= 3 {
        return Err(Some(Single(b1)));
    }
    let code = Double(b1, frame[2]);
    rx_command(code).ok_or(Some(code))
}

/// One row of the transmit command table.
#[derive(Debug, Clone, Copy)]
pub struct TxCommand {
    pub code: CommandCode,
    pub name: &'static str,
}

/// Commands sent by the automation module to the panel.
pub static TX_COMMANDS: [TxCommand; 12] = [
    TxCommand { code: Single(0x02), name: "Full Equipment List Request" },
    TxCommand { code: Double(0x02, 0x03), name: "Single Equipment List Request/Zone Data" },
    TxCommand { code: Double(0x02, 0x04), name: "Single Equipment List Request/Partition Data" },
    TxCommand { code: Double(0x02, 0x05), name: "Single Equipment List Request/SuperBus Device Data" },
    TxCommand { code: Double(0x02, 0x06), name: "Single Equipment List Request/SuperBus Capability Data" },
    TxCommand { code: Double(0x02, 0x07), name: "Single Equipment List Request/Output Data" },
    TxCommand { code: Double(0x02, 0x09), name: "Single Equipment List Request/User Data" },
    TxCommand { code: Double(0x02, 0x0A), name: "Single Equipment List Request/Schedule Data" },
    TxCommand { code: Double(0x02, 0x0B), name: "Single Equipment List Request/Scheduled Event Data" },
    TxCommand { code: Double(0x02, 0x0C), name: "Single Equipment List Request/Light Attachment" },
    TxCommand { code: Single(0x20), name: "Dynamic Data Refresh Request" },
    TxCommand { code: Single(0x40), name: "Keypress" },
];

/// Name of an outbound frame (unchecksummed or not), for logging.
pub fn tx_command_name(frame: &[u8]) -> &'static str {
    let lookup = |code| TX_COMMANDS.iter().find(|c| c.code == code).map(|c| c.name);
    let Some(&b1) = frame.get(1) else {
        return "Unknown";
    };
    if b1 == 0x02 && frame.first() == Some(&0x03) {
        if let Some(&category) = frame.get(2) {
            if let Some(name) = lookup(Double(b1, category)) {
                return name;
            }
        }
    }
    lookup(Single(b1)).unwrap_or("Unknown")
}

/// Equipment list request categories. `All` requests the full list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EquipmentCategory {
    All,
    Zones,
    Partitions,
    BusDevices,
    BusCapabilities,
    Outputs,
    Users,
    Schedules,
    ScheduledEvents,
    LightAttachments,
}

impl EquipmentCategory {
    pub fn code(&self) -> u8 {
        match self {
            Self::All => 0x00,
            Self::Zones => 0x03,
            Self::Partitions => 0x04,
            Self::BusDevices => 0x05,
            Self::BusCapabilities => 0x06,
            Self::Outputs => 0x07,
            Self::Users => 0x09,
            Self::Schedules => 0x0A,
            Self::ScheduledEvents => 0x0B,
            Self::LightAttachments => 0x0C,
        }
    }
}

/// Modifier for the arm commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArmOption {
    Silent,
    Instant,
}

/// Follow-up work a decoder asks the engine to perform after dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Key the stored master code into the given partition.
    SendMasterCode { partition: u8 },
    /// Rebuild our image of the panel: full equipment list plus dynamic refresh.
    RefreshImage,
}
