// MIT License - Copyright (c) 2026 Peter Wright
// Partition records populated by PART_DATA and ARM_LEVEL

use std::fmt;

use serde::Serialize;

use crate::constants::{lookup, USER_NUMBERS};

/// Partition arming level.
///
/// PART_DATA and ARM_LEVEL share the code space; codes 8 and 9 only
/// appear in PART_DATA, codes 0, 4 and 5 only in ARM_LEVEL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArmingLevel {
    ZoneTest,
    Off,
    Stay,
    Away,
    Night,
    Silent,
    PhoneTest,
    SensorTest,
    Unknown(u8),
}

impl ArmingLevel {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::ZoneTest,
            1 => Self::Off,
            2 => Self::Stay,
            3 => Self::Away,
            4 => Self::Night,
            5 => Self::Silent,
            8 => Self::PhoneTest,
            9 => Self::SensorTest,
            other => Self::Unknown(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::ZoneTest => 0,
            Self::Off => 1,
            Self::Stay => 2,
            Self::Away => 3,
            Self::Night => 4,
            Self::Silent => 5,
            Self::PhoneTest => 8,
            Self::SensorTest => 9,
            Self::Unknown(code) => *code,
        }
    }

    /// Text used for arming level change events.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ZoneTest => "Zone Test",
            Self::Off => "Off",
            Self::Stay => "Home/Perimeter",
            Self::Away => "Away/Full",
            Self::Night => "Night",
            Self::Silent => "Silent",
            Self::PhoneTest => "Phone Test",
            Self::SensorTest => "Sensor Test",
            Self::Unknown(_) => "Unknown Arming Level",
        }
    }

    /// Text used for partition data, which names levels 2 and 3 differently
    /// and has no zone test, night or silent level.
    pub fn partition_label(&self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::Stay => "Stay",
            Self::Away => "Away",
            Self::PhoneTest => "Phone Test",
            Self::SensorTest => "Sensor Test",
            _ => "Unknown Arming Level",
        }
    }

    pub fn is_armed(&self) -> bool {
        matches!(self, Self::Stay | Self::Away | Self::Night | Self::Silent)
    }
}

/// Who caused an arming level change, decoded from the user number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UserRole {
    Regular(u8),
    PartitionMaster(u8),
    PartitionDuress(u8),
    Named(u8),
    Unknown(u8),
}

impl UserRole {
    pub fn from_user_number(number: u8) -> Self {
        match number {
            n if lookup(&USER_NUMBERS, n).is_some() => Self::Named(n),
            0..=229 => Self::Regular(number),
            230..=237 => Self::PartitionMaster(number - 230),
            238..=245 => Self::PartitionDuress(number - 238),
            _ => Self::Unknown(number),
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Regular(n) => write!(f, "Regular User {}", n),
            Self::PartitionMaster(p) => write!(f, "Partition {} Master Code", p),
            Self::PartitionDuress(p) => write!(f, "Partition {} Duress Code", p),
            Self::Named(n) => f.write_str(lookup(&USER_NUMBERS, *n).unwrap_or("Unknown Code")),
            Self::Unknown(_) => f.write_str("Unknown Code"),
        }
    }
}

/// The user behind the most recent arming level change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserInfo {
    pub is_keyfob: bool,
    pub user_number_high: u8,
    pub user_number_low: u8,
    pub role: UserRole,
}

/// A single alarm partition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Partition {
    pub partition_number: u8,
    pub area_number: u8,
    pub arming_level: ArmingLevel,
    /// Text for the arming level, in the vocabulary of the message that set it.
    pub arming_level_text: &'static str,
    pub partition_text: String,
    pub last_user: Option<UserInfo>,
}

impl Partition {
    pub fn new(partition_number: u8, area_number: u8, arming_level: ArmingLevel) -> Self {
        Self {
            partition_number,
            area_number,
            arming_level,
            arming_level_text: arming_level.partition_label(),
            partition_text: String::new(),
            last_user: None,
        }
    }

    pub fn arming_level_code(&self) -> u8 {
        self.arming_level.code()
    }

    pub fn is_armed(&self) -> bool {
        self.arming_level.is_armed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arming_level_codes() {
        assert_eq!(ArmingLevel::from_code(2), ArmingLevel::Stay);
        assert_eq!(ArmingLevel::from_code(9).label(), "Sensor Test");
        assert_eq!(ArmingLevel::from_code(7), ArmingLevel::Unknown(7));
        assert_eq!(ArmingLevel::Unknown(7).code(), 7);
        assert!(ArmingLevel::Away.is_armed());
        assert!(!ArmingLevel::Off.is_armed());
    }

    #[test]
    fn test_partition_and_event_labels_differ() {
        assert_eq!(ArmingLevel::Stay.partition_label(), "Stay");
        assert_eq!(ArmingLevel::Stay.label(), "Home/Perimeter");
        assert_eq!(ArmingLevel::Away.partition_label(), "Away");
        assert_eq!(ArmingLevel::Away.label(), "Away/Full");
        assert_eq!(ArmingLevel::Night.partition_label(), "Unknown Arming Level");
        assert_eq!(ArmingLevel::SensorTest.partition_label(), "Sensor Test");
    }

    #[test]
    fn test_user_roles() {
        assert_eq!(UserRole::from_user_number(5).to_string(), "Regular User 5");
        assert_eq!(UserRole::from_user_number(231).to_string(), "Partition 1 Master Code");
        assert_eq!(UserRole::from_user_number(238).to_string(), "Partition 0 Duress Code");
        assert_eq!(UserRole::from_user_number(246).to_string(), "System Master Code");
        assert_eq!(UserRole::from_user_number(252).to_string(), "System");
        assert_eq!(UserRole::from_user_number(253).to_string(), "Unknown Code");
    }
}
