// MIT License - Copyright (c) 2026 Peter Wright
// In-memory image of the panel, written only by the engine worker

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::devices::{
    ArmingLevel, DisplayHistory, Partition, PanelStatus, User, UserInfo, Zone, ZoneKey, ZoneState,
};

/// Zones, partitions, users, panel status and recent display text.
///
/// Writes are coarse (a whole record or a single field) and happen only on
/// the engine worker. Readers take cloned snapshots through [`SharedState`].
#[derive(Debug, Clone)]
pub struct StateStore {
    pub zones: BTreeMap<ZoneKey, Zone>,
    pub partitions: BTreeMap<u8, Partition>,
    pub users: BTreeMap<u16, User>,
    pub panel: PanelStatus,
    pub display: DisplayHistory,
}

pub type SharedState = Arc<RwLock<StateStore>>;

impl StateStore {
    pub fn new(display_capacity: usize) -> Self {
        Self {
            zones: BTreeMap::new(),
            partitions: BTreeMap::new(),
            users: BTreeMap::new(),
            panel: PanelStatus::default(),
            display: DisplayHistory::new(display_capacity),
        }
    }

    pub fn shared(display_capacity: usize) -> SharedState {
        Arc::new(RwLock::new(Self::new(display_capacity)))
    }

    /// ZONE_DATA: the record is replaced wholesale.
    pub fn apply_zone_data(&mut self, zone: Zone) {
        self.zones.insert(zone.key(), zone);
    }

    /// ZONE_STATUS: only the state of an existing zone changes; an unseen
    /// zone gets a placeholder record. Returns the bits that changed.
    pub fn apply_zone_status(
        &mut self,
        partition_number: u8,
        area_number: u8,
        zone_number: u16,
        state: ZoneState,
    ) -> ZoneState {
        self.zones
            .entry(ZoneKey::new(partition_number, zone_number))
            .or_insert_with(|| Zone::stub(partition_number, area_number, zone_number))
            .update_state(state)
    }

    /// PART_DATA: create the partition, or refresh its configuration while
    /// keeping the last-user information from earlier ARM_LEVEL events.
    pub fn apply_partition_data(
        &mut self,
        partition_number: u8,
        area_number: u8,
        arming_level: ArmingLevel,
        partition_text: String,
    ) {
        let part = self
            .partitions
            .entry(partition_number)
            .or_insert_with(|| Partition::new(partition_number, area_number, arming_level));
        part.area_number = area_number;
        part.arming_level = arming_level;
        part.arming_level_text = arming_level.partition_label();
        part.partition_text = partition_text;
    }

    /// ARM_LEVEL: update a known partition. Unknown partitions are left
    /// alone until PART_DATA describes them. Returns whether a record changed.
    pub fn apply_arming_level(
        &mut self,
        partition_number: u8,
        arming_level: ArmingLevel,
        user: UserInfo,
    ) -> bool {
        match self.partitions.get_mut(&partition_number) {
            Some(part) => {
                part.arming_level = arming_level;
                part.arming_level_text = arming_level.label();
                part.last_user = Some(user);
                true
            }
            None => false,
        }
    }

    pub fn apply_user(&mut self, user: User) {
        self.users.insert(user.user_number, user);
    }
}
