// MIT License - Copyright (c) 2026 Peter Wright
// Typed records maintained by the engine

pub mod display;
pub mod partition;
pub mod system;
pub mod user;
pub mod zone;

pub use display::{DisplayHistory, DisplayMessage};
pub use partition::{ArmingLevel, Partition, UserInfo, UserRole};
pub use system::{FeatureState, PanelInfo, PanelStatus};
pub use user::User;
pub use zone::{Zone, ZoneKey, ZoneState, ZoneType};
