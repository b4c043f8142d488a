// MIT License - Copyright (c) 2026 Peter Wright
// Protocol engine for GE/Interlogix Concord alarm panels
//
//! # concord-bridge
//!
//! Talks to a Concord 4 (or compatible) alarm panel through its RS-232
//! automation module. Frames are hex-encoded and checksummed, every frame is
//! acknowledged, and unacknowledged frames are retransmitted a bounded
//! number of times. Decoded messages keep an in-memory image of zones,
//! partitions, users and panel status, and are published to registered
//! handlers and event subscribers.
//!
//! ## Quick Start
//!
//! ```no_run
//! use concord_bridge::{ConcordPanel, EngineConfig, PanelEvent};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = EngineConfig::builder()
//!         .device("/dev/ttyUSB0")
//!         .master_pin("1234")
//!         .build();
//!
//!     let panel = ConcordPanel::start(config)?;
//!
//!     let mut events = panel.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             if let PanelEvent::Message { command, message } = event {
//!                 println!("{}: {:?}", command, message);
//!             }
//!         }
//!     });
//!
//!     panel.arm_away(1, None)?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     panel.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod constants;
pub mod devices;
pub mod engine;
pub mod error;
pub mod event;
pub mod panel;
pub mod protocol;
pub mod state;
pub mod text;
pub mod transport;

// Re-exports for convenience
pub use config::{EngineConfig, EngineConfigBuilder};
pub use engine::{Commander, Engine, LinkState, Poll};
pub use error::{ConcordError, Result};
pub use event::{EventReceiver, PanelEvent};
pub use panel::ConcordPanel;
pub use protocol::{ArmOption, CommandId, EquipmentCategory, PanelMessage};
pub use state::{SharedState, StateStore};
pub use text::{TextDecoder, TokenTextDecoder};
pub use transport::{LoopbackHandle, LoopbackLink, SerialLink, SerialPortLink};
pub use devices::zone::{Zone, ZoneState, ZoneType};
pub use devices::partition::{ArmingLevel, Partition, UserInfo};
pub use devices::system::{FeatureState, PanelInfo, PanelStatus};
pub use devices::user::User;
pub use devices::display::DisplayMessage;
