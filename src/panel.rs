// MIT License - Copyright (c) 2026 Peter Wright
// Application-facing handle over a running engine

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::EngineConfig;
use crate::devices::{DisplayMessage, Partition, PanelStatus, User, Zone, ZoneKey};
use crate::engine::{Commander, Engine, HandlerRegistry};
use crate::error::Result;
use crate::event::{EventReceiver, EventSender};
use crate::protocol::{ArmOption, CommandId, EquipmentCategory, PanelMessage};
use crate::state::{SharedState, StateStore};
use crate::transport::{LoopbackHandle, LoopbackLink, SerialLink, SerialPortLink};

/// The main public API for talking to a Concord panel.
///
/// The engine loop runs on a blocking worker thread. Commands return as
/// soon as they are queued; state accessors return snapshots that may lag
/// just-queued commands.
///
/// # Example
///
/// ```no_run
/// use concord_bridge::{CommandId, ConcordPanel, EngineConfig};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = EngineConfig::builder().device("/dev/ttyUSB0").build();
///     let panel = ConcordPanel::start(config)?;
///
///     panel
///         .register_handler(CommandId::ZoneStatus, |msg| println!("{:?}", msg))
///         .await;
///
///     panel.arm_stay(1, None)?;
///
///     tokio::signal::ctrl_c().await?;
///     panel.shutdown().await?;
///     Ok(())
/// }
/// ```
pub struct ConcordPanel {
    commander: Commander,
    state: SharedState,
    handlers: HandlerRegistry,
    event_tx: EventSender,
    worker: Option<JoinHandle<()>>,
}

impl ConcordPanel {
    /// Open the configured device and start the engine.
    ///
    /// Fails if the serial device cannot be opened. Must be called from
    /// within a tokio runtime.
    pub fn start(config: EngineConfig) -> Result<Self> {
        if config.is_loopback() {
            info!("Using in-memory loopback link");
            let (panel, _handle) = Self::start_loopback(config);
            return Ok(panel);
        }
        let link = SerialPortLink::open(&config.device, config.poll_interval)?;
        Ok(Self::start_with_link(link, config))
    }

    /// Start on an in-memory link, returning the panel end of it.
    pub fn start_loopback(config: EngineConfig) -> (Self, LoopbackHandle) {
        let (link, handle) = LoopbackLink::new();
        (Self::start_with_link(link, config), handle)
    }

    pub fn start_with_link<L: SerialLink + 'static>(link: L, config: EngineConfig) -> Self {
        let (engine, commander) = Engine::new(link, config);
        Self::from_engine(engine, commander)
    }

    /// Run an engine built by the caller, e.g. with a custom text decoder.
    pub fn from_engine<L: SerialLink + 'static>(engine: Engine<L>, commander: Commander) -> Self {
        let state = engine.state();
        let handlers = engine.handlers();
        let event_tx = engine.event_sender();
        let worker = tokio::task::spawn_blocking(move || engine.run());
        Self {
            commander,
            state,
            handlers,
            event_tx,
            worker: Some(worker),
        }
    }

    /// Subscribe to engine events.
    pub fn subscribe(&self) -> EventReceiver {
        self.event_tx.subscribe()
    }

    /// Register a callback for one command. Callbacks run on the engine
    /// worker, in registration order, after the state store is updated.
    pub async fn register_handler<F>(&self, command: CommandId, handler: F)
    where
        F: Fn(&PanelMessage) + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .await
            .entry(command)
            .or_default()
            .push(Box::new(handler));
    }

    pub fn commander(&self) -> &Commander {
        &self.commander
    }

    // --- State Accessors ---

    /// Get a snapshot of all zones, ordered by partition then zone number.
    pub async fn zones(&self) -> Vec<Zone> {
        self.state.read().await.zones.values().cloned().collect()
    }

    pub async fn zone(&self, partition_number: u8, zone_number: u16) -> Option<Zone> {
        let state = self.state.read().await;
        state
            .zones
            .get(&ZoneKey::new(partition_number, zone_number))
            .cloned()
    }

    /// Get a snapshot of all partitions.
    pub async fn partitions(&self) -> Vec<Partition> {
        self.state.read().await.partitions.values().cloned().collect()
    }

    pub async fn partition(&self, partition_number: u8) -> Option<Partition> {
        self.state.read().await.partitions.get(&partition_number).cloned()
    }

    pub async fn users(&self) -> Vec<User> {
        self.state.read().await.users.values().cloned().collect()
    }

    pub async fn panel_status(&self) -> PanelStatus {
        self.state.read().await.panel.clone()
    }

    /// Recent touchpad display messages, oldest first.
    pub async fn display_messages(&self) -> Vec<DisplayMessage> {
        self.state.read().await.display.to_vec()
    }

    pub async fn snapshot(&self) -> StateStore {
        self.state.read().await.clone()
    }

    // --- Commands ---

    pub fn request_all_equipment(&self) -> Result<()> {
        self.commander.request_all_equipment()
    }

    pub fn request_equipment(&self, category: EquipmentCategory) -> Result<()> {
        self.commander.request_equipment(category)
    }

    pub fn request_dynamic_data_refresh(&self) -> Result<()> {
        self.commander.request_dynamic_data_refresh()
    }

    pub fn arm_stay(&self, partition: u8, option: Option<ArmOption>) -> Result<()> {
        self.commander.arm_stay(partition, option)
    }

    pub fn arm_away(&self, partition: u8, option: Option<ArmOption>) -> Result<()> {
        self.commander.arm_away(partition, option)
    }

    pub fn disarm(&self, pin: &str, partition: u8) -> Result<()> {
        self.commander.disarm(pin, partition)
    }

    pub fn send_keys<S: AsRef<str>>(&self, keys: &[S], group: bool, partition: u8) -> Result<()> {
        self.commander.send_keys(keys, group, partition)
    }

    pub fn inject_alarm_message(
        &self,
        partition: u8,
        general_type: u8,
        specific_type: u8,
        event_data: u16,
    ) -> Result<()> {
        self.commander
            .inject_alarm_message(partition, general_type, specific_type, event_data)
    }

    /// Request a stop. Queued commands are still sent first.
    pub fn stop(&self) -> Result<()> {
        self.commander.stop()
    }

    /// Stop the engine and wait for the worker to close the link.
    pub async fn shutdown(mut self) -> Result<()> {
        info!("Shutting down panel engine");
        self.commander.stop()?;
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                error!("Engine worker failed: {}", e);
            }
        }
        Ok(())
    }
}

impl Drop for ConcordPanel {
    fn drop(&mut self) {
        if self.worker.is_some() {
            let _ = self.commander.stop();
        }
    }
}
