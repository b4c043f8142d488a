// MIT License - Copyright (c) 2026 Peter Wright
// Single-outstanding-message protocol engine

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::codec::{append_checksum, encode_hex, validate};
use crate::config::EngineConfig;
use crate::constants::{keypress_code, KEY_DISARM};
use crate::error::{ConcordError, Result};
use crate::event::{event_channel, EventReceiver, EventSender, PanelEvent};
use crate::protocol::{
    build_alarm_trouble, build_dynamic_data_refresh, build_equipment_list, build_keypress,
    resolve, tx_command_name, Action, ArmOption, CommandId, DecodeContext, EquipmentCategory,
    PanelMessage,
};
use crate::state::{SharedState, StateStore};
use crate::text::{TextDecoder, TokenTextDecoder};
use crate::transport::{ControlByte, SerialLink, Transport};

const EVENT_CHANNEL_CAPACITY: usize = 256;
const LOOP_ALIVE_INTERVAL: Duration = Duration::from_secs(20);

/// Alarm source code used for injected alarms ("System").
const INJECTED_ALARM_SOURCE: u8 = 3;

/// Callback invoked on the engine worker for each decoded message.
pub type Handler = Box<dyn Fn(&PanelMessage) + Send + Sync>;

/// Handlers by command, run in registration order.
pub type HandlerRegistry = Arc<RwLock<HashMap<CommandId, Vec<Handler>>>>;

/// Items on the transmit queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A checksummed frame
    Frame(Vec<u8>),
    /// Close the link and leave the loop once everything before it is sent
    Stop,
}

/// Half-duplex link discipline: at most one frame awaits acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    AwaitingAck {
        message: Vec<u8>,
        attempts: u32,
        sent_at: Instant,
    },
}

/// Outcome of one loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    /// Something was read or written
    Busy,
    /// Nothing to do; the caller should back off for a poll interval
    Idle,
    /// The stop request was honoured and the link is closed
    Stopped,
}

/// Cheap, cloneable handle for queueing commands to the engine.
///
/// All methods are non-blocking. A successful enqueue does not mean the
/// panel received the frame.
#[derive(Clone)]
pub struct Commander {
    tx: UnboundedSender<Outbound>,
    synthetic: UnboundedSender<Vec<u8>>,
    master_pin: Arc<Mutex<Option<String>>>,
}

impl Commander {
    /// Queue an unchecksummed frame for transmission.
    pub fn enqueue(&self, mut frame: Vec<u8>) -> Result<()> {
        append_checksum(&mut frame);
        debug!("Queueing {}: {}", tx_command_name(&frame), encode_hex(&frame));
        self.tx
            .send(Outbound::Frame(frame))
            .map_err(|_| ConcordError::ChannelClosed)
    }

    /// Queue an unchecksummed frame to be handled as if the panel sent it.
    pub fn enqueue_synthetic(&self, mut frame: Vec<u8>) -> Result<()> {
        append_checksum(&mut frame);
        self.synthetic
            .send(frame)
            .map_err(|_| ConcordError::ChannelClosed)
    }

    /// Ask the loop to close the link after every frame queued so far.
    pub fn stop(&self) -> Result<()> {
        self.tx
            .send(Outbound::Stop)
            .map_err(|_| ConcordError::ChannelClosed)
    }

    pub fn request_equipment(&self, category: EquipmentCategory) -> Result<()> {
        self.enqueue(build_equipment_list(category))
    }

    pub fn request_all_equipment(&self) -> Result<()> {
        self.request_equipment(EquipmentCategory::All)
    }

    pub fn request_zones(&self) -> Result<()> {
        self.request_equipment(EquipmentCategory::Zones)
    }

    pub fn request_partitions(&self) -> Result<()> {
        self.request_equipment(EquipmentCategory::Partitions)
    }

    pub fn request_users(&self) -> Result<()> {
        self.request_equipment(EquipmentCategory::Users)
    }

    pub fn request_dynamic_data_refresh(&self) -> Result<()> {
        self.enqueue(build_dynamic_data_refresh())
    }

    pub fn send_keypress(&self, keys: &[u8], partition: u8) -> Result<()> {
        self.enqueue(build_keypress(keys, partition, 0, true)?)
    }

    pub fn arm_stay(&self, partition: u8, option: Option<ArmOption>) -> Result<()> {
        let keys: &[u8] = match option {
            None => &[0x02],
            Some(ArmOption::Silent) => &[0x05, 0x02],
            Some(ArmOption::Instant) => &[0x02, 0x04],
        };
        self.send_keypress(keys, partition)
    }

    pub fn arm_away(&self, partition: u8, option: Option<ArmOption>) -> Result<()> {
        let keys: &[u8] = match option {
            None => &[0x03],
            Some(ArmOption::Silent) => &[0x05, 0x03],
            Some(ArmOption::Instant) => &[0x03, 0x04],
        };
        self.send_keypress(keys, partition)
    }

    /// Remember `pin` as the master code and send the disarm key.
    pub fn disarm(&self, pin: &str, partition: u8) -> Result<()> {
        self.set_master_pin(Some(pin.to_string()));
        self.send_keypress(&[KEY_DISARM], partition)
    }

    /// Send keys by name (see [`crate::constants::KEYPRESS_CODES`]), either
    /// as one grouped keypress or one keypress per key.
    ///
    /// Nothing is queued if any name is unknown.
    pub fn send_keys<S: AsRef<str>>(&self, names: &[S], group: bool, partition: u8) -> Result<()> {
        let codes = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                keypress_code(name).ok_or_else(|| ConcordError::UnknownKey {
                    key: name.to_string(),
                })
            })
            .collect::<Result<Vec<u8>>>()?;

        if group {
            info!("Sending group of {} keys to partition {}", codes.len(), partition);
            self.send_keypress(&codes, partition)
        } else {
            for code in codes {
                self.send_keypress(&[code], partition)?;
            }
            Ok(())
        }
    }

    /// Feed a synthetic "System" alarm into the receive path.
    pub fn inject_alarm_message(
        &self,
        partition: u8,
        general_type: u8,
        specific_type: u8,
        event_data: u16,
    ) -> Result<()> {
        self.enqueue_synthetic(build_alarm_trouble(
            partition,
            INJECTED_ALARM_SOURCE,
            1,
            general_type,
            specific_type,
            event_data,
        ))
    }

    pub fn set_master_pin(&self, pin: Option<String>) {
        *self.master_pin.lock().unwrap_or_else(|p| p.into_inner()) = pin;
    }

    pub fn master_pin(&self) -> Option<String> {
        self.master_pin
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

/// The protocol engine. Owns the link; meant to run on a dedicated
/// blocking thread via [`Engine::run`].
///
/// Handlers are called with the handler registry read-locked, so they must
/// not register further handlers.
pub struct Engine<L: SerialLink> {
    transport: Transport<L>,
    config: EngineConfig,
    link_state: LinkState,
    tx_queue: UnboundedReceiver<Outbound>,
    synthetic_rx: UnboundedReceiver<Vec<u8>>,
    commander: Commander,
    state: SharedState,
    handlers: HandlerRegistry,
    text: Box<dyn TextDecoder>,
    event_tx: EventSender,
    stopped: bool,
}

impl<L: SerialLink> Engine<L> {
    pub fn new(link: L, config: EngineConfig) -> (Self, Commander) {
        let (tx, tx_queue) = unbounded_channel();
        let (synthetic, synthetic_rx) = unbounded_channel();
        let commander = Commander {
            tx,
            synthetic,
            master_pin: Arc::new(Mutex::new(config.master_pin.clone())),
        };
        let (event_tx, _) = event_channel(EVENT_CHANNEL_CAPACITY);

        let engine = Self {
            transport: Transport::new(link),
            state: StateStore::shared(config.display_history),
            config,
            link_state: LinkState::Idle,
            tx_queue,
            synthetic_rx,
            commander: commander.clone(),
            handlers: Arc::new(RwLock::new(HashMap::new())),
            text: Box::new(TokenTextDecoder),
            event_tx,
            stopped: false,
        };
        (engine, commander)
    }

    pub fn with_text_decoder(mut self, text: Box<dyn TextDecoder>) -> Self {
        self.text = text;
        self
    }

    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    pub fn handlers(&self) -> HandlerRegistry {
        self.handlers.clone()
    }

    pub fn event_sender(&self) -> EventSender {
        self.event_tx.clone()
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.event_tx.subscribe()
    }

    pub fn link_state(&self) -> &LinkState {
        &self.link_state
    }

    /// Queue the requests that populate the state store on startup.
    pub fn queue_initial_requests(&self) -> Result<()> {
        if self.config.refresh_on_start {
            self.commander.request_zones()?;
            self.commander.request_dynamic_data_refresh()?;
        }
        Ok(())
    }

    /// Run the loop until stopped. Link errors are logged and never end the loop.
    pub fn run(mut self) {
        info!("Message loop starting on {}", self.config.device);
        if let Err(e) = self.queue_initial_requests() {
            warn!("Cannot queue initial requests: {}", e);
        }

        let started = Instant::now();
        let mut last_alive = started;
        loop {
            let now = Instant::now();
            match self.poll_once(now) {
                Ok(Poll::Stopped) => break,
                Ok(Poll::Busy) => {}
                Ok(Poll::Idle) => std::thread::sleep(self.config.poll_interval),
                Err(e) => {
                    error!("Message loop error: {}", e);
                    std::thread::sleep(self.config.poll_interval);
                }
            }
            if now.duration_since(last_alive) >= LOOP_ALIVE_INTERVAL {
                debug!("Message loop alive {}s", now.duration_since(started).as_secs());
                last_alive = now;
            }
        }
        info!("Message loop stopped");
    }

    /// One loop iteration: synthetic input, inbound frame, retry, dequeue.
    pub fn poll_once(&mut self, mut now: Instant) -> Result<Poll> {
        if self.stopped {
            return Ok(Poll::Stopped);
        }
        let mut busy = false;

        if let Ok(frame) = self.synthetic_rx.try_recv() {
            busy = true;
            debug!("Received synthetic message {}", encode_hex(&frame));
            self.dispatch(&frame);
        }

        if self.transport.message_chars_maybe_available()? {
            // Reads block on the link, so later timestamps include their duration
            let read_started = Instant::now();
            let started = self.transport.wait_for_message_start();
            self.handle_control_bytes(now + read_started.elapsed())?;
            if started? {
                busy = true;
                let read = self.transport.read_next_message();
                self.handle_control_bytes(now + read_started.elapsed())?;
                match read {
                    Ok(frame) => self.handle_inbound(&frame)?,
                    Err(e) if e.is_link_error() => {
                        self.transport.send_control(ControlByte::Nak)?;
                        error!("Failed to read message: {}", e);
                        return Ok(Poll::Busy);
                    }
                    Err(e) => return Err(e),
                }
            }
            now += read_started.elapsed();
        }

        let timed_out = match &self.link_state {
            LinkState::AwaitingAck { sent_at, .. } => {
                now.saturating_duration_since(*sent_at) > self.config.ack_timeout
            }
            LinkState::Idle => false,
        };
        if timed_out {
            busy = true;
            self.maybe_resend("timeout", now)?;
        }

        if self.link_state == LinkState::Idle {
            if let Ok(outbound) = self.tx_queue.try_recv() {
                busy = true;
                match outbound {
                    Outbound::Stop => {
                        self.stop();
                        return Ok(Poll::Stopped);
                    }
                    Outbound::Frame(frame) => self.send_message(frame, now)?,
                }
            }
        }

        Ok(if busy { Poll::Busy } else { Poll::Idle })
    }

    fn handle_inbound(&mut self, frame: &[u8]) -> Result<()> {
        if frame.len() < 3 {
            // Need at least length, command and checksum
            error!("Message too short: {}", encode_hex(frame));
            return Ok(());
        }
        if validate(frame) {
            self.transport.send_control(ControlByte::Ack)?;
            self.dispatch(frame);
        } else {
            self.transport.send_control(ControlByte::Nak)?;
            error!("{} for message {}", ConcordError::BadChecksum, encode_hex(frame));
        }
        Ok(())
    }

    fn handle_control_bytes(&mut self, now: Instant) -> Result<()> {
        for cc in self.transport.take_control_bytes() {
            let awaiting = matches!(self.link_state, LinkState::AwaitingAck { .. });
            match (cc, awaiting) {
                (ControlByte::Ack, false) => debug!("Spurious ACK"),
                (ControlByte::Ack, true) => {
                    debug!("ACK");
                    self.link_state = LinkState::Idle;
                }
                (ControlByte::Nak, false) => debug!("Spurious NAK"),
                (ControlByte::Nak, true) => {
                    debug!("NAK");
                    self.maybe_resend("NAK", now)?;
                }
            }
        }
        Ok(())
    }

    fn send_message(&mut self, message: Vec<u8>, now: Instant) -> Result<()> {
        debug!("Sending {}: {}", tx_command_name(&message), encode_hex(&message));
        self.transport.write_message(&message)?;
        self.link_state = LinkState::AwaitingAck {
            message,
            attempts: 1,
            sent_at: now,
        };
        Ok(())
    }

    fn maybe_resend(&mut self, reason: &str, now: Instant) -> Result<()> {
        let LinkState::AwaitingAck {
            message, attempts, ..
        } = std::mem::replace(&mut self.link_state, LinkState::Idle)
        else {
            return Ok(());
        };

        if attempts >= self.config.max_attempts {
            error!(
                "Unable to send message ({}), too many attempts ({}): {}",
                reason,
                attempts,
                encode_hex(&message)
            );
            let _ = self.event_tx.send(PanelEvent::TransmitAbandoned {
                frame: message,
                attempts,
            });
            return Ok(());
        }

        let attempts = attempts + 1;
        warn!(
            "Resending message ({}), attempt {}: {}",
            reason,
            attempts,
            encode_hex(&message)
        );
        let written = self.transport.write_message(&message);
        self.link_state = LinkState::AwaitingAck {
            message,
            attempts,
            sent_at: now,
        };
        written
    }

    /// Decode a checksum-valid frame, merge it into the store, run any
    /// action, then call handlers. Failures are logged and the frame dropped.
    fn dispatch(&mut self, frame: &[u8]) {
        let cmd = match resolve(frame) {
            Ok(cmd) => cmd,
            Err(code) => {
                let code = code.map(|c| c.to_string()).unwrap_or_else(|| "none".into());
                error!("Unknown command {} for message {}", code, encode_hex(frame));
                return;
            }
        };
        let Some(decoder) = cmd.decoder else {
            debug!("No decoder for command {} {}", cmd.code, cmd.id);
            return;
        };
        debug!("Handling command {} {}", cmd.code, cmd.id);

        let decoded = {
            let mut state = self.state.blocking_write();
            let mut ctx = DecodeContext {
                state: &mut state,
                text: self.text.as_ref(),
                config: &self.config,
            };
            decoder(&mut ctx, frame)
        };
        let decoded = match decoded {
            Ok(decoded) => decoded,
            Err(e) => {
                error!("Problem handling command {}: {} ({})", cmd.id, e, encode_hex(frame));
                return;
            }
        };

        if let Some(action) = decoded.action {
            self.perform(action);
        }

        if let Some(message) = decoded.message {
            {
                let handlers = self.handlers.blocking_read();
                for handler in handlers.get(&cmd.id).into_iter().flatten() {
                    handler(&message);
                }
            }
            let _ = self.event_tx.send(PanelEvent::Message {
                command: cmd.id,
                message,
            });
        }
    }

    fn perform(&self, action: Action) {
        let result = match action {
            Action::SendMasterCode { partition } => self.send_master_code(partition),
            Action::RefreshImage => {
                info!("Refreshing panel image");
                self.commander
                    .request_all_equipment()
                    .and_then(|_| self.commander.request_dynamic_data_refresh())
            }
        };
        if let Err(e) = result {
            warn!("Could not perform {:?}: {}", action, e);
        }
    }

    fn send_master_code(&self, partition: u8) -> Result<()> {
        let Some(pin) = self.commander.master_pin() else {
            debug!("No master code to send");
            return Ok(());
        };
        let keys = pin
            .chars()
            .map(|c| {
                c.to_digit(10)
                    .map(|d| d as u8)
                    .ok_or_else(|| ConcordError::UnknownKey { key: c.to_string() })
            })
            .collect::<Result<Vec<u8>>>()?;
        self.commander.send_keypress(&keys, partition)
    }

    fn stop(&mut self) {
        self.stopped = true;
        if let Err(e) = self.transport.close() {
            warn!("Error closing link: {}", e);
        }
        let _ = self.event_tx.send(PanelEvent::Stopped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LOOPBACK_DEVICE;
    use crate::constants::{ACK, NAK};
    use crate::devices::ZoneKey;
    use crate::transport::{LoopbackHandle, LoopbackLink};

    fn engine_with(config: EngineConfig) -> (Engine<LoopbackLink>, Commander, LoopbackHandle) {
        let (link, handle) = LoopbackLink::new();
        let (engine, commander) = Engine::new(link, config);
        (engine, commander, handle)
    }

    fn engine() -> (Engine<LoopbackLink>, Commander, LoopbackHandle) {
        engine_with(
            EngineConfig::builder()
                .device(LOOPBACK_DEVICE)
                .refresh_on_start(false)
                .build(),
        )
    }

    /// Bytes the engine writes for an unchecksummed frame.
    fn on_wire(frame: &[u8]) -> Vec<u8> {
        let mut frame = frame.to_vec();
        append_checksum(&mut frame);
        let mut wire = vec![b'\n'];
        wire.extend_from_slice(encode_hex(&frame).as_bytes());
        wire
    }

    fn attempts(engine: &Engine<LoopbackLink>) -> Option<u32> {
        match engine.link_state() {
            LinkState::Idle => None,
            LinkState::AwaitingAck { attempts, .. } => Some(*attempts),
        }
    }

    fn record(engine: &Engine<LoopbackLink>, id: CommandId) -> Arc<Mutex<Vec<PanelMessage>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        engine
            .handlers()
            .blocking_write()
            .entry(id)
            .or_default()
            .push(Box::new(move |msg: &PanelMessage| sink.lock().unwrap().push(msg.clone())));
        seen
    }

    #[test]
    fn test_send_then_ack() {
        let (mut engine, commander, handle) = engine();
        let t0 = Instant::now();
        commander.request_dynamic_data_refresh().unwrap();

        assert_eq!(engine.poll_once(t0).unwrap(), Poll::Busy);
        assert_eq!(handle.take_written(), on_wire(&[0x02, 0x20]));
        assert_eq!(attempts(&engine), Some(1));

        handle.push_bytes(&[ACK]);
        engine.poll_once(t0).unwrap();
        assert_eq!(engine.link_state(), &LinkState::Idle);
        assert_eq!(engine.poll_once(t0).unwrap(), Poll::Idle);
    }

    #[test]
    fn test_never_transmits_while_awaiting_ack() {
        let (mut engine, commander, handle) = engine();
        let t0 = Instant::now();
        commander.request_zones().unwrap();
        commander.request_partitions().unwrap();

        engine.poll_once(t0).unwrap();
        assert_eq!(handle.take_written(), on_wire(&[0x03, 0x02, 0x03]));
        engine.poll_once(t0 + Duration::from_millis(500)).unwrap();
        assert!(handle.take_written().is_empty());

        handle.push_bytes(&[ACK]);
        engine.poll_once(t0 + Duration::from_millis(600)).unwrap();
        assert_eq!(handle.take_written(), on_wire(&[0x03, 0x02, 0x04]));
    }

    #[test]
    fn test_retry_bound_then_next_frame() {
        let (mut engine, commander, handle) = engine();
        let mut events = engine.subscribe();
        let t0 = Instant::now();
        commander.arm_stay(1, None).unwrap();
        commander.request_dynamic_data_refresh().unwrap();
        let keypress = on_wire(&[0x05, 0x40, 0x01, 0x00, 0x02]);

        engine.poll_once(t0).unwrap();
        assert_eq!(handle.take_written(), keypress);

        engine.poll_once(t0 + Duration::from_millis(1100)).unwrap();
        assert_eq!(handle.take_written(), keypress);
        assert_eq!(attempts(&engine), Some(2));

        engine.poll_once(t0 + Duration::from_millis(2200)).unwrap();
        assert_eq!(handle.take_written(), keypress);
        assert_eq!(attempts(&engine), Some(3));

        // Third timeout abandons; the same iteration moves on to the next frame
        engine.poll_once(t0 + Duration::from_millis(3300)).unwrap();
        assert_eq!(handle.take_written(), on_wire(&[0x02, 0x20]));
        assert_eq!(attempts(&engine), Some(1));

        match events.try_recv().unwrap() {
            PanelEvent::TransmitAbandoned { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_nak_triggers_immediate_resend() {
        let (mut engine, commander, handle) = engine();
        let t0 = Instant::now();
        commander.request_all_equipment().unwrap();
        engine.poll_once(t0).unwrap();
        handle.take_written();

        handle.push_bytes(&[NAK]);
        engine.poll_once(t0).unwrap();
        assert_eq!(handle.take_written(), on_wire(&[0x02, 0x02]));
        assert_eq!(attempts(&engine), Some(2));

        handle.push_bytes(&[NAK]);
        engine.poll_once(t0).unwrap();
        assert_eq!(attempts(&engine), Some(3));

        // The cap applies to NAKs too
        handle.push_bytes(&[NAK]);
        engine.poll_once(t0).unwrap();
        assert_eq!(engine.link_state(), &LinkState::Idle);
        assert!(handle.take_written().ends_with(&on_wire(&[0x02, 0x02])));
    }

    #[test]
    fn test_spurious_controls_while_idle() {
        let (mut engine, _commander, handle) = engine();
        handle.push_bytes(&[ACK, NAK]);
        assert_eq!(engine.poll_once(Instant::now()).unwrap(), Poll::Idle);
        assert_eq!(engine.link_state(), &LinkState::Idle);
        assert!(handle.take_written().is_empty());
    }

    #[test]
    fn test_valid_frame_acked_and_dispatched() {
        let (mut engine, _commander, handle) = engine();
        let seen = record(&engine, CommandId::ZoneStatus);
        handle.push_frame(&[0x07, 0x21, 0x01, 0x00, 0x00, 0x05, 0x01]);

        assert_eq!(engine.poll_once(Instant::now()).unwrap(), Poll::Busy);
        assert_eq!(handle.take_written(), vec![ACK]);
        assert_eq!(seen.lock().unwrap().len(), 1);
        let state = engine.state();
        assert!(state.blocking_read().zones[&ZoneKey::new(1, 5)].is_tripped());
    }

    #[test]
    fn test_bad_checksum_naks() {
        let (mut engine, _commander, handle) = engine();
        let seen = record(&engine, CommandId::ZoneStatus);
        handle.push_raw_frame(&[0x07, 0x21, 0x01, 0x00, 0x00, 0x05, 0x01, 0x00]);

        engine.poll_once(Instant::now()).unwrap();
        assert_eq!(handle.take_written(), vec![NAK]);
        assert!(seen.lock().unwrap().is_empty());
        assert!(engine.state().blocking_read().zones.is_empty());
    }

    #[test]
    fn test_read_failures_nak() {
        let (mut engine, _commander, handle) = engine();
        handle.push_bytes(b"\n02ZZ00");
        assert_eq!(engine.poll_once(Instant::now()).unwrap(), Poll::Busy);
        assert_eq!(handle.take_written(), vec![NAK]);

        // Truncated frame
        handle.push_bytes(b"\n0421");
        engine.poll_once(Instant::now()).unwrap();
        assert_eq!(handle.take_written(), vec![NAK]);
    }

    #[test]
    fn test_short_frame_not_naked_or_dispatched() {
        let (mut engine, _commander, handle) = engine();
        handle.push_raw_frame(&[0x01, 0x01]);
        engine.poll_once(Instant::now()).unwrap();
        assert!(handle.take_written().is_empty());
    }

    #[test]
    fn test_dispatch_precedence() {
        let (mut engine, _commander, handle) = engine();
        let seen = record(&engine, CommandId::ArmLevel);

        // 0x22 alone is only a prefix: ACKed, then dropped as unknown
        handle.push_frame(&[0x02, 0x22]);
        engine.poll_once(Instant::now()).unwrap();
        assert_eq!(handle.take_written(), vec![ACK]);
        assert!(seen.lock().unwrap().is_empty());

        handle.push_frame(&[0x08, 0x22, 0x01, 0x01, 0x00, 0x00, 0x03, 0x03]);
        engine.poll_once(Instant::now()).unwrap();
        assert_eq!(handle.take_written(), vec![ACK]);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_decoder_error_drops_message() {
        let (mut engine, _commander, handle) = engine();
        let seen = record(&engine, CommandId::ZoneStatus);
        handle.push_frame(&[0x05, 0x21, 0x01, 0x00, 0x05]);
        engine.poll_once(Instant::now()).unwrap();
        // Checksum was fine, so the frame is still ACKed
        assert_eq!(handle.take_written(), vec![ACK]);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let (mut engine, _commander, handle) = engine();
        let order = Arc::new(Mutex::new(Vec::new()));
        for n in 0..3 {
            let order = order.clone();
            engine
                .handlers()
                .blocking_write()
                .entry(CommandId::EqptListDone)
                .or_default()
                .push(Box::new(move |_: &PanelMessage| order.lock().unwrap().push(n)));
        }
        handle.push_frame(&[0x02, 0x08]);
        engine.poll_once(Instant::now()).unwrap();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_synthetic_alarm_bypasses_link() {
        let (mut engine, commander, handle) = engine();
        let seen = record(&engine, CommandId::Alarm);
        commander.inject_alarm_message(1, 0x01, 0x03, 0).unwrap();

        engine.poll_once(Instant::now()).unwrap();
        assert!(handle.take_written().is_empty());
        let seen = seen.lock().unwrap();
        match &seen[..] {
            [PanelMessage::Alarm(alarm)] => {
                assert_eq!(alarm.source_type, "System");
                assert_eq!(alarm.source_number, 1);
                assert_eq!(alarm.specific_type, "Police");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_stop_after_queued_frames() {
        let (mut engine, commander, handle) = engine();
        let mut events = engine.subscribe();
        let t0 = Instant::now();
        commander.request_dynamic_data_refresh().unwrap();
        commander.stop().unwrap();

        engine.poll_once(t0).unwrap();
        assert_eq!(engine.poll_once(t0).unwrap(), Poll::Idle);
        assert!(!handle.is_closed());

        handle.push_bytes(&[ACK]);
        assert_eq!(engine.poll_once(t0).unwrap(), Poll::Stopped);
        assert!(handle.is_closed());
        assert!(matches!(events.try_recv().unwrap(), PanelEvent::Stopped));
        assert_eq!(engine.poll_once(t0).unwrap(), Poll::Stopped);
    }

    #[test]
    fn test_master_code_action() {
        let (mut engine, _commander, handle) = engine_with(
            EngineConfig::builder()
                .refresh_on_start(false)
                .master_pin("1234")
                .resend_master_code_on_arm(true)
                .build(),
        );
        handle.push_frame(&[0x08, 0x22, 0x01, 0x02, 0x00, 0x00, 0x03, 0x02]);
        engine.poll_once(Instant::now()).unwrap();

        let mut expected = vec![ACK];
        expected.extend(on_wire(&[0x08, 0x40, 0x02, 0x00, 0x01, 0x02, 0x03, 0x04]));
        assert_eq!(handle.take_written(), expected);
    }

    #[test]
    fn test_refresh_image_action() {
        let (mut engine, _commander, handle) = engine_with(
            EngineConfig::builder()
                .refresh_on_start(false)
                .refresh_on_image_loss(true)
                .build(),
        );
        let t0 = Instant::now();
        handle.push_frame(&[0x02, 0x20]);
        engine.poll_once(t0).unwrap();
        let mut expected = vec![ACK];
        expected.extend(on_wire(&[0x02, 0x02]));
        assert_eq!(handle.take_written(), expected);

        handle.push_bytes(&[ACK]);
        engine.poll_once(t0).unwrap();
        assert_eq!(handle.take_written(), on_wire(&[0x02, 0x20]));
        assert_eq!(engine.state().blocking_read().panel.image_clears, 1);
    }

    #[test]
    fn test_initial_requests() {
        let (mut engine, _commander, handle) = engine_with(EngineConfig::default());
        engine.queue_initial_requests().unwrap();
        engine.poll_once(Instant::now()).unwrap();
        assert_eq!(handle.take_written(), on_wire(&[0x03, 0x02, 0x03]));
    }

    #[test]
    fn test_commander_key_sequences() {
        let (mut engine, commander, handle) = engine();
        let t0 = Instant::now();
        commander.arm_away(1, Some(ArmOption::Silent)).unwrap();
        commander.arm_stay(1, Some(ArmOption::Instant)).unwrap();
        commander.disarm("0520", 1).unwrap();
        commander.send_keys(&["1", "#"], true, 2).unwrap();

        let mut sent = Vec::new();
        for _ in 0..4 {
            engine.poll_once(t0).unwrap();
            sent.push(handle.take_written());
            handle.push_bytes(&[ACK]);
        }
        assert_eq!(sent[0], on_wire(&[0x06, 0x40, 0x01, 0x00, 0x05, 0x03]));
        assert_eq!(sent[1], on_wire(&[0x06, 0x40, 0x01, 0x00, 0x02, 0x04]));
        assert_eq!(sent[2], on_wire(&[0x05, 0x40, 0x01, 0x00, 0x20]));
        assert_eq!(sent[3], on_wire(&[0x06, 0x40, 0x02, 0x00, 0x01, 0x0B]));
        assert_eq!(commander.master_pin().as_deref(), Some("0520"));
    }

    #[test]
    fn test_send_keys_unknown_name_queues_nothing() {
        let (mut engine, commander, handle) = engine();
        let err = commander.send_keys(&["1", "Bogus"], false, 1).unwrap_err();
        assert!(matches!(err, ConcordError::UnknownKey { key } if key == "Bogus"));
        engine.poll_once(Instant::now()).unwrap();
        assert!(handle.take_written().is_empty());
    }

    /// Loopback link that takes 2ms to deliver each inbound byte.
    struct SlowLink(LoopbackLink);

    impl SerialLink for SlowLink {
        fn bytes_waiting(&mut self) -> Result<bool> {
            self.0.bytes_waiting()
        }

        fn read_byte(&mut self) -> Result<Option<u8>> {
            let byte = self.0.read_byte()?;
            if byte.is_some() {
                std::thread::sleep(Duration::from_millis(2));
            }
            Ok(byte)
        }

        fn write_all(&mut self, data: &[u8]) -> Result<()> {
            self.0.write_all(data)
        }

        fn close(&mut self) -> Result<()> {
            self.0.close()
        }
    }

    #[test]
    fn test_send_time_includes_blocking_read() {
        let (link, handle) = LoopbackLink::new();
        let (mut engine, commander) = Engine::new(
            SlowLink(link),
            EngineConfig::builder()
                .device(LOOPBACK_DEVICE)
                .refresh_on_start(false)
                .build(),
        );
        commander.request_dynamic_data_refresh().unwrap();
        // 17 bytes on the wire: start, then 8 hex-encoded bytes
        handle.push_frame(&[0x07, 0x21, 0x01, 0x00, 0x00, 0x05, 0x01]);

        let t0 = Instant::now();
        engine.poll_once(t0).unwrap();
        let mut written = handle.take_written();
        assert_eq!(written.remove(0), ACK);
        assert_eq!(written, on_wire(&[0x02, 0x20]));
        match engine.link_state() {
            LinkState::AwaitingAck { sent_at, .. } => {
                assert!(sent_at.duration_since(t0) >= Duration::from_millis(34));
            }
            LinkState::Idle => panic!("frame not sent"),
        }
    }
}
