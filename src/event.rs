// MIT License - Copyright (c) 2026 Peter Wright
// Events broadcast by the engine

use serde::Serialize;

use crate::protocol::{CommandId, PanelMessage};

/// All events that can be emitted by the engine.
///
/// Users subscribe via `panel.subscribe()` to receive a
/// `tokio::sync::broadcast::Receiver<PanelEvent>`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PanelEvent {
    /// A frame was decoded into a caller-visible message
    Message {
        command: CommandId,
        message: PanelMessage,
    },
    /// An outbound frame was given up on after the maximum number of attempts
    TransmitAbandoned {
        frame: Vec<u8>,
        attempts: u32,
    },
    /// The engine loop has closed the link and exited
    Stopped,
}

/// Type alias for the broadcast sender.
pub type EventSender = tokio::sync::broadcast::Sender<PanelEvent>;

/// Type alias for the broadcast receiver.
pub type EventReceiver = tokio::sync::broadcast::Receiver<PanelEvent>;

/// Create a new event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    tokio::sync::broadcast::channel(capacity)
}
