// End-to-end engine tests over the in-memory link
//
// The synchronous tests drive `Engine::poll_once` with explicit instants so
// timeouts need no sleeping. The async tests run the full panel worker.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::json;

use concord_bridge::codec::{append_checksum, encode_hex};
use concord_bridge::config::LOOPBACK_DEVICE;
use concord_bridge::constants::{ACK, MSG_START, NAK};
use concord_bridge::devices::ZoneKey;
use concord_bridge::{
    CommandId, ConcordPanel, Engine, EngineConfig, LinkState, LoopbackHandle, LoopbackLink,
    PanelEvent, PanelMessage, Poll, ZoneState,
};

const ZONE_STATUS_TRIPPED: [u8; 7] = [0x07, 0x21, 0x01, 0x00, 0x00, 0x05, 0x01];

fn test_config() -> EngineConfig {
    EngineConfig::builder()
        .device(LOOPBACK_DEVICE)
        .refresh_on_start(false)
        .poll_interval(Duration::from_millis(5))
        .build()
}

fn on_wire(frame: &[u8]) -> Vec<u8> {
    let mut frame = frame.to_vec();
    append_checksum(&mut frame);
    let mut wire = vec![MSG_START];
    wire.extend_from_slice(encode_hex(&frame).as_bytes());
    wire
}

fn engine() -> (Engine<LoopbackLink>, concord_bridge::Commander, LoopbackHandle) {
    let (link, handle) = LoopbackLink::new();
    let (engine, commander) = Engine::new(link, test_config());
    (engine, commander, handle)
}

fn record_zone_status(engine: &Engine<LoopbackLink>) -> Arc<Mutex<Vec<PanelMessage>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    engine
        .handlers()
        .blocking_write()
        .entry(CommandId::ZoneStatus)
        .or_default()
        .push(Box::new(move |msg: &PanelMessage| {
            sink.lock().unwrap().push(msg.clone())
        }));
    seen
}

#[test]
fn test_valid_zone_status_is_acked_stored_and_handled() {
    let (mut engine, _commander, handle) = engine();
    let seen = record_zone_status(&engine);
    handle.push_frame(&ZONE_STATUS_TRIPPED);

    assert_eq!(engine.poll_once(Instant::now()).unwrap(), Poll::Busy);
    assert_eq!(handle.take_written(), vec![ACK]);

    let state = engine.state();
    let zone = state.blocking_read().zones[&ZoneKey::new(1, 5)].clone();
    assert_eq!(zone.zone_state, ZoneState::TRIPPED);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(
        seen[0],
        PanelMessage::ZoneStatus {
            partition_number: 1,
            area_number: 0,
            zone_number: 5,
            zone_state: ZoneState::TRIPPED,
        }
    );
}

#[test]
fn test_corrupted_checksum_is_naked_and_ignored() {
    let (mut engine, _commander, handle) = engine();
    let seen = record_zone_status(&engine);
    let mut frame = ZONE_STATUS_TRIPPED.to_vec();
    append_checksum(&mut frame);
    let last = frame.len() - 1;
    frame[last] ^= 0x01;
    handle.push_raw_frame(&frame);

    engine.poll_once(Instant::now()).unwrap();
    assert_eq!(handle.take_written(), vec![NAK]);
    assert!(engine.state().blocking_read().zones.is_empty());
    assert!(seen.lock().unwrap().is_empty());
}

#[test]
fn test_unacked_arm_stay_is_abandoned_and_engine_moves_on() {
    let (mut engine, commander, handle) = engine();
    let mut events = engine.subscribe();
    let t0 = Instant::now();
    let keypress = on_wire(&[0x05, 0x40, 0x01, 0x00, 0x02]);

    commander.arm_stay(1, None).unwrap();
    engine.poll_once(t0).unwrap();
    assert_eq!(handle.take_written(), keypress);

    for (step, ms) in [1_010u64, 2_020].into_iter().enumerate() {
        engine.poll_once(t0 + Duration::from_millis(ms)).unwrap();
        assert_eq!(handle.take_written(), keypress, "retry {}", step + 1);
    }

    // Third timeout gives up; nothing else is queued yet
    engine.poll_once(t0 + Duration::from_millis(3_030)).unwrap();
    assert!(handle.take_written().is_empty());
    assert_eq!(engine.link_state(), &LinkState::Idle);
    match events.try_recv().unwrap() {
        PanelEvent::TransmitAbandoned { frame, attempts } => {
            assert_eq!(attempts, 3);
            assert_eq!(frame[1], 0x40);
        }
        other => panic!("unexpected {:?}", other),
    }

    commander.request_dynamic_data_refresh().unwrap();
    engine.poll_once(t0 + Duration::from_millis(3_040)).unwrap();
    assert_eq!(handle.take_written(), on_wire(&[0x02, 0x20]));

    handle.push_bytes(&[ACK]);
    engine.poll_once(t0 + Duration::from_millis(3_050)).unwrap();
    assert_eq!(engine.link_state(), &LinkState::Idle);
}

#[test]
fn test_inbound_frame_while_awaiting_ack() {
    let (mut engine, commander, handle) = engine();
    let t0 = Instant::now();
    commander.request_zones().unwrap();
    engine.poll_once(t0).unwrap();
    handle.take_written();

    // The panel may interleave its own frame before acknowledging ours
    handle.push_frame(&ZONE_STATUS_TRIPPED);
    handle.push_bytes(&[ACK]);
    engine.poll_once(t0).unwrap();
    assert_eq!(handle.take_written(), vec![ACK]);
    assert!(engine.state().blocking_read().zones.contains_key(&ZoneKey::new(1, 5)));

    engine.poll_once(t0).unwrap();
    assert_eq!(engine.link_state(), &LinkState::Idle);
}

#[test]
fn test_ack_inside_inbound_frame_completes_pending_send() {
    let (mut engine, commander, handle) = engine();
    let t0 = Instant::now();
    commander.request_zones().unwrap();
    engine.poll_once(t0).unwrap();
    handle.take_written();

    let mut wire = on_wire(&ZONE_STATUS_TRIPPED);
    wire.insert(5, ACK);
    handle.push_bytes(&wire);
    engine.poll_once(t0).unwrap();

    assert_eq!(handle.take_written(), vec![ACK]);
    assert_eq!(engine.link_state(), &LinkState::Idle);
    assert!(engine.state().blocking_read().zones.contains_key(&ZoneKey::new(1, 5)));
}

#[test]
fn test_short_and_truncated_frames() {
    let (mut engine, _commander, handle) = engine();

    // Zero length: nothing to acknowledge
    handle.push_bytes(b"\n00");
    assert_eq!(engine.poll_once(Instant::now()).unwrap(), Poll::Busy);
    assert!(handle.take_written().is_empty());

    // Length promises more than arrives
    handle.push_bytes(b"\nFF");
    assert_eq!(engine.poll_once(Instant::now()).unwrap(), Poll::Busy);
    assert_eq!(handle.take_written(), vec![NAK]);
    assert!(engine.state().blocking_read().zones.is_empty());
}

#[test]
fn test_event_json_shape() {
    let event = PanelEvent::Message {
        command: CommandId::ZoneStatus,
        message: PanelMessage::ZoneStatus {
            partition_number: 1,
            area_number: 0,
            zone_number: 5,
            zone_state: ZoneState::empty(),
        },
    };
    let value = serde_json::to_value(&event).unwrap();
    assert_eq!(value["event"], json!("message"));
    assert_eq!(value["command"], json!("ZONE_STATUS"));
    assert_eq!(value["message"]["type"], json!("zone_status"));
    assert_eq!(value["message"]["zone_number"], json!(5));

    let abandoned = PanelEvent::TransmitAbandoned {
        frame: vec![0x02, 0x20, 0x22],
        attempts: 3,
    };
    assert_eq!(
        serde_json::to_value(&abandoned).unwrap(),
        json!({"event": "transmit_abandoned", "frame": [2, 32, 34], "attempts": 3})
    );
    assert_eq!(
        serde_json::to_value(&PanelEvent::Stopped).unwrap(),
        json!({"event": "stopped"})
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_panel_worker_handles_frames_and_shuts_down() {
    let (panel, handle) = ConcordPanel::start_loopback(test_config());
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    panel
        .register_handler(CommandId::ZoneStatus, move |msg| {
            let _ = tx.send(msg.clone());
        })
        .await;
    let mut events = panel.subscribe();

    handle.push_frame(&ZONE_STATUS_TRIPPED);

    let msg = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("handler not invoked")
        .expect("handler channel closed");
    assert!(matches!(msg, PanelMessage::ZoneStatus { zone_number: 5, .. }));

    let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(
        event,
        PanelEvent::Message { command: CommandId::ZoneStatus, .. }
    ));

    let zone = panel.zone(1, 5).await.expect("zone stored");
    assert!(zone.is_tripped());
    assert_eq!(handle.take_written(), vec![ACK]);

    panel.shutdown().await.unwrap();
    assert!(handle.is_closed());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_panel_commands_reach_the_wire() {
    let (panel, handle) = ConcordPanel::start_loopback(test_config());
    panel.arm_away(1, None).unwrap();

    let expected = on_wire(&[0x05, 0x40, 0x01, 0x00, 0x03]);
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    let mut written = Vec::new();
    while written.len() < expected.len() && tokio::time::Instant::now() < deadline {
        written.extend(handle.take_written());
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(written, expected);

    handle.push_bytes(&[ACK]);
    panel.shutdown().await.unwrap();
    assert!(handle.is_closed());
}
