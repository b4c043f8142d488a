//! Example: Subscribe to zone messages and print changes.
//!
//! Pass a serial device to use real hardware. With no argument the panel
//! end of an in-memory link replays a zone opening and closing.

use std::time::Duration;

use concord_bridge::config::LOOPBACK_DEVICE;
use concord_bridge::constants::ACK;
use concord_bridge::{ConcordPanel, EngineConfig, LoopbackHandle, PanelEvent, PanelMessage};

// ZONE_DATA for partition 1 zone 5, text "DOOR"
const ZONE_DATA: [u8; 13] = [
    0x0D, 0x03, 0x01, 0x00, 0x0A, 0x00, 0x05, 0x00, 0x00, 0x14, 0x1F, 0x1F, 0x22,
];
const ZONE_TRIPPED: [u8; 7] = [0x07, 0x21, 0x01, 0x00, 0x00, 0x05, 0x01];
const ZONE_NORMAL: [u8; 7] = [0x07, 0x21, 0x01, 0x00, 0x00, 0x05, 0x00];

async fn simulate_panel(handle: LoopbackHandle) {
    for frame in [&ZONE_DATA[..], &ZONE_TRIPPED, &ZONE_NORMAL] {
        tokio::time::sleep(Duration::from_secs(1)).await;
        // Acknowledge whatever the engine sent in the meantime
        if !handle.take_written().is_empty() {
            handle.push_bytes(&[ACK]);
        }
        handle.push_frame(frame);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let device = std::env::args().nth(1);
    let config = EngineConfig::builder()
        .device(device.as_deref().unwrap_or(LOOPBACK_DEVICE))
        .refresh_on_start(device.is_some())
        .build();

    let panel = match device {
        Some(_) => ConcordPanel::start(config)?,
        None => {
            let (panel, handle) = ConcordPanel::start_loopback(config);
            tokio::spawn(simulate_panel(handle));
            panel
        }
    };
    let mut events = panel.subscribe();

    println!("Listening for zone messages (Ctrl+C to stop)...\n");

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(PanelEvent::Message { message: PanelMessage::ZoneData(zone), .. }) => {
                        println!("Zone {} '{}' on partition {}", zone.zone_number, zone.zone_text, zone.partition_number);
                    }
                    Ok(PanelEvent::Message { message: PanelMessage::ZoneStatus { partition_number, zone_number, zone_state, .. }, .. }) => {
                        println!("Zone {} (partition {}): {}", zone_number, partition_number, zone_state.labels().join(", "));
                    }
                    Ok(PanelEvent::Stopped) => {
                        println!("Engine stopped!");
                        break;
                    }
                    Ok(event) => {
                        println!("Event: {:?}", event);
                    }
                    Err(e) => {
                        println!("Event channel error: {}", e);
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nStopping...");
                break;
            }
        }
    }

    panel.shutdown().await?;
    Ok(())
}
