//! Example: Arm and disarm a partition.
//!
//! Usage: partition_commands <device> <pin>

use concord_bridge::{ArmOption, ConcordPanel, EngineConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let device = args.next().unwrap_or_else(|| "/dev/ttyUSB0".to_string());
    let pin = args.next().unwrap_or_else(|| "1234".to_string());

    let config = EngineConfig::builder().device(device).build();
    let panel = ConcordPanel::start(config)?;

    // Give the panel time to send its partition list
    tokio::time::sleep(tokio::time::Duration::from_secs(3)).await;

    // Show current partition states
    for part in panel.partitions().await {
        println!(
            "Partition {}: {} (level={}, armed={})",
            part.partition_number,
            part.partition_text,
            part.arming_level.label(),
            part.is_armed()
        );
    }

    println!("\nArming partition 1 in stay mode...");
    if let Err(e) = panel.arm_stay(1, Some(ArmOption::Silent)) {
        println!("Error arming partition 1: {}", e);
    }

    // Wait a bit then disarm
    tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
    match panel.partition(1).await {
        Some(part) => println!("Partition 1 is now {}", part.arming_level.label()),
        None => println!("Partition 1 not reported by the panel"),
    }

    println!("\nDisarming partition 1...");
    if let Err(e) = panel.disarm(&pin, 1) {
        println!("Error disarming partition 1: {}", e);
    }

    tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;
    panel.shutdown().await?;
    Ok(())
}
