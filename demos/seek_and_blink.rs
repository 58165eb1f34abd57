//! Basic example: seek the LED board, blink it, and disconnect
//!
//! Run with: cargo run --example seek_and_blink

use ledboard_ble::{BoardEvent, BoardManager, Result};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ledboard_ble=debug".parse().unwrap()),
        )
        .init();

    println!("Starting LED board discovery...");
    println!("Make sure the board is powered and in range!\n");

    let manager = BoardManager::new().await?;

    // Print lifecycle events as they happen
    let mut events = manager.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                BoardEvent::AdapterChanged(state) => println!("  adapter: {}", state),
                BoardEvent::BoardDiscovered(board) => {
                    println!(
                        "  discovered: {} [{}] ({:?} dBm)",
                        board.display_name(),
                        board.identifier,
                        board.rssi
                    );
                }
                BoardEvent::Connected { identifier } => println!("  connected: {}", identifier),
                BoardEvent::ConnectFailed { identifier, reason } => {
                    println!("  connect failed: {} ({})", identifier, reason);
                }
                BoardEvent::Disconnected { identifier, reason } => {
                    println!("  disconnected: {} ({:?})", identifier, reason);
                }
                BoardEvent::ServicesResolved { identifier } => {
                    println!("  service resolved on {}", identifier);
                }
                BoardEvent::CharacteristicsResolved { identifier } => {
                    println!("  ready: {}", identifier);
                }
                BoardEvent::FlagsChanged(flags) => {
                    println!(
                        "  flags: start={} seeking={} led={}",
                        flags.can_start_connect, flags.seeking_for_board, flags.can_control_led
                    );
                }
            }
        }
    });

    // The adapter needs a moment to report powered on
    tokio::time::sleep(Duration::from_secs(1)).await;

    manager.start_seeking().await?;
    println!("Seeking for up to 30 seconds. Press Ctrl+C to exit early.\n");

    // Wait for the board to become ready
    let mut ready = false;
    for _ in 0..60 {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(500)) => {}
            _ = tokio::signal::ctrl_c() => {
                println!("\nInterrupted!");
                manager.shutdown().await?;
                return Ok(());
            }
        }
        if manager.can_control_led() {
            ready = true;
            break;
        }
    }

    if !ready {
        println!("No board became ready; giving up.");
        manager.shutdown().await?;
        return Ok(());
    }

    println!("\nBlinking...");
    for _ in 0..3 {
        manager.led_on().await?;
        tokio::time::sleep(Duration::from_millis(400)).await;
        manager.led_off().await?;
        tokio::time::sleep(Duration::from_millis(400)).await;
    }

    println!("Sending preset sequence...");
    manager.send_preset().await?;

    manager.disconnect_current().await?;
    manager.shutdown().await?;

    println!("\n--- Session log ---");
    print!("{}", manager.log().render());

    println!("\nDone!");
    Ok(())
}
