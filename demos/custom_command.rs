//! Send a custom byte payload entered as hex tokens
//!
//! Run with: cargo run --example custom_command -- "0x1A 04 7F"

use ledboard_ble::{BoardManager, CommandRequest, Result};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ledboard_ble=info".parse().unwrap()),
        )
        .init();

    let text = std::env::args().nth(1).unwrap_or_else(|| "0x01".to_string());

    // Malformed tokens are rejected up front, with their position
    let request = match CommandRequest::from_text(&text) {
        Ok(request) => request,
        Err(e) => {
            eprintln!("Invalid payload: {}", e);
            std::process::exit(1);
        }
    };

    println!(
        "Seeking board to send {} byte(s): {}",
        request.payload().len(),
        ledboard_ble::format_payload(request.payload())
    );

    let manager = BoardManager::new().await?;

    tokio::time::sleep(Duration::from_secs(1)).await;
    manager.start_seeking().await?;

    for _ in 0..60 {
        tokio::time::sleep(Duration::from_millis(500)).await;
        if manager.can_control_led() {
            break;
        }
    }

    if !manager.can_control_led() {
        println!("No board became ready; giving up.");
        manager.shutdown().await?;
        return Ok(());
    }

    manager.send_command(request).await?;
    println!("Sent.");

    manager.disconnect_current().await?;
    manager.shutdown().await?;

    Ok(())
}
