//! Example: Coalesced batch writes
//!
//! Run with: cargo run --example batch_write -- 192.168.0.3
//!
//! This example demonstrates:
//! - Writing scattered values with one read and one write
//! - Inspecting the window a batch covers
//! - Legacy window sizing

use logo_vm::{AddressedValue, Client, ClientConfig, WindowSizing, WritePlan};
use std::net::Ipv4Addr;
use std::time::Duration;

fn main() -> logo_vm::Result<()> {
    let ip: Ipv4Addr = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(Ipv4Addr::new(192, 168, 0, 3));

    let config = ClientConfig::new(ip).with_timeout(Duration::from_secs(1));
    let mut client = Client::new(config)?;

    let batch = [
        AddressedValue::parse("VD3", 7)?,
        AddressedValue::parse("V2.4", 0)?,
        AddressedValue::parse("V94", 55)?,
        AddressedValue::parse("VW31", 300)?,
    ];

    // =========================================================================
    // Covering Window (default)
    // =========================================================================

    let plan = WritePlan::new(&batch, client.window_sizing())?;
    println!("Batch covers V{}..V{} ({} bytes)", plan.start(), plan.end(), plan.len());

    client.write_many(&batch)?;
    for entry in &batch {
        println!("{} = {}", entry.address, client.read(entry.address)?);
    }

    // =========================================================================
    // Legacy Window
    // =========================================================================

    let mut client = client.with_window_sizing(WindowSizing::Legacy);
    let legacy = WritePlan::new(&batch, WindowSizing::Legacy)?;
    println!("\nLegacy window: V{} + {} bytes", legacy.start(), legacy.len());

    // A word at the highest offset does not fit the legacy window
    let overflowing = [
        AddressedValue::parse("V2", 1)?,
        AddressedValue::parse("VW31", 300)?,
    ];
    match client.write_many(&overflowing) {
        Ok(()) => println!("written"),
        Err(e) => println!("refused: {}", e),
    }

    client.disconnect()?;
    Ok(())
}
