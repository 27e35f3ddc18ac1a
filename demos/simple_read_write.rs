//! Example: Reading and writing single V-memory values
//!
//! Run with: cargo run --example simple_read_write -- 192.168.0.3
//!
//! This example demonstrates:
//! - Connecting with LOGO! defaults
//! - Writing and reading bytes, words and double words
//! - Setting a bit without touching its neighbours
//! - Matching on transport errors

use logo_vm::utils::format_binary;
use logo_vm::{Address, Client, ClientConfig, TransportError, VmError};
use std::net::Ipv4Addr;

fn main() -> logo_vm::Result<()> {
    let ip: Ipv4Addr = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(Ipv4Addr::new(192, 168, 0, 3));

    let mut client = Client::new(ClientConfig::new(ip))?;
    println!("Connected to {}", ip);

    // =========================================================================
    // Bytes, Words and Double Words
    // =========================================================================

    println!("=== Values ===\n");

    for (text, value) in [("V94", 55), ("VW31", 300), ("VD3", 70_000)] {
        let address: Address = text.parse()?;
        client.write(address, value)?;
        println!("{} <- {}, read back {}", address, value, client.read(address)?);
    }

    // Values wider than the address are truncated to its width
    let v10 = Address::parse("V10")?;
    client.write(v10, 0x1FF)?;
    println!("{} <- 0x1FF, read back 0x{:02X}", v10, client.read(v10)?);

    // =========================================================================
    // Bits
    // =========================================================================

    println!("\n=== Bits ===\n");

    let v2 = Address::parse("V2")?;
    client.write(Address::parse("V2.4")?, 1)?;
    client.write(Address::parse("V2.5")?, 0)?;
    println!("V2 = {}", format_binary(client.read(v2)? as u8));

    // =========================================================================
    // Error Handling
    // =========================================================================

    println!("\n=== Errors ===\n");

    match Address::parse("VW31.2") {
        Err(VmError::AddressFormat { input, reason }) => println!("'{}': {}", input, reason),
        other => println!("unexpected: {:?}", other),
    }

    match client.read(Address::parse("VD65000")?) {
        Ok(value) => println!("VD65000 = {}", value),
        Err(VmError::Transport(TransportError::ItemError { code })) => {
            println!("PLC refused item: 0x{:02X}", code)
        }
        Err(e) => return Err(e),
    }

    client.disconnect()?;
    println!("\nDisconnected");
    Ok(())
}
