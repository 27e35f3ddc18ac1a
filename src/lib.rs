//! # LOGO! V-Memory Library
//!
//! A Rust library for typed access to the V-memory of Siemens LOGO! (0BA7 and
//! later) and S7 data blocks over ISO-on-TCP (S7comm).
//!
//! This is a **protocol-only** library: no polling, schedulers, caching, or
//! reconnection. Each read maps to one block read, each write to one block
//! write (plus one read for a bit write), and each batch to exactly one read
//! and one write.
//!
//! ## Features
//!
//! - **Typed addresses**: `V2.4`, `V94`, `VW31`, `VD3` parsed into [`Address`]
//! - **Batched writes**: many values, one read-modify-write ([`WritePlan`])
//! - **Pluggable I/O**: any [`BlockTransport`]; [`S7Transport`] ships in-crate
//! - **No panics**: all errors returned as `Result<T, VmError>`
//! - **Utility functions**: bit manipulation and formatting helpers
//!
//! ## Quick Start
//!
//! ```no_run
//! use logo_vm::{Address, AddressedValue, Client, ClientConfig};
//! use std::net::Ipv4Addr;
//!
//! fn main() -> logo_vm::Result<()> {
//!     // LOGO! defaults: port 102, TSAP 0x0100 -> 0x0200, block 1
//!     let config = ClientConfig::new(Ipv4Addr::new(192, 168, 0, 3));
//!     let mut client = Client::new(config)?;
//!
//!     // Single values
//!     client.write(Address::parse("V94")?, 55)?;
//!     let v94 = client.read(Address::parse("V94")?)?;
//!     println!("V94 = {}", v94);
//!
//!     // Bits leave their neighbours alone
//!     client.write(Address::parse("V2.4")?, 1)?;
//!
//!     // One read and one write for the whole batch
//!     client.write_many(&[
//!         AddressedValue::parse("VD3", 7)?,
//!         AddressedValue::parse("V2.4", 0)?,
//!         AddressedValue::parse("VW31", 300)?,
//!     ])?;
//!
//!     client.disconnect()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Addresses
//!
//! | Syntax | Type | Bytes | Encoding |
//! |--------|------|:-----:|----------|
//! | `V<n>.<b>` | [`DataType::Bit`] | 1 | bit `b` (0-7) of byte `n` |
//! | `V<n>` | [`DataType::Byte`] | 1 | low 8 bits |
//! | `VW<n>` | [`DataType::Word`] | 2 | big-endian, low 16 bits |
//! | `VD<n>` | [`DataType::DWord`] | 4 | big-endian |
//!
//! Counter, Timer and Real are constructed directly ([`Address::from_parts`]
//! or the enum variants). Counter and Timer behave like `VW`; Real stores
//! the value converted to an IEEE-754 `f32`, and reading it back truncates
//! toward zero.
//!
//! ```
//! use logo_vm::{Address, DataType};
//!
//! let address: Address = "VW31".parse()?;
//! assert_eq!(address.data_type(), DataType::Word);
//! assert_eq!(address.byte(), 31);
//! assert_eq!(address.to_string(), "VW31");
//!
//! assert!(Address::parse("V2.8").is_err());
//! assert!(Address::parse("M1").is_err());
//! # Ok::<(), logo_vm::VmError>(())
//! ```
//!
//! ## Custom Transports
//!
//! The client only needs block reads and writes, so it runs against anything
//! implementing [`BlockTransport`]: a simulator, a recorded session, or a
//! different wire protocol.
//!
//! ```no_run
//! use logo_vm::{BlockTransport, Client, S7Transport, TsapPair};
//! use std::time::Duration;
//!
//! let transport = S7Transport::new(
//!     "192.168.0.3:102".parse().unwrap(),
//!     Duration::from_secs(1),
//!     TsapPair::default(),
//! );
//! let boxed: Box<dyn BlockTransport> = Box::new(transport);
//! let client = Client::with_transport(boxed, 1)?;
//! assert!(client.is_connected());
//! # Ok::<(), logo_vm::VmError>(())
//! ```
//!
//! ## Utility Functions
//!
//! The [`utils`] module provides helpers for inspecting raw bytes:
//!
//! ```
//! use logo_vm::utils::{get_bit, set_bit, format_binary};
//!
//! let value: u8 = 0b1010_0101;
//!
//! assert!(get_bit(value, 0));
//! assert!(!get_bit(value, 1));
//!
//! let modified = set_bit(value, 1, true);
//! assert_eq!(modified, 0b1010_0111);
//!
//! assert_eq!(format_binary(value), "0b1010_0101");
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, VmError>`]. Address and batch problems
//! are reported before any I/O; transport failures pass through unchanged
//! inside [`VmError::Transport`].
//!
//! ```no_run
//! use logo_vm::{Address, Client, ClientConfig, TransportError, VmError};
//! use std::net::Ipv4Addr;
//!
//! let mut client = Client::new(ClientConfig::new(Ipv4Addr::new(192, 168, 0, 3)))?;
//!
//! match client.read(Address::parse("VD3")?) {
//!     Ok(value) => println!("VD3 = {}", value),
//!     Err(VmError::Transport(TransportError::Timeout)) => println!("Communication timeout"),
//!     Err(VmError::Transport(TransportError::ItemError { code })) => {
//!         println!("PLC refused item: 0x{:02X}", code);
//!     }
//!     Err(e) => println!("Error: {}", e),
//! }
//! # Ok::<(), VmError>(())
//! ```
//!
//! ## Configuration
//!
//! ```no_run
//! use logo_vm::{ClientConfig, WindowSizing};
//! use std::net::Ipv4Addr;
//! use std::time::Duration;
//!
//! let config = ClientConfig::new(Ipv4Addr::new(192, 168, 0, 3))
//!     .with_port(102)                             // Default: 102
//!     .with_timeout(Duration::from_secs(5))       // Default: 2s
//!     .with_tsap(0x0100, 0x0200)                  // Default LOGO! TSAPs
//!     .with_pdu_length(240)                       // Default: 480
//!     .with_block(1)                              // Default: 1
//!     .with_window_sizing(WindowSizing::Legacy);  // Default: Covering
//! ```
//!
//! ## Concurrency
//!
//! Every [`Client`] operation takes `&mut self`, so calls on one session
//! never interleave. Share a client across threads behind a `Mutex`.
//!
//! ## Logging
//!
//! The crate logs through the [`log`](https://docs.rs/log) facade: session
//! setup and teardown at `debug`, frames and coalesced windows at `trace`.
//! Errors are returned, never logged.

#![warn(clippy::all)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod address;
mod client;
pub mod codec;
mod coalesce;
mod command;
mod error;
mod header;
mod memory;
mod response;
mod transport;
pub mod utils;

// Public re-exports
pub use address::{Address, AddressedValue, MAX_BIT};
pub use client::{Client, ClientConfig, DEFAULT_BLOCK};
pub use coalesce::{WindowSizing, WritePlan};
pub use command::{
    ReadVarRequest, SetupCommunication, WriteVarRequest, DEFAULT_PDU_LENGTH, MAX_BYTE_OFFSET,
    READ_PDU_OVERHEAD, S7_JOB_HEADER_SIZE, WRITE_PDU_OVERHEAD,
};
pub use error::{item_error_description, Result, TransportError, VmError};
pub use header::{
    check_connection_confirm, ConnectionRequest, TpktHeader, TsapPair, COTP_DATA_HEADER_SIZE,
    TPKT_HEADER_SIZE,
};
pub use memory::DataType;
pub use response::{S7Response, S7_ACK_HEADER_SIZE};
pub use transport::{BlockTransport, S7Transport, DEFAULT_S7_PORT, DEFAULT_TIMEOUT};
