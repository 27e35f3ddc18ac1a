//! High-level V-memory client.
//!
//! This module provides the [`Client`] struct, the primary interface for
//! typed access to a LOGO! (or S7) data block.
//!
//! # Overview
//!
//! The client:
//! - Turns typed addresses into byte ranges of one configured block
//! - Encodes and decodes values through the [`codec`](crate::codec)
//! - Coalesces batched writes into a single read-modify-write
//!   ([`WritePlan`])
//! - Hands raw I/O to a [`BlockTransport`]
//!
//! # Example
//!
//! ```no_run
//! use logo_vm::{Address, AddressedValue, Client, ClientConfig};
//! use std::net::Ipv4Addr;
//!
//! let config = ClientConfig::new(Ipv4Addr::new(192, 168, 0, 3));
//! let mut client = Client::new(config)?;
//!
//! let vw31: Address = "VW31".parse()?;
//! client.write(vw31, 300)?;
//! assert_eq!(client.read(vw31)?, 300);
//!
//! client.write_many(&[
//!     AddressedValue::parse("VD3", 7)?,
//!     AddressedValue::parse("V2.4", 0)?,
//!     AddressedValue::parse("V94", 55)?,
//! ])?;
//!
//! client.disconnect()?;
//! # Ok::<(), logo_vm::VmError>(())
//! ```
//!
//! # Configuration
//!
//! The [`ClientConfig`] struct allows customization of:
//! - PLC IP address and port
//! - Local and remote TSAP (or rack/slot)
//! - Communication timeout and requested PDU length
//! - Block number and batch window sizing
//!
//! # Thread Safety
//!
//! Every operation takes `&mut self` and performs blocking I/O on one
//! session. To share a client between threads, wrap it in a `Mutex`.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use log::trace;

use crate::address::{Address, AddressedValue};
use crate::coalesce::{WindowSizing, WritePlan};
use crate::codec;
use crate::command::DEFAULT_PDU_LENGTH;
use crate::error::{Result, TransportError};
use crate::header::TsapPair;
use crate::transport::{BlockTransport, S7Transport, DEFAULT_S7_PORT, DEFAULT_TIMEOUT};
use crate::utils::format_binary;

/// Block holding V-memory on a LOGO!.
pub const DEFAULT_BLOCK: u16 = 1;

/// Configuration for creating a TCP client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// PLC socket address.
    pub plc_addr: SocketAddr,
    /// Local and remote TSAP.
    pub tsap: TsapPair,
    /// Connect/read/write timeout.
    pub timeout: Duration,
    /// PDU length requested during session setup.
    pub pdu_length: u16,
    /// Data block addressed by this client.
    pub block: u16,
    /// Window sizing used by [`Client::write_many`].
    pub window_sizing: WindowSizing,
}

impl ClientConfig {
    /// Creates a configuration with LOGO! defaults.
    ///
    /// Port 102, TSAP 0x0100 -> 0x0200, 2 s timeout, PDU 480, block 1,
    /// covering window sizing.
    ///
    /// # Example
    ///
    /// ```
    /// use logo_vm::ClientConfig;
    /// use std::net::Ipv4Addr;
    ///
    /// let config = ClientConfig::new(Ipv4Addr::new(192, 168, 0, 3));
    /// assert_eq!(config.plc_addr.port(), 102);
    /// assert_eq!(config.block, 1);
    /// ```
    pub fn new(plc_ip: Ipv4Addr) -> Self {
        Self {
            plc_addr: SocketAddr::from((plc_ip, DEFAULT_S7_PORT)),
            tsap: TsapPair::default(),
            timeout: DEFAULT_TIMEOUT,
            pdu_length: DEFAULT_PDU_LENGTH,
            block: DEFAULT_BLOCK,
            window_sizing: WindowSizing::default(),
        }
    }

    /// Sets a custom PLC port (default is 102).
    pub fn with_port(mut self, port: u16) -> Self {
        self.plc_addr.set_port(port);
        self
    }

    /// Sets a custom timeout (default is 2 seconds).
    ///
    /// # Example
    ///
    /// ```
    /// use logo_vm::ClientConfig;
    /// use std::net::Ipv4Addr;
    /// use std::time::Duration;
    ///
    /// let config = ClientConfig::new(Ipv4Addr::new(192, 168, 0, 3))
    ///     .with_timeout(Duration::from_millis(500));
    /// ```
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets explicit local and remote TSAPs.
    ///
    /// # Example
    ///
    /// ```
    /// use logo_vm::ClientConfig;
    /// use std::net::Ipv4Addr;
    ///
    /// let config = ClientConfig::new(Ipv4Addr::new(192, 168, 0, 3))
    ///     .with_tsap(0x0200, 0x0300);
    /// assert_eq!(config.tsap.remote, 0x0300);
    /// ```
    pub fn with_tsap(mut self, local: u16, remote: u16) -> Self {
        self.tsap = TsapPair::new(local, remote);
        self
    }

    /// Derives the TSAPs from the CPU rack and slot (S7-300/400 style).
    pub fn with_rack_slot(mut self, rack: u8, slot: u8) -> Self {
        self.tsap = TsapPair::from_rack_slot(rack, slot);
        self
    }

    /// Sets the PDU length requested during setup (default 480).
    pub fn with_pdu_length(mut self, pdu_length: u16) -> Self {
        self.pdu_length = pdu_length;
        self
    }

    /// Sets the block number (default 1).
    pub fn with_block(mut self, block: u16) -> Self {
        self.block = block;
        self
    }

    /// Sets the batch window sizing (default [`WindowSizing::Covering`]).
    pub fn with_window_sizing(mut self, window_sizing: WindowSizing) -> Self {
        self.window_sizing = window_sizing;
        self
    }
}

/// Typed V-memory client over a block transport.
///
/// One instance addresses one block. Reads and writes map to exactly one
/// block read and/or one block write; no retries, caching, or reconnection.
/// After [`disconnect`](Client::disconnect) every call fails with
/// [`TransportError::NotConnected`].
///
/// # Example
///
/// ```no_run
/// use logo_vm::{Address, Client, ClientConfig};
/// use std::net::Ipv4Addr;
///
/// let mut client = Client::new(ClientConfig::new(Ipv4Addr::new(192, 168, 0, 3)))?;
///
/// let bit = Address::parse("V2.4")?;
/// client.write(bit, 1)?;
/// assert_eq!(client.read(bit)?, 1);
/// # Ok::<(), logo_vm::VmError>(())
/// ```
#[derive(Debug)]
pub struct Client<T: BlockTransport = S7Transport> {
    transport: T,
    block: u16,
    window_sizing: WindowSizing,
    connected: bool,
}

impl Client<S7Transport> {
    /// Connects to a PLC over ISO-on-TCP.
    ///
    /// # Errors
    ///
    /// Returns `VmError::Transport` if the TCP connection, the COTP handshake
    /// or the S7 session setup fails.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = S7Transport::new(config.plc_addr, config.timeout, config.tsap)
            .with_pdu_length(config.pdu_length);
        let client = Client::with_transport(transport, config.block)?;
        Ok(client.with_window_sizing(config.window_sizing))
    }
}

impl<T: BlockTransport> Client<T> {
    /// Connects `transport` and wraps it in a client addressing `block`.
    ///
    /// # Errors
    ///
    /// Returns `VmError::Transport` if `transport.connect()` fails.
    pub fn with_transport(mut transport: T, block: u16) -> Result<Self> {
        transport.connect()?;
        Ok(Self {
            transport,
            block,
            window_sizing: WindowSizing::default(),
            connected: true,
        })
    }

    /// Sets the batch window sizing.
    pub fn with_window_sizing(mut self, window_sizing: WindowSizing) -> Self {
        self.window_sizing = window_sizing;
        self
    }

    /// Returns the block number this client addresses.
    pub fn block(&self) -> u16 {
        self.block
    }

    /// Returns the batch window sizing.
    pub fn window_sizing(&self) -> WindowSizing {
        self.window_sizing
    }

    /// Returns whether the session is open.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Returns a reference to the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn session(&mut self) -> Result<&mut T> {
        if !self.connected {
            return Err(TransportError::NotConnected.into());
        }
        Ok(&mut self.transport)
    }

    /// Reads `length` bytes at `offset`, checking the transport kept its contract.
    fn read_window(&mut self, offset: u32, length: usize) -> Result<Vec<u8>> {
        let block = self.block;
        let window = self.session()?.read_block(block, offset, length)?;
        if window.len() != length {
            return Err(TransportError::invalid_response(format!(
                "requested {} bytes of block {} at {}, received {}",
                length,
                block,
                offset,
                window.len()
            ))
            .into());
        }
        Ok(window)
    }

    fn write_window(&mut self, offset: u32, window: &[u8]) -> Result<()> {
        let block = self.block;
        self.session()?.write_block(block, offset, window)?;
        Ok(())
    }

    /// Reads the value at `address`.
    ///
    /// # Errors
    ///
    /// Returns `VmError::Transport` if the client is disconnected or the
    /// block read fails.
    pub fn read(&mut self, address: Address) -> Result<u32> {
        let window = self.read_window(address.byte(), address.size())?;
        codec::decode(address, &window, 0)
    }

    /// Writes `value` to `address`.
    ///
    /// Non-bit values are written without reading first. A bit write reads
    /// its byte, patches the bit and writes the byte back.
    ///
    /// # Errors
    ///
    /// Returns `VmError::Transport` if the client is disconnected or a block
    /// read or write fails.
    pub fn write(&mut self, address: Address, value: u32) -> Result<()> {
        let mut window = match address {
            Address::Bit { .. } => {
                let window = self.read_window(address.byte(), address.size())?;
                trace!("{address} before write: {}", format_binary(window[0]));
                window
            }
            _ => {
                self.session()?;
                vec![0u8; address.size()]
            }
        };
        codec::encode(address, value, &mut window, 0)?;
        self.write_window(address.byte(), &window)
    }

    /// Writes all `values` in one read-modify-write of their covering window.
    ///
    /// The window is read once, every value is patched into it, and it is
    /// written back once. Values whose byte ranges overlap are applied in
    /// order; the result for shared bytes is unspecified.
    ///
    /// # Errors
    ///
    /// - `VmError::EmptyBatch` if `values` is empty (no I/O is performed)
    /// - `VmError::WindowOverflow` with [`WindowSizing::Legacy`] when an
    ///   entry runs past the window (nothing is written)
    /// - `VmError::Transport` if the client is disconnected or the block
    ///   read or write fails
    pub fn write_many(&mut self, values: &[AddressedValue]) -> Result<()> {
        let plan = WritePlan::new(values, self.window_sizing)?;
        trace!(
            "coalescing {} writes into block {} window {}..{}",
            values.len(),
            self.block,
            plan.start(),
            plan.end()
        );

        let mut window = self.read_window(plan.start(), plan.len())?;
        plan.apply(&mut window, values)?;
        self.write_window(plan.start(), &window)
    }

    /// Closes the session.
    ///
    /// The client is marked disconnected even if closing fails.
    ///
    /// # Errors
    ///
    /// Returns `VmError::Transport` with `NotConnected` if already
    /// disconnected, or whatever the transport reported while closing.
    pub fn disconnect(&mut self) -> Result<()> {
        self.session()?;
        self.connected = false;
        self.transport.close()?;
        Ok(())
    }
}
