//! Block transport layer.
//!
//! This module defines the [`BlockTransport`] trait, the only thing the
//! client needs from the outside world: open a session, read and write byte
//! ranges of a numbered block, close the session. [`S7Transport`] implements
//! it over ISO-on-TCP for LOGO! and S7 PLCs; tests and simulators can plug in
//! their own.
//!
//! # Design
//!
//! - **Blocking** - each call returns when the PLC answered or the socket
//!   timeout expired
//! - **No retries** - every failure is returned to the caller as-is
//! - **One session** - one TCP stream, one PDU in flight
//!
//! # Constants
//!
//! - [`DEFAULT_S7_PORT`] - ISO-on-TCP port (102)
//! - [`DEFAULT_TIMEOUT`] - Default connect/read/write timeout (2 seconds)
//!
//! # Example
//!
//! ```no_run
//! use logo_vm::{BlockTransport, S7Transport, TsapPair};
//! use std::time::Duration;
//!
//! let mut transport = S7Transport::new(
//!     "192.168.0.3:102".parse().unwrap(),
//!     Duration::from_secs(2),
//!     TsapPair::default(),
//! );
//! transport.connect()?;
//!
//! let bytes = transport.read_block(1, 0, 16)?;
//! transport.write_block(1, 94, &[55])?;
//! transport.close()?;
//! # Ok::<(), logo_vm::TransportError>(())
//! ```

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use log::{debug, trace};

use crate::command::{
    check_byte_range, ReadVarRequest, SetupCommunication, WriteVarRequest, DEFAULT_PDU_LENGTH,
    READ_PDU_OVERHEAD, WRITE_PDU_OVERHEAD,
};
use crate::error::TransportError;
use crate::header::{check_connection_confirm, ConnectionRequest, TpktHeader, TsapPair};
use crate::response::S7Response;
use crate::utils::format_hex;

type Result<T> = std::result::Result<T, TransportError>;

/// Default ISO-on-TCP port.
pub const DEFAULT_S7_PORT: u16 = 102;

/// Default timeout for connect, read and write.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Byte-range access to numbered memory blocks.
///
/// Implementations own the session. Calls are made one at a time by the
/// client; no method is invoked concurrently with another.
pub trait BlockTransport {
    /// Opens the session.
    fn connect(&mut self) -> std::result::Result<(), TransportError>;

    /// Reads `length` bytes of `block` starting at byte `offset`.
    ///
    /// Must return exactly `length` bytes on success. A range that cannot be
    /// read in full is rejected before any byte is transferred.
    fn read_block(
        &mut self,
        block: u16,
        offset: u32,
        length: usize,
    ) -> std::result::Result<Vec<u8>, TransportError>;

    /// Writes `data` to `block` starting at byte `offset`.
    ///
    /// A range that cannot be written in full is rejected before any byte is
    /// transferred.
    fn write_block(
        &mut self,
        block: u16,
        offset: u32,
        data: &[u8],
    ) -> std::result::Result<(), TransportError>;

    /// Closes the session.
    fn close(&mut self) -> std::result::Result<(), TransportError>;
}

impl<T: BlockTransport + ?Sized> BlockTransport for Box<T> {
    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn read_block(&mut self, block: u16, offset: u32, length: usize) -> Result<Vec<u8>> {
        (**self).read_block(block, offset, length)
    }

    fn write_block(&mut self, block: u16, offset: u32, data: &[u8]) -> Result<()> {
        (**self).write_block(block, offset, data)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// S7comm over ISO-on-TCP.
///
/// Opening the session sends a COTP connection request with the configured
/// TSAPs and negotiates the PDU length. Reads and writes larger than the
/// negotiated PDU are split into consecutive requests.
pub struct S7Transport {
    remote_addr: SocketAddr,
    timeout: Duration,
    tsap: TsapPair,
    requested_pdu_length: u16,
    pdu_length: u16,
    pdu_ref: u16,
    stream: Option<TcpStream>,
}

impl S7Transport {
    /// Creates an unconnected transport.
    ///
    /// # Arguments
    ///
    /// * `remote_addr` - Socket address of the PLC (IP:102)
    /// * `timeout` - Connect/read/write timeout
    /// * `tsap` - Local and remote TSAP
    pub fn new(remote_addr: SocketAddr, timeout: Duration, tsap: TsapPair) -> Self {
        Self {
            remote_addr,
            timeout,
            tsap,
            requested_pdu_length: DEFAULT_PDU_LENGTH,
            pdu_length: 0,
            pdu_ref: 0,
            stream: None,
        }
    }

    /// Sets the PDU length requested during setup (default 480).
    pub fn with_pdu_length(mut self, pdu_length: u16) -> Self {
        self.requested_pdu_length = pdu_length;
        self
    }

    /// Returns the remote PLC address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Returns the PDU length granted by the PLC, if connected.
    pub fn pdu_length(&self) -> Option<u16> {
        self.stream.as_ref().map(|_| self.pdu_length)
    }

    /// Returns whether a session is open.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn next_pdu_ref(&mut self) -> u16 {
        self.pdu_ref = self.pdu_ref.wrapping_add(1);
        self.pdu_ref
    }

    fn stream(&mut self) -> Result<&mut TcpStream> {
        self.stream.as_mut().ok_or(TransportError::NotConnected)
    }

    /// Sends a frame and receives the reply frame.
    fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>> {
        trace!("-> {}", format_hex(request));
        let stream = self.stream()?;
        stream.write_all(request).map_err(map_io)?;
        let reply = read_frame(stream)?;
        trace!("<- {}", format_hex(&reply));
        Ok(reply)
    }

    /// Sends an S7 job and parses the ack-data reply.
    fn job(&mut self, request: &[u8], pdu_ref: u16) -> Result<S7Response> {
        let response = S7Response::from_bytes(&self.exchange(request)?)?;
        if response.pdu_ref != pdu_ref {
            return Err(TransportError::invalid_response(format!(
                "PDU reference mismatch: expected 0x{:04X}, received 0x{:04X}",
                pdu_ref, response.pdu_ref
            )));
        }
        response.check_error()?;
        Ok(response)
    }

    fn open_session(&mut self) -> Result<()> {
        let request = ConnectionRequest::new(self.tsap).to_bytes();
        check_connection_confirm(&self.exchange(&request)?)?;
        debug!(
            "ISO connection to {} established (TSAP 0x{:04X} -> 0x{:04X})",
            self.remote_addr, self.tsap.local, self.tsap.remote
        );

        let pdu_ref = self.next_pdu_ref();
        let setup = SetupCommunication::new(pdu_ref, self.requested_pdu_length).to_bytes();
        let pdu_length = self.job(&setup, pdu_ref)?.negotiated_pdu_length()?;
        if (pdu_length as usize) <= WRITE_PDU_OVERHEAD {
            return Err(TransportError::connection_rejected(format!(
                "negotiated PDU length {pdu_length} leaves no room for data"
            )));
        }
        debug!(
            "S7 session negotiated PDU length {} (requested {})",
            pdu_length, self.requested_pdu_length
        );
        self.pdu_length = pdu_length;
        Ok(())
    }
}

impl BlockTransport for S7Transport {
    fn connect(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let stream = TcpStream::connect_timeout(&self.remote_addr, self.timeout).map_err(map_io)?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;
        stream.set_nodelay(true)?;
        self.stream = Some(stream);

        if let Err(e) = self.open_session() {
            self.stream = None;
            return Err(e);
        }
        Ok(())
    }

    fn read_block(&mut self, block: u16, offset: u32, length: usize) -> Result<Vec<u8>> {
        self.stream()?;
        check_byte_range(offset, length)?;
        let chunk = self.pdu_length as usize - READ_PDU_OVERHEAD;
        let mut bytes = Vec::with_capacity(length);

        while bytes.len() < length {
            let count = chunk.min(length - bytes.len());
            let start = chunk_offset(offset, bytes.len())?;
            let pdu_ref = self.next_pdu_ref();
            let request = ReadVarRequest::new(pdu_ref, block, start, count)?;
            trace!("read DB{block} {start}+{count} (ref {pdu_ref})");
            let data = self.job(&request.to_bytes(), pdu_ref)?.read_data(count)?;
            bytes.extend_from_slice(&data);
        }
        Ok(bytes)
    }

    fn write_block(&mut self, block: u16, offset: u32, data: &[u8]) -> Result<()> {
        self.stream()?;
        check_byte_range(offset, data.len())?;
        let chunk = self.pdu_length as usize - WRITE_PDU_OVERHEAD;

        for (index, part) in data.chunks(chunk).enumerate() {
            let start = chunk_offset(offset, index * chunk)?;
            let pdu_ref = self.next_pdu_ref();
            let request = WriteVarRequest::new(pdu_ref, block, start, part)?;
            trace!("write DB{block} {start}+{} (ref {pdu_ref})", part.len());
            self.job(&request.to_bytes()?, pdu_ref)?.check_write()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let stream = self.stream.take().ok_or(TransportError::NotConnected)?;
        debug!("closing S7 session to {}", self.remote_addr);
        match stream.shutdown(Shutdown::Both) {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(TransportError::Io(e)),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Debug for S7Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S7Transport")
            .field("remote_addr", &self.remote_addr)
            .field("tsap", &self.tsap)
            .field("pdu_length", &self.pdu_length())
            .field(
                "local_addr",
                &self.stream.as_ref().and_then(|s| s.local_addr().ok()),
            )
            .finish()
    }
}

fn chunk_offset(offset: u32, done: usize) -> Result<u32> {
    u32::try_from(done)
        .ok()
        .and_then(|done| offset.checked_add(done))
        .ok_or_else(|| TransportError::invalid_request("byte offset overflows u32"))
}

/// Reads one TPKT frame (header included) from the stream.
fn read_frame(stream: &mut impl Read) -> Result<Vec<u8>> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).map_err(map_io)?;
    let tpkt = TpktHeader::from_bytes(&header)?;

    let mut frame = vec![0u8; tpkt.length as usize];
    frame[..4].copy_from_slice(&header);
    stream.read_exact(&mut frame[4..]).map_err(map_io)?;
    Ok(frame)
}

fn map_io(e: io::Error) -> TransportError {
    match e.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => TransportError::Timeout,
        _ => TransportError::Io(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::MAX_BYTE_OFFSET;
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    /// How the fake PLC corrupts its read/write replies.
    #[derive(Clone, Copy)]
    enum Fault {
        None,
        WrongPduRef,
        HeaderError { class: u8, code: u8 },
    }

    /// Minimal S7 server backed by one data block.
    struct FakePlc {
        block: u16,
        memory: Vec<u8>,
        pdu_length: u16,
        requests: usize,
        fault: Fault,
    }

    impl FakePlc {
        fn new(memory: Vec<u8>) -> Self {
            Self {
                block: 1,
                memory,
                pdu_length: 240,
                requests: 0,
                fault: Fault::None,
            }
        }

        fn with_fault(mut self, fault: Fault) -> Self {
            self.fault = fault;
            self
        }

        fn ack(pdu_ref: &[u8], parameters: &[u8], data: &[u8]) -> Vec<u8> {
            let total = 7 + 12 + parameters.len() + data.len();
            let mut frame = vec![0x03, 0x00];
            frame.extend_from_slice(&(total as u16).to_be_bytes());
            frame.extend_from_slice(&[0x02, 0xF0, 0x80, 0x32, 0x03, 0x00, 0x00]);
            frame.extend_from_slice(pdu_ref);
            frame.extend_from_slice(&(parameters.len() as u16).to_be_bytes());
            frame.extend_from_slice(&(data.len() as u16).to_be_bytes());
            frame.extend_from_slice(&[0x00, 0x00]);
            frame.extend_from_slice(parameters);
            frame.extend_from_slice(data);
            frame
        }

        fn handle(&mut self, request: &[u8]) -> Vec<u8> {
            if request[5] == 0xE0 {
                let mut cc = request.to_vec();
                cc[5] = 0xD0;
                return cc;
            }

            self.requests += 1;
            let pdu_ref = &request[11..13];
            match request[17] {
                0xF0 => {
                    let [hi, lo] = self.pdu_length.to_be_bytes();
                    Self::ack(pdu_ref, &[0xF0, 0x00, 0x00, 0x01, 0x00, 0x01, hi, lo], &[])
                }
                function @ (0x04 | 0x05) => {
                    let mut reply = self.read_write(function, pdu_ref, request);
                    match self.fault {
                        Fault::None => {}
                        Fault::WrongPduRef => reply[12] = reply[12].wrapping_add(1),
                        Fault::HeaderError { class, code } => {
                            reply[17] = class;
                            reply[18] = code;
                        }
                    }
                    reply
                }
                _ => Self::ack(pdu_ref, &[request[17]], &[]),
            }
        }

        fn read_write(&mut self, function: u8, pdu_ref: &[u8], request: &[u8]) -> Vec<u8> {
            let count = u16::from_be_bytes([request[23], request[24]]) as usize;
            let block = u16::from_be_bytes([request[25], request[26]]);
            let bits = u32::from_be_bytes([0, request[28], request[29], request[30]]);
            let start = (bits / 8) as usize;

            if block != self.block || start + count > self.memory.len() {
                return Self::ack(pdu_ref, &[function, 0x01], &[0x0A, 0x00, 0x00, 0x00]);
            }
            if function == 0x04 {
                let mut data = vec![0xFF, 0x04];
                data.extend_from_slice(&((count * 8) as u16).to_be_bytes());
                data.extend_from_slice(&self.memory[start..start + count]);
                Self::ack(pdu_ref, &[0x04, 0x01], &data)
            } else {
                self.memory[start..start + count].copy_from_slice(&request[35..35 + count]);
                Self::ack(pdu_ref, &[0x05, 0x01], &[0xFF])
            }
        }
    }

    fn spawn_plc(mut plc: FakePlc) -> (SocketAddr, JoinHandle<FakePlc>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            while let Ok(request) = read_frame(&mut stream) {
                let reply = plc.handle(&request);
                stream.write_all(&reply).unwrap();
            }
            plc
        });
        (addr, handle)
    }

    fn connect(addr: SocketAddr) -> S7Transport {
        let mut transport = S7Transport::new(addr, Duration::from_secs(2), TsapPair::default());
        transport.connect().unwrap();
        transport
    }

    #[test]
    fn test_default_constants() {
        assert_eq!(DEFAULT_S7_PORT, 102);
        assert_eq!(DEFAULT_TIMEOUT, Duration::from_secs(2));
    }

    #[test]
    fn test_not_connected() {
        let addr: SocketAddr = "127.0.0.1:102".parse().unwrap();
        let mut transport = S7Transport::new(addr, DEFAULT_TIMEOUT, TsapPair::default());
        assert!(!transport.is_connected());
        assert_eq!(transport.pdu_length(), None);
        assert!(matches!(
            transport.read_block(1, 0, 1),
            Err(TransportError::NotConnected)
        ));
        assert!(matches!(
            transport.write_block(1, 0, &[1]),
            Err(TransportError::NotConnected)
        ));
        assert!(matches!(transport.close(), Err(TransportError::NotConnected)));
    }

    #[test]
    fn test_session_setup_negotiates_pdu() {
        let (addr, server) = spawn_plc(FakePlc::new(vec![0; 16]));

        let mut transport = connect(addr);
        assert!(transport.is_connected());
        assert_eq!(transport.pdu_length(), Some(240));
        assert!(format!("{:?}", transport).contains("S7Transport"));

        // Connecting again keeps the session.
        transport.connect().unwrap();
        transport.close().unwrap();
        assert!(!transport.is_connected());

        let plc = server.join().unwrap();
        assert_eq!(plc.requests, 1);
    }

    #[test]
    fn test_read_write_roundtrip() {
        let (addr, server) = spawn_plc(FakePlc::new((0..128).collect()));

        let mut transport = connect(addr);
        assert_eq!(transport.read_block(1, 10, 4).unwrap(), vec![10, 11, 12, 13]);

        transport.write_block(1, 31, &[0x01, 0x2C]).unwrap();
        assert_eq!(transport.read_block(1, 31, 2).unwrap(), vec![0x01, 0x2C]);
        transport.close().unwrap();

        let plc = server.join().unwrap();
        assert_eq!(&plc.memory[31..33], &[0x01, 0x2C]);
    }

    #[test]
    fn test_large_transfers_are_chunked() {
        let (addr, server) = spawn_plc(FakePlc::new(vec![0; 1024]));

        let mut transport = connect(addr);
        let pattern: Vec<u8> = (0..600u32).map(|i| (i % 251) as u8).collect();
        // 600 bytes / (240 - 28) per write = 3 requests
        transport.write_block(1, 100, &pattern).unwrap();
        // 600 bytes / (240 - 18) per read = 3 requests
        assert_eq!(transport.read_block(1, 100, 600).unwrap(), pattern);
        transport.close().unwrap();

        let plc = server.join().unwrap();
        assert_eq!(plc.requests, 1 + 3 + 3);
        assert_eq!(&plc.memory[100..700], &pattern[..]);
    }

    #[test]
    fn test_item_error_is_passed_through() {
        let (addr, server) = spawn_plc(FakePlc::new(vec![0; 8]));

        let mut transport = connect(addr);
        assert!(matches!(
            transport.read_block(2, 0, 1),
            Err(TransportError::ItemError { code: 0x0A })
        ));
        assert!(matches!(
            transport.write_block(1, 7, &[1, 2]),
            Err(TransportError::ItemError { code: 0x0A })
        ));
        transport.close().unwrap();
        server.join().unwrap();
    }

    #[test]
    fn test_range_past_max_offset_is_rejected_before_transfer() {
        let (addr, server) = spawn_plc(FakePlc::new(vec![0; 16]));

        let mut transport = connect(addr);
        let start = MAX_BYTE_OFFSET - 600;
        assert!(matches!(
            transport.write_block(1, start, &[0xAB; 1000]),
            Err(TransportError::InvalidRequest { .. })
        ));
        assert!(matches!(
            transport.read_block(1, start, 1000),
            Err(TransportError::InvalidRequest { .. })
        ));
        assert!(transport.is_connected());
        transport.close().unwrap();

        // Only the setup job reached the PLC.
        let plc = server.join().unwrap();
        assert_eq!(plc.requests, 1);
    }

    #[test]
    fn test_empty_range_is_rejected() {
        let (addr, server) = spawn_plc(FakePlc::new(vec![0; 16]));

        let mut transport = connect(addr);
        assert!(matches!(
            transport.read_block(1, 0, 0),
            Err(TransportError::InvalidRequest { .. })
        ));
        assert!(matches!(
            transport.write_block(1, 0, &[]),
            Err(TransportError::InvalidRequest { .. })
        ));
        transport.close().unwrap();

        let plc = server.join().unwrap();
        assert_eq!(plc.requests, 1);
    }

    #[test]
    fn test_pdu_reference_mismatch() {
        let plc = FakePlc::new(vec![0; 16]).with_fault(Fault::WrongPduRef);
        let (addr, server) = spawn_plc(plc);

        let mut transport = connect(addr);
        assert!(matches!(
            transport.read_block(1, 0, 4),
            Err(TransportError::InvalidResponse { .. })
        ));
        assert!(matches!(
            transport.write_block(1, 0, &[1]),
            Err(TransportError::InvalidResponse { .. })
        ));
        transport.close().unwrap();
        server.join().unwrap();
    }

    #[test]
    fn test_header_error_is_passed_through() {
        let fault = Fault::HeaderError {
            class: 0x85,
            code: 0x00,
        };
        let (addr, server) = spawn_plc(FakePlc::new(vec![0; 16]).with_fault(fault));

        let mut transport = connect(addr);
        assert!(matches!(
            transport.read_block(1, 0, 4),
            Err(TransportError::PlcError {
                class: 0x85,
                code: 0x00
            })
        ));
        transport.close().unwrap();

        let plc = server.join().unwrap();
        assert_eq!(plc.memory, vec![0; 16]);
    }

    #[test]
    fn test_rejected_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = read_frame(&mut stream).unwrap();
            // Answer with a disconnect request.
            request[5] = 0x80;
            stream.write_all(&request).unwrap();
        });

        let mut transport = S7Transport::new(addr, Duration::from_secs(2), TsapPair::default());
        assert!(matches!(
            transport.connect(),
            Err(TransportError::ConnectionRejected { .. })
        ));
        assert!(!transport.is_connected());
        server.join().unwrap();
    }

    #[test]
    fn test_read_frame() {
        let bytes = [0x03, 0x00, 0x00, 0x07, 0x02, 0xF0, 0x80, 0xAA];
        let mut cursor = io::Cursor::new(&bytes[..]);
        assert_eq!(read_frame(&mut cursor).unwrap(), &bytes[..7]);
        assert!(read_frame(&mut cursor).is_err());
    }

    #[test]
    fn test_map_io_timeout() {
        assert!(matches!(
            map_io(io::Error::from(io::ErrorKind::WouldBlock)),
            TransportError::Timeout
        ));
        assert!(matches!(
            map_io(io::Error::from(io::ErrorKind::ConnectionReset)),
            TransportError::Io(_)
        ));
    }
}
