//! ISO-on-TCP framing: TPKT and COTP headers.
//!
//! S7 traffic is carried over TCP port 102 as described in RFC 1006. Every
//! frame starts with a 4-byte TPKT header followed by a COTP header.
//!
//! # TPKT Header
//!
//! | Byte | Field | Description |
//! |------|-------|-------------|
//! | 0 | Version | Always 0x03 |
//! | 1 | Reserved | Always 0x00 |
//! | 2-3 | Length | Frame length including this header |
//!
//! # COTP
//!
//! Two COTP PDU kinds matter here:
//!
//! - **Connection Request / Confirm** (CR 0xE0 / CC 0xD0) with the TPDU size
//!   and the calling/called TSAPs, sent once when the session opens.
//! - **Data** (DT 0xF0) with the EOT flag set, prefixed to every S7 PDU.
//!
//! # TSAPs
//!
//! A LOGO! exposes its S7 server on a fixed pair of TSAPs, usually local
//! 0x0100 and remote 0x0200. For S7-300/400 CPUs the remote TSAP is derived
//! from the rack and slot, see [`TsapPair::from_rack_slot`].
//!
//! # Example
//!
//! ```
//! use logo_vm::{ConnectionRequest, TsapPair, TPKT_HEADER_SIZE};
//!
//! let request = ConnectionRequest::new(TsapPair::new(0x0100, 0x0200));
//! let bytes = request.to_bytes();
//! assert_eq!(bytes.len(), 22);
//! assert_eq!(&bytes[..TPKT_HEADER_SIZE], &[0x03, 0x00, 0x00, 0x16]);
//! ```

use crate::error::TransportError;

/// TPKT header size in bytes.
pub const TPKT_HEADER_SIZE: usize = 4;

/// TPKT protocol version.
pub(crate) const TPKT_VERSION: u8 = 0x03;

/// COTP data header size in bytes (length, PDU type, EOT/number).
pub const COTP_DATA_HEADER_SIZE: usize = 3;

/// Bytes preceding the S7 PDU in a data frame.
pub(crate) const ISO_HEADER_SIZE: usize = TPKT_HEADER_SIZE + COTP_DATA_HEADER_SIZE;

/// COTP data header: length 2, DT, last data unit.
pub(crate) const COTP_DATA: [u8; COTP_DATA_HEADER_SIZE] = [0x02, 0xF0, 0x80];

/// COTP connection request PDU type.
const COTP_CR: u8 = 0xE0;

/// COTP connection confirm PDU type.
const COTP_CC: u8 = 0xD0;

/// Total size of the connection request frame.
const CONNECTION_REQUEST_SIZE: usize = 22;

/// TPKT header (4 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TpktHeader {
    /// Length of the whole frame, header included.
    pub length: u16,
}

impl TpktHeader {
    /// Creates a header for a frame of `length` bytes.
    pub fn new(length: u16) -> Self {
        Self { length }
    }

    /// Serializes the header to bytes.
    ///
    /// # Example
    ///
    /// ```
    /// use logo_vm::TpktHeader;
    ///
    /// assert_eq!(TpktHeader::new(31).to_bytes(), [0x03, 0x00, 0x00, 0x1F]);
    /// ```
    pub fn to_bytes(self) -> [u8; TPKT_HEADER_SIZE] {
        let [hi, lo] = self.length.to_be_bytes();
        [TPKT_VERSION, 0x00, hi, lo]
    }

    /// Parses a header from bytes.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidResponse` if the slice is too short,
    /// the version is not 3, or the length is smaller than the header itself.
    ///
    /// # Example
    ///
    /// ```
    /// use logo_vm::TpktHeader;
    ///
    /// let header = TpktHeader::from_bytes(&[0x03, 0x00, 0x00, 0x16]).unwrap();
    /// assert_eq!(header.length, 22);
    /// ```
    pub fn from_bytes(data: &[u8]) -> Result<Self, TransportError> {
        if data.len() < TPKT_HEADER_SIZE {
            return Err(TransportError::invalid_response(format!(
                "TPKT header too short: expected {} bytes, got {}",
                TPKT_HEADER_SIZE,
                data.len()
            )));
        }
        if data[0] != TPKT_VERSION {
            return Err(TransportError::invalid_response(format!(
                "unsupported TPKT version 0x{:02X}",
                data[0]
            )));
        }

        let length = u16::from_be_bytes([data[2], data[3]]);
        if (length as usize) < TPKT_HEADER_SIZE {
            return Err(TransportError::invalid_response(format!(
                "TPKT length {length} smaller than header"
            )));
        }

        Ok(Self { length })
    }

    /// Number of bytes following the header.
    pub fn payload_len(self) -> usize {
        self.length as usize - TPKT_HEADER_SIZE
    }
}

/// Calling (local) and called (remote) transport service access points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TsapPair {
    /// TSAP of this client.
    pub local: u16,
    /// TSAP of the PLC.
    pub remote: u16,
}

impl TsapPair {
    /// Creates a TSAP pair.
    pub fn new(local: u16, remote: u16) -> Self {
        Self { local, remote }
    }

    /// Derives the TSAPs of a PG connection to the CPU in `rack`/`slot`.
    ///
    /// The remote TSAP is `0x0100 | rack * 0x20 + slot`.
    ///
    /// # Example
    ///
    /// ```
    /// use logo_vm::TsapPair;
    ///
    /// let tsap = TsapPair::from_rack_slot(0, 2);
    /// assert_eq!(tsap.local, 0x0100);
    /// assert_eq!(tsap.remote, 0x0102);
    /// ```
    pub fn from_rack_slot(rack: u8, slot: u8) -> Self {
        let remote = 0x0100 | (u16::from(rack) * 0x20 + u16::from(slot & 0x1F));
        Self::new(0x0100, remote)
    }
}

impl Default for TsapPair {
    /// LOGO! defaults: local 0x0100, remote 0x0200.
    fn default() -> Self {
        Self::new(0x0100, 0x0200)
    }
}

/// COTP connection request (CR) frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionRequest {
    tsap: TsapPair,
}

impl ConnectionRequest {
    /// Creates a connection request for the given TSAPs.
    pub fn new(tsap: TsapPair) -> Self {
        Self { tsap }
    }

    /// Serializes the full frame (TPKT + COTP CR) to bytes.
    #[rustfmt::skip]
    pub fn to_bytes(self) -> [u8; CONNECTION_REQUEST_SIZE] {
        let tpkt = TpktHeader::new(CONNECTION_REQUEST_SIZE as u16).to_bytes();
        let [local_hi, local_lo] = self.tsap.local.to_be_bytes();
        let [remote_hi, remote_lo] = self.tsap.remote.to_be_bytes();
        [
            tpkt[0], tpkt[1], tpkt[2], tpkt[3],
            0x11, // COTP length
            COTP_CR,
            0x00, 0x00, // destination reference
            0x00, 0x01, // source reference
            0x00, // class 0
            0xC0, 0x01, 0x0A, // TPDU size 1024
            0xC1, 0x02, local_hi, local_lo,
            0xC2, 0x02, remote_hi, remote_lo,
        ]
    }
}

/// Checks that a frame is a COTP connection confirm (CC).
///
/// # Errors
///
/// Returns `TransportError::ConnectionRejected` if the PDU type is not CC, or
/// `TransportError::InvalidResponse` if the frame is malformed.
///
/// # Example
///
/// ```
/// use logo_vm::check_connection_confirm;
///
/// let cc = [
///     0x03, 0x00, 0x00, 0x16, 0x11, 0xD0, 0x00, 0x01, 0x00, 0x01, 0x00,
///     0xC0, 0x01, 0x0A, 0xC1, 0x02, 0x01, 0x00, 0xC2, 0x02, 0x02, 0x00,
/// ];
/// assert!(check_connection_confirm(&cc).is_ok());
/// ```
pub fn check_connection_confirm(frame: &[u8]) -> Result<(), TransportError> {
    TpktHeader::from_bytes(frame)?;
    // TPKT (4) + COTP length (1) + PDU type (1)
    let pdu_type = frame.get(TPKT_HEADER_SIZE + 1).copied().ok_or_else(|| {
        TransportError::invalid_response("connection confirm too short")
    })?;
    if pdu_type != COTP_CC {
        return Err(TransportError::connection_rejected(format!(
            "expected COTP connection confirm 0xD0, got 0x{pdu_type:02X}"
        )));
    }
    Ok(())
}

/// Checks the COTP data header of a frame.
///
/// # Errors
///
/// Returns `TransportError::InvalidResponse` if the frame is shorter than the
/// ISO headers or does not carry a COTP data PDU.
pub(crate) fn check_data_header(frame: &[u8]) -> Result<(), TransportError> {
    if frame.len() < ISO_HEADER_SIZE {
        return Err(TransportError::invalid_response(format!(
            "frame too short for ISO headers: {} bytes",
            frame.len()
        )));
    }
    if frame[TPKT_HEADER_SIZE + 1] != COTP_DATA[1] {
        return Err(TransportError::invalid_response(format!(
            "expected COTP data PDU 0xF0, got 0x{:02X}",
            frame[TPKT_HEADER_SIZE + 1]
        )));
    }
    Ok(())
}
