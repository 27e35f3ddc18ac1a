//! S7 response parsing and validation.
//!
//! Responses to job requests arrive as ack-data PDUs inside a COTP data
//! frame.
//!
//! # Ack-Data Structure
//!
//! | Component | Size | Description |
//! |-----------|------|-------------|
//! | TPKT + COTP | 7 bytes | ISO framing |
//! | Header | 12 bytes | Job header plus error class and error code |
//! | Parameters | Variable | Echo of the function code (and setup values) |
//! | Data | Variable | One item per requested variable |
//!
//! A data item starts with a return code (0xFF = success), a transport size
//! and a length, followed by the payload.
//!
//! # Example
//!
//! ```
//! use logo_vm::S7Response;
//!
//! let frame = [
//!     0x03, 0x00, 0x00, 0x1B, 0x02, 0xF0, 0x80, // TPKT + COTP
//!     0x32, 0x03, 0x00, 0x00, 0x00, 0x01, 0x00, 0x02, 0x00, 0x06, 0x00, 0x00, // header
//!     0x04, 0x01, // read var, 1 item
//!     0xFF, 0x04, 0x00, 0x10, 0x01, 0x2C, // success, 16 bits: 0x012C
//! ];
//!
//! let response = S7Response::from_bytes(&frame).unwrap();
//! assert!(response.is_success());
//! assert_eq!(response.read_data(2).unwrap(), vec![0x01, 0x2C]);
//! ```

use crate::command::{
    FN_READ_VAR, FN_SETUP_COMMUNICATION, FN_WRITE_VAR, ROSCTR_ACK_DATA, S7_PROTOCOL_ID,
};
use crate::error::TransportError;
use crate::header::{check_data_header, TpktHeader, ISO_HEADER_SIZE};

type Result<T> = std::result::Result<T, TransportError>;

/// Ack-data header size in bytes.
pub const S7_ACK_HEADER_SIZE: usize = 12;

/// Item return code for success.
const RETURN_CODE_SUCCESS: u8 = 0xFF;

/// Data transport sizes whose length field counts bits.
const TS_RES_BIT: u8 = 0x03;
const TS_RES_BYTE: u8 = 0x04;
const TS_RES_INT: u8 = 0x05;

/// Parsed S7 ack-data response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S7Response {
    /// PDU reference echoed from the request.
    pub pdu_ref: u16,
    /// Error class (0x00 = success).
    pub error_class: u8,
    /// Error code (0x00 = success).
    pub error_code: u8,
    /// Parameter block.
    pub parameters: Vec<u8>,
    /// Data block.
    pub data: Vec<u8>,
}

impl S7Response {
    /// Parses a complete frame (TPKT + COTP + S7 ack-data).
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidResponse` if the frame is truncated,
    /// not an S7 PDU, not ack-data, or its declared lengths do not match.
    pub fn from_bytes(frame: &[u8]) -> Result<Self> {
        let tpkt = TpktHeader::from_bytes(frame)?;
        if tpkt.length as usize != frame.len() {
            return Err(TransportError::invalid_response(format!(
                "TPKT length {} does not match frame of {} bytes",
                tpkt.length,
                frame.len()
            )));
        }
        check_data_header(frame)?;

        let pdu = &frame[ISO_HEADER_SIZE..];
        if pdu.len() < S7_ACK_HEADER_SIZE {
            return Err(TransportError::invalid_response(format!(
                "S7 header too short: expected at least {} bytes, got {}",
                S7_ACK_HEADER_SIZE,
                pdu.len()
            )));
        }
        if pdu[0] != S7_PROTOCOL_ID {
            return Err(TransportError::invalid_response(format!(
                "unexpected protocol id 0x{:02X}",
                pdu[0]
            )));
        }
        if pdu[1] != ROSCTR_ACK_DATA {
            return Err(TransportError::invalid_response(format!(
                "expected ack-data PDU, got ROSCTR 0x{:02X}",
                pdu[1]
            )));
        }

        let param_len = u16::from_be_bytes([pdu[6], pdu[7]]) as usize;
        let data_len = u16::from_be_bytes([pdu[8], pdu[9]]) as usize;
        let body = &pdu[S7_ACK_HEADER_SIZE..];
        if body.len() != param_len + data_len {
            return Err(TransportError::invalid_response(format!(
                "declared {} parameter + {} data bytes, frame carries {}",
                param_len,
                data_len,
                body.len()
            )));
        }

        Ok(Self {
            pdu_ref: u16::from_be_bytes([pdu[4], pdu[5]]),
            error_class: pdu[10],
            error_code: pdu[11],
            parameters: body[..param_len].to_vec(),
            data: body[param_len..].to_vec(),
        })
    }

    /// Returns whether the header reports success.
    pub fn is_success(&self) -> bool {
        self.error_class == 0x00 && self.error_code == 0x00
    }

    /// Checks the header error class and code.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::PlcError` if either is non-zero.
    pub fn check_error(&self) -> Result<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(TransportError::PlcError {
                class: self.error_class,
                code: self.error_code,
            })
        }
    }

    /// Returns the PDU length granted by a setup communication response.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidResponse` if this is not a setup
    /// response.
    pub fn negotiated_pdu_length(&self) -> Result<u16> {
        self.expect_function(FN_SETUP_COMMUNICATION)?;
        match self.parameters.get(6..8) {
            Some(&[hi, lo]) => Ok(u16::from_be_bytes([hi, lo])),
            _ => Err(TransportError::invalid_response(
                "setup response parameters too short",
            )),
        }
    }

    /// Extracts the payload of a read-var response.
    ///
    /// # Errors
    ///
    /// - `TransportError::ItemError` if the item return code is not success
    /// - `TransportError::InvalidResponse` if this is not a read response or
    ///   the payload is not exactly `expected` bytes
    pub fn read_data(&self, expected: usize) -> Result<Vec<u8>> {
        self.expect_function(FN_READ_VAR)?;
        let (&code, rest) = self
            .data
            .split_first()
            .ok_or_else(|| TransportError::invalid_response("read response has no data item"))?;
        if code != RETURN_CODE_SUCCESS {
            return Err(TransportError::ItemError { code });
        }
        let &[transport_size, len_hi, len_lo, ref payload @ ..] = rest else {
            return Err(TransportError::invalid_response("data item header too short"));
        };

        let length = u16::from_be_bytes([len_hi, len_lo]) as usize;
        let length = match transport_size {
            TS_RES_BIT | TS_RES_BYTE | TS_RES_INT => length.div_ceil(8),
            _ => length,
        };
        if length != expected || payload.len() < length {
            return Err(TransportError::invalid_response(format!(
                "expected {} data bytes, item declares {} and carries {}",
                expected,
                length,
                payload.len()
            )));
        }

        Ok(payload[..length].to_vec())
    }

    /// Checks the item return code of a write-var response.
    ///
    /// # Errors
    ///
    /// - `TransportError::ItemError` if the return code is not success
    /// - `TransportError::InvalidResponse` if this is not a write response
    pub fn check_write(&self) -> Result<()> {
        self.expect_function(FN_WRITE_VAR)?;
        match self.data.first() {
            Some(&RETURN_CODE_SUCCESS) => Ok(()),
            Some(&code) => Err(TransportError::ItemError { code }),
            None => Err(TransportError::invalid_response(
                "write response has no return code",
            )),
        }
    }

    fn expect_function(&self, function: u8) -> Result<()> {
        match self.parameters.first() {
            Some(&f) if f == function => Ok(()),
            Some(&f) => Err(TransportError::invalid_response(format!(
                "expected function 0x{function:02X}, got 0x{f:02X}"
            ))),
            None => Err(TransportError::invalid_response(
                "response has no parameters",
            )),
        }
    }
}
