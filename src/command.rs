//! S7 request PDUs and their serialization.
//!
//! Each request type builds a complete frame (TPKT + COTP data header + S7
//! PDU) ready to be written to the socket.
//!
//! # Request Types
//!
//! - [`SetupCommunication`] - negotiate the PDU length after connecting
//! - [`ReadVarRequest`] - read a byte range of a data block
//! - [`WriteVarRequest`] - write a byte range of a data block
//!
//! # S7 Job Header
//!
//! | Byte | Field |
//! |------|-------|
//! | 0 | Protocol ID (0x32) |
//! | 1 | ROSCTR (0x01 = job) |
//! | 2-3 | Redundancy ID |
//! | 4-5 | PDU reference |
//! | 6-7 | Parameter length |
//! | 8-9 | Data length |
//!
//! # Example
//!
//! ```
//! use logo_vm::ReadVarRequest;
//!
//! // Read VB0..VB3 of DB1
//! let cmd = ReadVarRequest::new(0x0001, 1, 0, 4).unwrap();
//! let bytes = cmd.to_bytes();
//! assert_eq!(bytes.len(), 31);
//! ```
//!
//! # Constants
//!
//! - [`DEFAULT_PDU_LENGTH`] - PDU length requested during setup (480)
//! - [`MAX_BYTE_OFFSET`] - highest byte offset the 24-bit bit address can reach

use crate::error::TransportError;
use crate::header::{TpktHeader, COTP_DATA, ISO_HEADER_SIZE};
use crate::memory::DataType;

type Result<T> = std::result::Result<T, TransportError>;

/// S7 protocol identifier.
pub(crate) const S7_PROTOCOL_ID: u8 = 0x32;
/// ROSCTR for job requests.
pub(crate) const ROSCTR_JOB: u8 = 0x01;
/// ROSCTR for acknowledged data responses.
pub(crate) const ROSCTR_ACK_DATA: u8 = 0x03;
/// Setup communication function code.
pub(crate) const FN_SETUP_COMMUNICATION: u8 = 0xF0;
/// Read variable function code.
pub(crate) const FN_READ_VAR: u8 = 0x04;
/// Write variable function code.
pub(crate) const FN_WRITE_VAR: u8 = 0x05;
/// Data block area code.
pub(crate) const AREA_DB: u8 = 0x84;
/// Data transport size: byte/word/dword, length given in bits.
pub(crate) const TS_RES_BYTE: u8 = 0x04;

/// S7 job header size in bytes.
pub const S7_JOB_HEADER_SIZE: usize = 10;

/// Parameter length of a single-item read/write request.
const ITEM_PARAM_LEN: u16 = 14;

/// Parameter length of a setup communication request.
const SETUP_PARAM_LEN: u16 = 8;

/// Size of the data header preceding write payloads.
const WRITE_DATA_HEADER_LEN: usize = 4;

/// PDU length requested when opening a session.
pub const DEFAULT_PDU_LENGTH: u16 = 480;

/// Highest byte offset addressable in an S7 item (the bit address is 24 bits).
pub const MAX_BYTE_OFFSET: u32 = 0x1F_FFFF;

/// Bytes of a negotiated PDU not available for read payload.
pub const READ_PDU_OVERHEAD: usize = 18;

/// Bytes of a negotiated PDU not available for write payload.
pub const WRITE_PDU_OVERHEAD: usize = 28;

fn job_header(pdu_ref: u16, param_len: u16, data_len: u16) -> [u8; S7_JOB_HEADER_SIZE] {
    let [ref_hi, ref_lo] = pdu_ref.to_be_bytes();
    let [par_hi, par_lo] = param_len.to_be_bytes();
    let [dat_hi, dat_lo] = data_len.to_be_bytes();
    [
        S7_PROTOCOL_ID,
        ROSCTR_JOB,
        0x00,
        0x00,
        ref_hi,
        ref_lo,
        par_hi,
        par_lo,
        dat_hi,
        dat_lo,
    ]
}

fn frame(body_len: usize) -> Result<Vec<u8>> {
    let total = ISO_HEADER_SIZE + body_len;
    let length = u16::try_from(total).map_err(|_| {
        TransportError::invalid_request(format!("frame of {total} bytes exceeds TPKT limit"))
    })?;
    let mut bytes = Vec::with_capacity(total);
    bytes.extend_from_slice(&TpktHeader::new(length).to_bytes());
    bytes.extend_from_slice(&COTP_DATA);
    Ok(bytes)
}

/// Checks that `count` bytes starting at `offset` are addressable.
///
/// # Errors
///
/// Returns `TransportError::InvalidRequest` if `count` is 0 or the last byte
/// lies beyond [`MAX_BYTE_OFFSET`].
pub(crate) fn check_byte_range(offset: u32, count: usize) -> Result<()> {
    if count == 0 {
        return Err(TransportError::invalid_request("byte count must not be 0"));
    }
    let last = u64::from(offset).saturating_add(count as u64 - 1);
    if last > u64::from(MAX_BYTE_OFFSET) {
        return Err(TransportError::invalid_request(format!(
            "byte range {offset}..={last} exceeds maximum offset {MAX_BYTE_OFFSET}"
        )));
    }
    Ok(())
}

/// A data block byte range as encoded in a read/write item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BlockItem {
    block: u16,
    offset: u32,
    count: u16,
}

impl BlockItem {
    fn new(block: u16, offset: u32, count: usize) -> Result<Self> {
        check_byte_range(offset, count)?;
        let count = u16::try_from(count).map_err(|_| {
            TransportError::invalid_request(format!("byte count {count} exceeds 65535"))
        })?;
        Ok(Self {
            block,
            offset,
            count,
        })
    }

    /// Serializes the item (12 bytes) into `bytes`.
    fn write_to(self, bytes: &mut Vec<u8>) {
        let bit_address = self.offset * 8;
        bytes.extend_from_slice(&[0x12, 0x0A, 0x10, DataType::Byte.word_length()]);
        bytes.extend_from_slice(&self.count.to_be_bytes());
        bytes.extend_from_slice(&self.block.to_be_bytes());
        bytes.push(AREA_DB);
        bytes.extend_from_slice(&bit_address.to_be_bytes()[1..]);
    }
}

/// Setup communication request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupCommunication {
    pdu_ref: u16,
    pdu_length: u16,
}

impl SetupCommunication {
    /// Creates a setup request asking for `pdu_length` bytes per PDU.
    ///
    /// The PLC may answer with a smaller length; use the negotiated value.
    pub fn new(pdu_ref: u16, pdu_length: u16) -> Self {
        Self {
            pdu_ref,
            pdu_length,
        }
    }

    /// Serializes the request to a 25-byte frame.
    ///
    /// # Example
    ///
    /// ```
    /// use logo_vm::SetupCommunication;
    ///
    /// let bytes = SetupCommunication::new(0, 480).to_bytes();
    /// assert_eq!(bytes.len(), 25);
    /// assert_eq!(&bytes[23..], &[0x01, 0xE0]);
    /// ```
    pub fn to_bytes(self) -> Vec<u8> {
        let body = S7_JOB_HEADER_SIZE + SETUP_PARAM_LEN as usize;
        let mut bytes = Vec::with_capacity(ISO_HEADER_SIZE + body);
        bytes.extend_from_slice(&TpktHeader::new((ISO_HEADER_SIZE + body) as u16).to_bytes());
        bytes.extend_from_slice(&COTP_DATA);
        bytes.extend_from_slice(&job_header(self.pdu_ref, SETUP_PARAM_LEN, 0));
        bytes.extend_from_slice(&[FN_SETUP_COMMUNICATION, 0x00]);
        bytes.extend_from_slice(&1u16.to_be_bytes()); // max AmQ calling
        bytes.extend_from_slice(&1u16.to_be_bytes()); // max AmQ called
        bytes.extend_from_slice(&self.pdu_length.to_be_bytes());
        bytes
    }
}

/// Read variable request for a byte range of a data block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadVarRequest {
    pdu_ref: u16,
    item: BlockItem,
}

impl ReadVarRequest {
    /// Creates a new read request.
    ///
    /// # Arguments
    ///
    /// * `pdu_ref` - PDU reference echoed in the response
    /// * `block` - Data block number
    /// * `offset` - First byte to read
    /// * `count` - Number of bytes to read
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidRequest` if `count` is 0 or the range
    /// ends beyond [`MAX_BYTE_OFFSET`].
    pub fn new(pdu_ref: u16, block: u16, offset: u32, count: usize) -> Result<Self> {
        Ok(Self {
            pdu_ref,
            item: BlockItem::new(block, offset, count)?,
        })
    }

    /// Returns the PDU reference.
    pub fn pdu_ref(&self) -> u16 {
        self.pdu_ref
    }

    /// Returns the number of bytes requested.
    pub fn count(&self) -> usize {
        self.item.count as usize
    }

    /// Serializes the request to a 31-byte frame.
    pub fn to_bytes(&self) -> Vec<u8> {
        let body = S7_JOB_HEADER_SIZE + ITEM_PARAM_LEN as usize;
        let mut bytes = Vec::with_capacity(ISO_HEADER_SIZE + body);
        bytes.extend_from_slice(&TpktHeader::new((ISO_HEADER_SIZE + body) as u16).to_bytes());
        bytes.extend_from_slice(&COTP_DATA);
        bytes.extend_from_slice(&job_header(self.pdu_ref, ITEM_PARAM_LEN, 0));
        bytes.push(FN_READ_VAR);
        bytes.push(0x01); // item count
        self.item.write_to(&mut bytes);
        bytes
    }
}

/// Write variable request for a byte range of a data block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteVarRequest<'a> {
    pdu_ref: u16,
    item: BlockItem,
    data: &'a [u8],
}

impl<'a> WriteVarRequest<'a> {
    /// Creates a new write request.
    ///
    /// # Arguments
    ///
    /// * `pdu_ref` - PDU reference echoed in the response
    /// * `block` - Data block number
    /// * `offset` - First byte to write
    /// * `data` - Bytes to write
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidRequest` if `data` is empty, its bit
    /// length does not fit in 16 bits, or the range ends beyond
    /// [`MAX_BYTE_OFFSET`].
    ///
    /// # Example
    ///
    /// ```
    /// use logo_vm::WriteVarRequest;
    ///
    /// let cmd = WriteVarRequest::new(0x0002, 1, 31, &[0x01, 0x2C]).unwrap();
    /// assert_eq!(cmd.to_bytes().unwrap().len(), 35 + 2);
    /// assert!(WriteVarRequest::new(0x0002, 1, 31, &[]).is_err());
    /// ```
    pub fn new(pdu_ref: u16, block: u16, offset: u32, data: &'a [u8]) -> Result<Self> {
        if data.len() * 8 > u16::MAX as usize {
            return Err(TransportError::invalid_request(format!(
                "{} bytes exceed the 16-bit bit length of a write item",
                data.len()
            )));
        }
        Ok(Self {
            pdu_ref,
            item: BlockItem::new(block, offset, data.len())?,
            data,
        })
    }

    /// Returns the PDU reference.
    pub fn pdu_ref(&self) -> u16 {
        self.pdu_ref
    }

    /// Serializes the request to a frame of 35 + data bytes.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidRequest` if the frame exceeds the TPKT
    /// length limit.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let data_len = WRITE_DATA_HEADER_LEN + self.data.len();
        let mut bytes = frame(S7_JOB_HEADER_SIZE + ITEM_PARAM_LEN as usize + data_len)?;
        bytes.extend_from_slice(&job_header(self.pdu_ref, ITEM_PARAM_LEN, data_len as u16));
        bytes.push(FN_WRITE_VAR);
        bytes.push(0x01); // item count
        self.item.write_to(&mut bytes);
        bytes.push(0x00); // reserved
        bytes.push(TS_RES_BYTE);
        bytes.extend_from_slice(&((self.data.len() * 8) as u16).to_be_bytes());
        bytes.extend_from_slice(self.data);
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_communication_serialization() {
        let bytes = SetupCommunication::new(0x0000, DEFAULT_PDU_LENGTH).to_bytes();
        assert_eq!(
            bytes,
            hex::decode("0300001902f080320100000000000800 00f0000001000101e0".replace(' ', ""))
                .unwrap()
        );
    }

    #[test]
    fn test_read_var_serialization() {
        // VD3 of DB1: 4 bytes at bit address 24
        let cmd = ReadVarRequest::new(0x0005, 1, 3, 4).unwrap();
        let bytes = cmd.to_bytes();

        assert_eq!(bytes.len(), 31);
        assert_eq!(&bytes[..4], &[0x03, 0x00, 0x00, 0x1F]); // TPKT
        assert_eq!(&bytes[4..7], &[0x02, 0xF0, 0x80]); // COTP DT
        assert_eq!(bytes[7], S7_PROTOCOL_ID);
        assert_eq!(bytes[8], ROSCTR_JOB);
        assert_eq!(&bytes[11..13], &[0x00, 0x05]); // PDU ref
        assert_eq!(&bytes[13..15], &[0x00, 0x0E]); // param length
        assert_eq!(&bytes[15..17], &[0x00, 0x00]); // data length
        assert_eq!(bytes[17], FN_READ_VAR);
        assert_eq!(bytes[18], 0x01);
        assert_eq!(
            &bytes[19..31],
            &[0x12, 0x0A, 0x10, 0x02, 0x00, 0x04, 0x00, 0x01, 0x84, 0x00, 0x00, 0x18]
        );
        assert_eq!(cmd.count(), 4);
        assert_eq!(cmd.pdu_ref(), 5);
    }

    #[test]
    fn test_read_var_bit_address_uses_three_bytes() {
        let bytes = ReadVarRequest::new(0, 1, MAX_BYTE_OFFSET, 1)
            .unwrap()
            .to_bytes();
        assert_eq!(&bytes[28..31], &[0xFF, 0xFF, 0xF8]);
    }

    #[test]
    fn test_read_var_invalid() {
        assert!(ReadVarRequest::new(0, 1, 0, 0).is_err());
        assert!(ReadVarRequest::new(0, 1, MAX_BYTE_OFFSET, 2).is_err());
        assert!(ReadVarRequest::new(0, 1, u32::MAX, 1).is_err());
        assert!(ReadVarRequest::new(0, 1, 0, 0x1_0000).is_err());
    }

    #[test]
    fn test_write_var_serialization() {
        // VW31 = 300 in DB1
        let data = [0x01, 0x2C];
        let cmd = WriteVarRequest::new(0x0007, 1, 31, &data).unwrap();
        let bytes = cmd.to_bytes().unwrap();

        assert_eq!(bytes.len(), 37);
        assert_eq!(&bytes[..4], &[0x03, 0x00, 0x00, 0x25]);
        assert_eq!(&bytes[11..13], &[0x00, 0x07]);
        assert_eq!(&bytes[13..15], &[0x00, 0x0E]); // param length
        assert_eq!(&bytes[15..17], &[0x00, 0x06]); // data length: 4 + 2
        assert_eq!(bytes[17], FN_WRITE_VAR);
        assert_eq!(
            &bytes[19..31],
            &[0x12, 0x0A, 0x10, 0x02, 0x00, 0x02, 0x00, 0x01, 0x84, 0x00, 0x00, 0xF8]
        );
        assert_eq!(&bytes[31..35], &[0x00, 0x04, 0x00, 0x10]); // 16 bits
        assert_eq!(&bytes[35..], &data);
    }

    #[test]
    fn test_write_var_invalid() {
        assert!(WriteVarRequest::new(0, 1, 0, &[]).is_err());
        let big = vec![0u8; 8192];
        assert!(WriteVarRequest::new(0, 1, 0, &big).is_err());
        assert!(WriteVarRequest::new(0, 1, MAX_BYTE_OFFSET, &[0, 0]).is_err());
    }

    #[test]
    fn test_check_byte_range() {
        assert!(check_byte_range(0, 1).is_ok());
        assert!(check_byte_range(MAX_BYTE_OFFSET, 1).is_ok());
        assert!(check_byte_range(MAX_BYTE_OFFSET - 999, 1000).is_ok());
        assert!(check_byte_range(MAX_BYTE_OFFSET - 600, 1000).is_err());
        assert!(check_byte_range(5, 0).is_err());
        assert!(check_byte_range(u32::MAX, usize::MAX).is_err());
    }

    #[test]
    fn test_item_transport_size_is_byte_word_length() {
        let bytes = ReadVarRequest::new(0, 1, 0, 1).unwrap().to_bytes();
        assert_eq!(bytes[22], DataType::Byte.word_length());
    }

    #[test]
    fn test_block_number_is_encoded() {
        let bytes = ReadVarRequest::new(0, 0x1234, 0, 1).unwrap().to_bytes();
        assert_eq!(&bytes[25..27], &[0x12, 0x34]);
    }
}
