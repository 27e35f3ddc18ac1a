//! Error types for V-memory access.
//!
//! Two layers are kept apart: [`VmError`] covers everything the client itself
//! can reject (bad addresses, empty batches, undersized windows), while
//! [`TransportError`] carries whatever the block transport reported. The
//! client never retries or rewrites a transport error; it is wrapped in
//! [`VmError::Transport`] and handed back as-is.

use std::io;
use thiserror::Error;

use crate::address::Address;

/// Result type alias for V-memory operations.
pub type Result<T> = std::result::Result<T, VmError>;

/// Errors returned by the client, the address parser and the codecs.
#[derive(Debug, Error)]
pub enum VmError {
    /// Address text does not match the grammar.
    #[error("Invalid address '{input}': {reason}")]
    AddressFormat {
        /// The rejected address text.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A data type was requested that the codec cannot handle.
    #[error("Unsupported type: {reason}")]
    UnsupportedType {
        /// Description of the mismatch.
        reason: String,
    },

    /// A batched write was invoked with no entries.
    #[error("Write batch is empty")]
    EmptyBatch,

    /// A value does not fit in the byte window it is encoded into or decoded from.
    #[error("{address} needs {needed} bytes of window, only {available} available")]
    WindowOverflow {
        /// The address being encoded or decoded.
        address: Address,
        /// Bytes required from the start of the window.
        needed: usize,
        /// Bytes actually present in the window.
        available: usize,
    },

    /// Failure reported by the block transport.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl VmError {
    /// Creates a new `AddressFormat` error.
    ///
    /// # Example
    ///
    /// ```
    /// use logo_vm::VmError;
    ///
    /// let err = VmError::address_format("VQ10", "unknown prefix 'VQ'");
    /// assert_eq!(err.to_string(), "Invalid address 'VQ10': unknown prefix 'VQ'");
    /// ```
    pub fn address_format(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AddressFormat {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new `UnsupportedType` error.
    pub fn unsupported_type(reason: impl Into<String>) -> Self {
        Self::UnsupportedType {
            reason: reason.into(),
        }
    }

    /// Creates a new `WindowOverflow` error.
    pub fn window_overflow(address: Address, needed: usize, available: usize) -> Self {
        Self::WindowOverflow {
            address,
            needed,
            available,
        }
    }
}

/// Errors surfaced by a [`BlockTransport`](crate::BlockTransport).
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O error on the underlying socket.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Communication timeout.
    #[error("Communication timeout")]
    Timeout,

    /// The session is closed (or was never opened).
    #[error("Not connected")]
    NotConnected,

    /// The PLC refused the ISO connection or the S7 session setup.
    #[error("Connection rejected: {reason}")]
    ConnectionRejected {
        /// Description of the rejection.
        reason: String,
    },

    /// The request cannot be expressed on the wire.
    #[error("Invalid request: {reason}")]
    InvalidRequest {
        /// Description of the problem.
        reason: String,
    },

    /// The PLC answered with something that could not be parsed.
    #[error("Invalid response: {reason}")]
    InvalidResponse {
        /// Description of the response error.
        reason: String,
    },

    /// S7 header-level error returned by the PLC.
    #[error("PLC error: class 0x{class:02X}, code 0x{code:02X}")]
    PlcError {
        /// Error class byte of the ack-data header.
        class: u8,
        /// Error code byte of the ack-data header.
        code: u8,
    },

    /// S7 item-level return code other than success.
    #[error("Item error 0x{code:02X}: {}", describe_item(.code))]
    ItemError {
        /// Item return code.
        code: u8,
    },
}

impl TransportError {
    /// Creates a new `ConnectionRejected` error.
    pub fn connection_rejected(reason: impl Into<String>) -> Self {
        Self::ConnectionRejected {
            reason: reason.into(),
        }
    }

    /// Creates a new `InvalidRequest` error.
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Creates a new `InvalidResponse` error.
    ///
    /// # Example
    ///
    /// ```
    /// use logo_vm::TransportError;
    ///
    /// let err = TransportError::invalid_response("frame too short");
    /// assert_eq!(err.to_string(), "Invalid response: frame too short");
    /// ```
    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            reason: reason.into(),
        }
    }
}

/// Returns a description of an S7 data item return code.
///
/// # Example
///
/// ```
/// use logo_vm::item_error_description;
///
/// assert_eq!(item_error_description(0x05), "address out of range");
/// ```
pub fn item_error_description(code: u8) -> &'static str {
    match code {
        0x00 => "reserved",
        0x01 => "hardware fault",
        0x03 => "object access not allowed",
        0x05 => "address out of range",
        0x06 => "data type not supported",
        0x07 => "data type inconsistent",
        0x0A => "object does not exist",
        0xFF => "success",
        _ => "unknown item error",
    }
}

fn describe_item(code: &u8) -> &'static str {
    item_error_description(*code)
}
