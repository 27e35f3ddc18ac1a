//! Utility functions for bit manipulation and formatting.
//!
//! V-memory bits live inside bytes, so all helpers here operate on `u8`.
//! Bit index 0 is the least significant bit.
//!
//! # Example
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

/// Gets a single bit from a byte.
///
/// # Arguments
///
/// * `value` - The byte to extract from
/// * `bit` - Bit position (0-7, where 0 is LSB)
///
/// # Example
///
/// ```
/// use logo_vm::utils::get_bit;
///
/// let value: u8 = 0b0000_0101;
/// assert!(get_bit(value, 0));
/// assert!(!get_bit(value, 1));
/// assert!(get_bit(value, 2));
/// ```
#[inline]
pub fn get_bit(value: u8, bit: u8) -> bool {
    (value >> bit) & 1 != 0
}

/// Sets or clears a single bit in a byte, leaving the other seven untouched.
///
/// # Arguments
///
/// * `value` - The original byte
/// * `bit` - Bit position (0-7, where 0 is LSB)
/// * `state` - `true` sets the bit (OR), `false` clears it (AND-NOT)
///
/// # Example
///
/// ```
/// use logo_vm::utils::set_bit;
///
/// assert_eq!(set_bit(0, 4, true), 0b0001_0000);
/// assert_eq!(set_bit(0xFF, 4, false), 0b1110_1111);
/// ```
#[inline]
pub fn set_bit(value: u8, bit: u8, state: bool) -> u8 {
    if state {
        value | (1 << bit)
    } else {
        value & !(1 << bit)
    }
}

/// Formats a byte as grouped binary, e.g. `"0b0001_0000"`.
///
/// # Example
///
/// ```
/// use logo_vm::utils::format_binary;
///
/// assert_eq!(format_binary(0x12), "0b0001_0010");
/// ```
pub fn format_binary(value: u8) -> String {
    let binary = format!("{:08b}", value);
    format!("0b{}_{}", &binary[0..4], &binary[4..8])
}

/// Formats bytes as space-separated uppercase hex, e.g. `"03 00 00 16"`.
///
/// # Example
///
/// ```
/// use logo_vm::utils::format_hex;
///
/// assert_eq!(format_hex(&[0x03, 0x00, 0x00, 0x16]), "03 00 00 16");
/// assert_eq!(format_hex(&[]), "");
/// ```
pub fn format_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
