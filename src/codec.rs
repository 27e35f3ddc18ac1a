//! Typed value encoding into raw V-memory bytes.
//!
//! Every value crosses the API as a `u32` and is narrowed or widened
//! according to the address type. Multi-byte values are big-endian, as on
//! the S7 wire.
//!
//! # Encoding Rules
//!
//! | Type | Bytes | Encode | Decode |
//! |------|:-----:|--------|--------|
//! | Bit | 1 | set/clear one bit in place | 0 or 1 |
//! | Byte | 1 | low 8 bits | widen |
//! | Word, Counter, Timer | 2 | low 16 bits | widen |
//! | DWord | 4 | all 32 bits | as-is |
//! | Real | 4 | `value as f32` | `f32 as u32` |
//!
//! # Real Values
//!
//! Reals are engineering values: the integer is converted numerically to
//! `f32`, not reinterpreted bit-for-bit. Integers up to 2^24 survive the round
//! trip exactly; larger ones are rounded to the nearest representable float
//! on the way in. On the way out the float is truncated toward zero, and
//! Rust's float-to-int cast saturates: negative values and NaN decode as 0,
//! values at or above 2^32 decode as `u32::MAX`.
//!
//! # Example
//!
//! ```
//! use logo_vm::{codec, Address};
//!
//! let mut window = [0u8; 4];
//! codec::encode(Address::Word { byte: 31 }, 300, &mut window, 1)?;
//! assert_eq!(window, [0x00, 0x01, 0x2C, 0x00]);
//! assert_eq!(codec::decode(Address::Word { byte: 31 }, &window, 1)?, 300);
//!
//! let bit = Address::Bit { byte: 2, bit: 4 };
//! codec::encode(bit, 1, &mut window, 3)?;
//! assert_eq!(window[3], 0b0001_0000);
//! # Ok::<(), logo_vm::VmError>(())
//! ```

use crate::address::{Address, MAX_BIT};
use crate::error::{Result, VmError};
use crate::utils::{get_bit, set_bit};

/// Writes `value` for `address` into `window` starting at `offset`.
///
/// A bit address patches the byte already in the window; the other seven
/// bits are preserved, so the caller must have filled the byte from the
/// block first. Any non-zero value sets the bit.
///
/// # Errors
///
/// - `VmError::WindowOverflow` if `offset + size` exceeds the window
/// - `VmError::AddressFormat` for a bit index above 7
pub fn encode(address: Address, value: u32, window: &mut [u8], offset: usize) -> Result<()> {
    let slot = slot_mut(address, window, offset)?;

    match address {
        Address::Bit { bit, .. } => {
            let bit = checked_bit(address, bit)?;
            slot[0] = set_bit(slot[0], bit, value != 0);
        }
        Address::Byte { .. } => slot[0] = value as u8,
        Address::Word { .. } | Address::Counter { .. } | Address::Timer { .. } => {
            slot.copy_from_slice(&(value as u16).to_be_bytes());
        }
        Address::DWord { .. } => slot.copy_from_slice(&value.to_be_bytes()),
        Address::Real { .. } => slot.copy_from_slice(&(value as f32).to_be_bytes()),
    }

    Ok(())
}

/// Reads the value for `address` from `window` starting at `offset`.
///
/// # Errors
///
/// - `VmError::WindowOverflow` if `offset + size` exceeds the window
/// - `VmError::AddressFormat` for a bit index above 7
pub fn decode(address: Address, window: &[u8], offset: usize) -> Result<u32> {
    let slot = slot(address, window, offset)?;

    let value = match address {
        Address::Bit { bit, .. } => u32::from(get_bit(slot[0], checked_bit(address, bit)?)),
        Address::Byte { .. } => u32::from(slot[0]),
        Address::Word { .. } | Address::Counter { .. } | Address::Timer { .. } => {
            u32::from(u16::from_be_bytes([slot[0], slot[1]]))
        }
        Address::DWord { .. } => u32::from_be_bytes([slot[0], slot[1], slot[2], slot[3]]),
        Address::Real { .. } => f32::from_be_bytes([slot[0], slot[1], slot[2], slot[3]]) as u32,
    };

    Ok(value)
}

fn slot(address: Address, window: &[u8], offset: usize) -> Result<&[u8]> {
    let needed = offset.saturating_add(address.size());
    window
        .get(offset..needed)
        .ok_or_else(|| VmError::window_overflow(address, needed, window.len()))
}

fn slot_mut(address: Address, window: &mut [u8], offset: usize) -> Result<&mut [u8]> {
    let needed = offset.saturating_add(address.size());
    let available = window.len();
    window
        .get_mut(offset..needed)
        .ok_or_else(|| VmError::window_overflow(address, needed, available))
}

fn checked_bit(address: Address, bit: u8) -> Result<u8> {
    if bit > MAX_BIT {
        return Err(VmError::address_format(
            address.to_string(),
            "bit index must be 0-7",
        ));
    }
    Ok(bit)
}
