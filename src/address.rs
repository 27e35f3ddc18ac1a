//! V-memory address notation.
//!
//! Addresses are written the way LOGO! Soft Comfort shows them:
//!
//! | Text | Meaning |
//! |------|---------|
//! | `V94` | byte 94 |
//! | `VW31` | word starting at byte 31 |
//! | `VD3` | double word starting at byte 3 |
//! | `V2.4` | bit 4 of byte 2 |
//!
//! Offsets are always in bytes from the start of the block, even for bit
//! addresses. Prefixes are case-sensitive.
//!
//! # Example
//!
//! ```
//! use logo_vm::{Address, DataType};
//!
//! let addr: Address = "V2.4".parse()?;
//! assert_eq!(addr, Address::Bit { byte: 2, bit: 4 });
//! assert_eq!(addr.data_type(), DataType::Bit);
//! assert_eq!(addr.to_string(), "V2.4");
//!
//! let word = Address::parse("VW31")?;
//! assert_eq!(word.byte(), 31);
//! assert_eq!(word.size(), 2);
//! # Ok::<(), logo_vm::VmError>(())
//! ```

use std::str::FromStr;

use crate::error::{Result, VmError};
use crate::memory::DataType;

/// Highest valid bit index inside a byte.
pub const MAX_BIT: u8 = 7;

/// A typed location in V-memory.
///
/// Only [`Address::Bit`] carries a bit index, so a word with a bit position
/// cannot be expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Address {
    /// Bit `bit` (0-7) of byte `byte`.
    Bit {
        /// Byte offset in the block.
        byte: u32,
        /// Bit index, 0 = LSB.
        bit: u8,
    },
    /// Unsigned byte.
    Byte {
        /// Byte offset in the block.
        byte: u32,
    },
    /// Unsigned 16-bit word.
    Word {
        /// Byte offset in the block.
        byte: u32,
    },
    /// Unsigned 32-bit double word.
    DWord {
        /// Byte offset in the block.
        byte: u32,
    },
    /// 16-bit counter.
    Counter {
        /// Byte offset in the block.
        byte: u32,
    },
    /// 16-bit timer.
    Timer {
        /// Byte offset in the block.
        byte: u32,
    },
    /// 32-bit float engineering value.
    Real {
        /// Byte offset in the block.
        byte: u32,
    },
}

impl Address {
    /// Creates a bit address.
    ///
    /// # Errors
    ///
    /// Returns `VmError::AddressFormat` if `bit` > 7.
    ///
    /// # Example
    ///
    /// ```
    /// use logo_vm::Address;
    ///
    /// let addr = Address::bit(2, 4).unwrap();
    /// assert_eq!(addr.bit_index(), Some(4));
    /// assert!(Address::bit(2, 8).is_err());
    /// ```
    pub fn bit(byte: u32, bit: u8) -> Result<Self> {
        if bit > MAX_BIT {
            return Err(VmError::address_format(
                format!("V{byte}.{bit}"),
                "bit index must be 0-7",
            ));
        }
        Ok(Address::Bit { byte, bit })
    }

    /// Builds an address from a type tag, a byte offset and an optional bit.
    ///
    /// # Errors
    ///
    /// - `VmError::UnsupportedType` if a bit is given for a non-bit type, or
    ///   missing for [`DataType::Bit`]
    /// - `VmError::AddressFormat` if the bit index is > 7
    ///
    /// # Example
    ///
    /// ```
    /// use logo_vm::{Address, DataType};
    ///
    /// let addr = Address::from_parts(DataType::Timer, 12, None)?;
    /// assert_eq!(addr, Address::Timer { byte: 12 });
    ///
    /// assert!(Address::from_parts(DataType::Word, 12, Some(3)).is_err());
    /// assert!(Address::from_parts(DataType::Bit, 12, None).is_err());
    /// # Ok::<(), logo_vm::VmError>(())
    /// ```
    pub fn from_parts(data_type: DataType, byte: u32, bit: Option<u8>) -> Result<Self> {
        match (data_type, bit) {
            (DataType::Bit, Some(bit)) => Address::bit(byte, bit),
            (DataType::Bit, None) => Err(VmError::unsupported_type(
                "bit address requires a bit index",
            )),
            (other, Some(_)) => Err(VmError::unsupported_type(format!(
                "{other} address cannot carry a bit index"
            ))),
            (DataType::Byte, None) => Ok(Address::Byte { byte }),
            (DataType::Word, None) => Ok(Address::Word { byte }),
            (DataType::DWord, None) => Ok(Address::DWord { byte }),
            (DataType::Counter, None) => Ok(Address::Counter { byte }),
            (DataType::Timer, None) => Ok(Address::Timer { byte }),
            (DataType::Real, None) => Ok(Address::Real { byte }),
        }
    }

    /// Parses the textual address notation.
    ///
    /// Recognized forms are `V<digits>.<0-7>`, `VW<digits>`, `VD<digits>` and
    /// `V<digits>`. The whole input must be consumed.
    ///
    /// # Errors
    ///
    /// Returns `VmError::AddressFormat` for unknown prefixes, missing or
    /// oversized offsets, a missing, non-numeric or out-of-range bit index, or
    /// trailing characters.
    ///
    /// # Example
    ///
    /// ```
    /// use logo_vm::Address;
    ///
    /// assert_eq!(Address::parse("V94")?, Address::Byte { byte: 94 });
    /// assert_eq!(Address::parse("VD3")?, Address::DWord { byte: 3 });
    /// assert!(Address::parse("VQ10").is_err());
    /// # Ok::<(), logo_vm::VmError>(())
    /// ```
    pub fn parse(text: &str) -> Result<Self> {
        let fail = |reason: &str| VmError::address_format(text, reason);

        let letters = text
            .bytes()
            .position(|b| !b.is_ascii_alphabetic())
            .unwrap_or(text.len());
        let (prefix, rest) = text.split_at(letters);
        let digits = rest
            .bytes()
            .position(|b| !b.is_ascii_digit())
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(digits);

        match prefix {
            "V" | "VW" | "VD" => {}
            "" => return Err(fail("missing 'V' prefix")),
            other => return Err(fail(&format!("unknown prefix '{other}'"))),
        }
        if number.is_empty() {
            return Err(fail("missing byte offset"));
        }
        let byte: u32 = number
            .parse()
            .map_err(|_| fail("byte offset out of range"))?;

        match (prefix, tail) {
            ("V", "") => Ok(Address::Byte { byte }),
            ("VW", "") => Ok(Address::Word { byte }),
            ("VD", "") => Ok(Address::DWord { byte }),
            ("V", tail) if tail.starts_with('.') => {
                let bit = parse_bit(&tail[1..]).map_err(|reason| fail(reason))?;
                Ok(Address::Bit { byte, bit })
            }
            (_, tail) if tail.starts_with('.') => {
                Err(fail(&format!("'{prefix}' addresses have no bit index")))
            }
            (_, tail) => Err(fail(&format!("unexpected trailing '{tail}'"))),
        }
    }

    /// Returns the value type of this address.
    pub fn data_type(self) -> DataType {
        match self {
            Address::Bit { .. } => DataType::Bit,
            Address::Byte { .. } => DataType::Byte,
            Address::Word { .. } => DataType::Word,
            Address::DWord { .. } => DataType::DWord,
            Address::Counter { .. } => DataType::Counter,
            Address::Timer { .. } => DataType::Timer,
            Address::Real { .. } => DataType::Real,
        }
    }

    /// Returns the block-relative byte offset.
    pub fn byte(self) -> u32 {
        match self {
            Address::Bit { byte, .. }
            | Address::Byte { byte }
            | Address::Word { byte }
            | Address::DWord { byte }
            | Address::Counter { byte }
            | Address::Timer { byte }
            | Address::Real { byte } => byte,
        }
    }

    /// Returns the bit index for bit addresses, `None` otherwise.
    pub fn bit_index(self) -> Option<u8> {
        match self {
            Address::Bit { bit, .. } => Some(bit),
            _ => None,
        }
    }

    /// Returns the encoded width in bytes.
    pub fn size(self) -> usize {
        self.data_type().size()
    }

    /// Returns the offset one past the last byte this address touches.
    pub(crate) fn end(self) -> u64 {
        u64::from(self.byte()) + self.size() as u64
    }
}

fn parse_bit(text: &str) -> std::result::Result<u8, &'static str> {
    match text.as_bytes() {
        [] => Err("missing bit index after '.'"),
        [d] if d.is_ascii_digit() => {
            let bit = d - b'0';
            if bit > MAX_BIT {
                Err("bit index must be 0-7")
            } else {
                Ok(bit)
            }
        }
        digits if digits.iter().all(u8::is_ascii_digit) => Err("bit index must be 0-7"),
        _ => Err("bit index is not a digit"),
    }
}

impl FromStr for Address {
    type Err = VmError;

    fn from_str(s: &str) -> Result<Self> {
        Address::parse(s)
    }
}

// Counter/Timer and Real share the VW/VD notation of their width.
impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Address::Bit { byte, bit } => write!(f, "V{byte}.{bit}"),
            Address::Byte { byte } => write!(f, "V{byte}"),
            Address::Word { byte } | Address::Counter { byte } | Address::Timer { byte } => {
                write!(f, "VW{byte}")
            }
            Address::DWord { byte } | Address::Real { byte } => write!(f, "VD{byte}"),
        }
    }
}

/// An address paired with the value to write there.
///
/// The value is truncated to the width of the address type when encoded.
///
/// # Example
///
/// ```
/// use logo_vm::{Address, AddressedValue};
///
/// let entry = AddressedValue::parse("VW31", 300)?;
/// assert_eq!(entry.address, Address::Word { byte: 31 });
/// assert_eq!(entry.value, 300);
/// # Ok::<(), logo_vm::VmError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AddressedValue {
    /// Where to write.
    pub address: Address,
    /// What to write.
    pub value: u32,
}

impl AddressedValue {
    /// Creates a new addressed value.
    pub fn new(address: Address, value: u32) -> Self {
        Self { address, value }
    }

    /// Parses the address text and pairs it with `value`.
    ///
    /// # Errors
    ///
    /// Returns `VmError::AddressFormat` if the address text is malformed.
    pub fn parse(address: &str, value: u32) -> Result<Self> {
        Ok(Self::new(Address::parse(address)?, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_format_error(text: &str) {
        match Address::parse(text) {
            Err(VmError::AddressFormat { input, .. }) => assert_eq!(input, text),
            other => panic!("expected AddressFormat for {text:?}, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_literal_examples() {
        assert_eq!(Address::parse("V94").unwrap(), Address::Byte { byte: 94 });
        assert_eq!(Address::parse("VW31").unwrap(), Address::Word { byte: 31 });
        assert_eq!(Address::parse("VD3").unwrap(), Address::DWord { byte: 3 });
        assert_eq!(
            Address::parse("V2.4").unwrap(),
            Address::Bit { byte: 2, bit: 4 }
        );
    }

    #[test]
    fn test_parse_bit_bounds() {
        assert_eq!(
            Address::parse("V0.0").unwrap(),
            Address::Bit { byte: 0, bit: 0 }
        );
        assert_eq!(
            Address::parse("V850.7").unwrap(),
            Address::Bit { byte: 850, bit: 7 }
        );
        assert_format_error("V2.8");
        assert_format_error("V2.9");
        assert_format_error("V2.10");
    }

    #[test]
    fn test_parse_malformed() {
        for text in [
            "", "V", "VW", "VD", "X5", "VQ10", "v5", "vw5", "W5", "V.3", "V2.", "V2.a", "V2.4.1",
            "VW3.1", "VD3.0", "V12x", "VW 31", " V94", "V94 ", "V-1", "V+1",
        ] {
            assert_format_error(text);
        }
    }

    #[test]
    fn test_parse_offset_overflow() {
        assert_eq!(
            Address::parse("V4294967295").unwrap(),
            Address::Byte { byte: u32::MAX }
        );
        assert_format_error("V4294967296");
        assert_format_error("VD99999999999999999999");
    }

    #[test]
    fn test_parse_leading_zeros_are_canonicalized() {
        let addr = Address::parse("VW007").unwrap();
        assert_eq!(addr, Address::Word { byte: 7 });
        assert_eq!(addr.to_string(), "VW7");
    }

    #[test]
    fn test_parse_non_ascii_does_not_panic() {
        assert_format_error("Vé1");
        assert_format_error("V1.é");
        assert_format_error("ВW1");
    }

    #[test]
    fn test_format_parse_roundtrip() {
        for text in [
            "V0", "V94", "V1023", "VW0", "VW31", "VD3", "VD1020", "V2.4", "V0.0", "V7.7",
        ] {
            let addr: Address = text.parse().unwrap();
            assert_eq!(addr.to_string(), text);
        }
    }

    #[test]
    fn test_format_width_aliases() {
        assert_eq!(Address::Counter { byte: 4 }.to_string(), "VW4");
        assert_eq!(Address::Timer { byte: 6 }.to_string(), "VW6");
        assert_eq!(Address::Real { byte: 8 }.to_string(), "VD8");
    }

    #[test]
    fn test_accessors() {
        let bit = Address::Bit { byte: 2, bit: 4 };
        assert_eq!(bit.byte(), 2);
        assert_eq!(bit.bit_index(), Some(4));
        assert_eq!(bit.size(), 1);
        assert_eq!(bit.end(), 3);

        let dword = Address::DWord { byte: 3 };
        assert_eq!(dword.bit_index(), None);
        assert_eq!(dword.data_type(), DataType::DWord);
        assert_eq!(dword.end(), 7);

        assert_eq!(Address::DWord { byte: u32::MAX }.end(), u64::from(u32::MAX) + 4);
    }

    #[test]
    fn test_from_parts() {
        assert_eq!(
            Address::from_parts(DataType::Bit, 2, Some(4)).unwrap(),
            Address::Bit { byte: 2, bit: 4 }
        );
        assert_eq!(
            Address::from_parts(DataType::Real, 8, None).unwrap(),
            Address::Real { byte: 8 }
        );
        assert!(matches!(
            Address::from_parts(DataType::Bit, 2, None),
            Err(VmError::UnsupportedType { .. })
        ));
        assert!(matches!(
            Address::from_parts(DataType::Counter, 2, Some(1)),
            Err(VmError::UnsupportedType { .. })
        ));
        assert!(matches!(
            Address::from_parts(DataType::Bit, 2, Some(8)),
            Err(VmError::AddressFormat { .. })
        ));
    }

    #[test]
    fn test_from_parts_matches_data_type() {
        for t in DataType::ALL {
            let bit = t.is_bit().then_some(3);
            let addr = Address::from_parts(t, 10, bit).unwrap();
            assert_eq!(addr.data_type(), t);
            assert_eq!(addr.byte(), 10);
        }
    }

    #[test]
    fn test_addressed_value_parse() {
        let entry = AddressedValue::parse("V2.4", 1).unwrap();
        assert_eq!(entry.address, Address::Bit { byte: 2, bit: 4 });
        assert_eq!(entry.value, 1);
        assert!(AddressedValue::parse("X5", 1).is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_json() {
        let entry = AddressedValue::parse("V2.4", 1).unwrap();
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, r#"{"address":{"Bit":{"byte":2,"bit":4}},"value":1}"#);
        let back: AddressedValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }
}
