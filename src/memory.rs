//! Value types stored in V-memory.
//!
//! This module defines the [`DataType`] enum, the closed set of value types a
//! V-memory address can carry. Each type has a fixed width in bytes and a
//! matching S7 word-length code.
//!
//! # Types Overview
//!
//! | Type | Size | S7 word length | Address form |
//! |------|:----:|:--------------:|--------------|
//! | Bit | 1 | 0x01 | `V<byte>.<bit>` |
//! | Byte | 1 | 0x02 | `V<byte>` |
//! | Word | 2 | 0x04 | `VW<byte>` |
//! | DWord | 4 | 0x06 | `VD<byte>` |
//! | Real | 4 | 0x08 | - |
//! | Counter | 2 | 0x1C | - |
//! | Timer | 2 | 0x1D | - |
//!
//! # Example
//!
//! ```
//! use logo_vm::DataType;
//!
//! assert_eq!(DataType::Word.size(), 2);
//! assert_eq!(DataType::Real.size(), 4);
//! assert_eq!(DataType::Bit.to_string(), "Bit");
//! ```

/// Value types addressable in V-memory.
///
/// The size of a type never depends on the value stored in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataType {
    /// A single bit inside a byte.
    Bit,
    /// Unsigned 8-bit value.
    Byte,
    /// Unsigned 16-bit value.
    Word,
    /// 16-bit counter value.
    Counter,
    /// 16-bit timer value.
    Timer,
    /// Unsigned 32-bit value.
    DWord,
    /// 32-bit IEEE-754 float, exchanged as an integer engineering value.
    Real,
}

impl DataType {
    /// All data types, in declaration order.
    pub const ALL: [DataType; 7] = [
        DataType::Bit,
        DataType::Byte,
        DataType::Word,
        DataType::Counter,
        DataType::Timer,
        DataType::DWord,
        DataType::Real,
    ];

    /// Returns the encoded width in bytes.
    ///
    /// # Example
    ///
    /// ```
    /// use logo_vm::DataType;
    ///
    /// assert_eq!(DataType::Bit.size(), 1);
    /// assert_eq!(DataType::Timer.size(), 2);
    /// assert_eq!(DataType::DWord.size(), 4);
    /// ```
    pub const fn size(self) -> usize {
        match self {
            DataType::Bit | DataType::Byte => 1,
            DataType::Word | DataType::Counter | DataType::Timer => 2,
            DataType::DWord | DataType::Real => 4,
        }
    }

    /// Returns the S7 word-length code for this type.
    ///
    /// This is the transport size byte of a read/write item.
    pub fn word_length(self) -> u8 {
        match self {
            DataType::Bit => 0x01,
            DataType::Byte => 0x02,
            DataType::Word => 0x04,
            DataType::DWord => 0x06,
            DataType::Real => 0x08,
            DataType::Counter => 0x1C,
            DataType::Timer => 0x1D,
        }
    }

    /// Returns whether this type addresses a single bit.
    pub fn is_bit(self) -> bool {
        matches!(self, DataType::Bit)
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::Bit => write!(f, "Bit"),
            DataType::Byte => write!(f, "Byte"),
            DataType::Word => write!(f, "Word"),
            DataType::Counter => write!(f, "Counter"),
            DataType::Timer => write!(f, "Timer"),
            DataType::DWord => write!(f, "DWord"),
            DataType::Real => write!(f, "Real"),
        }
    }
}
