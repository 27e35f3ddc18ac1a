//! Coalescing of batched writes into one read-modify-write window.
//!
//! A batch of [`AddressedValue`]s scattered over the block is served by a
//! single byte window `[start, start + len)`: the client reads the window
//! once, [`WritePlan::apply`] patches every value into that buffer, and the
//! client writes the window back once. Bytes between the addressed values
//! are written back with the contents just read.
//!
//! # Window Sizing
//!
//! | Mode | Length |
//! |------|--------|
//! | [`WindowSizing::Covering`] | `max(byte + size) - start` |
//! | [`WindowSizing::Legacy`] | `max(byte) - start + 1` |
//!
//! `Legacy` reproduces the window length of deployed LOGO! clients, which
//! reserve a single byte for the entry at the highest offset. A multi-byte
//! value there does not fit; `apply` then fails with
//! [`VmError::WindowOverflow`] before anything is written.
//!
//! # Overlapping Entries
//!
//! Entries whose byte ranges overlap (e.g. `V3` and `V3.1`, or `VW4` and
//! `V5`) are patched in input order, so later entries win on shared bits.
//! That outcome is unspecified and may change.
//!
//! # Example
//!
//! ```
//! use logo_vm::{AddressedValue, WindowSizing, WritePlan};
//!
//! let batch = [
//!     AddressedValue::parse("VD3", 7)?,
//!     AddressedValue::parse("V2.4", 0)?,
//!     AddressedValue::parse("V94", 55)?,
//!     AddressedValue::parse("VW31", 300)?,
//! ];
//!
//! let plan = WritePlan::new(&batch, WindowSizing::Covering)?;
//! assert_eq!(plan.start(), 2);
//! assert_eq!(plan.len(), 93);
//!
//! let mut window = vec![0u8; plan.len()];
//! plan.apply(&mut window, &batch)?;
//! assert_eq!(window[92], 55);
//! # Ok::<(), logo_vm::VmError>(())
//! ```

use crate::address::AddressedValue;
use crate::codec;
use crate::error::{Result, VmError};

/// How the coalesced window length is computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WindowSizing {
    /// Window ends after the last byte any entry encodes into.
    #[default]
    Covering,
    /// Window ends one byte after the highest entry offset.
    Legacy,
}

/// The byte window a batch of writes is applied through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WritePlan {
    start: u32,
    len: usize,
}

impl WritePlan {
    /// Computes the window for `values`.
    ///
    /// # Errors
    ///
    /// - `VmError::EmptyBatch` if `values` is empty
    /// - `VmError::WindowOverflow` if the window would not fit in memory
    ///   addressable by this platform
    ///
    /// # Example
    ///
    /// ```
    /// use logo_vm::{AddressedValue, VmError, WindowSizing, WritePlan};
    ///
    /// let batch = [AddressedValue::parse("V10", 1)?, AddressedValue::parse("VW20", 2)?];
    ///
    /// let covering = WritePlan::new(&batch, WindowSizing::Covering)?;
    /// assert_eq!((covering.start(), covering.len()), (10, 12));
    ///
    /// let legacy = WritePlan::new(&batch, WindowSizing::Legacy)?;
    /// assert_eq!((legacy.start(), legacy.len()), (10, 11));
    ///
    /// assert!(matches!(WritePlan::new(&[], WindowSizing::Covering), Err(VmError::EmptyBatch)));
    /// # Ok::<(), logo_vm::VmError>(())
    /// ```
    pub fn new(values: &[AddressedValue], sizing: WindowSizing) -> Result<Self> {
        let first = values.first().ok_or(VmError::EmptyBatch)?;

        let start = values
            .iter()
            .map(|v| v.address.byte())
            .min()
            .unwrap_or(first.address.byte());

        let (end, widest) = match sizing {
            WindowSizing::Covering => values
                .iter()
                .map(|v| (v.address.end(), v))
                .max_by_key(|(end, _)| *end)
                .unwrap_or((first.address.end(), first)),
            WindowSizing::Legacy => values
                .iter()
                .map(|v| (u64::from(v.address.byte()) + 1, v))
                .max_by_key(|(end, _)| *end)
                .unwrap_or((u64::from(first.address.byte()) + 1, first)),
        };

        let span = end - u64::from(start);
        let len = usize::try_from(span).map_err(|_| {
            VmError::window_overflow(widest.address, usize::MAX, usize::MAX)
        })?;

        Ok(Self { start, len })
    }

    /// Block offset of the first byte in the window.
    pub fn start(&self) -> u32 {
        self.start
    }

    /// Number of bytes in the window.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Block offset one past the last byte in the window.
    pub fn end(&self) -> u64 {
        u64::from(self.start) + self.len as u64
    }

    /// Patches every value into `window`, which holds the block bytes
    /// `[start, start + len)`.
    ///
    /// Bit entries take their sibling bits from `window`, so it must be the
    /// buffer read from the block, not a zeroed one.
    ///
    /// # Errors
    ///
    /// - `VmError::WindowOverflow` if an entry does not fit in `window` or
    ///   starts before the plan
    ///
    /// On error, entries before the failing one have already been patched
    /// into `window`; callers must not write it back.
    pub fn apply(&self, window: &mut [u8], values: &[AddressedValue]) -> Result<()> {
        for entry in values {
            let local = entry
                .address
                .byte()
                .checked_sub(self.start)
                .ok_or_else(|| VmError::window_overflow(entry.address, usize::MAX, window.len()))?
                as usize;
            codec::encode(entry.address, entry.value, window, local)?;
        }
        Ok(())
    }
}
