//! Flash interface trait
//!
//! This module defines the flash adapter that platform implementations must
//! provide. The environment store performs all persistence through this
//! interface.

use crate::platform::Result;

/// Flash interface trait
///
/// Platform implementations must provide this interface for flash
/// read/write/erase operations against the region window owned by the
/// store.
///
/// # Flash Characteristics
///
/// - Flash is erased in fixed units (typically 4 KB sectors)
/// - Erase operations set all bytes to 0xFF
/// - Write operations can only change bits from 1→0 (erase first to reset)
/// - A freshly-erased region reads 0xFFFFFFFF in every word
///
/// # Safety Invariants
///
/// - Only one owner per flash instance (no concurrent access)
/// - Callers must not mutate the region behind the store's back while the
///   store is live
/// - All addresses handed to this interface are word-aligned (4 bytes)
pub trait FlashInterface {
    /// Read data from flash
    ///
    /// Reads `buf.len()` bytes starting at `address`. Both the address and
    /// the length are word-aligned.
    ///
    /// # Errors
    ///
    /// Returns `FlashError::InvalidAddress` if the range is out of bounds
    /// or misaligned, `FlashError::ReadFailed` if the read operation fails.
    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<()>;

    /// Write data to flash
    ///
    /// Programs `data` starting at `address`. The target range must have
    /// been erased first; programming can only change bits from 1→0. Both
    /// the address and the length are word-aligned.
    ///
    /// # Errors
    ///
    /// Returns `FlashError::InvalidAddress` if the range is out of bounds
    /// or misaligned, `FlashError::WriteFailed` if the program operation
    /// fails (for NOR flash this usually means a worn sector).
    fn write(&mut self, address: u32, data: &[u8]) -> Result<()>;

    /// Erase flash
    ///
    /// Erases at least `size` bytes starting at `address`, rounded up to
    /// the erase unit. `address` must be erase-unit aligned. Sets every
    /// byte in the erased range to 0xFF.
    ///
    /// # Errors
    ///
    /// Returns `FlashError::InvalidAddress` if the range is out of bounds
    /// or `address` is not erase-unit aligned, `FlashError::EraseFailed`
    /// if the erase operation fails.
    fn erase(&mut self, address: u32, size: u32) -> Result<()>;

    /// Get the minimum erasable unit size in bytes
    fn erase_size(&self) -> u32;

    /// Get the total flash capacity in bytes
    fn capacity(&self) -> u32;
}
