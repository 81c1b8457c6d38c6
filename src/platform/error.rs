//! Platform error types
//!
//! This module defines error types for flash adapter operations. Platform
//! implementations map their HAL-specific errors to these variants.

use core::fmt;

/// Result type for platform operations
pub type Result<T> = core::result::Result<T, FlashError>;

/// Flash-specific errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError {
    /// Erase operation failed
    EraseFailed,
    /// Write operation failed
    WriteFailed,
    /// Read operation failed
    ReadFailed,
    /// Invalid address (out of bounds or misaligned)
    InvalidAddress,
}

impl fmt::Display for FlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlashError::EraseFailed => write!(f, "Flash erase failed"),
            FlashError::WriteFailed => write!(f, "Flash write failed"),
            FlashError::ReadFailed => write!(f, "Flash read failed"),
            FlashError::InvalidAddress => write!(f, "Invalid flash address"),
        }
    }
}
