//! Environment store error types

use crate::platform::FlashError;
use core::fmt;

/// Result type for environment operations
pub type Result<T> = core::result::Result<T, EnvError>;

/// User-level errors reported by the environment store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EnvError {
    /// Key is empty, contains a reserved byte, or (for delete) not found
    NameError,
    /// A created key collides with an existing record
    NameExists,
    /// Insufficient space for the record, or no migration slot remains in
    /// the region
    Full,
    /// The flash adapter failed outside the migration loop (reads during
    /// load, never erase/program during save)
    Flash(FlashError),
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvError::NameError => write!(f, "Invalid or unknown key"),
            EnvError::NameExists => write!(f, "Key already exists"),
            EnvError::Full => write!(f, "Environment region is full"),
            EnvError::Flash(e) => write!(f, "Flash error: {}", e),
        }
    }
}

impl From<FlashError> for EnvError {
    fn from(error: FlashError) -> Self {
        EnvError::Flash(error)
    }
}
