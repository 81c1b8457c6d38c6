//! Platform abstraction layer
//!
//! This module provides the hardware abstraction the store is built
//! against. All flash-specific code lives behind [`FlashInterface`]; the
//! store itself never touches a device directly.

pub mod error;
pub mod mock;
pub mod traits;

// Re-export commonly used types
pub use error::{FlashError, Result};
pub use mock::MockFlash;
pub use traits::FlashInterface;
