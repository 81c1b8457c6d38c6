//! Platform trait definitions

pub mod flash;

pub use flash::FlashInterface;
