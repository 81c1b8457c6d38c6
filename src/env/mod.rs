//! Wear-leveling environment store
//!
//! Persistent `key=value` records over a bounded flash region, fully
//! cached in RAM between loads and saves.
//!
//! # Region Format
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │ System slot: u32 = active block address       │  region_base
//! ├───────────────────────────────────────────────┤
//! │ Data block (relocatable, erase-unit aligned)  │  region_base + erase_unit
//! │   detail_end_addr: u32                        │    +0
//! │   data_crc32: u32 (iff CRC enabled)           │    +4
//! │   Records: key '=' value '\0', zero-padded    │    +header
//! │            to a multiple of 4 bytes           │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! When an erase or program fails during a save, the data block migrates
//! forward by a payload-sized multiple of the erase unit and the system
//! slot is rewritten to point at the new block. The slot update is the
//! commit point: until it lands, a power cycle recovers the previous
//! block.

pub mod crc;
pub mod error;
mod image;
pub mod layout;
mod record;
pub mod store;

pub use error::EnvError;
pub use layout::RegionLayout;
pub use store::{EnvDefault, EnvStore, StoreStats};
