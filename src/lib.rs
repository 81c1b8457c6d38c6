#![no_std]

//! flash-env - Wear-leveling key/value environment store for NOR-like flash
//!
//! This library provides a small persistent environment (named string
//! key/value records) backed by a bounded flash region. The full image is
//! cached in RAM; mutations touch only the cache, and an explicit save
//! flushes it to the active data block. When an erase or program operation
//! fails, the active block migrates forward through the region so worn
//! sectors are left behind.
//!
//! # Modules
//!
//! - [`platform`]: Flash adapter trait, error types, and an in-memory mock
//!   for host tests
//! - [`env`]: The store itself — region layout, RAM image, record codec,
//!   and the wear-leveling persister

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod env;
pub mod logging;
pub mod platform;
