//! Flash-backed environment store
//!
//! Provides the user-facing operations over the RAM image and the
//! wear-leveling persistence loop. Mutations (`set`, `del`) touch only the
//! cache; `save` flushes the header and detail area to the active data
//! block, migrating forward through the region when the flash misbehaves.

use super::crc;
use super::error::{EnvError, Result};
use super::image::EnvImage;
use super::layout::{RegionLayout, WORD_SIZE};
use super::record::{self, Record, RecordIter};
use crate::platform::FlashInterface;

/// Value read from a freshly-erased flash word
const ERASED_WORD: u32 = 0xFFFF_FFFF;

/// One factory-default record
///
/// Supplied to [`EnvStore::init`] as a slice; installed whenever the
/// region is uninitialized or fails validation on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EnvDefault {
    pub key: &'static str,
    pub value: &'static str,
}

impl EnvDefault {
    pub const fn new(key: &'static str, value: &'static str) -> Self {
        Self { key, value }
    }
}

/// Storage statistics for wear leveling monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StoreStats {
    /// Number of successful saves
    pub total_saves: u32,
    /// Number of block migrations caused by erase/program failures
    pub migrations: u32,
}

/// Environment store over a flash region
///
/// The store owns the flash device, the region geometry, and the RAM image
/// of the active data block. Between `load` and `save` the image is
/// authoritative; flash is only touched by `save` and by the recovery path
/// in `load`.
///
/// # Example
///
/// ```
/// use flash_env::env::{EnvDefault, EnvStore, RegionLayout};
/// use flash_env::platform::mock::MockFlash;
///
/// const DEFAULTS: &[EnvDefault] = &[
///     EnvDefault::new("boot_times", "0"),
///     EnvDefault::new("user", "admin"),
/// ];
///
/// let flash = MockFlash::new(0x10000, 0x200);
/// let layout = RegionLayout::new(0x1000, 0x1000, 0x200, false);
/// let mut store = EnvStore::init(flash, layout, DEFAULTS).unwrap();
///
/// assert_eq!(store.get("user"), Some("admin"));
/// store.set("user", "root").unwrap();
/// store.save().unwrap();
/// ```
pub struct EnvStore<F: FlashInterface> {
    /// Flash device the region lives on
    flash: F,
    /// Region geometry
    layout: RegionLayout,
    /// RAM mirror of the active data block
    image: EnvImage,
    /// Absolute address of the active data block
    active_addr: u32,
    /// Factory defaults installed on first boot or corruption
    defaults: &'static [EnvDefault],
    /// Save/migration counters
    stats: StoreStats,
}

impl<F: FlashInterface> EnvStore<F> {
    /// Initialize the store and load the environment from flash
    ///
    /// Allocates the RAM image (one heap allocation of the region size)
    /// and runs the recovery ladder: an uninitialized or corrupt region
    /// comes up holding `defaults`.
    ///
    /// # Errors
    ///
    /// Returns `EnvError::Flash` if the adapter fails to read, or
    /// `EnvError::Full` if installing defaults cannot find a writable
    /// block.
    ///
    /// # Panics
    ///
    /// Panics on malformed geometry: an empty defaults set, a region
    /// outside the device, or an erase unit the device cannot honor.
    /// These are programmer errors, not runtime failures.
    pub fn init(flash: F, layout: RegionLayout, defaults: &'static [EnvDefault]) -> Result<Self> {
        assert!(!defaults.is_empty(), "default environment set must not be empty");
        assert!(
            layout.end_addr() <= flash.capacity(),
            "region must fit the flash device"
        );
        assert!(
            layout.erase_min_size() % flash.erase_size() == 0,
            "region erase unit must be a multiple of the device erase unit"
        );

        let image = EnvImage::new(layout.total_size() as usize, layout.header_size() as usize);
        let mut store = Self {
            flash,
            layout,
            image,
            active_addr: 0,
            defaults,
            stats: StoreStats::default(),
        };
        store.load()?;
        Ok(store)
    }

    /// Reset the RAM image to the factory defaults and persist it
    pub fn set_default(&mut self) -> Result<()> {
        // Truncate the detail area
        self.image.set_detail_end_addr(self.detail_start_addr());

        for default in self.defaults {
            self.create(default.key, default.value)?;
        }
        self.save()
    }

    /// Look up the value stored for `key`
    ///
    /// Returns `None` when the key is absent (or empty).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.find(key).map(|record| record.value)
    }

    /// Set `key` to `value` in the RAM image
    ///
    /// An empty value deletes the record; an existing key is replaced.
    /// All-or-nothing in RAM: a full store keeps the previous value. No
    /// flash side effect until [`Self::save`].
    ///
    /// # Errors
    ///
    /// `EnvError::NameError` for a malformed key (or a value embedding a
    /// NUL byte), `EnvError::Full` when the record does not fit.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if value.is_empty() {
            return self.del(key);
        }

        Self::validate_key(key)?;
        if value.contains('\0') {
            return Err(EnvError::NameError);
        }

        if let Some(old_len) = self.find(key).map(|record| record.padded_len) {
            // Check capacity before deleting so a full store keeps the
            // previous value
            let remaining = self.detail_size() as usize - old_len;
            if !self.record_fits(remaining, record::padded_len(key, value)) {
                return Err(EnvError::Full);
            }
            self.del(key)?;
        }
        self.create(key, value)
    }

    /// Delete the record for `key` from the RAM image
    ///
    /// # Errors
    ///
    /// `EnvError::NameError` for a malformed key or a miss.
    pub fn del(&mut self, key: &str) -> Result<()> {
        Self::validate_key(key)?;

        let (offset, len) = match self.find(key) {
            Some(record) => (record.offset, record.padded_len),
            None => {
                crate::log_info!("Key \"{}\" not found in the environment", key);
                return Err(EnvError::NameError);
            }
        };

        let detail_size = self.detail_size() as usize;
        self.image.remove(detail_size, offset, len);
        self.image
            .set_detail_end_addr(self.image.detail_end_addr() - len as u32);
        Ok(())
    }

    /// Flush the RAM image to the active data block
    ///
    /// Erase and program failures are never surfaced: the block migrates
    /// forward by a payload-sized multiple of the erase unit and the flush
    /// is retried. When the block has moved, the system slot is rewritten
    /// afterwards as the commit point.
    ///
    /// # Errors
    ///
    /// `EnvError::Full` when no candidate block remains in the region; the
    /// system slot is cleared to `0xFFFFFFFF`, so the next boot starts
    /// from defaults.
    pub fn save(&mut self) -> Result<()> {
        let entry_addr = self.active_addr;
        let detail_size = self.detail_size();
        let image_len = self.layout.header_size() + detail_size;

        while self.active_addr + detail_size < self.layout.end_addr() {
            if self.layout.crc_check() {
                // The end-address word participates in the checksum, so a
                // migrated image checksums differently
                let checksum = self.calc_crc();
                self.image.set_crc(checksum);
            }

            if self.flash.erase(self.active_addr, image_len).is_err() {
                crate::log_warn!(
                    "Erase failed at 0x{:x}, moving the environment forward",
                    self.active_addr
                );
                self.migrate(detail_size);
                continue;
            }

            if self
                .flash
                .write(self.active_addr, self.image.flash_prefix(image_len as usize))
                .is_err()
            {
                crate::log_warn!(
                    "Program failed at 0x{:x}, moving the environment forward",
                    self.active_addr
                );
                self.migrate(detail_size);
                continue;
            }
            break;
        }

        if self.active_addr + detail_size < self.layout.end_addr() {
            if self.active_addr != entry_addr {
                self.write_system_slot(self.active_addr);
            }
            self.stats.total_saves += 1;
            Ok(())
        } else {
            crate::log_error!("No space left in the region to save the environment");
            self.write_system_slot(ERASED_WORD);
            Err(EnvError::Full)
        }
    }

    /// Log every record plus a usage summary
    pub fn print(&self) {
        let detail = self.image.detail(self.detail_size() as usize);
        for rec in RecordIter::new(detail) {
            crate::log_info!("{}={}", rec.key, rec.value);
        }
        crate::log_info!(
            "Environment size: {}/{} bytes.",
            self.used_size(),
            self.total_size()
        );
    }

    /// Bytes of the active block currently in use (header plus records)
    pub fn used_size(&self) -> u32 {
        self.layout.header_size() + self.detail_size()
    }

    /// Total byte size of the environment region
    pub fn total_size(&self) -> u32 {
        self.layout.total_size()
    }

    /// Absolute flash address of the active data block
    pub fn active_addr(&self) -> u32 {
        self.active_addr
    }

    /// Save/migration counters
    pub fn stats(&self) -> StoreStats {
        self.stats
    }

    /// Flash device reference (for testing)
    pub fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    /// Give the flash device back, consuming the store
    pub fn into_flash(self) -> F {
        self.flash
    }

    /// Load the environment from flash into the RAM image
    ///
    /// Recovery ladder: a blank or implausible system slot reinitializes
    /// the region at the first data block; an out-of-range end address or
    /// a checksum mismatch falls back to defaults.
    fn load(&mut self) -> Result<()> {
        let candidate = self.read_word(self.layout.start_addr())?;

        if candidate == ERASED_WORD || !self.layout.is_data_block_addr(candidate) {
            crate::log_info!("Environment region uninitialized, installing defaults");
            self.active_addr = self.layout.first_data_addr();
            self.write_system_slot(self.active_addr);
            return self.set_default();
        }

        self.active_addr = candidate;
        let end_addr = self.read_word(self.active_addr)?;
        if !self.end_addr_in_range(end_addr) {
            crate::log_warn!("Environment end address is corrupt, installing defaults");
            return self.set_default();
        }

        self.image.set_detail_end_addr(end_addr);
        let detail_size = self.detail_size() as usize;
        let detail_addr = self.detail_start_addr();
        self.flash.read(detail_addr, self.image.detail_mut(detail_size))?;

        if self.layout.crc_check() {
            let stored = self.read_word(self.active_addr + WORD_SIZE)?;
            self.image.set_crc(stored);
            if !self.crc_matches() {
                crate::log_warn!("Environment CRC check failed, installing defaults");
                return self.set_default();
            }
        }
        Ok(())
    }

    /// Append an encoded record to the RAM detail area
    fn create(&mut self, key: &str, value: &str) -> Result<()> {
        Self::validate_key(key)?;
        if value.contains('\0') {
            return Err(EnvError::NameError);
        }
        if self.find(key).is_some() {
            crate::log_info!("Key \"{}\" already exists", key);
            return Err(EnvError::NameExists);
        }

        let len = record::padded_len(key, value);
        let detail_size = self.detail_size() as usize;
        if !self.record_fits(detail_size, len) {
            return Err(EnvError::Full);
        }

        record::encode_into(self.image.tail_mut(detail_size, len), key, value);
        self.image
            .set_detail_end_addr(self.image.detail_end_addr() + len as u32);
        Ok(())
    }

    /// Whether a record of `len` bytes fits after `detail_size` used bytes
    fn record_fits(&self, detail_size: usize, len: usize) -> bool {
        self.layout.header_size() as usize + detail_size + len <= self.layout.total_size() as usize
    }

    fn validate_key(key: &str) -> Result<()> {
        if key.is_empty() {
            crate::log_info!("Environment key must not be empty");
            return Err(EnvError::NameError);
        }
        if key.contains('=') || key.contains('\0') {
            crate::log_info!("Environment key \"{}\" contains a reserved byte", key);
            return Err(EnvError::NameError);
        }
        Ok(())
    }

    /// First record whose key equals `key`
    fn find(&self, key: &str) -> Option<Record<'_>> {
        if key.is_empty() {
            return None;
        }
        let detail = self.image.detail(self.detail_size() as usize);
        RecordIter::new(detail).find(|record| record.key == key)
    }

    /// Absolute flash address where the detail area starts
    fn detail_start_addr(&self) -> u32 {
        self.active_addr + self.layout.header_size()
    }

    /// Bytes of detail currently cached
    fn detail_size(&self) -> u32 {
        self.image.detail_end_addr() - self.detail_start_addr()
    }

    /// Whether a loaded end address describes a plausible detail area
    fn end_addr_in_range(&self, end_addr: u32) -> bool {
        let detail_start = self.detail_start_addr();
        end_addr >= detail_start
            && end_addr <= self.layout.end_addr()
            && (end_addr - detail_start) % WORD_SIZE == 0
    }

    /// Advance the active block past sectors that failed to erase or
    /// program
    ///
    /// The step covers the whole payload so the retry lands entirely on
    /// untouched erase units.
    fn migrate(&mut self, detail_size: u32) {
        let unit = self.layout.erase_min_size();
        let step = (detail_size / unit + 1) * unit;
        self.active_addr += step;
        self.image
            .set_detail_end_addr(self.image.detail_end_addr() + step);
        self.stats.migrations += 1;
    }

    /// Persist an active block address to the system slot
    ///
    /// A failure is logged, not surfaced: the store keeps serving the RAM
    /// image and the next boot recovers the block the slot still names.
    fn write_system_slot(&mut self, addr: u32) {
        let slot = self.layout.start_addr();
        let committed = self
            .flash
            .erase(slot, WORD_SIZE)
            .and_then(|_| self.flash.write(slot, &addr.to_le_bytes()));
        if committed.is_err() {
            crate::log_error!("System slot update failed, the environment cannot be committed");
        }
    }

    fn read_word(&mut self, addr: u32) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.flash.read(addr, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn calc_crc(&self) -> u32 {
        let detail = self.image.detail(self.detail_size() as usize);
        crc::calculate_crc32(self.image.end_addr_word(), detail)
    }

    fn crc_matches(&self) -> bool {
        self.calc_crc() == self.image.crc()
    }
}
