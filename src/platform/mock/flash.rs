//! Mock flash implementation for testing
//!
//! Provides in-memory flash simulation for unit tests.

use crate::platform::{error::FlashError, traits::FlashInterface, Result};
use alloc::collections::VecDeque;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::RefCell;

/// Mock flash implementation
///
/// Simulates NOR flash in memory for testing. Supports:
/// - Read/write/erase operations with 1→0 programming semantics
/// - Corruption injection for testing recovery paths
/// - Erase count tracking for wear leveling validation
/// - Scripted erase/write faults for driving block migration
/// - Power-loss simulation for reliability testing
///
/// A scripted fault leaves the array untouched, so tests can observe the
/// abandoned block exactly as a worn sector would leave it.
///
/// # Example
///
/// ```
/// use flash_env::platform::mock::MockFlash;
/// use flash_env::platform::traits::FlashInterface;
///
/// let mut flash = MockFlash::new(0x10000, 0x200);
///
/// // Erase a sector
/// flash.erase(0x1000, 0x200).unwrap();
///
/// // Write data
/// let data = [0x62, 0x6F, 0x6F, 0x74]; // "boot"
/// flash.write(0x1000, &data).unwrap();
///
/// // Read back
/// let mut buf = [0u8; 4];
/// flash.read(0x1000, &mut buf).unwrap();
/// assert_eq!(buf, data);
///
/// // Check erase count
/// assert_eq!(flash.get_erase_count(0x1000), 1);
/// ```
#[derive(Debug)]
pub struct MockFlash {
    /// Flash storage (initialized to 0xFF - erased state)
    storage: RefCell<Vec<u8>>,
    /// Erase count per erase unit (for wear leveling testing)
    erase_counts: RefCell<Vec<u32>>,
    /// Minimum erasable unit size
    erase_size: u32,
    /// Scripted erase results (true = fail); empty queue means success
    erase_faults: RefCell<VecDeque<bool>>,
    /// Scripted write results (true = fail); empty queue means success
    write_faults: RefCell<VecDeque<bool>>,
    /// Simulated power loss flag
    power_loss: RefCell<bool>,
}

impl MockFlash {
    /// Create a new mock flash instance
    ///
    /// # Arguments
    ///
    /// - `capacity`: total simulated flash size in bytes
    /// - `erase_size`: minimum erasable unit, a power of two ≥ 4
    pub fn new(capacity: u32, erase_size: u32) -> Self {
        assert!(erase_size >= 4 && erase_size.is_power_of_two());
        assert!(capacity > 0 && capacity % erase_size == 0);

        let storage = vec![0xFF; capacity as usize];
        let unit_count = (capacity / erase_size) as usize;

        Self {
            storage: RefCell::new(storage),
            erase_counts: RefCell::new(vec![0; unit_count]),
            erase_size,
            erase_faults: RefCell::new(VecDeque::new()),
            write_faults: RefCell::new(VecDeque::new()),
            power_loss: RefCell::new(false),
        }
    }

    /// Get flash contents (for test verification)
    pub fn get_contents(&self, address: u32, len: usize) -> Vec<u8> {
        let storage = self.storage.borrow();
        storage[address as usize..(address as usize + len)].to_vec()
    }

    /// Inject corruption at address (for testing error recovery)
    ///
    /// Flips the low bit of each byte in the range, bypassing the 1→0
    /// programming rule.
    pub fn inject_corruption(&mut self, address: u32, len: usize) {
        let mut storage = self.storage.borrow_mut();
        for i in 0..len {
            storage[address as usize + i] ^= 0x01;
        }
    }

    /// Get erase count for an erase unit (for wear leveling validation)
    pub fn get_erase_count(&self, address: u32) -> u32 {
        let unit = (address / self.erase_size) as usize;
        self.erase_counts.borrow()[unit]
    }

    /// Get total erase count across all units
    pub fn get_total_erase_count(&self) -> u32 {
        self.erase_counts.borrow().iter().sum()
    }

    /// Script the outcome of upcoming erase operations
    ///
    /// Each entry answers one future `erase` call in order; `true` makes it
    /// fail with `EraseFailed`. Once the script runs out, erases succeed
    /// again.
    pub fn script_erase_faults(&mut self, script: &[bool]) {
        self.erase_faults.borrow_mut().extend(script.iter().copied());
    }

    /// Make the next `n` erase operations fail
    pub fn fail_next_erases(&mut self, n: usize) {
        self.erase_faults.borrow_mut().extend(core::iter::repeat(true).take(n));
    }

    /// Script the outcome of upcoming write operations
    ///
    /// Same contract as [`Self::script_erase_faults`], for `write`.
    pub fn script_write_faults(&mut self, script: &[bool]) {
        self.write_faults.borrow_mut().extend(script.iter().copied());
    }

    /// Make the next `n` write operations fail
    pub fn fail_next_writes(&mut self, n: usize) {
        self.write_faults.borrow_mut().extend(core::iter::repeat(true).take(n));
    }

    /// Simulate power loss during the next write operation
    ///
    /// The next write will only partially complete, simulating power loss
    /// mid-operation for reliability testing.
    pub fn simulate_power_loss(&mut self) {
        *self.power_loss.borrow_mut() = true;
    }

    fn take_fault(queue: &RefCell<VecDeque<bool>>) -> bool {
        queue.borrow_mut().pop_front().unwrap_or(false)
    }

    fn capacity_bytes(&self) -> usize {
        self.storage.borrow().len()
    }

    fn round_up_to_unit(&self, size: u32) -> u32 {
        size.div_ceil(self.erase_size) * self.erase_size
    }
}

impl FlashInterface for MockFlash {
    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<()> {
        if address % 4 != 0 || buf.len() % 4 != 0 {
            return Err(FlashError::InvalidAddress);
        }
        if address as usize + buf.len() > self.capacity_bytes() {
            return Err(FlashError::InvalidAddress);
        }

        let storage = self.storage.borrow();
        buf.copy_from_slice(&storage[address as usize..(address as usize + buf.len())]);

        Ok(())
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<()> {
        if address % 4 != 0 || data.len() % 4 != 0 {
            return Err(FlashError::InvalidAddress);
        }
        if address as usize + data.len() > self.capacity_bytes() {
            return Err(FlashError::InvalidAddress);
        }

        if Self::take_fault(&self.write_faults) {
            return Err(FlashError::WriteFailed);
        }

        // Simulate power loss (partial write)
        let write_len = if *self.power_loss.borrow() {
            *self.power_loss.borrow_mut() = false;
            data.len() / 2
        } else {
            data.len()
        };

        // Flash can only change bits from 1→0
        let mut storage = self.storage.borrow_mut();
        for i in 0..write_len {
            storage[address as usize + i] &= data[i];
        }

        Ok(())
    }

    fn erase(&mut self, address: u32, size: u32) -> Result<()> {
        if address % self.erase_size != 0 {
            return Err(FlashError::InvalidAddress);
        }

        let erased = self.round_up_to_unit(size);
        if address as usize + erased as usize > self.capacity_bytes() {
            return Err(FlashError::InvalidAddress);
        }

        if Self::take_fault(&self.erase_faults) {
            return Err(FlashError::EraseFailed);
        }

        let mut storage = self.storage.borrow_mut();
        for i in 0..erased as usize {
            storage[address as usize + i] = 0xFF;
        }

        let start_unit = (address / self.erase_size) as usize;
        let mut erase_counts = self.erase_counts.borrow_mut();
        for unit in 0..(erased / self.erase_size) as usize {
            erase_counts[start_unit + unit] += 1;
        }

        Ok(())
    }

    fn erase_size(&self) -> u32 {
        self.erase_size
    }

    fn capacity(&self) -> u32 {
        self.capacity_bytes() as u32
    }
}
