//! CRC32 calculation for environment image validation
//!
//! The checksum covers the word holding the detail end address followed by
//! the exact bytes of the detail area, so both a corrupted record and a
//! corrupted end pointer are caught on load.

use crc::{Crc, CRC_32_ISO_HDLC};

/// CRC32 algorithm (ISO HDLC / Ethernet / ZIP)
const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Calculate the image checksum
///
/// `end_addr_word` is the 4 little-endian bytes encoding the detail end
/// address; `detail` is the detail area. The two parts are not contiguous
/// in the image when the CRC word sits between them, hence the incremental
/// digest.
pub fn calculate_crc32(end_addr_word: &[u8], detail: &[u8]) -> u32 {
    let mut digest = CRC32.digest();
    digest.update(end_addr_word);
    digest.update(detail);
    digest.finalize()
}

/// Validate image data against a stored checksum
pub fn validate_crc32(end_addr_word: &[u8], detail: &[u8], expected: u32) -> bool {
    calculate_crc32(end_addr_word, detail) == expected
}
