//! CRC-32 (IEEE 802.3, reflected polynomial 0xEDB88320)
//!
//! Used for the GPT header and partition entry array checksums.

const POLYNOMIAL: u32 = 0xEDB8_8320;

/// Byte-indexed lookup table, built at compile time.
static TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ POLYNOMIAL
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// CRC-32 of `data`.
pub fn crc32(data: &[u8]) -> u32 {
    crc32_update(0, data)
}

/// Continue a CRC-32 from a previous result.
///
/// `crc32_update(crc32(a), b) == crc32(a ++ b)`. A `previous` of 0 starts a
/// fresh checksum.
pub fn crc32_update(previous: u32, data: &[u8]) -> u32 {
    let mut crc = !previous;
    for &byte in data {
        crc = (crc >> 8) ^ TABLE[((crc & 0xFF) as u8 ^ byte) as usize];
    }
    !crc
}
