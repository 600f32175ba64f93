// Block, alignment and legacy CHS arithmetic

use super::{ALIGNMENT_LBA, BLOCK_SIZE};

/// Legacy geometry used for the obsolete MBR CHS fields
pub const SECTORS_PER_TRACK: u64 = 18;
pub const HEADS: u64 = 2;

/// Highest LBA whose CHS form survives the 8-bit-per-field truncation.
pub const CHS_MAX_LBA: u64 = 256 * HEADS * SECTORS_PER_TRACK - 1;

/// Number of blocks needed to hold `bytes` (ceiling division).
pub const fn bytes_to_lba(bytes: u64) -> u64 {
    bytes / BLOCK_SIZE as u64 + if bytes % BLOCK_SIZE as u64 != 0 { 1 } else { 0 }
}

/// Next alignment boundary strictly after the boundary at or below `lba`.
///
/// Always advances: an LBA that is already aligned moves a full alignment
/// unit forward. Partition sizing in `layout_image` depends on this.
///
/// `lba` must be below the last aligned boundary of the `u64` range; use
/// [`checked_next_aligned_lba`] when it may not be.
pub const fn next_aligned_lba(lba: u64) -> u64 {
    lba - (lba % ALIGNMENT_LBA) + ALIGNMENT_LBA
}

/// [`next_aligned_lba`], or `None` when no later boundary fits in a `u64`.
pub const fn checked_next_aligned_lba(lba: u64) -> Option<u64> {
    (lba - (lba % ALIGNMENT_LBA)).checked_add(ALIGNMENT_LBA)
}

/// Cylinder / head / sector triple, each field truncated to 8 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chs {
    pub cylinder: u8,
    pub head: u8,
    pub sector: u8,
}

impl Chs {
    /// Saturated value used once an address no longer fits CHS.
    pub const MAX_ENCODED: [u8; 3] = [0xFF, 0xFF, 0xFF];

    /// MBR byte order: head, sector (bits 0-5) | cylinder high bits (6-7), cylinder low.
    ///
    /// The cylinder is already truncated to 8 bits, so the high bits are zero.
    pub const fn encode(self) -> [u8; 3] {
        [self.head, self.sector & 0x3F, self.cylinder]
    }

    /// Encode `lba`, saturating to `FF FF FF` when it is out of CHS range.
    pub const fn encode_lba(lba: u64) -> [u8; 3] {
        if lba > CHS_MAX_LBA {
            Self::MAX_ENCODED
        } else {
            lba_to_chs(lba).encode()
        }
    }
}

/// Translate `lba` using 18 sectors/track and 2 heads.
///
/// Fields are silently truncated to 8 bits; nothing modern trusts them.
pub const fn lba_to_chs(lba: u64) -> Chs {
    let cylinder = lba / (HEADS * SECTORS_PER_TRACK);
    let head = (lba / SECTORS_PER_TRACK) % HEADS;
    let sector = (lba % SECTORS_PER_TRACK) + 1;

    Chs {
        cylinder: (cylinder & 0xFF) as u8,
        head: (head & 0xFF) as u8,
        sector: (sector & 0xFF) as u8,
    }
}
