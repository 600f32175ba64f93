//! Master Boot Record (protective form)
//!
//! Layout of block 0:
//!
//! ```text
//! 0x000  bootstrap code (446 bytes, zero)
//! 0x1BE  partition record 0..3 (16 bytes each)
//! 0x1FE  signature 0xAA55 (little endian: 55 AA)
//! ```

use super::geometry::Chs;
use super::BLOCK_SIZE;

pub const MBR_SIGNATURE: u16 = 0xAA55;

/// OS type marking a GPT protective partition
pub const OSTYPE_PROTECTIVE: u8 = 0xEE;

const BOOTSTRAP_SIZE: usize = 446;
const RECORD_SIZE: usize = 16;
const RECORDS_OFFSET: usize = BOOTSTRAP_SIZE;
const SIGNATURE_OFFSET: usize = 510;

/// One 16-byte MBR partition record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MbrPartitionRecord {
    /// 0x80 = bootable
    pub boot_indicator: u8,
    pub start_chs: [u8; 3],
    pub os_type: u8,
    pub end_chs: [u8; 3],
    pub starting_lba: u32,
    pub size_in_lba: u32,
}

impl MbrPartitionRecord {
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut b = [0u8; RECORD_SIZE];
        b[0] = self.boot_indicator;
        b[1..4].copy_from_slice(&self.start_chs);
        b[4] = self.os_type;
        b[5..8].copy_from_slice(&self.end_chs);
        b[8..12].copy_from_slice(&self.starting_lba.to_le_bytes());
        b[12..16].copy_from_slice(&self.size_in_lba.to_le_bytes());
        b
    }

    pub fn from_bytes(b: &[u8; RECORD_SIZE]) -> Self {
        Self {
            boot_indicator: b[0],
            start_chs: [b[1], b[2], b[3]],
            os_type: b[4],
            end_chs: [b[5], b[6], b[7]],
            starting_lba: u32::from_le_bytes([b[8], b[9], b[10], b[11]]),
            size_in_lba: u32::from_le_bytes([b[12], b[13], b[14], b[15]]),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Block 0 of the image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectiveMbr {
    pub bootstrap: [u8; BOOTSTRAP_SIZE],
    pub partitions: [MbrPartitionRecord; 4],
    pub signature: u16,
}

/// Logical size of the protective partition for a device of `total_blocks`.
///
/// `total_blocks - 1`, except that devices with more than 2^32 blocks report
/// exactly 2^32. That value does not fit the 32-bit field; see
/// [`ProtectiveMbr::new`] for what lands on disk.
pub const fn protective_span(total_blocks: u64) -> u64 {
    if total_blocks > u32::MAX as u64 {
        1 << 32
    } else {
        total_blocks.saturating_sub(1)
    }
}

impl ProtectiveMbr {
    /// Protective MBR covering a device of `total_blocks` blocks.
    ///
    /// Record 0 starts at LBA 1 with type 0xEE; records 1-3 are zero. A span
    /// clipped to 2^32 is stored as `0xFFFF_FFFF`.
    pub fn new(total_blocks: u64) -> Self {
        let span = protective_span(total_blocks);
        let size_in_lba = if span > u32::MAX as u64 {
            u32::MAX
        } else {
            span as u32
        };

        let protective = MbrPartitionRecord {
            boot_indicator: 0,
            start_chs: Chs::encode_lba(1),
            os_type: OSTYPE_PROTECTIVE,
            end_chs: Chs::encode_lba(span),
            starting_lba: 1,
            size_in_lba,
        };

        Self {
            bootstrap: [0u8; BOOTSTRAP_SIZE],
            partitions: [
                protective,
                MbrPartitionRecord::default(),
                MbrPartitionRecord::default(),
                MbrPartitionRecord::default(),
            ],
            signature: MBR_SIGNATURE,
        }
    }

    pub fn to_bytes(&self) -> [u8; BLOCK_SIZE] {
        let mut block = [0u8; BLOCK_SIZE];
        block[..BOOTSTRAP_SIZE].copy_from_slice(&self.bootstrap);
        for (i, record) in self.partitions.iter().enumerate() {
            let offset = RECORDS_OFFSET + i * RECORD_SIZE;
            block[offset..offset + RECORD_SIZE].copy_from_slice(&record.to_bytes());
        }
        block[SIGNATURE_OFFSET..].copy_from_slice(&self.signature.to_le_bytes());
        block
    }

    pub fn from_bytes(block: &[u8; BLOCK_SIZE]) -> Self {
        let mut bootstrap = [0u8; BOOTSTRAP_SIZE];
        bootstrap.copy_from_slice(&block[..BOOTSTRAP_SIZE]);

        let mut partitions = [MbrPartitionRecord::default(); 4];
        for (i, record) in partitions.iter_mut().enumerate() {
            let offset = RECORDS_OFFSET + i * RECORD_SIZE;
            let mut raw = [0u8; RECORD_SIZE];
            raw.copy_from_slice(&block[offset..offset + RECORD_SIZE]);
            *record = MbrPartitionRecord::from_bytes(&raw);
        }

        Self {
            bootstrap,
            partitions,
            signature: u16::from_le_bytes([block[SIGNATURE_OFFSET], block[SIGNATURE_OFFSET + 1]]),
        }
    }

    pub fn has_valid_signature(&self) -> bool {
        self.signature == MBR_SIGNATURE
    }
}
