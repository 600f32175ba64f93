// Locating a partition in an existing image
//
// Structural checks only: signatures, the partition number and the entry's
// LBA bounds. Header and table CRCs are not recomputed here; `verify_gpt`
// does that separately.

use core::fmt;

use gpt_disk_io::BlockIo;
use gpt_disk_types::{BlockSize, Lba};

use super::types::{GptHeader, GptPartitionEntry, PARTITION_ENTRY_SIZE, PRIMARY_HEADER_LBA};
use crate::disk::mbr::{ProtectiveMbr, OSTYPE_PROTECTIVE};
use crate::disk::{ALIGNMENT_LBA, BLOCK_SIZE};

/// Lowest starting LBA accepted for a partition
pub const MIN_PARTITION_LBA: u64 = ALIGNMENT_LBA;

/// Read step that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocateStage {
    DeviceSize,
    Mbr,
    GptHeader,
    PartitionEntry,
}

impl fmt::Display for LocateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceSize => write!(f, "device size"),
            Self::Mbr => write!(f, "MBR"),
            Self::GptHeader => write!(f, "GPT header"),
            Self::PartitionEntry => write!(f, "partition entry"),
        }
    }
}

/// One variant per validation gate, in the order they are checked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocateError {
    Io(LocateStage),
    UnsupportedBlockSize,
    /// Block 0 does not end in 0xAA55
    InvalidMbrSignature(u16),
    /// MBR record 0 is not a protective entry starting at LBA 1
    NotProtective { os_type: u8, starting_lba: u32 },
    /// Block 1 does not carry "EFI PART"
    InvalidGptSignature(u64),
    PartitionNumberOutOfRange { number: u32, max: u32 },
    StartOutOfRange { start: u64, min: u64, max: u64 },
    EndOutOfRange { start: u64, end: u64, max: u64 },
}

impl fmt::Display for LocateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(stage) => write!(f, "I/O error reading {}", stage),
            Self::UnsupportedBlockSize => write!(f, "unsupported block size (need 512)"),
            Self::InvalidMbrSignature(sig) => {
                write!(f, "MBR signature is {:#06x}, expected 0xaa55", sig)
            }
            Self::NotProtective {
                os_type,
                starting_lba,
            } => write!(
                f,
                "MBR entry 0 is type {:#04x} at LBA {}, expected type 0xee at LBA 1",
                os_type, starting_lba
            ),
            Self::InvalidGptSignature(sig) => {
                write!(f, "GPT signature is {:#018x}, expected \"EFI PART\"", sig)
            }
            Self::PartitionNumberOutOfRange { number, max } => {
                write!(f, "partition {} out of range 1..={}", number, max)
            }
            Self::StartOutOfRange { start, min, max } => write!(
                f,
                "partition start LBA {} outside {}..={}",
                start, min, max
            ),
            Self::EndOutOfRange { start, end, max } => write!(
                f,
                "partition end LBA {} must be above start {} and at most {}",
                end, start, max
            ),
        }
    }
}

/// Partition found by [`locate_partition`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedPartition {
    /// 1-based
    pub number: u32,
    pub start_lba: u64,
    /// Inclusive, as stored in the entry
    pub end_lba: u64,
    pub entry: GptPartitionEntry,
}

impl LocatedPartition {
    /// `end_lba - start_lba`, the length handed to the formatter.
    ///
    /// One short of the inclusive block count; the formatter never touches
    /// the final block of the partition.
    pub const fn sector_count(&self) -> u64 {
        self.end_lba - self.start_lba
    }
}

fn read_block<B: BlockIo>(
    block_io: &mut B,
    lba: u64,
    stage: LocateStage,
) -> Result<[u8; BLOCK_SIZE], LocateError> {
    let mut buf = [0u8; BLOCK_SIZE];
    block_io.read_blocks(Lba(lba), &mut buf).map_err(|err| {
        tracing::error!(%err, lba, %stage, "read failed");
        LocateError::Io(stage)
    })?;
    Ok(buf)
}

/// Validate the image's partitioning and resolve 1-based partition `number`.
///
/// Stops at the first failing check.
pub fn locate_partition<B: BlockIo>(
    block_io: &mut B,
    number: u32,
) -> Result<LocatedPartition, LocateError> {
    if block_io.block_size() != BlockSize::BS_512 {
        return Err(LocateError::UnsupportedBlockSize);
    }
    let total_blocks = block_io.num_blocks().map_err(|err| {
        tracing::error!(%err, "could not query device size");
        LocateError::Io(LocateStage::DeviceSize)
    })?;

    let mbr = ProtectiveMbr::from_bytes(&read_block(block_io, 0, LocateStage::Mbr)?);
    if !mbr.has_valid_signature() {
        return Err(LocateError::InvalidMbrSignature(mbr.signature));
    }

    let record = mbr.partitions[0];
    if record.os_type != OSTYPE_PROTECTIVE || record.starting_lba != 1 {
        return Err(LocateError::NotProtective {
            os_type: record.os_type,
            starting_lba: record.starting_lba,
        });
    }

    let header_block = read_block(block_io, PRIMARY_HEADER_LBA, LocateStage::GptHeader)?;
    let header = GptHeader::from_bytes(&header_block);
    if !header.has_valid_signature() {
        return Err(LocateError::InvalidGptSignature(header.signature));
    }

    if number == 0 || number > header.number_of_partition_entries {
        return Err(LocateError::PartitionNumberOutOfRange {
            number,
            max: header.number_of_partition_entries,
        });
    }

    let offset = (number as u64 - 1) * PARTITION_ENTRY_SIZE as u64;
    let entry_lba = header.partition_entry_lba + offset / BLOCK_SIZE as u64;
    let within = (offset % BLOCK_SIZE as u64) as usize;
    let block = read_block(block_io, entry_lba, LocateStage::PartitionEntry)?;

    let mut raw = [0u8; PARTITION_ENTRY_SIZE];
    raw.copy_from_slice(&block[within..within + PARTITION_ENTRY_SIZE]);
    let entry = GptPartitionEntry::from_bytes(&raw);

    let start = entry.starting_lba;
    let end = entry.ending_lba;
    if start < MIN_PARTITION_LBA || start > total_blocks {
        return Err(LocateError::StartOutOfRange {
            start,
            min: MIN_PARTITION_LBA,
            max: total_blocks,
        });
    }
    if end <= start || end > total_blocks {
        return Err(LocateError::EndOutOfRange {
            start,
            end,
            max: total_blocks,
        });
    }

    tracing::info!(
        number,
        start_lba = start,
        end_lba = end,
        "located partition"
    );

    Ok(LocatedPartition {
        number,
        start_lba: start,
        end_lba: end,
        entry,
    })
}
