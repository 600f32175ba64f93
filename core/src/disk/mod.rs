//! Disk-level layout: geometry helpers, the protective MBR and GPT

pub mod geometry;
pub mod gpt_ops;
pub mod mbr;

/// Sector size in bytes. Every structure is placed in whole blocks of this size.
pub const BLOCK_SIZE: usize = 512;

/// Partition alignment granularity in bytes (1 MiB)
pub const PARTITION_ALIGNMENT: u64 = 1024 * 1024;

/// Partition alignment granularity in blocks
pub const ALIGNMENT_LBA: u64 = PARTITION_ALIGNMENT / BLOCK_SIZE as u64;
