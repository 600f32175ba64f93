//! diskforge core
//!
//! Builds and checks the on-disk layout of a partitioned image: a protective
//! MBR, primary and secondary GPT copies, and the fixed metadata of a FAT32
//! volume inside one of the partitions.
//!
//! Everything here talks to storage through [`gpt_disk_io::BlockIo`], so the
//! same code runs against a host file, a raw block device, or a buffer in
//! memory.
//!
//! ```text
//!  mkdi ──► disk::gpt_ops::create ──► LBA 0 (PMBR), LBA 1..33 (primary GPT)
//!                                     LBA N-33..N-1 (secondary GPT)
//!
//!  mkfs ──► disk::gpt_ops::scan  ──► (start, len) of partition N
//!       ──► fs::fat32_ops::format ──► VBR, FSInfo, backups, FATs
//! ```

#![no_std]

extern crate alloc;

pub mod checksum;
pub mod disk;
pub mod fs;
pub mod guid;

pub use checksum::crc32;
pub use disk::geometry::{bytes_to_lba, checked_next_aligned_lba, lba_to_chs, next_aligned_lba};
pub use disk::gpt_ops::{
    create_image, layout_image, locate_partition, verify_gpt, write_gpt, write_protective_mbr,
    GptError, GptSummary, ImagePlan, LocateError, LocatedPartition,
};
pub use fs::fat32_ops::FatTimestamp;
pub use fs::{
    ensure_supported, format_fat32, make_filesystem, verify_fat32, Fat32Context, Fat32Error,
    FatWidth, FormatOptions, FsKind,
};
pub use guid::new_guid;
