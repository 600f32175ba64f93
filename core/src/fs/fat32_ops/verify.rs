// Read-back check of a formatted volume

use gpt_disk_io::BlockIo;
use gpt_disk_types::Lba;

use super::super::{Fat32Error, FormatStage};
use super::context::Fat32Context;
use super::format::io_error;
use super::types::{le_u32_at, media_eoc, FsInfo, FAT_EOC_MIN, FAT_ENTRY_MASK};
use crate::disk::BLOCK_SIZE;

/// Reserved entries compared between FAT copies
const CHECKED_FAT_ENTRIES: usize = 4;

fn read_block<B: BlockIo>(
    block_io: &mut B,
    lba: u64,
    stage: FormatStage,
) -> Result<[u8; BLOCK_SIZE], Fat32Error> {
    let mut buf = [0u8; BLOCK_SIZE];
    block_io
        .read_blocks(Lba(lba), &mut buf)
        .map_err(io_error(stage))?;
    Ok(buf)
}

/// Check the boot sectors, FSInfo copies and FAT headers at `start_lba`.
pub fn verify_fat32<B: BlockIo>(
    block_io: &mut B,
    start_lba: u64,
) -> Result<Fat32Context, Fat32Error> {
    let ctx = Fat32Context::from_boot_sector(block_io, start_lba)?;
    let boot = read_block(block_io, start_lba, FormatStage::BootSector)?;

    let backup = read_block(block_io, ctx.backup_boot_lba(), FormatStage::BackupBootSector)?;
    if backup != boot {
        return Err(Fat32Error::BackupMismatch(FormatStage::BackupBootSector));
    }

    let fs_info = read_block(block_io, ctx.fs_info_lba(), FormatStage::FsInfo)?;
    if !FsInfo::from_bytes(&fs_info).has_valid_signatures() {
        return Err(Fat32Error::InvalidFsInfo);
    }
    let backup_fs_info = read_block(block_io, ctx.backup_fs_info_lba(), FormatStage::BackupFsInfo)?;
    if backup_fs_info != fs_info {
        return Err(Fat32Error::BackupMismatch(FormatStage::BackupFsInfo));
    }

    let media = boot[21];
    let first = read_block(block_io, ctx.fat_lba(0), FormatStage::Fat(0))?;
    let entry = |i: usize| le_u32_at(&first, i * 4) & FAT_ENTRY_MASK;
    if entry(0) != media_eoc(media) & FAT_ENTRY_MASK {
        return Err(Fat32Error::InvalidFatHeader);
    }
    if (1..CHECKED_FAT_ENTRIES).any(|i| entry(i) < FAT_EOC_MIN) {
        return Err(Fat32Error::InvalidFatHeader);
    }

    for copy in 1..ctx.num_fats {
        let other = read_block(block_io, ctx.fat_lba(copy), FormatStage::Fat(copy))?;
        if other[..CHECKED_FAT_ENTRIES * 4] != first[..CHECKED_FAT_ENTRIES * 4] {
            return Err(Fat32Error::FatCopiesDiffer);
        }
    }

    tracing::info!(
        start_lba,
        total_sectors = ctx.total_sectors,
        clusters = ctx.cluster_count(),
        "FAT32 verified"
    );
    Ok(ctx)
}
