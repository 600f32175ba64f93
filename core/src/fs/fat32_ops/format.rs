// FAT32 metadata formatter

use core::fmt::Display;

use gpt_disk_io::BlockIo;
use gpt_disk_types::{BlockSize, Lba};

use super::super::{Fat32Error, FatWidth, FormatStage};
use super::context::Fat32Context;
use super::directory;
use super::types::{
    media_eoc, FatTimestamp, FsInfo, VolumeBootRecord, FAT_EOC, MEDIA_DESCRIPTOR, ROOT_CLUSTER,
};
use crate::disk::BLOCK_SIZE;

/// Cluster of the bootstrap subdirectory, right after the root
pub const BOOTSTRAP_CLUSTER: u32 = ROOT_CLUSTER + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOptions {
    /// Write the "EFI" entry into the root directory and "."/".." into it
    pub bootstrap_dirs: bool,
    /// Creation/modification time for bootstrap directory entries
    pub timestamp: FatTimestamp,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            bootstrap_dirs: cfg!(feature = "bootstrap-dirs"),
            timestamp: FatTimestamp::EPOCH,
        }
    }
}

pub(super) fn io_error<E: Display>(stage: FormatStage) -> impl FnOnce(E) -> Fat32Error {
    move |err| {
        tracing::error!(%err, %stage, "FAT32 block I/O failed");
        Fat32Error::Io(stage)
    }
}

pub(super) fn write_block<B: BlockIo>(
    block_io: &mut B,
    lba: u64,
    data: &[u8; BLOCK_SIZE],
    stage: FormatStage,
) -> Result<(), Fat32Error> {
    block_io
        .write_blocks(Lba(lba), data)
        .map_err(io_error(stage))
}

/// Read block `lba`, let `edit` change part of it, write it back.
pub(super) fn update_block<B, F>(
    block_io: &mut B,
    lba: u64,
    stage: FormatStage,
    edit: F,
) -> Result<(), Fat32Error>
where
    B: BlockIo,
    F: FnOnce(&mut [u8; BLOCK_SIZE]),
{
    let mut sector = [0u8; BLOCK_SIZE];
    block_io
        .read_blocks(Lba(lba), &mut sector)
        .map_err(io_error(stage))?;
    edit(&mut sector);
    write_block(block_io, lba, &sector, stage)
}

/// Reserved region, both FATs, and the root and bootstrap clusters. A
/// partition must hold at least this many sectors.
pub fn min_sectors() -> u64 {
    let vbr = VolumeBootRecord::new(FatWidth::Fat32, 0);
    let ctx = Fat32Context::from_vbr(0, &vbr);
    ctx.cluster_to_lba(BOOTSTRAP_CLUSTER + 1)
}

/// Reserved FAT entries: media marker, EOC, then root and bootstrap chains.
fn initial_fat_entries(media: u8) -> [u32; 4] {
    let tagged = media_eoc(media);
    [tagged, FAT_EOC, tagged, tagged]
}

/// Write FAT32 metadata into `sectors` blocks starting at `start_lba`.
///
/// Writes the boot sector and FSInfo, their backups, and the first four
/// entries of each FAT copy. Nothing else in the partition is touched unless
/// `options.bootstrap_dirs` is set. Stops at the first failed write.
pub fn format_fat32<B: BlockIo>(
    block_io: &mut B,
    start_lba: u64,
    sectors: u64,
    options: &FormatOptions,
) -> Result<Fat32Context, Fat32Error> {
    if block_io.block_size() != BlockSize::BS_512 {
        return Err(Fat32Error::UnsupportedBlockSize);
    }
    let total_sectors =
        u32::try_from(sectors).map_err(|_| Fat32Error::PartitionTooLarge(sectors))?;
    let min = min_sectors();
    if sectors < min {
        return Err(Fat32Error::PartitionTooSmall { sectors, min });
    }

    let vbr = VolumeBootRecord::new(FatWidth::Fat32, total_sectors);
    let ctx = Fat32Context::from_vbr(start_lba, &vbr);
    let boot_sector = vbr.to_bytes();
    let fs_info = FsInfo::unknown().to_bytes();

    tracing::debug!(
        start_lba,
        total_sectors,
        fat_lba = ctx.fat_lba(0),
        data_lba = ctx.data_lba(),
        "formatting FAT32"
    );

    write_block(block_io, start_lba, &boot_sector, FormatStage::BootSector)?;
    write_block(block_io, ctx.fs_info_lba(), &fs_info, FormatStage::FsInfo)?;
    write_block(
        block_io,
        ctx.backup_boot_lba(),
        &boot_sector,
        FormatStage::BackupBootSector,
    )?;
    write_block(
        block_io,
        ctx.backup_fs_info_lba(),
        &fs_info,
        FormatStage::BackupFsInfo,
    )?;
    tracing::info!(start_lba, "wrote boot sectors");

    let entries = initial_fat_entries(MEDIA_DESCRIPTOR);
    for copy in 0..ctx.num_fats {
        let (lba, offset) = ctx.fat_entry_location(copy, 0);
        update_block(block_io, lba, FormatStage::Fat(copy), |sector| {
            for (i, entry) in entries.iter().enumerate() {
                let at = offset + i * 4;
                sector[at..at + 4].copy_from_slice(&entry.to_le_bytes());
            }
        })?;
    }
    tracing::info!(copies = ctx.num_fats, "wrote FAT headers");

    if options.bootstrap_dirs {
        directory::write_bootstrap_dirs(block_io, &ctx, BOOTSTRAP_CLUSTER, options.timestamp)?;
    }

    block_io.flush().map_err(io_error(FormatStage::Flush))?;
    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::fat32_ops::types::le_u32_at;
    use alloc::vec;
    use alloc::vec::Vec;
    use gpt_disk_io::BlockIoAdapter;

    const START: u64 = 2048;

    fn device(blocks: usize) -> Vec<u8> {
        vec![0u8; blocks * 512]
    }

    fn format(
        buf: &mut [u8],
        sectors: u64,
        options: &FormatOptions,
    ) -> Result<Fat32Context, Fat32Error> {
        format_fat32(
            &mut BlockIoAdapter::new(buf, BlockSize::BS_512),
            START,
            sectors,
            options,
        )
    }

    fn block(buf: &[u8], lba: u64) -> &[u8] {
        &buf[lba as usize * 512..(lba as usize + 1) * 512]
    }

    #[test]
    fn test_ten_thousand_sectors() {
        let mut buf = device(12_100);
        let ctx = format(&mut buf, 10_000, &FormatOptions::default()).unwrap();
        assert_eq!(ctx.total_sectors, 10_000);

        let vbr = block(&buf, START);
        assert_eq!(le_u32_at(vbr, 32), 10_000);
        assert_eq!(&vbr[82..90], b"FAT32   ");
    }

    #[test]
    fn test_backups_identical() {
        let mut buf = device(12_100);
        format(&mut buf, 10_000, &FormatOptions::default()).unwrap();
        assert_eq!(block(&buf, START), block(&buf, START + 6));
        assert_eq!(block(&buf, START + 1), block(&buf, START + 7));
        assert_eq!(&block(&buf, START + 1)[0..4], b"RRaA");
    }

    #[test]
    fn test_fat_entries_in_both_copies() {
        let mut buf = device(12_100);
        let ctx = format(&mut buf, 10_000, &FormatOptions::default()).unwrap();
        for copy in 0..2 {
            let fat = block(&buf, ctx.fat_lba(copy));
            assert_eq!(le_u32_at(fat, 0), 0x0FFF_FFF8);
            assert_eq!(le_u32_at(fat, 4), 0x0FFF_FFFF);
            assert_eq!(le_u32_at(fat, 8), 0x0FFF_FFF8);
            assert_eq!(le_u32_at(fat, 12), 0x0FFF_FFF8);
            assert!(fat[16..].iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn test_fat_write_preserves_rest_of_block() {
        let mut buf = device(12_100);
        let fat_byte = (START + 32) as usize * 512 + 100;
        buf[fat_byte] = 0x5A;
        format(&mut buf, 10_000, &FormatOptions::default()).unwrap();
        assert_eq!(buf[fat_byte], 0x5A);
    }

    #[test]
    fn test_only_metadata_written() {
        let mut buf = device(12_100);
        let options = FormatOptions {
            bootstrap_dirs: false,
            timestamp: FatTimestamp::EPOCH,
        };
        let ctx = format(&mut buf, 10_000, &options).unwrap();
        // sectors 2..6 of the reserved region and the data region stay blank
        let data = ctx.data_lba();
        for lba in [START + 2, START + 5, START + 8, data, data + 1] {
            assert!(block(&buf, lba).iter().all(|&b| b == 0), "lba {}", lba);
        }
        assert!(buf[..START as usize * 512].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_size_limits() {
        let mut buf = device(4_200);
        assert_eq!(min_sectors(), 2050);
        assert_eq!(
            format(&mut buf, 2049, &FormatOptions::default()),
            Err(Fat32Error::PartitionTooSmall {
                sectors: 2049,
                min: 2050
            })
        );
        assert_eq!(
            format(&mut buf, 1 << 32, &FormatOptions::default()),
            Err(Fat32Error::PartitionTooLarge(1 << 32))
        );
        assert!(format(&mut buf, 2051, &FormatOptions::default()).is_ok());
    }

    #[test]
    fn test_smallest_partition_holds_bootstrap_dirs() {
        let mut buf = device(START as usize + 2050);
        let options = FormatOptions {
            bootstrap_dirs: true,
            timestamp: FatTimestamp::EPOCH,
        };
        let ctx = format(&mut buf, 2050, &options).unwrap();

        // cluster 3 is the partition's last sector
        let last = ctx.cluster_to_lba(BOOTSTRAP_CLUSTER);
        assert_eq!(last, START + 2049);
        let dot = &buf[last as usize * 512..][..11];
        assert_eq!(dot, b".          ");
    }

    #[test]
    fn test_write_past_device_reports_stage() {
        // device ends inside the reserved region
        let mut buf = device(START as usize + 4);
        assert_eq!(
            format(&mut buf, 10_000, &FormatOptions::default()),
            Err(Fat32Error::Io(FormatStage::BackupBootSector))
        );
    }
}
