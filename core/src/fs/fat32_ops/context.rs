// Derived FAT32 geometry for one volume

use gpt_disk_io::BlockIo;
use gpt_disk_types::Lba;

use super::super::{Fat32Error, FormatStage};
use super::types::{VolumeBootRecord, BOOT_SIGNATURE, FSINFO_SECTOR};
use crate::disk::BLOCK_SIZE;

/// Absolute block addresses of a FAT32 volume's regions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fat32Context {
    pub partition_start: u64,
    pub total_sectors: u32,
    pub reserved_sectors: u16,
    pub num_fats: u8,
    pub fat_size: u32,
    pub sectors_per_cluster: u8,
    pub root_cluster: u32,
    pub fs_info_sector: u16,
    pub backup_boot_sector: u16,
}

impl Fat32Context {
    pub fn from_vbr(partition_start: u64, vbr: &VolumeBootRecord) -> Self {
        Self {
            partition_start,
            total_sectors: vbr.total_sectors_32,
            reserved_sectors: vbr.reserved_sectors,
            num_fats: vbr.num_fats,
            fat_size: vbr.fat_size_32,
            sectors_per_cluster: vbr.sectors_per_cluster,
            root_cluster: vbr.root_cluster,
            fs_info_sector: vbr.fs_info_sector,
            backup_boot_sector: vbr.backup_boot_sector,
        }
    }

    /// Read the boot sector at `partition_start` and derive the layout.
    pub fn from_boot_sector<B: BlockIo>(
        block_io: &mut B,
        partition_start: u64,
    ) -> Result<Self, Fat32Error> {
        let mut sector = [0u8; BLOCK_SIZE];
        block_io
            .read_blocks(Lba(partition_start), &mut sector)
            .map_err(|_| Fat32Error::Io(FormatStage::ReadBack))?;

        let vbr = VolumeBootRecord::from_bytes(&sector);
        if vbr.signature != BOOT_SIGNATURE {
            return Err(Fat32Error::InvalidBootSignature);
        }
        Ok(Self::from_vbr(partition_start, &vbr))
    }

    pub fn fs_info_lba(&self) -> u64 {
        self.partition_start + self.fs_info_sector as u64
    }

    pub fn backup_boot_lba(&self) -> u64 {
        self.partition_start + self.backup_boot_sector as u64
    }

    /// Backup FSInfo follows the backup boot sector at the same distance
    pub fn backup_fs_info_lba(&self) -> u64 {
        self.backup_boot_lba() + FSINFO_SECTOR as u64
    }

    /// First sector of FAT copy `copy`
    pub fn fat_lba(&self, copy: u8) -> u64 {
        self.partition_start + self.reserved_sectors as u64 + copy as u64 * self.fat_size as u64
    }

    pub fn data_lba(&self) -> u64 {
        self.fat_lba(self.num_fats)
    }

    /// First sector of data cluster `cluster` (clusters start at 2)
    pub fn cluster_to_lba(&self, cluster: u32) -> u64 {
        self.data_lba() + (cluster as u64 - 2) * self.sectors_per_cluster as u64
    }

    /// Block holding FAT entry `cluster` of copy `copy`, and the byte offset within it
    pub fn fat_entry_location(&self, copy: u8, cluster: u32) -> (u64, usize) {
        let byte = cluster as u64 * 4;
        (
            self.fat_lba(copy) + byte / BLOCK_SIZE as u64,
            (byte % BLOCK_SIZE as u64) as usize,
        )
    }

    /// Data clusters available after the metadata regions
    pub fn cluster_count(&self) -> u32 {
        let metadata = self.data_lba() - self.partition_start;
        (self.total_sectors as u64).saturating_sub(metadata) as u32
            / self.sectors_per_cluster.max(1) as u32
    }
}
