// Bootstrap directory entries: "EFI" in the root, "." and ".." inside it

use gpt_disk_io::BlockIo;

use super::super::{Fat32Error, FormatStage};
use super::context::Fat32Context;
use super::format::update_block;
use super::types::{DirEntry, FatTimestamp, DIR_ENTRY_SIZE};

pub const BOOTSTRAP_DIR_NAME: [u8; 11] = *b"EFI        ";
pub const DOT_NAME: [u8; 11] = *b".          ";
pub const DOTDOT_NAME: [u8; 11] = *b"..         ";

fn put_entry(sector: &mut [u8], slot: usize, entry: &DirEntry) {
    let offset = slot * DIR_ENTRY_SIZE;
    sector[offset..offset + DIR_ENTRY_SIZE].copy_from_slice(&entry.to_bytes());
}

/// Link a single-cluster subdirectory at `cluster` into the root.
///
/// The FAT already marks `cluster` as a one-cluster chain. ".." stores
/// cluster 0, which is how FAT32 refers to the root from a first-level
/// directory.
pub fn write_bootstrap_dirs<B: BlockIo>(
    block_io: &mut B,
    ctx: &Fat32Context,
    cluster: u32,
    stamp: FatTimestamp,
) -> Result<(), Fat32Error> {
    let efi = DirEntry::directory(BOOTSTRAP_DIR_NAME, cluster, stamp);
    update_block(
        block_io,
        ctx.cluster_to_lba(ctx.root_cluster),
        FormatStage::RootDirectory,
        |sector| put_entry(sector, 0, &efi),
    )?;

    let dot = DirEntry::directory(DOT_NAME, cluster, stamp);
    let dotdot = DirEntry::directory(DOTDOT_NAME, 0, stamp);
    update_block(
        block_io,
        ctx.cluster_to_lba(cluster),
        FormatStage::BootstrapDirectory,
        |sector| {
            put_entry(sector, 0, &dot);
            put_entry(sector, 1, &dotdot);
        },
    )?;

    tracing::info!(cluster, "wrote bootstrap directory");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::fat32_ops::format::{format_fat32, FormatOptions};
    use crate::fs::fat32_ops::types::ATTR_DIRECTORY;
    use alloc::vec;
    use gpt_disk_io::BlockIoAdapter;
    use gpt_disk_types::BlockSize;

    fn entry_at(buf: &[u8], lba: u64, slot: usize) -> DirEntry {
        let offset = lba as usize * 512 + slot * DIR_ENTRY_SIZE;
        let mut raw = [0u8; DIR_ENTRY_SIZE];
        raw.copy_from_slice(&buf[offset..offset + DIR_ENTRY_SIZE]);
        DirEntry::from_bytes(&raw)
    }

    #[test]
    fn test_bootstrap_entries() {
        let mut buf = vec![0u8; 6000 * 512];
        let stamp = FatTimestamp::new(2024, 3, 15, 13, 45, 30);
        let options = FormatOptions {
            bootstrap_dirs: true,
            timestamp: stamp,
        };
        let ctx = format_fat32(
            &mut BlockIoAdapter::new(buf.as_mut_slice(), BlockSize::BS_512),
            2048,
            3000,
            &options,
        )
        .unwrap();

        let root = ctx.cluster_to_lba(2);
        let efi = entry_at(&buf, root, 0);
        assert_eq!(efi.name, BOOTSTRAP_DIR_NAME);
        assert_eq!(efi.attr, ATTR_DIRECTORY);
        assert_eq!(efi.first_cluster(), 3);
        assert_eq!(efi.write_time, stamp.fat_time());
        assert_eq!(efi.create_date, stamp.fat_date());
        assert!(entry_at(&buf, root, 1).is_free());

        let sub = ctx.cluster_to_lba(3);
        let dot = entry_at(&buf, sub, 0);
        let dotdot = entry_at(&buf, sub, 1);
        assert_eq!(dot.name, DOT_NAME);
        assert_eq!(dot.first_cluster(), 3);
        assert_eq!(dotdot.name, DOTDOT_NAME);
        assert_eq!(dotdot.first_cluster(), 0);
        assert_eq!(dotdot.attr, ATTR_DIRECTORY);
    }

    #[test]
    fn test_disabled_by_option() {
        let mut buf = vec![0u8; 6000 * 512];
        let options = FormatOptions {
            bootstrap_dirs: false,
            timestamp: FatTimestamp::EPOCH,
        };
        let ctx = format_fat32(
            &mut BlockIoAdapter::new(buf.as_mut_slice(), BlockSize::BS_512),
            2048,
            3000,
            &options,
        )
        .unwrap();
        assert!(entry_at(&buf, ctx.cluster_to_lba(2), 0).is_free());
        assert!(entry_at(&buf, ctx.cluster_to_lba(3), 0).is_free());
    }
}
