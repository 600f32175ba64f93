use std::fs::OpenOptions;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use diskforge_core::{
    ensure_supported, locate_partition, make_filesystem, verify_fat32, Fat32Context, FatTimestamp,
    FatWidth, FormatOptions, FsKind,
};
use gpt_disk_io::BlockIoAdapter;
use gpt_disk_types::BlockSize;

use crate::unix_now;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FsType {
    Vfat,
    Ext4,
    G2fs,
}

impl From<FsType> for FsKind {
    fn from(value: FsType) -> Self {
        match value {
            FsType::Vfat => FsKind::Vfat,
            FsType::Ext4 => FsKind::Ext4,
            FsType::G2fs => FsKind::G2fs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FatBits {
    #[value(name = "12")]
    Fat12,
    #[value(name = "16")]
    Fat16,
    #[value(name = "32")]
    Fat32,
}

impl From<FatBits> for FatWidth {
    fn from(value: FatBits) -> Self {
        match value {
            FatBits::Fat12 => FatWidth::Fat12,
            FatBits::Fat16 => FatWidth::Fat16,
            FatBits::Fat32 => FatWidth::Fat32,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "mkfs",
    version,
    about = "Write filesystem metadata into a partition of a GPT disk image"
)]
pub struct MkfsArgs {
    /// Disk image or block device holding the partition
    pub target: PathBuf,

    /// 1-based partition number
    #[arg(short, long, default_value_t = 1)]
    pub partition: u32,

    /// Filesystem to create
    #[arg(short = 't', long = "type", value_enum, default_value_t = FsType::Vfat)]
    pub fs_type: FsType,

    /// FAT entry width for vfat
    #[arg(short = 'F', long = "fat-size", value_enum, default_value_t = FatBits::Fat32)]
    pub fat_size: FatBits,

    /// Also create the EFI directory in the root
    #[arg(long)]
    pub bootstrap_dirs: bool,
}

/// Locate the partition, format it, and check the result.
pub fn run(args: &MkfsArgs) -> Result<Fat32Context> {
    let kind = FsKind::from(args.fs_type);
    let width = FatWidth::from(args.fat_size);
    ensure_supported(kind, width).map_err(|err| anyhow!("{}", err))?;

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&args.target)
        .with_context(|| format!("failed to open {}", args.target.display()))?;
    let mut block_io = BlockIoAdapter::new(&mut file, BlockSize::BS_512);

    let partition = locate_partition(&mut block_io, args.partition)
        .map_err(|err| anyhow!("partition {}: {}", args.partition, err))?;

    let defaults = FormatOptions::default();
    let options = FormatOptions {
        bootstrap_dirs: defaults.bootstrap_dirs || args.bootstrap_dirs,
        timestamp: FatTimestamp::from_unix_seconds(unix_now()),
    };

    tracing::info!(
        partition = args.partition,
        name = %partition.entry.name(),
        start_lba = partition.start_lba,
        sectors = partition.sector_count(),
        "formatting {}",
        width
    );

    make_filesystem(
        &mut block_io,
        kind,
        width,
        partition.start_lba,
        partition.sector_count(),
        &options,
    )
    .map_err(|err| anyhow!("formatting partition {}: {}", args.partition, err))?;

    let ctx = verify_fat32(&mut block_io, partition.start_lba)
        .map_err(|err| anyhow!("filesystem check: {}", err))?;
    tracing::info!(clusters = ctx.cluster_count(), "filesystem ready");
    Ok(ctx)
}
