// Filesystem selection and FAT32 formatting entry point

pub mod fat32_ops;

use core::fmt;

use gpt_disk_io::BlockIo;

pub use fat32_ops::{format_fat32, verify_fat32, Fat32Context, FormatOptions};

/// Filesystem requested for a partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsKind {
    Vfat,
    Ext4,
    G2fs,
}

impl FsKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Vfat => "vfat",
            Self::Ext4 => "ext4",
            Self::G2fs => "g2fs",
        }
    }
}

impl fmt::Display for FsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// FAT entry width in bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatWidth {
    Fat12,
    Fat16,
    Fat32,
}

impl FatWidth {
    pub const fn bits(self) -> u8 {
        match self {
            Self::Fat12 => 12,
            Self::Fat16 => 16,
            Self::Fat32 => 32,
        }
    }

    /// BS_FilSysType value, e.g. `"FAT32   "`
    pub const fn label(self) -> [u8; 8] {
        match self {
            Self::Fat12 => *b"FAT12   ",
            Self::Fat16 => *b"FAT16   ",
            Self::Fat32 => *b"FAT32   ",
        }
    }
}

impl TryFrom<u8> for FatWidth {
    type Error = Fat32Error;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            12 => Ok(Self::Fat12),
            16 => Ok(Self::Fat16),
            32 => Ok(Self::Fat32),
            other => Err(Fat32Error::InvalidFatWidth(other)),
        }
    }
}

impl fmt::Display for FatWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FAT{}", self.bits())
    }
}

/// Formatting step, reported with I/O failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatStage {
    BootSector,
    FsInfo,
    BackupBootSector,
    BackupFsInfo,
    /// FAT copy index
    Fat(u8),
    RootDirectory,
    BootstrapDirectory,
    Flush,
    ReadBack,
}

impl fmt::Display for FormatStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BootSector => write!(f, "boot sector"),
            Self::FsInfo => write!(f, "FSInfo sector"),
            Self::BackupBootSector => write!(f, "backup boot sector"),
            Self::BackupFsInfo => write!(f, "backup FSInfo sector"),
            Self::Fat(copy) => write!(f, "FAT copy {}", copy),
            Self::RootDirectory => write!(f, "root directory"),
            Self::BootstrapDirectory => write!(f, "bootstrap directory"),
            Self::Flush => write!(f, "flush"),
            Self::ReadBack => write!(f, "read back"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fat32Error {
    Io(FormatStage),
    UnsupportedBlockSize,
    /// Accepted option with no implementation behind it
    Unimplemented(&'static str),
    InvalidFatWidth(u8),
    PartitionTooSmall { sectors: u64, min: u64 },
    PartitionTooLarge(u64),
    InvalidBootSignature,
    InvalidFsInfo,
    /// Primary and backup copy at `FormatStage` differ
    BackupMismatch(FormatStage),
    InvalidFatHeader,
    FatCopiesDiffer,
}

impl fmt::Display for Fat32Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(stage) => write!(f, "I/O error at {}", stage),
            Self::UnsupportedBlockSize => write!(f, "unsupported block size (need 512)"),
            Self::Unimplemented(what) => write!(f, "{} is not implemented", what),
            Self::InvalidFatWidth(bits) => write!(f, "invalid FAT width {}", bits),
            Self::PartitionTooSmall { sectors, min } => write!(
                f,
                "partition of {} sectors too small, need at least {}",
                sectors, min
            ),
            Self::PartitionTooLarge(sectors) => write!(
                f,
                "partition of {} sectors does not fit a 32-bit sector count",
                sectors
            ),
            Self::InvalidBootSignature => write!(f, "boot sector signature is not 0xaa55"),
            Self::InvalidFsInfo => write!(f, "FSInfo signatures invalid"),
            Self::BackupMismatch(stage) => write!(f, "{} differs from primary", stage),
            Self::InvalidFatHeader => write!(f, "reserved FAT entries invalid"),
            Self::FatCopiesDiffer => write!(f, "FAT copies differ"),
        }
    }
}

/// Fail with [`Fat32Error::Unimplemented`] unless `kind`/`width` can be formatted.
///
/// Cheap enough to call before opening the device.
pub fn ensure_supported(kind: FsKind, width: FatWidth) -> Result<(), Fat32Error> {
    match (kind, width) {
        (FsKind::Vfat, FatWidth::Fat32) => Ok(()),
        (FsKind::Vfat, FatWidth::Fat12) => Err(Fat32Error::Unimplemented("FAT12 formatting")),
        (FsKind::Vfat, FatWidth::Fat16) => Err(Fat32Error::Unimplemented("FAT16 formatting")),
        (FsKind::Ext4, _) => Err(Fat32Error::Unimplemented("ext4 formatting")),
        (FsKind::G2fs, _) => Err(Fat32Error::Unimplemented("g2fs formatting")),
    }
}

/// Write filesystem metadata of `kind` into the partition at `start_lba`.
///
/// Only FAT32 is implemented; anything else fails before the device is
/// touched.
pub fn make_filesystem<B: BlockIo>(
    block_io: &mut B,
    kind: FsKind,
    width: FatWidth,
    start_lba: u64,
    sectors: u64,
    options: &FormatOptions,
) -> Result<Fat32Context, Fat32Error> {
    ensure_supported(kind, width)?;
    tracing::debug!(%kind, %width, start_lba, sectors, "make filesystem");
    format_fat32(block_io, start_lba, sectors, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use gpt_disk_io::BlockIoAdapter;
    use gpt_disk_types::BlockSize;

    #[test]
    fn test_width_from_bits() {
        assert_eq!(FatWidth::try_from(12), Ok(FatWidth::Fat12));
        assert_eq!(FatWidth::try_from(16), Ok(FatWidth::Fat16));
        assert_eq!(FatWidth::try_from(32), Ok(FatWidth::Fat32));
        assert_eq!(FatWidth::try_from(24), Err(Fat32Error::InvalidFatWidth(24)));
    }

    #[test]
    fn test_width_label() {
        assert_eq!(&FatWidth::Fat32.label(), b"FAT32   ");
        assert_eq!(&FatWidth::Fat12.label(), b"FAT12   ");
    }

    #[test]
    fn test_unimplemented_paths_leave_device_untouched() {
        let mut buf = vec![0u8; 8192 * 512];
        let options = FormatOptions::default();
        let cases = [
            (FsKind::Ext4, FatWidth::Fat32, "ext4 formatting"),
            (FsKind::G2fs, FatWidth::Fat32, "g2fs formatting"),
            (FsKind::Vfat, FatWidth::Fat12, "FAT12 formatting"),
            (FsKind::Vfat, FatWidth::Fat16, "FAT16 formatting"),
        ];
        for (kind, width, what) in cases {
            let mut dev = BlockIoAdapter::new(buf.as_mut_slice(), BlockSize::BS_512);
            assert_eq!(
                make_filesystem(&mut dev, kind, width, 2048, 6000, &options),
                Err(Fat32Error::Unimplemented(what))
            );
        }
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_vfat_32_formats() {
        let mut buf = vec![0u8; 8192 * 512];
        let mut dev = BlockIoAdapter::new(buf.as_mut_slice(), BlockSize::BS_512);
        let ctx = make_filesystem(
            &mut dev,
            FsKind::Vfat,
            FatWidth::Fat32,
            2048,
            6000,
            &FormatOptions::default(),
        )
        .unwrap();
        assert_eq!(ctx.total_sectors, 6000);
        assert_eq!(&buf[2048 * 512 + 510..2048 * 512 + 512], &[0x55, 0xAA]);
    }
}
