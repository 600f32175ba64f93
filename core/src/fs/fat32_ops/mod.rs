// FAT32 fixed-metadata formatting: boot sectors, FSInfo, FAT headers

mod context;
mod directory;
mod format;
mod types;
mod verify;

pub use context::Fat32Context;
pub use directory::{write_bootstrap_dirs, BOOTSTRAP_DIR_NAME};
pub use format::{format_fat32, min_sectors, FormatOptions, BOOTSTRAP_CLUSTER};
pub use types::{
    media_eoc, DirEntry, FatTimestamp, FsInfo, VolumeBootRecord, ATTR_ARCHIVE, ATTR_DIRECTORY,
    ATTR_HIDDEN, ATTR_READ_ONLY, ATTR_SYSTEM, ATTR_VOLUME_ID, FAT_EOC, FAT_EOC_MIN,
    FAT_SIZE_SECTORS, MEDIA_DESCRIPTOR, RESERVED_SECTORS,
};
pub use verify::verify_fat32;
