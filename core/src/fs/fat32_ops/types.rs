// FAT32 on-disk structures

use crate::disk::{ALIGNMENT_LBA, BLOCK_SIZE};
use crate::fs::FatWidth;

pub const BYTES_PER_SECTOR: u16 = BLOCK_SIZE as u16;
pub const SECTORS_PER_CLUSTER: u8 = 1;
pub const RESERVED_SECTORS: u16 = 32;
pub const NUM_FATS: u8 = 2;
pub const MEDIA_DESCRIPTOR: u8 = 0xF8;
/// Reserved sectors and both FATs fill exactly one alignment unit
pub const FAT_SIZE_SECTORS: u32 =
    (ALIGNMENT_LBA as u32 - RESERVED_SECTORS as u32) / NUM_FATS as u32;
pub const ROOT_CLUSTER: u32 = 2;
pub const FSINFO_SECTOR: u16 = 1;
pub const BACKUP_BOOT_SECTOR: u16 = 6;
pub const HIDDEN_SECTORS: u32 = ALIGNMENT_LBA as u32;
pub const DRIVE_NUMBER: u8 = 0x80;
pub const EXTENDED_BOOT_SIGNATURE: u8 = 0x29;
pub const JUMP_BOOT: [u8; 3] = [0xEB, 0x58, 0x90];
pub const OEM_NAME: [u8; 8] = *b"DSKFORGE";
pub const VOLUME_LABEL: [u8; 11] = *b"NO NAME    ";
pub const BOOT_SIGNATURE: u16 = 0xAA55;

pub const FSINFO_LEAD_SIGNATURE: u32 = 0x4161_5252;
pub const FSINFO_STRUCT_SIGNATURE: u32 = 0x6141_7272;
pub const FSINFO_TRAIL_SIGNATURE: u32 = 0xAA55_0000;
/// Free count / next free value meaning "not known"
pub const FSINFO_UNKNOWN: u32 = 0xFFFF_FFFF;

/// Smallest value that ends a cluster chain
pub const FAT_EOC_MIN: u32 = 0x0FFF_FFF8;
pub const FAT_EOC: u32 = 0x0FFF_FFFF;
pub const FAT_ENTRY_MASK: u32 = 0x0FFF_FFFF;

/// End-of-chain value carrying the media descriptor in its low byte
pub const fn media_eoc(media: u8) -> u32 {
    0x0FFF_FF00 | media as u32
}

pub const ATTR_READ_ONLY: u8 = 0x01;
pub const ATTR_HIDDEN: u8 = 0x02;
pub const ATTR_SYSTEM: u8 = 0x04;
pub const ATTR_VOLUME_ID: u8 = 0x08;
pub const ATTR_DIRECTORY: u8 = 0x10;
pub const ATTR_ARCHIVE: u8 = 0x20;

pub const DIR_ENTRY_SIZE: usize = 32;

pub(crate) fn le_u16_at(b: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([b[offset], b[offset + 1]])
}

pub(crate) fn le_u32_at(b: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([b[offset], b[offset + 1], b[offset + 2], b[offset + 3]])
}

/// FAT32 boot sector (BPB + extended BPB)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeBootRecord {
    pub jump_boot: [u8; 3],
    pub oem_name: [u8; 8],
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub num_fats: u8,
    pub root_entry_count: u16,
    pub total_sectors_16: u16,
    pub media: u8,
    pub fat_size_16: u16,
    pub sectors_per_track: u16,
    pub num_heads: u16,
    pub hidden_sectors: u32,
    pub total_sectors_32: u32,
    pub fat_size_32: u32,
    pub ext_flags: u16,
    pub fs_version: u16,
    pub root_cluster: u32,
    pub fs_info_sector: u16,
    pub backup_boot_sector: u16,
    pub drive_number: u8,
    pub boot_signature: u8,
    pub volume_id: u32,
    pub volume_label: [u8; 11],
    pub fs_type: [u8; 8],
    pub signature: u16,
}

impl VolumeBootRecord {
    /// Boot sector for a volume of `total_sectors` with the fixed geometry above.
    pub fn new(width: FatWidth, total_sectors: u32) -> Self {
        Self {
            jump_boot: JUMP_BOOT,
            oem_name: OEM_NAME,
            bytes_per_sector: BYTES_PER_SECTOR,
            sectors_per_cluster: SECTORS_PER_CLUSTER,
            reserved_sectors: RESERVED_SECTORS,
            num_fats: NUM_FATS,
            root_entry_count: 0,
            total_sectors_16: 0,
            media: MEDIA_DESCRIPTOR,
            fat_size_16: 0,
            sectors_per_track: 0,
            num_heads: 0,
            hidden_sectors: HIDDEN_SECTORS,
            total_sectors_32: total_sectors,
            fat_size_32: FAT_SIZE_SECTORS,
            ext_flags: 0,
            fs_version: 0,
            root_cluster: ROOT_CLUSTER,
            fs_info_sector: FSINFO_SECTOR,
            backup_boot_sector: BACKUP_BOOT_SECTOR,
            drive_number: DRIVE_NUMBER,
            boot_signature: EXTENDED_BOOT_SIGNATURE,
            volume_id: 0,
            volume_label: VOLUME_LABEL,
            fs_type: width.label(),
            signature: BOOT_SIGNATURE,
        }
    }

    pub fn to_bytes(&self) -> [u8; BLOCK_SIZE] {
        let mut bs = [0u8; BLOCK_SIZE];
        bs[0..3].copy_from_slice(&self.jump_boot);
        bs[3..11].copy_from_slice(&self.oem_name);
        bs[11..13].copy_from_slice(&self.bytes_per_sector.to_le_bytes());
        bs[13] = self.sectors_per_cluster;
        bs[14..16].copy_from_slice(&self.reserved_sectors.to_le_bytes());
        bs[16] = self.num_fats;
        bs[17..19].copy_from_slice(&self.root_entry_count.to_le_bytes());
        bs[19..21].copy_from_slice(&self.total_sectors_16.to_le_bytes());
        bs[21] = self.media;
        bs[22..24].copy_from_slice(&self.fat_size_16.to_le_bytes());
        bs[24..26].copy_from_slice(&self.sectors_per_track.to_le_bytes());
        bs[26..28].copy_from_slice(&self.num_heads.to_le_bytes());
        bs[28..32].copy_from_slice(&self.hidden_sectors.to_le_bytes());
        bs[32..36].copy_from_slice(&self.total_sectors_32.to_le_bytes());
        bs[36..40].copy_from_slice(&self.fat_size_32.to_le_bytes());
        bs[40..42].copy_from_slice(&self.ext_flags.to_le_bytes());
        bs[42..44].copy_from_slice(&self.fs_version.to_le_bytes());
        bs[44..48].copy_from_slice(&self.root_cluster.to_le_bytes());
        bs[48..50].copy_from_slice(&self.fs_info_sector.to_le_bytes());
        bs[50..52].copy_from_slice(&self.backup_boot_sector.to_le_bytes());
        // 52..64 reserved
        bs[64] = self.drive_number;
        bs[66] = self.boot_signature;
        bs[67..71].copy_from_slice(&self.volume_id.to_le_bytes());
        bs[71..82].copy_from_slice(&self.volume_label);
        bs[82..90].copy_from_slice(&self.fs_type);
        bs[510..512].copy_from_slice(&self.signature.to_le_bytes());
        bs
    }

    pub fn from_bytes(bs: &[u8; BLOCK_SIZE]) -> Self {
        let mut jump_boot = [0u8; 3];
        jump_boot.copy_from_slice(&bs[0..3]);
        let mut oem_name = [0u8; 8];
        oem_name.copy_from_slice(&bs[3..11]);
        let mut volume_label = [0u8; 11];
        volume_label.copy_from_slice(&bs[71..82]);
        let mut fs_type = [0u8; 8];
        fs_type.copy_from_slice(&bs[82..90]);

        Self {
            jump_boot,
            oem_name,
            bytes_per_sector: le_u16_at(bs, 11),
            sectors_per_cluster: bs[13],
            reserved_sectors: le_u16_at(bs, 14),
            num_fats: bs[16],
            root_entry_count: le_u16_at(bs, 17),
            total_sectors_16: le_u16_at(bs, 19),
            media: bs[21],
            fat_size_16: le_u16_at(bs, 22),
            sectors_per_track: le_u16_at(bs, 24),
            num_heads: le_u16_at(bs, 26),
            hidden_sectors: le_u32_at(bs, 28),
            total_sectors_32: le_u32_at(bs, 32),
            fat_size_32: le_u32_at(bs, 36),
            ext_flags: le_u16_at(bs, 40),
            fs_version: le_u16_at(bs, 42),
            root_cluster: le_u32_at(bs, 44),
            fs_info_sector: le_u16_at(bs, 48),
            backup_boot_sector: le_u16_at(bs, 50),
            drive_number: bs[64],
            boot_signature: bs[66],
            volume_id: le_u32_at(bs, 67),
            volume_label,
            fs_type,
            signature: le_u16_at(bs, 510),
        }
    }
}

/// FAT32 FSInfo sector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsInfo {
    pub lead_signature: u32,
    pub struct_signature: u32,
    pub free_count: u32,
    pub next_free: u32,
    pub trail_signature: u32,
}

impl FsInfo {
    /// Free count and next-free hint left unknown.
    pub const fn unknown() -> Self {
        Self {
            lead_signature: FSINFO_LEAD_SIGNATURE,
            struct_signature: FSINFO_STRUCT_SIGNATURE,
            free_count: FSINFO_UNKNOWN,
            next_free: FSINFO_UNKNOWN,
            trail_signature: FSINFO_TRAIL_SIGNATURE,
        }
    }

    pub fn to_bytes(&self) -> [u8; BLOCK_SIZE] {
        let mut fs = [0u8; BLOCK_SIZE];
        fs[0..4].copy_from_slice(&self.lead_signature.to_le_bytes());
        fs[484..488].copy_from_slice(&self.struct_signature.to_le_bytes());
        fs[488..492].copy_from_slice(&self.free_count.to_le_bytes());
        fs[492..496].copy_from_slice(&self.next_free.to_le_bytes());
        fs[508..512].copy_from_slice(&self.trail_signature.to_le_bytes());
        fs
    }

    pub fn from_bytes(fs: &[u8; BLOCK_SIZE]) -> Self {
        Self {
            lead_signature: le_u32_at(fs, 0),
            struct_signature: le_u32_at(fs, 484),
            free_count: le_u32_at(fs, 488),
            next_free: le_u32_at(fs, 492),
            trail_signature: le_u32_at(fs, 508),
        }
    }

    pub fn has_valid_signatures(&self) -> bool {
        self.lead_signature == FSINFO_LEAD_SIGNATURE
            && self.struct_signature == FSINFO_STRUCT_SIGNATURE
            && self.trail_signature == FSINFO_TRAIL_SIGNATURE
    }
}

/// Calendar time as stored in directory entries (2-second resolution).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatTimestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl FatTimestamp {
    /// 1980-01-01 00:00:00, the earliest representable time
    pub const EPOCH: Self = Self {
        year: 1980,
        month: 1,
        day: 1,
        hour: 0,
        minute: 0,
        second: 0,
    };

    /// A leap second (60) is stored as 59.
    pub const fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second: if second > 59 { 59 } else { second },
        }
    }

    /// UTC calendar time for `secs` since 1970-01-01. Anything before 1980
    /// is pinned to [`Self::EPOCH`].
    pub fn from_unix_seconds(secs: u64) -> Self {
        let days = secs / 86_400;
        let rem = secs % 86_400;
        let (year, month, day) = days_to_date(days);
        if year < 1980 {
            return Self::EPOCH;
        }
        Self::new(
            year.min(1980 + 127),
            month,
            day,
            (rem / 3600) as u8,
            ((rem % 3600) / 60) as u8,
            (rem % 60) as u8,
        )
    }

    /// hour:5 | minute:6 | seconds/2:5
    pub const fn fat_time(&self) -> u16 {
        ((self.hour as u16) << 11) | ((self.minute as u16) << 5) | (self.second as u16 / 2)
    }

    /// (year - 1980):7 | month:4 | day:5
    pub const fn fat_date(&self) -> u16 {
        ((self.year.saturating_sub(1980) & 0x7F) << 9)
            | ((self.month as u16) << 5)
            | (self.day as u16)
    }
}

fn is_leap_year(year: u16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(month: u8, year: u16) -> u8 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

fn days_to_date(days: u64) -> (u16, u8, u8) {
    let mut year = 1970u16;
    let mut remaining = days;

    loop {
        let days_in_year = if is_leap_year(year) { 366 } else { 365 };
        if remaining < days_in_year || year == u16::MAX {
            break;
        }
        remaining -= days_in_year;
        year += 1;
    }

    let mut month = 1u8;
    while month < 12 {
        let dim = days_in_month(month, year) as u64;
        if remaining < dim {
            break;
        }
        remaining -= dim;
        month += 1;
    }

    (year, month, (remaining as u8).saturating_add(1))
}

/// 32-byte short-name directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub name: [u8; 11],
    pub attr: u8,
    pub nt_reserved: u8,
    pub create_time_tenth: u8,
    pub create_time: u16,
    pub create_date: u16,
    pub last_access_date: u16,
    pub first_cluster_high: u16,
    pub write_time: u16,
    pub write_date: u16,
    pub first_cluster_low: u16,
    pub file_size: u32,
}

impl DirEntry {
    pub const fn empty() -> Self {
        Self {
            name: [0; 11],
            attr: 0,
            nt_reserved: 0,
            create_time_tenth: 0,
            create_time: 0,
            create_date: 0,
            last_access_date: 0,
            first_cluster_high: 0,
            write_time: 0,
            write_date: 0,
            first_cluster_low: 0,
            file_size: 0,
        }
    }

    /// Directory entry named `name` (already in 8.3 padded form).
    pub fn directory(name: [u8; 11], first_cluster: u32, stamp: FatTimestamp) -> Self {
        let mut entry = Self::empty();
        entry.name = name;
        entry.attr = ATTR_DIRECTORY;
        entry.set_first_cluster(first_cluster);
        entry.create_time = stamp.fat_time();
        entry.create_date = stamp.fat_date();
        entry.last_access_date = stamp.fat_date();
        entry.write_time = stamp.fat_time();
        entry.write_date = stamp.fat_date();
        entry
    }

    pub fn first_cluster(&self) -> u32 {
        ((self.first_cluster_high as u32) << 16) | self.first_cluster_low as u32
    }

    pub fn set_first_cluster(&mut self, cluster: u32) {
        self.first_cluster_high = (cluster >> 16) as u16;
        self.first_cluster_low = (cluster & 0xFFFF) as u16;
    }

    pub fn is_free(&self) -> bool {
        self.name[0] == 0x00 || self.name[0] == 0xE5
    }

    pub fn to_bytes(&self) -> [u8; DIR_ENTRY_SIZE] {
        let mut b = [0u8; DIR_ENTRY_SIZE];
        b[0..11].copy_from_slice(&self.name);
        b[11] = self.attr;
        b[12] = self.nt_reserved;
        b[13] = self.create_time_tenth;
        b[14..16].copy_from_slice(&self.create_time.to_le_bytes());
        b[16..18].copy_from_slice(&self.create_date.to_le_bytes());
        b[18..20].copy_from_slice(&self.last_access_date.to_le_bytes());
        b[20..22].copy_from_slice(&self.first_cluster_high.to_le_bytes());
        b[22..24].copy_from_slice(&self.write_time.to_le_bytes());
        b[24..26].copy_from_slice(&self.write_date.to_le_bytes());
        b[26..28].copy_from_slice(&self.first_cluster_low.to_le_bytes());
        b[28..32].copy_from_slice(&self.file_size.to_le_bytes());
        b
    }

    pub fn from_bytes(b: &[u8; DIR_ENTRY_SIZE]) -> Self {
        let mut name = [0u8; 11];
        name.copy_from_slice(&b[0..11]);
        Self {
            name,
            attr: b[11],
            nt_reserved: b[12],
            create_time_tenth: b[13],
            create_time: le_u16_at(b, 14),
            create_date: le_u16_at(b, 16),
            last_access_date: le_u16_at(b, 18),
            first_cluster_high: le_u16_at(b, 20),
            write_time: le_u16_at(b, 22),
            write_date: le_u16_at(b, 24),
            first_cluster_low: le_u16_at(b, 26),
            file_size: le_u32_at(b, 28),
        }
    }
}
