// GPT on-disk structures and errors

use core::fmt;

use uguid::Guid;

use crate::checksum::crc32;
use crate::disk::BLOCK_SIZE;

/// "EFI PART" read as a little-endian u64
pub const GPT_SIGNATURE: u64 = 0x5452_4150_2049_4645;
pub const GPT_REVISION: u32 = 0x0001_0000;
pub const GPT_HEADER_SIZE: u32 = 92;

pub const PARTITION_ENTRY_SIZE: usize = 128;
pub const PARTITION_ENTRY_COUNT: usize = 128;
pub const PARTITION_TABLE_BYTES: usize = PARTITION_ENTRY_SIZE * PARTITION_ENTRY_COUNT;
pub const PARTITION_TABLE_BLOCKS: u64 = (PARTITION_TABLE_BYTES / BLOCK_SIZE) as u64;

/// MBR + primary header + primary table
pub const FRONT_MATTER_BLOCKS: u64 = 2 + PARTITION_TABLE_BLOCKS;
/// Secondary table + secondary header
pub const BACK_MATTER_BLOCKS: u64 = PARTITION_TABLE_BLOCKS + 1;

pub const PRIMARY_HEADER_LBA: u64 = 1;
pub const PRIMARY_TABLE_LBA: u64 = 2;

/// Partition name length in UTF-16 code units
pub const PARTITION_NAME_LEN: usize = 36;

const CRC_OFFSET: usize = 16;

/// Step of image construction, reported with I/O failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GptStage {
    ProtectiveMbr,
    PrimaryHeader,
    PrimaryTable,
    SecondaryTable,
    SecondaryHeader,
    Flush,
    ReadBack,
}

impl fmt::Display for GptStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProtectiveMbr => write!(f, "protective MBR"),
            Self::PrimaryHeader => write!(f, "primary GPT header"),
            Self::PrimaryTable => write!(f, "primary partition table"),
            Self::SecondaryTable => write!(f, "secondary partition table"),
            Self::SecondaryHeader => write!(f, "secondary GPT header"),
            Self::Flush => write!(f, "flush"),
            Self::ReadBack => write!(f, "read back"),
        }
    }
}

/// Which header copy a check refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderCopy {
    Primary,
    Secondary,
}

impl fmt::Display for HeaderCopy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Secondary => write!(f, "secondary"),
        }
    }
}

/// GPT construction and self-check errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GptError {
    /// Block read/write failed at the named step
    Io(GptStage),
    /// Only 512-byte blocks are supported
    UnsupportedBlockSize,
    /// A partition of zero bytes was requested
    EmptyPartition,
    /// Device has fewer blocks than the plan needs
    DeviceTooSmall { needed: u64, available: u64 },
    /// Requested sizes do not fit a 64-bit byte count
    ImageTooLarge,
    InvalidMbr,
    /// Entry count or entry size other than 128
    UnsupportedEntryLayout { count: u32, size: u32 },
    InvalidSignature(HeaderCopy),
    HeaderCrcMismatch { copy: HeaderCopy, stored: u32, computed: u32 },
    TableCrcMismatch { copy: HeaderCopy, stored: u32, computed: u32 },
    /// my_lba/alternate_lba of the two headers do not point at each other
    CrossLinkMismatch,
    /// Primary and secondary partition tables differ
    TableMismatch,
}

impl fmt::Display for GptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(stage) => write!(f, "I/O error at {}", stage),
            Self::UnsupportedBlockSize => write!(f, "unsupported block size (need 512)"),
            Self::EmptyPartition => write!(f, "partition size must be non-zero"),
            Self::DeviceTooSmall { needed, available } => write!(
                f,
                "device too small: need {} blocks, have {}",
                needed, available
            ),
            Self::ImageTooLarge => write!(f, "image size overflows a 64-bit byte count"),
            Self::InvalidMbr => write!(f, "invalid protective MBR"),
            Self::UnsupportedEntryLayout { count, size } => write!(
                f,
                "unsupported partition array: {} entries of {} bytes",
                count, size
            ),
            Self::InvalidSignature(copy) => write!(f, "invalid {} GPT header signature", copy),
            Self::HeaderCrcMismatch {
                copy,
                stored,
                computed,
            } => write!(
                f,
                "{} header CRC32 mismatch: stored {:#010x}, computed {:#010x}",
                copy, stored, computed
            ),
            Self::TableCrcMismatch {
                copy,
                stored,
                computed,
            } => write!(
                f,
                "{} partition table CRC32 mismatch: stored {:#010x}, computed {:#010x}",
                copy, stored, computed
            ),
            Self::CrossLinkMismatch => write!(f, "GPT header LBAs do not reference each other"),
            Self::TableMismatch => write!(f, "primary and secondary partition tables differ"),
        }
    }
}

/// GPT header (92 meaningful bytes, zero padded to a block on disk)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GptHeader {
    pub signature: u64,
    pub revision: u32,
    pub header_size: u32,
    pub header_crc32: u32,
    pub reserved: u32,
    pub my_lba: u64,
    pub alternate_lba: u64,
    pub first_usable_lba: u64,
    pub last_usable_lba: u64,
    pub disk_guid: Guid,
    pub partition_entry_lba: u64,
    pub number_of_partition_entries: u32,
    pub size_of_partition_entry: u32,
    pub partition_entry_array_crc32: u32,
}

impl GptHeader {
    /// Full block: 92 header bytes followed by zeros.
    pub fn to_bytes(&self) -> [u8; BLOCK_SIZE] {
        let mut b = [0u8; BLOCK_SIZE];
        b[0..8].copy_from_slice(&self.signature.to_le_bytes());
        b[8..12].copy_from_slice(&self.revision.to_le_bytes());
        b[12..16].copy_from_slice(&self.header_size.to_le_bytes());
        b[16..20].copy_from_slice(&self.header_crc32.to_le_bytes());
        b[20..24].copy_from_slice(&self.reserved.to_le_bytes());
        b[24..32].copy_from_slice(&self.my_lba.to_le_bytes());
        b[32..40].copy_from_slice(&self.alternate_lba.to_le_bytes());
        b[40..48].copy_from_slice(&self.first_usable_lba.to_le_bytes());
        b[48..56].copy_from_slice(&self.last_usable_lba.to_le_bytes());
        b[56..72].copy_from_slice(&self.disk_guid.to_bytes());
        b[72..80].copy_from_slice(&self.partition_entry_lba.to_le_bytes());
        b[80..84].copy_from_slice(&self.number_of_partition_entries.to_le_bytes());
        b[84..88].copy_from_slice(&self.size_of_partition_entry.to_le_bytes());
        b[88..92].copy_from_slice(&self.partition_entry_array_crc32.to_le_bytes());
        b
    }

    pub fn from_bytes(b: &[u8; BLOCK_SIZE]) -> Self {
        let mut guid = [0u8; 16];
        guid.copy_from_slice(&b[56..72]);

        Self {
            signature: le_u64(b, 0),
            revision: le_u32(b, 8),
            header_size: le_u32(b, 12),
            header_crc32: le_u32(b, 16),
            reserved: le_u32(b, 20),
            my_lba: le_u64(b, 24),
            alternate_lba: le_u64(b, 32),
            first_usable_lba: le_u64(b, 40),
            last_usable_lba: le_u64(b, 48),
            disk_guid: Guid::from_bytes(guid),
            partition_entry_lba: le_u64(b, 72),
            number_of_partition_entries: le_u32(b, 80),
            size_of_partition_entry: le_u32(b, 84),
            partition_entry_array_crc32: le_u32(b, 88),
        }
    }

    /// CRC-32 over the first `header_size` bytes with the CRC field zeroed.
    pub fn compute_crc32(&self) -> u32 {
        let mut bytes = self.to_bytes();
        bytes[CRC_OFFSET..CRC_OFFSET + 4].fill(0);
        let len = (self.header_size as usize).min(BLOCK_SIZE);
        crc32(&bytes[..len])
    }

    /// Store a freshly computed header CRC.
    pub fn update_crc32(&mut self) {
        self.header_crc32 = self.compute_crc32();
    }

    pub fn has_valid_signature(&self) -> bool {
        self.signature == GPT_SIGNATURE
    }
}

/// One 128-byte partition entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GptPartitionEntry {
    pub partition_type_guid: Guid,
    pub unique_partition_guid: Guid,
    pub starting_lba: u64,
    /// Inclusive
    pub ending_lba: u64,
    pub attributes: u64,
    /// UTF-16LE, zero padded
    pub name: [u16; PARTITION_NAME_LEN],
}

impl GptPartitionEntry {
    pub const fn empty() -> Self {
        Self {
            partition_type_guid: Guid::ZERO,
            unique_partition_guid: Guid::ZERO,
            starting_lba: 0,
            ending_lba: 0,
            attributes: 0,
            name: [0; PARTITION_NAME_LEN],
        }
    }

    pub fn new(
        partition_type_guid: Guid,
        unique_partition_guid: Guid,
        starting_lba: u64,
        ending_lba: u64,
        name: &str,
    ) -> Self {
        let mut entry = Self {
            partition_type_guid,
            unique_partition_guid,
            starting_lba,
            ending_lba,
            attributes: 0,
            name: [0; PARTITION_NAME_LEN],
        };
        entry.set_name(name);
        entry
    }

    /// Encode `name` as UTF-16, truncated to 36 code units.
    pub fn set_name(&mut self, name: &str) {
        self.name = [0; PARTITION_NAME_LEN];
        for (slot, unit) in self.name.iter_mut().zip(name.encode_utf16()) {
            *slot = unit;
        }
    }

    /// Name up to the first NUL, invalid code units replaced.
    pub fn name(&self) -> alloc::string::String {
        let len = self
            .name
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(PARTITION_NAME_LEN);
        char::decode_utf16(self.name[..len].iter().copied())
            .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect()
    }

    pub fn is_used(&self) -> bool {
        self.partition_type_guid != Guid::ZERO
    }

    pub fn to_bytes(&self) -> [u8; PARTITION_ENTRY_SIZE] {
        let mut b = [0u8; PARTITION_ENTRY_SIZE];
        b[0..16].copy_from_slice(&self.partition_type_guid.to_bytes());
        b[16..32].copy_from_slice(&self.unique_partition_guid.to_bytes());
        b[32..40].copy_from_slice(&self.starting_lba.to_le_bytes());
        b[40..48].copy_from_slice(&self.ending_lba.to_le_bytes());
        b[48..56].copy_from_slice(&self.attributes.to_le_bytes());
        for (i, unit) in self.name.iter().enumerate() {
            let offset = 56 + i * 2;
            b[offset..offset + 2].copy_from_slice(&unit.to_le_bytes());
        }
        b
    }

    pub fn from_bytes(b: &[u8; PARTITION_ENTRY_SIZE]) -> Self {
        let mut type_guid = [0u8; 16];
        type_guid.copy_from_slice(&b[0..16]);
        let mut unique_guid = [0u8; 16];
        unique_guid.copy_from_slice(&b[16..32]);

        let mut name = [0u16; PARTITION_NAME_LEN];
        for (i, unit) in name.iter_mut().enumerate() {
            let offset = 56 + i * 2;
            *unit = u16::from_le_bytes([b[offset], b[offset + 1]]);
        }

        Self {
            partition_type_guid: Guid::from_bytes(type_guid),
            unique_partition_guid: Guid::from_bytes(unique_guid),
            starting_lba: le_u64(b, 32),
            ending_lba: le_u64(b, 40),
            attributes: le_u64(b, 48),
            name,
        }
    }
}

/// Serialize the full 128-entry array; unused slots stay zero.
pub fn encode_partition_table(entries: &[GptPartitionEntry]) -> alloc::vec::Vec<u8> {
    let mut table = alloc::vec![0u8; PARTITION_TABLE_BYTES];
    for (i, entry) in entries.iter().take(PARTITION_ENTRY_COUNT).enumerate() {
        let offset = i * PARTITION_ENTRY_SIZE;
        table[offset..offset + PARTITION_ENTRY_SIZE].copy_from_slice(&entry.to_bytes());
    }
    table
}

pub(crate) fn le_u32(b: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([b[offset], b[offset + 1], b[offset + 2], b[offset + 3]])
}

pub(crate) fn le_u64(b: &[u8], offset: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&b[offset..offset + 8]);
    u64::from_le_bytes(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guid::{BASIC_DATA_PARTITION, EFI_SYSTEM_PARTITION};
    use uguid::guid;

    fn sample_header() -> GptHeader {
        GptHeader {
            signature: GPT_SIGNATURE,
            revision: GPT_REVISION,
            header_size: GPT_HEADER_SIZE,
            header_crc32: 0,
            reserved: 0,
            my_lba: 1,
            alternate_lba: 9_999,
            first_usable_lba: 34,
            last_usable_lba: 9_966,
            disk_guid: guid!("01234567-89ab-4def-8123-456789abcdef"),
            partition_entry_lba: 2,
            number_of_partition_entries: 128,
            size_of_partition_entry: 128,
            partition_entry_array_crc32: 0xDEAD_BEEF,
        }
    }

    #[test]
    fn test_signature_is_efi_part() {
        assert_eq!(&GPT_SIGNATURE.to_le_bytes(), b"EFI PART");
    }

    #[test]
    fn test_table_geometry() {
        assert_eq!(PARTITION_TABLE_BLOCKS, 32);
        assert_eq!(FRONT_MATTER_BLOCKS, 34);
        assert_eq!(BACK_MATTER_BLOCKS, 33);
    }

    #[test]
    fn test_header_field_offsets() {
        let b = sample_header().to_bytes();
        assert_eq!(&b[0..8], b"EFI PART");
        assert_eq!(&b[8..12], &[0x00, 0x00, 0x01, 0x00]);
        assert_eq!(le_u32(&b, 12), 92);
        assert_eq!(le_u64(&b, 24), 1);
        assert_eq!(le_u64(&b, 32), 9_999);
        assert_eq!(le_u64(&b, 72), 2);
        assert_eq!(le_u32(&b, 88), 0xDEAD_BEEF);
        assert!(b[92..].iter().all(|&x| x == 0));
    }

    #[test]
    fn test_header_crc_ignores_stored_crc() {
        let mut header = sample_header();
        let expected = header.compute_crc32();
        header.header_crc32 = 0x1234_5678;
        assert_eq!(header.compute_crc32(), expected);

        header.update_crc32();
        let mut zeroed = header.to_bytes();
        zeroed[16..20].fill(0);
        assert_eq!(header.header_crc32, crc32(&zeroed[..92]));
    }

    #[test]
    fn test_header_decode() {
        let mut header = sample_header();
        header.update_crc32();
        assert_eq!(GptHeader::from_bytes(&header.to_bytes()), header);
    }

    #[test]
    fn test_entry_layout() {
        let entry = GptPartitionEntry::new(
            EFI_SYSTEM_PARTITION,
            guid!("11111111-2222-4333-8444-555555555555"),
            2048,
            206_847,
            "EFI System Partition",
        );
        let b = entry.to_bytes();
        assert_eq!(&b[0..16], &EFI_SYSTEM_PARTITION.to_bytes());
        assert_eq!(le_u64(&b, 32), 2048);
        assert_eq!(le_u64(&b, 40), 206_847);
        assert_eq!(le_u64(&b, 48), 0);
        assert_eq!(&b[56..60], &[b'E', 0, b'F', 0]);
        // 20 characters, rest zero
        assert!(b[56 + 40..].iter().all(|&x| x == 0));
    }

    #[test]
    fn test_entry_name_decode() {
        let entry = GptPartitionEntry::new(
            BASIC_DATA_PARTITION,
            Guid::ZERO,
            4096,
            8191,
            "Root Partition",
        );
        let decoded = GptPartitionEntry::from_bytes(&entry.to_bytes());
        assert_eq!(decoded, entry);
        assert_eq!(decoded.name(), "Root Partition");
    }

    #[test]
    fn test_entry_name_truncated() {
        let mut entry = GptPartitionEntry::empty();
        entry.set_name("0123456789012345678901234567890123456789");
        assert_eq!(entry.name().len(), PARTITION_NAME_LEN);
    }

    #[test]
    fn test_table_padding() {
        let used = GptPartitionEntry::new(EFI_SYSTEM_PARTITION, Guid::ZERO, 2048, 4095, "ESP");
        let table = encode_partition_table(&[used]);
        assert_eq!(table.len(), PARTITION_TABLE_BYTES);
        assert!(table[PARTITION_ENTRY_SIZE..].iter().all(|&x| x == 0));
        assert!(!GptPartitionEntry::empty().is_used());
    }
}
