// Read-back check of a freshly written image
//
// Unlike `locate_partition`, this recomputes every CRC and compares the two
// GPT copies. It is meant to run right after `create_image`.

use alloc::vec;
use alloc::vec::Vec;

use gpt_disk_io::BlockIo;
use gpt_disk_types::{BlockSize, Lba};
use uguid::Guid;

use super::types::{
    GptError, GptHeader, GptPartitionEntry, GptStage, HeaderCopy, PARTITION_ENTRY_COUNT,
    PARTITION_ENTRY_SIZE, PARTITION_TABLE_BYTES, PRIMARY_HEADER_LBA,
};
use crate::checksum::crc32;
use crate::disk::mbr::{ProtectiveMbr, OSTYPE_PROTECTIVE};
use crate::disk::BLOCK_SIZE;

/// What a successful check found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GptSummary {
    pub disk_guid: Guid,
    pub total_blocks: u64,
    pub primary: GptHeader,
    pub secondary: GptHeader,
    /// Entries with a non-zero type identifier, in table order
    pub partitions: Vec<GptPartitionEntry>,
}

fn read_block<B: BlockIo>(block_io: &mut B, lba: u64) -> Result<[u8; BLOCK_SIZE], GptError> {
    let mut buf = [0u8; BLOCK_SIZE];
    block_io.read_blocks(Lba(lba), &mut buf).map_err(|err| {
        tracing::error!(%err, lba, "GPT read-back failed");
        GptError::Io(GptStage::ReadBack)
    })?;
    Ok(buf)
}

/// Read a header and check its signature, CRC and entry layout.
fn read_header<B: BlockIo>(
    block_io: &mut B,
    lba: u64,
    copy: HeaderCopy,
) -> Result<GptHeader, GptError> {
    let header = GptHeader::from_bytes(&read_block(block_io, lba)?);

    if !header.has_valid_signature() {
        return Err(GptError::InvalidSignature(copy));
    }

    let computed = header.compute_crc32();
    if computed != header.header_crc32 {
        return Err(GptError::HeaderCrcMismatch {
            copy,
            stored: header.header_crc32,
            computed,
        });
    }

    if header.number_of_partition_entries as usize != PARTITION_ENTRY_COUNT
        || header.size_of_partition_entry as usize != PARTITION_ENTRY_SIZE
    {
        return Err(GptError::UnsupportedEntryLayout {
            count: header.number_of_partition_entries,
            size: header.size_of_partition_entry,
        });
    }

    Ok(header)
}

/// Read the entry array a header points at and check its CRC.
fn read_table<B: BlockIo>(
    block_io: &mut B,
    header: &GptHeader,
    copy: HeaderCopy,
) -> Result<Vec<u8>, GptError> {
    let mut table = vec![0u8; PARTITION_TABLE_BYTES];
    block_io
        .read_blocks(Lba(header.partition_entry_lba), &mut table)
        .map_err(|err| {
            tracing::error!(%err, %copy, "partition table read-back failed");
            GptError::Io(GptStage::ReadBack)
        })?;

    let computed = crc32(&table);
    if computed != header.partition_entry_array_crc32 {
        return Err(GptError::TableCrcMismatch {
            copy,
            stored: header.partition_entry_array_crc32,
            computed,
        });
    }
    Ok(table)
}

/// Check the protective MBR and both GPT copies for full consistency.
pub fn verify_gpt<B: BlockIo>(block_io: &mut B) -> Result<GptSummary, GptError> {
    if block_io.block_size() != BlockSize::BS_512 {
        return Err(GptError::UnsupportedBlockSize);
    }
    let total_blocks = block_io.num_blocks().map_err(|err| {
        tracing::error!(%err, "could not query device size");
        GptError::Io(GptStage::ReadBack)
    })?;

    let mbr = ProtectiveMbr::from_bytes(&read_block(block_io, 0)?);
    if !mbr.has_valid_signature()
        || mbr.partitions[0].os_type != OSTYPE_PROTECTIVE
        || mbr.partitions[0].starting_lba != 1
    {
        return Err(GptError::InvalidMbr);
    }

    let primary = read_header(block_io, PRIMARY_HEADER_LBA, HeaderCopy::Primary)?;
    if primary.alternate_lba >= total_blocks {
        return Err(GptError::CrossLinkMismatch);
    }
    let secondary = read_header(block_io, primary.alternate_lba, HeaderCopy::Secondary)?;

    if secondary.my_lba != primary.alternate_lba || secondary.alternate_lba != primary.my_lba {
        return Err(GptError::CrossLinkMismatch);
    }

    let primary_table = read_table(block_io, &primary, HeaderCopy::Primary)?;
    let secondary_table = read_table(block_io, &secondary, HeaderCopy::Secondary)?;
    if primary_table != secondary_table {
        return Err(GptError::TableMismatch);
    }

    let partitions: Vec<GptPartitionEntry> = primary_table
        .chunks_exact(PARTITION_ENTRY_SIZE)
        .filter_map(|raw| {
            let mut bytes = [0u8; PARTITION_ENTRY_SIZE];
            bytes.copy_from_slice(raw);
            let entry = GptPartitionEntry::from_bytes(&bytes);
            entry.is_used().then_some(entry)
        })
        .collect();

    tracing::info!(
        disk_guid = %primary.disk_guid,
        partitions = partitions.len(),
        "GPT verified"
    );

    Ok(GptSummary {
        disk_guid: primary.disk_guid,
        total_blocks,
        primary,
        secondary,
        partitions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::gpt_ops::create::create_image;
    use crate::disk::gpt_ops::layout::{layout_image, ImagePlan};
    use gpt_disk_io::BlockIoAdapter;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fresh_image() -> (ImagePlan, Vec<u8>) {
        let plan = layout_image(512 * 1024, 512 * 1024).unwrap();
        let mut buf = vec![0u8; plan.total_bytes() as usize];
        let mut dev = BlockIoAdapter::new(buf.as_mut_slice(), BlockSize::BS_512);
        create_image(&mut dev, &plan, &mut StdRng::seed_from_u64(3)).unwrap();
        (plan, buf)
    }

    fn verify(buf: &mut [u8]) -> Result<GptSummary, GptError> {
        verify_gpt(&mut BlockIoAdapter::new(buf, BlockSize::BS_512))
    }

    #[test]
    fn test_fresh_image_verifies() {
        let (plan, mut buf) = fresh_image();
        let summary = verify(&mut buf).unwrap();
        assert_eq!(summary.total_blocks, plan.total_blocks);
        assert_eq!(summary.partitions.len(), 2);
        assert_eq!(summary.partitions[0].starting_lba, plan.esp_start);
        assert_eq!(summary.partitions[1].ending_lba, plan.data_end);
        assert_eq!(summary.secondary.my_lba, plan.total_blocks - 1);
    }

    #[test]
    fn test_corrupt_primary_header_detected() {
        let (_, mut buf) = fresh_image();
        // flip a byte inside first_usable_lba
        buf[512 + 40] ^= 0xFF;
        assert!(matches!(
            verify(&mut buf),
            Err(GptError::HeaderCrcMismatch {
                copy: HeaderCopy::Primary,
                ..
            })
        ));
    }

    #[test]
    fn test_corrupt_secondary_table_detected() {
        let (plan, mut buf) = fresh_image();
        let offset = (plan.total_blocks - 33) as usize * 512 + 100;
        buf[offset] ^= 0x01;
        assert!(matches!(
            verify(&mut buf),
            Err(GptError::TableCrcMismatch {
                copy: HeaderCopy::Secondary,
                ..
            })
        ));
    }

    #[test]
    fn test_missing_mbr_signature_detected() {
        let (_, mut buf) = fresh_image();
        buf[510] = 0;
        assert_eq!(verify(&mut buf).unwrap_err(), GptError::InvalidMbr);
    }

    #[test]
    fn test_blank_device_rejected() {
        let mut buf = vec![0u8; 64 * 512];
        assert_eq!(verify(&mut buf).unwrap_err(), GptError::InvalidMbr);
    }
}
