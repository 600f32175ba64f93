// Writing the protective MBR and both GPT copies

use core::fmt::Display;

use gpt_disk_io::BlockIo;
use gpt_disk_types::{BlockSize, Lba};
use rand_core::RngCore;
use uguid::Guid;

use super::layout::ImagePlan;
use super::types::{
    encode_partition_table, GptError, GptHeader, GptPartitionEntry, GptStage, GPT_HEADER_SIZE,
    GPT_REVISION, GPT_SIGNATURE, PARTITION_ENTRY_COUNT, PARTITION_ENTRY_SIZE, PRIMARY_HEADER_LBA,
    PRIMARY_TABLE_LBA,
};
use crate::checksum::crc32;
use crate::disk::mbr::ProtectiveMbr;
use crate::guid::{new_guid, BASIC_DATA_PARTITION, EFI_SYSTEM_PARTITION};

pub const ESP_NAME: &str = "EFI System Partition";
pub const DATA_NAME: &str = "Root Partition";

/// Map a device error to a stage error, logging the device's message first.
fn io_error<E: Display>(stage: GptStage) -> impl FnOnce(E) -> GptError {
    move |err| {
        tracing::error!(%err, %stage, "block write failed");
        GptError::Io(stage)
    }
}

/// Reject devices that are not 512-byte sectored or cannot hold the plan.
fn check_device<B: BlockIo>(block_io: &mut B, plan: &ImagePlan) -> Result<(), GptError> {
    if block_io.block_size() != BlockSize::BS_512 {
        return Err(GptError::UnsupportedBlockSize);
    }

    let available = block_io
        .num_blocks()
        .map_err(io_error(GptStage::ProtectiveMbr))?;
    if available < plan.total_blocks {
        return Err(GptError::DeviceTooSmall {
            needed: plan.total_blocks,
            available,
        });
    }
    Ok(())
}

/// Write block 0: a protective MBR covering `plan.total_blocks`.
pub fn write_protective_mbr<B: BlockIo>(
    block_io: &mut B,
    plan: &ImagePlan,
) -> Result<(), GptError> {
    check_device(block_io, plan)?;

    let mbr = ProtectiveMbr::new(plan.total_blocks);
    block_io
        .write_blocks(Lba(0), &mbr.to_bytes())
        .map_err(io_error(GptStage::ProtectiveMbr))?;

    tracing::info!(
        size_in_lba = mbr.partitions[0].size_in_lba,
        "wrote protective MBR"
    );
    Ok(())
}

/// The two partition entries of `plan`, each with a fresh unique identifier.
pub fn build_entries<R: RngCore + ?Sized>(plan: &ImagePlan, rng: &mut R) -> [GptPartitionEntry; 2] {
    [
        GptPartitionEntry::new(
            EFI_SYSTEM_PARTITION,
            new_guid(rng),
            plan.esp_start,
            plan.esp_end,
            ESP_NAME,
        ),
        GptPartitionEntry::new(
            BASIC_DATA_PARTITION,
            new_guid(rng),
            plan.data_start,
            plan.data_end,
            DATA_NAME,
        ),
    ]
}

/// Primary and secondary headers for `plan`, CRCs filled in.
///
/// The secondary is the primary with `my_lba`/`alternate_lba` swapped and the
/// entry array moved to its slot just before the secondary header.
pub fn build_headers(
    plan: &ImagePlan,
    disk_guid: Guid,
    table_crc32: u32,
) -> (GptHeader, GptHeader) {
    let mut primary = GptHeader {
        signature: GPT_SIGNATURE,
        revision: GPT_REVISION,
        header_size: GPT_HEADER_SIZE,
        header_crc32: 0,
        reserved: 0,
        my_lba: PRIMARY_HEADER_LBA,
        alternate_lba: plan.secondary_header_lba(),
        first_usable_lba: plan.first_usable_lba(),
        last_usable_lba: plan.last_usable_lba(),
        disk_guid,
        partition_entry_lba: PRIMARY_TABLE_LBA,
        number_of_partition_entries: PARTITION_ENTRY_COUNT as u32,
        size_of_partition_entry: PARTITION_ENTRY_SIZE as u32,
        partition_entry_array_crc32: table_crc32,
    };
    primary.update_crc32();

    let mut secondary = primary;
    secondary.my_lba = primary.alternate_lba;
    secondary.alternate_lba = primary.my_lba;
    secondary.partition_entry_lba = plan.secondary_table_lba();
    secondary.update_crc32();

    (primary, secondary)
}

/// Write the primary header and table, then the secondary table and header.
///
/// Returns the primary header as written.
pub fn write_gpt<B, R>(
    block_io: &mut B,
    plan: &ImagePlan,
    rng: &mut R,
) -> Result<GptHeader, GptError>
where
    B: BlockIo,
    R: RngCore + ?Sized,
{
    check_device(block_io, plan)?;

    let disk_guid = new_guid(rng);
    let entries = build_entries(plan, rng);
    let table = encode_partition_table(&entries);
    let table_crc32 = crc32(&table);
    let (primary, secondary) = build_headers(plan, disk_guid, table_crc32);

    tracing::debug!(
        %disk_guid,
        esp_guid = %entries[0].unique_partition_guid,
        data_guid = %entries[1].unique_partition_guid,
        table_crc32,
        "built GPT"
    );

    block_io
        .write_blocks(Lba(primary.my_lba), &primary.to_bytes())
        .map_err(io_error(GptStage::PrimaryHeader))?;
    block_io
        .write_blocks(Lba(primary.partition_entry_lba), &table)
        .map_err(io_error(GptStage::PrimaryTable))?;
    tracing::info!(header_lba = primary.my_lba, "wrote primary GPT");

    block_io
        .write_blocks(Lba(secondary.partition_entry_lba), &table)
        .map_err(io_error(GptStage::SecondaryTable))?;
    block_io
        .write_blocks(Lba(secondary.my_lba), &secondary.to_bytes())
        .map_err(io_error(GptStage::SecondaryHeader))?;
    tracing::info!(header_lba = secondary.my_lba, "wrote secondary GPT");

    Ok(primary)
}

/// Partition a fresh image: protective MBR, both GPT copies, flush.
pub fn create_image<B, R>(
    block_io: &mut B,
    plan: &ImagePlan,
    rng: &mut R,
) -> Result<GptHeader, GptError>
where
    B: BlockIo,
    R: RngCore + ?Sized,
{
    write_protective_mbr(block_io, plan)?;
    let primary = write_gpt(block_io, plan, rng)?;
    block_io.flush().map_err(io_error(GptStage::Flush))?;
    Ok(primary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::gpt_ops::layout::layout_image;
    use crate::disk::mbr::OSTYPE_PROTECTIVE;
    use alloc::vec;
    use gpt_disk_io::BlockIoAdapter;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn small_plan() -> ImagePlan {
        layout_image(512 * 1024, 512 * 1024).unwrap()
    }

    fn block(buf: &[u8], lba: u64) -> &[u8] {
        let start = lba as usize * 512;
        &buf[start..start + 512]
    }

    #[test]
    fn test_headers_differ_only_in_location_fields() {
        let plan = small_plan();
        let (primary, secondary) = build_headers(&plan, Guid::ZERO, 0x1234_5678);

        assert_eq!(primary.my_lba, 1);
        assert_eq!(primary.alternate_lba, plan.total_blocks - 1);
        assert_eq!(secondary.my_lba, plan.total_blocks - 1);
        assert_eq!(secondary.alternate_lba, 1);
        assert_eq!(secondary.partition_entry_lba, plan.total_blocks - 33);

        let a = primary.to_bytes();
        let b = secondary.to_bytes();
        for i in 0..512 {
            let allowed = (16..20).contains(&i) || (24..40).contains(&i) || (72..80).contains(&i);
            if !allowed {
                assert_eq!(a[i], b[i], "byte {} differs", i);
            }
        }

        assert_eq!(primary.header_crc32, primary.compute_crc32());
        assert_eq!(secondary.header_crc32, secondary.compute_crc32());
    }

    #[test]
    fn test_entries_follow_plan() {
        let plan = small_plan();
        let entries = build_entries(&plan, &mut StdRng::seed_from_u64(1));
        assert_eq!(entries[0].partition_type_guid, EFI_SYSTEM_PARTITION);
        assert_eq!(entries[0].starting_lba, plan.esp_start);
        assert_eq!(entries[0].ending_lba, plan.esp_end);
        assert_eq!(entries[0].name(), ESP_NAME);
        assert_eq!(entries[1].partition_type_guid, BASIC_DATA_PARTITION);
        assert_eq!(entries[1].starting_lba, plan.data_start);
        assert_eq!(entries[1].ending_lba, plan.data_end);
        assert_eq!(entries[1].name(), DATA_NAME);
        assert_ne!(
            entries[0].unique_partition_guid,
            entries[1].unique_partition_guid
        );
    }

    #[test]
    fn test_create_image_places_structures() {
        let plan = small_plan();
        let mut buf = vec![0u8; plan.total_bytes() as usize];
        let mut dev = BlockIoAdapter::new(buf.as_mut_slice(), BlockSize::BS_512);
        let primary = create_image(&mut dev, &plan, &mut StdRng::seed_from_u64(9)).unwrap();

        let mbr = block(&buf, 0);
        assert_eq!(mbr[450], OSTYPE_PROTECTIVE);
        assert_eq!(&mbr[510..], &[0x55, 0xAA]);

        assert_eq!(&block(&buf, 1)[..8], b"EFI PART");
        assert_eq!(&block(&buf, plan.total_blocks - 1)[..8], b"EFI PART");

        // both tables identical and matching the stored CRC
        let primary_table = &buf[2 * 512..34 * 512];
        let secondary_start = (plan.total_blocks - 33) as usize * 512;
        let secondary_table = &buf[secondary_start..secondary_start + 32 * 512];
        assert_eq!(primary_table, secondary_table);
        assert_eq!(crc32(primary_table), primary.partition_entry_array_crc32);
    }

    #[test]
    fn test_undersized_device_rejected() {
        let plan = small_plan();
        let mut buf = vec![0u8; (plan.total_blocks as usize - 1) * 512];
        let mut dev = BlockIoAdapter::new(buf.as_mut_slice(), BlockSize::BS_512);
        let err = create_image(&mut dev, &plan, &mut StdRng::seed_from_u64(0)).unwrap_err();
        assert_eq!(
            err,
            GptError::DeviceTooSmall {
                needed: plan.total_blocks,
                available: plan.total_blocks - 1
            }
        );
        // nothing written
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_non_512_block_size_rejected() {
        let plan = small_plan();
        let mut buf = vec![0u8; plan.total_bytes() as usize];
        let mut dev = BlockIoAdapter::new(buf.as_mut_slice(), BlockSize::BS_4096);
        assert_eq!(
            write_protective_mbr(&mut dev, &plan),
            Err(GptError::UnsupportedBlockSize)
        );
    }
}
