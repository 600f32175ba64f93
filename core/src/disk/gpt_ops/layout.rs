// Image sizing: where each partition goes and how big the image is

use super::types::{GptError, BACK_MATTER_BLOCKS, FRONT_MATTER_BLOCKS, PARTITION_TABLE_BLOCKS};
use crate::disk::geometry::{bytes_to_lba, checked_next_aligned_lba};
use crate::disk::{ALIGNMENT_LBA, BLOCK_SIZE};

/// Block ranges of a two-partition image. Partition ends are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImagePlan {
    pub esp_start: u64,
    pub esp_end: u64,
    pub data_start: u64,
    pub data_end: u64,
    pub total_blocks: u64,
}

impl ImagePlan {
    /// Fits in a `u64` for every plan returned by [`layout_image`].
    pub const fn total_bytes(&self) -> u64 {
        self.total_blocks * BLOCK_SIZE as u64
    }

    pub const fn secondary_header_lba(&self) -> u64 {
        self.total_blocks - 1
    }

    pub const fn secondary_table_lba(&self) -> u64 {
        self.total_blocks - BACK_MATTER_BLOCKS
    }

    pub const fn first_usable_lba(&self) -> u64 {
        FRONT_MATTER_BLOCKS
    }

    pub const fn last_usable_lba(&self) -> u64 {
        self.total_blocks - FRONT_MATTER_BLOCKS
    }

    pub const fn esp_blocks(&self) -> u64 {
        self.esp_end - self.esp_start + 1
    }
}

/// Plan an image holding an ESP of `esp_bytes` and a data partition of
/// `data_bytes`, both starting on a 1 MiB boundary.
///
/// The data partition is rounded up past the next alignment boundary, and
/// the total adds two alignment units of slack so the secondary GPT sits a
/// fixed distance from the end regardless of partition sizes.
pub fn layout_image(esp_bytes: u64, data_bytes: u64) -> Result<ImagePlan, GptError> {
    if esp_bytes == 0 || data_bytes == 0 {
        return Err(GptError::EmptyPartition);
    }

    let esp_start = ALIGNMENT_LBA;
    let esp_span = bytes_to_lba(esp_bytes) - 1;
    let esp_end = esp_start
        .checked_add(esp_span)
        .ok_or(GptError::ImageTooLarge)?;

    let data_start = checked_next_aligned_lba(esp_end).ok_or(GptError::ImageTooLarge)?;
    let data_blocks = checked_next_aligned_lba(bytes_to_lba(data_bytes));
    let data_span = data_blocks.ok_or(GptError::ImageTooLarge)? - 1;
    let data_end = data_start
        .checked_add(data_span)
        .ok_or(GptError::ImageTooLarge)?;

    // every block of the image must also be addressable in bytes
    let total_blocks = [esp_span, data_span, 2 * ALIGNMENT_LBA, BACK_MATTER_BLOCKS]
        .into_iter()
        .try_fold(FRONT_MATTER_BLOCKS, u64::checked_add)
        .filter(|blocks| blocks.checked_mul(BLOCK_SIZE as u64).is_some())
        .ok_or(GptError::ImageTooLarge)?;

    let plan = ImagePlan {
        esp_start,
        esp_end,
        data_start,
        data_end,
        total_blocks,
    };

    tracing::debug!(
        esp_start = plan.esp_start,
        esp_end = plan.esp_end,
        data_start = plan.data_start,
        data_end = plan.data_end,
        total_blocks = plan.total_blocks,
        table_blocks = PARTITION_TABLE_BLOCKS,
        "image layout"
    );

    Ok(plan)
}
