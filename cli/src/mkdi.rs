use std::fs::OpenOptions;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use diskforge_core::{create_image, layout_image, verify_gpt, ImagePlan};
use gpt_disk_io::BlockIoAdapter;
use gpt_disk_types::BlockSize;

use crate::identifier_rng;

/// EFI System Partition size
pub const ESP_BYTES: u64 = 100 * 1024 * 1024;
/// Data partition size
pub const DATA_BYTES: u64 = 360 * 1024 * 1024;

#[derive(Debug, Parser)]
#[command(
    name = "mkdi",
    version,
    about = "Create a disk image with a protective MBR, a GPT, an ESP and a data partition"
)]
pub struct MkdiArgs {
    /// Image file to create (truncated if it exists), or a block device
    pub output: PathBuf,

    /// Seed for disk and partition identifiers instead of the clock
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Create `args.output` and partition it, then read the tables back.
pub fn run(args: &MkdiArgs) -> Result<ImagePlan> {
    let plan = layout_image(ESP_BYTES, DATA_BYTES).map_err(|err| anyhow!("layout: {}", err))?;
    tracing::info!(
        path = %args.output.display(),
        total_blocks = plan.total_blocks,
        "creating image"
    );

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&args.output)
        .with_context(|| format!("failed to create {}", args.output.display()))?;
    // block devices keep their size; create_image rejects one that is too small
    let metadata = file
        .metadata()
        .with_context(|| format!("failed to stat {}", args.output.display()))?;
    if metadata.is_file() {
        file.set_len(plan.total_bytes())
            .with_context(|| format!("failed to size {}", args.output.display()))?;
    }

    let mut rng = identifier_rng(args.seed);
    let mut block_io = BlockIoAdapter::new(&mut file, BlockSize::BS_512);

    let header = create_image(&mut block_io, &plan, &mut rng)
        .map_err(|err| anyhow!("writing partition tables: {}", err))?;
    let summary =
        verify_gpt(&mut block_io).map_err(|err| anyhow!("partition table check: {}", err))?;

    if summary.disk_guid != header.disk_guid {
        return Err(anyhow!(
            "partition table check: read back disk identifier {} but wrote {}",
            summary.disk_guid,
            header.disk_guid
        ));
    }

    tracing::info!(
        disk_guid = %summary.disk_guid,
        esp_start = plan.esp_start,
        data_start = plan.data_start,
        "image ready"
    );
    Ok(plan)
}
