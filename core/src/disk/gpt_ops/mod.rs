mod create;
mod layout;
mod scan;
mod types;
mod verify;

pub use create::{
    build_entries, build_headers, create_image, write_gpt, write_protective_mbr, DATA_NAME,
    ESP_NAME,
};
pub use layout::{layout_image, ImagePlan};
pub use scan::{locate_partition, LocateError, LocateStage, LocatedPartition, MIN_PARTITION_LBA};
pub use types::{
    encode_partition_table, GptError, GptHeader, GptPartitionEntry, GptStage, HeaderCopy,
    GPT_HEADER_SIZE, GPT_REVISION, GPT_SIGNATURE, PARTITION_ENTRY_COUNT, PARTITION_ENTRY_SIZE,
    PARTITION_TABLE_BLOCKS, PARTITION_TABLE_BYTES,
};
pub use verify::{verify_gpt, GptSummary};
