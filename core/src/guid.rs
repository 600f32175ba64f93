//! Identifier (GUID) generation and well-known partition type GUIDs

use rand_core::RngCore;
use uguid::{guid, Guid};

/// EFI System Partition
pub const EFI_SYSTEM_PARTITION: Guid = guid!("c12a7328-f81f-11d2-ba4b-00a0c93ec93b");

/// Microsoft Basic Data, used for the FAT32 data partition
pub const BASIC_DATA_PARTITION: Guid = guid!("ebd0a0a2-b9e5-4433-87c0-68b6b72699c7");

/// Version nibble forced into every generated identifier (random, v4).
pub const GUID_VERSION: u8 = 4;

/// Generate a random version-4, RFC 4122 variant identifier.
///
/// The sixteen bytes are drawn in on-disk order, so byte 7 is the high byte
/// of time-high-and-version and byte 8 is clock-seq-high-and-reserved.
/// Uniqueness is not checked against anything already on disk.
pub fn new_guid<R: RngCore + ?Sized>(rng: &mut R) -> Guid {
    let mut bytes = [0u8; 16];
    rng.fill_bytes(&mut bytes);

    bytes[7] = (bytes[7] & 0x0F) | (GUID_VERSION << 4);
    bytes[8] = (bytes[8] & 0x3F) | 0x80;

    Guid::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// RngCore that returns the same byte forever
    struct Constant(u8);

    impl RngCore for Constant {
        fn next_u32(&mut self) -> u32 {
            u32::from_ne_bytes([self.0; 4])
        }

        fn next_u64(&mut self) -> u64 {
            u64::from_ne_bytes([self.0; 8])
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(self.0);
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    #[test]
    fn test_version_and_variant_forced() {
        let mut rng = StdRng::seed_from_u64(0x5EED);
        for _ in 0..1000 {
            let bytes = new_guid(&mut rng).to_bytes();
            assert_eq!(bytes[7] >> 4, GUID_VERSION);
            assert_eq!(bytes[8] & 0xC0, 0x80);
        }
    }

    #[test]
    fn test_forcing_overrides_all_ones() {
        let bytes = new_guid(&mut Constant(0xFF)).to_bytes();
        assert_eq!(bytes[7], 0x4F);
        assert_eq!(bytes[8], 0xBF);
        assert_eq!(bytes[0], 0xFF);
        assert_eq!(bytes[15], 0xFF);
    }

    #[test]
    fn test_zero_source_is_not_nil() {
        let guid = new_guid(&mut Constant(0));
        assert_ne!(guid, Guid::ZERO);
        let bytes = guid.to_bytes();
        assert_eq!(bytes[7], 0x40);
        assert_eq!(bytes[8], 0x80);
    }

    #[test]
    fn test_same_seed_same_identifier() {
        let a = new_guid(&mut StdRng::seed_from_u64(42));
        let b = new_guid(&mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_consecutive_identifiers_differ() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_ne!(new_guid(&mut rng), new_guid(&mut rng));
    }

    #[test]
    fn test_esp_type_on_disk_order() {
        assert_eq!(
            EFI_SYSTEM_PARTITION.to_bytes(),
            [
                0x28, 0x73, 0x2A, 0xC1, 0x1F, 0xF8, 0xD2, 0x11, 0xBA, 0x4B, 0x00, 0xA0, 0xC9, 0x3E,
                0xC9, 0x3B,
            ]
        );
    }

    #[test]
    fn test_basic_data_type_on_disk_order() {
        assert_eq!(
            BASIC_DATA_PARTITION.to_bytes(),
            [
                0xA2, 0xA0, 0xD0, 0xEB, 0xE5, 0xB9, 0x33, 0x44, 0x87, 0xC0, 0x68, 0xB6, 0xB7, 0x26,
                0x99, 0xC7,
            ]
        );
    }
}
