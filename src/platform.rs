use embedded_storage::nor_flash::NorFlash;

/// See README.md for an example implementation.
pub trait Platform: Crc + NorFlash {}

impl<T: Crc + NorFlash> Platform for T {}

pub trait Crc {
    /// Standard (reflected, IEEE 802.3) CRC-32 continuing from `init`, with the same chaining
    /// semantics as zlib's `crc32`.
    fn crc32(init: u32, data: &[u8]) -> u32;

    /// CRC-CCITT (polynomial 0x1021, MSB first, no final xor) continuing from `init`.
    ///
    /// The default is the table driven software implementation of the `crc` crate, override it if
    /// the chip has a faster primitive.
    fn crc_ccitt(init: u16, data: &[u8]) -> u16 {
        let mut digest = CRC_CCITT.digest_with_initial(init);
        digest.update(data);
        digest.finalize()
    }
}

/// CRC-16/IBM-3740 is CCITT with the 0xFFFF start value; chaining works through the initial value.
static CRC_CCITT: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_IBM_3740);

impl<T: Crc> Crc for &mut T {
    fn crc32(init: u32, data: &[u8]) -> u32 {
        T::crc32(init, data)
    }

    fn crc_ccitt(init: u16, data: &[u8]) -> u16 {
        T::crc_ccitt(init, data)
    }
}

#[cfg(any(
    feature = "esp32",
    feature = "esp32s2",
    feature = "esp32s3",
    feature = "esp32c2",
    feature = "esp32c3",
    feature = "esp32c6",
    feature = "esp32h2",
))]
mod chip {
    use esp_storage::FlashStorage;

    use crate::platform::Crc;

    impl Crc for FlashStorage<'_> {
        fn crc32(init: u32, data: &[u8]) -> u32 {
            esp_hal::rom::crc::crc32_le(init, data)
        }
    }
}
