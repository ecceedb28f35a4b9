use crate::platform::Crc;

/// Checksum algorithm protecting a chunk payload. Chosen once when the driver is created; a flash
/// image written with one kind does not mount with the other.
#[derive(strum::Display, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChecksumKind {
    /// 32-bit CRC, starting at 0
    #[default]
    Crc32,
    /// 16-bit CCITT CRC, starting at 0xFFFF. Stored zero-extended in the 32-bit header field.
    CrcCcitt,
}

/// Running checksum over a payload that is fed window by window.
pub(crate) enum Checksum {
    Crc32(u32),
    CrcCcitt(u16),
}

impl Checksum {
    pub(crate) fn new(kind: ChecksumKind) -> Self {
        match kind {
            ChecksumKind::Crc32 => Checksum::Crc32(0),
            ChecksumKind::CrcCcitt => Checksum::CrcCcitt(0xFFFF),
        }
    }

    pub(crate) fn update<C: Crc>(&mut self, data: &[u8]) {
        match self {
            Checksum::Crc32(crc) => *crc = C::crc32(*crc, data),
            Checksum::CrcCcitt(crc) => *crc = C::crc_ccitt(*crc, data),
        }
    }

    pub(crate) fn finish(self) -> u32 {
        match self {
            Checksum::Crc32(crc) => crc,
            Checksum::CrcCcitt(crc) => crc as u32,
        }
    }
}
