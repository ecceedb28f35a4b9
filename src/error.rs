use thiserror::Error;

/// Errors that can occur during EEPROM operations. Marked as non-exhaustive to allow for future
/// additions without breaking the API. At runtime a caller mostly has to care about `NotFound`
/// (format the device) and `FlashError`; the configuration errors are static.
#[derive(Error, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// At least two regions are required so that a write always has a destination while the
    /// current chunk stays readable.
    #[error("too few regions")]
    TooFewRegions,

    /// The chunk size has to be larger than the chunk header and a multiple of the 8 byte window.
    #[error("invalid chunk size")]
    InvalidChunkSize,

    /// A region has to be aligned to the erase size of the flash, hold a whole number of chunks
    /// and lie within the flash capacity.
    #[error("invalid region")]
    InvalidRegion,

    /// The read or write granularity of the flash does not divide the 8 byte window.
    #[error("unsupported flash geometry")]
    UnsupportedFlash,

    /// `read`, `write` and `vwrite` require a successful `mount` first.
    #[error("not mounted")]
    NotMounted,

    /// The requested range does not fit into the EEPROM.
    #[error("out of range")]
    OutOfRange,

    /// The internal error value is returned from the provided `&mut impl NorFlash`
    #[error("internal flash error")]
    FlashError,

    /// No chunk with a valid marker was found. The flash is most likely unformatted.
    #[error("no chunk found")]
    NotFound,

    /// The chunk with the latest revision failed checksum verification. Older chunks are not
    /// considered.
    #[error("latest chunk is corrupt")]
    CorruptLatest,
}
