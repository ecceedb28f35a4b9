#![doc = include_str ! ("../README.md")]
#![cfg_attr(not(any(test, target_arch = "x86_64")), no_std)]

mod checksum;
pub mod error;
mod internal;
pub mod platform;
mod raw;
mod revision;
pub mod shared;

pub use checksum::ChecksumKind;
pub use revision::Revision;
pub use shared::SharedEeprom;

extern crate alloc;

use crate::error::Error;
use crate::platform::Platform;
use crate::raw::{HEADER_SIZE, WINDOW_SIZE};
use alloc::vec::Vec;
#[cfg(feature = "defmt")]
use defmt::trace;

/// One independently erasable block of flash. It is split into `size / chunk_size` chunk slots.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Region {
    pub address: usize,
    pub size: usize,
}

impl Region {
    pub const fn new(address: usize, size: usize) -> Self {
        Self { address, size }
    }

    pub(crate) const fn end(&self) -> usize {
        self.address + self.size
    }

    fn overlaps(&self, other: &Region) -> bool {
        self.address < other.end() && other.address < self.end()
    }
}

/// How long running loops hand control back to other tasks.
#[derive(Debug, Default, Copy, Clone)]
pub enum Scheduling {
    /// Nothing to do, the scheduler interrupts us when it has to.
    #[default]
    Preemptive,
    /// The hook is called between every window of a checksum, compare or copy loop and between
    /// slots of the mount scan. Any lock around the driver stays held while it runs.
    Cooperative(fn()),
}

impl Scheduling {
    #[inline(always)]
    pub(crate) fn yield_now(&self) {
        if let Scheduling::Cooperative(hook) = self {
            hook()
        }
    }
}

/// Driver options, resolved once in [`Eeprom::new`].
#[derive(Debug, Copy, Clone)]
pub struct Config {
    pub checksum: ChecksumKind,
    /// Skip writes that would not change the content. Saves an erase/write cycle and keeps the
    /// revision as is.
    pub skip_identical: bool,
    pub scheduling: Scheduling,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            checksum: ChecksumKind::Crc32,
            skip_identical: true,
            scheduling: Scheduling::Preemptive,
        }
    }
}

/// The chunk holding the visible EEPROM content.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CurrentChunk {
    /// Index into the configured region list
    pub region: usize,
    /// Absolute flash address of the chunk header
    pub address: usize,
    pub revision: Revision,
}

#[derive(strum::Display, Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChunkState {
    /// Every byte, header included, reads as erased flash.
    Blank,
    /// Valid marker and matching checksum.
    Committed,
    /// Anything else: an interrupted write, a corrupted payload or foreign data.
    Uncommitted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EepromStatistics {
    pub regions: Vec<RegionStatistics>,
    pub overall: RegionStatistics,
}

#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct RegionStatistics {
    pub blank: u32,
    pub committed: u32,
    pub uncommitted: u32,
}

impl RegionStatistics {
    fn count(&mut self, state: ChunkState) {
        match state {
            ChunkState::Blank => self.blank += 1,
            ChunkState::Committed => self.committed += 1,
            ChunkState::Uncommitted => self.uncommitted += 1,
        }
    }
}

/// EEPROM emulation on top of two or more flash regions.
///
/// Every write produces a new chunk (header + full payload copy) in the next free slot, so the
/// previous content stays readable until the new chunk is committed by its header. The in-memory
/// state is only the location of the current chunk.
pub struct Eeprom<T: Platform> {
    pub(crate) hal: T,
    pub(crate) regions: Vec<Region>,
    pub(crate) chunk_size: usize,
    pub(crate) eeprom_size: usize,
    pub(crate) config: Config,

    // set after calling self.mount
    pub(crate) current: Option<CurrentChunk>,
}

impl<T: Platform> Eeprom<T> {
    /// Validates the layout and creates an unmounted driver. Does not touch the flash.
    ///
    /// * at least two regions, not overlapping each other
    /// * every region aligned to `T::ERASE_SIZE`, holding a whole number of chunks
    /// * `chunk_size` larger than the 8 byte header and a multiple of 8
    pub fn new(regions: &[Region], chunk_size: usize, hal: T, config: Config) -> Result<Self, Error> {
        if regions.len() < 2 {
            return Err(Error::TooFewRegions);
        }

        if chunk_size <= HEADER_SIZE || !chunk_size.is_multiple_of(WINDOW_SIZE) {
            return Err(Error::InvalidChunkSize);
        }

        if !WINDOW_SIZE.is_multiple_of(T::READ_SIZE) || !WINDOW_SIZE.is_multiple_of(T::WRITE_SIZE) {
            return Err(Error::UnsupportedFlash);
        }

        let capacity = hal.capacity();
        for (index, region) in regions.iter().enumerate() {
            let fits = region
                .address
                .checked_add(region.size)
                .is_some_and(|end| end <= capacity);

            if region.size == 0
                || !fits
                || !region.address.is_multiple_of(T::ERASE_SIZE)
                || !region.size.is_multiple_of(T::ERASE_SIZE)
                || !region.size.is_multiple_of(chunk_size)
            {
                return Err(Error::InvalidRegion);
            }

            if regions[..index].iter().any(|other| other.overlaps(region)) {
                return Err(Error::InvalidRegion);
            }
        }

        Ok(Self {
            hal,
            regions: regions.to_vec(),
            chunk_size,
            eeprom_size: chunk_size - HEADER_SIZE,
            config,
            current: None,
        })
    }

    /// Erases all regions and writes an empty chunk with revision 0 to the first slot of the first
    /// region. The driver is unmounted afterwards.
    pub fn format(&mut self) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("format");

        self.current = None;
        self.format_regions()
    }

    /// Scans all chunk headers and adopts the one with the latest revision. Only that chunk's
    /// checksum is verified; if it is corrupt the mount fails instead of falling back to an
    /// older revision.
    pub fn mount(&mut self) -> Result<CurrentChunk, Error> {
        self.current = None;
        let chunk = self.scan()?;
        self.current = Some(chunk);
        Ok(chunk)
    }

    /// Read `buf.len()` bytes starting at `offset`. Every call goes to the flash.
    pub fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<usize, Error> {
        self.read_inner(offset, buf)
    }

    /// Write `data` at `offset`. See [`Eeprom::vwrite`].
    pub fn write(&mut self, offset: usize, data: &[u8]) -> Result<usize, Error> {
        self.vwrite(&[(offset, data)])
    }

    /// Write several `(offset, data)` segments as one update: either all of them become visible
    /// or, after a failure or power loss, none.
    ///
    /// Returns the number of bytes written, which is the sum of all segment lengths.
    pub fn vwrite(&mut self, segments: &[(usize, &[u8])]) -> Result<usize, Error> {
        self.vwrite_inner(segments)
    }

    /// Classifies every chunk slot of every region. Works on an unmounted driver too.
    pub fn statistics(&mut self) -> Result<EepromStatistics, Error> {
        let mut overall = RegionStatistics::default();
        let mut per_region = Vec::with_capacity(self.regions.len());

        for index in 0..self.regions.len() {
            let region = self.regions[index];
            let mut stats = RegionStatistics::default();
            for address in (region.address..region.end()).step_by(self.chunk_size) {
                let state = self.chunk_state(address)?;
                stats.count(state);
                overall.count(state);
            }
            per_region.push(stats);
        }

        Ok(EepromStatistics {
            regions: per_region,
            overall,
        })
    }

    /// Usable size in bytes, `chunk_size - 8`.
    pub fn eeprom_size(&self) -> usize {
        self.eeprom_size
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn current(&self) -> Option<CurrentChunk> {
        self.current
    }

    pub fn is_mounted(&self) -> bool {
        self.current.is_some()
    }
}
