use crate::checksum::Checksum;
use crate::error::Error;
use crate::platform::Platform;
use crate::raw::{ChunkHeader, ERASED_BYTE, HEADER_SIZE, WINDOW_SIZE};
use crate::revision::Revision;
use crate::{ChunkState, CurrentChunk, Eeprom, raw};
use core::ops::Range;
#[cfg(feature = "defmt")]
use defmt::trace;
#[cfg(feature = "defmt")]
use defmt::warn;

impl<T: Platform> Eeprom<T> {
    pub(crate) fn read_inner(&mut self, offset: usize, buf: &mut [u8]) -> Result<usize, Error> {
        let current = self.current.ok_or(Error::NotMounted)?;
        let range = self.check_range(offset, buf.len())?;
        if buf.is_empty() {
            return Ok(0);
        }

        let address = current.address + HEADER_SIZE + offset;
        if address.is_multiple_of(T::READ_SIZE) && buf.len().is_multiple_of(T::READ_SIZE) {
            self.hal
                .read(address as _, buf)
                .map_err(|_| Error::FlashError)?;
            return Ok(buf.len());
        }

        // unaligned request, go through whole windows which are always aligned
        let mut window = [0u8; WINDOW_SIZE];
        for window_offset in raw::windows_covering(&range) {
            self.read_payload_window(current.address, window_offset, &mut window)?;
            let window_range = window_offset..window_offset + WINDOW_SIZE;
            if let Some(common) = raw::overlap(&window_range, &range) {
                buf[common.start - offset..common.end - offset].copy_from_slice(
                    &window[common.start - window_offset..common.end - window_offset],
                );
            }
        }

        Ok(buf.len())
    }

    pub(crate) fn vwrite_inner(&mut self, segments: &[(usize, &[u8])]) -> Result<usize, Error> {
        let current = self.current.ok_or(Error::NotMounted)?;

        let mut written = 0;
        for (offset, data) in segments {
            self.check_range(*offset, data.len())?;
            written += data.len();
        }

        if self.config.skip_identical && self.is_identical(&current, segments)? {
            #[cfg(feature = "debug-logs")]
            println!("internal: vwrite: identical data, nothing to do");

            return Ok(written);
        }

        let (region, chunk_address) = self.next_blank_chunk(&current)?;

        #[cfg(feature = "defmt")]
        trace!(
            "vwrite: @{:#08x} -> @{:#08x}",
            current.address, chunk_address
        );

        #[cfg(feature = "debug-logs")]
        println!(
            "internal: vwrite: 0x{:08x} -> 0x{chunk_address:08x}",
            current.address
        );

        let mut window = [0u8; WINDOW_SIZE];
        for offset in (0..self.eeprom_size).step_by(WINDOW_SIZE) {
            self.read_payload_window(current.address, offset, &mut window)?;

            for (destination, data) in segments {
                raw::splice(&mut window, offset, *destination, data);
            }

            // the new chunk is blank, erased windows don't need to be programmed
            if window.iter().any(|&byte| byte != ERASED_BYTE) {
                self.hal
                    .write((chunk_address + HEADER_SIZE + offset) as _, &window)
                    .map_err(|_| Error::FlashError)?;
            }

            self.config.scheduling.yield_now();
        }

        let revision = current.revision.next();
        self.write_header(chunk_address, revision)?;

        self.current = Some(CurrentChunk {
            region,
            address: chunk_address,
            revision,
        });

        Ok(written)
    }

    /// Finds the chunk with the latest revision among all chunks with a valid marker and
    /// verifies its checksum.
    pub(crate) fn scan(&mut self) -> Result<CurrentChunk, Error> {
        #[cfg(feature = "defmt")]
        trace!("scan");

        let mut latest: Option<(CurrentChunk, u32)> = None;

        for index in 0..self.regions.len() {
            let region = self.regions[index];
            for address in (region.address..region.end()).step_by(self.chunk_size) {
                let header = self.read_header(address);
                self.config.scheduling.yield_now();

                // unreadable slots are treated like any other malformed header
                let Ok(header) = header else {
                    continue;
                };
                if !header.has_valid_marker() {
                    continue;
                }

                #[cfg(feature = "debug-logs")]
                println!("  internal: scan: 0x{address:08x} {header:?}");

                let is_latest = match &latest {
                    None => true,
                    Some((chunk, _)) => header.revision.is_later_than(chunk.revision),
                };
                if is_latest {
                    let chunk = CurrentChunk {
                        region: index,
                        address,
                        revision: header.revision,
                    };
                    latest = Some((chunk, header.checksum));
                }
            }
        }

        let (chunk, checksum) = latest.ok_or(Error::NotFound)?;

        if self.chunk_checksum(chunk.address)? != checksum {
            #[cfg(feature = "defmt")]
            warn!(
                "scan: latest chunk @{:#08x} (revision {}) is corrupt",
                chunk.address, chunk.revision.0
            );
            return Err(Error::CorruptLatest);
        }

        Ok(chunk)
    }

    pub(crate) fn format_regions(&mut self) -> Result<(), Error> {
        for index in 0..self.regions.len() {
            self.erase_region(index)?;
        }

        let first = self.regions[0].address;
        self.write_header(first, Revision(0))
    }

    /// Picks the slot for the next chunk: the following slot of the current region if it is
    /// still blank, otherwise the first slot of the next region, which gets erased. The current
    /// chunk is never touched.
    pub(crate) fn next_blank_chunk(
        &mut self,
        current: &CurrentChunk,
    ) -> Result<(usize, usize), Error> {
        let region = self.regions[current.region];
        let next = current.address + self.chunk_size;

        if next < region.end() && self.is_blank_chunk(next)? {
            return Ok((current.region, next));
        }

        let index = (current.region + 1) % self.regions.len();
        self.erase_region(index)?;

        Ok((index, self.regions[index].address))
    }

    fn erase_region(&mut self, index: usize) -> Result<(), Error> {
        let region = self.regions[index];

        #[cfg(feature = "defmt")]
        trace!("erase_region: @{:#08x}[{}]", region.address, region.size);

        #[cfg(feature = "debug-logs")]
        println!("  internal: erase_region: 0x{:08x}", region.address);

        self.hal
            .erase(region.address as _, region.end() as _)
            .map_err(|_| Error::FlashError)
    }

    /// Commits a chunk. The payload has to be completely written already since the checksum is
    /// computed from what is in the flash.
    pub(crate) fn write_header(
        &mut self,
        chunk_address: usize,
        revision: Revision,
    ) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("write_header: @{:#08x} revision {}", chunk_address, revision.0);

        let checksum = self.chunk_checksum(chunk_address)?;
        let header = ChunkHeader::new(checksum, revision);

        #[cfg(feature = "debug-logs")]
        println!("internal: write_header: 0x{chunk_address:08x} {header:?}");

        self.hal
            .write(chunk_address as _, &header.to_bytes())
            .map_err(|_| Error::FlashError)
    }

    pub(crate) fn read_header(&mut self, chunk_address: usize) -> Result<ChunkHeader, Error> {
        let mut raw = [0u8; HEADER_SIZE];
        self.hal
            .read(chunk_address as _, &mut raw)
            .map_err(|_| Error::FlashError)?;
        Ok(ChunkHeader::from_bytes(&raw))
    }

    /// Checksum over the payload of the chunk, read window by window.
    pub(crate) fn chunk_checksum(&mut self, chunk_address: usize) -> Result<u32, Error> {
        let mut checksum = Checksum::new(self.config.checksum);
        let mut window = [0u8; WINDOW_SIZE];

        for offset in (0..self.eeprom_size).step_by(WINDOW_SIZE) {
            self.read_payload_window(chunk_address, offset, &mut window)?;
            checksum.update::<T>(&window);
            self.config.scheduling.yield_now();
        }

        Ok(checksum.finish())
    }

    pub(crate) fn is_valid_chunk(&mut self, chunk_address: usize) -> Result<bool, Error> {
        let header = self.read_header(chunk_address)?;
        if !header.has_valid_marker() {
            return Ok(false);
        }

        Ok(self.chunk_checksum(chunk_address)? == header.checksum)
    }

    pub(crate) fn is_blank_chunk(&mut self, chunk_address: usize) -> Result<bool, Error> {
        let mut window = [0u8; WINDOW_SIZE];

        for offset in (0..self.chunk_size).step_by(WINDOW_SIZE) {
            self.hal
                .read((chunk_address + offset) as _, &mut window)
                .map_err(|_| Error::FlashError)?;
            self.config.scheduling.yield_now();

            if window.iter().any(|&byte| byte != ERASED_BYTE) {
                return Ok(false);
            }
        }

        Ok(true)
    }

    pub(crate) fn chunk_state(&mut self, chunk_address: usize) -> Result<ChunkState, Error> {
        if self.is_blank_chunk(chunk_address)? {
            Ok(ChunkState::Blank)
        } else if self.is_valid_chunk(chunk_address)? {
            Ok(ChunkState::Committed)
        } else {
            Ok(ChunkState::Uncommitted)
        }
    }

    fn is_identical(
        &mut self,
        current: &CurrentChunk,
        segments: &[(usize, &[u8])],
    ) -> Result<bool, Error> {
        let mut window = [0u8; WINDOW_SIZE];

        for (destination, data) in segments {
            let range = *destination..destination + data.len();
            for window_offset in raw::windows_covering(&range) {
                self.read_payload_window(current.address, window_offset, &mut window)?;
                self.config.scheduling.yield_now();

                let window_range = window_offset..window_offset + WINDOW_SIZE;
                if let Some(common) = raw::overlap(&window_range, &range) {
                    let stored = &window[common.start - window_offset..common.end - window_offset];
                    if stored != &data[common.start - destination..common.end - destination] {
                        return Ok(false);
                    }
                }
            }
        }

        Ok(true)
    }

    fn read_payload_window(
        &mut self,
        chunk_address: usize,
        offset: usize,
        window: &mut [u8; WINDOW_SIZE],
    ) -> Result<(), Error> {
        self.hal
            .read((chunk_address + HEADER_SIZE + offset) as _, window)
            .map_err(|_| Error::FlashError)
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<Range<usize>, Error> {
        if offset >= self.eeprom_size {
            return Err(Error::OutOfRange);
        }

        match offset.checked_add(len) {
            Some(end) if end <= self.eeprom_size => Ok(offset..end),
            _ => Err(Error::OutOfRange),
        }
    }
}
