//! Shared access to one [`Eeprom`] from several tasks or interrupt contexts.
//!
//! Every operation holds the mutex for its whole duration, including the flash scans and copies
//! and the cooperative yields in between. The yield hook therefore must not run code that uses
//! the same `SharedEeprom`, that would be a re-entrant borrow and panics.

use crate::error::Error;
use crate::platform::Platform;
use crate::{CurrentChunk, Eeprom, EepromStatistics, Region};
use alloc::vec::Vec;
use core::cell::RefCell;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;

/// [`Eeprom`] wrapped in a blocking mutex. Pick `CriticalSectionRawMutex` when the driver is
/// used from interrupts or other cores, `NoopRawMutex` for a single threaded executor.
pub struct SharedEeprom<M: RawMutex, T: Platform> {
    inner: Mutex<M, RefCell<Eeprom<T>>>,
}

impl<M: RawMutex, T: Platform> SharedEeprom<M, T> {
    pub fn new(eeprom: Eeprom<T>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(eeprom)),
        }
    }

    pub fn into_inner(self) -> Eeprom<T> {
        self.inner.into_inner().into_inner()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Eeprom<T>) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }

    pub fn format(&self) -> Result<(), Error> {
        self.with(|eeprom| eeprom.format())
    }

    pub fn mount(&self) -> Result<CurrentChunk, Error> {
        self.with(|eeprom| eeprom.mount())
    }

    pub fn read(&self, offset: usize, buf: &mut [u8]) -> Result<usize, Error> {
        self.with(|eeprom| eeprom.read(offset, buf))
    }

    pub fn write(&self, offset: usize, data: &[u8]) -> Result<usize, Error> {
        self.with(|eeprom| eeprom.write(offset, data))
    }

    pub fn vwrite(&self, segments: &[(usize, &[u8])]) -> Result<usize, Error> {
        self.with(|eeprom| eeprom.vwrite(segments))
    }

    pub fn statistics(&self) -> Result<EepromStatistics, Error> {
        self.with(|eeprom| eeprom.statistics())
    }

    pub fn current(&self) -> Option<CurrentChunk> {
        self.with(|eeprom| eeprom.current())
    }

    pub fn is_mounted(&self) -> bool {
        self.with(|eeprom| eeprom.is_mounted())
    }

    pub fn eeprom_size(&self) -> usize {
        self.with(|eeprom| eeprom.eeprom_size())
    }

    pub fn chunk_size(&self) -> usize {
        self.with(|eeprom| eeprom.chunk_size())
    }

    /// Copy of the configured regions, the lock can't be held past the call.
    pub fn regions(&self) -> Vec<Region> {
        self.with(|eeprom| eeprom.regions().to_vec())
    }
}
