#![allow(dead_code)]

// filename according to https://doc.rust-lang.org/book/ch11-03-test-organization.html
use embedded_storage::nor_flash::{
    ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};
use soft_eeprom::platform::Crc;
use soft_eeprom::{ChecksumKind, Config, Eeprom, Region};

pub const SECTOR_SIZE: usize = 256;
pub const WORD_SIZE: usize = 4;
pub const CHUNK_SIZE: usize = 64;
pub const HEADER_SIZE: usize = 8;
pub const EEPROM_SIZE: usize = CHUNK_SIZE - HEADER_SIZE;
pub const CHUNKS_PER_REGION: usize = SECTOR_SIZE / CHUNK_SIZE;
pub const VALID_PATTERN: u16 = 0xA5C3;

#[derive(Default)]
pub struct Flash {
    pub buf: Vec<u8>,
    pub fail_after_operation: usize,
    pub operations: Vec<Operation>,
    /// Reads starting at one of these addresses fail, independent of `fail_after_operation`
    pub failing_reads: Vec<u32>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Operation {
    Read { offset: u32, len: usize },
    Write { offset: u32, len: usize },
    Erase { offset: u32, len: usize },
}

impl Flash {
    pub fn new(sectors: usize) -> Self {
        Self {
            buf: vec![0xffu8; SECTOR_SIZE * sectors],
            fail_after_operation: usize::MAX,
            ..Default::default()
        }
    }

    /// The next `operations` flash calls succeed, everything after fails.
    pub fn fail_after(&mut self, operations: usize) {
        self.fail_after_operation = self.operations.len() + operations;
    }

    pub fn disable_faults(&mut self) {
        self.fail_after_operation = usize::MAX;
        self.failing_reads.clear();
    }

    /// Every read starting at `offset` fails from now on, all other calls go through.
    pub fn fail_reads_at(&mut self, offset: usize) {
        self.failing_reads.push(offset as u32);
    }

    pub fn erases(&self) -> Vec<u32> {
        self.operations
            .iter()
            .filter_map(|op| match op {
                Operation::Erase { offset, .. } => Some(*offset),
                _ => None,
            })
            .collect()
    }

    pub fn writes(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Write { .. }))
            .count()
    }

    /// Places a committed chunk at `address` without going through the driver.
    pub fn put_chunk(&mut self, address: usize, revision: u16, payload: &[u8], kind: ChecksumKind) {
        assert_eq!(payload.len(), EEPROM_SIZE);
        let checksum = match kind {
            ChecksumKind::Crc32 => Flash::crc32(0, payload),
            ChecksumKind::CrcCcitt => crc_ccitt(payload) as u32,
        };
        self.buf[address..address + 4].copy_from_slice(&checksum.to_le_bytes());
        self.buf[address + 4..address + 6].copy_from_slice(&revision.to_le_bytes());
        self.buf[address + 6..address + 8].copy_from_slice(&VALID_PATTERN.to_le_bytes());
        self.buf[address + HEADER_SIZE..address + CHUNK_SIZE].copy_from_slice(payload);
    }
}

#[derive(Debug)]
pub struct FlashError;

impl NorFlashError for FlashError {
    fn kind(&self) -> NorFlashErrorKind {
        NorFlashErrorKind::Other
    }
}

impl ErrorType for Flash {
    type Error = FlashError;
}

impl ReadNorFlash for Flash {
    const READ_SIZE: usize = WORD_SIZE;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        assert!(offset.is_multiple_of(Self::READ_SIZE as _));
        assert!(bytes.len().is_multiple_of(Self::READ_SIZE));

        if self.operations.len() >= self.fail_after_operation
            || self.failing_reads.contains(&offset)
        {
            return Err(FlashError);
        }
        self.operations.push(Operation::Read {
            offset,
            len: bytes.len(),
        });

        let offset = offset as usize;
        bytes.copy_from_slice(&self.buf[offset..offset + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }
}

impl NorFlash for Flash {
    const WRITE_SIZE: usize = WORD_SIZE;

    const ERASE_SIZE: usize = SECTOR_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        assert!(from.is_multiple_of(Self::ERASE_SIZE as _));
        assert!(to.is_multiple_of(Self::ERASE_SIZE as _));
        assert!(from < to);

        if self.operations.len() >= self.fail_after_operation {
            return Err(FlashError);
        }

        self.operations.push(Operation::Erase {
            offset: from,
            len: (to - from) as usize,
        });

        for addr in from..to {
            self.buf[addr as usize] = 0xff;
        }
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        assert!(offset.is_multiple_of(Self::WRITE_SIZE as _));
        assert!(bytes.len().is_multiple_of(Self::WRITE_SIZE));
        assert!(!bytes.is_empty());

        if self.operations.len() >= self.fail_after_operation {
            return Err(FlashError);
        }

        self.operations.push(Operation::Write {
            offset,
            len: bytes.len(),
        });

        let offset = offset as usize;
        for (i, &val) in bytes.iter().enumerate() {
            // NOR flash can only flip bits from 1 to 0
            self.buf[offset + i] &= val;
        }
        Ok(())
    }
}

impl Crc for Flash {
    fn crc32(init: u32, data: &[u8]) -> u32 {
        unsafe { libz_sys::crc32(init as _, data.as_ptr(), data.len() as _) as u32 }
    }
}

/// Reference CRC-CCITT (0xFFFF start, no final xor) the stored checksums are compared against.
pub fn crc_ccitt(data: &[u8]) -> u16 {
    crc::Crc::<u16>::new(&crc::CRC_16_IBM_3740).checksum(data)
}

pub fn regions(count: usize) -> Vec<Region> {
    (0..count)
        .map(|i| Region::new(i * SECTOR_SIZE, SECTOR_SIZE))
        .collect()
}

/// Formatted and mounted driver over `sectors` regions of one sector each.
pub fn mounted(flash: &mut Flash, sectors: usize, config: Config) -> Eeprom<&mut Flash> {
    let mut eeprom = Eeprom::new(&regions(sectors), CHUNK_SIZE, flash, config).unwrap();
    eeprom.format().unwrap();
    eeprom.mount().unwrap();
    eeprom
}

/// Fresh driver over the same flash, as after a reboot.
pub fn remount(flash: &mut Flash, sectors: usize, config: Config) -> Eeprom<&mut Flash> {
    let mut eeprom = Eeprom::new(&regions(sectors), CHUNK_SIZE, flash, config).unwrap();
    eeprom.mount().unwrap();
    eeprom
}
