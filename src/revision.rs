use core::fmt;

/// Wraparound write counter of a chunk.
///
/// Ordering only works within a window of 32768 revisions: a chunk that survives that many
/// later writes without its region being erased can be mistaken for a newer one.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Revision(pub u16);

const HALF_RANGE: u16 = 0x8000;

impl Revision {
    pub const fn is_later_than(self, other: Revision) -> bool {
        let (a, b) = (self.0, other.0);
        if a > b {
            a - b < HALF_RANGE
        } else {
            b - a >= HALF_RANGE
        }
    }

    pub const fn next(self) -> Revision {
        Revision(self.0.wrapping_add(1))
    }
}

impl From<u16> for Revision {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl From<Revision> for u16 {
    fn from(val: Revision) -> Self {
        val.0
    }
}

impl fmt::Debug for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Revision({})", self.0)
    }
}
