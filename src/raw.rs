use crate::revision::Revision;
use core::fmt::{Debug, Formatter};
use core::ops::Range;

/// Marks a committed header. Erased flash reads as 0xFFFF and can never match.
pub(crate) const VALID_PATTERN: u16 = 0xA5C3;
pub(crate) const HEADER_SIZE: usize = 8;
/// Granularity of every streaming loop (checksum, copy, compare, blank check).
pub(crate) const WINDOW_SIZE: usize = 8;
pub(crate) const ERASED_BYTE: u8 = 0xFF;

const _: () = assert!(
    HEADER_SIZE % WINDOW_SIZE == 0,
    "the payload has to start on a window boundary"
);

/// On-flash chunk header, little-endian and without padding:
///
/// | bytes | field    |
/// |-------|----------|
/// | 0..4  | checksum |
/// | 4..6  | revision |
/// | 6..8  | valid    |
#[derive(Copy, Clone, PartialEq, Eq)]
pub(crate) struct ChunkHeader {
    pub(crate) checksum: u32,
    pub(crate) revision: Revision,
    pub(crate) valid: u16,
}

impl ChunkHeader {
    pub(crate) fn new(checksum: u32, revision: Revision) -> Self {
        Self {
            checksum,
            revision,
            valid: VALID_PATTERN,
        }
    }

    pub(crate) fn from_bytes(raw: &[u8; HEADER_SIZE]) -> Self {
        Self {
            checksum: u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
            revision: Revision(u16::from_le_bytes([raw[4], raw[5]])),
            valid: u16::from_le_bytes([raw[6], raw[7]]),
        }
    }

    pub(crate) fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut raw = [0u8; HEADER_SIZE];
        raw[0..4].copy_from_slice(&self.checksum.to_le_bytes());
        raw[4..6].copy_from_slice(&self.revision.0.to_le_bytes());
        raw[6..8].copy_from_slice(&self.valid.to_le_bytes());
        raw
    }

    pub(crate) fn has_valid_marker(&self) -> bool {
        self.valid == VALID_PATTERN
    }
}

impl Debug for ChunkHeader {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        let checksum = self.checksum;
        let revision = self.revision.0;
        let valid = self.valid;
        f.write_fmt(format_args!(
            "ChunkHeader {{ checksum: 0x{checksum:0>8x}, revision: {revision:>5}, valid: 0x{valid:0>4x} }}"
        ))
    }
}

/// Intersection of two half-open ranges, `None` if they don't overlap.
pub(crate) fn overlap(a: &Range<usize>, b: &Range<usize>) -> Option<Range<usize>> {
    let start = a.start.max(b.start);
    let end = a.end.min(b.end);
    (start < end).then_some(start..end)
}

/// Copies the part of `segment` (placed at payload offset `destination`) that falls into the
/// window starting at payload offset `window_offset` over `window`.
pub(crate) fn splice(window: &mut [u8], window_offset: usize, destination: usize, segment: &[u8]) {
    let window_range = window_offset..window_offset + window.len();
    let segment_range = destination..destination + segment.len();
    if let Some(common) = overlap(&window_range, &segment_range) {
        window[common.start - window_offset..common.end - window_offset]
            .copy_from_slice(&segment[common.start - destination..common.end - destination]);
    }
}

/// All windows of the payload that intersect `range`, as window start offsets.
pub(crate) fn windows_covering(range: &Range<usize>) -> impl Iterator<Item = usize> + use<> {
    let first = range.start / WINDOW_SIZE * WINDOW_SIZE;
    let end = if range.is_empty() { first } else { range.end };
    (first..end).step_by(WINDOW_SIZE)
}
