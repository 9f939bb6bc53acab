//! Bit extraction from entropy-coded segments.
//!
//! A [`BitReader`] is a working copy of the decoder's committed bit state.
//! It reads ahead in the [`ByteSource`] without consuming anything; only
//! [`BitReader::save`] consumes the bytes it actually used. Dropping a
//! reader without saving rolls the attempt back.

use crate::byte_io::ByteSource;
use crate::constants::HUFF_LOOKAHEAD;
use crate::error::JpegWarning;
use crate::jpeg1::huffman::DecodeTable;
use crate::tracing_wrappers::*;

/// Bits the reader tries to hold after every fill. Any single request is
/// at most 16 bits, so one fill normally serves several symbols.
const MIN_GET_BITS: u32 = u64::BITS - 7;

/// Committed bit-buffer state. The buffer holds `bits_left` valid bits in
/// its low end, oldest bit first.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct BitState {
    pub buffer: u64,
    pub bits_left: u32,
}

impl BitState {
    /// Drops all buffered bits, counting whole bytes as discarded.
    pub fn discard(&mut self, segment: &mut SegmentState) {
        segment.discarded_bytes += (self.bits_left / 8) as usize;
        self.bits_left = 0;
    }
}

/// State of the current entropy-coded segment that is not rolled back on
/// suspension: once a marker has been read no further bytes are fetched,
/// so nothing read after it can need a retry.
#[derive(Debug, Default)]
pub(crate) struct SegmentState {
    /// Marker code read from the stream but not yet acted on, 0 if none.
    pub unread_marker: u8,
    /// Set once the segment ran out of data; further MCUs decode as zero.
    pub insufficient_data: bool,
    /// Bytes skipped while searching for the next marker.
    pub discarded_bytes: usize,
    pub warnings: Vec<JpegWarning>,
}

impl SegmentState {
    pub fn warn(&mut self, warning: JpegWarning) {
        warn!("{warning}");
        self.warnings.push(warning);
    }
}

pub(crate) struct BitReader<'a, S: ByteSource + ?Sized> {
    source: &'a mut S,
    segment: &'a mut SegmentState,
    /// Bytes of `source` read so far by this attempt.
    offset: usize,
    buffer: u64,
    bits_left: u32,
    /// Warnings of this attempt, reported only when it is committed.
    warnings: Vec<JpegWarning>,
}

impl<'a, S: ByteSource + ?Sized> BitReader<'a, S> {
    pub fn load(source: &'a mut S, segment: &'a mut SegmentState, state: BitState) -> Self {
        Self {
            source,
            segment,
            offset: 0,
            buffer: state.buffer,
            bits_left: state.bits_left,
            warnings: Vec::new(),
        }
    }

    /// Commits the attempt: consumes the bytes read, reports its warnings
    /// and returns the new bit state.
    pub fn save(self) -> BitState {
        self.source.consume(self.offset);
        for warning in self.warnings {
            self.segment.warn(warning);
        }
        BitState {
            buffer: self.buffer,
            bits_left: self.bits_left,
        }
    }

    /// Queues a warning until the attempt is committed, so a retried MCU
    /// reports it once.
    pub fn warn(&mut self, warning: JpegWarning) {
        self.warnings.push(warning);
    }

    fn next_byte(&mut self) -> Option<u8> {
        if self.offset >= self.source.bytes().len() && !self.source.fill() {
            return None;
        }
        let byte = *self.source.bytes().get(self.offset)?;
        self.offset += 1;
        Some(byte)
    }

    /// Loads bytes until at least `MIN_GET_BITS` bits are buffered.
    ///
    /// Returns false only if fewer than `nbits` bits are available and the
    /// source has nothing more right now. Stops at a marker; if the marker
    /// leaves fewer than `nbits` bits, pads with zeros and flags the segment
    /// as out of data.
    pub fn fill(&mut self, nbits: u32) -> bool {
        if self.segment.unread_marker == 0 {
            while self.bits_left < MIN_GET_BITS {
                let start = self.offset;
                let Some(mut c) = self.next_byte() else {
                    return self.bits_left >= nbits;
                };
                if c == 0xFF {
                    // Fill bytes may precede a marker; FF..FF 00 is one data byte.
                    loop {
                        match self.next_byte() {
                            Some(0xFF) => continue,
                            Some(next) => {
                                c = next;
                                break;
                            }
                            None => {
                                self.offset = start;
                                return self.bits_left >= nbits;
                            }
                        }
                    }
                    if c == 0 {
                        c = 0xFF;
                    } else {
                        trace!(marker = c, "entropy data ends at marker");
                        self.segment.unread_marker = c;
                        break;
                    }
                }
                self.buffer = (self.buffer << 8) | c as u64;
                self.bits_left += 8;
            }
            if self.segment.unread_marker == 0 {
                return true;
            }
        }

        if nbits > self.bits_left {
            if !self.segment.insufficient_data {
                self.segment.warn(JpegWarning::HitMarker);
                self.segment.insufficient_data = true;
            }
            self.buffer <<= MIN_GET_BITS - self.bits_left;
            self.bits_left = MIN_GET_BITS;
        }
        true
    }

    /// Makes sure `nbits` bits are buffered.
    #[inline]
    pub fn ensure(&mut self, nbits: u32) -> bool {
        self.bits_left >= nbits || self.fill(nbits)
    }

    #[inline]
    pub fn peek_bits(&self, nbits: u32) -> u32 {
        ((self.buffer >> (self.bits_left - nbits)) & ((1u64 << nbits) - 1)) as u32
    }

    #[inline]
    pub fn drop_bits(&mut self, nbits: u32) {
        self.bits_left -= nbits;
    }

    /// Takes `nbits` buffered bits; `ensure` must have succeeded first.
    #[inline]
    pub fn get_bits(&mut self, nbits: u32) -> u32 {
        let bits = self.peek_bits(nbits);
        self.bits_left -= nbits;
        bits
    }

    /// Decodes one Huffman symbol. Returns `None` on suspension.
    pub fn decode(&mut self, table: &DecodeTable) -> Option<u8> {
        if self.bits_left < HUFF_LOOKAHEAD {
            if !self.fill(0) {
                return None;
            }
            if self.bits_left < HUFF_LOOKAHEAD {
                return self.decode_slow(table, 1);
            }
        }
        let look = self.peek_bits(HUFF_LOOKAHEAD) as usize;
        let nbits = table.look_nbits[look];
        if nbits != 0 {
            self.drop_bits(nbits as u32);
            Some(table.look_sym[look])
        } else {
            self.decode_slow(table, HUFF_LOOKAHEAD + 1)
        }
    }

    /// Bit-serial decode for codes longer than the lookahead window.
    fn decode_slow(&mut self, table: &DecodeTable, min_bits: u32) -> Option<u8> {
        let mut l = min_bits as usize;
        if !self.ensure(l as u32) {
            return None;
        }
        let mut code = self.get_bits(l as u32) as i32;
        while code > table.maxcode[l] {
            code <<= 1;
            if !self.ensure(1) {
                return None;
            }
            code |= self.get_bits(1) as i32;
            l += 1;
        }
        if l > 16 {
            self.warn(JpegWarning::BadHuffmanCode);
            return Some(0);
        }
        Some(table.huffval[(code + table.valoffset[l]) as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::byte_io::{SliceSource, StreamingSource};
    use crate::jpeg1::huffman::HuffmanTable;

    #[test]
    fn reads_bits_msb_first() {
        let data = [0b1010_1100, 0b0101_0011];
        let mut source = SliceSource::new(&data);
        let mut segment = SegmentState::default();
        let mut bits = BitReader::load(&mut source, &mut segment, BitState::default());
        assert!(bits.ensure(12));
        assert_eq!(bits.get_bits(3), 0b101);
        assert_eq!(bits.get_bits(5), 0b01100);
        assert_eq!(bits.get_bits(4), 0b0101);
    }

    #[test]
    fn unstuffs_ff00_and_stops_at_marker() {
        let data = [0xFF, 0x00, 0x12, 0xFF, 0xFF, 0xD0, 0x34];
        let mut source = SliceSource::new(&data);
        let mut segment = SegmentState::default();
        let mut bits = BitReader::load(&mut source, &mut segment, BitState::default());
        assert!(bits.ensure(16));
        assert_eq!(bits.get_bits(8), 0xFF);
        assert_eq!(bits.get_bits(8), 0x12);
        let state = bits.save();
        assert_eq!(segment.unread_marker, 0xD0);
        assert!(!segment.insufficient_data);
        assert_eq!(state.bits_left, 0);
        assert_eq!(source.bytes(), &[0x34]);
    }

    #[test]
    fn pads_with_zeros_after_marker() {
        let data = [0xAB, 0xFF, 0xD9];
        let mut source = SliceSource::new(&data);
        let mut segment = SegmentState::default();
        let mut bits = BitReader::load(&mut source, &mut segment, BitState::default());
        assert!(bits.ensure(16));
        assert_eq!(bits.get_bits(16), 0xAB00);
        assert!(bits.ensure(16));
        assert_eq!(bits.get_bits(16), 0);
        drop(bits);
        assert!(segment.insufficient_data);
        assert_eq!(segment.warnings, vec![JpegWarning::HitMarker]);
    }

    #[test]
    fn suspends_without_data_and_keeps_partial_ff() {
        let mut source = StreamingSource::new();
        source.push_data(&[0x5A, 0xFF]);
        let mut segment = SegmentState::default();
        let mut bits = BitReader::load(&mut source, &mut segment, BitState::default());
        assert!(bits.ensure(8));
        assert!(!bits.ensure(9));
        assert_eq!(bits.get_bits(8), 0x5A);
        let _ = bits.save();
        // The lone 0xFF stays buffered until its successor arrives.
        assert_eq!(source.bytes(), &[0xFF]);
    }

    #[test]
    fn decodes_through_lookahead_and_slow_path() {
        // Sixteen codes of length 9 push every code past the lookahead window.
        let mut lengths = [0u8; 16];
        lengths[0] = 1;
        lengths[8] = 16;
        let values: Vec<u8> = (0..17).collect();
        let table = DecodeTable::build(&HuffmanTable::new(lengths, &values), false).unwrap();
        // "0" is symbol 0, then the first length-9 code 1_0000_0000 is symbol 1.
        let data = [0b0100_0000, 0b0000_0000];
        let mut source = SliceSource::new(&data);
        let mut segment = SegmentState::default();
        let mut bits = BitReader::load(&mut source, &mut segment, BitState::default());
        assert_eq!(bits.decode(&table), Some(0));
        assert_eq!(bits.decode(&table), Some(1));
    }

    #[test]
    fn overlong_code_yields_zero_with_warning() {
        let table = DecodeTable::build(&HuffmanTable::standard_luminance_dc(), true).unwrap();
        let data = [0xFF, 0x00, 0xFF, 0x00, 0xFF, 0x00];
        let mut source = SliceSource::new(&data);
        let mut segment = SegmentState::default();
        let mut bits = BitReader::load(&mut source, &mut segment, BitState::default());
        assert_eq!(bits.decode(&table), Some(0));
        bits.save();
        assert_eq!(segment.warnings, vec![JpegWarning::BadHuffmanCode]);
    }

    #[test]
    fn abandoned_attempt_reports_no_warnings() {
        let table = DecodeTable::build(&HuffmanTable::standard_luminance_dc(), true).unwrap();
        let mut source = StreamingSource::new();
        source.push_data(&[0xFF, 0x00, 0xFF, 0x00, 0xFF, 0x00]);
        let mut segment = SegmentState::default();
        let mut bits = BitReader::load(&mut source, &mut segment, BitState::default());
        assert_eq!(bits.decode(&table), Some(0));
        // Suspends: the source holds nothing more.
        assert_eq!(bits.decode(&table), None);
        drop(bits);
        assert!(segment.warnings.is_empty());
    }
}
