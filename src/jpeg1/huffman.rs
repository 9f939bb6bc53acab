//! Huffman tables for JPEG entropy coding (ISO/IEC 10918-1 Annex C, K.2, K.3).
//!
//! A [`HuffmanTable`] is the logical form carried by DHT markers: a count of
//! codes per length plus the symbols in code order. The coders work on
//! derived forms built once per scan: [`DecodeTable`] for the decoder and
//! [`EncodeTable`] for the encoder.

use crate::constants::{HUFF_LOOKAHEAD, NUM_HUFF_TBLS};
use crate::error::JpegError;

/// Longest code length the optimal-table builder tracks before limiting.
const MAX_CLEN: usize = 32;

/// Frequencies for the 256 symbols plus one reserved pseudo-symbol.
pub type SymbolFrequencies = [u64; 257];

/// Standard DC luminance code lengths (Table K.3).
pub const STD_LUMINANCE_DC_LENGTHS: [u8; 16] = [0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0];
pub const STD_LUMINANCE_DC_VALUES: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

/// Standard DC chrominance code lengths (Table K.4).
pub const STD_CHROMINANCE_DC_LENGTHS: [u8; 16] = [0, 3, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0];
pub const STD_CHROMINANCE_DC_VALUES: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

/// Standard AC luminance code lengths (Table K.5).
pub const STD_LUMINANCE_AC_LENGTHS: [u8; 16] = [0, 2, 1, 3, 3, 2, 4, 3, 5, 5, 4, 4, 0, 0, 1, 0x7d];
#[rustfmt::skip]
pub const STD_LUMINANCE_AC_VALUES: [u8; 162] = [
    0x01, 0x02, 0x03, 0x00, 0x04, 0x11, 0x05, 0x12,
    0x21, 0x31, 0x41, 0x06, 0x13, 0x51, 0x61, 0x07,
    0x22, 0x71, 0x14, 0x32, 0x81, 0x91, 0xa1, 0x08,
    0x23, 0x42, 0xb1, 0xc1, 0x15, 0x52, 0xd1, 0xf0,
    0x24, 0x33, 0x62, 0x72, 0x82, 0x09, 0x0a, 0x16,
    0x17, 0x18, 0x19, 0x1a, 0x25, 0x26, 0x27, 0x28,
    0x29, 0x2a, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39,
    0x3a, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49,
    0x4a, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59,
    0x5a, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68, 0x69,
    0x6a, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79,
    0x7a, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89,
    0x8a, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98,
    0x99, 0x9a, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa7,
    0xa8, 0xa9, 0xaa, 0xb2, 0xb3, 0xb4, 0xb5, 0xb6,
    0xb7, 0xb8, 0xb9, 0xba, 0xc2, 0xc3, 0xc4, 0xc5,
    0xc6, 0xc7, 0xc8, 0xc9, 0xca, 0xd2, 0xd3, 0xd4,
    0xd5, 0xd6, 0xd7, 0xd8, 0xd9, 0xda, 0xe1, 0xe2,
    0xe3, 0xe4, 0xe5, 0xe6, 0xe7, 0xe8, 0xe9, 0xea,
    0xf1, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8,
    0xf9, 0xfa,
];

/// Standard AC chrominance code lengths (Table K.6).
pub const STD_CHROMINANCE_AC_LENGTHS: [u8; 16] =
    [0, 2, 1, 2, 4, 4, 3, 4, 7, 5, 4, 4, 0, 1, 2, 0x77];
#[rustfmt::skip]
pub const STD_CHROMINANCE_AC_VALUES: [u8; 162] = [
    0x00, 0x01, 0x02, 0x03, 0x11, 0x04, 0x05, 0x21,
    0x31, 0x06, 0x12, 0x41, 0x51, 0x07, 0x61, 0x71,
    0x13, 0x22, 0x32, 0x81, 0x08, 0x14, 0x42, 0x91,
    0xa1, 0xb1, 0xc1, 0x09, 0x23, 0x33, 0x52, 0xf0,
    0x15, 0x62, 0x72, 0xd1, 0x0a, 0x16, 0x24, 0x34,
    0xe1, 0x25, 0xf1, 0x17, 0x18, 0x19, 0x1a, 0x26,
    0x27, 0x28, 0x29, 0x2a, 0x35, 0x36, 0x37, 0x38,
    0x39, 0x3a, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48,
    0x49, 0x4a, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58,
    0x59, 0x5a, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68,
    0x69, 0x6a, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78,
    0x79, 0x7a, 0x82, 0x83, 0x84, 0x85, 0x86, 0x87,
    0x88, 0x89, 0x8a, 0x92, 0x93, 0x94, 0x95, 0x96,
    0x97, 0x98, 0x99, 0x9a, 0xa2, 0xa3, 0xa4, 0xa5,
    0xa6, 0xa7, 0xa8, 0xa9, 0xaa, 0xb2, 0xb3, 0xb4,
    0xb5, 0xb6, 0xb7, 0xb8, 0xb9, 0xba, 0xc2, 0xc3,
    0xc4, 0xc5, 0xc6, 0xc7, 0xc8, 0xc9, 0xca, 0xd2,
    0xd3, 0xd4, 0xd5, 0xd6, 0xd7, 0xd8, 0xd9, 0xda,
    0xe2, 0xe3, 0xe4, 0xe5, 0xe6, 0xe7, 0xe8, 0xe9,
    0xea, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8,
    0xf9, 0xfa,
];

/// Logical Huffman table as defined by a DHT marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanTable {
    /// `lengths[i]` is the number of codes of length `i + 1`.
    pub lengths: [u8; 16],
    /// Symbols in order of increasing code length.
    pub values: Vec<u8>,
}

impl HuffmanTable {
    pub fn new(lengths: [u8; 16], values: &[u8]) -> Self {
        Self {
            lengths,
            values: values.to_vec(),
        }
    }

    pub fn standard_luminance_dc() -> Self {
        Self::new(STD_LUMINANCE_DC_LENGTHS, &STD_LUMINANCE_DC_VALUES)
    }

    pub fn standard_chrominance_dc() -> Self {
        Self::new(STD_CHROMINANCE_DC_LENGTHS, &STD_CHROMINANCE_DC_VALUES)
    }

    pub fn standard_luminance_ac() -> Self {
        Self::new(STD_LUMINANCE_AC_LENGTHS, &STD_LUMINANCE_AC_VALUES)
    }

    pub fn standard_chrominance_ac() -> Self {
        Self::new(STD_CHROMINANCE_AC_LENGTHS, &STD_CHROMINANCE_AC_VALUES)
    }

    pub fn symbol_count(&self) -> usize {
        self.lengths.iter().map(|&n| n as usize).sum()
    }

    /// Code length and canonical code of every symbol, in `values` order
    /// (Figures C.1 and C.2).
    fn canonical_codes(&self) -> Result<(Vec<u8>, Vec<u32>), JpegError> {
        let mut sizes = Vec::with_capacity(256);
        for (i, &count) in self.lengths.iter().enumerate() {
            if sizes.len() + count as usize > 256 {
                return Err(JpegError::BadHuffmanTable);
            }
            sizes.extend(std::iter::repeat_n((i + 1) as u8, count as usize));
        }
        if self.values.len() < sizes.len() {
            return Err(JpegError::BadHuffmanTable);
        }

        let mut codes = Vec::with_capacity(sizes.len());
        let mut code = 0u32;
        let mut p = 0;
        let mut si = sizes.first().copied().unwrap_or(0) as u32;
        while p < sizes.len() {
            while p < sizes.len() && sizes[p] as u32 == si {
                codes.push(code);
                code += 1;
                p += 1;
            }
            // No code may consist of all one bits.
            if code >= 1 << si {
                return Err(JpegError::BadHuffmanTable);
            }
            code <<= 1;
            si += 1;
        }
        Ok((sizes, codes))
    }
}

/// The DC and AC table slots visible to one scan.
#[derive(Debug, Clone, Default)]
pub struct HuffmanTables {
    pub dc: [Option<HuffmanTable>; NUM_HUFF_TBLS],
    pub ac: [Option<HuffmanTable>; NUM_HUFF_TBLS],
}

impl HuffmanTables {
    /// Standard tables: luminance in slot 0, chrominance in slot 1.
    pub fn standard() -> Self {
        let mut tables = Self::default();
        tables.dc[0] = Some(HuffmanTable::standard_luminance_dc());
        tables.dc[1] = Some(HuffmanTable::standard_chrominance_dc());
        tables.ac[0] = Some(HuffmanTable::standard_luminance_ac());
        tables.ac[1] = Some(HuffmanTable::standard_chrominance_ac());
        tables
    }

    pub(crate) fn get(&self, is_dc: bool, slot: usize) -> Result<&HuffmanTable, JpegError> {
        let slots = if is_dc { &self.dc } else { &self.ac };
        slots
            .get(slot)
            .and_then(Option::as_ref)
            .ok_or(JpegError::NoHuffmanTable)
    }
}

/// Decoder form of a Huffman table.
#[derive(Debug, Clone)]
pub struct DecodeTable {
    /// Largest code of each length, -1 if none. Entry 17 is a sentinel
    /// that stops the bit-serial walk on corrupt data.
    pub(crate) maxcode: [i32; 18],
    /// Offset from a code of each length to its index in `huffval`.
    pub(crate) valoffset: [i32; 18],
    /// Code length for each `HUFF_LOOKAHEAD`-bit prefix, 0 if longer.
    pub(crate) look_nbits: [u8; 1 << HUFF_LOOKAHEAD],
    pub(crate) look_sym: [u8; 1 << HUFF_LOOKAHEAD],
    pub(crate) huffval: [u8; 256],
}

impl DecodeTable {
    /// Builds decode structures, rejecting malformed tables. DC tables may
    /// only carry symbols 0..=15.
    pub fn build(table: &HuffmanTable, is_dc: bool) -> Result<Self, JpegError> {
        let (_, codes) = table.canonical_codes()?;
        let count = codes.len();

        let mut huffval = [0u8; 256];
        huffval[..count].copy_from_slice(&table.values[..count]);

        let mut maxcode = [-1i32; 18];
        let mut valoffset = [0i32; 18];
        let mut p = 0usize;
        for l in 1..=16 {
            let n = table.lengths[l - 1] as usize;
            if n > 0 {
                valoffset[l] = p as i32 - codes[p] as i32;
                p += n;
                maxcode[l] = codes[p - 1] as i32;
            }
        }
        maxcode[17] = 0xFFFFF;

        let mut look_nbits = [0u8; 1 << HUFF_LOOKAHEAD];
        let mut look_sym = [0u8; 1 << HUFF_LOOKAHEAD];
        let mut p = 0usize;
        for l in 1..=HUFF_LOOKAHEAD as usize {
            for _ in 0..table.lengths[l - 1] {
                let spread = 1usize << (HUFF_LOOKAHEAD as usize - l);
                let first = (codes[p] as usize) << (HUFF_LOOKAHEAD as usize - l);
                look_nbits[first..first + spread].fill(l as u8);
                look_sym[first..first + spread].fill(huffval[p]);
                p += 1;
            }
        }

        if is_dc && huffval[..count].iter().any(|&sym| sym > 15) {
            return Err(JpegError::BadHuffmanTable);
        }

        Ok(Self {
            maxcode,
            valoffset,
            look_nbits,
            look_sym,
            huffval,
        })
    }
}

/// Encoder form of a Huffman table: code and length per symbol.
#[derive(Debug, Clone)]
pub struct EncodeTable {
    pub(crate) code: [u16; 256],
    /// Zero marks a symbol without a code.
    pub(crate) size: [u8; 256],
}

impl EncodeTable {
    pub fn build(table: &HuffmanTable, is_dc: bool) -> Result<Self, JpegError> {
        let (sizes, codes) = table.canonical_codes()?;
        let max_symbol = if is_dc { 15 } else { 255 };

        let mut code = [0u16; 256];
        let mut size = [0u8; 256];
        for (p, (&length, &value)) in sizes.iter().zip(codes.iter()).enumerate() {
            let symbol = table.values[p] as usize;
            if symbol > max_symbol || size[symbol] != 0 {
                return Err(JpegError::BadHuffmanTable);
            }
            code[symbol] = value as u16;
            size[symbol] = length;
        }
        Ok(Self { code, size })
    }

    /// `(code, length)` for a symbol; length 0 if the table lacks it.
    pub fn lookup(&self, symbol: u8) -> (u16, u8) {
        (self.code[symbol as usize], self.size[symbol as usize])
    }
}

/// Builds a length-limited optimal table from symbol frequencies
/// (ISO/IEC 10918-1 K.2).
///
/// Pseudo-symbol 256 is given a count of one so that it takes the all-ones
/// code of the longest length, which is then dropped. Ties between equal
/// frequencies go to the larger symbol so the result is deterministic.
pub fn generate_optimal_table(freq: &SymbolFrequencies) -> Result<HuffmanTable, JpegError> {
    let mut freq = *freq;
    let mut codesize = [0usize; 257];
    let mut others = [-1i32; 257];
    freq[256] = 1;

    loop {
        let mut c1 = None;
        let mut v = u64::MAX;
        for (i, &f) in freq.iter().enumerate() {
            if f != 0 && f <= v {
                v = f;
                c1 = Some(i);
            }
        }
        let mut c2 = None;
        v = u64::MAX;
        for (i, &f) in freq.iter().enumerate() {
            if f != 0 && f <= v && Some(i) != c1 {
                v = f;
                c2 = Some(i);
            }
        }
        let (Some(mut c1), Some(mut c2)) = (c1, c2) else {
            break;
        };

        freq[c1] += freq[c2];
        freq[c2] = 0;

        codesize[c1] += 1;
        while others[c1] >= 0 {
            c1 = others[c1] as usize;
            codesize[c1] += 1;
        }
        others[c1] = c2 as i32;

        codesize[c2] += 1;
        while others[c2] >= 0 {
            c2 = others[c2] as usize;
            codesize[c2] += 1;
        }
    }

    let mut bits = [0u32; MAX_CLEN + 1];
    for &size in &codesize {
        if size > 0 {
            if size > MAX_CLEN {
                return Err(JpegError::HuffmanCodeLengthOverflow);
            }
            bits[size] += 1;
        }
    }

    // Fold codes longer than 16 bits: take two symbols from the longest
    // length, move one up a level and turn a shorter code into a prefix
    // for the other.
    for i in (17..=MAX_CLEN).rev() {
        while bits[i] > 0 {
            let mut j = i - 2;
            while bits[j] == 0 {
                j -= 1;
            }
            bits[i] -= 2;
            bits[i - 1] += 1;
            bits[j + 1] += 2;
            bits[j] -= 1;
        }
    }

    // Drop the pseudo-symbol from the longest length still in use.
    let mut i = 16;
    while i > 0 && bits[i] == 0 {
        i -= 1;
    }
    if i > 0 {
        bits[i] -= 1;
    }

    let mut lengths = [0u8; 16];
    for (l, slot) in lengths.iter_mut().enumerate() {
        *slot = bits[l + 1] as u8;
    }
    let mut values = Vec::with_capacity(256);
    for size in 1..=MAX_CLEN {
        for (symbol, &s) in codesize[..256].iter().enumerate() {
            if s == size {
                values.push(symbol as u8);
            }
        }
    }
    values.truncate(lengths.iter().map(|&n| n as usize).sum());
    Ok(HuffmanTable { lengths, values })
}

/// Number of magnitude bits needed for `value` (the SSSS category).
#[inline]
pub fn magnitude_category(value: i32) -> u32 {
    32 - value.unsigned_abs().leading_zeros()
}

/// Magnitude bits for a value of the given category. Negative values are
/// sent as the one's complement of their absolute value.
#[inline]
pub fn magnitude_bits(value: i32) -> u32 {
    if value < 0 {
        (value - 1) as u32
    } else {
        value as u32
    }
}

/// Recovers a signed value from `bits` of category `s` (Figure F.12).
#[inline]
pub fn extend(bits: i32, s: u32) -> i32 {
    if s == 0 {
        0
    } else if bits < 1 << (s - 1) {
        bits + (-1 << s) + 1
    } else {
        bits
    }
}
