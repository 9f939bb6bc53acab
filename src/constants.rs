/// Width and height of a canonical DCT block.
pub const DCTSIZE: usize = 8;
/// Number of coefficients in a canonical DCT block.
pub const DCTSIZE2: usize = DCTSIZE * DCTSIZE;

pub const NUM_HUFF_TBLS: usize = 4;
pub const NUM_QUANT_TBLS: usize = 4;
pub const MAX_COMPS_IN_SCAN: usize = 4;
pub const MAX_BLOCKS_IN_MCU: usize = 10;

// Limits for 8-bit sample precision, ISO/IEC 10918-1 F.1.2.1 and G.1.2.2.
pub const MAX_COEF_BITS: u32 = 10;
pub const MAX_AL: u8 = 13;

/// Size of the encoder's correction-bit buffer for AC refinement scans.
pub const MAX_CORR_BITS: usize = 1000;

/// Largest EOB run a single EOBRUN symbol can describe, minus one.
pub const MAX_EOBRUN: u32 = 0x7FFF;

/// Bits resolved by a single lookahead-table probe in the Huffman decoder.
pub const HUFF_LOOKAHEAD: u32 = 8;

/// Natural-order tables carry this many trailing entries so that a corrupt
/// run length can overshoot the band without leaving the table.
const ORDER_PADDING: usize = 16;

pub type NaturalOrder = [u8; DCTSIZE2 + ORDER_PADDING];

/// Zig-zag scan of an `n`x`n` block, expressed as positions in an 8-wide
/// coefficient block. Unused trailing entries point at position 63.
const fn build_natural_order(n: usize) -> NaturalOrder {
    let mut order = [63u8; DCTSIZE2 + ORDER_PADDING];
    let mut k = 0;
    let mut diagonal = 0;
    while diagonal < 2 * n - 1 {
        let mut i = 0;
        while i < n {
            let row = if diagonal % 2 == 1 { i } else { n - 1 - i };
            if row <= diagonal && diagonal - row < n {
                order[k] = (row * DCTSIZE + diagonal - row) as u8;
                k += 1;
            }
            i += 1;
        }
        diagonal += 1;
    }
    order
}

/// Natural-order tables indexed by block size (1..=8). Index 0 is unused.
pub static NATURAL_ORDER: [NaturalOrder; DCTSIZE + 1] = [
    build_natural_order(1),
    build_natural_order(1),
    build_natural_order(2),
    build_natural_order(3),
    build_natural_order(4),
    build_natural_order(5),
    build_natural_order(6),
    build_natural_order(7),
    build_natural_order(8),
];

/// Last spectral index of a block of the given size.
pub const fn lim_se(block_size: usize) -> usize {
    block_size * block_size - 1
}

/// Position of `(row, col)` within the zig-zag scan of a `block_size` block.
pub fn zigzag_index(block_size: usize, row: usize, col: usize) -> usize {
    let target = (row * DCTSIZE + col) as u8;
    NATURAL_ORDER[block_size][..block_size * block_size]
        .iter()
        .position(|&p| p == target)
        .unwrap_or(0)
}
