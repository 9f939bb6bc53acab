//! Dequantization and inverse DCT for the decoder.
//!
//! 8x8 output is available with every [`DctMethod`]. Scaled outputs of
//! 16x16, 4x4, 2x2 and 1x1 samples use the accurate integer math on the
//! low-frequency corner of the block.
//!
//! All kernels finish through [`RANGE_LIMIT`], indexed by the masked
//! descaled value, so out-of-range results from corrupt data clamp instead
//! of wrapping.

use crate::constants::{DCTSIZE, DCTSIZE2};
use crate::error::JpegError;
use crate::jpeg1::CoefBlock;
use crate::jpeg1::dct::*;
use crate::jpeg1::quantization::QuantTable;

/// Bias added before the final descale so the masked index is positive.
const RANGE_CENTER: i64 = 512;
const RANGE_MASK: i64 = RANGE_CENTER * 2 - 1;

const fn build_range_limit() -> [u8; (RANGE_MASK + 1) as usize] {
    let mut table = [0u8; (RANGE_MASK + 1) as usize];
    let mut i = 0;
    while i < table.len() {
        let sample = i as i64 - RANGE_CENTER + CENTER_SAMPLE;
        table[i] = if sample < 0 {
            0
        } else if sample > 255 {
            255
        } else {
            sample as u8
        };
        i += 1;
    }
    table
}

/// Maps `sample - 128 + RANGE_CENTER`, masked to ten bits, to a clamped sample.
pub(crate) static RANGE_LIMIT: [u8; (RANGE_MASK + 1) as usize] = build_range_limit();

#[inline(always)]
fn range_limit(x: i64) -> u8 {
    RANGE_LIMIT[(x & RANGE_MASK) as usize]
}

/// Bias of the row pass: centers the output and rounds the final shift.
const ROW_BIAS: i64 = (RANGE_CENTER << (PASS1_BITS + 3)) + (1 << (PASS1_BITS + 2));

#[derive(Debug, Clone)]
enum Multipliers {
    Integer([i64; DCTSIZE2]),
    Float([f32; DCTSIZE2]),
}

/// Inverse transform for one component, with its dequantization
/// multipliers precomputed.
#[derive(Debug, Clone)]
pub struct InverseDct {
    method: DctMethod,
    output_size: usize,
    multipliers: Multipliers,
}

impl InverseDct {
    /// `quant` is `None` while no table has been seen; everything then
    /// decodes as flat gray.
    pub fn new(
        method: DctMethod,
        output_size: usize,
        quant: Option<&QuantTable>,
    ) -> Result<Self, JpegError> {
        let method = match output_size {
            8 => method,
            1 | 2 | 4 | 16 => DctMethod::IntegerSlow,
            _ => return Err(JpegError::UnsupportedBlockSize),
        };
        let q: [i64; DCTSIZE2] = match quant {
            Some(table) => std::array::from_fn(|i| table.values[i] as i64),
            None => [0; DCTSIZE2],
        };
        let multipliers = match method {
            DctMethod::IntegerSlow => Multipliers::Integer(q),
            DctMethod::IntegerFast => Multipliers::Integer(std::array::from_fn(|i| {
                descale(q[i] * AAN_SCALES[i], 14 - PASS1_BITS)
            })),
            DctMethod::Float => Multipliers::Float(std::array::from_fn(|i| {
                let scale = AAN_SCALE_FACTOR[i / DCTSIZE] * AAN_SCALE_FACTOR[i % DCTSIZE] * 0.125;
                (q[i] as f64 * scale) as f32
            })),
        };
        Ok(Self {
            method,
            output_size,
            multipliers,
        })
    }

    pub fn method(&self) -> DctMethod {
        self.method
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    /// Writes the `output_size` square of samples to `output`, rows
    /// `stride` apart.
    pub fn inverse(
        &self,
        coefs: &CoefBlock,
        output: &mut [u8],
        stride: usize,
    ) -> Result<(), JpegError> {
        let n = self.output_size;
        if stride < n || output.len() < (n - 1) * stride + n {
            return Err(JpegError::BufferTooSmall);
        }
        match &self.multipliers {
            Multipliers::Float(mult) => idct_float::<true>(coefs, mult, output, stride),
            Multipliers::Integer(mult) => match (self.output_size, self.method) {
                (8, DctMethod::IntegerFast) => idct_ifast::<true>(coefs, mult, output, stride),
                (8, _) => idct_islow::<true>(coefs, mult, output, stride),
                (16, _) => idct_16x16(coefs, mult, output, stride),
                (4, _) => idct_4x4(coefs, mult, output, stride),
                (2, _) => idct_2x2(coefs, mult, output, stride),
                _ => idct_1x1(coefs, mult, output),
            },
        }
        Ok(())
    }
}

/// Even part and odd part of the accurate 8-point inverse DCT. `tmp0` and
/// `tmp1` are the scaled sum and difference of inputs 0 and 4.
#[inline(always)]
fn islow_1d(tmp0: i64, tmp1: i64, v: &[i64; DCTSIZE]) -> [i64; DCTSIZE] {
    let z2 = v[2];
    let z3 = v[6];
    let z1 = (z2 + z3) * FIX_0_541196100;
    let tmp2 = z1 + z2 * FIX_0_765366865;
    let tmp3 = z1 - z3 * FIX_1_847759065;

    let tmp10 = tmp0 + tmp2;
    let tmp13 = tmp0 - tmp2;
    let tmp11 = tmp1 + tmp3;
    let tmp12 = tmp1 - tmp3;

    let (mut tmp0, mut tmp1, mut tmp2, mut tmp3) = (v[7], v[5], v[3], v[1]);
    let mut z2 = tmp0 + tmp2;
    let mut z3 = tmp1 + tmp3;
    let z1 = (z2 + z3) * FIX_1_175875602;
    z2 = z2 * -FIX_1_961570560 + z1;
    z3 = z3 * -FIX_0_390180644 + z1;

    let z1 = (tmp0 + tmp3) * -FIX_0_899976223;
    tmp0 = tmp0 * FIX_0_298631336 + z1 + z2;
    tmp3 = tmp3 * FIX_1_501321110 + z1 + z3;

    let z1 = (tmp1 + tmp2) * -FIX_2_562915447;
    tmp1 = tmp1 * FIX_2_053119869 + z1 + z3;
    tmp2 = tmp2 * FIX_3_072711026 + z1 + z2;

    [
        tmp10 + tmp3,
        tmp11 + tmp2,
        tmp12 + tmp1,
        tmp13 + tmp0,
        tmp13 - tmp0,
        tmp12 - tmp1,
        tmp11 - tmp2,
        tmp10 - tmp3,
    ]
}

#[inline(always)]
fn column_has_ac(coefs: &CoefBlock, col: usize) -> bool {
    (1..DCTSIZE).any(|row| coefs[row * DCTSIZE + col] != 0)
}

/// Accurate integer 8x8 inverse DCT. With `SHORTCUT`, lines whose AC
/// terms are all zero skip the 1-D transform.
pub(crate) fn idct_islow<const SHORTCUT: bool>(
    coefs: &CoefBlock,
    mult: &[i64; DCTSIZE2],
    output: &mut [u8],
    stride: usize,
) {
    let mut workspace = [0i64; DCTSIZE2];

    // Pass 1: columns. Results are scaled up by 2^PASS1_BITS.
    for col in 0..DCTSIZE {
        let v: [i64; DCTSIZE] =
            std::array::from_fn(|row| coefs[row * DCTSIZE + col] as i64 * mult[row * DCTSIZE + col]);
        if SHORTCUT && !column_has_ac(coefs, col) {
            let dc = v[0] << PASS1_BITS;
            for row in 0..DCTSIZE {
                workspace[row * DCTSIZE + col] = dc;
            }
            continue;
        }
        let z2 = (v[0] << CONST_BITS) + (1 << (CONST_BITS - PASS1_BITS - 1));
        let z3 = v[4] << CONST_BITS;
        let out = islow_1d(z2 + z3, z2 - z3, &v);
        for row in 0..DCTSIZE {
            workspace[row * DCTSIZE + col] = out[row] >> (CONST_BITS - PASS1_BITS);
        }
    }

    // Pass 2: rows.
    for row in 0..DCTSIZE {
        let w: [i64; DCTSIZE] = std::array::from_fn(|i| workspace[row * DCTSIZE + i]);
        let line = &mut output[row * stride..row * stride + DCTSIZE];
        let z2 = w[0] + ROW_BIAS;
        if SHORTCUT && w[1..].iter().all(|&x| x == 0) {
            line.fill(range_limit(z2 >> (PASS1_BITS + 3)));
            continue;
        }
        let z3 = w[4];
        let out = islow_1d((z2 + z3) << CONST_BITS, (z2 - z3) << CONST_BITS, &w);
        for (sample, value) in line.iter_mut().zip(out) {
            *sample = range_limit(value >> (CONST_BITS + PASS1_BITS + 3));
        }
    }
}

/// One 8-point AAN inverse DCT, shared by the integer and float variants.
/// `$base` is input 0 with any bias already applied.
macro_rules! aan_idct_1d {
    ($v:expr, $base:expr, $mul:expr, $k_sqrt2:expr, $k_c2:expr, $k_c2mc6:expr, $k_c2pc6:expr) => {{
        let v = $v;
        // Even part.
        let tmp10 = $base + v[4];
        let tmp11 = $base - v[4];
        let tmp13 = v[2] + v[6];
        let tmp12 = $mul(v[2] - v[6], $k_sqrt2) - tmp13;
        let tmp0 = tmp10 + tmp13;
        let tmp3 = tmp10 - tmp13;
        let tmp1 = tmp11 + tmp12;
        let tmp2 = tmp11 - tmp12;

        // Odd part.
        let z13 = v[5] + v[3];
        let z10 = v[5] - v[3];
        let z11 = v[1] + v[7];
        let z12 = v[1] - v[7];
        let tmp7 = z11 + z13;
        let tmp11 = $mul(z11 - z13, $k_sqrt2);
        let z5 = $mul(z10 + z12, $k_c2);
        let tmp10 = z5 - $mul(z12, $k_c2mc6);
        let tmp12 = z5 - $mul(z10, $k_c2pc6);
        let tmp6 = tmp12 - tmp7;
        let tmp5 = tmp11 - tmp6;
        let tmp4 = tmp10 - tmp5;

        [
            tmp0 + tmp7,
            tmp1 + tmp6,
            tmp2 + tmp5,
            tmp3 + tmp4,
            tmp3 - tmp4,
            tmp2 - tmp5,
            tmp1 - tmp6,
            tmp0 - tmp7,
        ]
    }};
}

/// Fast integer 8x8 inverse DCT. The multipliers carry the AAN scaling and
/// 2^PASS1_BITS.
pub(crate) fn idct_ifast<const SHORTCUT: bool>(
    coefs: &CoefBlock,
    mult: &[i64; DCTSIZE2],
    output: &mut [u8],
    stride: usize,
) {
    let mut workspace = [0i64; DCTSIZE2];
    for col in 0..DCTSIZE {
        let v: [i64; DCTSIZE] =
            std::array::from_fn(|row| coefs[row * DCTSIZE + col] as i64 * mult[row * DCTSIZE + col]);
        let out = if SHORTCUT && !column_has_ac(coefs, col) {
            [v[0]; DCTSIZE]
        } else {
            aan_idct_1d!(v, v[0], mul8, 362, 473, 277, 669)
        };
        for row in 0..DCTSIZE {
            workspace[row * DCTSIZE + col] = out[row];
        }
    }

    for row in 0..DCTSIZE {
        let w: [i64; DCTSIZE] = std::array::from_fn(|i| workspace[row * DCTSIZE + i]);
        let line = &mut output[row * stride..row * stride + DCTSIZE];
        let base = w[0] + ROW_BIAS;
        if SHORTCUT && w[1..].iter().all(|&x| x == 0) {
            line.fill(range_limit(base >> (PASS1_BITS + 3)));
            continue;
        }
        let out = aan_idct_1d!(w, base, mul8, 362, 473, 277, 669);
        for (sample, value) in line.iter_mut().zip(out) {
            *sample = range_limit(value >> (PASS1_BITS + 3));
        }
    }
}

/// Floating-point 8x8 inverse DCT.
pub(crate) fn idct_float<const SHORTCUT: bool>(
    coefs: &CoefBlock,
    mult: &[f32; DCTSIZE2],
    output: &mut [u8],
    stride: usize,
) {
    let mul = |x: f32, c: f32| x * c;
    let mut workspace = [0f32; DCTSIZE2];
    for col in 0..DCTSIZE {
        let v: [f32; DCTSIZE] =
            std::array::from_fn(|row| coefs[row * DCTSIZE + col] as f32 * mult[row * DCTSIZE + col]);
        let out = if SHORTCUT && !column_has_ac(coefs, col) {
            [v[0]; DCTSIZE]
        } else {
            aan_idct_1d!(v, v[0], mul, 1.414213562, 1.847759065, 1.082392200, 2.613125930)
        };
        for row in 0..DCTSIZE {
            workspace[row * DCTSIZE + col] = out[row];
        }
    }

    for row in 0..DCTSIZE {
        let w: [f32; DCTSIZE] = std::array::from_fn(|i| workspace[row * DCTSIZE + i]);
        let line = &mut output[row * stride..row * stride + DCTSIZE];
        let base = w[0] + (RANGE_CENTER as f32 + 0.5);
        if SHORTCUT && w[1..].iter().all(|&x| x == 0.0) {
            line.fill(range_limit(base as i64));
            continue;
        }
        let out = aan_idct_1d!(w, base, mul, 1.414213562, 1.847759065, 1.082392200, 2.613125930);
        for (sample, value) in line.iter_mut().zip(out) {
            *sample = range_limit(value as i64);
        }
    }
}

/// One 16-point inverse pass over 8 inputs. `tmp0` is input 0 already
/// scaled and rounded for the pass.
#[inline(always)]
fn islow_16_1d(tmp0: i64, v: &[i64; DCTSIZE]) -> [i64; 16] {
    // Even part.
    let z1 = v[4];
    let tmp1 = z1 * FIX_1_306562965;
    let tmp2 = z1 * FIX_0_541196100;
    let tmp10 = tmp0 + tmp1;
    let tmp11 = tmp0 - tmp1;
    let tmp12 = tmp0 + tmp2;
    let tmp13 = tmp0 - tmp2;

    let z1 = v[2];
    let z2 = v[6];
    let z3 = z1 - z2;
    let z4 = z3 * FIX_0_275899379;
    let z3 = z3 * FIX_1_387039845;
    let tmp0 = z3 + z2 * FIX_2_562915447;
    let tmp1 = z4 + z1 * FIX_0_899976223;
    let tmp2 = z3 - z1 * FIX_0_601344887;
    let tmp3 = z4 - z2 * FIX_0_509795579;

    let tmp20 = tmp10 + tmp0;
    let tmp27 = tmp10 - tmp0;
    let tmp21 = tmp12 + tmp1;
    let tmp26 = tmp12 - tmp1;
    let tmp22 = tmp13 + tmp2;
    let tmp25 = tmp13 - tmp2;
    let tmp23 = tmp11 + tmp3;
    let tmp24 = tmp11 - tmp3;

    // Odd part.
    let z1 = v[1];
    let mut z2 = v[3];
    let z3 = v[5];
    let z4 = v[7];

    let tmp11 = z1 + z3;
    let mut tmp1 = (z1 + z2) * FIX_1_353318001;
    let mut tmp2 = tmp11 * FIX_1_247225013;
    let mut tmp3 = (z1 + z4) * FIX_1_093201867;
    let mut tmp10 = (z1 - z4) * FIX_0_897167586;
    let mut tmp11 = tmp11 * FIX_0_666655658;
    let mut tmp12 = (z1 - z2) * FIX_0_410524528;
    let tmp0 = tmp1 + tmp2 + tmp3 - z1 * FIX_2_286341144;
    let tmp13 = tmp10 + tmp11 + tmp12 - z1 * FIX_1_835730603;
    let z1 = (z2 + z3) * FIX_0_138617169;
    tmp1 += z1 + z2 * FIX_0_071888074;
    tmp2 += z1 - z3 * FIX_1_125726048;
    let z1 = (z3 - z2) * FIX_1_407403738;
    tmp11 += z1 - z3 * FIX_0_766367282;
    tmp12 += z1 + z2 * FIX_1_971951411;
    z2 += z4;
    let z1 = z2 * -FIX_0_666655658;
    tmp1 += z1;
    tmp3 += z1 + z4 * FIX_1_065388962;
    let z2 = z2 * -FIX_1_247225013;
    tmp10 += z2 + z4 * FIX_3_141271809;
    tmp12 += z2;
    let z2 = (z3 + z4) * -FIX_1_353318001;
    tmp2 += z2;
    tmp3 += z2;
    let z2 = (z4 - z3) * FIX_0_410524528;
    tmp10 += z2;
    tmp11 += z2;

    [
        tmp20 + tmp0,
        tmp21 + tmp1,
        tmp22 + tmp2,
        tmp23 + tmp3,
        tmp24 + tmp10,
        tmp25 + tmp11,
        tmp26 + tmp12,
        tmp27 + tmp13,
        tmp27 - tmp13,
        tmp26 - tmp12,
        tmp25 - tmp11,
        tmp24 - tmp10,
        tmp23 - tmp3,
        tmp22 - tmp2,
        tmp21 - tmp1,
        tmp20 - tmp0,
    ]
}

/// 16x16 output from 8x8 coefficients.
pub(crate) fn idct_16x16(
    coefs: &CoefBlock,
    mult: &[i64; DCTSIZE2],
    output: &mut [u8],
    stride: usize,
) {
    let mut workspace = [0i64; 16 * DCTSIZE];
    for col in 0..DCTSIZE {
        let v: [i64; DCTSIZE] =
            std::array::from_fn(|row| coefs[row * DCTSIZE + col] as i64 * mult[row * DCTSIZE + col]);
        let tmp0 = (v[0] << CONST_BITS) + (1 << (CONST_BITS - PASS1_BITS - 1));
        let out = islow_16_1d(tmp0, &v);
        for (row, value) in out.into_iter().enumerate() {
            workspace[row * DCTSIZE + col] = value >> (CONST_BITS - PASS1_BITS);
        }
    }

    for row in 0..16 {
        let w: [i64; DCTSIZE] = std::array::from_fn(|i| workspace[row * DCTSIZE + i]);
        let out = islow_16_1d((w[0] + ROW_BIAS) << CONST_BITS, &w);
        let line = &mut output[row * stride..row * stride + 16];
        for (sample, value) in line.iter_mut().zip(out) {
            *sample = range_limit(value >> (CONST_BITS + PASS1_BITS + 3));
        }
    }
}

/// 4x4 output from the lowest 4x4 coefficients.
pub(crate) fn idct_4x4(coefs: &CoefBlock, mult: &[i64; DCTSIZE2], output: &mut [u8], stride: usize) {
    let dequantize = |row: usize, col: usize| {
        coefs[row * DCTSIZE + col] as i64 * mult[row * DCTSIZE + col]
    };
    let mut workspace = [0i64; 16];
    for col in 0..4 {
        let tmp0 = dequantize(0, col);
        let tmp2 = dequantize(2, col);
        let tmp10 = (tmp0 + tmp2) << PASS1_BITS;
        let tmp12 = (tmp0 - tmp2) << PASS1_BITS;

        let z2 = dequantize(1, col);
        let z3 = dequantize(3, col);
        let z1 = (z2 + z3) * FIX_0_541196100 + (1 << (CONST_BITS - PASS1_BITS - 1));
        let tmp0 = (z1 + z2 * FIX_0_765366865) >> (CONST_BITS - PASS1_BITS);
        let tmp2 = (z1 - z3 * FIX_1_847759065) >> (CONST_BITS - PASS1_BITS);

        workspace[col] = tmp10 + tmp0;
        workspace[4 * 3 + col] = tmp10 - tmp0;
        workspace[4 + col] = tmp12 + tmp2;
        workspace[4 * 2 + col] = tmp12 - tmp2;
    }

    let shift = CONST_BITS + PASS1_BITS + 3;
    for row in 0..4 {
        let w = &workspace[row * 4..row * 4 + 4];
        let tmp0 = w[0] + ROW_BIAS;
        let tmp10 = (tmp0 + w[2]) << CONST_BITS;
        let tmp12 = (tmp0 - w[2]) << CONST_BITS;

        let z1 = (w[1] + w[3]) * FIX_0_541196100;
        let tmp0 = z1 + w[1] * FIX_0_765366865;
        let tmp2 = z1 - w[3] * FIX_1_847759065;

        let line = &mut output[row * stride..row * stride + 4];
        line[0] = range_limit((tmp10 + tmp0) >> shift);
        line[3] = range_limit((tmp10 - tmp0) >> shift);
        line[1] = range_limit((tmp12 + tmp2) >> shift);
        line[2] = range_limit((tmp12 - tmp2) >> shift);
    }
}

/// 2x2 output from the lowest 2x2 coefficients.
pub(crate) fn idct_2x2(coefs: &CoefBlock, mult: &[i64; DCTSIZE2], output: &mut [u8], stride: usize) {
    let dequantize = |i: usize| coefs[i] as i64 * mult[i];

    // Column 0, with the output bias folded into the DC term.
    let tmp4 = dequantize(0) + (RANGE_CENTER << 3) + (1 << 2);
    let tmp5 = dequantize(DCTSIZE);
    let tmp0 = tmp4 + tmp5;
    let tmp2 = tmp4 - tmp5;

    // Column 1.
    let tmp4 = dequantize(1);
    let tmp5 = dequantize(DCTSIZE + 1);
    let tmp1 = tmp4 + tmp5;
    let tmp3 = tmp4 - tmp5;

    output[0] = range_limit((tmp0 + tmp1) >> 3);
    output[1] = range_limit((tmp0 - tmp1) >> 3);
    output[stride] = range_limit((tmp2 + tmp3) >> 3);
    output[stride + 1] = range_limit((tmp2 - tmp3) >> 3);
}

/// Single sample: the rounded block average.
pub(crate) fn idct_1x1(coefs: &CoefBlock, mult: &[i64; DCTSIZE2], output: &mut [u8]) {
    let dc = coefs[0] as i64 * mult[0] + (RANGE_CENTER << 3) + (1 << 2);
    output[0] = range_limit(dc >> 3);
}
