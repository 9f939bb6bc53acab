//! Discrete Cosine Transform (DCT) definitions shared by the forward and
//! inverse transforms, plus a direct floating-point reference transform.

use std::f64::consts::PI;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::constants::{DCTSIZE, DCTSIZE2};

/// Numeric strategy of the 8x8 transforms. Other block sizes always use
/// the accurate integer math.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum DctMethod {
    /// Accurate integer transform (Loeffler, Ligtenberg and Moschytz).
    IntegerSlow = 0,
    /// Integer Arai-Agui-Nakajima transform with 8-bit constants.
    IntegerFast = 1,
    /// Floating-point Arai-Agui-Nakajima transform.
    Float = 2,
}

impl Default for DctMethod {
    fn default() -> Self {
        Self::IntegerSlow
    }
}

pub(crate) const CONST_BITS: u32 = 13;
pub(crate) const PASS1_BITS: u32 = 2;
/// Fractional bits of the fast integer transform's constants.
pub(crate) const IFAST_CONST_BITS: u32 = 8;

pub(crate) const CENTER_SAMPLE: i64 = 128;

// Accurate integer constants, round(x * 2^CONST_BITS).
pub(crate) const FIX_0_298631336: i64 = 2446;
pub(crate) const FIX_0_390180644: i64 = 3196;
pub(crate) const FIX_0_541196100: i64 = 4433;
pub(crate) const FIX_0_765366865: i64 = 6270;
pub(crate) const FIX_0_899976223: i64 = 7373;
pub(crate) const FIX_1_175875602: i64 = 9633;
pub(crate) const FIX_1_501321110: i64 = 12299;
pub(crate) const FIX_1_847759065: i64 = 15137;
pub(crate) const FIX_1_961570560: i64 = 16069;
pub(crate) const FIX_2_053119869: i64 = 16819;
pub(crate) const FIX_2_562915447: i64 = 20995;
pub(crate) const FIX_3_072711026: i64 = 25172;

// Extra constants of the 16-point transforms.
pub(crate) const FIX_0_071888074: i64 = 589;
pub(crate) const FIX_0_138617169: i64 = 1136;
pub(crate) const FIX_0_211164243: i64 = 1730;
pub(crate) const FIX_0_275899379: i64 = 2260;
pub(crate) const FIX_0_410524528: i64 = 3363;
pub(crate) const FIX_0_509795579: i64 = 4176;
pub(crate) const FIX_0_601344887: i64 = 4926;
pub(crate) const FIX_0_666655658: i64 = 5461;
pub(crate) const FIX_0_766367282: i64 = 6278;
pub(crate) const FIX_0_779653625: i64 = 6387;
pub(crate) const FIX_0_897167586: i64 = 7350;
pub(crate) const FIX_1_061594338: i64 = 8697;
pub(crate) const FIX_1_065388962: i64 = 8728;
pub(crate) const FIX_1_093201867: i64 = 8956;
pub(crate) const FIX_1_125726048: i64 = 9222;
pub(crate) const FIX_1_227391138: i64 = 10055;
pub(crate) const FIX_1_247225013: i64 = 10217;
pub(crate) const FIX_1_306562965: i64 = 10703;
pub(crate) const FIX_1_353318001: i64 = 11086;
pub(crate) const FIX_1_387039845: i64 = 11363;
pub(crate) const FIX_1_407403738: i64 = 11529;
pub(crate) const FIX_1_451774982: i64 = 11893;
pub(crate) const FIX_1_663905119: i64 = 13631;
pub(crate) const FIX_1_835730603: i64 = 15038;
pub(crate) const FIX_1_971951411: i64 = 16154;
pub(crate) const FIX_2_167985692: i64 = 17760;
pub(crate) const FIX_2_172734804: i64 = 17799;
pub(crate) const FIX_2_286341144: i64 = 18730;
pub(crate) const FIX_3_141271809: i64 = 25733;

/// AAN row/column scale factors: 1 for k = 0, cos(k*PI/16) * sqrt(2) otherwise.
pub(crate) const AAN_SCALE_FACTOR: [f64; DCTSIZE] = [
    1.0,
    1.387039845,
    1.306562965,
    1.175875602,
    1.0,
    0.785694958,
    0.541196100,
    0.275899379,
];

/// `AAN_SCALE_FACTOR[row] * AAN_SCALE_FACTOR[col]` scaled by 2^14.
#[rustfmt::skip]
pub(crate) const AAN_SCALES: [i64; DCTSIZE2] = [
    16384, 22725, 21407, 19266, 16384, 12873, 8867, 4520,
    22725, 31521, 29692, 26722, 22725, 17855, 12299, 6270,
    21407, 29692, 27969, 25172, 21407, 16819, 11585, 5906,
    19266, 26722, 25172, 22654, 19266, 15137, 10426, 5315,
    16384, 22725, 21407, 19266, 16384, 12873, 8867, 4520,
    12873, 17855, 16819, 15137, 12873, 10114, 6967, 3552,
    8867, 12299, 11585, 10426, 8867, 6967, 4799, 2446,
    4520, 6270, 5906, 5315, 4520, 3552, 2446, 1247,
];

/// Rounded right shift.
#[inline(always)]
pub(crate) fn descale(x: i64, n: u32) -> i64 {
    (x + (1 << (n - 1))) >> n
}

/// Multiply by a fast-transform constant with `IFAST_CONST_BITS` fraction bits.
#[inline(always)]
pub(crate) fn mul8(x: i64, c: i64) -> i64 {
    descale(x * c, IFAST_CONST_BITS)
}

fn cosine_table() -> [[f64; DCTSIZE]; DCTSIZE] {
    let mut table = [[0.0; DCTSIZE]; DCTSIZE];
    for (x, row) in table.iter_mut().enumerate() {
        for (u, value) in row.iter_mut().enumerate() {
            let cu = if u == 0 { 1.0 / 2.0f64.sqrt() } else { 1.0 };
            *value = cu * (((2 * x + 1) * u) as f64 * PI / 16.0).cos();
        }
    }
    table
}

/// Orthonormal 8x8 DCT-II of level-shifted samples, computed directly.
pub fn reference_fdct_8x8(input: &[f64; DCTSIZE2], output: &mut [f64; DCTSIZE2]) {
    let cos = cosine_table();
    for u in 0..DCTSIZE {
        for v in 0..DCTSIZE {
            let mut sum = 0.0;
            for x in 0..DCTSIZE {
                for y in 0..DCTSIZE {
                    sum += input[x * DCTSIZE + y] * cos[x][u] * cos[y][v];
                }
            }
            output[u * DCTSIZE + v] = 0.25 * sum;
        }
    }
}

/// Inverse of [`reference_fdct_8x8`]; output is level-shifted.
pub fn reference_idct_8x8(input: &[f64; DCTSIZE2], output: &mut [f64; DCTSIZE2]) {
    let cos = cosine_table();
    for x in 0..DCTSIZE {
        for y in 0..DCTSIZE {
            let mut sum = 0.0;
            for u in 0..DCTSIZE {
                for v in 0..DCTSIZE {
                    sum += input[u * DCTSIZE + v] * cos[x][u] * cos[y][v];
                }
            }
            output[x * DCTSIZE + y] = 0.25 * sum;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_fdct_idct_dc_only() {
        let input = [-128.0f64; 64];
        let mut dct_coeffs = [0.0f64; 64];
        reference_fdct_8x8(&input, &mut dct_coeffs);
        assert!((dct_coeffs[0] + 1024.0).abs() < 1e-9);

        let mut output = [0.0f64; 64];
        reference_idct_8x8(&dct_coeffs, &mut output);
        for i in 0..64 {
            assert!(
                (input[i] - output[i]).abs() < 1e-9,
                "Mismatch at {}: {} vs {}",
                i,
                input[i],
                output[i]
            );
        }
    }

    #[test]
    fn method_from_option_byte() {
        assert_eq!(DctMethod::try_from(1u8).unwrap(), DctMethod::IntegerFast);
        assert!(DctMethod::try_from(3u8).is_err());
        assert_eq!(u8::from(DctMethod::Float), 2);
        assert_eq!(DctMethod::default(), DctMethod::IntegerSlow);
    }

    #[test]
    fn aan_scales_match_factors() {
        for row in 0..DCTSIZE {
            for col in 0..DCTSIZE {
                let expected =
                    (16384.0 * AAN_SCALE_FACTOR[row] * AAN_SCALE_FACTOR[col]).round() as i64;
                assert_eq!(AAN_SCALES[row * DCTSIZE + col], expected);
            }
        }
    }
}
