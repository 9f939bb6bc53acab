//! Forward DCT and quantization for the encoder.
//!
//! Supported block sizes are 8x8, with a choice of numeric strategy, and
//! 16x16, which is reduced to 8x8 coefficients by the accurate integer
//! transform.

use crate::constants::{DCTSIZE, DCTSIZE2};
use crate::error::JpegError;
use crate::jpeg1::CoefBlock;
use crate::jpeg1::dct::*;
use crate::jpeg1::quantization::QuantTable;

#[derive(Debug, Clone)]
enum Divisors {
    Integer([i64; DCTSIZE2]),
    /// Reciprocals, multiplied in.
    Float([f32; DCTSIZE2]),
}

/// Forward transform for one component, with its divisors precomputed.
#[derive(Debug, Clone)]
pub struct ForwardDct {
    method: DctMethod,
    block_size: usize,
    divisors: Divisors,
}

impl ForwardDct {
    pub fn new(
        method: DctMethod,
        block_size: usize,
        quant: &QuantTable,
    ) -> Result<Self, JpegError> {
        let method = match block_size {
            8 => method,
            16 => DctMethod::IntegerSlow,
            _ => return Err(JpegError::UnsupportedBlockSize),
        };
        quant.validate()?;

        let q = &quant.values;
        let divisors = match method {
            // Integer outputs are scaled up by 8.
            DctMethod::IntegerSlow => Divisors::Integer(std::array::from_fn(|i| (q[i] as i64) << 3)),
            DctMethod::IntegerFast => Divisors::Integer(std::array::from_fn(|i| {
                descale(q[i] as i64 * AAN_SCALES[i], 14 - 3)
            })),
            DctMethod::Float => Divisors::Float(std::array::from_fn(|i| {
                let scale = AAN_SCALE_FACTOR[i / DCTSIZE] * AAN_SCALE_FACTOR[i % DCTSIZE] * 8.0;
                (1.0 / (q[i] as f64 * scale)) as f32
            })),
        };
        Ok(Self {
            method,
            block_size,
            divisors,
        })
    }

    pub fn method(&self) -> DctMethod {
        self.method
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Transforms and quantizes the `block_size` square of samples starting
    /// at `samples[0]`, rows `stride` apart.
    pub fn forward(
        &self,
        samples: &[u8],
        stride: usize,
        output: &mut CoefBlock,
    ) -> Result<(), JpegError> {
        let n = self.block_size;
        if stride < n || samples.len() < (n - 1) * stride + n {
            return Err(JpegError::BufferTooSmall);
        }

        match (&self.divisors, self.block_size) {
            (Divisors::Integer(divisors), 16) => {
                let mut workspace = [0i64; DCTSIZE2];
                fdct_islow_16x16(samples, stride, &mut workspace);
                quantize(&workspace, divisors, output);
            }
            (Divisors::Integer(divisors), _) => {
                let mut workspace = [0i64; DCTSIZE2];
                if self.method == DctMethod::IntegerFast {
                    fdct_ifast(samples, stride, &mut workspace);
                } else {
                    fdct_islow(samples, stride, &mut workspace);
                }
                quantize(&workspace, divisors, output);
            }
            (Divisors::Float(divisors), _) => {
                let mut workspace = [0f32; DCTSIZE2];
                fdct_float(samples, stride, &mut workspace);
                quantize_float(&workspace, divisors, output);
            }
        }
        Ok(())
    }
}

/// Divides with rounding half away from zero.
fn quantize(workspace: &[i64; DCTSIZE2], divisors: &[i64; DCTSIZE2], output: &mut CoefBlock) {
    for ((out, &temp), &q) in output.iter_mut().zip(workspace).zip(divisors) {
        let value = if temp < 0 {
            -((-temp + (q >> 1)) / q)
        } else {
            (temp + (q >> 1)) / q
        };
        *out = value as i16;
    }
}

fn quantize_float(workspace: &[f32; DCTSIZE2], divisors: &[f32; DCTSIZE2], output: &mut CoefBlock) {
    for ((out, &temp), &d) in output.iter_mut().zip(workspace).zip(divisors) {
        let value = temp * d;
        let magnitude = (value.abs() + 0.5) as i32;
        let signed = if value < 0.0 { -magnitude } else { magnitude };
        *out = signed as i16;
    }
}

/// Accurate integer 8x8 forward DCT. Output is scaled up by 8.
pub(crate) fn fdct_islow(samples: &[u8], stride: usize, data: &mut [i64; DCTSIZE2]) {
    // Pass 1: rows. Results are scaled up by 2^PASS1_BITS.
    for row in 0..DCTSIZE {
        let e: [i64; DCTSIZE] = std::array::from_fn(|i| samples[row * stride + i] as i64);
        let out = &mut data[row * DCTSIZE..(row + 1) * DCTSIZE];

        let tmp0 = e[0] + e[7];
        let tmp1 = e[1] + e[6];
        let tmp2 = e[2] + e[5];
        let tmp3 = e[3] + e[4];
        let tmp10 = tmp0 + tmp3;
        let tmp12 = tmp0 - tmp3;
        let tmp11 = tmp1 + tmp2;
        let tmp13 = tmp1 - tmp2;

        out[0] = (tmp10 + tmp11 - DCTSIZE as i64 * CENTER_SAMPLE) << PASS1_BITS;
        out[4] = (tmp10 - tmp11) << PASS1_BITS;
        let z1 = (tmp12 + tmp13) * FIX_0_541196100 + (1 << (CONST_BITS - PASS1_BITS - 1));
        out[2] = (z1 + tmp12 * FIX_0_765366865) >> (CONST_BITS - PASS1_BITS);
        out[6] = (z1 - tmp13 * FIX_1_847759065) >> (CONST_BITS - PASS1_BITS);

        let odd = islow_fdct_odd(
            [e[0] - e[7], e[1] - e[6], e[2] - e[5], e[3] - e[4]],
            CONST_BITS - PASS1_BITS,
        );
        out[1] = odd[0];
        out[3] = odd[1];
        out[5] = odd[2];
        out[7] = odd[3];
    }

    // Pass 2: columns. Removes the PASS1_BITS scaling.
    for col in 0..DCTSIZE {
        let e: [i64; DCTSIZE] = std::array::from_fn(|i| data[i * DCTSIZE + col]);

        let tmp0 = e[0] + e[7];
        let tmp1 = e[1] + e[6];
        let tmp2 = e[2] + e[5];
        let tmp3 = e[3] + e[4];
        let tmp10 = tmp0 + tmp3 + (1 << (PASS1_BITS - 1));
        let tmp12 = tmp0 - tmp3;
        let tmp11 = tmp1 + tmp2;
        let tmp13 = tmp1 - tmp2;

        data[col] = (tmp10 + tmp11) >> PASS1_BITS;
        data[DCTSIZE * 4 + col] = (tmp10 - tmp11) >> PASS1_BITS;
        let z1 = (tmp12 + tmp13) * FIX_0_541196100 + (1 << (CONST_BITS + PASS1_BITS - 1));
        data[DCTSIZE * 2 + col] = (z1 + tmp12 * FIX_0_765366865) >> (CONST_BITS + PASS1_BITS);
        data[DCTSIZE * 6 + col] = (z1 - tmp13 * FIX_1_847759065) >> (CONST_BITS + PASS1_BITS);

        let odd = islow_fdct_odd(
            [e[0] - e[7], e[1] - e[6], e[2] - e[5], e[3] - e[4]],
            CONST_BITS + PASS1_BITS,
        );
        data[DCTSIZE + col] = odd[0];
        data[DCTSIZE * 3 + col] = odd[1];
        data[DCTSIZE * 5 + col] = odd[2];
        data[DCTSIZE * 7 + col] = odd[3];
    }
}

/// Odd part of the accurate 8-point forward DCT: outputs 1, 3, 5 and 7.
#[inline(always)]
fn islow_fdct_odd(d: [i64; 4], shift: u32) -> [i64; 4] {
    let [mut tmp0, mut tmp1, mut tmp2, mut tmp3] = d;
    let mut tmp12 = tmp0 + tmp2;
    let mut tmp13 = tmp1 + tmp3;
    let z1 = (tmp12 + tmp13) * FIX_1_175875602 + (1 << (shift - 1));
    tmp12 = tmp12 * -FIX_0_390180644 + z1;
    tmp13 = tmp13 * -FIX_1_961570560 + z1;

    let z1 = (tmp0 + tmp3) * -FIX_0_899976223;
    tmp0 = tmp0 * FIX_1_501321110 + z1 + tmp12;
    tmp3 = tmp3 * FIX_0_298631336 + z1 + tmp13;

    let z1 = (tmp1 + tmp2) * -FIX_2_562915447;
    tmp1 = tmp1 * FIX_3_072711026 + z1 + tmp13;
    tmp2 = tmp2 * FIX_2_053119869 + z1 + tmp12;

    [tmp0 >> shift, tmp1 >> shift, tmp2 >> shift, tmp3 >> shift]
}

/// One 8-point AAN forward DCT, shared by the integer and float variants.
macro_rules! aan_fdct_1d {
    ($e:expr, $mul:expr, $k0:expr, $k1:expr, $k2:expr, $k3:expr, $center:expr) => {{
        let e = $e;
        let tmp0 = e[0] + e[7];
        let tmp7 = e[0] - e[7];
        let tmp1 = e[1] + e[6];
        let tmp6 = e[1] - e[6];
        let tmp2 = e[2] + e[5];
        let tmp5 = e[2] - e[5];
        let tmp3 = e[3] + e[4];
        let tmp4 = e[3] - e[4];

        // Even part.
        let tmp10 = tmp0 + tmp3;
        let tmp13 = tmp0 - tmp3;
        let tmp11 = tmp1 + tmp2;
        let tmp12 = tmp1 - tmp2;
        let mut o = [Default::default(); DCTSIZE];
        o[0] = tmp10 + tmp11 - $center;
        o[4] = tmp10 - tmp11;
        let z1 = $mul(tmp12 + tmp13, $k2);
        o[2] = tmp13 + z1;
        o[6] = tmp13 - z1;

        // Odd part.
        let tmp10 = tmp4 + tmp5;
        let tmp11 = tmp5 + tmp6;
        let tmp12 = tmp6 + tmp7;
        let z5 = $mul(tmp10 - tmp12, $k0);
        let z2 = $mul(tmp10, $k1) + z5;
        let z4 = $mul(tmp12, $k3) + z5;
        let z3 = $mul(tmp11, $k2);
        let z11 = tmp7 + z3;
        let z13 = tmp7 - z3;
        o[5] = z13 + z2;
        o[3] = z13 - z2;
        o[1] = z11 + z4;
        o[7] = z11 - z4;
        o
    }};
}

/// Fast integer 8x8 forward DCT. Output is scaled by the AAN factors,
/// which the divisors undo.
pub(crate) fn fdct_ifast(samples: &[u8], stride: usize, data: &mut [i64; DCTSIZE2]) {
    for row in 0..DCTSIZE {
        let e: [i64; DCTSIZE] = std::array::from_fn(|i| samples[row * stride + i] as i64);
        let o = aan_fdct_1d!(e, mul8, 98, 139, 181, 334, DCTSIZE as i64 * CENTER_SAMPLE);
        data[row * DCTSIZE..(row + 1) * DCTSIZE].copy_from_slice(&o);
    }
    for col in 0..DCTSIZE {
        let e: [i64; DCTSIZE] = std::array::from_fn(|i| data[i * DCTSIZE + col]);
        let o = aan_fdct_1d!(e, mul8, 98, 139, 181, 334, 0);
        for (i, value) in o.into_iter().enumerate() {
            data[i * DCTSIZE + col] = value;
        }
    }
}

/// Floating-point 8x8 forward DCT, scaled like [`fdct_ifast`].
pub(crate) fn fdct_float(samples: &[u8], stride: usize, data: &mut [f32; DCTSIZE2]) {
    let mul = |x: f32, c: f32| x * c;
    for row in 0..DCTSIZE {
        let e: [f32; DCTSIZE] = std::array::from_fn(|i| samples[row * stride + i] as f32);
        let o = aan_fdct_1d!(
            e,
            mul,
            0.382683433,
            0.541196100,
            0.707106781,
            1.306562965,
            (DCTSIZE as i64 * CENTER_SAMPLE) as f32
        );
        data[row * DCTSIZE..(row + 1) * DCTSIZE].copy_from_slice(&o);
    }
    for col in 0..DCTSIZE {
        let e: [f32; DCTSIZE] = std::array::from_fn(|i| data[i * DCTSIZE + col]);
        let o = aan_fdct_1d!(e, mul, 0.382683433, 0.541196100, 0.707106781, 1.306562965, 0.0);
        for (i, value) in o.into_iter().enumerate() {
            data[i * DCTSIZE + col] = value;
        }
    }
}

/// One 16-point pass producing the 8 lowest-frequency outputs.
/// `first` selects the row-pass scaling.
#[inline(always)]
fn islow_fdct_16_1d(e: &[i64; 16], first: bool) -> [i64; DCTSIZE] {
    let tmp: [i64; 8] = std::array::from_fn(|i| e[i] + e[15 - i]);
    let d: [i64; 8] = std::array::from_fn(|i| e[i] - e[15 - i]);

    let tmp10 = tmp[0] + tmp[7];
    let tmp14 = tmp[0] - tmp[7];
    let tmp11 = tmp[1] + tmp[6];
    let tmp15 = tmp[1] - tmp[6];
    let tmp12 = tmp[2] + tmp[5];
    let tmp16 = tmp[2] - tmp[5];
    let tmp13 = tmp[3] + tmp[4];
    let tmp17 = tmp[3] - tmp[4];

    let shift = if first {
        CONST_BITS - PASS1_BITS
    } else {
        CONST_BITS + PASS1_BITS + 2
    };
    let mut o = [0i64; DCTSIZE];

    // Even part.
    o[0] = if first {
        (tmp10 + tmp11 + tmp12 + tmp13 - 16 * CENTER_SAMPLE) << PASS1_BITS
    } else {
        descale(tmp10 + tmp11 + tmp12 + tmp13, PASS1_BITS + 2)
    };
    o[4] = descale(
        (tmp10 - tmp13) * FIX_1_306562965 + (tmp11 - tmp12) * FIX_0_541196100,
        shift,
    );
    let t10 = (tmp17 - tmp15) * FIX_0_275899379 + (tmp14 - tmp16) * FIX_1_387039845;
    o[2] = descale(
        t10 + tmp15 * FIX_1_451774982 + tmp16 * FIX_2_172734804,
        shift,
    );
    o[6] = descale(
        t10 - tmp14 * FIX_0_211164243 - tmp17 * FIX_1_061594338,
        shift,
    );

    // Odd part.
    let [tmp0, tmp1, tmp2, tmp3, tmp4, tmp5, tmp6, tmp7] = d;
    let mut t11 = (tmp0 + tmp1) * FIX_1_353318001 + (tmp6 - tmp7) * FIX_0_410524528;
    let mut t12 = (tmp0 + tmp2) * FIX_1_247225013 + (tmp5 + tmp7) * FIX_0_666655658;
    let mut t13 = (tmp0 + tmp3) * FIX_1_093201867 + (tmp4 - tmp7) * FIX_0_897167586;
    let t14 = (tmp1 + tmp2) * FIX_0_138617169 + (tmp6 - tmp5) * FIX_1_407403738;
    let t15 = (tmp1 + tmp3) * -FIX_0_666655658 + (tmp4 + tmp6) * -FIX_1_247225013;
    let t16 = (tmp2 + tmp3) * -FIX_1_353318001 + (tmp5 - tmp4) * FIX_0_410524528;
    let t10 = t11 + t12 + t13 - tmp0 * FIX_2_286341144 + tmp7 * FIX_0_779653625;
    t11 += t14 + t15 + tmp1 * FIX_0_071888074 - tmp6 * FIX_1_663905119;
    t12 += t14 + t16 - tmp2 * FIX_1_125726048 + tmp5 * FIX_1_227391138;
    t13 += t15 + t16 + tmp3 * FIX_1_065388962 + tmp4 * FIX_2_167985692;

    o[1] = descale(t10, shift);
    o[3] = descale(t11, shift);
    o[5] = descale(t12, shift);
    o[7] = descale(t13, shift);
    o
}

/// Accurate integer 16x16 forward DCT keeping the 8x8 lowest frequencies,
/// scaled like [`fdct_islow`].
pub(crate) fn fdct_islow_16x16(samples: &[u8], stride: usize, data: &mut [i64; DCTSIZE2]) {
    // Rows 0..8 land in `data`, rows 8..16 in the extra workspace.
    let mut workspace = [0i64; DCTSIZE2];
    for row in 0..16 {
        let e: [i64; 16] = std::array::from_fn(|i| samples[row * stride + i] as i64);
        let o = islow_fdct_16_1d(&e, true);
        let target = if row < DCTSIZE {
            &mut data[row * DCTSIZE..(row + 1) * DCTSIZE]
        } else {
            &mut workspace[(row - DCTSIZE) * DCTSIZE..(row - DCTSIZE + 1) * DCTSIZE]
        };
        target.copy_from_slice(&o);
    }
    for col in 0..DCTSIZE {
        let e: [i64; 16] = std::array::from_fn(|i| {
            if i < DCTSIZE {
                data[i * DCTSIZE + col]
            } else {
                workspace[(i - DCTSIZE) * DCTSIZE + col]
            }
        });
        let o = islow_fdct_16_1d(&e, false);
        for (i, value) in o.into_iter().enumerate() {
            data[i * DCTSIZE + col] = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_xorshift::XorShiftRng;

    fn reference_coefficients(samples: &[u8], stride: usize, n: usize) -> [f64; DCTSIZE2] {
        // Orthonormal-scaled DCT of an n x n block, lowest 8x8 frequencies.
        let mut out = [0.0; DCTSIZE2];
        for v in 0..DCTSIZE {
            for u in 0..DCTSIZE {
                let mut sum = 0.0;
                for y in 0..n {
                    for x in 0..n {
                        let s = samples[y * stride + x] as f64 - 128.0;
                        sum += s
                            * (((2 * x + 1) * u) as f64 * std::f64::consts::PI / (2 * n) as f64)
                                .cos()
                            * (((2 * y + 1) * v) as f64 * std::f64::consts::PI / (2 * n) as f64)
                                .cos();
                    }
                }
                let cu = if u == 0 { 1.0 / 2.0f64.sqrt() } else { 1.0 };
                let cv = if v == 0 { 1.0 / 2.0f64.sqrt() } else { 1.0 };
                out[v * DCTSIZE + u] = sum * cu * cv / 4.0 * (8.0 / n as f64) * (8.0 / n as f64);
            }
        }
        out
    }

    #[test]
    fn flat_block_has_only_dc() {
        let samples = [200u8; 64];
        let quant = QuantTable::new([1; 64]);
        for method in [DctMethod::IntegerSlow, DctMethod::IntegerFast, DctMethod::Float] {
            let fdct = ForwardDct::new(method, 8, &quant).unwrap();
            let mut out = [0i16; 64];
            fdct.forward(&samples, 8, &mut out).unwrap();
            assert_eq!(out[0], 576, "{method:?}");
            assert!(out[1..].iter().all(|&c| c == 0), "{method:?}");
        }
    }

    #[test]
    fn matches_reference_within_tolerance() {
        let mut rng = XorShiftRng::seed_from_u64(7);
        let quant = QuantTable::new([1; 64]);
        // The fast method's rounded integer divisors are checked apart.
        let tolerance = [(DctMethod::IntegerSlow, 2), (DctMethod::Float, 1)];
        for (method, max_error) in tolerance {
            let fdct = ForwardDct::new(method, 8, &quant).unwrap();
            for _ in 0..20 {
                let samples: [u8; 64] = std::array::from_fn(|_| rng.random());
                let mut out = [0i16; 64];
                fdct.forward(&samples, 8, &mut out).unwrap();
                let reference = reference_coefficients(&samples, 8, 8);
                for i in 0..64 {
                    let error = (out[i] as f64 - reference[i]).abs();
                    assert!(error <= max_error as f64, "{method:?} {i}: {error}");
                }
            }
        }
    }

    #[test]
    fn fast_transform_matches_reference_before_quantization() {
        let mut rng = XorShiftRng::seed_from_u64(7);
        for _ in 0..20 {
            let samples: [u8; 64] = std::array::from_fn(|_| rng.random());
            let mut workspace = [0i64; 64];
            fdct_ifast(&samples, 8, &mut workspace);
            let reference = reference_coefficients(&samples, 8, 8);
            for i in 0..64 {
                let scale = 8.0 * AAN_SCALE_FACTOR[i / DCTSIZE] * AAN_SCALE_FACTOR[i % DCTSIZE];
                let error = (workspace[i] as f64 / scale - reference[i]).abs();
                assert!(error <= 4.0, "{i}: {error}");
            }
        }
    }

    #[test]
    fn fast_divisors_stay_close_to_exact_scale() {
        let quant = QuantTable::standard_luminance();
        let fdct = ForwardDct::new(DctMethod::IntegerFast, 8, &quant).unwrap();
        let Divisors::Integer(divisors) = &fdct.divisors else {
            panic!("integer divisors expected");
        };
        for i in 0..64 {
            let exact = quant.values[i] as f64
                * 8.0
                * AAN_SCALE_FACTOR[i / DCTSIZE]
                * AAN_SCALE_FACTOR[i % DCTSIZE];
            assert!((divisors[i] as f64 - exact).abs() <= 0.6, "{i}");
        }
    }

    #[test]
    fn sixteen_by_sixteen_matches_reference() {
        let mut rng = XorShiftRng::seed_from_u64(11);
        let quant = QuantTable::new([1; 64]);
        let fdct = ForwardDct::new(DctMethod::Float, 16, &quant).unwrap();
        assert_eq!(fdct.method(), DctMethod::IntegerSlow);
        for _ in 0..5 {
            let samples: Vec<u8> = (0..20 * 16).map(|_| rng.random()).collect();
            let mut out = [0i16; 64];
            fdct.forward(&samples, 20, &mut out).unwrap();
            let reference = reference_coefficients(&samples, 20, 16);
            for i in 0..64 {
                assert!((out[i] as f64 - reference[i]).abs() <= 2.0, "{i}");
            }
        }
    }

    #[test]
    fn quantization_rounds_half_away_from_zero() {
        let divisors = [10i64; 64];
        let mut workspace = [0i64; 64];
        workspace[0] = 5;
        workspace[1] = -5;
        workspace[2] = 14;
        workspace[3] = -15;
        let mut out = [0i16; 64];
        quantize(&workspace, &divisors, &mut out);
        assert_eq!(&out[..4], &[1, -1, 1, -2]);

        let mut float_ws = [0f32; 64];
        float_ws[0] = 2.5;
        float_ws[1] = -2.5;
        float_ws[2] = -0.4;
        quantize_float(&float_ws, &[1.0; 64], &mut out);
        assert_eq!(&out[..3], &[3, -3, 0]);
    }

    #[test]
    fn rejects_bad_parameters() {
        let quant = QuantTable::standard_luminance();
        assert_eq!(
            ForwardDct::new(DctMethod::IntegerSlow, 4, &quant).err(),
            Some(JpegError::UnsupportedBlockSize)
        );
        let mut zero = quant;
        zero.values[5] = 0;
        assert_eq!(
            ForwardDct::new(DctMethod::IntegerSlow, 8, &zero).err(),
            Some(JpegError::BadQuantTable)
        );
        let fdct = ForwardDct::new(DctMethod::IntegerSlow, 8, &quant).unwrap();
        let mut out = [0i16; 64];
        assert_eq!(
            fdct.forward(&[0u8; 60], 8, &mut out),
            Err(JpegError::BufferTooSmall)
        );
    }
}
