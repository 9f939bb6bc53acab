//! Quantization tables and libjpeg-compatible quality scaling.

use crate::constants::DCTSIZE2;
use crate::error::JpegError;

/// Standard JPEG luminance quantization table (Quality 50), natural order.
#[rustfmt::skip]
pub const STD_LUMINANCE_QUANT_TABLE: [u16; DCTSIZE2] = [
    16, 11, 10, 16, 24, 40, 51, 61,
    12, 12, 14, 19, 26, 58, 60, 55,
    14, 13, 16, 24, 40, 57, 69, 56,
    14, 17, 22, 29, 51, 87, 80, 62,
    18, 22, 37, 56, 68, 109, 103, 77,
    24, 35, 55, 64, 81, 104, 113, 92,
    49, 64, 78, 87, 103, 121, 120, 101,
    72, 92, 95, 98, 112, 100, 103, 99,
];

/// Standard JPEG chrominance quantization table (Quality 50), natural order.
#[rustfmt::skip]
pub const STD_CHROMINANCE_QUANT_TABLE: [u16; DCTSIZE2] = [
    17, 18, 24, 47, 99, 99, 99, 99,
    18, 21, 26, 66, 99, 99, 99, 99,
    24, 26, 56, 99, 99, 99, 99, 99,
    47, 66, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
];

/// A quantization table in natural (row-major) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantTable {
    pub values: [u16; DCTSIZE2],
}

impl QuantTable {
    pub fn new(values: [u16; DCTSIZE2]) -> Self {
        Self { values }
    }

    pub fn standard_luminance() -> Self {
        Self::new(STD_LUMINANCE_QUANT_TABLE)
    }

    pub fn standard_chrominance() -> Self {
        Self::new(STD_CHROMINANCE_QUANT_TABLE)
    }

    /// Scales `base` for a 1..=100 quality setting.
    pub fn from_quality(base: &[u16; DCTSIZE2], quality: i32, force_baseline: bool) -> Self {
        scaled_quant_table(base, quality_scaling(quality), force_baseline)
    }

    /// A zero entry would divide by zero in the forward DCT.
    pub fn validate(&self) -> Result<(), JpegError> {
        if self.values.contains(&0) {
            return Err(JpegError::BadQuantTable);
        }
        Ok(())
    }
}

/// Converts a quality rating to a percentage scale factor.
///
/// Quality 50 keeps the base table, 100 turns every entry into 1. Values
/// outside 1..=100 are clamped.
pub fn quality_scaling(quality: i32) -> i32 {
    let quality = quality.clamp(1, 100);
    if quality < 50 {
        5000 / quality
    } else {
        200 - quality * 2
    }
}

/// Scales `base` by `scale_factor` percent. Entries are kept within
/// 1..=32767, or 1..=255 when `force_baseline` is set.
pub fn scaled_quant_table(
    base: &[u16; DCTSIZE2],
    scale_factor: i32,
    force_baseline: bool,
) -> QuantTable {
    let limit = if force_baseline { 255 } else { 32767 };
    let mut values = [0u16; DCTSIZE2];
    for (value, &b) in values.iter_mut().zip(base) {
        let scaled = (b as i64 * scale_factor as i64 + 50) / 100;
        *value = scaled.clamp(1, limit) as u16;
    }
    QuantTable { values }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_scaling_matches_libjpeg_curve() {
        assert_eq!(quality_scaling(50), 100);
        assert_eq!(quality_scaling(75), 50);
        assert_eq!(quality_scaling(100), 0);
        assert_eq!(quality_scaling(10), 500);
        assert_eq!(quality_scaling(0), 5000);
        assert_eq!(quality_scaling(150), 0);
    }

    #[test]
    fn quality_50_is_identity() {
        let table = QuantTable::from_quality(&STD_LUMINANCE_QUANT_TABLE, 50, true);
        assert_eq!(table, QuantTable::standard_luminance());
    }

    #[test]
    fn scaled_values_are_clamped() {
        let best = QuantTable::from_quality(&STD_LUMINANCE_QUANT_TABLE, 100, true);
        assert!(best.values.iter().all(|&v| v == 1));

        let baseline = QuantTable::from_quality(&STD_CHROMINANCE_QUANT_TABLE, 1, true);
        assert!(baseline.values.iter().all(|&v| v <= 255));
        assert_eq!(baseline.values[63], 255);

        let extended = QuantTable::from_quality(&STD_CHROMINANCE_QUANT_TABLE, 1, false);
        assert_eq!(extended.values[63], 4950);
    }

    #[test]
    fn zero_entry_is_rejected() {
        let mut table = QuantTable::standard_chrominance();
        assert!(table.validate().is_ok());
        table.values[10] = 0;
        assert_eq!(table.validate(), Err(JpegError::BadQuantTable));
    }
}
