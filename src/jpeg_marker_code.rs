use num_enum::{IntoPrimitive, TryFromPrimitive};

pub const JPEG_MARKER_START_BYTE: u8 = 0xFF;
pub const JPEG_RESTART_MARKER_BASE: u8 = 0xD0;
pub const JPEG_RESTART_MARKER_RANGE: u8 = 8;

/// Markers the entropy layer can meet inside or at the end of scan data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum JpegMarkerCode {
    /// SOF0: Marks the start of a baseline frame. Lowest valid marker code.
    StartOfFrameBaseline = 0xC0,
    /// SOF2: Marks the start of a progressive frame.
    StartOfFrameProgressive = 0xC2,
    /// DHT: Defines Huffman tables.
    DefineHuffmanTables = 0xC4,

    /// RST0..RST7: Restart markers, cycling modulo 8.
    Restart0 = 0xD0,
    Restart1 = 0xD1,
    Restart2 = 0xD2,
    Restart3 = 0xD3,
    Restart4 = 0xD4,
    Restart5 = 0xD5,
    Restart6 = 0xD6,
    Restart7 = 0xD7,

    /// SOI: Marks the start of an image.
    StartOfImage = 0xD8,
    /// EOI: Marks the end of an image.
    EndOfImage = 0xD9,
    /// SOS: Marks the start of scan.
    StartOfScan = 0xDA,
    /// DQT: Defines quantization tables.
    DefineQuantizationTables = 0xDB,
    /// DNL: Defines the number of lines in a scan.
    DefineNumberOfLines = 0xDC,
    /// DRI: Defines the restart interval used in succeeding scans.
    DefineRestartInterval = 0xDD,
}

impl JpegMarkerCode {
    /// RSTn marker for a restart number, taken modulo 8.
    pub fn restart(number: u8) -> u8 {
        JPEG_RESTART_MARKER_BASE + (number & 7)
    }

    pub fn is_restart(code: u8) -> bool {
        (JPEG_RESTART_MARKER_BASE..JPEG_RESTART_MARKER_BASE + JPEG_RESTART_MARKER_RANGE)
            .contains(&code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restart_markers_cycle() {
        assert_eq!(JpegMarkerCode::restart(0), 0xD0);
        assert_eq!(JpegMarkerCode::restart(9), 0xD1);
        assert!(JpegMarkerCode::is_restart(0xD7));
        assert!(!JpegMarkerCode::is_restart(0xD8));
        assert_eq!(
            JpegMarkerCode::try_from(0xD3u8).ok(),
            Some(JpegMarkerCode::Restart3)
        );
        assert!(JpegMarkerCode::try_from(0x01u8).is_err());
    }
}
