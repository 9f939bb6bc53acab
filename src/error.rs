use thiserror::Error;

/// Fatal conditions. Any of these aborts the current scan.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum JpegError {
    #[error("Bogus Huffman table definition")]
    BadHuffmanTable = 1,
    #[error("Huffman code size table overflow")]
    HuffmanCodeLengthOverflow = 2,
    #[error("Missing Huffman code table entry")]
    MissingHuffmanCode = 3,
    #[error("Huffman table not defined")]
    NoHuffmanTable = 4,
    #[error("Invalid progressive parameters")]
    BadProgression = 5,
    #[error("DCT coefficient out of range")]
    BadDctCoefficient = 6,
    #[error("Unsupported DCT block size")]
    UnsupportedBlockSize = 7,
    #[error("Invalid quantization table")]
    BadQuantTable = 8,
    #[error("Invalid component layout for scan")]
    BadComponentLayout = 9,
    #[error("Too many blocks in MCU")]
    TooManyBlocksInMcu = 10,
    #[error("Buffer too small")]
    BufferTooSmall = 11,
    #[error("Invalid argument")]
    InvalidArgument = 12,
}

/// Recoverable conditions. Decoding continues with best-effort output.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum JpegWarning {
    #[error("Corrupt JPEG data: bad Huffman code")]
    BadHuffmanCode,
    #[error("Corrupt JPEG data: premature end of data segment")]
    HitMarker,
    #[error("Corrupt JPEG data: {count} extraneous bytes before marker 0x{marker:02x}")]
    ExtraneousData { count: usize, marker: u8 },
    #[error("Corrupt JPEG data: found marker 0x{marker:02x} instead of RST{expected}")]
    MustResync { marker: u8, expected: u8 },
    #[error("Inconsistent progression sequence for component {component} coefficient {coefficient}")]
    BogusProgression { component: usize, coefficient: usize },
    #[error("Invalid SOS parameters for sequential JPEG")]
    NotSequential,
    #[error("Premature end of JPEG file")]
    PrematureEnd,
}
