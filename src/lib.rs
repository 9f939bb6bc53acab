//! Entropy coding and DCT/quantization core of a JPEG codec.
//!
//! The container layer (marker parsing, color conversion, resampling,
//! buffer control) lives outside this crate. It hands per-scan parameters
//! as a [`ScanInfo`], feeds bytes through a [`ByteSource`] or drains them
//! from a [`ByteSink`], and exchanges one coefficient-block array per MCU.

pub mod byte_io;
pub mod constants;
pub mod error;
pub mod jpeg1;
pub mod jpeg_marker_code;
pub mod scan;
mod tracing_wrappers;

pub use byte_io::{BoundedSink, ByteSink, ByteSource, SliceSource, StreamingSource};
pub use error::{JpegError, JpegWarning};
pub use jpeg1::CoefBlock;
pub use scan::{CodingStatus, ProgressionStatus, ScanComponent, ScanInfo};
