//! JPEG 1 (ISO/IEC 10918-1 / ITU-T T.81) entropy coding and transforms.
//!
//! - Huffman coding of quantized coefficients, sequential and progressive.
//! - Statistics gathering for optimized Huffman tables.
//! - Forward DCT with quantization, inverse DCT with dequantization.
//! - Restart marker handling and suspension on starved I/O.

pub mod bit_reader;
pub mod bit_writer;
pub mod dct;
pub mod decoder;
pub mod encoder;
pub mod fdct;
pub mod huffman;
pub mod idct;
pub mod quantization;

use crate::constants::DCTSIZE2;

/// Quantized coefficients of one block in natural (row-major) order.
pub type CoefBlock = [i16; DCTSIZE2];

pub use dct::DctMethod;
pub use decoder::{DecodeMode, EntropyDecoder};
pub use encoder::{EncodeMode, EntropyEncoder};
pub use fdct::ForwardDct;
pub use huffman::{HuffmanTable, HuffmanTables, generate_optimal_table};
pub use idct::InverseDct;
pub use quantization::QuantTable;
