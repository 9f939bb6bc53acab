//! bench_dct - timing and accuracy of the inverse DCT strategies.
//!
//! Each strategy decodes the same fixed set of coefficient blocks; the output is
//! compared with a direct floating-point evaluation of the transform.

use clap::Parser;
use jpeg1_core::CoefBlock;
use jpeg1_core::jpeg1::dct::reference_idct_8x8;
use jpeg1_core::jpeg1::quantization::{QuantTable, STD_LUMINANCE_QUANT_TABLE};
use jpeg1_core::jpeg1::{DctMethod, InverseDct};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "bench_dct")]
#[command(version)]
#[command(about = "Benchmark inverse DCT strategies against the floating-point reference", long_about = None)]
struct Args {
    /// Blocks transformed per strategy
    #[arg(short, long, default_value_t = 1_000_000)]
    iterations: usize,

    /// Strategy to run: 0 = accurate integer, 1 = fast integer, 2 = float.
    /// All of them when omitted.
    #[arg(short, long)]
    method: Option<u8>,

    /// Quality used to scale the standard luminance table (1-100)
    #[arg(short, long, default_value_t = 75)]
    quality: i32,
}

/// Low-frequency corners (4x4, row-major) of the mock coefficient blocks.
const MOCK_CORNERS: [[i16; 16]; 4] = [
    [10, 5, -2, 1, 3, 1, 0, 0, -1, 0, 0, 0, 0, 0, 0, 0],
    [-25, 0, 3, 0, 4, -2, 0, 0, 0, 1, 0, 0, 0, 0, 0, -1],
    [0, -4, 0, 2, 4, 0, -3, 0, 0, 2, 0, 1, -1, 0, 1, 0],
    [30, 2, 2, -1, -2, 1, 0, 1, 1, 0, -1, 0, 0, 1, 0, 0],
];

/// The mock blocks and their negations.
fn test_blocks() -> Vec<CoefBlock> {
    [1i16, -1]
        .iter()
        .flat_map(|&sign| {
            MOCK_CORNERS.iter().map(move |corner| {
                let mut block = [0i16; 64];
                for (i, &coef) in corner.iter().enumerate() {
                    block[(i / 4) * 8 + i % 4] = sign * coef;
                }
                block
            })
        })
        .collect()
}

fn reference_samples(block: &CoefBlock, quant: &QuantTable) -> [u8; 64] {
    let input: [f64; 64] = std::array::from_fn(|i| block[i] as f64 * quant.values[i] as f64);
    let mut output = [0.0; 64];
    reference_idct_8x8(&input, &mut output);
    output.map(|v| (v + 128.0).round().clamp(0.0, 255.0) as u8)
}

fn main() {
    let args = Args::parse();
    let methods = match args.method {
        Some(raw) => match DctMethod::try_from(raw) {
            Ok(method) => vec![method],
            Err(_) => {
                eprintln!("Unknown DCT method {raw}; expected 0, 1 or 2");
                std::process::exit(2);
            }
        },
        None => vec![DctMethod::IntegerSlow, DctMethod::IntegerFast, DctMethod::Float],
    };

    let quant = QuantTable::from_quality(&STD_LUMINANCE_QUANT_TABLE, args.quality, true);
    let blocks = test_blocks();
    let references: Vec<[u8; 64]> = blocks.iter().map(|b| reference_samples(b, &quant)).collect();

    println!(
        "Benchmarking inverse DCT, {} iterations, quality {}...",
        args.iterations, args.quality
    );
    for method in methods {
        let idct = match InverseDct::new(method, 8, Some(&quant)) {
            Ok(idct) => idct,
            Err(err) => {
                eprintln!("{method:?}: {err}");
                std::process::exit(1);
            }
        };

        let mut output = [0u8; 64];
        let start = Instant::now();
        for i in 0..args.iterations {
            if let Err(err) = idct.inverse(&blocks[i % blocks.len()], &mut output, 8) {
                eprintln!("{method:?}: {err}");
                std::process::exit(1);
            }
            std::hint::black_box(&output);
        }
        let elapsed = start.elapsed();

        let mut max_diff = 0;
        let mut total_diff = 0u64;
        for (block, reference) in blocks.iter().zip(&references) {
            if idct.inverse(block, &mut output, 8).is_err() {
                continue;
            }
            for (&a, &b) in output.iter().zip(reference) {
                let diff = (a as i32 - b as i32).unsigned_abs();
                max_diff = max_diff.max(diff);
                total_diff += diff as u64;
            }
        }
        let mean_diff = total_diff as f64 / (blocks.len() * 64) as f64;
        println!(
            "{method:?}: {elapsed:?} ({:.1} ns/block), max error {max_diff}, mean error {mean_diff:.4}",
            elapsed.as_nanos() as f64 / args.iterations.max(1) as f64
        );
    }
}
