// Sequential Huffman round trips: coefficients encoded with a fixed table
// set must decode to exactly the same values.

#[cfg(test)]
mod sequential_roundtrip {
    use jpeg1_core::constants::{DCTSIZE, NATURAL_ORDER, lim_se, zigzag_index};
    use jpeg1_core::jpeg1::huffman::{HuffmanTable, HuffmanTables};
    use jpeg1_core::jpeg1::{DecodeMode, EntropyDecoder, EntropyEncoder};
    use jpeg1_core::{CodingStatus, CoefBlock, ScanComponent, ScanInfo, SliceSource};
    use rand::{Rng, SeedableRng};
    use rand_xorshift::XorShiftRng;
    use test_log::test;

    const EOI: [u8; 2] = [0xFF, 0xD9];

    /// Random coefficients confined to the top-left `block_size` square.
    fn random_block(rng: &mut XorShiftRng, block_size: usize, density: f64) -> CoefBlock {
        let mut block = [0i16; 64];
        block[0] = rng.random_range(-1000..=1000);
        for row in 0..block_size {
            for col in 0..block_size {
                if (row, col) != (0, 0) && rng.random_bool(density) {
                    let magnitude = if rng.random_bool(0.8) { 15 } else { 1023 };
                    block[row * DCTSIZE + col] = rng.random_range(-magnitude..=magnitude);
                }
            }
        }
        block
    }

    fn random_mcus(
        rng: &mut XorShiftRng,
        count: usize,
        blocks_in_mcu: usize,
        block_size: usize,
    ) -> Vec<Vec<CoefBlock>> {
        (0..count)
            .map(|_| {
                (0..blocks_in_mcu)
                    .map(|_| random_block(rng, block_size, 0.3))
                    .collect()
            })
            .collect()
    }

    fn encode_scan(scan: &ScanInfo, tables: &HuffmanTables, mcus: &[Vec<CoefBlock>]) -> Vec<u8> {
        let mut encoder = EntropyEncoder::new(scan, tables).unwrap();
        let mut out = Vec::new();
        for mcu in mcus {
            assert_eq!(encoder.encode_mcu(&mut out, mcu).unwrap(), CodingStatus::Complete);
        }
        assert_eq!(encoder.finish_pass(&mut out).unwrap(), CodingStatus::Complete);
        out.extend_from_slice(&EOI);
        out
    }

    fn decode_scan(
        scan: &ScanInfo,
        tables: &HuffmanTables,
        data: &[u8],
        mcu_count: usize,
    ) -> Vec<Vec<CoefBlock>> {
        let mut decoder = EntropyDecoder::new(scan, tables, None).unwrap();
        let mut source = SliceSource::new(data);
        let mut mcus = Vec::with_capacity(mcu_count);
        for _ in 0..mcu_count {
            let mut blocks = vec![[0i16; 64]; decoder.blocks_in_mcu()];
            assert_eq!(
                decoder.decode_mcu(&mut source, &mut blocks).unwrap(),
                CodingStatus::Complete
            );
            mcus.push(blocks);
        }
        decoder.finish_pass();
        assert!(decoder.warnings().is_empty(), "{:?}", decoder.warnings());
        assert!(matches!(decoder.unread_marker(), None | Some(0xD9)));
        mcus
    }

    #[test]
    fn interleaved_scan_with_standard_tables() {
        let mut rng = XorShiftRng::seed_from_u64(10);
        let scan = ScanInfo::sequential(vec![
            ScanComponent::new(0, 0, 0).with_sampling(2, 2),
            ScanComponent::new(1, 1, 1),
            ScanComponent::new(2, 1, 1),
        ]);
        let tables = HuffmanTables::standard();
        let mcus = random_mcus(&mut rng, 24, 6, DCTSIZE);

        let data = encode_scan(&scan, &tables, &mcus);
        assert_eq!(decode_scan(&scan, &tables, &data, mcus.len()), mcus);
    }

    #[test]
    fn gathered_tables_round_trip_and_shrink_output() {
        let mut rng = XorShiftRng::seed_from_u64(11);
        let scan = ScanInfo::sequential(vec![
            ScanComponent::new(0, 0, 0),
            ScanComponent::new(1, 1, 1),
        ]);
        let mcus = random_mcus(&mut rng, 40, 2, DCTSIZE);

        let mut gather = EntropyEncoder::new_gather(&scan).unwrap();
        for mcu in &mcus {
            gather.gather_mcu(mcu).unwrap();
        }
        let optimized = gather.finish_gather().unwrap();
        assert!(optimized.dc[0].is_some() && optimized.dc[1].is_some());
        assert!(optimized.ac[0].is_some() && optimized.ac[1].is_some());
        assert!(optimized.dc[2].is_none() && optimized.ac[3].is_none());

        let optimized_data = encode_scan(&scan, &optimized, &mcus);
        assert_eq!(decode_scan(&scan, &optimized, &optimized_data, mcus.len()), mcus);

        let standard_data = encode_scan(&scan, &HuffmanTables::standard(), &mcus);
        assert!(optimized_data.len() <= standard_data.len());
    }

    #[test]
    fn restart_intervals_round_trip() {
        let mut rng = XorShiftRng::seed_from_u64(12);
        let scan = ScanInfo::sequential(vec![ScanComponent::new(0, 0, 0)]).with_restart_interval(3);
        let tables = HuffmanTables::standard();
        let mcus = random_mcus(&mut rng, 20, 1, DCTSIZE);

        let data = encode_scan(&scan, &tables, &mcus);
        let restarts: Vec<u8> = data
            .windows(2)
            .filter(|w| w[0] == 0xFF && (0xD0..=0xD7).contains(&w[1]))
            .map(|w| w[1])
            .collect();
        assert_eq!(restarts, vec![0xD0, 0xD1, 0xD2, 0xD3, 0xD4, 0xD5]);
        assert_eq!(decode_scan(&scan, &tables, &data, mcus.len()), mcus);
    }

    #[test]
    fn scaled_block_sizes_round_trip() {
        let mut rng = XorShiftRng::seed_from_u64(13);
        let tables = HuffmanTables::standard();
        for block_size in 1..DCTSIZE {
            let scan = ScanInfo::sequential(vec![ScanComponent::new(0, 0, 0)])
                .with_block_size(block_size);
            assert_eq!(scan.se as usize, lim_se(block_size));
            let mcus = random_mcus(&mut rng, 12, 1, block_size);

            let data = encode_scan(&scan, &tables, &mcus);
            let decoder = EntropyDecoder::new(&scan, &tables, None).unwrap();
            assert_eq!(decoder.mode(), DecodeMode::SequentialScaled);
            assert_eq!(
                decode_scan(&scan, &tables, &data, mcus.len()),
                mcus,
                "block size {block_size}"
            );
        }
    }

    #[test]
    fn reduced_output_keeps_leading_coefficients() {
        let mut rng = XorShiftRng::seed_from_u64(14);
        let tables = HuffmanTables::standard();
        let full = ScanInfo::sequential(vec![ScanComponent::new(0, 0, 0)]);
        let mcus = random_mcus(&mut rng, 10, 1, DCTSIZE);
        let data = encode_scan(&full, &tables, &mcus);

        for output_size in [1, 2, 4] {
            let scan = ScanInfo::sequential(vec![
                ScanComponent::new(0, 0, 0).with_output_size(output_size),
            ]);
            let limit = 1 + zigzag_index(DCTSIZE, output_size - 1, output_size - 1);
            let decoded = decode_scan(&scan, &tables, &data, mcus.len());
            for (got, original) in decoded.iter().zip(&mcus) {
                let mut expected = [0i16; 64];
                for &pos in &NATURAL_ORDER[DCTSIZE][..limit] {
                    expected[pos as usize] = original[0][pos as usize];
                }
                assert_eq!(got[0], expected, "output size {output_size}");
            }
        }
    }

    #[test]
    fn single_code_dc_table() {
        let mut lengths = [0u8; 16];
        lengths[0] = 1;
        let mut tables = HuffmanTables::default();
        tables.dc[0] = Some(HuffmanTable::new(lengths, &[0]));
        let scan = ScanInfo::sequential(vec![ScanComponent::new(0, 0, 0)]).with_block_size(1);

        let mcus = vec![vec![[0i16; 64]]];
        let data = encode_scan(&scan, &tables, &mcus);
        // One zero bit, padded with ones.
        assert_eq!(data, [0x7F, 0xFF, 0xD9]);
        assert_eq!(decode_scan(&scan, &tables, &data, 1), mcus);
    }
}
