// Progressive round trips: a frame split into spectral-selection and
// successive-approximation scans must rebuild the original coefficients.

#[cfg(test)]
mod progressive_roundtrip {
    use jpeg1_core::constants::{DCTSIZE2, NATURAL_ORDER};
    use jpeg1_core::jpeg1::{EntropyDecoder, EntropyEncoder};
    use jpeg1_core::{
        CodingStatus, CoefBlock, ProgressionStatus, ScanComponent, ScanInfo, SliceSource,
    };
    use rand::{Rng, SeedableRng};
    use rand_xorshift::XorShiftRng;
    use test_log::test;

    /// Blocks of one MCU as (component, block index) pairs.
    type McuLayout = Vec<(usize, usize)>;

    fn random_block(rng: &mut XorShiftRng, band_end: usize) -> CoefBlock {
        let mut block = [0i16; 64];
        block[0] = rng.random_range(-1000..=1000);
        for &pos in &NATURAL_ORDER[8][1..band_end] {
            if rng.random_bool(0.3) {
                let magnitude = if rng.random_bool(0.8) { 7 } else { 1023 };
                block[pos as usize] = rng.random_range(-magnitude..=magnitude);
            }
        }
        block
    }

    /// Some blocks carry only low frequencies so AC scans build EOB runs.
    fn random_component(rng: &mut XorShiftRng, count: usize) -> Vec<CoefBlock> {
        const BANDS: [usize; 3] = [DCTSIZE2, 6, 1];
        (0..count)
            .map(|i| random_block(rng, BANDS[i % BANDS.len()]))
            .collect()
    }

    fn blocks_of(frame: &[Vec<CoefBlock>], mcu: &McuLayout) -> Vec<CoefBlock> {
        mcu.iter().map(|&(c, b)| frame[c][b]).collect()
    }

    fn single_component_layout(component: usize, count: usize) -> Vec<McuLayout> {
        (0..count).map(|b| vec![(component, b)]).collect()
    }

    /// Encodes one scan of `original` with gathered tables and decodes it
    /// into `decoded`. Returns the scan's entropy-coded size.
    fn run_scan(
        scan: &ScanInfo,
        layout: &[McuLayout],
        original: &[Vec<CoefBlock>],
        decoded: &mut [Vec<CoefBlock>],
        status: &mut ProgressionStatus,
    ) -> usize {
        let mut gather = EntropyEncoder::new_gather(scan).unwrap();
        for mcu in layout {
            gather.gather_mcu(&blocks_of(original, mcu)).unwrap();
        }
        let tables = gather.finish_gather().unwrap();

        let mut encoder = EntropyEncoder::new(scan, &tables).unwrap();
        let mut data = Vec::new();
        for mcu in layout {
            assert_eq!(
                encoder.encode_mcu(&mut data, &blocks_of(original, mcu)).unwrap(),
                CodingStatus::Complete
            );
        }
        assert_eq!(encoder.finish_pass(&mut data).unwrap(), CodingStatus::Complete);
        let coded_len = data.len();
        data.extend_from_slice(&[0xFF, 0xD9]);

        let mut decoder = EntropyDecoder::new(scan, &tables, Some(status)).unwrap();
        let mut source = SliceSource::new(&data);
        for mcu in layout {
            let mut blocks = blocks_of(decoded, mcu);
            assert_eq!(
                decoder.decode_mcu(&mut source, &mut blocks).unwrap(),
                CodingStatus::Complete
            );
            for (&(c, b), block) in mcu.iter().zip(blocks) {
                decoded[c][b] = block;
            }
        }
        decoder.finish_pass();
        assert!(decoder.warnings().is_empty(), "{:?}", decoder.warnings());
        coded_len
    }

    #[test]
    fn successive_approximation_rebuilds_frame() {
        let mut rng = XorShiftRng::seed_from_u64(20);
        // Luma sampled 2x1, one chroma component: 8 and 4 blocks.
        let original = vec![random_component(&mut rng, 8), random_component(&mut rng, 4)];
        let mut decoded = vec![vec![[0i16; 64]; 8], vec![[0i16; 64]; 4]];
        let mut status = ProgressionStatus::new(2);

        let interleaved: Vec<McuLayout> = (0..4)
            .map(|i| vec![(0, 2 * i), (0, 2 * i + 1), (1, i)])
            .collect();
        let luma = single_component_layout(0, 8);
        let chroma = single_component_layout(1, 4);
        let y = || ScanComponent::new(0, 0, 0).with_sampling(2, 1);
        let c = || ScanComponent::new(1, 1, 1);

        let dc_first = ScanInfo::progressive(vec![y(), c()], 0, 0, 0, 1).with_restart_interval(3);
        run_scan(&dc_first, &interleaved, &original, &mut decoded, &mut status);
        let luma_low = ScanInfo::progressive(vec![y()], 1, 5, 0, 2);
        run_scan(&luma_low, &luma, &original, &mut decoded, &mut status);
        let chroma_ac = ScanInfo::progressive(vec![c()], 1, 63, 0, 1);
        run_scan(&chroma_ac, &chroma, &original, &mut decoded, &mut status);
        let luma_high = ScanInfo::progressive(vec![y()], 6, 63, 0, 2);
        run_scan(&luma_high, &luma, &original, &mut decoded, &mut status);

        // First passes deliver the point-transformed values.
        for (got, want) in decoded[0].iter().zip(&original[0]) {
            assert_eq!(got[0], (want[0] >> 1) << 1);
            for k in 1..DCTSIZE2 {
                let magnitude = (want[k].unsigned_abs() >> 2) << 2;
                assert_eq!(got[k].unsigned_abs(), magnitude, "coefficient {k}");
                if magnitude != 0 {
                    assert_eq!(got[k].signum(), want[k].signum());
                }
            }
        }

        let luma_refine_1 =
            ScanInfo::progressive(vec![y()], 1, 63, 2, 1).with_restart_interval(2);
        run_scan(&luma_refine_1, &luma, &original, &mut decoded, &mut status);
        let luma_refine_0 = ScanInfo::progressive(vec![y()], 1, 63, 1, 0);
        run_scan(&luma_refine_0, &luma, &original, &mut decoded, &mut status);
        let chroma_refine = ScanInfo::progressive(vec![c()], 1, 63, 1, 0);
        run_scan(&chroma_refine, &chroma, &original, &mut decoded, &mut status);
        let dc_refine = ScanInfo::progressive(vec![y(), c()], 0, 0, 1, 0);
        run_scan(&dc_refine, &interleaved, &original, &mut decoded, &mut status);

        assert_eq!(decoded, original);
        assert!(status.coef_bits(0).unwrap().iter().all(|&bits| bits == 0));
        assert!(status.coef_bits(1).unwrap().iter().all(|&bits| bits == 0));
    }

    #[test]
    fn empty_bands_collapse_into_one_eob_run() {
        let original = vec![vec![[0i16; 64]; 40]];
        let mut decoded = original.clone();
        let mut status = ProgressionStatus::new(1);
        let layout = single_component_layout(0, 40);
        let dc = ScanInfo::progressive(vec![ScanComponent::new(0, 0, 0)], 0, 0, 0, 0);
        run_scan(&dc, &layout, &original, &mut decoded, &mut status);

        let scan = ScanInfo::progressive(vec![ScanComponent::new(0, 0, 0)], 1, 63, 0, 0);
        // One symbol for a run of 40 plus five run bits.
        let coded_len = run_scan(&scan, &layout, &original, &mut decoded, &mut status);
        assert_eq!(coded_len, 1);
        assert_eq!(decoded, original);
    }

    #[test]
    fn refinement_keeps_earlier_bits_of_negative_coefficients() {
        let mut block = [0i16; 64];
        block[0] = -3;
        block[1] = -5;
        block[8] = 1;
        block[9] = -2;
        let original = vec![vec![block]];
        let mut decoded = vec![vec![[0i16; 64]]];
        let mut status = ProgressionStatus::new(1);
        let comp = || ScanComponent::new(0, 0, 0);
        let layout = single_component_layout(0, 1);

        for (ss, se, ah, al) in [(0, 0, 0, 1), (1, 63, 0, 1), (1, 63, 1, 0), (0, 0, 1, 0)] {
            let scan = ScanInfo::progressive(vec![comp()], ss, se, ah, al);
            run_scan(&scan, &layout, &original, &mut decoded, &mut status);
        }
        assert_eq!(decoded, original);
    }
}
