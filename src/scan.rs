//! Per-scan parameters shared by the entropy encoder and decoder.

use crate::constants::{
    DCTSIZE, DCTSIZE2, MAX_AL, MAX_BLOCKS_IN_MCU, MAX_COMPS_IN_SCAN, NATURAL_ORDER, NUM_HUFF_TBLS,
    NaturalOrder, lim_se,
};
use crate::error::{JpegError, JpegWarning};

/// Result of one encode or decode call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodingStatus {
    /// The unit of work completed and its state is committed.
    Complete,
    /// I/O could not proceed right now. Nothing was committed; supply more
    /// input (or drain output) and repeat the identical call.
    Suspended,
}

/// One component taking part in a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanComponent {
    /// Index of the component within the frame.
    pub component_index: usize,
    pub h_samp_factor: u8,
    pub v_samp_factor: u8,
    pub dc_table: usize,
    pub ac_table: usize,
    /// Edge length of the inverse DCT output the decoder will produce for
    /// this component (1, 2, 4, 8 or 16). Coefficients the inverse DCT
    /// never reads are decoded but not stored.
    pub output_size: usize,
    /// False if the component's coefficients are not wanted at all.
    pub needed: bool,
}

impl ScanComponent {
    pub fn new(component_index: usize, dc_table: usize, ac_table: usize) -> Self {
        Self {
            component_index,
            h_samp_factor: 1,
            v_samp_factor: 1,
            dc_table,
            ac_table,
            output_size: DCTSIZE,
            needed: true,
        }
    }

    pub fn with_sampling(mut self, h: u8, v: u8) -> Self {
        self.h_samp_factor = h;
        self.v_samp_factor = v;
        self
    }

    pub fn with_output_size(mut self, output_size: usize) -> Self {
        self.output_size = output_size;
        self
    }

    fn blocks_in_mcu(&self) -> usize {
        self.h_samp_factor as usize * self.v_samp_factor as usize
    }
}

/// Parameters of one scan: component layout, spectral selection,
/// successive approximation and restart interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanInfo {
    pub components: Vec<ScanComponent>,
    pub ss: u8,
    pub se: u8,
    pub ah: u8,
    pub al: u8,
    /// MCUs per restart interval, 0 if restart markers are not used.
    pub restart_interval: u16,
    pub progressive: bool,
    /// Edge length of the coded DCT blocks (1..=8).
    pub block_size: usize,
}

impl ScanInfo {
    /// A full-band sequential scan over 8x8 blocks.
    pub fn sequential(components: Vec<ScanComponent>) -> Self {
        Self {
            components,
            ss: 0,
            se: lim_se(DCTSIZE) as u8,
            ah: 0,
            al: 0,
            restart_interval: 0,
            progressive: false,
            block_size: DCTSIZE,
        }
    }

    /// A progressive scan over 8x8 blocks.
    pub fn progressive(components: Vec<ScanComponent>, ss: u8, se: u8, ah: u8, al: u8) -> Self {
        Self {
            components,
            ss,
            se,
            ah,
            al,
            restart_interval: 0,
            progressive: true,
            block_size: DCTSIZE,
        }
    }

    pub fn with_restart_interval(mut self, restart_interval: u16) -> Self {
        self.restart_interval = restart_interval;
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self.se = lim_se(block_size.clamp(1, DCTSIZE)) as u8;
        self
    }

    /// Last spectral index a block of this scan's size can carry.
    pub fn lim_se(&self) -> usize {
        lim_se(self.block_size)
    }

    pub fn natural_order(&self) -> &'static NaturalOrder {
        &NATURAL_ORDER[self.block_size]
    }

    pub fn is_dc_scan(&self) -> bool {
        self.ss == 0
    }

    /// Checks the scan for structural and progressive-parameter errors.
    pub fn validate(&self) -> Result<(), JpegError> {
        if self.components.is_empty() || self.components.len() > MAX_COMPS_IN_SCAN {
            return Err(JpegError::BadComponentLayout);
        }
        if !(1..=DCTSIZE).contains(&self.block_size) {
            return Err(JpegError::UnsupportedBlockSize);
        }
        for component in &self.components {
            if component.dc_table >= NUM_HUFF_TBLS || component.ac_table >= NUM_HUFF_TBLS {
                return Err(JpegError::NoHuffmanTable);
            }
            if component.blocks_in_mcu() == 0 {
                return Err(JpegError::BadComponentLayout);
            }
        }
        if self.progressive {
            let ss = self.ss as usize;
            let se = self.se as usize;
            if ss == 0 {
                if se != 0 {
                    return Err(JpegError::BadProgression);
                }
            } else if se < ss || se > self.lim_se() || self.components.len() != 1 {
                return Err(JpegError::BadProgression);
            }
            if self.ah != 0 && self.ah - 1 != self.al {
                return Err(JpegError::BadProgression);
            }
            if self.al > MAX_AL {
                return Err(JpegError::BadProgression);
            }
        }
        self.mcu_membership().map(|_| ())
    }

    /// Maps each block of an MCU to the position of its component in
    /// `components`. A single-component scan codes one block per MCU.
    pub fn mcu_membership(&self) -> Result<Vec<usize>, JpegError> {
        if self.components.len() == 1 {
            return Ok(vec![0]);
        }
        let mut membership = Vec::with_capacity(MAX_BLOCKS_IN_MCU);
        for (ci, component) in self.components.iter().enumerate() {
            for _ in 0..component.blocks_in_mcu() {
                membership.push(ci);
            }
        }
        if membership.len() > MAX_BLOCKS_IN_MCU {
            return Err(JpegError::TooManyBlocksInMcu);
        }
        Ok(membership)
    }
}

/// Per-component record of the successive-approximation bit position each
/// coefficient has reached. Lives for a whole progressive frame.
#[derive(Debug, Clone)]
pub struct ProgressionStatus {
    coef_bits: Vec<[i32; DCTSIZE2]>,
}

impl ProgressionStatus {
    pub fn new(num_components: usize) -> Self {
        Self {
            coef_bits: vec![[-1; DCTSIZE2]; num_components],
        }
    }

    /// Bit positions for one component; -1 means "no scan seen yet".
    pub fn coef_bits(&self, component: usize) -> Option<&[i32; DCTSIZE2]> {
        self.coef_bits.get(component)
    }

    /// Records the scan, reporting every coefficient whose history does not
    /// match the scan's Ah.
    pub(crate) fn update(&mut self, scan: &ScanInfo) -> Result<Vec<JpegWarning>, JpegError> {
        let mut warnings = Vec::new();
        for component in &scan.components {
            let cindex = component.component_index;
            let bits = self
                .coef_bits
                .get_mut(cindex)
                .ok_or(JpegError::InvalidArgument)?;
            if scan.ss != 0 && bits[0] < 0 {
                warnings.push(JpegWarning::BogusProgression {
                    component: cindex,
                    coefficient: 0,
                });
            }
            for coefficient in scan.ss as usize..=scan.se as usize {
                let expected = bits[coefficient].max(0);
                if scan.ah as i32 != expected {
                    warnings.push(JpegWarning::BogusProgression {
                        component: cindex,
                        coefficient,
                    });
                }
                bits[coefficient] = scan.al as i32;
            }
        }
        Ok(warnings)
    }
}
