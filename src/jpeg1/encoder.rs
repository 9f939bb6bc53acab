//! Huffman entropy encoder for sequential and progressive scans
//! (ISO/IEC 10918-1 F.1.2 and G.1.2).
//!
//! The encoder can also run in gather mode, where it only counts symbol
//! frequencies and afterwards produces optimal tables for the same scan.

use crate::byte_io::ByteSink;
use crate::constants::{
    DCTSIZE2, MAX_COEF_BITS, MAX_COMPS_IN_SCAN, MAX_CORR_BITS, MAX_EOBRUN, NaturalOrder,
};
use crate::error::JpegError;
use crate::jpeg_marker_code::JpegMarkerCode;
use crate::jpeg1::CoefBlock;
use crate::jpeg1::bit_writer::BitWriter;
use crate::jpeg1::huffman::{
    EncodeTable, HuffmanTables, SymbolFrequencies, generate_optimal_table, magnitude_bits,
    magnitude_category,
};
use crate::scan::{CodingStatus, ScanInfo};
use crate::tracing_wrappers::*;

/// Encoding routine selected for a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeMode {
    Sequential,
    DcFirst,
    AcFirst,
    DcRefine,
    AcRefine,
}

#[derive(Debug, Clone, Copy)]
struct BlockPlan {
    component: usize,
    /// Indexes into the table (or counter) list of the scan.
    dc_table: usize,
    ac_table: usize,
}

/// Where symbols go: out as codes, or into frequency counters.
enum Coding {
    Emit(Vec<EncodeTable>),
    Gather(Vec<SymbolFrequencies>),
}

pub struct EntropyEncoder {
    mode: EncodeMode,
    coding: Coding,
    /// `(is_dc, slot)` of every entry in the table list.
    slots: Vec<(bool, usize)>,
    blocks: Vec<BlockPlan>,
    natural_order: &'static NaturalOrder,
    ss: usize,
    se: usize,
    al: u32,
    writer: BitWriter,
    last_dc_val: [i32; MAX_COMPS_IN_SCAN],
    eobrun: u32,
    /// Correction bits buffered for the pending EOB run.
    be: usize,
    /// The first `be` entries belong to the EOB run, the rest to the
    /// block being coded.
    corr_bits: Vec<u8>,
    restart_interval: u16,
    restarts_to_go: u16,
    next_restart_num: u8,
    finished: bool,
}

/// Mode, block plans and referenced table slots of a scan.
fn plan_scan(
    scan: &ScanInfo,
) -> Result<(EncodeMode, Vec<BlockPlan>, Vec<(bool, usize)>), JpegError> {
    scan.validate()?;
    let membership = scan.mcu_membership()?;
    let mode = if !scan.progressive {
        EncodeMode::Sequential
    } else {
        match (scan.ss == 0, scan.ah == 0) {
            (true, true) => EncodeMode::DcFirst,
            (true, false) => EncodeMode::DcRefine,
            (false, true) => EncodeMode::AcFirst,
            (false, false) => EncodeMode::AcRefine,
        }
    };
    let needs_dc = matches!(mode, EncodeMode::Sequential | EncodeMode::DcFirst);
    let needs_ac = match mode {
        EncodeMode::Sequential => scan.lim_se() > 0,
        EncodeMode::AcFirst | EncodeMode::AcRefine => true,
        _ => false,
    };

    let mut slots = Vec::new();
    let mut slot_index = |is_dc: bool, slot: usize| {
        if let Some(index) = slots.iter().position(|&s| s == (is_dc, slot)) {
            index
        } else {
            slots.push((is_dc, slot));
            slots.len() - 1
        }
    };
    let mut blocks = Vec::with_capacity(membership.len());
    for &ci in &membership {
        let component = &scan.components[ci];
        let dc_table = if needs_dc {
            slot_index(true, component.dc_table)
        } else {
            0
        };
        let ac_table = if needs_ac {
            slot_index(false, component.ac_table)
        } else {
            dc_table
        };
        blocks.push(BlockPlan {
            component: ci,
            dc_table,
            ac_table,
        });
    }
    Ok((mode, blocks, slots))
}

impl EntropyEncoder {
    /// Prepares a scan that writes codes from `tables`.
    pub fn new(scan: &ScanInfo, tables: &HuffmanTables) -> Result<Self, JpegError> {
        let (mode, blocks, slots) = plan_scan(scan)?;
        let encode_tables = slots
            .iter()
            .map(|&(is_dc, slot)| EncodeTable::build(tables.get(is_dc, slot)?, is_dc))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::with_coding(scan, mode, blocks, slots, Coding::Emit(encode_tables)))
    }

    /// Prepares a scan that only counts symbols. Finish it with
    /// [`EntropyEncoder::finish_gather`].
    pub fn new_gather(scan: &ScanInfo) -> Result<Self, JpegError> {
        let (mode, blocks, slots) = plan_scan(scan)?;
        let counts = vec![[0u64; 257]; slots.len()];
        Ok(Self::with_coding(scan, mode, blocks, slots, Coding::Gather(counts)))
    }

    fn with_coding(
        scan: &ScanInfo,
        mode: EncodeMode,
        blocks: Vec<BlockPlan>,
        slots: Vec<(bool, usize)>,
        coding: Coding,
    ) -> Self {
        let se = if scan.progressive {
            scan.se as usize
        } else {
            scan.lim_se()
        };
        debug!(
            ?mode,
            gather = matches!(coding, Coding::Gather(_)),
            ss = scan.ss,
            se,
            ah = scan.ah,
            al = scan.al,
            restart_interval = scan.restart_interval,
            "starting entropy encoder scan"
        );
        Self {
            mode,
            coding,
            slots,
            blocks,
            natural_order: scan.natural_order(),
            ss: scan.ss as usize,
            se,
            al: scan.al as u32,
            writer: BitWriter::new(),
            last_dc_val: [0; MAX_COMPS_IN_SCAN],
            eobrun: 0,
            be: 0,
            corr_bits: Vec::with_capacity(MAX_CORR_BITS),
            restart_interval: scan.restart_interval,
            restarts_to_go: scan.restart_interval,
            next_restart_num: 0,
            finished: false,
        }
    }

    pub fn mode(&self) -> EncodeMode {
        self.mode
    }

    pub fn is_gathering(&self) -> bool {
        matches!(self.coding, Coding::Gather(_))
    }

    pub fn blocks_in_mcu(&self) -> usize {
        self.blocks.len()
    }

    /// Current DC predictors, indexed by position of the component in the scan.
    pub fn last_dc_values(&self) -> &[i32] {
        &self.last_dc_val
    }

    pub fn eobrun(&self) -> u32 {
        self.eobrun
    }

    /// Encodes one MCU and writes the result to `sink`.
    ///
    /// Output the sink refused stays queued. While anything is queued the
    /// next call returns [`CodingStatus::Suspended`] without encoding; repeat
    /// it once the sink has room.
    pub fn encode_mcu<K: ByteSink + ?Sized>(
        &mut self,
        sink: &mut K,
        blocks: &[CoefBlock],
    ) -> Result<CodingStatus, JpegError> {
        if self.is_gathering() || self.finished {
            return Err(JpegError::InvalidArgument);
        }
        if !self.writer.drain(sink) {
            return Ok(CodingStatus::Suspended);
        }
        self.encode_blocks(blocks)?;
        self.writer.drain(sink);
        Ok(CodingStatus::Complete)
    }

    /// Counts the symbols of one MCU.
    pub fn gather_mcu(&mut self, blocks: &[CoefBlock]) -> Result<(), JpegError> {
        if !self.is_gathering() {
            return Err(JpegError::InvalidArgument);
        }
        self.encode_blocks(blocks)
    }

    /// Flushes a pending EOB run and the last partial byte.
    pub fn finish_pass<K: ByteSink + ?Sized>(
        &mut self,
        sink: &mut K,
    ) -> Result<CodingStatus, JpegError> {
        if self.is_gathering() {
            return Err(JpegError::InvalidArgument);
        }
        if !self.finished {
            self.emit_eobrun()?;
            self.writer.flush();
            self.finished = true;
        }
        if self.writer.drain(sink) {
            Ok(CodingStatus::Complete)
        } else {
            Ok(CodingStatus::Suspended)
        }
    }

    /// Ends a gather pass and builds an optimal table for every slot the
    /// scan used.
    pub fn finish_gather(mut self) -> Result<HuffmanTables, JpegError> {
        if !self.is_gathering() {
            return Err(JpegError::InvalidArgument);
        }
        self.emit_eobrun()?;
        let Coding::Gather(counts) = &self.coding else {
            return Err(JpegError::InvalidArgument);
        };
        let mut tables = HuffmanTables::default();
        for (freq, &(is_dc, slot)) in counts.iter().zip(self.slots.iter()) {
            let table = generate_optimal_table(freq)?;
            if is_dc {
                tables.dc[slot] = Some(table);
            } else {
                tables.ac[slot] = Some(table);
            }
        }
        Ok(tables)
    }

    fn encode_blocks(&mut self, blocks: &[CoefBlock]) -> Result<(), JpegError> {
        if blocks.len() < self.blocks.len() {
            return Err(JpegError::BufferTooSmall);
        }
        if self.restart_interval != 0 && self.restarts_to_go == 0 {
            self.emit_restart()?;
        }

        match self.mode {
            EncodeMode::Sequential => self.encode_sequential(blocks)?,
            EncodeMode::DcFirst => self.encode_dc_first(blocks)?,
            EncodeMode::AcFirst => self.encode_ac_first(&blocks[0])?,
            EncodeMode::DcRefine => self.encode_dc_refine(blocks)?,
            EncodeMode::AcRefine => self.encode_ac_refine(&blocks[0])?,
        }

        if self.restart_interval != 0 {
            if self.restarts_to_go == 0 {
                self.restarts_to_go = self.restart_interval;
                self.next_restart_num = (self.next_restart_num + 1) & 7;
            }
            self.restarts_to_go -= 1;
        }
        Ok(())
    }

    fn emit_symbol(&mut self, table: usize, symbol: u8) -> Result<(), JpegError> {
        match &mut self.coding {
            Coding::Emit(tables) => {
                let (code, size) = tables[table].lookup(symbol);
                self.writer.emit_bits(code as u32, size as u32)
            }
            Coding::Gather(counts) => {
                counts[table][symbol as usize] += 1;
                Ok(())
            }
        }
    }

    fn emit_bits(&mut self, bits: u32, size: u32) -> Result<(), JpegError> {
        if size == 0 {
            return Err(JpegError::MissingHuffmanCode);
        }
        if self.is_gathering() {
            return Ok(());
        }
        self.writer.emit_bits(bits, size)
    }

    /// Writes correction bits `[start, end)` of the buffer.
    fn emit_correction_bits(&mut self, start: usize, end: usize) -> Result<(), JpegError> {
        for i in start..end {
            let bit = self.corr_bits[i];
            self.emit_bits(bit as u32, 1)?;
        }
        Ok(())
    }

    /// Writes and drops the correction bits of the current block.
    fn emit_block_corrections(&mut self) -> Result<(), JpegError> {
        self.emit_correction_bits(self.be, self.corr_bits.len())?;
        self.corr_bits.truncate(self.be);
        Ok(())
    }

    /// Emits the pending EOB run together with its correction bits.
    fn emit_eobrun(&mut self) -> Result<(), JpegError> {
        if self.eobrun == 0 {
            return Ok(());
        }
        let nbits = u32::BITS - 1 - self.eobrun.leading_zeros();
        if nbits > 14 {
            return Err(JpegError::MissingHuffmanCode);
        }
        let ac_table = self.blocks[0].ac_table;
        self.emit_symbol(ac_table, (nbits << 4) as u8)?;
        if nbits != 0 {
            self.emit_bits(self.eobrun, nbits)?;
        }
        self.eobrun = 0;

        self.emit_correction_bits(0, self.be)?;
        self.corr_bits.drain(..self.be);
        self.be = 0;
        Ok(())
    }

    fn emit_restart(&mut self) -> Result<(), JpegError> {
        if self.mode != EncodeMode::Sequential {
            self.emit_eobrun()?;
        }
        if !self.is_gathering() {
            self.writer.flush();
            self.writer
                .emit_marker(JpegMarkerCode::restart(self.next_restart_num));
            trace!(restart = self.next_restart_num, "RST marker");
        }
        if self.ss == 0 {
            self.last_dc_val = [0; MAX_COMPS_IN_SCAN];
        } else {
            self.eobrun = 0;
            self.be = 0;
            self.corr_bits.clear();
        }
        Ok(())
    }

    fn encode_dc_difference(&mut self, table: usize, diff: i32) -> Result<(), JpegError> {
        let nbits = magnitude_category(diff);
        if nbits > MAX_COEF_BITS + 1 {
            return Err(JpegError::BadDctCoefficient);
        }
        self.emit_symbol(table, nbits as u8)?;
        if nbits != 0 {
            self.emit_bits(magnitude_bits(diff), nbits)?;
        }
        Ok(())
    }

    fn encode_sequential(&mut self, blocks: &[CoefBlock]) -> Result<(), JpegError> {
        for blkn in 0..self.blocks.len() {
            let plan = self.blocks[blkn];
            let block = &blocks[blkn];

            let dc = block[0] as i32;
            let diff = dc - self.last_dc_val[plan.component];
            self.last_dc_val[plan.component] = dc;
            self.encode_dc_difference(plan.dc_table, diff)?;

            let mut r = 0u32;
            for k in 1..=self.se {
                let value = block[self.natural_order[k] as usize] as i32;
                if value == 0 {
                    r += 1;
                    continue;
                }
                while r > 15 {
                    self.emit_symbol(plan.ac_table, 0xF0)?;
                    r -= 16;
                }
                let nbits = magnitude_category(value);
                if nbits > MAX_COEF_BITS {
                    return Err(JpegError::BadDctCoefficient);
                }
                self.emit_symbol(plan.ac_table, ((r << 4) + nbits) as u8)?;
                self.emit_bits(magnitude_bits(value), nbits)?;
                r = 0;
            }
            if r > 0 {
                self.emit_symbol(plan.ac_table, 0)?;
            }
        }
        Ok(())
    }

    fn encode_dc_first(&mut self, blocks: &[CoefBlock]) -> Result<(), JpegError> {
        for blkn in 0..self.blocks.len() {
            let plan = self.blocks[blkn];
            // Arithmetic shift: point transform of the DC coefficient.
            let dc = (blocks[blkn][0] as i32) >> self.al;
            let diff = dc - self.last_dc_val[plan.component];
            self.last_dc_val[plan.component] = dc;
            self.encode_dc_difference(plan.dc_table, diff)?;
        }
        Ok(())
    }

    fn encode_ac_first(&mut self, block: &CoefBlock) -> Result<(), JpegError> {
        let ac_table = self.blocks[0].ac_table;
        let mut r = 0u32;
        for k in self.ss..=self.se {
            let value = block[self.natural_order[k] as usize] as i32;
            // Point transform of the magnitude; values shifted to zero join the run.
            let magnitude = value.unsigned_abs() >> self.al;
            if magnitude == 0 {
                r += 1;
                continue;
            }
            let bits = if value < 0 { !magnitude } else { magnitude };

            self.emit_eobrun()?;
            while r > 15 {
                self.emit_symbol(ac_table, 0xF0)?;
                r -= 16;
            }
            let nbits = u32::BITS - magnitude.leading_zeros();
            if nbits > MAX_COEF_BITS {
                return Err(JpegError::BadDctCoefficient);
            }
            self.emit_symbol(ac_table, ((r << 4) + nbits) as u8)?;
            self.emit_bits(bits, nbits)?;
            r = 0;
        }

        if r > 0 {
            self.eobrun += 1;
            if self.eobrun == MAX_EOBRUN {
                self.emit_eobrun()?;
            }
        }
        Ok(())
    }

    fn encode_dc_refine(&mut self, blocks: &[CoefBlock]) -> Result<(), JpegError> {
        for block in blocks.iter().take(self.blocks.len()) {
            let bit = ((block[0] as i32) >> self.al) as u32;
            self.emit_bits(bit, 1)?;
        }
        Ok(())
    }

    fn encode_ac_refine(&mut self, block: &CoefBlock) -> Result<(), JpegError> {
        let ac_table = self.blocks[0].ac_table;
        let mut absvalues = [0u32; DCTSIZE2];
        // Last coefficient that becomes nonzero in this pass.
        let mut eob = 0;
        for k in self.ss..=self.se {
            let magnitude = (block[self.natural_order[k] as usize] as i32).unsigned_abs() >> self.al;
            absvalues[k] = magnitude;
            if magnitude == 1 {
                eob = k;
            }
        }

        let mut r = 0u32;
        for k in self.ss..=self.se {
            let magnitude = absvalues[k];
            if magnitude == 0 {
                r += 1;
                continue;
            }

            // ZRL is only needed while a newly nonzero coefficient follows.
            while r > 15 && k <= eob {
                self.emit_eobrun()?;
                self.emit_symbol(ac_table, 0xF0)?;
                r -= 16;
                self.emit_block_corrections()?;
            }

            if magnitude > 1 {
                // Previously nonzero: only its next bit is sent, later.
                self.corr_bits.push((magnitude & 1) as u8);
                continue;
            }

            self.emit_eobrun()?;
            self.emit_symbol(ac_table, ((r << 4) + 1) as u8)?;
            let sign = (block[self.natural_order[k] as usize] >= 0) as u32;
            self.emit_bits(sign, 1)?;
            self.emit_block_corrections()?;
            r = 0;
        }

        let br = self.corr_bits.len() - self.be;
        if r > 0 || br > 0 {
            self.eobrun += 1;
            self.be += br;
            if self.eobrun == MAX_EOBRUN || self.be > MAX_CORR_BITS - DCTSIZE2 + 1 {
                self.emit_eobrun()?;
            }
        }
        Ok(())
    }
}
