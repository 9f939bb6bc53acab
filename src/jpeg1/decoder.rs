//! Huffman entropy decoder for sequential and progressive scans
//! (ISO/IEC 10918-1 F.2.2 and G.2).
//!
//! Every MCU is decoded against a working copy of the bit buffer and scan
//! state. The copy is committed only when the whole MCU succeeds, so a
//! suspended call can be repeated once more input is available.

use crate::byte_io::ByteSource;
use crate::constants::{
    DCTSIZE, DCTSIZE2, MAX_COMPS_IN_SCAN, NATURAL_ORDER, NaturalOrder, zigzag_index,
};
use crate::error::{JpegError, JpegWarning};
use crate::jpeg_marker_code::{JPEG_MARKER_START_BYTE, JpegMarkerCode};
use crate::jpeg1::CoefBlock;
use crate::jpeg1::bit_reader::{BitReader, BitState, SegmentState};
use crate::jpeg1::huffman::{DecodeTable, HuffmanTables, extend};
use crate::scan::{CodingStatus, ProgressionStatus, ScanInfo};
use crate::tracing_wrappers::*;

/// Decoding routine selected for a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    /// Sequential scan over 8x8 blocks.
    Sequential,
    /// Sequential scan over smaller blocks.
    SequentialScaled,
    DcFirst,
    AcFirst,
    DcRefine,
    AcRefine,
}

/// Decoding plan for one block position of the MCU.
#[derive(Debug, Clone, Copy)]
struct BlockPlan {
    /// Position of the block's component within the scan.
    component: usize,
    /// Indexes into `EntropyDecoder::tables`.
    dc_table: usize,
    ac_table: usize,
    /// Coefficients (in zig-zag order) worth storing; 0 drops the block.
    coef_limit: usize,
}

/// Scan state that is rolled back when an MCU suspends.
#[derive(Debug, Clone, Copy, Default)]
struct SavedState {
    last_dc_val: [i32; MAX_COMPS_IN_SCAN],
    eobrun: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResyncAction {
    /// Drop the marker and carry on decoding.
    Discard,
    /// Skip to the following marker and decide again.
    SkipAhead,
    /// Leave the marker pending; the segment decodes as empty.
    Leave,
}

pub struct EntropyDecoder {
    mode: DecodeMode,
    tables: Vec<DecodeTable>,
    blocks: Vec<BlockPlan>,
    num_components: usize,
    natural_order: &'static NaturalOrder,
    ss: usize,
    se: usize,
    al: u8,
    bitstate: BitState,
    saved: SavedState,
    restart_interval: u16,
    restarts_to_go: u16,
    next_restart_num: u8,
    segment: SegmentState,
}

/// Coefficients an inverse DCT of `output_size` reads from a block of
/// `block_size`, counted in zig-zag order.
fn coef_limit(block_size: usize, output_size: usize) -> usize {
    let n = if output_size == 0 || output_size > block_size {
        block_size
    } else {
        output_size
    };
    1 + zigzag_index(block_size, n - 1, n - 1)
}

/// Derives `table` once and returns its index in `derived`.
fn derive_table(
    derived: &mut Vec<DecodeTable>,
    slots: &mut [Option<usize>; 8],
    tables: &HuffmanTables,
    is_dc: bool,
    slot: usize,
) -> Result<usize, JpegError> {
    let key = if is_dc { slot } else { 4 + slot };
    if let Some(index) = slots.get(key).copied().flatten() {
        return Ok(index);
    }
    let table = DecodeTable::build(tables.get(is_dc, slot)?, is_dc)?;
    derived.push(table);
    slots[key] = Some(derived.len() - 1);
    Ok(derived.len() - 1)
}

fn peek_byte<S: ByteSource + ?Sized>(source: &mut S, pos: usize) -> Option<u8> {
    loop {
        if let Some(&byte) = source.bytes().get(pos) {
            return Some(byte);
        }
        if !source.fill() {
            return None;
        }
    }
}

impl EntropyDecoder {
    /// Prepares a scan. Progressive scans need the frame's
    /// [`ProgressionStatus`], which is checked and updated here.
    pub fn new(
        scan: &ScanInfo,
        tables: &HuffmanTables,
        progression: Option<&mut ProgressionStatus>,
    ) -> Result<Self, JpegError> {
        scan.validate()?;
        let membership = scan.mcu_membership()?;
        let lim_se = scan.lim_se();
        let mut segment = SegmentState::default();
        let mut derived = Vec::new();
        let mut slots = [None; 8];
        let mut blocks = Vec::with_capacity(membership.len());

        let (mode, se) = if scan.progressive {
            let progression = progression.ok_or(JpegError::InvalidArgument)?;
            let mode = match (scan.ss == 0, scan.ah == 0) {
                (true, true) => DecodeMode::DcFirst,
                (true, false) => DecodeMode::DcRefine,
                (false, true) => DecodeMode::AcFirst,
                (false, false) => DecodeMode::AcRefine,
            };
            for &ci in &membership {
                let component = &scan.components[ci];
                let (dc_table, ac_table) = match mode {
                    DecodeMode::DcFirst => {
                        let dc = derive_table(
                            &mut derived,
                            &mut slots,
                            tables,
                            true,
                            component.dc_table,
                        )?;
                        (dc, dc)
                    }
                    DecodeMode::AcFirst | DecodeMode::AcRefine => {
                        let ac = derive_table(
                            &mut derived,
                            &mut slots,
                            tables,
                            false,
                            component.ac_table,
                        )?;
                        (ac, ac)
                    }
                    // Refinement bits are raw; no table is read.
                    _ => (0, 0),
                };
                blocks.push(BlockPlan {
                    component: ci,
                    dc_table,
                    ac_table,
                    coef_limit: DCTSIZE2,
                });
            }
            // Only a scan that can actually run is recorded.
            for warning in progression.update(scan)? {
                segment.warn(warning);
            }
            (mode, scan.se as usize)
        } else {
            if scan.ss != 0 || scan.ah != 0 || scan.al != 0 || scan.se as usize != lim_se {
                segment.warn(JpegWarning::NotSequential);
            }
            for &ci in &membership {
                let component = &scan.components[ci];
                let dc_table =
                    derive_table(&mut derived, &mut slots, tables, true, component.dc_table)?;
                // A 1x1 block has no AC band and needs no AC table.
                let ac_table = if lim_se > 0 {
                    derive_table(&mut derived, &mut slots, tables, false, component.ac_table)?
                } else {
                    dc_table
                };
                let coef_limit = if component.needed {
                    coef_limit(scan.block_size, component.output_size)
                } else {
                    0
                };
                blocks.push(BlockPlan {
                    component: ci,
                    dc_table,
                    ac_table,
                    coef_limit,
                });
            }
            let mode = if lim_se == DCTSIZE2 - 1 {
                DecodeMode::Sequential
            } else {
                DecodeMode::SequentialScaled
            };
            (mode, lim_se)
        };

        debug!(
            ?mode,
            ss = scan.ss,
            se,
            ah = scan.ah,
            al = scan.al,
            restart_interval = scan.restart_interval,
            "starting entropy decoder scan"
        );

        Ok(Self {
            mode,
            tables: derived,
            blocks,
            num_components: scan.components.len(),
            natural_order: scan.natural_order(),
            ss: scan.ss as usize,
            se,
            al: scan.al,
            bitstate: BitState::default(),
            saved: SavedState::default(),
            restart_interval: scan.restart_interval,
            restarts_to_go: scan.restart_interval,
            next_restart_num: 0,
            segment,
        })
    }

    pub fn mode(&self) -> DecodeMode {
        self.mode
    }

    /// Number of coefficient blocks each MCU of this scan fills.
    pub fn blocks_in_mcu(&self) -> usize {
        self.blocks.len()
    }

    /// Decodes one MCU into `blocks`.
    ///
    /// Sequential and first-pass progressive scans only write nonzero
    /// coefficients, so their blocks must be zeroed by the caller.
    /// Refinement scans update the blocks of earlier scans in place.
    pub fn decode_mcu<S: ByteSource + ?Sized>(
        &mut self,
        source: &mut S,
        blocks: &mut [CoefBlock],
    ) -> Result<CodingStatus, JpegError> {
        if blocks.len() < self.blocks.len() {
            return Err(JpegError::BufferTooSmall);
        }
        if self.restart_interval != 0 && self.restarts_to_go == 0 && !self.process_restart(source)
        {
            return Ok(CodingStatus::Suspended);
        }

        let complete = match self.mode {
            DecodeMode::Sequential => self.decode_sequential::<S, true>(source, blocks),
            DecodeMode::SequentialScaled => self.decode_sequential::<S, false>(source, blocks),
            DecodeMode::DcFirst => self.decode_dc_first(source, blocks),
            DecodeMode::AcFirst => self.decode_ac_first(source, blocks),
            DecodeMode::DcRefine => self.decode_dc_refine(source, blocks),
            DecodeMode::AcRefine => self.decode_ac_refine(source, blocks),
        };
        if !complete {
            return Ok(CodingStatus::Suspended);
        }
        if self.restart_interval != 0 {
            self.restarts_to_go -= 1;
        }
        Ok(CodingStatus::Complete)
    }

    /// Ends the scan, throwing away buffered bits. Whole bytes among them
    /// are reported as extraneous data.
    pub fn finish_pass(&mut self) {
        self.bitstate.discard(&mut self.segment);
        if self.segment.discarded_bytes != 0 {
            let count = self.segment.discarded_bytes;
            self.segment.discarded_bytes = 0;
            self.segment.warn(JpegWarning::ExtraneousData {
                count,
                marker: self.segment.unread_marker,
            });
        }
    }

    /// Marker that ended the entropy-coded data, if one has been read.
    pub fn unread_marker(&self) -> Option<u8> {
        (self.segment.unread_marker != 0).then_some(self.segment.unread_marker)
    }

    /// Hands the pending marker over to the caller.
    pub fn take_unread_marker(&mut self) -> Option<u8> {
        let marker = self.unread_marker();
        self.segment.unread_marker = 0;
        marker
    }

    pub fn insufficient_data(&self) -> bool {
        self.segment.insufficient_data
    }

    /// Whole bytes skipped since the last reported marker.
    pub fn discarded_bytes(&self) -> usize {
        self.segment.discarded_bytes
    }

    pub fn warnings(&self) -> &[JpegWarning] {
        &self.segment.warnings
    }

    /// Current DC predictors, one per scan component.
    pub fn last_dc_values(&self) -> &[i32] {
        &self.saved.last_dc_val[..self.num_components]
    }

    pub fn eobrun(&self) -> u32 {
        self.saved.eobrun
    }

    pub fn restarts_to_go(&self) -> u16 {
        self.restarts_to_go
    }

    fn process_restart<S: ByteSource + ?Sized>(&mut self, source: &mut S) -> bool {
        self.bitstate.discard(&mut self.segment);
        if !self.read_restart_marker(source) {
            return false;
        }
        self.saved = SavedState::default();
        self.restarts_to_go = self.restart_interval;
        // Right up against another marker the next segment is empty, so
        // keep producing zeros rather than reading past it.
        if self.segment.unread_marker == 0 {
            self.segment.insufficient_data = false;
        }
        true
    }

    fn read_restart_marker<S: ByteSource + ?Sized>(&mut self, source: &mut S) -> bool {
        if self.segment.unread_marker == 0 && !self.next_marker(source) {
            return false;
        }
        if self.segment.unread_marker == JpegMarkerCode::restart(self.next_restart_num) {
            trace!(restart = self.next_restart_num, "RST marker");
            self.segment.unread_marker = 0;
        } else if !self.resync_to_restart(source) {
            return false;
        }
        self.next_restart_num = (self.next_restart_num + 1) & 7;
        true
    }

    /// Scans forward to the next marker, consuming everything up to and
    /// including it. Progress survives a suspension.
    fn next_marker<S: ByteSource + ?Sized>(&mut self, source: &mut S) -> bool {
        let marker = loop {
            let Some(mut c) = peek_byte(source, 0) else {
                return false;
            };
            while c != JPEG_MARKER_START_BYTE {
                self.segment.discarded_bytes += 1;
                source.consume(1);
                let Some(next) = peek_byte(source, 0) else {
                    return false;
                };
                c = next;
            }
            let mut pos = 1;
            loop {
                let Some(next) = peek_byte(source, pos) else {
                    return false;
                };
                pos += 1;
                c = next;
                if c != JPEG_MARKER_START_BYTE {
                    break;
                }
            }
            source.consume(pos);
            if c != 0 {
                break c;
            }
            // A stuffed FF 00 data byte: keep searching.
            self.segment.discarded_bytes += 2;
        };

        if self.segment.discarded_bytes != 0 {
            let count = self.segment.discarded_bytes;
            self.segment.discarded_bytes = 0;
            self.segment
                .warn(JpegWarning::ExtraneousData { count, marker });
        }
        self.segment.unread_marker = marker;
        true
    }

    /// Recovers from a missing or out-of-sequence restart marker.
    fn resync_to_restart<S: ByteSource + ?Sized>(&mut self, source: &mut S) -> bool {
        let desired = self.next_restart_num;
        let mut marker = self.segment.unread_marker;
        self.segment.warn(JpegWarning::MustResync {
            marker,
            expected: desired,
        });
        loop {
            let action = if marker < JpegMarkerCode::StartOfFrameBaseline as u8 {
                ResyncAction::SkipAhead
            } else if !JpegMarkerCode::is_restart(marker) {
                ResyncAction::Leave
            } else if marker == JpegMarkerCode::restart(desired.wrapping_add(1))
                || marker == JpegMarkerCode::restart(desired.wrapping_add(2))
            {
                ResyncAction::Leave
            } else if marker == JpegMarkerCode::restart(desired.wrapping_sub(1))
                || marker == JpegMarkerCode::restart(desired.wrapping_sub(2))
            {
                ResyncAction::SkipAhead
            } else {
                ResyncAction::Discard
            };
            debug!(
                marker = ?JpegMarkerCode::try_from(marker).ok(),
                ?action,
                "restart marker resync"
            );
            match action {
                ResyncAction::Discard => {
                    self.segment.unread_marker = 0;
                    return true;
                }
                ResyncAction::SkipAhead => {
                    if !self.next_marker(source) {
                        return false;
                    }
                    marker = self.segment.unread_marker;
                }
                ResyncAction::Leave => return true,
            }
        }
    }

    fn decode_sequential<S: ByteSource + ?Sized, const FULL: bool>(
        &mut self,
        source: &mut S,
        blocks: &mut [CoefBlock],
    ) -> bool {
        // Out of data: leave the blocks zero for the rest of the segment.
        if self.segment.insufficient_data {
            return true;
        }
        let (natural_order, se) = if FULL {
            (&NATURAL_ORDER[DCTSIZE], DCTSIZE2 - 1)
        } else {
            (self.natural_order, self.se)
        };
        let mut state = self.saved;
        let mut bits = BitReader::load(source, &mut self.segment, self.bitstate);

        for (plan, block) in self.blocks.iter().zip(blocks.iter_mut()) {
            let dc_table = &self.tables[plan.dc_table];
            let ac_table = &self.tables[plan.ac_table];

            let Some(s) = bits.decode(dc_table) else {
                return false;
            };
            let s = s as u32;
            let mut k = 1;
            if plan.coef_limit > 0 {
                let mut diff = 0;
                if s != 0 {
                    if !bits.ensure(s) {
                        return false;
                    }
                    diff = extend(bits.get_bits(s) as i32, s);
                }
                let dc = state.last_dc_val[plan.component].wrapping_add(diff);
                state.last_dc_val[plan.component] = dc;
                block[0] = dc as i16;

                let mut end_of_block = false;
                while k < plan.coef_limit {
                    let Some(rs) = bits.decode(ac_table) else {
                        return false;
                    };
                    let r = (rs >> 4) as usize;
                    let s = (rs & 15) as u32;
                    if s != 0 {
                        k += r;
                        if !bits.ensure(s) {
                            return false;
                        }
                        let value = extend(bits.get_bits(s) as i32, s);
                        // A zero run can jump past the window the IDCT reads.
                        if k < plan.coef_limit {
                            block[natural_order[k] as usize] = value as i16;
                        }
                    } else {
                        if r != 15 {
                            end_of_block = true;
                            break;
                        }
                        k += 15;
                    }
                    k += 1;
                }
                if end_of_block {
                    continue;
                }
            } else if s != 0 {
                if !bits.ensure(s) {
                    return false;
                }
                bits.drop_bits(s);
            }

            // Remaining coefficients are parsed but not stored.
            while k <= se {
                let Some(rs) = bits.decode(ac_table) else {
                    return false;
                };
                let r = (rs >> 4) as usize;
                let s = (rs & 15) as u32;
                if s != 0 {
                    k += r;
                    if !bits.ensure(s) {
                        return false;
                    }
                    bits.drop_bits(s);
                } else {
                    if r != 15 {
                        break;
                    }
                    k += 15;
                }
                k += 1;
            }
        }

        self.bitstate = bits.save();
        self.saved = state;
        true
    }

    fn decode_dc_first<S: ByteSource + ?Sized>(
        &mut self,
        source: &mut S,
        blocks: &mut [CoefBlock],
    ) -> bool {
        if self.segment.insufficient_data {
            return true;
        }
        let al = self.al as u32;
        let mut state = self.saved;
        let mut bits = BitReader::load(source, &mut self.segment, self.bitstate);

        for (plan, block) in self.blocks.iter().zip(blocks.iter_mut()) {
            let Some(s) = bits.decode(&self.tables[plan.dc_table]) else {
                return false;
            };
            let s = s as u32;
            let mut diff = 0;
            if s != 0 {
                if !bits.ensure(s) {
                    return false;
                }
                diff = extend(bits.get_bits(s) as i32, s);
            }
            let dc = state.last_dc_val[plan.component].wrapping_add(diff);
            state.last_dc_val[plan.component] = dc;
            block[0] = dc.wrapping_shl(al) as i16;
        }

        self.bitstate = bits.save();
        self.saved = state;
        true
    }

    fn decode_ac_first<S: ByteSource + ?Sized>(
        &mut self,
        source: &mut S,
        blocks: &mut [CoefBlock],
    ) -> bool {
        if self.segment.insufficient_data {
            return true;
        }
        let mut eobrun = self.saved.eobrun;
        if eobrun > 0 {
            // Still inside a run of empty bands.
            eobrun -= 1;
        } else {
            let al = self.al as u32;
            let table = &self.tables[self.blocks[0].ac_table];
            let block = &mut blocks[0];
            let mut bits = BitReader::load(source, &mut self.segment, self.bitstate);
            let mut k = self.ss;
            while k <= self.se {
                let Some(rs) = bits.decode(table) else {
                    return false;
                };
                let r = (rs >> 4) as u32;
                let s = (rs & 15) as u32;
                if s != 0 {
                    k += r as usize;
                    if !bits.ensure(s) {
                        return false;
                    }
                    let value = extend(bits.get_bits(s) as i32, s);
                    block[self.natural_order[k] as usize] = value.wrapping_shl(al) as i16;
                } else {
                    if r != 15 {
                        // EOBr: a run of 2^r + extra bits bands, this one included.
                        if r != 0 {
                            if !bits.ensure(r) {
                                return false;
                            }
                            eobrun = (1 << r) + bits.get_bits(r) - 1;
                        }
                        break;
                    }
                    k += 15;
                }
                k += 1;
            }
            self.bitstate = bits.save();
        }
        self.saved.eobrun = eobrun;
        true
    }

    fn decode_dc_refine<S: ByteSource + ?Sized>(
        &mut self,
        source: &mut S,
        blocks: &mut [CoefBlock],
    ) -> bool {
        let p1 = 1i16 << self.al;
        let mut bits = BitReader::load(source, &mut self.segment, self.bitstate);
        for block in blocks.iter_mut().take(self.blocks.len()) {
            if !bits.ensure(1) {
                return false;
            }
            // OR-ing makes a repeated attempt harmless.
            if bits.get_bits(1) != 0 {
                block[0] |= p1;
            }
        }
        self.bitstate = bits.save();
        true
    }

    fn decode_ac_refine<S: ByteSource + ?Sized>(
        &mut self,
        source: &mut S,
        blocks: &mut [CoefBlock],
    ) -> bool {
        if self.segment.insufficient_data {
            return true;
        }
        let p1 = 1i16 << self.al;
        let m1 = -1i16 << self.al;
        let se = self.se;
        let natural_order = self.natural_order;
        let table = &self.tables[self.blocks[0].ac_table];
        let block = &mut blocks[0];
        let mut eobrun = self.saved.eobrun;

        // Coefficients made nonzero by this attempt, undone on suspension.
        // Correction bits on older coefficients need no undo: a bit that was
        // already applied is recognized by the p1 bit being set.
        let mut newnz_pos = [0u8; DCTSIZE2];
        let mut num_newnz = 0;

        let mut bits = BitReader::load(source, &mut self.segment, self.bitstate);
        let mut k = self.ss;
        let complete = 'decode: {
            if eobrun == 0 {
                while k <= se {
                    let Some(rs) = bits.decode(table) else {
                        break 'decode false;
                    };
                    let mut r = (rs >> 4) as i32;
                    let size = rs & 15;
                    let mut s = 0i16;
                    if size != 0 {
                        if size != 1 {
                            bits.warn(JpegWarning::BadHuffmanCode);
                        }
                        if !bits.ensure(1) {
                            break 'decode false;
                        }
                        s = if bits.get_bits(1) != 0 { p1 } else { m1 };
                    } else if r != 15 {
                        eobrun = 1 << r;
                        if r != 0 {
                            if !bits.ensure(r as u32) {
                                break 'decode false;
                            }
                            eobrun += bits.get_bits(r as u32);
                        }
                        break;
                    }

                    // Walk past r zero coefficients, refining nonzero ones on the way.
                    loop {
                        let coef = &mut block[natural_order[k] as usize];
                        if *coef != 0 {
                            if !bits.ensure(1) {
                                break 'decode false;
                            }
                            if bits.get_bits(1) != 0 && (*coef & p1) == 0 {
                                *coef = if *coef >= 0 {
                                    coef.wrapping_add(p1)
                                } else {
                                    coef.wrapping_add(m1)
                                };
                            }
                        } else {
                            r -= 1;
                            if r < 0 {
                                break;
                            }
                        }
                        k += 1;
                        if k > se {
                            break;
                        }
                    }
                    if s != 0 {
                        let pos = natural_order[k];
                        block[pos as usize] = s;
                        newnz_pos[num_newnz] = pos;
                        num_newnz += 1;
                    }
                    k += 1;
                }
            }

            if eobrun > 0 {
                // Inside an EOB run only correction bits remain.
                loop {
                    let coef = &mut block[natural_order[k] as usize];
                    if *coef != 0 {
                        if !bits.ensure(1) {
                            break 'decode false;
                        }
                        if bits.get_bits(1) != 0 && (*coef & p1) == 0 {
                            *coef = if *coef >= 0 {
                                coef.wrapping_add(p1)
                            } else {
                                coef.wrapping_add(m1)
                            };
                        }
                    }
                    k += 1;
                    if k > se {
                        break;
                    }
                }
                eobrun -= 1;
            }
            true
        };

        if !complete {
            for &pos in newnz_pos[..num_newnz].iter().rev() {
                block[pos as usize] = 0;
            }
            return false;
        }
        self.bitstate = bits.save();
        self.saved.eobrun = eobrun;
        true
    }
}
