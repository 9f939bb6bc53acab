//! Bit packing for entropy-coded segments, with 0xFF byte stuffing.

use crate::byte_io::ByteSink;
use crate::error::JpegError;
use crate::jpeg_marker_code::JPEG_MARKER_START_BYTE;

/// Packs codes MSB-first into bytes. Completed bytes queue up in a pending
/// buffer until they are drained into a [`ByteSink`].
#[derive(Debug, Default)]
pub(crate) struct BitWriter {
    /// Left-aligned in the low 24 bits; at most 7 bits are carried over.
    put_buffer: u32,
    put_bits: u32,
    pending: Vec<u8>,
    drained: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the low `size` bits of `code`. A zero size means the symbol
    /// has no code in the active table.
    pub fn emit_bits(&mut self, code: u32, size: u32) -> Result<(), JpegError> {
        if size == 0 {
            return Err(JpegError::MissingHuffmanCode);
        }
        let mut put_buffer = code & ((1 << size) - 1);
        let mut put_bits = self.put_bits + size;
        put_buffer <<= 24 - put_bits;
        put_buffer |= self.put_buffer;

        while put_bits >= 8 {
            let c = ((put_buffer >> 16) & 0xFF) as u8;
            self.pending.push(c);
            if c == JPEG_MARKER_START_BYTE {
                self.pending.push(0);
            }
            put_buffer = (put_buffer << 8) & 0xFF_FFFF;
            put_bits -= 8;
        }
        self.put_buffer = put_buffer;
        self.put_bits = put_bits;
        Ok(())
    }

    /// Pads the last partial byte with one bits and resets the bit state.
    pub fn flush(&mut self) {
        if self.put_bits > 0 {
            // Seven one bits never form a complete code, so this cannot fail.
            let _ = self.emit_bits(0x7F, 7);
        }
        self.put_buffer = 0;
        self.put_bits = 0;
    }

    /// Queues a marker. The bit buffer must be flushed first.
    pub fn emit_marker(&mut self, code: u8) {
        self.pending.push(JPEG_MARKER_START_BYTE);
        self.pending.push(code);
    }

    /// Bytes produced but not yet accepted by a sink.
    pub fn pending(&self) -> &[u8] {
        &self.pending[self.drained..]
    }

    /// Hands pending bytes to `sink`. Returns true once nothing is pending.
    pub fn drain<K: ByteSink + ?Sized>(&mut self, sink: &mut K) -> bool {
        while self.drained < self.pending.len() {
            if !sink.put_byte(self.pending[self.drained]) {
                return false;
            }
            self.drained += 1;
        }
        self.pending.clear();
        self.drained = 0;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::byte_io::BoundedSink;

    #[test]
    fn packs_and_stuffs() {
        let mut writer = BitWriter::new();
        writer.emit_bits(0x01, 2).unwrap();
        writer.emit_bits(0xFF, 8).unwrap();
        writer.emit_bits(0x0A, 4).unwrap();
        writer.flush();
        // 01 11111111 1010 + 11 padding = 0111_1111 1110_1011
        assert_eq!(writer.pending(), &[0x7F, 0xEB]);
    }

    #[test]
    fn stuffs_zero_after_ff() {
        let mut writer = BitWriter::new();
        writer.emit_bits(0xFFFF, 16).unwrap();
        assert_eq!(writer.pending(), &[0xFF, 0x00, 0xFF, 0x00]);
    }

    #[test]
    fn masks_extra_code_bits() {
        let mut writer = BitWriter::new();
        writer.emit_bits(0xFFFF_FF00, 8).unwrap();
        assert_eq!(writer.pending(), &[0x00]);
    }

    #[test]
    fn zero_size_is_a_missing_code() {
        let mut writer = BitWriter::new();
        assert_eq!(writer.emit_bits(0, 0), Err(JpegError::MissingHuffmanCode));
    }

    #[test]
    fn flush_pads_with_ones() {
        let mut writer = BitWriter::new();
        writer.emit_bits(0, 1).unwrap();
        writer.flush();
        assert_eq!(writer.pending(), &[0x7F]);
        writer.flush();
        assert_eq!(writer.pending(), &[0x7F]);
    }

    #[test]
    fn drain_resumes_after_backpressure() {
        let mut writer = BitWriter::new();
        writer.emit_bits(0x123456, 24).unwrap();
        let mut sink = BoundedSink::new(2);
        assert!(!writer.drain(&mut sink));
        assert_eq!(sink.take(), vec![0x12, 0x34]);
        assert!(writer.drain(&mut sink));
        assert_eq!(sink.take(), vec![0x56]);
        assert!(writer.pending().is_empty());
    }
}
