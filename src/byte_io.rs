//! Byte-level collaborators of the entropy coders.
//!
//! The entropy decoder reads through a [`ByteSource`] and the encoder writes
//! through a [`ByteSink`]. Both report "no data right now" / "no room right
//! now" as a plain `false`, which the coders turn into a suspension.

use crate::error::JpegWarning;
use crate::jpeg_marker_code::{JPEG_MARKER_START_BYTE, JpegMarkerCode};
use crate::tracing_wrappers::*;

/// Buffered input for the entropy decoder.
///
/// `bytes()` exposes everything buffered but not yet consumed. A decoder
/// may look ahead freely and only calls `consume` once a unit of work is
/// committed, so `fill` must never discard or reorder buffered bytes.
pub trait ByteSource {
    /// Buffered, unconsumed bytes.
    fn bytes(&self) -> &[u8];

    /// Drops `count` bytes from the front of the buffer.
    fn consume(&mut self, count: usize);

    /// Appends at least one byte to the buffer. Returns `false` when no data
    /// is available at the moment.
    fn fill(&mut self) -> bool;

    /// Skips `count` bytes, as far as they are buffered.
    fn skip_bytes(&mut self, count: usize) {
        let available = self.bytes().len();
        self.consume(count.min(available));
    }
}

/// A source over a complete in-memory buffer.
#[derive(Debug, Clone)]
pub struct SliceSource<'a> {
    data: &'a [u8],
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn remaining(&self) -> usize {
        self.data.len()
    }
}

impl ByteSource for SliceSource<'_> {
    fn bytes(&self) -> &[u8] {
        self.data
    }

    fn consume(&mut self, count: usize) {
        self.data = &self.data[count.min(self.data.len())..];
    }

    fn fill(&mut self) -> bool {
        false
    }
}

/// A source fed incrementally by the caller.
///
/// Until [`StreamingSource::finish`] is called an empty buffer means the
/// decoder must suspend. After `finish`, running dry inserts a fake EOI
/// marker once so a truncated stream still terminates.
#[derive(Debug, Default)]
pub struct StreamingSource {
    buffer: Vec<u8>,
    position: usize,
    finished: bool,
    inserted_eoi: bool,
}

impl StreamingSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_data(&mut self, data: &[u8]) {
        if self.position > 0 && self.position * 2 >= self.buffer.len() {
            self.buffer.drain(..self.position);
            self.position = 0;
        }
        self.buffer.extend_from_slice(data);
    }

    /// Marks the end of input.
    pub fn finish(&mut self) {
        self.finished = true;
    }

    /// True once a fake EOI has been synthesized for a truncated stream.
    pub fn inserted_eoi(&self) -> bool {
        self.inserted_eoi
    }
}

impl ByteSource for StreamingSource {
    fn bytes(&self) -> &[u8] {
        &self.buffer[self.position..]
    }

    fn consume(&mut self, count: usize) {
        self.position = (self.position + count).min(self.buffer.len());
    }

    fn fill(&mut self) -> bool {
        if !self.finished || self.inserted_eoi {
            return false;
        }
        warn!("{}", JpegWarning::PrematureEnd);
        self.buffer.push(JPEG_MARKER_START_BYTE);
        self.buffer.push(JpegMarkerCode::EndOfImage.into());
        self.inserted_eoi = true;
        true
    }
}

/// Output for the entropy encoder.
pub trait ByteSink {
    /// Accepts one byte, or returns `false` if there is no room right now.
    fn put_byte(&mut self, byte: u8) -> bool;
}

impl ByteSink for Vec<u8> {
    fn put_byte(&mut self, byte: u8) -> bool {
        self.push(byte);
        true
    }
}

/// A sink with a fixed capacity that the caller empties with [`BoundedSink::take`].
#[derive(Debug)]
pub struct BoundedSink {
    data: Vec<u8>,
    capacity: usize,
}

impl BoundedSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl ByteSink for BoundedSink {
    fn put_byte(&mut self, byte: u8) -> bool {
        if self.data.len() >= self.capacity {
            return false;
        }
        self.data.push(byte);
        true
    }
}
