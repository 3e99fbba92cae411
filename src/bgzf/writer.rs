//! A BGZF writer: buffers uncompressed bytes and flushes them as blocks of at most
//! [`MAX_UNCOMPRESSED_BLOCK_SIZE`] bytes, appending the canonical EOF marker on `finish()`.
//!
//! Mirrors the teacher's `BgzfWriter` (buffer-then-flush-per-block, `finish()` appends
//! `EOF_BLOCK`), rebuilt on top of this crate's own [`crate::bgzf::block::encode_block`] instead
//! of re-implementing the DEFLATE/CRC machinery inline.

use std::io::{self, Write};

use crate::bgzf::block::{encode_block, EOF_MARKER, MAX_UNCOMPRESSED_BLOCK_SIZE};
use crate::error::Result;

/// Wraps a byte sink and writes a valid BGZF stream to it.
///
/// `sink` is an `Option` rather than a bare `W` so `finish()` can move it back out to the caller
/// without fighting the `Drop` impl, which otherwise forbids partial moves out of `self`.
pub struct BgzfWriter<W: Write> {
    sink: Option<W>,
    buffer: Vec<u8>,
}

impl<W: Write> BgzfWriter<W> {
    pub fn new(sink: W) -> Self {
        BgzfWriter {
            sink: Some(sink),
            buffer: Vec::with_capacity(MAX_UNCOMPRESSED_BLOCK_SIZE),
        }
    }

    /// Buffers `data`, flushing full blocks to the sink as the buffer fills.
    pub fn write_all(&mut self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            let space = MAX_UNCOMPRESSED_BLOCK_SIZE - self.buffer.len();
            let take = space.min(data.len());
            self.buffer.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.buffer.len() == MAX_UNCOMPRESSED_BLOCK_SIZE {
                self.flush_block()?;
            }
        }
        Ok(())
    }

    /// Encodes and writes out whatever is currently buffered, even if it's short of a full block.
    /// A no-op when the buffer is empty or the writer has already finished.
    fn flush_block(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let block = encode_block(&self.buffer)?;
        if let Some(sink) = self.sink.as_mut() {
            sink.write_all(&block)?;
        }
        self.buffer.clear();
        Ok(())
    }

    /// Flushes any buffered data, appends the canonical EOF marker, and returns the underlying
    /// sink. Idempotent only in the sense that a second call is a no-op returning nothing useful;
    /// callers should call this at most once, which the `W` return value encourages by consuming
    /// `self`.
    pub fn finish(mut self) -> Result<W> {
        self.flush_block()?;
        let mut sink = self.sink.take().expect("sink only taken in finish");
        sink.write_all(&EOF_MARKER)?;
        sink.flush()?;
        Ok(sink)
    }
}

impl<W: Write> Write for BgzfWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_all(buf)
            .map(|_| buf.len())
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_block()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }
}

impl<W: Write> Drop for BgzfWriter<W> {
    /// Best-effort finish if the caller never called `finish()` explicitly: flushes any buffered
    /// tail and appends the EOF marker. Errors are swallowed, same as the standard library's own
    /// `BufWriter`, since `drop` cannot propagate them. A no-op if `finish()` already ran.
    fn drop(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            if !self.buffer.is_empty() {
                if let Ok(block) = encode_block(&self.buffer) {
                    let _ = sink.write_all(&block);
                }
            }
            let _ = sink.write_all(&EOF_MARKER);
            let _ = sink.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgzf::block::decode_block;
    use pretty_assertions::assert_eq;

    fn decode_all(stream: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut cursor = io::Cursor::new(stream);
        while let Some(block) = decode_block(&mut cursor).unwrap() {
            out.extend(block.payload);
        }
        out
    }

    #[test]
    fn finish_appends_eof_marker() {
        let mut writer = BgzfWriter::new(Vec::new());
        writer.write_all(b"hello bgzf").unwrap();
        let out = writer.finish().unwrap();
        assert!(out.ends_with(&EOF_MARKER));
    }

    #[test]
    fn written_bytes_round_trip_through_decode() {
        let payload = b"the quick brown fox jumps over the lazy dog".repeat(50);
        let mut writer = BgzfWriter::new(Vec::new());
        writer.write_all(&payload).unwrap();
        let out = writer.finish().unwrap();
        assert_eq!(decode_all(&out), payload);
    }

    #[test]
    fn large_writes_split_across_multiple_blocks() {
        let payload = vec![0x42u8; MAX_UNCOMPRESSED_BLOCK_SIZE * 3 + 17];
        let mut writer = BgzfWriter::new(Vec::new());
        writer.write_all(&payload).unwrap();
        let out = writer.finish().unwrap();

        let mut cursor = io::Cursor::new(&out[..]);
        let mut block_count = 0;
        while let Some(block) = decode_block(&mut cursor).unwrap() {
            if block.payload.is_empty() {
                break;
            }
            assert!(block.payload.len() <= MAX_UNCOMPRESSED_BLOCK_SIZE);
            block_count += 1;
        }
        assert_eq!(block_count, 4);
        assert_eq!(decode_all(&out), payload);
    }

    #[test]
    fn empty_write_still_produces_a_valid_eof_only_stream() {
        let writer = BgzfWriter::new(Vec::new());
        let out = writer.finish().unwrap();
        assert_eq!(out, EOF_MARKER.to_vec());
    }

    #[test]
    fn drop_without_explicit_finish_still_appends_eof_marker() {
        let mut out = Vec::new();
        {
            let mut writer = BgzfWriter::new(&mut out);
            writer.write_all(b"dropped without finish").unwrap();
        }
        assert!(out.ends_with(&EOF_MARKER));
    }
}
