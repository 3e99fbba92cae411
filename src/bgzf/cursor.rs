//! The cursor: a BGZF-aware byte stream with virtual-offset `tell`/`seek`, backed by the block
//! codec and cache. This is the `_load_block`/`tell`/`seek`/`read` state machine from the original
//! Python reader, rebuilt as an explicit Rust state machine instead of a handful of lazily-set
//! instance attributes.

use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;

use crate::bgzf::block::decode_block;
use crate::bgzf::cache::BlockCache;
use crate::diagnostics::{Warning, WarningSink};
use crate::error::{BamError, Result};
use crate::vo::VirtualOffset;

/// The cursor's view of "where we are" in the decompressed stream.
enum State {
    /// No block has been loaded yet; `tell()` before the first read/seek is undefined territory
    /// the teacher never has to handle since its constructor always loads block zero immediately.
    /// Kept as an explicit variant rather than defaulting straight to `Loaded` so construction
    /// never needs a source read before the caller asks for one.
    Unloaded,
    /// A block is resident: its compressed start offset, decoded payload, the read position
    /// within that payload, and the block's raw compressed length (so the next block's start is
    /// `coffset + raw_length`, recoverable without a cache lookup).
    Loaded {
        coffset: u64,
        payload: Arc<[u8]>,
        within: usize,
        raw_length: u64,
    },
    /// The source is exhausted. `tell()` from here reports the virtual offset one past the last
    /// block's start, with `within = 0`, matching the teacher's "empty buffer" EOF sentinel.
    Eof { coffset: u64 },
}

/// A seekable, cached view over a BGZF byte stream.
pub struct Cursor<R> {
    source: R,
    cache: BlockCache,
    state: State,
    sink: Arc<dyn WarningSink>,
}

impl<R: Read + Seek> Cursor<R> {
    /// Builds a cursor over `source` and eagerly loads the block at offset 0, mirroring the
    /// teacher's constructor which always primes the buffer before returning.
    pub fn new(mut source: R, cache_capacity: usize, sink: Arc<dyn WarningSink>) -> Result<Self> {
        let cache = BlockCache::new(cache_capacity)?;
        source.seek(SeekFrom::Start(0))?;
        let mut cursor = Cursor {
            source,
            cache,
            state: State::Unloaded,
            sink,
        };
        cursor.load_block(Some(0))?;
        Ok(cursor)
    }

    /// The current virtual offset.
    pub fn tell(&self) -> VirtualOffset {
        match &self.state {
            State::Unloaded => VirtualOffset::from_raw(0),
            State::Loaded { coffset, within, .. } => {
                VirtualOffset::make(*coffset, *within as u64)
                    .expect("within-block offset always fits in 16 bits")
            }
            State::Eof { coffset } => {
                VirtualOffset::make(*coffset, 0).expect("coffset was already validated on load")
            }
        }
    }

    /// Seeks to a virtual offset. Loads the target block only if it isn't already resident.
    ///
    /// Rejects a `uoffset` beyond the target block's decompressed length, with one exemption
    /// carried over from the reference reader: seeking to `uoffset == 0` into a block that
    /// decodes to zero bytes (the terminal EOF block) is allowed, since that is exactly the state
    /// a `tell()` taken at EOF reports back.
    pub fn seek(&mut self, offset: VirtualOffset) -> Result<()> {
        let (target_coffset, within) = offset.split();
        let current_coffset = self.current_coffset();
        if current_coffset != Some(target_coffset) {
            self.load_block(Some(target_coffset))?;
        }
        let payload_len = self.payload_len();
        if within as usize > payload_len && !(within == 0 && payload_len == 0) {
            return Err(BamError::DomainError(format!(
                "within-block offset {within} but block only holds {payload_len} bytes"
            )));
        }
        match &mut self.state {
            State::Loaded { within: w, .. } => *w = within as usize,
            State::Eof { .. } => {}
            State::Unloaded => unreachable!("load_block always leaves Loaded or Eof"),
        }
        Ok(())
    }

    /// Reads exactly `size` bytes, advancing across block boundaries as needed. Returns fewer
    /// bytes only at end of stream.
    pub fn read(&mut self, size: usize) -> Result<Vec<u8>> {
        if size == 0 {
            return Ok(Vec::new());
        }
        let mut out = Vec::with_capacity(size);
        let mut remaining = size;
        loop {
            let (payload, within) = match &self.state {
                State::Loaded { payload, within, .. } => (Arc::clone(payload), *within),
                State::Eof { .. } | State::Unloaded => (Arc::from(Vec::new().into_boxed_slice()), 0),
            };
            let available = payload.len().saturating_sub(within);
            if available == 0 {
                // Current block is exhausted (or we're already at EOF); try to advance.
                let before = self.current_coffset();
                self.load_block(None)?;
                if self.current_coffset() == before || matches!(self.state, State::Eof { .. }) {
                    // No forward progress possible: true end of stream.
                    return Ok(out);
                }
                continue;
            }
            let take = remaining.min(available);
            out.extend_from_slice(&payload[within..within + take]);
            if let State::Loaded { within: w, .. } = &mut self.state {
                *w += take;
            }
            remaining -= take;
            if remaining == 0 {
                return Ok(out);
            }
        }
    }

    /// Byte offset, in the compressed stream, of the currently-loaded block's first byte.
    fn current_coffset(&self) -> Option<u64> {
        match &self.state {
            State::Unloaded => None,
            State::Loaded { coffset, .. } => Some(*coffset),
            State::Eof { coffset } => Some(*coffset),
        }
    }

    fn payload_len(&self) -> usize {
        match &self.state {
            State::Loaded { payload, .. } => payload.len(),
            _ => 0,
        }
    }

    /// Loads the block at `target_coffset` (or, if `None`, the block immediately following the
    /// current one) into `state`. A decode that reaches a clean end of stream transitions into
    /// `Eof` rather than erroring.
    fn load_block(&mut self, target_coffset: Option<u64>) -> Result<()> {
        let next_offset = match target_coffset {
            Some(c) => c,
            None => match &self.state {
                State::Loaded {
                    coffset,
                    raw_length,
                    ..
                } => coffset + raw_length,
                State::Eof { coffset } => *coffset,
                State::Unloaded => 0,
            },
        };

        if let Some(entry) = self.cache.get(next_offset) {
            self.state = if entry.payload.is_empty() {
                State::Eof {
                    coffset: next_offset,
                }
            } else {
                State::Loaded {
                    coffset: next_offset,
                    payload: entry.payload,
                    within: 0,
                    raw_length: entry.raw_length,
                }
            };
            return Ok(());
        }

        self.source.seek(SeekFrom::Start(next_offset))?;
        match decode_block(&mut self.source)? {
            None => {
                self.sink.warn(&Warning::Truncated);
                self.cache.put(next_offset, Arc::from(Vec::new().into_boxed_slice()), 0);
                self.state = State::Eof {
                    coffset: next_offset,
                };
            }
            Some(decoded) => {
                let payload: Arc<[u8]> = Arc::from(decoded.payload.into_boxed_slice());
                self.cache
                    .put(next_offset, Arc::clone(&payload), decoded.raw_length);
                self.state = if payload.is_empty() {
                    State::Eof {
                        coffset: next_offset,
                    }
                } else {
                    State::Loaded {
                        coffset: next_offset,
                        payload,
                        within: 0,
                        raw_length: decoded.raw_length,
                    }
                };
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgzf::block::encode_block;
    use crate::diagnostics::NullWarningSink;
    use std::io::Cursor as IoCursor;

    fn synthetic_stream(blocks: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        for block in blocks {
            out.extend(encode_block(block).unwrap());
        }
        out.extend(crate::bgzf::block::EOF_MARKER);
        out
    }

    fn new_cursor(bytes: Vec<u8>) -> Cursor<IoCursor<Vec<u8>>> {
        Cursor::new(IoCursor::new(bytes), 8, Arc::new(NullWarningSink)).unwrap()
    }

    #[test]
    fn tell_starts_at_zero() {
        let cursor = new_cursor(synthetic_stream(&[b"hello"]));
        assert_eq!(cursor.tell().get(), 0);
    }

    #[test]
    fn read_within_one_block() {
        let mut cursor = new_cursor(synthetic_stream(&[b"hello world"]));
        let data = cursor.read(5).unwrap();
        assert_eq!(data, b"hello");
        assert_eq!(cursor.tell().uoffset(), 5);
    }

    #[test]
    fn read_crosses_block_boundary() {
        let mut cursor = new_cursor(synthetic_stream(&[b"abc", b"def"]));
        let data = cursor.read(6).unwrap();
        assert_eq!(data, b"abcdef");
    }

    #[test]
    fn read_past_end_returns_partial() {
        let mut cursor = new_cursor(synthetic_stream(&[b"abc"]));
        let data = cursor.read(100).unwrap();
        assert_eq!(data, b"abc");
        let more = cursor.read(10).unwrap();
        assert!(more.is_empty());
    }

    #[test]
    fn seek_then_read_round_trips() {
        let mut cursor = new_cursor(synthetic_stream(&[b"abcdef", b"ghijkl"]));
        let second_block_start = {
            cursor.read(6).unwrap();
            cursor.tell()
        };
        cursor.seek(VirtualOffset::make(0, 2).unwrap()).unwrap();
        assert_eq!(cursor.read(2).unwrap(), b"cd");

        cursor.seek(second_block_start).unwrap();
        assert_eq!(cursor.read(3).unwrap(), b"ghi");
    }

    #[test]
    fn seek_rejects_uoffset_beyond_block_length() {
        let mut cursor = new_cursor(synthetic_stream(&[b"abc"]));
        let err = cursor.seek(VirtualOffset::make(0, 50).unwrap()).unwrap_err();
        assert!(matches!(err, BamError::DomainError(_)));
    }

    #[test]
    fn seek_to_empty_eof_block_at_uoffset_zero_is_allowed() {
        let mut cursor = new_cursor(synthetic_stream(&[b"abc"]));
        cursor.read(3).unwrap();
        // drains into the terminal (empty) EOF block
        assert!(cursor.read(1).unwrap().is_empty());
        let eof_vo = cursor.tell();
        assert_eq!(eof_vo.uoffset(), 0);
        // seeking to an empty block's uoffset 0 is the degenerate exemption, not an error
        cursor.seek(eof_vo).unwrap();
    }

    #[test]
    fn revisiting_a_cached_block_reuses_the_decoded_payload() {
        let mut cursor = new_cursor(synthetic_stream(&[b"abcdef", b"ghijkl"]));
        cursor.read(6).unwrap();
        let second_block_vo = cursor.tell();
        cursor.read(6).unwrap();

        cursor.seek(VirtualOffset::make(0, 0).unwrap()).unwrap();
        assert_eq!(cursor.read(6).unwrap(), b"abcdef");

        cursor.seek(second_block_vo).unwrap();
        assert_eq!(cursor.read(6).unwrap(), b"ghijkl");
    }
}
