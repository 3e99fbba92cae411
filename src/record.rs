//! Minimal BAM record parsing: just enough of the alignment record layout for the query engine
//! to know which reference a record belongs to, where it starts, and its flag bits. Exhaustive
//! field decoding (CIGAR, SEQ, QUAL, aux tags) is explicitly out of scope — treated as an
//! external collaborator per the header bootstrap contract.

use std::io::{Read, Seek};

use crate::bgzf::cursor::Cursor;
use crate::error::{BamError, Result};

/// Flag bits combined by the built-in `all` count filter: unmapped, secondary, QC-fail, duplicate.
pub const FILTER_ALL_MASK: u16 = 0x0704;

/// An aligned record, decoded only as far as the query engine needs: its reference, its leftmost
/// 0-based position, its flag bits, and the full raw record bytes (for a caller-supplied
/// downstream parser to pick apart further).
#[derive(Debug, Clone)]
pub struct AlignedRecord {
    pub reference_id: i32,
    pub position: i32,
    pub flag: u16,
    pub raw: Vec<u8>,
}

impl AlignedRecord {
    pub fn is_unmapped(&self) -> bool {
        self.flag & 0x4 != 0
    }

    /// Whether this record would be excluded by the `all` count filter's `0x704` mask.
    pub fn excluded_by_all_filter(&self) -> bool {
        self.flag & FILTER_ALL_MASK != 0
    }
}

/// Reads one `block_size`-prefixed BAM record from `cursor`. Returns `Ok(None)` if the cursor is
/// already at a clean end of stream (no more records).
pub fn parse_record<R: Read + Seek>(cursor: &mut Cursor<R>) -> Result<Option<AlignedRecord>> {
    let size_bytes = cursor.read(4)?;
    if size_bytes.is_empty() {
        return Ok(None);
    }
    if size_bytes.len() != 4 {
        return Err(BamError::Truncated);
    }
    let block_size = i32::from_le_bytes([
        size_bytes[0],
        size_bytes[1],
        size_bytes[2],
        size_bytes[3],
    ]);
    if block_size < 32 {
        // The fixed portion of a BAM record (refID through bin_mq_nl/flag_nc) is 32 bytes before
        // any variable-length fields; anything shorter can't be a well-formed record.
        return Err(BamError::MalformedBlock(format!(
            "record block_size {block_size} is smaller than the fixed record header"
        )));
    }
    let body = cursor.read(block_size as usize)?;
    if body.len() != block_size as usize {
        return Err(BamError::Truncated);
    }

    let reference_id = i32::from_le_bytes([body[0], body[1], body[2], body[3]]);
    let position = i32::from_le_bytes([body[4], body[5], body[6], body[7]]);
    let flag = u16::from_le_bytes([body[14], body[15]]);

    let mut raw = size_bytes;
    raw.extend_from_slice(&body);

    Ok(Some(AlignedRecord {
        reference_id,
        position,
        flag,
        raw,
    }))
}
