//! BAM header bootstrap: magic validation, SAM text, and the reference table.
//!
//! Grounded on `BAMheader.__init__` in the original reader: read the magic, the length-prefixed
//! SAM text, then `n_refs` `{l_name, name, l_ref}` triples. Unlike the original, which keeps the
//! parsed SAM text as a nested dict of tag lines, this core only promises the raw text back (the
//! SAM textual grammar is explicitly out of scope beyond reference-metadata recovery) plus a
//! minimal `@SQ`-presence check for `check_sq`.

use std::collections::HashMap;
use std::io::Read;

use crate::bgzf::cursor::Cursor;
use crate::error::{BamError, Result};

const MAGIC: &[u8; 4] = b"BAM\x01";

/// One entry of the BAM reference table: a contig name and its declared length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEntry {
    pub name: String,
    pub length: u32,
}

/// The parsed BAM header: SAM text (if any) plus the reference table, and the bookkeeping needed
/// for `head`'s byte-offset reseek shortcut and for splicing a verbatim header into another file.
#[derive(Debug, Clone)]
pub struct BamHeader {
    /// Raw SAM header text, empty if `ltext == 0`.
    pub text: String,
    pub references: Vec<ReferenceEntry>,
    /// Maps reference name to its 0-based `tid`, for `get_tid`.
    name_to_tid: HashMap<String, usize>,
    /// Byte offset, in the uncompressed logical stream, of the first record following the header.
    /// A *byte* offset, not a virtual offset: see the `head` reseek shortcut's caveat in the
    /// open design notes.
    pub record_stream_start: u64,
    /// The first BGZF block, still compressed, exactly as it appeared on the wire. Used to splice
    /// a verbatim header into a derived file.
    pub raw_first_block: Vec<u8>,
}

impl BamHeader {
    /// Parses the header from `cursor`, which must be positioned at the start of the logical
    /// stream (virtual offset 0). Also captures the raw bytes of the first BGZF block for
    /// round-tripping, per §4.6.
    pub fn parse<R: Read + std::io::Seek>(
        cursor: &mut Cursor<R>,
        raw_first_block: Vec<u8>,
    ) -> Result<Self> {
        let magic = cursor.read(4)?;
        if magic.as_slice() != MAGIC.as_slice() {
            return Err(BamError::NotBam);
        }

        let ltext = read_i32(cursor)?;
        if ltext < 0 {
            return Err(BamError::MalformedBlock(format!(
                "negative SAM text length {ltext}"
            )));
        }
        let text_bytes = cursor.read(ltext as usize)?;
        if text_bytes.len() != ltext as usize {
            return Err(BamError::Truncated);
        }
        let text = String::from_utf8(text_bytes)
            .map_err(|e| BamError::MalformedBlock(format!("SAM text is not valid UTF-8: {e}")))?;

        let n_refs = read_i32(cursor)?;
        if n_refs < 0 {
            return Err(BamError::MalformedBlock(format!(
                "negative reference count {n_refs}"
            )));
        }

        let mut references = Vec::with_capacity(n_refs as usize);
        let mut name_to_tid = HashMap::with_capacity(n_refs as usize);
        for tid in 0..n_refs as usize {
            let l_name = read_i32(cursor)?;
            if l_name <= 0 {
                return Err(BamError::MalformedBlock(format!(
                    "reference {tid} has non-positive name length {l_name}"
                )));
            }
            let name_bytes = cursor.read(l_name as usize)?;
            if name_bytes.len() != l_name as usize {
                return Err(BamError::Truncated);
            }
            // l_name counts the trailing NUL; strip it.
            let name = String::from_utf8(name_bytes[..name_bytes.len() - 1].to_vec())
                .map_err(|e| BamError::MalformedBlock(format!("reference name not UTF-8: {e}")))?;
            let length = read_i32(cursor)? as u32;

            name_to_tid.insert(name.clone(), tid);
            references.push(ReferenceEntry { name, length });
        }

        let record_stream_start = cursor.tell().uoffset();

        Ok(BamHeader {
            text,
            references,
            name_to_tid,
            record_stream_start,
            raw_first_block,
        })
    }

    pub fn tid_for_name(&self, name: &str) -> Option<usize> {
        self.name_to_tid.get(name).copied()
    }

    pub fn name_for_tid(&self, tid: usize) -> Option<&str> {
        self.references.get(tid).map(|r| r.name.as_str())
    }

    pub fn is_valid_tid(&self, tid: usize) -> bool {
        tid < self.references.len()
    }

    /// Whether the SAM text carries at least one `@SQ` line, or (if no SAM text is present) the
    /// reference table is non-empty. Mirrors `_check_sq` in the original reader.
    pub fn has_sq_entries(&self) -> bool {
        if self.text.is_empty() {
            !self.references.is_empty()
        } else {
            self.text.lines().any(|line| line.starts_with("@SQ"))
        }
    }
}

fn read_i32<R: Read + std::io::Seek>(cursor: &mut Cursor<R>) -> Result<i32> {
    let bytes = cursor.read(4)?;
    if bytes.len() != 4 {
        return Err(BamError::Truncated);
    }
    Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}
