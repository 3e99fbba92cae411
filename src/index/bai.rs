//! BAI binning index: the companion `.bai` file that makes random access into a BAM file
//! possible. Construction from scratch is out of scope (§1); this module only parses an
//! already-built index and answers `query(tid, start, stop)`.
//!
//! The binning scheme (`reg2bin`, `MIN_SHIFT = 14`, `N_LVLS = 5`) is grounded on the teacher's
//! `htslib::tabix::reg2bin`, which implements the same `hts_reg2bin` arithmetic this format
//! requires; the `.bai` binary layout itself (magic, per-reference bin/chunk/linear-index
//! sections, trailing `n_no_coor`) is standard and not present in the original Python source
//! that was otherwise available, so it follows the samtools specification directly.

use std::collections::HashMap;
use std::io::Read;

use crate::error::{BamError, Result};
use crate::vo::VirtualOffset;

const MAGIC: &[u8; 4] = b"BAI\x01";
const MIN_SHIFT: u32 = 14;
const N_LVLS: u32 = 5;
/// The pseudo-bin samtools uses to stash per-reference mapped/unmapped counts instead of chunks.
const METADATA_BIN: u32 = 37450;

#[derive(Debug, Clone, Copy)]
pub struct Chunk {
    pub begin: VirtualOffset,
    pub end: VirtualOffset,
}

/// Per-reference binning data: bin number to chunk list, plus the linear index (one virtual
/// offset per 16 KiB window, giving the minimum offset of any record that could overlap it).
#[derive(Debug, Clone, Default)]
struct RefIndex {
    bins: HashMap<u32, Vec<Chunk>>,
    linear: Vec<VirtualOffset>,
    n_mapped: u64,
    n_unmapped: u64,
}

/// A parsed `.bai` index.
#[derive(Debug, Clone)]
pub struct BinningIndex {
    refs: Vec<RefIndex>,
    pub n_no_coor: u64,
}

impl BinningIndex {
    /// Parses a `.bai` file from `source`.
    pub fn parse<R: Read>(mut source: R) -> Result<Self> {
        let mut magic = [0u8; 4];
        source.read_exact(&mut magic).map_err(truncated)?;
        if &magic != MAGIC {
            return Err(BamError::MalformedBlock(
                "missing BAI\\1 magic in index file".to_string(),
            ));
        }

        let n_ref = read_i32(&mut source)?;
        if n_ref < 0 {
            return Err(BamError::MalformedBlock(format!(
                "negative reference count {n_ref} in index"
            )));
        }

        let mut refs = Vec::with_capacity(n_ref as usize);
        for _ in 0..n_ref {
            refs.push(parse_ref_index(&mut source)?);
        }

        // n_no_coor is trailing and optional: some writers omit it entirely.
        let n_no_coor = match read_u64_opt(&mut source)? {
            Some(v) => v,
            None => 0,
        };

        Ok(BinningIndex { refs, n_no_coor })
    }

    /// The earliest virtual offset at which a record overlapping `[start, stop)` on `tid` might
    /// begin, or `None` if no chunk could contain such a record.
    pub fn query(&self, tid: usize, start: u64, stop: u64) -> Result<Option<VirtualOffset>> {
        let reference = self
            .refs
            .get(tid)
            .ok_or_else(|| BamError::DomainError(format!("tid {tid} out of range")))?;

        let min_offset = reference
            .linear
            .get((start >> MIN_SHIFT) as usize)
            .copied()
            .unwrap_or_else(|| VirtualOffset::from_raw(0));

        let mut best: Option<VirtualOffset> = None;
        for bin in reg2bins(start, stop) {
            let Some(chunks) = reference.bins.get(&bin) else {
                continue;
            };
            for chunk in chunks {
                if chunk.end.get() <= min_offset.get() {
                    // Everything in this chunk ends before the linear index's floor for `start`;
                    // it cannot contain an overlapping record.
                    continue;
                }
                best = Some(match best {
                    Some(current) if current.get() <= chunk.begin.get() => current,
                    _ => chunk.begin,
                });
            }
        }
        Ok(best)
    }

    /// `(mapped, unmapped, total)` per reference, in tid order. Corresponds to the scenario
    /// table's `get_index_stats()`.
    pub fn stats(&self) -> Vec<(u64, u64, u64)> {
        self.refs
            .iter()
            .map(|r| (r.n_mapped, r.n_unmapped, r.n_mapped + r.n_unmapped))
            .collect()
    }

    pub fn reference_count(&self) -> usize {
        self.refs.len()
    }
}

fn parse_ref_index<R: Read>(source: &mut R) -> Result<RefIndex> {
    let n_bin = read_i32(source)?;
    if n_bin < 0 {
        return Err(BamError::MalformedBlock(format!(
            "negative bin count {n_bin} in index"
        )));
    }

    let mut index = RefIndex::default();
    for _ in 0..n_bin {
        let bin = read_u32(source)?;
        let n_chunk = read_i32(source)?;
        if n_chunk < 0 {
            return Err(BamError::MalformedBlock(format!(
                "negative chunk count {n_chunk} in index"
            )));
        }

        if bin == METADATA_BIN {
            // The pseudo-bin stores exactly two chunks: {first_record_vo, last_record_vo} and
            // {n_mapped, n_unmapped} packed as virtual-offset-shaped u64 pairs.
            if n_chunk != 2 {
                return Err(BamError::MalformedBlock(format!(
                    "metadata pseudo-bin has {n_chunk} chunks, expected 2"
                )));
            }
            let _placement = read_chunk(source)?;
            let counts = read_chunk(source)?;
            index.n_mapped = counts.begin.get();
            index.n_unmapped = counts.end.get();
            continue;
        }

        let mut chunks = Vec::with_capacity(n_chunk as usize);
        for _ in 0..n_chunk {
            chunks.push(read_chunk(source)?);
        }
        index.bins.insert(bin, chunks);
    }

    let n_intv = read_i32(source)?;
    if n_intv < 0 {
        return Err(BamError::MalformedBlock(format!(
            "negative linear index length {n_intv} in index"
        )));
    }
    let mut linear = Vec::with_capacity(n_intv as usize);
    for _ in 0..n_intv {
        linear.push(VirtualOffset::from_raw(read_u64(source)?));
    }
    index.linear = linear;

    Ok(index)
}

fn read_chunk<R: Read>(source: &mut R) -> Result<Chunk> {
    let begin = VirtualOffset::from_raw(read_u64(source)?);
    let end = VirtualOffset::from_raw(read_u64(source)?);
    Ok(Chunk { begin, end })
}

fn read_i32<R: Read>(source: &mut R) -> Result<i32> {
    let mut buf = [0u8; 4];
    source.read_exact(&mut buf).map_err(truncated)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_u32<R: Read>(source: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    source.read_exact(&mut buf).map_err(truncated)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(source: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    source.read_exact(&mut buf).map_err(truncated)?;
    Ok(u64::from_le_bytes(buf))
}

/// Like `read_u64`, but treats a clean EOF (zero bytes available) as "field absent" instead of
/// truncation: `n_no_coor` is a trailing optional field some index writers omit.
fn read_u64_opt<R: Read>(source: &mut R) -> Result<Option<u64>> {
    let mut buf = [0u8; 8];
    let mut filled = 0;
    while filled < 8 {
        match source.read(&mut buf[filled..]) {
            Ok(0) => {
                return if filled == 0 {
                    Ok(None)
                } else {
                    Err(BamError::MalformedBlock(
                        "truncated n_no_coor field in index".to_string(),
                    ))
                };
            }
            Ok(n) => filled += n,
            Err(e) => return Err(BamError::Io(e)),
        }
    }
    Ok(Some(u64::from_le_bytes(buf)))
}

fn truncated(_: std::io::Error) -> BamError {
    BamError::MalformedBlock("truncated index file".to_string())
}

/// Computes the bin number for a 0-based half-open interval `[beg, end)`, per the standard
/// `hts_reg2bin(beg, end, MIN_SHIFT=14, N_LVLS=5)` scheme.
pub fn reg2bin(beg: u64, end: u64) -> u32 {
    let e = end.saturating_sub(1);
    let mut s = MIN_SHIFT;
    let mut t: u64 = ((1u64 << (3 * N_LVLS + 3)) - 1) / 7;
    for l in (1..=N_LVLS).rev() {
        t -= 1u64 << (3 * l);
        if (beg >> s) == (e >> s) {
            return (t + (beg >> s)) as u32;
        }
        s += 3;
    }
    0
}

/// Lists every bin, at every level, that could hold a record overlapping `[beg, end)`. Mirrors
/// `hts_reg2bins`: one candidate bin per level from the root (bin 0) down to the leaf level.
fn reg2bins(beg: u64, end: u64) -> Vec<u32> {
    let end = end.max(beg + 1);
    let e = end - 1;
    let mut bins = Vec::new();
    let mut t: u64 = 0;
    let mut s = MIN_SHIFT + N_LVLS * 3;
    for l in 0..=N_LVLS {
        let b = t + (beg >> s);
        let eb = t + (e >> s);
        for bin in b..=eb {
            bins.push(bin as u32);
        }
        s -= 3;
        t += 1u64 << (3 * l);
    }
    bins
}
