//! The top-level BAM reader: composes the header, cursor, cache, and binning index into the
//! public `fetch`/`count`/`head` API. Grounded on `bamnostic.core.AlignmentFile` /
//! `bamnostic.bgzf.BgzfReader`'s constructor and the methods read alongside it.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::bgzf::block::EOF_MARKER;
use crate::bgzf::cursor::Cursor;
use crate::diagnostics::Warning;
use crate::error::{BamError, Result};
use crate::filter::ReadFilter;
use crate::header::BamHeader;
use crate::index::BinningIndex;
use crate::options::BamReaderOptions;
use crate::record::{parse_record, AlignedRecord};
use crate::vo::VirtualOffset;

/// An open BAM file: header, record stream, and (if available) its binning index.
pub struct BamReader {
    path: PathBuf,
    cursor: Cursor<File>,
    header: BamHeader,
    index: Option<BinningIndex>,
    options: BamReaderOptions,
}

impl BamReader {
    /// Opens `path` with the given options: checks for truncation, loads the companion index
    /// (or disables random access), then parses the header.
    pub fn open(path: impl AsRef<Path>, options: BamReaderOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if !options.ignore_truncation {
            check_truncation(&path)?;
        }

        let index = load_index(&path, &options)?;

        let raw_first_block = read_raw_first_block(&path)?;
        let file = File::open(&path)?;
        let mut cursor = Cursor::new(file, options.max_cache.get(), options.warning_sink.clone())?;
        let header = BamHeader::parse(&mut cursor, raw_first_block)?;

        if options.check_sq && !header.has_sq_entries() {
            return Err(BamError::DomainError(
                "no @SQ entries in header".to_string(),
            ));
        }

        Ok(BamReader {
            path,
            cursor,
            header,
            index,
            options,
        })
    }

    pub fn header(&self) -> &BamHeader {
        &self.header
    }

    pub fn tell(&self) -> VirtualOffset {
        self.cursor.tell()
    }

    pub fn seek(&mut self, offset: VirtualOffset) -> Result<()> {
        self.cursor.seek(offset)
    }

    pub fn read(&mut self, size: usize) -> Result<Vec<u8>> {
        self.cursor.read(size)
    }

    pub fn is_valid_tid(&self, tid: usize) -> bool {
        self.header.is_valid_tid(tid)
    }

    pub fn get_tid(&self, name: &str) -> Result<usize> {
        self.header
            .tid_for_name(name)
            .ok_or_else(|| BamError::ReferenceNotFound(name.to_string()))
    }

    pub fn get_reference_name(&self, tid: usize) -> Result<&str> {
        self.header
            .name_for_tid(tid)
            .ok_or_else(|| BamError::DomainError(format!("{tid} is not a valid tid")))
    }

    /// Whether random access (index-backed queries) is available.
    pub fn seekable(&self) -> bool {
        self.index.is_some()
    }

    /// `(mapped, unmapped, total)` per reference, in header order.
    pub fn get_index_stats(&self) -> Result<Vec<(u64, u64, u64)>> {
        let index = self.index.as_ref().ok_or(BamError::NoRandomAccess)?;
        let mut stats = index.stats();
        stats.resize(self.header.references.len(), (0, 0, 0));
        Ok(stats)
    }

    /// Resolves `(contig, start, stop)` into `(tid, start, stop)`, validating per §4.5: the
    /// reference must exist, `start` must not exceed the reference length, and `start <= stop`.
    /// An absent `stop` defaults to the reference's declared length.
    fn resolve_region(&self, contig: &str, start: u32, stop: Option<u32>) -> Result<(usize, u32, u32)> {
        let tid = self.get_tid(contig)?;
        let ref_len = self.header.references[tid].length;
        if start > ref_len {
            return Err(BamError::DomainError(format!(
                "region out of bounds: start {start} exceeds reference length {ref_len}"
            )));
        }
        let stop = stop.unwrap_or(ref_len);
        if start > stop {
            return Err(BamError::DomainError(format!(
                "malformed region: start {start} > stop {stop}"
            )));
        }
        Ok((tid, start, stop))
    }

    /// Yields records overlapping `[start, stop)` on `contig`. `stop` of `None` defaults to the
    /// reference's declared length.
    pub fn fetch(&mut self, contig: &str, start: u32, stop: Option<u32>) -> Result<FetchIter<'_>> {
        let (tid, start, stop) = self.resolve_region(contig, start, stop)?;
        self.fetch_resolved(tid, start, stop, false)
    }

    /// Yields every record from the current position to end of file, ignoring region bounds.
    pub fn fetch_until_eof(&mut self) -> Result<FetchIter<'_>> {
        Ok(FetchIter {
            reader: self,
            tid: -1,
            stop: 0,
            until_eof: true,
            exhausted: false,
        })
    }

    fn fetch_resolved(&mut self, tid: usize, start: u32, stop: u32, until_eof: bool) -> Result<FetchIter<'_>> {
        let index = self.index.as_ref().ok_or(BamError::NoRandomAccess)?;
        let first = index.query(tid, start as u64, stop as u64)?;

        let exhausted = match first {
            Some(vo) => {
                self.cursor.seek(vo)?;
                false
            }
            None => true,
        };

        Ok(FetchIter {
            reader: self,
            tid: tid as i32,
            stop,
            until_eof,
            exhausted,
        })
    }

    /// Counts records overlapping `[start, stop)` on `contig` that pass `filter`.
    pub fn count(
        &mut self,
        contig: &str,
        start: u32,
        stop: Option<u32>,
        filter: ReadFilter,
    ) -> Result<u64> {
        let mut iter = self.fetch(contig, start, stop)?;
        let mut total = 0u64;
        while let Some(record) = iter.next() {
            if filter.matches(&record?) {
                total += 1;
            }
        }
        Ok(total)
    }

    /// Returns the first `n` records of the file. With `multiple_iterators` enabled, reads them
    /// through an independent reader instance over a fresh file handle, leaving this reader's
    /// cursor untouched; otherwise temporarily reseeks the shared cursor and restores the caller's
    /// prior position afterward.
    ///
    /// Relies on the BAM header ending within the first BGZF block, so `(coffset=0,
    /// header.record_stream_start)` is a valid virtual offset; see the open design note on this
    /// shortcut.
    pub fn head(&mut self, n: usize) -> Result<Vec<AlignedRecord>> {
        let header_vo = VirtualOffset::make(0, self.header.record_stream_start)?;

        if self.options.multiple_iterators {
            let mut shadow = BamReader::open(&self.path, self.options.clone())?;
            shadow.cursor.seek(header_vo)?;
            shadow.read_n_records(n)
        } else {
            let saved = self.cursor.tell();
            self.cursor.seek(header_vo)?;
            let records = self.read_n_records(n)?;
            self.cursor.seek(saved)?;
            Ok(records)
        }
    }

    fn read_n_records(&mut self, n: usize) -> Result<Vec<AlignedRecord>> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            match parse_record(&mut self.cursor)? {
                Some(record) => out.push(record),
                None => break,
            }
        }
        Ok(out)
    }
}

/// A lazy, non-restartable iterator over records overlapping a resolved region (or, in
/// `until_eof` mode, every remaining record).
pub struct FetchIter<'r> {
    reader: &'r mut BamReader,
    tid: i32,
    stop: u32,
    until_eof: bool,
    exhausted: bool,
}

impl<'r> Iterator for FetchIter<'r> {
    type Item = Result<AlignedRecord>;

    fn next(&mut self) -> Option<Result<AlignedRecord>> {
        if self.exhausted {
            return None;
        }
        match parse_record(&mut self.reader.cursor) {
            Err(e) => {
                self.exhausted = true;
                Some(Err(e))
            }
            Ok(None) => {
                self.exhausted = true;
                None
            }
            Ok(Some(record)) => {
                if !self.until_eof {
                    let past_stop = record.position < 0 || record.position as u32 > self.stop;
                    if record.reference_id != self.tid || past_stop {
                        self.exhausted = true;
                        return None;
                    }
                }
                Some(Ok(record))
            }
        }
    }
}

fn default_index_path(bam_path: &Path) -> PathBuf {
    let mut path = bam_path.as_os_str().to_owned();
    path.push(".bai");
    PathBuf::from(path)
}

fn load_index(bam_path: &Path, options: &BamReaderOptions) -> Result<Option<BinningIndex>> {
    let index_path = options
        .index_path
        .clone()
        .unwrap_or_else(|| default_index_path(bam_path));

    match File::open(&index_path) {
        Ok(file) => Ok(Some(BinningIndex::parse(file)?)),
        Err(_) if options.require_index => Err(BamError::DomainError(format!(
            "index file {index_path:?} could not be opened"
        ))),
        Err(_) => {
            options.warning_sink.warn(&Warning::Message(format!(
                "no index file found at {index_path:?}; random access disabled"
            )));
            Ok(None)
        }
    }
}

/// Compares the final 28 bytes of the file against the canonical EOF marker. Per the grounding
/// source's default behavior, a missing marker is fatal (`ignore_truncation` is the only knob;
/// setting it skips this check entirely rather than downgrading the failure to a warning).
fn check_truncation(path: &Path) -> Result<()> {
    let mut file = File::open(path)?;
    let len = file.seek(SeekFrom::End(0))?;
    if len < EOF_MARKER.len() as u64 {
        return Err(BamError::Truncated);
    }
    file.seek(SeekFrom::End(-(EOF_MARKER.len() as i64)))?;
    let mut tail = [0u8; EOF_MARKER.len()];
    file.read_exact(&mut tail)?;
    if tail != EOF_MARKER {
        return Err(BamError::Truncated);
    }
    Ok(())
}

/// Captures the first BGZF block exactly as it appears on disk, for `BamHeader::raw_first_block`.
fn read_raw_first_block(path: &Path) -> Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let mut header = [0u8; 18];
    file.read_exact(&mut header)
        .map_err(|_| BamError::Truncated)?;
    let bsize = u16::from_le_bytes([header[16], header[17]]);
    let total = bsize as usize + 1;
    if total < header.len() {
        return Err(BamError::MalformedBlock(
            "BSIZE too small for fixed header".to_string(),
        ));
    }
    let mut rest = vec![0u8; total - header.len()];
    file.read_exact(&mut rest).map_err(|_| BamError::Truncated)?;
    let mut raw = header.to_vec();
    raw.extend(rest);
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgzf::block::encode_block;
    use crate::bgzf::writer::BgzfWriter;
    use crate::index::bai::reg2bin;
    use crate::vo::VirtualOffset;
    use pretty_assertions::assert_eq;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    fn fixed_record_body(reference_id: i32, position: i32, flag: u16) -> Vec<u8> {
        let mut body = vec![0u8; 32];
        body[0..4].copy_from_slice(&reference_id.to_le_bytes());
        body[4..8].copy_from_slice(&position.to_le_bytes());
        body[8] = 1;
        body[14..16].copy_from_slice(&flag.to_le_bytes());
        body
    }

    fn encode_record(reference_id: i32, position: i32, flag: u16) -> Vec<u8> {
        let body = fixed_record_body(reference_id, position, flag);
        let mut out = (body.len() as i32).to_le_bytes().to_vec();
        out.extend(body);
        out
    }

    /// Builds a minimal BAM file with two references and a handful of records, plus a matching
    /// `.bai` index with one bin (`reg2bin(0, ref_len)`, i.e. "whole reference") covering every
    /// record and a linear index with a single zeroed entry. This intentionally keeps every
    /// record reachable via a single coarse bin, trading index fidelity for a from-scratch
    /// in-process fixture that doesn't depend on `samtools`/`tabix`.
    struct Fixture {
        bam_path: PathBuf,
        bai_path: PathBuf,
        _bam_file: NamedTempFile,
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.bai_path);
        }
    }

    fn build_fixture() -> Fixture {
        let header_payload = {
            let mut payload = Vec::new();
            payload.extend_from_slice(b"BAM\x01");
            payload.extend_from_slice(&0i32.to_le_bytes()); // ltext
            payload.extend_from_slice(&2i32.to_le_bytes()); // n_ref
            for (name, len) in [("chr1", 1575u32), ("chr2", 1584u32)] {
                let mut name_bytes = name.as_bytes().to_vec();
                name_bytes.push(0);
                payload.extend_from_slice(&(name_bytes.len() as i32).to_le_bytes());
                payload.extend_from_slice(&name_bytes);
                payload.extend_from_slice(&len.to_le_bytes());
            }
            payload
        };

        let records_chr1 = [(0i32, 1i32, 0u16), (0, 5, 0), (0, 50, 0x4)];
        let records_chr2 = [(1i32, 2i32, 0u16)];

        let mut bam_bytes = Vec::new();
        {
            let mut writer = BgzfWriter::new(&mut bam_bytes);
            writer.write_all(&header_payload).unwrap();
        }
        let header_block_len = bam_bytes.len() - EOF_MARKER.len();
        bam_bytes.truncate(header_block_len); // drop the EOF marker written by the header-only writer

        let records_coffset = bam_bytes.len() as u64;
        let mut records_payload = Vec::new();
        for &(refid, pos, flag) in &records_chr1 {
            records_payload.extend(encode_record(refid, pos, flag));
        }
        for &(refid, pos, flag) in &records_chr2 {
            records_payload.extend(encode_record(refid, pos, flag));
        }
        bam_bytes.extend(encode_block(&records_payload).unwrap());
        bam_bytes.extend(EOF_MARKER);

        let chr1_chunk_begin = VirtualOffset::make(records_coffset, 0).unwrap();
        let chr1_chunk_end = VirtualOffset::make(records_coffset, records_payload.len() as u64).unwrap();

        let mut bai_bytes = Vec::new();
        bai_bytes.extend_from_slice(b"BAI\x01");
        bai_bytes.extend_from_slice(&2i32.to_le_bytes()); // n_ref

        for (ref_len, n_mapped, n_unmapped) in [(1575u64, 2u64, 1u64), (1584u64, 1u64, 0u64)] {
            let bin = reg2bin(0, ref_len);
            bai_bytes.extend_from_slice(&2i32.to_le_bytes()); // n_bin (coarse bin + metadata)
            bai_bytes.extend_from_slice(&bin.to_le_bytes());
            bai_bytes.extend_from_slice(&1i32.to_le_bytes()); // n_chunk
            bai_bytes.extend_from_slice(&chr1_chunk_begin.get().to_le_bytes());
            bai_bytes.extend_from_slice(&chr1_chunk_end.get().to_le_bytes());

            bai_bytes.extend_from_slice(&37450u32.to_le_bytes());
            bai_bytes.extend_from_slice(&2i32.to_le_bytes());
            bai_bytes.extend_from_slice(&0u64.to_le_bytes());
            bai_bytes.extend_from_slice(&0u64.to_le_bytes());
            bai_bytes.extend_from_slice(&n_mapped.to_le_bytes());
            bai_bytes.extend_from_slice(&n_unmapped.to_le_bytes());

            bai_bytes.extend_from_slice(&1i32.to_le_bytes()); // n_intv
            bai_bytes.extend_from_slice(&0u64.to_le_bytes());
        }
        bai_bytes.extend_from_slice(&0u64.to_le_bytes()); // n_no_coor

        let mut bam_file = NamedTempFile::new().unwrap();
        bam_file.write_all(&bam_bytes).unwrap();
        bam_file.flush().unwrap();

        let bam_path = bam_file.path().to_path_buf();
        let bai_path = {
            let mut p = bam_path.as_os_str().to_owned();
            p.push(".bai");
            PathBuf::from(p)
        };
        std::fs::write(&bai_path, &bai_bytes).unwrap();

        Fixture {
            bam_path,
            bai_path,
            _bam_file: bam_file,
        }
    }

    fn open_fixture() -> BamReader {
        let fixture = build_fixture();
        // the default index path, `<bam_path>.bai`, is exactly where `build_fixture` wrote it
        let options = BamReaderOptions::default();
        BamReader::open(&fixture.bam_path, options).unwrap()
    }

    #[test]
    fn opens_and_parses_header() {
        let reader = open_fixture();
        assert_eq!(reader.header().references.len(), 2);
        assert_eq!(reader.get_tid("chr1").unwrap(), 0);
        assert_eq!(reader.get_reference_name(1).unwrap(), "chr2");
        assert!(reader.seekable());
    }

    #[test]
    fn fetch_yields_overlapping_records_only() {
        let mut reader = open_fixture();
        let records: Vec<_> = reader
            .fetch("chr1", 0, Some(10))
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].position, 1);
        assert_eq!(records[1].position, 5);
    }

    #[test]
    fn count_nofilter_counts_every_overlapping_record() {
        let mut reader = open_fixture();
        let count = reader.count("chr1", 0, Some(10), ReadFilter::NoFilter).unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn count_all_excludes_unmapped() {
        let mut reader = open_fixture();
        let count = reader.count("chr1", 0, Some(60), ReadFilter::All).unwrap();
        assert_eq!(count, 2); // excludes the 0x4-flagged record at position 50
    }

    #[test]
    fn fetch_rejects_unknown_reference() {
        let mut reader = open_fixture();
        let err = reader.fetch("chr10", 0, Some(10)).unwrap_err();
        assert!(matches!(err, BamError::ReferenceNotFound(_)));
    }

    #[test]
    fn fetch_rejects_start_past_reference_length() {
        let mut reader = open_fixture();
        let err = reader.fetch("chr1", 1700, Some(1701)).unwrap_err();
        assert!(matches!(err, BamError::DomainError(_)));
    }

    #[test]
    fn fetch_rejects_start_after_stop() {
        let mut reader = open_fixture();
        let err = reader.fetch("chr1", 100, Some(10)).unwrap_err();
        assert!(matches!(err, BamError::DomainError(_)));
    }

    #[test]
    fn get_index_stats_matches_built_fixture() {
        let reader = open_fixture();
        let stats = reader.get_index_stats().unwrap();
        assert_eq!(stats, vec![(2, 1, 3), (1, 0, 1)]);
    }

    #[test]
    fn head_returns_first_n_records_and_restores_position() {
        let mut reader = open_fixture();
        reader.fetch("chr1", 0, Some(10)).unwrap().next();
        let before = reader.tell();
        let head = reader.head(2).unwrap();
        assert_eq!(head.len(), 2);
        assert_eq!(head[0].position, 1);
        assert_eq!(reader.tell(), before);
    }
}
