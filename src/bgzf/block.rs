//! BGZF block codec: decode one compressed block from a byte source, or encode a byte buffer into
//! one compressed block. Stateless across blocks — the cursor and cache own positioning, this
//! module only does the header validation / DEFLATE / CRC32 work for a single block.

use std::io::{self, Read, Write};

use flate2::{read::DeflateDecoder, write::DeflateEncoder, Compression};

use crate::error::{BamError, Result};

/// Maximum uncompressed bytes the writer packs into one block before flushing. Chosen, like the
/// teacher's `BGZF_BLOCK_SIZE`, to leave headroom under the 64 KiB block-size ceiling even in the
/// worst case where DEFLATE doesn't shrink the data at all.
pub const MAX_UNCOMPRESSED_BLOCK_SIZE: usize = 0xff00;

/// Fixed 12-byte prefix of the BGZF header template: ID1, ID2, CM, FLG, MTIME(4), XFL, OS.
/// MTIME is always zeroed (no wall-clock dependency), XFL/OS use the teacher's "unknown OS" value.
const HEADER_PREFIX: [u8; 10] = [0x1f, 0x8b, 0x08, 0x04, 0, 0, 0, 0, 0, 0xff];
/// XLEN (u16 LE) = 6, followed by the `BC` subfield id and its length (u16 LE) = 2.
const XLEN_AND_SUBFIELD: [u8; 6] = [0x06, 0x00, b'B', b'C', 0x02, 0x00];

/// Total fixed-header length before `BSIZE`: 10 + 6 = 16, plus the 2-byte BSIZE field itself = 18.
const HEADER_LEN: usize = HEADER_PREFIX.len() + XLEN_AND_SUBFIELD.len() + 2;
/// CRC32 (4) + ISIZE (4).
const TRAILER_LEN: usize = 8;
/// `BSIZE - XLEN - 19` is the compressed-payload length; equivalently `BSIZE + 1 - HEADER_LEN -
/// TRAILER_LEN` for our fixed `XLEN = 6` header.
const FIXED_OVERHEAD: usize = HEADER_LEN + TRAILER_LEN;

/// The canonical 28-byte BGZF EOF marker: an empty block, byte-identical across implementations.
pub const EOF_MARKER: [u8; 28] = [
    0x1f, 0x8b, 0x08, 0x04, 0, 0, 0, 0, 0, 0xff, 0x06, 0x00, b'B', b'C', 0x02, 0x00, 0x1b, 0x00,
    0x03, 0x00, 0, 0, 0, 0, 0, 0, 0, 0,
];

/// A decoded BGZF block: its uncompressed payload and the number of compressed bytes it occupied
/// on the wire (needed so the cursor can compute the next block's start offset without re-reading
/// the header).
#[derive(Debug, Clone)]
pub struct DecodedBlock {
    pub payload: Vec<u8>,
    pub raw_length: u64,
}

/// Reads and validates the fixed 18-byte BGZF header (through `BSIZE`), returning `(xlen, bsize)`.
fn read_header<R: Read>(source: &mut R) -> Result<(u16, u16)> {
    let mut header = [0u8; HEADER_LEN];
    read_exact_or_eof(source, &mut header)?;

    if header[0] != 0x1f || header[1] != 0x8b {
        return Err(BamError::MalformedBlock(format!(
            "bad gzip magic: {:#04x} {:#04x}",
            header[0], header[1]
        )));
    }
    if header[2] != 8 {
        return Err(BamError::MalformedBlock(format!(
            "unsupported compression method {}",
            header[2]
        )));
    }
    if header[3] != 4 {
        return Err(BamError::MalformedBlock(format!(
            "unexpected FLG {} (expected FEXTRA=4)",
            header[3]
        )));
    }
    let xlen = u16::from_le_bytes([header[10], header[11]]);
    let si1 = header[12];
    let si2 = header[13];
    let slen = u16::from_le_bytes([header[14], header[15]]);
    if si1 != b'B' || si2 != b'C' {
        return Err(BamError::MalformedBlock(format!(
            "bad BC subfield identifier: {:#04x} {:#04x}",
            si1, si2
        )));
    }
    if slen != 2 {
        return Err(BamError::MalformedBlock(format!(
            "bad BC subfield length {slen} (expected 2)"
        )));
    }
    let bsize = u16::from_le_bytes([header[16], header[17]]);
    Ok((xlen, bsize))
}

/// Like `Read::read_exact`, but distinguishes "zero bytes available at all" (clean EOF, returns
/// `Ok(false)` via the caller's sentinel) from a truncated read (`UnexpectedEof`). Used only for
/// the very first byte of a header; once any byte has been read mid-header, truncation is fatal.
fn read_exact_or_eof<R: Read>(source: &mut R, buf: &mut [u8]) -> Result<()> {
    source.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            BamError::MalformedBlock("truncated BGZF block header".to_string())
        } else {
            BamError::Io(e)
        }
    })
}

/// Returns `true` if the source is positioned exactly at a clean end-of-stream (no more bytes at
/// all), `false` if at least one byte is available (in which case `peek_byte` is returned to the
/// caller via `first_byte`).
fn at_clean_eof<R: Read>(source: &mut R, first_byte: &mut [u8; 1]) -> io::Result<bool> {
    match source.read(first_byte) {
        Ok(0) => Ok(true),
        Ok(_) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Decodes one BGZF block starting at the source's current position.
///
/// Returns `Ok(None)` on a clean end-of-stream (no bytes at all available for a new block's
/// header) — the cursor maps this to its `EOF` state, not an error. Any other failure (malformed
/// header, negative derived length, CRC32/ISIZE mismatch) is `Err`.
pub fn decode_block<R: Read>(source: &mut R) -> Result<Option<DecodedBlock>> {
    let mut first = [0u8; 1];
    if at_clean_eof(source, &mut first)? {
        return Ok(None);
    }
    // Re-assemble the header from the peeked first byte plus the rest.
    let mut chained = io::Cursor::new(first).chain(source);
    decode_block_inner(&mut chained).map(Some)
}

fn decode_block_inner<R: Read>(source: &mut R) -> Result<DecodedBlock> {
    let (xlen, bsize) = read_header(source)?;
    let total_len = bsize as usize + 1;
    // d = BSIZE - XLEN - 19, per spec; this assumes the single `BC` subfield convention (XLEN=6)
    // that every BGZF writer in practice uses, which `read_header` already validated above.
    let deflate_len = total_len
        .checked_sub(xlen as usize)
        .and_then(|v| v.checked_sub(19))
        .ok_or_else(|| {
            BamError::MalformedBlock(format!(
                "BSIZE {bsize} too small for XLEN {xlen} (derived compressed length negative)"
            ))
        })?;

    let mut deflate_data = vec![0u8; deflate_len];
    source.read_exact(&mut deflate_data).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            BamError::MalformedBlock("truncated BGZF compressed payload".to_string())
        } else {
            BamError::Io(e)
        }
    })?;

    let mut trailer = [0u8; TRAILER_LEN];
    source.read_exact(&mut trailer).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            BamError::MalformedBlock("truncated BGZF trailer".to_string())
        } else {
            BamError::Io(e)
        }
    })?;
    let expected_crc = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let expected_isize =
        u32::from_le_bytes([trailer[4], trailer[5], trailer[6], trailer[7]]) as usize;

    let mut payload = Vec::with_capacity(expected_isize);
    let mut decoder = DeflateDecoder::new(&deflate_data[..]);
    decoder.read_to_end(&mut payload)?;

    if payload.len() != expected_isize {
        return Err(BamError::IntegrityError(format!(
            "ISIZE mismatch: decompressed {} bytes, trailer claims {}",
            payload.len(),
            expected_isize
        )));
    }
    let actual_crc = crc32fast::hash(&payload);
    if actual_crc != expected_crc {
        return Err(BamError::IntegrityError(format!(
            "CRC32 mismatch: computed {actual_crc:#010x}, trailer claims {expected_crc:#010x}"
        )));
    }

    Ok(DecodedBlock {
        payload,
        raw_length: total_len as u64,
    })
}

/// Encodes `payload` (at most 65536 bytes) as one BGZF block. Tries raw DEFLATE first; if that
/// doesn't shrink the data enough to fit the 64 KiB block ceiling, falls back to an RFC 1951
/// stored (uncompressed) block, exactly as the teacher's writer does.
pub fn encode_block(payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > 65536 {
        return Err(BamError::DomainError(format!(
            "block payload of {} bytes exceeds the 65536-byte BGZF limit",
            payload.len()
        )));
    }

    let crc = crc32fast::hash(payload);
    let isize = payload.len() as u32;

    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(payload)?;
    let compressed = encoder.finish()?;

    let compressed = if compressed.len() + FIXED_OVERHEAD > 65536 {
        stored_block(payload)
    } else {
        compressed
    };

    let total = compressed.len() + FIXED_OVERHEAD;
    if total > 65536 {
        return Err(BamError::DomainError(
            "block does not fit within the 65536-byte BGZF limit even stored uncompressed".into(),
        ));
    }
    let bsize = (total - 1) as u16;

    let mut block = Vec::with_capacity(total);
    block.extend_from_slice(&HEADER_PREFIX);
    block.extend_from_slice(&XLEN_AND_SUBFIELD);
    block.extend_from_slice(&bsize.to_le_bytes());
    block.extend_from_slice(&compressed);
    block.extend_from_slice(&crc.to_le_bytes());
    block.extend_from_slice(&isize.to_le_bytes());
    Ok(block)
}

/// RFC 1951 §3.2.4 stored (non-compressed) DEFLATE block: `[BFINAL|BTYPE][LEN LE][~LEN LE][data]`.
fn stored_block(data: &[u8]) -> Vec<u8> {
    let len = data.len() as u16;
    let mut stored = Vec::with_capacity(5 + data.len());
    stored.push(0x01); // BFINAL=1, BTYPE=00 (stored)
    stored.extend_from_slice(&len.to_le_bytes());
    stored.extend_from_slice(&(!len).to_le_bytes());
    stored.extend_from_slice(data);
    stored
}
