//! Typed error hierarchy for the BGZF/BAM core.
//!
//! Every fallible operation in this crate returns `Result<T, BamError>`. The variant set mirrors
//! the error kinds named in the format specification: a handful of fatal decode/validation
//! failures, plus `DomainError` for caller-supplied argument mistakes.

use std::io;
use thiserror::Error;

/// The error type returned by every fallible operation in this crate.
#[derive(Error, Debug)]
pub enum BamError {
    /// A BGZF block's fixed header fields don't match the required values, or its derived
    /// compressed-data length is negative.
    #[error("malformed BGZF block: {0}")]
    MalformedBlock(String),

    /// A block's CRC32 or ISIZE trailer didn't match the decompressed payload.
    #[error("BGZF block failed integrity check: {0}")]
    IntegrityError(String),

    /// The file does not start with the `BAM\1` magic token.
    #[error("not a BAM file: missing BAM\\1 magic")]
    NotBam,

    /// An invalid argument was supplied: a negative read size, an out-of-range virtual offset,
    /// a malformed region, a cache capacity of zero, contradictory optional parameters, etc.
    #[error("invalid argument: {0}")]
    DomainError(String),

    /// A region query was attempted without a loaded binning index.
    #[error("random access disabled: no index is loaded")]
    NoRandomAccess,

    /// A named reference is absent from the BAM header's reference table.
    #[error("reference not found: {0}")]
    ReferenceNotFound(String),

    /// The BGZF EOF marker is missing and strict truncation checking is enabled.
    #[error("BAM file may be truncated: no EOF marker found")]
    Truncated,

    /// Wraps an underlying I/O failure from the byte source.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, BamError>;
