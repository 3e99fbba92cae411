//! Random-access reading of BGZF-compressed BAM alignment files.
//!
//! A BAM file is a BGZF stream: a sequence of independently-inflatable DEFLATE blocks, each
//! addressable by a *virtual offset* (a compressed block offset paired with an offset into that
//! block's decompressed payload). Pairing that addressing scheme with a `.bai` binning index lets
//! [`reader::BamReader`] jump straight to the first record overlapping a queried region instead of
//! scanning the file from the start.
//!
//! ```no_run
//! use bamcore::options::BamReaderOptions;
//! use bamcore::reader::BamReader;
//!
//! # fn main() -> bamcore::error::Result<()> {
//! let mut reader = BamReader::open("aligned.bam", BamReaderOptions::default())?;
//! for record in reader.fetch("chr1", 0, Some(1_000_000))? {
//!     let record = record?;
//!     println!("{} @ {}", record.reference_id, record.position);
//! }
//! # Ok(())
//! # }
//! ```

pub mod bgzf;
pub mod diagnostics;
pub mod error;
pub mod filter;
pub mod header;
pub mod index;
pub mod options;
pub mod reader;
pub mod record;
pub mod region;
pub mod vo;

pub use diagnostics::{Warning, WarningSink};
pub use error::{BamError, Result};
pub use filter::ReadFilter;
pub use header::{BamHeader, ReferenceEntry};
pub use index::{BinningIndex, Chunk};
pub use options::BamReaderOptions;
pub use reader::{BamReader, FetchIter};
pub use record::AlignedRecord;
pub use region::{parse_region, Region};
pub use vo::VirtualOffset;
