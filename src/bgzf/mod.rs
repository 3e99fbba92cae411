//! BGZF (Blocked GNU Zip Format) support: the block codec, a bounded block cache, the seekable
//! cursor built on top of them, and a writer for producing new BGZF streams.

pub mod block;
pub mod cache;
pub mod cursor;
pub mod writer;

pub use block::{DecodedBlock, EOF_MARKER, MAX_UNCOMPRESSED_BLOCK_SIZE};
pub use cache::BlockCache;
pub use cursor::Cursor;
pub use writer::BgzfWriter;
