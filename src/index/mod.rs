//! The companion binning index (`.bai`) that makes random access into a BAM file possible.

pub mod bai;

pub use bai::{BinningIndex, Chunk};
