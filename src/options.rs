//! Reader configuration: a plain struct with a `Default` impl, replacing the long keyword-argument
//! list threaded through the original `BgzfReader.__init__` (`max_cache`, `index_filename`,
//! `check_sq`, `require_index`, `ignore_truncation`, `multiple_iterators`, ...).

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::diagnostics::{LogWarningSink, WarningSink};

/// Construction-time options for [`crate::reader::BamReader`].
#[derive(Clone)]
pub struct BamReaderOptions {
    /// Block cache capacity. Defaults to 128, matching the original's `max_cache` default.
    pub max_cache: NonZeroUsize,
    /// Path to the companion `.bai` index, if not the default `<bam_path>.bai` sibling.
    pub index_path: Option<PathBuf>,
    /// Fail construction if no index can be opened, instead of disabling random access.
    pub require_index: bool,
    /// Fail construction if the header carries no `@SQ` entries.
    pub check_sq: bool,
    /// Skip the EOF-marker truncation check at open.
    pub ignore_truncation: bool,
    /// Derived iterators (e.g. `head`) open an independent reader/handle instead of sharing the
    /// primary cursor and cache.
    pub multiple_iterators: bool,
    /// Receives structured warnings (missing EOF marker, etc). Defaults to [`LogWarningSink`].
    pub warning_sink: Arc<dyn WarningSink>,
}

impl Default for BamReaderOptions {
    fn default() -> Self {
        BamReaderOptions {
            max_cache: NonZeroUsize::new(128).expect("128 is nonzero"),
            index_path: None,
            require_index: false,
            check_sq: true,
            ignore_truncation: false,
            multiple_iterators: false,
            warning_sink: Arc::new(LogWarningSink),
        }
    }
}
