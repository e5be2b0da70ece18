//! Paired-end alignment records: record sources and the fragment filter
//! that turns records into fragments.

pub mod filter;
pub mod source;

pub use filter::{fragment_extent, FilterError, FilterStats, FragmentFilter, Rejection, Verdict};
pub use source::{read_records, AlignmentSource, SourceError, EXCLUDED_FLAGS};
