//! condense-seq core library
//!
//! Fragment coverage profiles from paired-end alignments (stage 1) and
//! titration-normalized molecule numbers (stage 2), with the file formats
//! both stages read and write.

pub mod types;
pub mod chrom;
pub mod util;
pub mod seq;
pub mod io;
pub mod alignment;
pub mod coverage;
pub mod normalize;

// Re-export commonly used types and functions
pub use types::{Delta, Fragment, FragmentEvent, GenomicPos, SampleIndex};
pub use chrom::{compare_chroms, sort_chroms};
pub use util::parse_bool;
pub use seq::reverse_complement;
pub use io::{GenomeSizes, SamRecord, TableReader, TableSchema, TitrationTable};
pub use alignment::{AlignmentSource, FilterStats, FragmentFilter, Verdict};
pub use coverage::{ChromosomeProfile, CoverageParams};
pub use normalize::{NormalizeParams, TitrationGroups, MOLECULES_PER_UNIT};

/// Version information for the condense core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
