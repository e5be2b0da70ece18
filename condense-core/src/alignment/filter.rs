//! Validity filter for paired-end records and fragment reconstruction.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use thiserror::Error;

use crate::io::sam::{flags, SamRecord, UNMAPPED_REFERENCE};
use crate::types::Fragment;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Record {read} passed the pairing filters but has no integer NM tag")]
    MissingEditDistance { read: String },
}

/// Why a record did not yield a fragment. Checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rejection {
    OffTarget,
    NegativePosition,
    Unmapped,
    UnmappedReference,
    MateUnmapped,
    NotProperPair,
    EditDistance,
    FragmentLength,
}

impl Rejection {
    pub fn label(self) -> &'static str {
        match self {
            Rejection::OffTarget => "off-target chromosome",
            Rejection::NegativePosition => "no position",
            Rejection::Unmapped => "unmapped",
            Rejection::UnmappedReference => "unmapped reference",
            Rejection::MateUnmapped => "mate unmapped",
            Rejection::NotProperPair => "not properly paired",
            Rejection::EditDistance => "edit distance over cutoff",
            Rejection::FragmentLength => "fragment length out of range",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Keep(Fragment),
    Reject(Rejection),
}

/// Record filter for one coverage run.
#[derive(Debug, Clone)]
pub struct FragmentFilter {
    targets: HashSet<String>,
    min_len: u64,
    max_len: u64,
    max_edit_distance: i64,
}

impl FragmentFilter {
    /// `min_len` and `max_len` are inclusive bounds on |TLEN|.
    pub fn new<I, S>(targets: I, min_len: u64, max_len: u64, max_edit_distance: i64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            min_len,
            max_len,
            max_edit_distance,
        }
    }

    pub fn is_target(&self, chrom: &str) -> bool {
        self.targets.contains(chrom)
    }

    /// Apply every validity check to `record` and derive its fragment.
    ///
    /// A record that reaches the edit-distance check without an `NM` tag
    /// is an error, not a rejection.
    pub fn classify(&self, record: &SamRecord) -> Result<Verdict, FilterError> {
        let reject = |reason: Rejection| -> Result<Verdict, FilterError> {
            Ok(Verdict::Reject(reason))
        };

        if !self.is_target(&record.reference) {
            return reject(Rejection::OffTarget);
        }
        if record.position < 0 {
            return reject(Rejection::NegativePosition);
        }
        if record.has_flag(flags::UNMAPPED) {
            return reject(Rejection::Unmapped);
        }
        if record.reference == UNMAPPED_REFERENCE {
            return reject(Rejection::UnmappedReference);
        }
        if record.has_flag(flags::MATE_UNMAPPED) {
            return reject(Rejection::MateUnmapped);
        }
        if !record.has_flag(flags::PROPER_PAIR) {
            return reject(Rejection::NotProperPair);
        }

        let edit_distance = record
            .edit_distance
            .ok_or_else(|| FilterError::MissingEditDistance {
                read: record.read_name.clone(),
            })?;
        if edit_distance > self.max_edit_distance {
            return reject(Rejection::EditDistance);
        }

        let tlen = record.template_length.unsigned_abs();
        if tlen < self.min_len || tlen > self.max_len {
            return reject(Rejection::FragmentLength);
        }

        Ok(Verdict::Keep(fragment_extent(record)))
    }
}

/// Reconstruct the fragment spanned by a pair from one of its mates.
///
/// The leftmost mate (positive TLEN) spans `[pos, pos + tlen)`. For the
/// rightmost mate the alignment end is found by walking the CIGAR, and the
/// fragment is `[end + tlen, end)`. Starts before the chromosome are
/// clamped to 0.
pub fn fragment_extent(record: &SamRecord) -> Fragment {
    let tlen = record.template_length;
    let (start, end) = if tlen > 0 {
        (record.position, record.position + tlen)
    } else {
        let end = record.position + record.match_deletion_span as i64;
        (end + tlen, end)
    };
    Fragment::new(record.reference.clone(), start.max(0), end)
}

/// Per-sample tally of kept fragments and rejected records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub records: u64,
    pub kept: u64,
    pub rejected: BTreeMap<Rejection, u64>,
}

impl FilterStats {
    pub fn record(&mut self, verdict: &Verdict) {
        self.records += 1;
        match verdict {
            Verdict::Keep(_) => self.kept += 1,
            Verdict::Reject(reason) => *self.rejected.entry(*reason).or_insert(0) += 1,
        }
    }

    pub fn rejected_total(&self) -> u64 {
        self.rejected.values().sum()
    }
}

impl fmt::Display for FilterStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} records, {} fragments kept", self.records, self.kept)?;
        for (reason, count) in &self.rejected {
            write!(f, ", {} {}", count, reason.label())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(flag: u16, chrom: &str, pos1: i64, cigar: &str, tlen: i64, nm: Option<i64>) -> SamRecord {
        let mut line = format!("r\t{flag}\t{chrom}\t{pos1}\t42\t{cigar}\t=\t1\t{tlen}\tA\tF");
        if let Some(nm) = nm {
            line.push_str(&format!("\tNM:i:{nm}"));
        }
        SamRecord::parse_line(&line).unwrap()
    }

    fn filter() -> FragmentFilter {
        FragmentFilter::new(["chr1", "chr2"], 120, 170, 10)
    }

    #[test]
    fn test_left_mate_fragment() {
        let verdict = filter().classify(&record(99, "chr1", 101, "51M", 147, Some(0))).unwrap();
        assert_eq!(verdict, Verdict::Keep(Fragment::new("chr1", 100, 247)));
    }

    #[test]
    fn test_right_mate_fragment_walks_cigar() {
        // Mate aligned at 0-based 196, 40M2D11M spans 53 reference bases
        let verdict = filter()
            .classify(&record(163, "chr1", 197, "40M2D11M", -149, Some(2)))
            .unwrap();
        assert_eq!(verdict, Verdict::Keep(Fragment::new("chr1", 100, 249)));
    }

    #[test]
    fn test_fragment_start_is_clamped() {
        let rec = record(163, "chr1", 11, "51M", -150, Some(0));
        assert_eq!(fragment_extent(&rec), Fragment::new("chr1", 0, 61));
    }

    #[test]
    fn test_rejection_reasons() {
        let f = filter();
        let cases = [
            (record(99, "chr3", 101, "51M", 147, Some(0)), Rejection::OffTarget),
            (record(99, "chr1", 0, "51M", 147, Some(0)), Rejection::NegativePosition),
            (record(99 | flags::UNMAPPED, "chr1", 101, "51M", 147, Some(0)), Rejection::Unmapped),
            (record(99 | flags::MATE_UNMAPPED, "chr1", 101, "51M", 147, Some(0)), Rejection::MateUnmapped),
            (record(99 & !flags::PROPER_PAIR, "chr1", 101, "51M", 147, Some(0)), Rejection::NotProperPair),
            (record(99, "chr1", 101, "51M", 147, Some(11)), Rejection::EditDistance),
            (record(99, "chr1", 101, "51M", 300, Some(0)), Rejection::FragmentLength),
        ];
        for (rec, expected) in cases {
            assert_eq!(f.classify(&rec).unwrap(), Verdict::Reject(expected));
        }
    }

    #[test]
    fn test_unmapped_sentinel_reference() {
        let f = FragmentFilter::new(["*"], 0, u64::MAX, 10);
        let verdict = f.classify(&record(99, "*", 101, "51M", 147, Some(0))).unwrap();
        assert_eq!(verdict, Verdict::Reject(Rejection::UnmappedReference));
    }

    #[test]
    fn test_length_bounds_are_inclusive() {
        let f = filter();
        let keep = |tlen: i64| {
            matches!(
                f.classify(&record(99, "chr1", 101, "51M", tlen, Some(0))).unwrap(),
                Verdict::Keep(_)
            )
        };
        assert!(keep(120));
        assert!(keep(170));
        assert!(!keep(119));
        assert!(!keep(171));
        // Rightmost mates are measured by |TLEN|
        assert!(matches!(
            f.classify(&record(147, "chr1", 201, "51M", -170, Some(0))).unwrap(),
            Verdict::Keep(_)
        ));
    }

    #[test]
    fn test_edit_distance_cutoff_is_inclusive() {
        let f = filter();
        let verdict = f.classify(&record(99, "chr1", 101, "51M", 147, Some(10))).unwrap();
        assert!(matches!(verdict, Verdict::Keep(_)));
    }

    #[test]
    fn test_missing_edit_distance_is_error() {
        let result = filter().classify(&record(99, "chr1", 101, "51M", 147, None));
        assert!(matches!(result, Err(FilterError::MissingEditDistance { .. })));

        // A record rejected earlier never needs the tag
        let result = filter().classify(&record(99, "chrUn", 101, "51M", 147, None));
        assert!(matches!(result, Ok(Verdict::Reject(Rejection::OffTarget))));
    }

    #[test]
    fn test_stats() {
        let mut stats = FilterStats::default();
        stats.record(&Verdict::Keep(Fragment::new("chr1", 0, 10)));
        stats.record(&Verdict::Reject(Rejection::OffTarget));
        stats.record(&Verdict::Reject(Rejection::OffTarget));
        stats.record(&Verdict::Reject(Rejection::EditDistance));

        assert_eq!(stats.records, 4);
        assert_eq!(stats.kept, 1);
        assert_eq!(stats.rejected_total(), 3);
        assert_eq!(
            stats.to_string(),
            "4 records, 1 fragments kept, 2 off-target chromosome, 1 edit distance over cutoff"
        );
    }
}
