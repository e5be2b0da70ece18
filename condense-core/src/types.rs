//! Shared coordinate and event types.

/// 0-based genomic coordinate.
///
/// Signed so that the leftmost coordinate of a fragment reconstructed from
/// its rightmost mate can be computed before it is clamped to the
/// chromosome start.
pub type GenomicPos = i64;

/// Signed coverage change recorded at an interval boundary.
pub type Delta = i64;

/// Index of a sample column, in input order.
pub type SampleIndex = usize;

/// Half-open interval `[start, end)` spanned by one read pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub chrom: String,
    pub start: GenomicPos,
    pub end: GenomicPos,
}

impl Fragment {
    pub fn new(chrom: impl Into<String>, start: GenomicPos, end: GenomicPos) -> Self {
        Self {
            chrom: chrom.into(),
            start,
            end,
        }
    }

    pub fn len(&self) -> GenomicPos {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Opening and closing boundary events of this fragment for one sample.
    pub fn events(&self, sample: SampleIndex) -> [FragmentEvent; 2] {
        [
            FragmentEvent {
                position: self.start,
                sample,
                delta: 1,
            },
            FragmentEvent {
                position: self.end,
                sample,
                delta: -1,
            },
        ]
    }
}

/// A single +1/-1 boundary of a fragment, folded into a coverage profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentEvent {
    pub position: GenomicPos,
    pub sample: SampleIndex,
    pub delta: Delta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_events_open_and_close() {
        let fragment = Fragment::new("chr1", 10, 157);
        assert_eq!(fragment.len(), 147);
        assert!(!fragment.is_empty());

        let [open, close] = fragment.events(3);
        assert_eq!(open, FragmentEvent { position: 10, sample: 3, delta: 1 });
        assert_eq!(close, FragmentEvent { position: 157, sample: 3, delta: -1 });
    }
}
