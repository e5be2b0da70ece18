//! Sparse per-chromosome coverage deltas and the cumulative sweep.
//!
//! Fragments are stored as boundary events only: `+1` at the start, `-1`
//! at the end. Depth at a coordinate is the prefix sum of every delta at
//! or before it, recovered by [`ChromosomeProfile::sweep`].

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use crate::chrom::sort_chroms;
use crate::types::{Delta, Fragment, FragmentEvent, GenomicPos, SampleIndex};

/// Boundary events of one sample, built independently of other samples.
#[derive(Debug, Clone, Default)]
pub struct SampleEvents {
    chroms: HashMap<String, BTreeMap<GenomicPos, Delta>>,
    fragments: u64,
}

impl SampleEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_fragment(&mut self, fragment: Fragment) {
        let boundaries = fragment.events(0);
        let events = self.chroms.entry(fragment.chrom).or_default();
        for event in boundaries {
            *events.entry(event.position).or_insert(0) += event.delta;
        }
        self.fragments += 1;
    }

    pub fn fragment_count(&self) -> u64 {
        self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.chroms.is_empty()
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProfileError {
    #[error("Sample index {sample} is out of range for a profile of {samples} samples")]
    SampleOutOfRange { sample: SampleIndex, samples: usize },
}

/// Chromosome to sorted coordinate to per-sample delta vector.
#[derive(Debug, Clone)]
pub struct ChromosomeProfile {
    samples: usize,
    chroms: HashMap<String, BTreeMap<GenomicPos, Vec<Delta>>>,
}

impl ChromosomeProfile {
    pub fn new(samples: usize) -> Self {
        Self {
            samples,
            chroms: HashMap::new(),
        }
    }

    pub fn sample_count(&self) -> usize {
        self.samples
    }

    fn check_sample(&self, sample: SampleIndex) -> Result<(), ProfileError> {
        if sample < self.samples {
            Ok(())
        } else {
            Err(ProfileError::SampleOutOfRange {
                sample,
                samples: self.samples,
            })
        }
    }

    /// Fold one boundary event into the profile.
    pub fn add_event(&mut self, chrom: &str, event: FragmentEvent) -> Result<(), ProfileError> {
        self.check_sample(event.sample)?;
        let samples = self.samples;
        let deltas = self
            .chroms
            .entry(chrom.to_string())
            .or_default()
            .entry(event.position)
            .or_insert_with(|| vec![0; samples]);
        deltas[event.sample] += event.delta;
        Ok(())
    }

    pub fn add_fragment(&mut self, fragment: &Fragment, sample: SampleIndex) -> Result<(), ProfileError> {
        self.check_sample(sample)?;
        for event in fragment.events(sample) {
            self.add_event(&fragment.chrom, event)?;
        }
        Ok(())
    }

    /// Move the events of one sample into column `sample`.
    pub fn merge_sample(&mut self, sample: SampleIndex, events: SampleEvents) -> Result<(), ProfileError> {
        self.check_sample(sample)?;
        let samples = self.samples;
        for (chrom, positions) in events.chroms {
            let target = self.chroms.entry(chrom).or_default();
            for (position, delta) in positions {
                target.entry(position).or_insert_with(|| vec![0; samples])[sample] += delta;
            }
        }
        Ok(())
    }

    /// Chromosomes with at least one event, in canonical order.
    pub fn chromosomes(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.chroms.keys().map(String::as_str).collect();
        sort_chroms(&mut names);
        names
    }

    /// Largest event coordinate recorded on `chrom`.
    pub fn last_event(&self, chrom: &str) -> Option<GenomicPos> {
        self.chroms
            .get(chrom)
            .and_then(|events| events.keys().next_back().copied())
    }

    pub fn event_count(&self, chrom: &str) -> usize {
        self.chroms.get(chrom).map_or(0, BTreeMap::len)
    }

    /// Emit the running per-sample depth for every coordinate in `0..end`.
    ///
    /// With `skip_zero`, coordinates whose summed depth is zero are not
    /// emitted and zero stretches are jumped over, so the cost is bounded
    /// by the number of events plus the number of emitted rows.
    pub fn sweep<F, E>(&self, chrom: &str, end: GenomicPos, skip_zero: bool, mut emit: F) -> Result<(), E>
    where
        F: FnMut(GenomicPos, &[i64]) -> Result<(), E>,
    {
        let Some(events) = self.chroms.get(chrom) else {
            return Ok(());
        };
        if end <= 0 {
            return Ok(());
        }

        let mut depth = vec![0i64; self.samples];
        let mut upcoming = events.range(0..end).peekable();
        let mut pos: GenomicPos = 0;

        while pos < end {
            if let Some(&(&at, deltas)) = upcoming.peek() {
                if at == pos {
                    for (d, delta) in depth.iter_mut().zip(deltas) {
                        *d += delta;
                    }
                    upcoming.next();
                }
            }

            if skip_zero && depth.iter().sum::<i64>() == 0 {
                // Depth is constant until the next event
                match upcoming.peek() {
                    Some(&(&at, _)) => {
                        pos = at;
                        continue;
                    }
                    None => break,
                }
            }

            emit(pos, &depth)?;
            pos += 1;
        }

        Ok(())
    }
}
