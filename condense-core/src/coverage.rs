//! Fragment coverage accumulation
//!
//! Each sample's alignments are filtered into fragments and folded into a
//! per-sample event map on the rayon pool. The maps are merged into one
//! [`ChromosomeProfile`] whose cumulative sweep produces the coverage
//! table `Chromosome Position <samples...>`.

pub mod profile;

pub use profile::{ChromosomeProfile, ProfileError, SampleEvents};

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use thiserror::Error;

use crate::alignment::{AlignmentSource, FilterStats, FragmentFilter, Verdict};
use crate::chrom::sort_chroms;
use crate::io::{sample_label, GenomeSizes, OutputFile};
use crate::types::GenomicPos;

/// Suffix appended to the output prefix.
pub const COVERAGE_SUFFIX: &str = "_cov.gtab";

#[derive(Debug, Error)]
pub enum CoverageError {
    #[error("No alignment files given")]
    NoInputs,
    #[error("Duplicate sample label '{0}': sample labels are file names up to the first '.'")]
    DuplicateSample(String),
    #[error("Chromosome {0} has coverage but no length in the reference")]
    MissingGenomeLength(String),
}

/// Settings of one coverage run.
#[derive(Debug, Clone)]
pub struct CoverageParams {
    /// Target chromosomes; every reference chromosome when `None`.
    pub targets: Option<Vec<String>>,
    pub min_len: u64,
    pub max_len: u64,
    pub max_edit_distance: i64,
    pub skip_zero: bool,
    pub samtools: PathBuf,
    /// gzip level of the output, or plain text when `None`.
    pub compression: Option<u32>,
}

impl Default for CoverageParams {
    fn default() -> Self {
        Self {
            targets: None,
            min_len: 0,
            max_len: u64::MAX,
            max_edit_distance: 10,
            skip_zero: false,
            samtools: PathBuf::from("samtools"),
            compression: Some(6),
        }
    }
}

/// Fragments and filter statistics of one sample.
#[derive(Debug)]
pub struct SampleCounts {
    pub label: String,
    pub events: SampleEvents,
    pub stats: FilterStats,
}

/// Filter every record of `source` and collect the kept fragments.
pub fn collect_sample(source: &AlignmentSource, filter: &FragmentFilter) -> Result<SampleCounts> {
    let mut events = SampleEvents::new();
    let mut stats = FilterStats::default();

    source.for_each(|record| {
        let verdict = filter.classify(&record)?;
        stats.record(&verdict);
        if let Verdict::Keep(fragment) = verdict {
            events.add_fragment(fragment);
        }
        Ok(())
    })?;

    Ok(SampleCounts {
        label: sample_label(source.path()),
        events,
        stats,
    })
}

/// Sample labels of `inputs`, in input order. Labels must be unique.
pub fn sample_labels(inputs: &[PathBuf]) -> Result<Vec<String>, CoverageError> {
    let mut seen = HashSet::new();
    inputs
        .iter()
        .map(|path| {
            let label = sample_label(path);
            if seen.insert(label.clone()) {
                Ok(label)
            } else {
                Err(CoverageError::DuplicateSample(label))
            }
        })
        .collect()
}

/// Read all samples in parallel and merge them into one profile.
pub fn accumulate(
    inputs: &[PathBuf],
    filter: &FragmentFilter,
    samtools: &Path,
) -> Result<(Vec<String>, ChromosomeProfile)> {
    if inputs.is_empty() {
        return Err(CoverageError::NoInputs.into());
    }
    let labels = sample_labels(inputs)?;

    let samples: Vec<SampleCounts> = inputs
        .par_iter()
        .map(|path| {
            log::info!("reading {}", path.display());
            let source = AlignmentSource::new(path, samtools);
            collect_sample(&source, filter)
                .with_context(|| format!("Failed to collect fragments from {}", path.display()))
        })
        .collect::<Result<_>>()?;

    let mut profile = ChromosomeProfile::new(samples.len());
    for (index, sample) in samples.into_iter().enumerate() {
        log::info!("{}: {}", sample.label, sample.stats);
        profile.merge_sample(index, sample.events)?;
    }

    Ok((labels, profile))
}

/// Sweep bound of `chrom`: last event + 1 with zero-skip, else its length.
fn sweep_end(
    profile: &ChromosomeProfile,
    genome: &GenomeSizes,
    chrom: &str,
    skip_zero: bool,
) -> Result<GenomicPos, CoverageError> {
    if skip_zero {
        Ok(profile.last_event(chrom).map_or(0, |last| last + 1))
    } else {
        genome
            .length(chrom)
            .map(|len| len as GenomicPos)
            .ok_or_else(|| CoverageError::MissingGenomeLength(chrom.to_string()))
    }
}

/// Fail if any chromosome with coverage cannot be swept.
pub fn check_lengths(profile: &ChromosomeProfile, genome: &GenomeSizes, skip_zero: bool) -> Result<(), CoverageError> {
    for chrom in profile.chromosomes() {
        sweep_end(profile, genome, chrom, skip_zero)?;
    }
    Ok(())
}

/// Write the coverage table, returning the number of data rows.
pub fn write_table<W: Write>(
    out: &mut W,
    labels: &[String],
    profile: &ChromosomeProfile,
    genome: &GenomeSizes,
    skip_zero: bool,
) -> Result<u64> {
    write!(out, "Chromosome\tPosition")?;
    for label in labels {
        write!(out, "\t{}", label)?;
    }
    writeln!(out)?;

    let mut rows = 0u64;
    for chrom in profile.chromosomes() {
        let end = sweep_end(profile, genome, chrom, skip_zero)?;
        log::debug!("{}: {} events, sweeping 0..{}", chrom, profile.event_count(chrom), end);

        profile.sweep(chrom, end, skip_zero, |pos, depth| -> std::io::Result<()> {
            write!(out, "{}\t{}", chrom, pos)?;
            for value in depth {
                write!(out, "\t{}", value)?;
            }
            writeln!(out)?;
            rows += 1;
            Ok(())
        })?;
    }

    Ok(rows)
}

/// Output file name for `prefix`.
pub fn output_path(prefix: &str, gzip: bool) -> PathBuf {
    if gzip {
        PathBuf::from(format!("{}{}.gz", prefix, COVERAGE_SUFFIX))
    } else {
        PathBuf::from(format!("{}{}", prefix, COVERAGE_SUFFIX))
    }
}

/// Run stage 1 end to end and return the path of the written table.
pub fn run(inputs: &[PathBuf], genome: &GenomeSizes, params: &CoverageParams, prefix: &str) -> Result<PathBuf> {
    let mut targets: Vec<String> = match &params.targets {
        Some(list) => list.clone(),
        None => genome.chromosomes().map(str::to_string).collect(),
    };
    sort_chroms(&mut targets);
    log::debug!("Target chromosomes: {}", targets.join(", "));

    let filter = FragmentFilter::new(
        targets,
        params.min_len,
        params.max_len,
        params.max_edit_distance,
    );
    let (labels, profile) = accumulate(inputs, &filter, &params.samtools)?;
    check_lengths(&profile, genome, params.skip_zero)?;

    log::info!("writing coverage file");
    let path = output_path(prefix, params.compression.is_some());
    let mut out = OutputFile::create(&path, params.compression)?;
    let rows = write_table(&mut out, &labels, &profile, genome, params.skip_zero)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    out.finish()
        .with_context(|| format!("Failed to write {}", path.display()))?;

    log::info!("Wrote {} rows to {}", rows, path.display());
    Ok(path)
}
