//! Coverage command implementation - fragment coverage of each sample along the genome

use anyhow::Result;
use clap::Args;
use condense_core::alignment::SourceError;
use condense_core::coverage::{self, CoverageParams};
use condense_core::io::GenomeSizes;
use condense_core::util::parse_bool;
use std::path::PathBuf;

use crate::config::Config;
use crate::error::CliError;

#[derive(Args, Debug, Clone)]
pub struct CoverageArgs {
    /// SAM/BAM/CRAM files, one per sample
    #[arg(short = 'f', long = "files", required = true, num_args = 1..)]
    pub files: Vec<PathBuf>,

    /// Reference FASTA sequence (plain or gzip)
    #[arg(short = 'x', long = "ref")]
    pub reference: Option<PathBuf>,

    /// Mismatch (edit distance) cut-off in bp
    #[arg(short = 'm', long = "mm-cutoff")]
    pub mm_cutoff: Option<i64>,

    /// Minimum fragment length in bp (120 when given without a value)
    #[arg(long = "min", num_args = 0..=1, default_missing_value = "120")]
    pub min_len: Option<u64>,

    /// Maximum fragment length in bp (170 when given without a value)
    #[arg(long = "max", num_args = 0..=1, default_missing_value = "170")]
    pub max_len: Option<u64>,

    /// Skip zero coverage positions
    #[arg(long = "skip", num_args = 0..=1, default_missing_value = "true", value_parser = parse_bool)]
    pub skip_zero: Option<bool>,

    /// Target chromosomes (default: every reference chromosome)
    #[arg(long = "chr", num_args = 1..)]
    pub chr: Vec<String>,

    /// Output prefix; the table is written to <prefix>_cov.gtab.gz
    #[arg(short = 'o', long = "out", default_value = "output")]
    pub out: String,
}

impl CoverageArgs {
    /// Merge the flags over the configuration defaults
    pub fn params(&self, config: &Config) -> Result<CoverageParams, CliError> {
        let min_len = self.min_len.unwrap_or(config.coverage.min_len);
        let max_len = self.max_len.or(config.coverage.max_len).unwrap_or(u64::MAX);
        if max_len < min_len {
            return Err(CliError::validation(format!(
                "maximum length {} is below minimum length {}",
                max_len, min_len
            )));
        }

        Ok(CoverageParams {
            targets: (!self.chr.is_empty()).then(|| self.chr.clone()),
            min_len,
            max_len,
            max_edit_distance: self.mm_cutoff.unwrap_or(config.coverage.mm_cutoff),
            skip_zero: self.skip_zero.unwrap_or(config.coverage.skip_zero),
            samtools: config.coverage.samtools.clone(),
            compression: config.io.compression(),
        })
    }
}

pub fn execute(config: &Config, args: CoverageArgs) -> Result<()> {
    let reference = args
        .reference
        .clone()
        .ok_or_else(|| CliError::missing_input("there is no reference file input"))?;

    for path in std::iter::once(&reference).chain(&args.files) {
        if !path.exists() {
            return Err(CliError::file_not_found(path.clone()).into());
        }
    }

    let params = args.params(config)?;
    log::info!(
        "Fragment length window {}..={}, edit distance cut-off {}, skip zero: {}",
        params.min_len,
        params.max_len,
        params.max_edit_distance,
        params.skip_zero
    );

    let genome = GenomeSizes::from_path(&reference)?;
    log::info!("Reference {}: {} sequences", reference.display(), genome.len());

    let output = coverage::run(&args.files, &genome, &params, &args.out).map_err(|err| {
        let spawn = err.chain().find_map(|cause| match cause.downcast_ref::<SourceError>() {
            Some(SourceError::Spawn { tool, source }) => Some((tool.clone(), source.to_string())),
            _ => None,
        });
        match spawn {
            Some((tool, message)) => CliError::external_tool(tool, message).into(),
            None => err,
        }
    })?;

    log::info!("Coverage written to: {}", output.display());
    log::info!("Done");
    Ok(())
}
