//! Number command implementation - convert coverage/count tables to molecule numbers

use anyhow::Result;
use clap::{ArgMatches, Args};
use condense_core::io::TitrationTable;
use condense_core::normalize::{self, NormalizeParams, TitrationGroups};
use std::path::PathBuf;

use crate::config::Config;
use crate::error::CliError;

#[derive(Args, Debug, Clone)]
pub struct NumberArgs {
    /// Coverage/bin table files of one titration point; repeat -f per titration point
    #[arg(short = 'f', long = "files", required = true, num_args = 1.., action = clap::ArgAction::Append)]
    pub files: Vec<PathBuf>,

    /// Titration table
    #[arg(short = 't', long = "titration")]
    pub titration: Option<PathBuf>,

    /// Titration number of each -f group (default: 0, 1, 2, ...)
    #[arg(long = "tnum", num_args = 1..)]
    pub tnum: Vec<i64>,

    /// Total molecule number scale of the input
    #[arg(long)]
    pub mscale: Option<i64>,

    /// Target chromosomes (default: all rows)
    #[arg(long = "chr", num_args = 1..)]
    pub chr: Vec<String>,

    /// Output directory (default: next to each input file)
    #[arg(long = "out-dir")]
    pub out_dir: Option<PathBuf>,
}

/// File lists of each `-f` occurrence, in command-line order
pub fn file_groups(matches: &ArgMatches) -> Vec<Vec<PathBuf>> {
    matches
        .get_occurrences::<PathBuf>("files")
        .map(|occurrences| occurrences.map(|group| group.cloned().collect()).collect())
        .unwrap_or_default()
}

pub fn execute(config: &Config, args: NumberArgs, groups: Vec<Vec<PathBuf>>) -> Result<()> {
    let titration_path = args
        .titration
        .clone()
        .ok_or_else(|| CliError::missing_input("there is no titration file input"))?;

    for path in std::iter::once(&titration_path).chain(groups.iter().flatten()) {
        if !path.exists() {
            return Err(CliError::file_not_found(path.clone()).into());
        }
    }

    let tnums = (!args.tnum.is_empty()).then_some(args.tnum.as_slice());
    let groups = TitrationGroups::from_lists(tnums, groups)
        .map_err(|err| CliError::validation(err.to_string()))?;

    let mscale = args.mscale.unwrap_or(config.number.mscale);
    if mscale <= 0 {
        return Err(CliError::validation(format!("mscale must be positive, got: {}", mscale)).into());
    }

    if let Some(dir) = &args.out_dir {
        std::fs::create_dir_all(dir)?;
    }

    let params = NormalizeParams {
        total_molecules: mscale as f64 * config.number.molecules_per_unit,
        targets: (!args.chr.is_empty()).then(|| args.chr.iter().cloned().collect()),
        out_dir: args.out_dir.clone(),
        compression: config.io.compression(),
    };
    log::info!(
        "{} titration points, {:.3e} input molecules",
        groups.len(),
        params.total_molecules
    );

    let titration = TitrationTable::from_path(&titration_path)?;
    let outputs = normalize::run(&groups, &titration, &params)?;

    log::info!("Wrote {} molecule number tables", outputs.len());
    log::info!("Done");
    Ok(())
}
