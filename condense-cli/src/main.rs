use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use anyhow::{Result, Context};

mod config;
mod commands;
mod error;

use config::Config;
use commands::coverage::CoverageArgs;
use commands::number::NumberArgs;
use error::{print_error_and_exit, CliError};

#[derive(Parser)]
#[command(name = "condense")]
#[command(about = "condense-seq preprocessing - fragment coverage and molecule numbers")]
#[command(version)]
#[command(long_about = "
condense-seq preprocessing stages run after paired-end alignment.

'coverage' filters the alignments of each sample into fragments and writes
their per-position coverage; 'number' converts coverage or count tables into
estimated molecule numbers using the titration table.

Examples:
  condense coverage -f H1_NCP_sp_0.bam H1_NCP_sp_4.bam -x hg38.fa --chr chr1 --skip -o H1_NCP_sp
  condense number -f H1_NCP_sp_0_Ncov.gtab.gz -f H1_NCP_sp_4_Ncov.gtab.gz -t titration.txt --tnum 0 4
  condense config --out condense.toml
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Number of threads to use
    #[arg(long, global = true)]
    pub threads: Option<usize>,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Calculate fragment coverage along the genome
    Coverage(CoverageArgs),

    /// Estimate the physical number of molecules from coverage/count tables
    Number(NumberArgs),

    /// Print the default configuration as TOML
    Config {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

fn setup_logging(verbose: u8, quiet: bool) -> Result<()> {
    if quiet {
        std::env::set_var("RUST_LOG", "error");
    } else {
        let level = match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        std::env::set_var("RUST_LOG", level);
    }

    env_logger::Builder::from_default_env()
        .format_timestamp_secs()
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}

fn write_example_config(out: Option<PathBuf>) -> Result<()> {
    match out {
        Some(path) => {
            Config::default().save_to_file(&path)?;
            log::info!("Configuration written to: {}", path.display());
        }
        None => {
            let example = Config::example_toml()?;
            let mut stdout = io::stdout().lock();
            match stdout.write_all(example.as_bytes()).and_then(|_| stdout.flush()) {
                Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {}
                other => other.context("Failed to write configuration")?,
            }
        }
    }
    Ok(())
}

fn run(cli: Cli, matches: &ArgMatches) -> Result<()> {
    setup_logging(cli.verbose, cli.quiet)?;

    // Load configuration
    let config = Config::load(cli.config.as_deref())?;

    // Set global thread count
    let threads = cli.threads.unwrap_or(config.general.threads);
    if threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to set thread count")?;
    }

    // Execute the requested command
    match cli.command {
        Commands::Coverage(args) => commands::coverage::execute(&config, args)?,
        Commands::Number(args) => {
            let groups = matches
                .subcommand_matches("number")
                .map(commands::number::file_groups)
                .unwrap_or_default();
            commands::number::execute(&config, args, groups)?
        }
        Commands::Config { out } => write_example_config(out)?,
    }

    Ok(())
}

fn main() {
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());

    if let Err(err) = run(cli, &matches) {
        if let Some(cli_err) = err.downcast_ref::<CliError>() {
            print_error_and_exit(cli_err);
        }
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}
