//! Configuration handling for the condense CLI
//!
//! Supports loading configuration from condense.toml files with CLI argument overrides.

use anyhow::{Result, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::CliError;

/// Configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "condense.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub io: IoConfig,
    #[serde(default)]
    pub coverage: CoverageConfig,
    #[serde(default)]
    pub number: NumberConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default number of threads to use
    #[serde(default = "default_threads")]
    pub threads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IoConfig {
    /// Write gzip-compressed tables
    #[serde(default = "default_true")]
    pub gzip_output: bool,

    /// gzip compression level (0-9)
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageConfig {
    /// Maximum edit distance (NM) of a kept read
    #[serde(default = "default_mm_cutoff")]
    pub mm_cutoff: i64,

    /// Minimum fragment length in bp
    #[serde(default)]
    pub min_len: u64,

    /// Maximum fragment length in bp; unbounded when absent
    #[serde(default)]
    pub max_len: Option<u64>,

    /// Skip zero-coverage positions
    #[serde(default)]
    pub skip_zero: bool,

    /// samtools executable used to decode BAM/CRAM input
    #[serde(default = "default_samtools")]
    pub samtools: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumberConfig {
    /// Total molecule number scale of the input
    #[serde(default = "default_mscale")]
    pub mscale: i64,

    /// Molecules per unit of mscale
    #[serde(default = "default_molecules_per_unit")]
    pub molecules_per_unit: f64,
}

// Default value functions
fn default_threads() -> usize { num_cpus::get() }
fn default_true() -> bool { true }
fn default_compression_level() -> u32 { 6 }
fn default_mm_cutoff() -> i64 { 10 }
fn default_samtools() -> PathBuf { PathBuf::from("samtools") }
fn default_mscale() -> i64 { 1 }
fn default_molecules_per_unit() -> f64 { condense_core::MOLECULES_PER_UNIT }

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { threads: default_threads() }
    }
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            gzip_output: true,
            compression_level: default_compression_level(),
        }
    }
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            mm_cutoff: default_mm_cutoff(),
            min_len: 0,
            max_len: None,
            skip_zero: false,
            samtools: default_samtools(),
        }
    }
}

impl Default for NumberConfig {
    fn default() -> Self {
        Self {
            mscale: default_mscale(),
            molecules_per_unit: default_molecules_per_unit(),
        }
    }
}

impl IoConfig {
    /// gzip level for output tables, `None` for plain text
    pub fn compression(&self) -> Option<u32> {
        self.gzip_output.then_some(self.compression_level)
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(path)?
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    log::info!("Loading configuration from: {}", DEFAULT_CONFIG_FILE);
                    Self::load_from_file(&default_path)?
                } else {
                    log::debug!("Using default configuration");
                    Self::default()
                }
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .map_err(CliError::from)
            .with_context(|| format!("Failed to parse configuration file: {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write configuration file: {}", path.display()))?;

        Ok(())
    }

    /// Reject values no command can run with
    pub fn validate(&self) -> Result<(), CliError> {
        if self.io.compression_level > 9 {
            return Err(CliError::config(format!(
                "compression_level must be between 0 and 9, got: {}",
                self.io.compression_level
            )));
        }
        if let Some(max_len) = self.coverage.max_len {
            if max_len < self.coverage.min_len {
                return Err(CliError::config(format!(
                    "coverage max_len ({}) is below min_len ({})",
                    max_len, self.coverage.min_len
                )));
            }
        }
        if !(self.number.molecules_per_unit > 0.0) {
            return Err(CliError::config("molecules_per_unit must be positive"));
        }
        Ok(())
    }

    /// Generate example configuration file content
    pub fn example_toml() -> Result<String> {
        toml::to_string_pretty(&Self::default())
            .context("Failed to serialize default configuration")
    }
}
