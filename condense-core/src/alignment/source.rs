//! Alignment record sources
//!
//! BAM/CRAM inputs are decoded by an external `samtools view -h` process
//! whose stdout is streamed through the noodles SAM reader; SAM text inputs
//! (`.sam`, `.sam.gz`) go through the same reader directly. Either way only primary forward-strand records reach the
//! caller.

use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use anyhow::{Context, Result};
use noodles::sam;
use thiserror::Error;

use crate::io::open_reader;
use crate::io::sam::{flags, record_flags, SamRecord};

/// Records carrying any of these flags are skipped: reverse-strand mates,
/// secondary and supplementary alignments.
pub const EXCLUDED_FLAGS: u16 = flags::REVERSE | flags::SECONDARY | flags::SUPPLEMENTARY;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to launch {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },
    #[error("{tool} did not provide an output stream")]
    NoStdout { tool: String },
    #[error("{tool} exited with {status} while reading {}", .path.display())]
    Failed {
        tool: String,
        status: ExitStatus,
        path: PathBuf,
    },
}

/// One sample's alignment file.
#[derive(Debug, Clone)]
pub struct AlignmentSource {
    path: PathBuf,
    samtools: PathBuf,
}

impl AlignmentSource {
    pub fn new(path: impl Into<PathBuf>, samtools: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            samtools: samtools.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file is SAM text that can be read without samtools.
    pub fn is_sam_text(&self) -> bool {
        let name = self.path.to_string_lossy().to_lowercase();
        name.ends_with(".sam") || name.ends_with(".sam.gz")
    }

    /// Stream every retained record into `f`, returning how many were seen.
    ///
    /// The whole stream is consumed; for samtools input the exit status is
    /// checked after the last line, so a truncated stream is an error.
    pub fn for_each<F>(&self, f: F) -> Result<u64>
    where
        F: FnMut(SamRecord) -> Result<()>,
    {
        if self.is_sam_text() {
            let reader = open_reader(&self.path)?;
            read_records(reader, f).with_context(|| format!("Failed to read {}", self.path.display()))
        } else {
            self.read_samtools(f)
        }
    }

    fn read_samtools<F>(&self, f: F) -> Result<u64>
    where
        F: FnMut(SamRecord) -> Result<()>,
    {
        let tool = self.samtools.display().to_string();

        let mut cmd = Command::new(&self.samtools);
        cmd.arg("view")
            .arg("-h")
            .arg("-F")
            .arg(format!("{:#x}", EXCLUDED_FLAGS))
            .arg(&self.path)
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        log::debug!("Running samtools: {:?}", cmd);

        let mut child = cmd.spawn().map_err(|source| SourceError::Spawn {
            tool: tool.clone(),
            source,
        })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SourceError::NoStdout { tool: tool.clone() })?;

        let result = read_records(BufReader::new(stdout), f);
        if result.is_err() {
            // Stop the producer; its status no longer matters
            let _ = child.kill();
        }
        let status = child.wait()?;

        let count = result.with_context(|| format!("Failed to read {}", self.path.display()))?;
        if !status.success() {
            return Err(SourceError::Failed {
                tool,
                status,
                path: self.path.clone(),
            }
            .into());
        }
        Ok(count)
    }
}

/// Read SAM text with its optional header, skipping excluded records.
///
/// The FLAG column is decoded first, so records that are skipped are never
/// validated any further.
pub fn read_records<R, F>(reader: R, mut f: F) -> Result<u64>
where
    R: BufRead,
    F: FnMut(SamRecord) -> Result<()>,
{
    let mut reader = sam::io::Reader::new(reader);
    reader.read_header().context("Failed to read SAM header")?;

    let mut raw = sam::Record::default();
    let mut index = 0u64;
    let mut count = 0u64;

    loop {
        index += 1;
        let read = reader
            .read_record(&mut raw)
            .with_context(|| format!("Error reading record {}", index))?;
        if read == 0 {
            break;
        }

        let flags = record_flags(&raw).with_context(|| format!("Error parsing record {}", index))?;
        if flags & EXCLUDED_FLAGS != 0 {
            continue;
        }
        let record = SamRecord::from_record(&raw)
            .with_context(|| format!("Error parsing record {}", index))?;

        count += 1;
        f(record)?;
    }

    Ok(count)
}
