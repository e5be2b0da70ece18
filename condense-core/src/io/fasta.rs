//! Chromosome lengths from a FASTA reference
//!
//! Only the sequence lengths are kept. Parsing goes through needletail,
//! which also takes care of gzip-compressed references.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use needletail::parser::FastxReader;
use needletail::{parse_fastx_file, parse_fastx_reader};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenomeError {
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Duplicate sequence name in reference: {0}")]
    DuplicateChromosome(String),
    #[error("Empty sequence name in reference header")]
    EmptyName,
}

/// Length of every chromosome of a reference genome, in file order.
#[derive(Debug, Clone, Default)]
pub struct GenomeSizes {
    lengths: HashMap<String, u64>,
    order: Vec<String>,
}

impl GenomeSizes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a FASTA file (plain or gzip) and record each sequence length.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = parse_fastx_file(path)
            .map_err(|e| GenomeError::Parse(e.to_string()))
            .with_context(|| format!("Failed to read reference {}", path.display()))?;
        Self::from_fastx(reader)
            .with_context(|| format!("Failed to read reference {}", path.display()))
    }

    /// Read FASTA data from any readable source.
    pub fn from_reader<R: Read + Send>(reader: R) -> Result<Self> {
        let reader = parse_fastx_reader(reader).map_err(|e| GenomeError::Parse(e.to_string()))?;
        Self::from_fastx(reader)
    }

    fn from_fastx(mut reader: Box<dyn FastxReader + '_>) -> Result<Self> {
        let mut genome = Self::new();

        while let Some(record) = reader.next() {
            let record = record.map_err(|e| GenomeError::Parse(e.to_string()))?;
            // The name is the first word of the header line
            let header = String::from_utf8_lossy(record.id());
            let name = header.split_whitespace().next().unwrap_or_default().to_string();
            genome.insert(name, record.seq().len() as u64)?;
        }

        log::debug!("Loaded {} reference sequences", genome.len());
        Ok(genome)
    }

    /// Register a chromosome length. Names must be unique.
    pub fn insert(&mut self, name: String, length: u64) -> Result<(), GenomeError> {
        if name.is_empty() {
            return Err(GenomeError::EmptyName);
        }
        if self.lengths.contains_key(&name) {
            return Err(GenomeError::DuplicateChromosome(name));
        }
        self.lengths.insert(name.clone(), length);
        self.order.push(name);
        Ok(())
    }

    pub fn length(&self, chrom: &str) -> Option<u64> {
        self.lengths.get(chrom).copied()
    }

    pub fn contains(&self, chrom: &str) -> bool {
        self.lengths.contains_key(chrom)
    }

    /// Chromosome names in reference order.
    pub fn chromosomes(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_lengths_sum_sequence_lines() {
        let fasta = ">chr1 assembled\nACGTACGTAC\nACG\n>chr2\nNNNN\nAC\nA\n";
        let genome = GenomeSizes::from_reader(Cursor::new(fasta)).unwrap();

        assert_eq!(genome.len(), 2);
        assert_eq!(genome.length("chr1"), Some(13));
        assert_eq!(genome.length("chr2"), Some(7));
        assert_eq!(genome.length("chr3"), None);
        assert_eq!(genome.chromosomes().collect::<Vec<_>>(), vec!["chr1", "chr2"]);
    }

    #[test]
    fn test_duplicate_header_is_fatal() {
        let fasta = ">chr1\nACGT\n>chr1 again\nAC\n";
        let err = GenomeSizes::from_reader(Cursor::new(fasta)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GenomeError>(),
            Some(GenomeError::DuplicateChromosome(name)) if name == "chr1"
        ));
    }

    #[test]
    fn test_insert() {
        let mut genome = GenomeSizes::new();
        genome.insert("chrX".to_string(), 100).unwrap();
        assert!(genome.contains("chrX"));
        assert!(matches!(genome.insert(String::new(), 5), Err(GenomeError::EmptyName)));
    }
}
