//! Titration tables
//!
//! Whitespace-separated text with a header line. Each data row ends with
//! its titration index; the total dilution fraction sits two columns
//! before it. Rows whose last column is not an integer are annotations and
//! are skipped.

use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::Path;

use anyhow::{Context, Result};
use thiserror::Error;

use super::open_reader;

#[derive(Debug, Error, PartialEq)]
pub enum TitrationError {
    #[error("Line {line}: duplicate titration index {index}")]
    DuplicateIndex { line: usize, index: i64 },
    #[error("Line {line}: invalid dilution fraction '{value}'")]
    InvalidFraction { line: usize, value: String },
    #[error("Line {line}: expected at least 3 columns, found {found}")]
    TooFewColumns { line: usize, found: usize },
    #[error("Titration index {0} is not in the titration table")]
    MissingIndex(i64),
}

/// Titration index to total dilution fraction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TitrationTable(BTreeMap<i64, f64>);

impl TitrationTable {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = open_reader(path)?;
        Self::from_reader(reader)
            .with_context(|| format!("Failed to read titration table {}", path.display()))
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut table = BTreeMap::new();

        for (idx, line) in reader.lines().enumerate().skip(1) {
            let line = line?;
            let line_num = idx + 1;
            let cols: Vec<&str> = line.split_whitespace().collect();

            let Some(index) = cols.last().and_then(|c| c.parse::<i64>().ok()) else {
                continue;
            };
            if cols.len() < 3 {
                return Err(TitrationError::TooFewColumns {
                    line: line_num,
                    found: cols.len(),
                }
                .into());
            }

            let raw = cols[cols.len() - 3];
            let fraction: f64 = raw.parse().map_err(|_| TitrationError::InvalidFraction {
                line: line_num,
                value: raw.to_string(),
            })?;

            if table.insert(index, fraction).is_some() {
                return Err(TitrationError::DuplicateIndex {
                    line: line_num,
                    index,
                }
                .into());
            }
        }

        log::debug!("Loaded {} titration points", table.len());
        Ok(Self(table))
    }

    pub fn fraction(&self, index: i64) -> Option<f64> {
        self.0.get(&index).copied()
    }

    /// Fraction of `index`, or [`TitrationError::MissingIndex`].
    pub fn require(&self, index: i64) -> Result<f64, TitrationError> {
        self.fraction(index).ok_or(TitrationError::MissingIndex(index))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, f64)> + '_ {
        self.0.iter().map(|(&k, &v)| (k, v))
    }
}

impl FromIterator<(i64, f64)> for TitrationTable {
    fn from_iter<I: IntoIterator<Item = (i64, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
