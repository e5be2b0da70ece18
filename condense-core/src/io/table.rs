//! Genomic table reader (`.gtab`, optionally gzip-compressed)
//!
//! A table starts with a header row naming the chromosome column, one or
//! two coordinate columns and then one column per sample. Two layouts
//! exist:
//!
//! - point tables: `Chromosome Position <samples...>`
//! - binned tables: `Chromosome Start End <samples...> [GCcontent ...]`
//!
//! In binned tables the `GCcontent` column, when present, marks the end of
//! the sample columns. The layout is resolved once from the header into a
//! [`TableSchema`]. Fields are split on whitespace and blank lines are
//! ignored.

use std::io::{self, BufRead};
use std::ops::Range;
use std::path::Path;

use anyhow::{Context, Result};
use thiserror::Error;

use super::open_reader;

/// Header marker that ends the sample columns of a binned table.
pub const GC_CONTENT_COLUMN: &str = "GCcontent";

#[derive(Debug, Error)]
pub enum TableError {
    #[error("Table has no header row")]
    EmptyTable,
    #[error("Unrecognized table header: {0}")]
    UnknownLayout(String),
    #[error("Line {line}: expected at least {expected} columns, found {found}")]
    ShortRow {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("Line {line}: invalid value '{value}' in column {column}")]
    InvalidValue {
        line: usize,
        column: usize,
        value: String,
    },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableSchema {
    Point,
    Binned { gc_column: Option<usize> },
}

impl TableSchema {
    /// Resolve the layout from the header fields.
    pub fn from_header(fields: &[&str]) -> Result<Self, TableError> {
        match (fields.get(1).copied(), fields.get(2).copied()) {
            (Some("Position"), _) => Ok(TableSchema::Point),
            (Some("Start"), Some("End")) => {
                let gc_column = fields
                    .iter()
                    .skip(3)
                    .position(|f| *f == GC_CONTENT_COLUMN)
                    .map(|i| i + 3);
                Ok(TableSchema::Binned { gc_column })
            }
            _ => Err(TableError::UnknownLayout(fields.join("\t"))),
        }
    }

    /// Number of leading columns (chromosome included) before the samples.
    pub fn coordinate_columns(&self) -> usize {
        match self {
            TableSchema::Point => 2,
            TableSchema::Binned { .. } => 3,
        }
    }

    /// Column range of the sample values in a table `width` columns wide.
    pub fn value_range(&self, width: usize) -> Range<usize> {
        let start = self.coordinate_columns();
        let end = match self {
            TableSchema::Binned {
                gc_column: Some(gc),
            } => *gc,
            _ => width,
        };
        start..end.max(start)
    }

    /// Header names of the leading columns as written to output tables.
    pub fn coordinate_names(&self) -> &'static [&'static str] {
        match self {
            TableSchema::Point => &["Chromosome", "Position"],
            TableSchema::Binned { .. } => &["Chromosome", "Start", "End"],
        }
    }
}

/// Parsed header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableHeader {
    pub fields: Vec<String>,
    pub schema: TableSchema,
}

impl TableHeader {
    pub fn parse(line: &str) -> Result<Self, TableError> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let schema = TableSchema::from_header(&fields)?;
        Ok(Self {
            fields: fields.into_iter().map(str::to_string).collect(),
            schema,
        })
    }

    pub fn value_range(&self) -> Range<usize> {
        self.schema.value_range(self.fields.len())
    }

    pub fn sample_names(&self) -> &[String] {
        &self.fields[self.value_range()]
    }

    pub fn sample_count(&self) -> usize {
        self.value_range().len()
    }
}

/// One data row, borrowed from the reader's line buffer.
#[derive(Debug)]
pub struct TableRow<'a> {
    pub line: usize,
    pub fields: Vec<&'a str>,
}

impl<'a> TableRow<'a> {
    pub fn chrom(&self) -> &'a str {
        self.fields[0]
    }

    /// Finite numeric value of `column`; `nan` and `inf` are rejected.
    pub fn value(&self, column: usize) -> Result<f64, TableError> {
        let raw = self.fields[column];
        raw.parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| TableError::InvalidValue {
                line: self.line,
                column: column + 1,
                value: raw.to_string(),
            })
    }
}

/// Streaming reader over the rows of one table.
pub struct TableReader<R> {
    reader: R,
    header: TableHeader,
    buf: String,
    line_num: usize,
}

impl TableReader<Box<dyn BufRead + Send>> {
    /// Open a plain or gzip table file and read its header.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = open_reader(path)?;
        TableReader::from_reader(reader)
            .with_context(|| format!("Failed to read header of {}", path.display()))
    }
}

impl<R: BufRead> TableReader<R> {
    /// Read the header (the first non-blank line) and resolve the schema.
    pub fn from_reader(mut reader: R) -> Result<Self, TableError> {
        let mut buf = String::new();
        let mut line_num = 0;

        loop {
            buf.clear();
            if reader.read_line(&mut buf)? == 0 {
                return Err(TableError::EmptyTable);
            }
            line_num += 1;
            if !buf.trim().is_empty() {
                break;
            }
        }

        let header = TableHeader::parse(&buf)?;
        Ok(Self {
            reader,
            header,
            buf,
            line_num,
        })
    }

    pub fn header(&self) -> &TableHeader {
        &self.header
    }

    pub fn schema(&self) -> TableSchema {
        self.header.schema
    }

    /// Next data row, or `None` at end of input.
    ///
    /// Every returned row has at least as many fields as the last sample
    /// column requires.
    pub fn next_row(&mut self) -> Result<Option<TableRow<'_>>, TableError> {
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line_num += 1;
            if !self.buf.trim().is_empty() {
                break;
            }
        }

        let fields: Vec<&str> = self.buf.split_whitespace().collect();
        let expected = self.header.value_range().end;
        if fields.len() < expected {
            return Err(TableError::ShortRow {
                line: self.line_num,
                expected,
                found: fields.len(),
            });
        }

        Ok(Some(TableRow {
            line: self.line_num,
            fields,
        }))
    }
}
