//! File format I/O modules for condense-seq
//!
//! Readers and writers for the formats the pipeline consumes and produces:
//! SAM text records, FASTA references, tab-separated coverage/count tables
//! (`.gtab`, optionally gzip-compressed) and titration tables.

pub mod fasta;
pub mod sam;
pub mod table;
pub mod titration;

pub use fasta::{GenomeError, GenomeSizes};
pub use sam::{SamError, SamRecord};
pub use table::{TableError, TableHeader, TableReader, TableSchema};
pub use titration::{TitrationError, TitrationTable};

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Whether a path names a gzip-compressed file.
pub fn is_gzipped<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

/// Open a text file for line reading, decompressing `.gz` files transparently.
pub fn open_reader<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead + Send>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;

    let reader: Box<dyn BufRead + Send> = if is_gzipped(path) {
        Box::new(BufReader::new(MultiGzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(reader)
}

/// Sample label of an input file: its file name up to the first `.`.
pub fn sample_label<P: AsRef<Path>>(path: P) -> String {
    let name = path
        .as_ref()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.split_once('.') {
        Some((stem, _)) => stem.to_string(),
        None => name,
    }
}

/// Output table file, plain or gzip-compressed.
///
/// Must be closed with [`OutputFile::finish`] so that write errors in the
/// gzip trailer are reported instead of being dropped.
pub enum OutputFile {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl OutputFile {
    /// Create `path`, gzip-compressing at `level` (0-9) when given.
    pub fn create<P: AsRef<Path>>(path: P, level: Option<u32>) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        let writer = BufWriter::new(file);

        Ok(match level {
            Some(level) => OutputFile::Gzip(GzEncoder::new(writer, Compression::new(level))),
            None => OutputFile::Plain(writer),
        })
    }

    /// Flush all buffered data and write the gzip trailer.
    pub fn finish(self) -> io::Result<()> {
        match self {
            OutputFile::Plain(mut writer) => writer.flush(),
            OutputFile::Gzip(encoder) => encoder.finish()?.flush(),
        }
    }
}

impl Write for OutputFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            OutputFile::Plain(writer) => writer.write(buf),
            OutputFile::Gzip(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            OutputFile::Plain(writer) => writer.flush(),
            OutputFile::Gzip(encoder) => encoder.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;

    #[test]
    fn test_sample_label() {
        assert_eq!(sample_label("/data/run1/H1_NCP_sp_1_rep1.sorted.bam"), "H1_NCP_sp_1_rep1");
        assert_eq!(sample_label("plain"), "plain");
        assert_eq!(sample_label("dir/x.sam.gz"), "x");
    }

    #[test]
    fn test_is_gzipped() {
        assert!(is_gzipped("a_cov.gtab.gz"));
        assert!(is_gzipped("genome.fa.GZ"));
        assert!(!is_gzipped("a_cov.gtab"));
        assert!(!is_gzipped("gz"));
    }

    #[test]
    fn test_gzip_roundtrip() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("t_cov.gtab.gz");

        let mut out = OutputFile::create(&path, Some(6))?;
        writeln!(out, "Chromosome\tPosition\ta")?;
        writeln!(out, "chr1\t0\t1")?;
        out.finish()?;

        let mut text = String::new();
        open_reader(&path)?.read_to_string(&mut text)?;
        assert_eq!(text, "Chromosome\tPosition\ta\nchr1\t0\t1\n");

        // Raw bytes carry the gzip magic number
        let raw = std::fs::read(&path)?;
        assert_eq!(&raw[..2], &[0x1f, 0x8b]);
        Ok(())
    }

    #[test]
    fn test_plain_output() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("t_cov.gtab");
        let mut out = OutputFile::create(&path, None)?;
        write!(out, "x")?;
        out.finish()?;
        assert_eq!(std::fs::read_to_string(&path)?, "x");
        Ok(())
    }

    #[test]
    fn test_open_missing_file_names_path() {
        let err = open_reader("/nonexistent/input.gtab").err().unwrap();
        assert!(err.to_string().contains("/nonexistent/input.gtab"));
    }
}
