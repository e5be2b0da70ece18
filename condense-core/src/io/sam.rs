//! SAM alignment records
//!
//! Lines are read with the noodles SAM reader. [`SamRecord`] keeps only the
//! fields the fragment filter looks at. Every optional field of a converted
//! record is decoded, so a malformed tag is an error, never a silent skip.

use std::io;

use noodles::sam;
use noodles::sam::alignment::record::cigar::op::Kind;
use noodles::sam::alignment::record::data::field::{Tag, Value};
use noodles::sam::alignment::record::{Cigar, Data};
use thiserror::Error;

use crate::types::GenomicPos;

/// SAM flag bits used by the fragment filter.
pub mod flags {
    pub const PROPER_PAIR: u16 = 0x2;
    pub const UNMAPPED: u16 = 0x4;
    pub const MATE_UNMAPPED: u16 = 0x8;
    pub const REVERSE: u16 = 0x10;
    pub const SECONDARY: u16 = 0x100;
    pub const SUPPLEMENTARY: u16 = 0x800;
}

/// Reference name of records without a mapping.
pub const UNMAPPED_REFERENCE: &str = "*";

#[derive(Debug, Error)]
pub enum SamError {
    #[error("Invalid {field}: {source}")]
    InvalidField {
        field: &'static str,
        source: io::Error,
    },
    #[error("Empty SAM line")]
    EmptyLine,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

fn invalid(field: &'static str) -> impl FnOnce(io::Error) -> SamError {
    move |source| SamError::InvalidField { field, source }
}

/// One alignment line, reduced to what fragment reconstruction needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamRecord {
    pub read_name: String,
    pub flags: u16,
    pub reference: String,
    /// 0-based leftmost position; `-1` for records without a position.
    pub position: GenomicPos,
    pub template_length: i64,
    /// Reference bases walked by the `M` and `D` operations of the CIGAR.
    pub match_deletion_span: u64,
    /// Edit distance to the reference (`NM`), when present as an integer.
    pub edit_distance: Option<i64>,
}

/// FLAG of a raw record, decoded without touching the other fields.
pub fn record_flags(record: &sam::Record) -> Result<u16, SamError> {
    record
        .flags()
        .map(|flags| flags.bits())
        .map_err(invalid("FLAG"))
}

/// Sum of the `M` and `D` operation lengths.
///
/// This is the distance from the alignment start to its rightmost reference
/// coordinate for the aligners this pipeline consumes.
pub fn match_deletion_span(cigar: &dyn Cigar) -> io::Result<u64> {
    let mut span = 0u64;
    for op in cigar.iter() {
        let op = op?;
        if matches!(op.kind(), Kind::Match | Kind::Deletion) {
            span += op.len() as u64;
        }
    }
    Ok(span)
}

fn int_value(value: &Value<'_>) -> Option<i64> {
    match value {
        Value::Int8(n) => Some(i64::from(*n)),
        Value::UInt8(n) => Some(i64::from(*n)),
        Value::Int16(n) => Some(i64::from(*n)),
        Value::UInt16(n) => Some(i64::from(*n)),
        Value::Int32(n) => Some(i64::from(*n)),
        Value::UInt32(n) => Some(i64::from(*n)),
        _ => None,
    }
}

/// Decode every optional field and return the integer `NM`, if any.
fn edit_distance(data: &dyn Data) -> Result<Option<i64>, SamError> {
    let mut nm = None;
    for field in data.iter() {
        let (tag, value) = field.map_err(invalid("optional field"))?;
        if tag == Tag::EDIT_DISTANCE {
            nm = int_value(&value);
        }
    }
    Ok(nm)
}

impl SamRecord {
    /// Convert a raw noodles record, validating every field that is used.
    pub fn from_record(record: &sam::Record) -> Result<Self, SamError> {
        let flags = record_flags(record)?;

        let position = match record.alignment_start().transpose().map_err(invalid("POS"))? {
            Some(start) => start.get() as GenomicPos - 1,
            None => -1,
        };

        let template_length = record.template_length().map_err(invalid("TLEN"))?;
        let match_deletion_span = match_deletion_span(&record.cigar()).map_err(invalid("CIGAR"))?;

        Ok(SamRecord {
            read_name: record.name().map(|name| String::from_utf8_lossy(name.as_ref()).into_owned()).unwrap_or_default(),
            flags,
            reference: record
                .reference_sequence_name()
                .map(|name| String::from_utf8_lossy(name.as_ref()).into_owned())
                .unwrap_or_else(|| UNMAPPED_REFERENCE.to_string()),
            position,
            template_length: i64::from(template_length),
            match_deletion_span,
            edit_distance: edit_distance(&record.data())?,
        })
    }

    /// Parse a single SAM alignment line (header lines are not accepted).
    pub fn parse_line(line: &str) -> Result<Self, SamError> {
        let mut reader = sam::io::Reader::new(line.as_bytes());
        let mut record = sam::Record::default();
        if reader.read_record(&mut record)? == 0 {
            return Err(SamError::EmptyLine);
        }
        Self::from_record(&record)
    }

    pub fn has_flag(&self, flag: u16) -> bool {
        self.flags & flag != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEFT_MATE: &str = "NB501:12:HXXX:1:11101:1000:2000\t99\tchr1\t101\t42\t51M\t=\t201\t147\tACGT\tFFFF\tAS:i:-3\tXS:i:-20\tXN:i:0\tNM:i:1\tMD:Z:20A30\tYT:Z:CP";

    #[test]
    fn test_parse_mandatory_fields() {
        let record = SamRecord::parse_line(LEFT_MATE).unwrap();
        assert_eq!(record.read_name, "NB501:12:HXXX:1:11101:1000:2000");
        assert_eq!(record.flags, 99);
        assert_eq!(record.reference, "chr1");
        assert_eq!(record.position, 100);
        assert_eq!(record.template_length, 147);
        assert_eq!(record.match_deletion_span, 51);
        assert_eq!(record.edit_distance, Some(1));
        assert!(record.has_flag(flags::PROPER_PAIR));
        assert!(!record.has_flag(flags::REVERSE));
    }

    #[test]
    fn test_span_counts_matches_and_deletions() {
        let line = "r1\t163\tchr1\t197\t42\t5S20M2I3D10M\t=\t101\t-149\tACGT\tFFFF\tNM:i:5";
        let record = SamRecord::parse_line(line).unwrap();
        assert_eq!(record.match_deletion_span, 33);
        assert_eq!(record.template_length, -149);
    }

    #[test]
    fn test_unmapped_record() {
        let line = "r1\t77\t*\t0\t0\t*\t*\t0\t0\tACGT\tFFFF";
        let record = SamRecord::parse_line(line).unwrap();
        assert_eq!(record.position, -1);
        assert_eq!(record.reference, UNMAPPED_REFERENCE);
        assert_eq!(record.match_deletion_span, 0);
        assert_eq!(record.edit_distance, None);
    }

    #[test]
    fn test_malformed_tags_are_errors() {
        for field in ["NM:i:x", "NM:1"] {
            let line = format!("r1\t99\tchr1\t101\t42\t4M\t=\t201\t147\tACGT\tFFFF\t{field}");
            assert!(
                matches!(
                    SamRecord::parse_line(&line),
                    Err(SamError::InvalidField { field: "optional field", .. })
                ),
                "{field}"
            );
        }
    }

    #[test]
    fn test_invalid_numeric_field() {
        let line = "r1\t99\tchr1\tabc\t42\t51M\t=\t201\t147\tACGT\tFFFF";
        assert!(matches!(
            SamRecord::parse_line(line),
            Err(SamError::InvalidField { field: "POS", .. })
        ));
    }

    #[test]
    fn test_invalid_cigar() {
        let line = "r1\t99\tchr1\t101\t42\t51Q\t=\t201\t147\tACGT\tFFFF";
        assert!(matches!(
            SamRecord::parse_line(line),
            Err(SamError::InvalidField { field: "CIGAR", .. })
        ));
    }

    #[test]
    fn test_flags_decode_alone() {
        // The tag is malformed but the flag is still readable
        let line = "r1\t147\tchr1\t101\t42\t4M\t=\t1\t-104\tACGT\tFFFF\tNM:i:x";
        let mut reader = sam::io::Reader::new(line.as_bytes());
        let mut record = sam::Record::default();
        reader.read_record(&mut record).unwrap();
        assert_eq!(record_flags(&record).unwrap(), 147);
    }
}
