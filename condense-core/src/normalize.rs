//! Titration aggregation and molecule-number normalization
//!
//! Tables are grouped by titration index. For each group, pass 1 sums every
//! sample column over all rows of all files of the group; pass 2 rewrites
//! each file, replacing a value `v` of column `i` by the estimated number of
//! molecules `round(mnum * v / total[i])`, where `mnum` is the total input
//! molecule count scaled by the titration's dilution fraction. Rounding is
//! half-to-even.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use thiserror::Error;

use crate::io::{OutputFile, TableReader, TitrationTable};

/// Molecules per unit of `mscale`.
pub const MOLECULES_PER_UNIT: f64 = 1.6e12;

/// Replaces the last `_`-delimited part of an input file name.
pub const NUMBER_SUFFIX: &str = "_num.gtab";

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("{}: {found} sample columns, but earlier files of titration {tnum} have {expected}", .path.display())]
    ColumnCountMismatch {
        tnum: i64,
        path: PathBuf,
        expected: usize,
        found: usize,
    },
    #[error("Titration {tnum}: column {column} sums to zero")]
    ZeroColumnTotal { tnum: i64, column: String },
    #[error("Titration {tnum}: column {column} sums to {total}")]
    NonFiniteColumnTotal { tnum: i64, column: String, total: f64 },
    #[error("Molecule number {0} is outside the integer range")]
    MoleculeNumberOutOfRange(f64),
    #[error("Mismatch of input file and titration number: {groups} file groups, {tnums} titration numbers")]
    GroupCountMismatch { groups: usize, tnums: usize },
    #[error("Titration number {0} is given more than once")]
    DuplicateGroup(i64),
    #[error("Titration {0} has no input files")]
    EmptyGroup(i64),
    #[error("Output {} would overwrite an input file", .0.display())]
    OutputOverwritesInput(PathBuf),
    #[error("Inputs {} and {} would both be written to {}", .first.display(), .second.display(), .output.display())]
    DuplicateOutput {
        first: PathBuf,
        second: PathBuf,
        output: PathBuf,
    },
}

/// Table files grouped by titration index, ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TitrationGroups(BTreeMap<i64, Vec<PathBuf>>);

impl TitrationGroups {
    /// Pair each file list with its titration number.
    ///
    /// Without explicit numbers the lists are numbered `0, 1, 2, ...` in
    /// the order given.
    pub fn from_lists(tnums: Option<&[i64]>, lists: Vec<Vec<PathBuf>>) -> Result<Self, NormalizeError> {
        let numbers: Vec<i64> = match tnums {
            Some(tnums) => {
                if tnums.len() != lists.len() {
                    return Err(NormalizeError::GroupCountMismatch {
                        groups: lists.len(),
                        tnums: tnums.len(),
                    });
                }
                tnums.to_vec()
            }
            None => (0..lists.len() as i64).collect(),
        };

        let mut groups = BTreeMap::new();
        for (tnum, files) in numbers.into_iter().zip(lists) {
            if files.is_empty() {
                return Err(NormalizeError::EmptyGroup(tnum));
            }
            if groups.insert(tnum, files).is_some() {
                return Err(NormalizeError::DuplicateGroup(tnum));
            }
        }
        Ok(Self(groups))
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, &[PathBuf])> {
        self.0.iter().map(|(&tnum, files)| (tnum, files.as_slice()))
    }

    pub fn tnums(&self) -> impl Iterator<Item = i64> + '_ {
        self.0.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct NormalizeParams {
    /// Molecules in the input sample (`mscale * MOLECULES_PER_UNIT`).
    pub total_molecules: f64,
    /// Rows of other chromosomes are ignored in both passes.
    pub targets: Option<HashSet<String>>,
    /// Directory of the outputs; next to each input when `None`.
    pub out_dir: Option<PathBuf>,
    pub compression: Option<u32>,
}

impl Default for NormalizeParams {
    fn default() -> Self {
        Self {
            total_molecules: MOLECULES_PER_UNIT,
            targets: None,
            out_dir: None,
            compression: Some(6),
        }
    }
}

impl NormalizeParams {
    fn is_target(&self, chrom: &str) -> bool {
        self.targets.as_ref().map_or(true, |targets| targets.contains(chrom))
    }
}

/// Per-column sums over one titration group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnTotals {
    pub names: Vec<String>,
    pub values: Vec<f64>,
    pub rows: u64,
}

impl ColumnTotals {
    /// A zero or non-finite total makes every value of its column undefined.
    pub fn check_nonzero(&self, tnum: i64) -> Result<(), NormalizeError> {
        if self.rows == 0 {
            return Ok(());
        }
        for (name, &total) in self.names.iter().zip(&self.values) {
            if !total.is_finite() {
                return Err(NormalizeError::NonFiniteColumnTotal {
                    tnum,
                    column: name.clone(),
                    total,
                });
            }
            if total == 0.0 {
                return Err(NormalizeError::ZeroColumnTotal {
                    tnum,
                    column: name.clone(),
                });
            }
        }
        Ok(())
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Pass 1: sum every sample column over all target rows of `files`.
pub fn column_totals(tnum: i64, files: &[PathBuf], params: &NormalizeParams) -> Result<ColumnTotals> {
    let mut totals: Option<ColumnTotals> = None;

    for path in files {
        log::info!("reading {}", display_name(path));
        let mut reader = TableReader::open(path)?;
        let header = reader.header().clone();
        let range = header.value_range();

        let totals = totals.get_or_insert_with(|| ColumnTotals {
            names: header.sample_names().to_vec(),
            values: vec![0.0; range.len()],
            rows: 0,
        });
        if totals.values.len() != range.len() {
            return Err(NormalizeError::ColumnCountMismatch {
                tnum,
                path: path.clone(),
                expected: totals.values.len(),
                found: range.len(),
            }
            .into());
        }

        while let Some(row) = reader
            .next_row()
            .with_context(|| format!("Failed to read {}", path.display()))?
        {
            if !params.is_target(row.chrom()) {
                continue;
            }
            for (total, column) in totals.values.iter_mut().zip(range.clone()) {
                *total += row
                    .value(column)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
            }
            totals.rows += 1;
        }
    }

    Ok(totals.unwrap_or_default())
}

/// 2^63, the first magnitude outside the `i64` range.
const I64_LIMIT: f64 = 9_223_372_036_854_775_808.0;

/// Estimated molecule count of a value: `round(mnum * value / total)`.
pub fn molecule_number(mnum: f64, value: f64, total: f64) -> Result<i64, NormalizeError> {
    let number = (mnum * (value / total)).round_ties_even();
    if number.is_finite() && (-I64_LIMIT..I64_LIMIT).contains(&number) {
        Ok(number as i64)
    } else {
        Err(NormalizeError::MoleculeNumberOutOfRange(number))
    }
}

/// Pass 2 for one table: write its molecule numbers to `out`.
///
/// Returns the number of rows written.
pub fn rescale_table<R, W>(
    mut reader: TableReader<R>,
    out: &mut W,
    totals: &[f64],
    mnum: f64,
    params: &NormalizeParams,
) -> Result<u64>
where
    R: BufRead,
    W: Write,
{
    let header = reader.header().clone();
    let range = header.value_range();
    ensure!(
        range.len() == totals.len(),
        "table has {} sample columns but {} column totals were given",
        range.len(),
        totals.len()
    );

    let names: Vec<&str> = header
        .schema
        .coordinate_names()
        .iter()
        .copied()
        .chain(header.sample_names().iter().map(String::as_str))
        .collect();
    writeln!(out, "{}", names.join("\t"))?;

    let mut rows = 0u64;
    while let Some(row) = reader.next_row()? {
        if !params.is_target(row.chrom()) {
            continue;
        }

        write!(out, "{}", row.fields[..range.start].join("\t"))?;
        for (column, &total) in range.clone().zip(totals) {
            let number = molecule_number(mnum, row.value(column)?, total)
                .with_context(|| format!("Line {}", row.line))?;
            write!(out, "\t{}", number)?;
        }
        writeln!(out)?;
        rows += 1;
    }

    Ok(rows)
}

/// Output path of `input`: its name up to the last `_`, plus the suffix.
pub fn output_path(input: &Path, out_dir: Option<&Path>, gzip: bool) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.rsplit_once('_').map_or(name.as_str(), |(stem, _)| stem);
    let file = if gzip {
        format!("{}{}.gz", stem, NUMBER_SUFFIX)
    } else {
        format!("{}{}", stem, NUMBER_SUFFIX)
    };

    match out_dir {
        Some(dir) => dir.join(file),
        None => input.with_file_name(file),
    }
}

/// Output path of every input, in group order.
///
/// Fails when two inputs share an output or an output would replace any
/// input, so no file is written over another file of the same run.
pub fn plan_outputs(groups: &TitrationGroups, params: &NormalizeParams) -> Result<Vec<PathBuf>, NormalizeError> {
    let gzip = params.compression.is_some();
    let inputs: HashSet<&Path> = groups
        .iter()
        .flat_map(|(_, files)| files.iter().map(PathBuf::as_path))
        .collect();

    let mut claimed: HashMap<PathBuf, &Path> = HashMap::new();
    let mut outputs = Vec::new();
    for (_, files) in groups.iter() {
        for input in files {
            let output = output_path(input, params.out_dir.as_deref(), gzip);
            if inputs.contains(output.as_path()) {
                return Err(NormalizeError::OutputOverwritesInput(output));
            }
            if let Some(first) = claimed.insert(output.clone(), input) {
                return Err(NormalizeError::DuplicateOutput {
                    first: first.to_path_buf(),
                    second: input.clone(),
                    output,
                });
            }
            outputs.push(output);
        }
    }
    Ok(outputs)
}

/// Pass 2 for one file, written to `output`.
pub fn rescale_file(
    input: &Path,
    output: &Path,
    totals: &[f64],
    mnum: f64,
    params: &NormalizeParams,
) -> Result<()> {
    if output == input {
        return Err(NormalizeError::OutputOverwritesInput(output.to_path_buf()).into());
    }

    let reader = TableReader::open(input)?;
    let mut out = OutputFile::create(output, params.compression)?;
    let rows = rescale_table(reader, &mut out, totals, mnum, params)
        .with_context(|| format!("Failed to convert {}", input.display()))?;
    out.finish()
        .with_context(|| format!("Failed to write {}", output.display()))?;

    log::debug!("Wrote {} rows to {}", rows, output.display());
    Ok(())
}

/// Run stage 2 over every group and return the written paths.
///
/// Every titration index and output path is checked before any file is
/// read.
pub fn run(groups: &TitrationGroups, titration: &TitrationTable, params: &NormalizeParams) -> Result<Vec<PathBuf>> {
    let fractions = groups
        .tnums()
        .map(|tnum| titration.require(tnum))
        .collect::<Result<Vec<f64>, _>>()?;
    let outputs = plan_outputs(groups, params)?;

    let mut planned = outputs.iter();
    for ((tnum, files), fraction) in groups.iter().zip(fractions) {
        log::info!("processing tnum {}", tnum);
        let mnum = params.total_molecules * fraction;

        let totals = column_totals(tnum, files, params)?;
        totals.check_nonzero(tnum)?;
        log::debug!("tnum {}: {} rows, totals {:?}", tnum, totals.rows, totals.values);

        for (path, output) in files.iter().zip(planned.by_ref()) {
            log::info!("converting {}", display_name(path));
            rescale_file(path, output, &totals.values, mnum, params)?;
        }
    }

    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_molecule_number() {
        let mnum = 1.0 * MOLECULES_PER_UNIT * 0.5;
        assert_eq!(molecule_number(mnum, 10.0, 100.0).unwrap(), 80_000_000_000);
    }

    #[test]
    fn test_rounding_is_half_to_even() {
        assert_eq!(molecule_number(1.0, 0.5, 1.0).unwrap(), 0);
        assert_eq!(molecule_number(1.0, 1.5, 1.0).unwrap(), 2);
        assert_eq!(molecule_number(1.0, 2.5, 1.0).unwrap(), 2);
        assert_eq!(molecule_number(1.0, 2.6, 1.0).unwrap(), 3);
    }

    #[test]
    fn test_unrepresentable_molecule_numbers() {
        for (mnum, value, total) in [(2e19, 1.0, 1.0), (-2e19, 1.0, 1.0), (1.0, 1.0, 0.0), (0.0, 1.0, 0.0), (f64::NAN, 1.0, 1.0)] {
            assert!(
                matches!(
                    molecule_number(mnum, value, total),
                    Err(NormalizeError::MoleculeNumberOutOfRange(_))
                ),
                "{mnum} * {value} / {total}"
            );
        }
        assert_eq!(molecule_number(9e18, 1.0, 1.0).unwrap(), 9_000_000_000_000_000_000);
    }

    #[test]
    fn test_non_finite_total_is_reported() {
        let totals = ColumnTotals {
            names: vec!["A".to_string(), "B".to_string()],
            values: vec![f64::INFINITY, 1.0],
            rows: 1,
        };
        assert!(matches!(
            totals.check_nonzero(2),
            Err(NormalizeError::NonFiniteColumnTotal { tnum: 2, column, .. }) if column == "A"
        ));

        let totals = ColumnTotals {
            values: vec![1.0, f64::NAN],
            ..totals
        };
        assert!(matches!(
            totals.check_nonzero(2),
            Err(NormalizeError::NonFiniteColumnTotal { column, .. }) if column == "B"
        ));
    }

    #[test]
    fn test_groups_default_numbering() {
        let groups = TitrationGroups::from_lists(
            None,
            vec![vec![PathBuf::from("a")], vec![PathBuf::from("b"), PathBuf::from("c")]],
        )
        .unwrap();
        assert_eq!(groups.tnums().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_groups_are_sorted_by_tnum() {
        let groups = TitrationGroups::from_lists(
            Some(&[5, 2][..]),
            vec![vec![PathBuf::from("five")], vec![PathBuf::from("two")]],
        )
        .unwrap();
        let order: Vec<_> = groups.iter().map(|(t, f)| (t, f[0].clone())).collect();
        assert_eq!(order, vec![(2, PathBuf::from("two")), (5, PathBuf::from("five"))]);
    }

    #[test]
    fn test_group_errors() {
        let lists = || vec![vec![PathBuf::from("a")], vec![PathBuf::from("b")]];
        assert!(matches!(
            TitrationGroups::from_lists(Some(&[1][..]), lists()),
            Err(NormalizeError::GroupCountMismatch { groups: 2, tnums: 1 })
        ));
        assert!(matches!(
            TitrationGroups::from_lists(Some(&[3, 3][..]), lists()),
            Err(NormalizeError::DuplicateGroup(3))
        ));
        assert!(matches!(
            TitrationGroups::from_lists(None, vec![vec![]]),
            Err(NormalizeError::EmptyGroup(0))
        ));
    }

    #[test]
    fn test_rescale_point_table() {
        let table = "Chromosome\tPosition\tA\tB\nchr1\t0\t10\t0\nchr2\t5\t90\t4\n";
        let reader = TableReader::from_reader(Cursor::new(table)).unwrap();
        let mut out = Vec::new();
        let rows = rescale_table(reader, &mut out, &[100.0, 4.0], 1000.0, &NormalizeParams::default()).unwrap();

        assert_eq!(rows, 2);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Chromosome\tPosition\tA\tB\nchr1\t0\t100\t0\nchr2\t5\t900\t1000\n"
        );
    }

    #[test]
    fn test_rescale_binned_table_drops_trailing_columns() {
        let table = "BinID Start End S1 GCcontent Extra\n1 0 100 5 0.41 x\n";
        let reader = TableReader::from_reader(Cursor::new(table)).unwrap();
        let mut out = Vec::new();
        rescale_table(reader, &mut out, &[10.0], 10.0, &NormalizeParams::default()).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Chromosome\tStart\tEnd\tS1\n1\t0\t100\t5\n"
        );
    }

    #[test]
    fn test_rescale_skips_non_target_rows() {
        let table = "Chromosome Position A\nchr1 0 1\nchrM 0 1\n";
        let reader = TableReader::from_reader(Cursor::new(table)).unwrap();
        let params = NormalizeParams {
            targets: Some(["chr1".to_string()].into_iter().collect()),
            ..Default::default()
        };
        let mut out = Vec::new();
        assert_eq!(rescale_table(reader, &mut out, &[1.0], 2.0, &params).unwrap(), 1);
        assert!(!String::from_utf8(out).unwrap().contains("chrM"));
    }

    #[test]
    fn test_zero_total_is_reported_by_name() {
        let totals = ColumnTotals {
            names: vec!["A".to_string(), "B".to_string()],
            values: vec![3.0, 0.0],
            rows: 2,
        };
        assert!(matches!(
            totals.check_nonzero(4),
            Err(NormalizeError::ZeroColumnTotal { tnum: 4, column }) if column == "B"
        ));

        let empty = ColumnTotals {
            rows: 0,
            ..totals
        };
        assert!(empty.check_nonzero(4).is_ok());
    }

    #[test]
    fn test_planned_outputs_must_be_distinct() {
        let groups = TitrationGroups::from_lists(
            None,
            vec![vec![PathBuf::from("d/s_rep1.gtab"), PathBuf::from("d/s_rep2.gtab")]],
        )
        .unwrap();
        match plan_outputs(&groups, &NormalizeParams::default()) {
            Err(NormalizeError::DuplicateOutput { first, second, output }) => {
                assert_eq!(first, PathBuf::from("d/s_rep1.gtab"));
                assert_eq!(second, PathBuf::from("d/s_rep2.gtab"));
                assert_eq!(output, PathBuf::from("d/s_num.gtab.gz"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_planned_output_must_not_replace_another_input() {
        // Group 0 would write over the input of group 1
        let groups = TitrationGroups::from_lists(
            None,
            vec![vec![PathBuf::from("d/a_x.gtab")], vec![PathBuf::from("d/a_num.gtab")]],
        )
        .unwrap();
        let params = NormalizeParams {
            compression: None,
            ..Default::default()
        };
        assert!(matches!(
            plan_outputs(&groups, &params),
            Err(NormalizeError::OutputOverwritesInput(path)) if path == PathBuf::from("d/a_num.gtab")
        ));
    }

    #[test]
    fn test_output_path() {
        let input = Path::new("/data/H1_NCP_sp_4_Ncov.gtab.gz");
        assert_eq!(
            output_path(input, None, true),
            PathBuf::from("/data/H1_NCP_sp_4_num.gtab.gz")
        );
        assert_eq!(
            output_path(input, Some(Path::new("out")), false),
            PathBuf::from("out/H1_NCP_sp_4_num.gtab")
        );
        assert_eq!(
            output_path(Path::new("plain.gtab"), None, true),
            PathBuf::from("plain.gtab_num.gtab.gz")
        );
    }
}
