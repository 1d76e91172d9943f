//! Plain-text `.dat` triplet files
//!
//! ```text
//! % optional comment lines start with '%' or '#'
//! 3 3 4                  <- rows, columns, entries
//! 0 0 1.100000e0
//! 0 2 1.300000e0
//! 1 1 2.200000e0
//! 2 0 9.900000e0
//! ```
//!
//! Complex scalars store two value fields, real then imaginary part. Used for
//! regression fixtures and debugging.

use crate::error::{Result, SparseError};
use crate::sparse::{Csr3Matrix, IndexBase, StorageOrder};
use crate::traits::ComplexField;
use num_complex::{Complex32, Complex64};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Upper bound on the entries reserved up front from a file header
const MAX_PRERESERVED_ENTRIES: usize = 1 << 16;

/// Formatting of exported files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatOptions {
    /// Fractional digits of each value (scientific notation)
    pub precision: usize,
    /// Whether row/column indices start at 0 or 1
    pub index_base: IndexBase,
}

impl Default for DatOptions {
    fn default() -> Self {
        Self {
            precision: 6,
            index_base: IndexBase::Zero,
        }
    }
}

/// Scalars that can be written to and read from `.dat` files
pub trait DatScalar: ComplexField {
    /// Number of whitespace-separated value fields per entry
    const FIELDS: usize;

    /// Write the value fields, each preceded by a space
    fn write_fields<W: Write>(&self, out: &mut W, precision: usize) -> std::io::Result<()>;

    /// Parse exactly [`FIELDS`](Self::FIELDS) tokens
    fn parse_fields(fields: &[&str]) -> Option<Self>;
}

macro_rules! impl_dat_real {
    ($t:ty) => {
        impl DatScalar for $t {
            const FIELDS: usize = 1;

            fn write_fields<W: Write>(&self, out: &mut W, precision: usize) -> std::io::Result<()> {
                write!(out, " {:.*e}", precision, self)
            }

            fn parse_fields(fields: &[&str]) -> Option<Self> {
                fields[0].parse().ok()
            }
        }
    };
}

macro_rules! impl_dat_complex {
    ($t:ty) => {
        impl DatScalar for $t {
            const FIELDS: usize = 2;

            fn write_fields<W: Write>(&self, out: &mut W, precision: usize) -> std::io::Result<()> {
                write!(out, " {:.*e} {:.*e}", precision, self.re, precision, self.im)
            }

            fn parse_fields(fields: &[&str]) -> Option<Self> {
                Some(<$t>::new(fields[0].parse().ok()?, fields[1].parse().ok()?))
            }
        }
    };
}

impl_dat_real!(f64);
impl_dat_real!(f32);
impl_dat_complex!(Complex64);
impl_dat_complex!(Complex32);

/// Write the stored entries of `matrix` (holes skipped) in leading order
pub fn write_dat<T: DatScalar, W: Write>(
    matrix: &Csr3Matrix<T>,
    out: &mut W,
    options: &DatOptions,
) -> Result<()> {
    let base = options.index_base.offset();
    let entries = matrix.nonzeros_distribution().iter().sum::<usize>();
    writeln!(out, "{} {} {}", matrix.num_rows(), matrix.num_cols(), entries)?;
    for (row, col, value) in matrix.entries() {
        write!(out, "{} {}", row + base, col + base)?;
        value.write_fields(out, options.precision)?;
        writeln!(out)?;
    }
    Ok(())
}

fn parse_index(token: &str, base: usize, dim: usize, what: &str, line: usize) -> Result<usize> {
    let raw: usize = token
        .parse()
        .map_err(|_| SparseError::parse(line, format!("invalid {what} index '{token}'")))?;
    match raw.checked_sub(base) {
        Some(index) if index < dim => Ok(index),
        _ => Err(SparseError::parse(
            line,
            format!("{what} index {raw} outside 0..{dim} (base {base})"),
        )),
    }
}

/// Read a `.dat` stream into a compressed matrix with an exact allocation.
///
/// Repeated (row, col) records are summed.
pub fn read_dat<T: DatScalar, R: BufRead>(
    reader: R,
    order: StorageOrder,
    options: &DatOptions,
) -> Result<Csr3Matrix<T>> {
    let base = options.index_base.offset();
    let mut header: Option<(usize, usize, usize)> = None;
    let mut triplets = Vec::new();
    let mut line_no = 0;

    for line in reader.lines() {
        line_no += 1;
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('%') || trimmed.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = trimmed.split_whitespace().collect();

        let Some((num_rows, num_cols, expected)) = header else {
            let parsed: Option<Vec<usize>> = fields.iter().map(|f| f.parse().ok()).collect();
            match parsed.as_deref() {
                Some(&[rows, cols, count]) => {
                    // the declared count is untrusted until the entries are read
                    triplets.reserve(count.min(MAX_PRERESERVED_ENTRIES));
                    header = Some((rows, cols, count));
                }
                _ => {
                    return Err(SparseError::parse(
                        line_no,
                        "header must be '<rows> <cols> <entries>'",
                    ));
                }
            }
            continue;
        };

        if fields.len() != 2 + T::FIELDS {
            return Err(SparseError::parse(
                line_no,
                format!("expected {} fields, found {}", 2 + T::FIELDS, fields.len()),
            ));
        }
        if triplets.len() == expected {
            return Err(SparseError::parse(
                line_no,
                format!("more entries than the {expected} declared in the header"),
            ));
        }
        let row = parse_index(fields[0], base, num_rows, "row", line_no)?;
        let col = parse_index(fields[1], base, num_cols, "column", line_no)?;
        let value = T::parse_fields(&fields[2..])
            .ok_or_else(|| SparseError::parse(line_no, "invalid value"))?;
        triplets.push((row, col, value));
    }

    let Some((num_rows, num_cols, expected)) = header else {
        return Err(SparseError::parse(line_no, "missing header"));
    };
    if triplets.len() != expected {
        return Err(SparseError::parse(
            line_no,
            format!(
                "header declares {expected} entries but {} were read",
                triplets.len()
            ),
        ));
    }

    let mut matrix = Csr3Matrix::from_triplets(num_rows, num_cols, order, &triplets)?;
    matrix.compress();
    Ok(matrix)
}

impl<T: DatScalar> Csr3Matrix<T> {
    /// Export the matrix to a `.dat` file
    pub fn export_to_dat_file<P: AsRef<Path>>(&self, path: P, options: &DatOptions) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        write_dat(self, &mut out, options)?;
        out.flush()?;
        Ok(())
    }

    /// Import a matrix from a `.dat` file
    pub fn import_from_dat_file<P: AsRef<Path>>(
        path: P,
        order: StorageOrder,
        options: &DatOptions,
    ) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        read_dat(reader, order, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::SparseMatrix;
    use approx::assert_relative_eq;
    use std::io::Cursor;

    fn sample() -> Csr3Matrix {
        let mut m: Csr3Matrix = Csr3Matrix::new(3, 3, StorageOrder::RowMajor, 1.0);
        m.set(0, 0, 1.1).unwrap();
        m.set(0, 2, 1.3).unwrap();
        m.set(1, 1, 2.2).unwrap();
        m.set(2, 0, 9.9).unwrap();
        m
    }

    #[test]
    fn test_write_format() {
        let mut out = Vec::new();
        write_dat(&sample(), &mut out, &DatOptions::default()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "3 3 4");
        assert_eq!(lines[1], "0 0 1.100000e0");
        assert_eq!(lines[4], "2 0 9.900000e0");
    }

    #[test]
    fn test_roundtrip_one_based() {
        let options = DatOptions {
            precision: 3,
            index_base: IndexBase::One,
        };
        let original = sample();
        let mut out = Vec::new();
        write_dat(&original, &mut out, &options).unwrap();
        assert!(String::from_utf8_lossy(&out).contains("\n3 1 9.900e0\n"));

        let read: Csr3Matrix =
            read_dat(Cursor::new(out), StorageOrder::ColumnMajor, &options).unwrap();
        assert!(read.is_compressed());
        assert_eq!(read.nnz(), 4);
        for (row, col, value) in original.entries() {
            assert_relative_eq!(read.get_element(row, col), value, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let text = "% fixture\n\n# dims\n2 2 2\n0 1 5.0\n\n1 0 -2.5e-1\n";
        let m: Csr3Matrix =
            read_dat(Cursor::new(text), StorageOrder::RowMajor, &DatOptions::default()).unwrap();
        assert_relative_eq!(m.get_element(0, 1), 5.0);
        assert_relative_eq!(m.get_element(1, 0), -0.25);
    }

    #[test]
    fn test_parse_errors_report_line() {
        let options = DatOptions::default();
        let cases = [
            ("2 2\n", 1),
            ("2 2 1\n% ok\n0 x 1.0\n", 3),
            ("2 2 1\n0 2 1.0\n", 2),
            ("2 2 1\n0 1 1.0 3.0\n", 2),
            ("2 2 1\n0 1 abc\n", 2),
            ("2 2 1\n0 0 1.0\n1 1 1.0\n", 3),
            ("1 1 18446744073709551615\n", 1),
            ("1 1 18446744073709551615\n0 0 1.0\n", 2),
        ];
        for (text, expected_line) in cases {
            match read_dat::<f64, _>(Cursor::new(text), StorageOrder::RowMajor, &options) {
                Err(SparseError::Parse { line, .. }) => assert_eq!(line, expected_line, "{text:?}"),
                other => panic!("expected parse error for {text:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_missing_entries_is_an_error() {
        let result = read_dat::<f64, _>(
            Cursor::new("3 3 2\n0 0 1.0\n"),
            StorageOrder::RowMajor,
            &DatOptions::default(),
        );
        assert!(matches!(result, Err(SparseError::Parse { .. })));
    }

    #[test]
    fn test_complex_fields() {
        let mut m: Csr3Matrix<Complex64> = Csr3Matrix::new(2, 2, StorageOrder::RowMajor, 1.0);
        m.set(1, 0, Complex64::new(0.5, -1.5)).unwrap();
        let mut out = Vec::new();
        write_dat(&m, &mut out, &DatOptions::default()).unwrap();
        assert!(String::from_utf8_lossy(&out).contains("1 0 5.000000e-1 -1.500000e0"));

        let read: Csr3Matrix<Complex64> =
            read_dat(Cursor::new(out), StorageOrder::RowMajor, &DatOptions::default()).unwrap();
        assert_relative_eq!(read.get_element(1, 0).im, -1.5);
    }

    #[test]
    fn test_file_roundtrip() {
        let path = std::env::temp_dir().join(format!("math_sparse_io_{}.dat", std::process::id()));
        let original = sample();
        original
            .export_to_dat_file(&path, &DatOptions::default())
            .unwrap();
        let read: Csr3Matrix =
            Csr3Matrix::import_from_dat_file(&path, StorageOrder::RowMajor, &DatOptions::default())
                .unwrap();
        std::fs::remove_file(&path).ok();

        assert_relative_eq!(read.get_element(0, 2), 1.3, epsilon = 1e-6);
        assert_relative_eq!(read.get_element(2, 0), 9.9, epsilon = 1e-6);
    }
}
