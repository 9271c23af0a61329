//! Tab-separated result table serializer and parser.
//!
//! The table has one header row naming the eleven columns in
//! [`COLUMNS`] and one row per grain. Fields are separated by a single
//! tab, rows end with `\n`, and there is no index column or trailing
//! metadata.
//!
//! Floats are written in Rust's shortest round-trip form (`0.95`,
//! `1.0`, `12345.5`), so parsing a written table reproduces every value
//! bit for bit.
//!
//! Both directions are pure: strings in, strings out, no I/O.

use std::fmt::Write;

use seedmorph_pipeline::{FeatureRow, ShapeMeasurements};

/// Column names, in order.
pub const COLUMNS: [&str; 11] = [
    "file_name",
    "object_id",
    "detection_score",
    "AS_seed_area",
    "L_seed_length",
    "W_seed_width",
    "LWR_length_to_width_ratio",
    "eccentricity",
    "solidity",
    "PL_perimeter_length",
    "CS_seed_circularity",
];

/// Errors from writing or reading a result table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TsvError {
    /// A file name cannot be written without breaking the table layout.
    #[error("file name {0:?} contains a tab or line break")]
    InvalidFileName(String),

    /// The input has no header row.
    #[error("table is empty: missing header row")]
    MissingHeader,

    /// The header row does not name the expected columns.
    #[error("unexpected header: {found:?}")]
    HeaderMismatch {
        /// The header row as found.
        found: String,
    },

    /// A data row has the wrong number of fields.
    #[error("line {line}: expected {expected} fields, found {found}")]
    FieldCount {
        /// 1-based line number.
        line: usize,
        /// Number of columns in the header.
        expected: usize,
        /// Number of fields on the line.
        found: usize,
    },

    /// A field could not be parsed as its column's type.
    #[error("line {line}: invalid {column} value {value:?}")]
    InvalidValue {
        /// 1-based line number.
        line: usize,
        /// Column name.
        column: &'static str,
        /// The offending field.
        value: String,
    },
}

/// Serialize rows into a tab-separated table with a header.
///
/// An empty slice produces the header row alone.
///
/// # Errors
///
/// Returns [`TsvError::InvalidFileName`] if a row's `source_image`
/// contains a tab, carriage return, or line feed.
///
/// # Examples
///
/// ```
/// use seedmorph_export::{COLUMNS, to_tsv};
///
/// let table = to_tsv(&[]).unwrap();
/// assert_eq!(table, format!("{}\n", COLUMNS.join("\t")));
/// ```
pub fn to_tsv(rows: &[FeatureRow]) -> Result<String, TsvError> {
    let mut out = String::new();
    let _ = writeln!(out, "{}", COLUMNS.join("\t"));

    for row in rows {
        if row.source_image.contains(['\t', '\r', '\n']) {
            return Err(TsvError::InvalidFileName(row.source_image.clone()));
        }
        let s = &row.shape;
        let _ = writeln!(
            out,
            "{}\t{}\t{:?}\t{:?}\t{:?}\t{:?}\t{:?}\t{:?}\t{:?}\t{:?}\t{:?}",
            row.source_image,
            row.object_id,
            row.detection_score,
            s.area,
            s.length,
            s.width,
            s.length_to_width_ratio,
            s.eccentricity,
            s.solidity,
            s.perimeter,
            s.circularity,
        );
    }

    Ok(out)
}

/// Parse a table written by [`to_tsv`] back into rows.
///
/// Blank lines are ignored and a trailing `\r` on any line is stripped.
///
/// # Errors
///
/// Returns a [`TsvError`] describing the first malformed line.
pub fn from_tsv(text: &str) -> Result<Vec<FeatureRow>, TsvError> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim_end_matches('\r')))
        .filter(|(_, l)| !l.is_empty());

    let (_, header) = lines.next().ok_or(TsvError::MissingHeader)?;
    if !header.split('\t').eq(COLUMNS) {
        return Err(TsvError::HeaderMismatch {
            found: header.to_string(),
        });
    }

    lines.map(|(line, l)| parse_row(line, l)).collect()
}

fn parse_row(line: usize, text: &str) -> Result<FeatureRow, TsvError> {
    let fields: Vec<&str> = text.split('\t').collect();
    if fields.len() != COLUMNS.len() {
        return Err(TsvError::FieldCount {
            line,
            expected: COLUMNS.len(),
            found: fields.len(),
        });
    }

    let float = |idx: usize| -> Result<f64, TsvError> {
        fields[idx]
            .parse::<f64>()
            .map_err(|_| invalid(line, idx, fields[idx]))
    };

    let object_id = fields[1]
        .parse::<usize>()
        .map_err(|_| invalid(line, 1, fields[1]))?;

    Ok(FeatureRow {
        source_image: fields[0].to_string(),
        object_id,
        detection_score: float(2)?,
        shape: ShapeMeasurements {
            area: float(3)?,
            length: float(4)?,
            width: float(5)?,
            length_to_width_ratio: float(6)?,
            eccentricity: float(7)?,
            solidity: float(8)?,
            perimeter: float(9)?,
            circularity: float(10)?,
        },
    })
}

fn invalid(line: usize, idx: usize, value: &str) -> TsvError {
    TsvError::InvalidValue {
        line,
        column: COLUMNS[idx],
        value: value.to_string(),
    }
}
