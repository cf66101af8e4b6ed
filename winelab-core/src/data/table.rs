//! Shared parser for the semicolon-delimited dataset format.
//!
//! The wine dataset is not standard CSV: headers are quote-wrapped, values are
//! optionally quoted and whitespace-padded, and the separator is `;`. Training,
//! evaluation and prediction all read partitions through this one module, so
//! they share a single set of edge-case rules:
//!
//! - the first non-blank line is the header; blank lines are skipped
//! - every field is split on `;` and has whitespace and `"` stripped
//! - a row with a different field count than the header is an error
//! - a malformed, empty or non-finite numeric cell becomes `None`, never zero

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Field separator of the dataset format.
pub const DELIMITER: char = ';';

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("dataset is empty (no header line)")]
    Empty,

    #[error("line {line}: expected {expected} fields, found {found}")]
    RaggedRow {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("target column '{0}' not found in dataset header")]
    MissingTarget(String),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Raw string table: header plus rows of cleaned fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Strip surrounding whitespace and quote characters from a field.
pub fn clean_field(raw: &str) -> &str {
    raw.trim().trim_matches('"').trim()
}

fn split_line(line: &str) -> Vec<String> {
    line.trim()
        .split(DELIMITER)
        .map(|f| clean_field(f).to_string())
        .collect()
}

impl Table {
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut lines = text
            .lines()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty());

        let (_, header_line) = lines.next().ok_or(ParseError::Empty)?;
        let headers = split_line(header_line);

        let mut rows = Vec::new();
        for (idx, line) in lines {
            let fields = split_line(line);
            if fields.len() != headers.len() {
                return Err(ParseError::RaggedRow {
                    line: idx + 1,
                    expected: headers.len(),
                    found: fields.len(),
                });
            }
            rows.push(fields);
        }

        Ok(Self { headers, rows })
    }

    pub fn read(path: &Path) -> Result<Self, ParseError> {
        let text = fs::read_to_string(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// New table with the same header and the rows at `indices`, in that order.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            headers: self.headers.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    /// Coerce into numeric features plus an optional target column.
    ///
    /// With `target = Some(name)` the column must exist and is split off;
    /// with `None` every column is a feature.
    pub fn into_frame(self, target: Option<&str>) -> Result<NumericFrame, ParseError> {
        let target_idx = match target {
            Some(name) => Some(
                self.column_index(name)
                    .ok_or_else(|| ParseError::MissingTarget(name.to_string()))?,
            ),
            None => None,
        };

        let feature_names: Vec<String> = self
            .headers
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != target_idx)
            .map(|(_, h)| h.clone())
            .collect();

        let mut features = Vec::with_capacity(self.rows.len());
        let mut target_values = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let mut feature_row = Vec::with_capacity(feature_names.len());
            for (i, cell) in row.iter().enumerate() {
                if Some(i) == target_idx {
                    target_values.push(coerce_numeric(cell));
                } else {
                    feature_row.push(coerce_numeric(cell));
                }
            }
            features.push(feature_row);
        }

        let target = target_idx.map(|idx| {
            let kind = TargetKind::classify(&target_values);
            TargetColumn {
                name: self.headers[idx].clone(),
                values: target_values,
                kind,
            }
        });

        Ok(NumericFrame {
            feature_names,
            features,
            target,
        })
    }
}

/// Parse a cleaned cell as a float. Empty, malformed, `nan` and `inf` cells
/// are missing.
pub fn coerce_numeric(cell: &str) -> Option<f64> {
    let cell = clean_field(cell);
    if cell.is_empty() {
        return None;
    }
    cell.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Best-effort numeric kind of the target column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// Every present value is integral.
    Integer,
    Float,
}

impl TargetKind {
    fn classify(values: &[Option<f64>]) -> Self {
        let integral = values
            .iter()
            .flatten()
            .all(|v| v.fract() == 0.0);
        if integral {
            TargetKind::Integer
        } else {
            TargetKind::Float
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TargetColumn {
    pub name: String,
    pub values: Vec<Option<f64>>,
    pub kind: TargetKind,
}

/// Row-major numeric view of a table with explicit missing cells.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericFrame {
    pub feature_names: Vec<String>,
    pub features: Vec<Vec<Option<f64>>>,
    pub target: Option<TargetColumn>,
}

/// Rows with every cell present, ready for the model.
#[derive(Debug, Clone, PartialEq)]
pub struct CompleteRows {
    pub feature_names: Vec<String>,
    pub x: Vec<Vec<f64>>,
    /// Empty when the frame had no target column.
    pub y: Vec<f64>,
    /// Rows discarded because some cell was missing.
    pub dropped: usize,
    /// Kind of the target column, `None` without one.
    pub target_kind: Option<TargetKind>,
}

impl NumericFrame {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Drop every row that has a missing feature or target cell.
    pub fn complete_rows(self) -> CompleteRows {
        let mut x = Vec::with_capacity(self.features.len());
        let mut y = Vec::new();
        let mut dropped = 0;
        let target_kind = self.target.as_ref().map(|t| t.kind);

        for (i, row) in self.features.into_iter().enumerate() {
            let target = match &self.target {
                Some(t) => match t.values[i] {
                    Some(v) => Some(v),
                    None => {
                        dropped += 1;
                        continue;
                    }
                },
                None => None,
            };
            let values: Option<Vec<f64>> = row.into_iter().collect();
            match values {
                Some(values) => {
                    x.push(values);
                    if let Some(v) = target {
                        y.push(v);
                    }
                }
                None => dropped += 1,
            }
        }

        CompleteRows {
            feature_names: self.feature_names,
            x,
            y,
            dropped,
            target_kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const WINE: &str = "\"fixed acidity\";\"volatile acidity\";\"quality\"\n\
                        7.4;0.7;5\n\
                        \" 7.8 \";\"0.88\";\"5\"\n\
                        \n\
                        11.2;0.28;6\n";

    #[test]
    fn strips_quotes_and_whitespace() {
        let table = Table::parse(WINE).unwrap();
        assert_eq!(
            table.headers,
            vec!["fixed acidity", "volatile acidity", "quality"]
        );
        assert_eq!(table.len(), 3);
        assert_eq!(table.rows[1], vec!["7.8", "0.88", "5"]);
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(Table::parse(""), Err(ParseError::Empty)));
        assert!(matches!(Table::parse("\n  \n"), Err(ParseError::Empty)));
    }

    #[test]
    fn ragged_row_reports_line_number() {
        let err = Table::parse("a;b\n1;2\n3\n").unwrap_err();
        match err {
            ParseError::RaggedRow {
                line,
                expected,
                found,
            } => {
                assert_eq!(line, 3);
                assert_eq!(expected, 2);
                assert_eq!(found, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn frame_splits_target_and_classifies_integer() {
        let frame = Table::parse(WINE).unwrap().into_frame(Some("quality")).unwrap();
        assert_eq!(frame.feature_names, vec!["fixed acidity", "volatile acidity"]);
        let target = frame.target.unwrap();
        assert_eq!(target.kind, TargetKind::Integer);
        assert_eq!(target.values, vec![Some(5.0), Some(5.0), Some(6.0)]);
    }

    #[test]
    fn fractional_target_is_float() {
        let frame = Table::parse("x;y\n1;0.5\n2;1\n")
            .unwrap()
            .into_frame(Some("y"))
            .unwrap();
        assert_eq!(frame.target.unwrap().kind, TargetKind::Float);
    }

    #[test]
    fn missing_target_column_is_an_error() {
        let result = Table::parse(WINE).unwrap().into_frame(Some("rating"));
        assert!(matches!(result, Err(ParseError::MissingTarget(_))));
    }

    #[test]
    fn malformed_cells_become_missing_and_rows_are_dropped() {
        let text = "a;b;quality\n1.0;abc;5\n2.0;3.0;\n4.0;5.0;6\n";
        let frame = Table::parse(text).unwrap().into_frame(Some("quality")).unwrap();
        assert_eq!(frame.features[0], vec![Some(1.0), None]);

        let rows = frame.complete_rows();
        assert_eq!(rows.dropped, 2);
        assert_eq!(rows.x, vec![vec![4.0, 5.0]]);
        assert_eq!(rows.y, vec![6.0]);
    }

    #[test]
    fn non_finite_cells_are_missing() {
        for cell in ["inf", "-inf", "Infinity", "NaN", "1e400"] {
            assert_eq!(coerce_numeric(cell), None, "{cell}");
        }
        let rows = Table::parse("x;quality\ninf;5\n1.0;6\n2.0;-infinity\n")
            .unwrap()
            .into_frame(Some("quality"))
            .unwrap()
            .complete_rows();
        assert_eq!(rows.dropped, 2);
        assert_eq!(rows.x, vec![vec![1.0]]);
    }

    #[test]
    fn complete_rows_keeps_target_kind() {
        let rows = Table::parse(WINE)
            .unwrap()
            .into_frame(Some("quality"))
            .unwrap()
            .complete_rows();
        assert_eq!(rows.target_kind, Some(TargetKind::Integer));
    }

    #[test]
    fn frame_without_target_keeps_all_columns() {
        let rows = Table::parse("a;b\n1;2\n")
            .unwrap()
            .into_frame(None)
            .unwrap()
            .complete_rows();
        assert_eq!(rows.feature_names, vec!["a", "b"]);
        assert_eq!(rows.x, vec![vec![1.0, 2.0]]);
        assert!(rows.y.is_empty());
        assert_eq!(rows.target_kind, None);
    }

    #[test]
    fn select_rows_preserves_order() {
        let table = Table::parse(WINE).unwrap();
        let picked = table.select_rows(&[2, 0]);
        assert_eq!(picked.rows[0][0], "11.2");
        assert_eq!(picked.rows[1][0], "7.4");
    }

    proptest! {
        /// Cells without any digit never coerce to a number.
        #[test]
        fn non_numeric_cells_are_missing(cell in "[a-zA-Z_ ]{0,12}") {
            prop_assert_eq!(coerce_numeric(&cell), None);
        }

        #[test]
        fn finite_floats_survive_quoting_and_padding(v in -1.0e6..1.0e6_f64) {
            let cell = format!("  \"{v}\" ");
            prop_assert_eq!(coerce_numeric(&cell), Some(v));
        }
    }
}
