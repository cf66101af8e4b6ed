//! Train/test partitioning and partition persistence.

use super::table::Table;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SplitError {
    #[error("test_size must be in (0, 1), got {0}")]
    InvalidRatio(f64),

    #[error("{rows} rows cannot be split with test_size {test_size}: both partitions must be non-empty")]
    TooFewRows { rows: usize, test_size: f64 },

    #[error("failed to write partition {}: {reason}", path.display())]
    Write { path: PathBuf, reason: String },
}

/// Shuffle rows with a seeded RNG and cut off `ceil(n * test_size)` rows
/// as the test partition. Returns `(train, test)`.
///
/// The same seed and input always produce the same partitions.
pub fn train_test_split(
    table: &Table,
    test_size: f64,
    seed: u64,
) -> Result<(Table, Table), SplitError> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(SplitError::InvalidRatio(test_size));
    }
    let n = table.len();
    let n_test = (n as f64 * test_size).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(SplitError::TooFewRows { rows: n, test_size });
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let (test_idx, train_idx) = indices.split_at(n_test);
    Ok((table.select_rows(train_idx), table.select_rows(test_idx)))
}

/// Write a partition in the dataset format: `;`-separated, header and text
/// cells quoted, numeric cells bare.
pub fn write_partition(table: &Table, path: &Path) -> Result<(), SplitError> {
    let write_err = |reason: String| SplitError::Write {
        path: path.to_path_buf(),
        reason,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
    }

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .quote_style(csv::QuoteStyle::NonNumeric)
        .from_path(path)
        .map_err(|e| write_err(e.to_string()))?;

    writer
        .write_record(&table.headers)
        .map_err(|e| write_err(e.to_string()))?;
    for row in &table.rows {
        writer
            .write_record(row)
            .map_err(|e| write_err(e.to_string()))?;
    }
    writer.flush().map_err(|e| write_err(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn table(n: usize) -> Table {
        Table {
            headers: vec!["x".into(), "quality".into()],
            rows: (0..n)
                .map(|i| vec![format!("{}.5", i), format!("{}", i % 4 + 3)])
                .collect(),
        }
    }

    #[test]
    fn eighty_twenty_split_sizes() {
        let (train, test) = train_test_split(&table(50), 0.2, 42).unwrap();
        assert_eq!(train.len(), 40);
        assert_eq!(test.len(), 10);
    }

    #[test]
    fn test_size_rounds_up() {
        let (train, test) = train_test_split(&table(10), 0.25, 1).unwrap();
        assert_eq!(test.len(), 3);
        assert_eq!(train.len(), 7);
    }

    #[test]
    fn partitions_are_disjoint_and_cover_input() {
        let input = table(30);
        let (train, test) = train_test_split(&input, 0.3, 7).unwrap();
        let mut all: Vec<_> = train.rows.iter().chain(test.rows.iter()).cloned().collect();
        all.sort();
        let mut expected = input.rows.clone();
        expected.sort();
        assert_eq!(all, expected);
    }

    #[test]
    fn same_seed_same_split() {
        let input = table(25);
        let a = train_test_split(&input, 0.2, 99).unwrap();
        let b = train_test_split(&input, 0.2, 99).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn invalid_ratio_is_rejected() {
        assert!(matches!(
            train_test_split(&table(10), 0.0, 1),
            Err(SplitError::InvalidRatio(_))
        ));
        assert!(matches!(
            train_test_split(&table(10), 1.0, 1),
            Err(SplitError::InvalidRatio(_))
        ));
    }

    #[test]
    fn single_row_cannot_be_split() {
        assert!(matches!(
            train_test_split(&table(1), 0.5, 1),
            Err(SplitError::TooFewRows { .. })
        ));
    }

    #[test]
    fn written_partition_reads_back_through_shared_parser() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out/train.csv");
        let input = table(5);
        write_partition(&input, &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("\"x\";\"quality\""));

        let back = Table::read(&path).unwrap();
        assert_eq!(back, input);
    }
}
