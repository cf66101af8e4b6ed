//! The five pipeline stages.

pub mod evaluation;
pub mod ingestion;
pub mod training;
pub mod transformation;
pub mod validation;

pub use evaluation::ModelEvaluation;
pub use ingestion::DataIngestion;
pub use training::ModelTrainer;
pub use transformation::DataTransformation;
pub use validation::DataValidation;

use std::path::Path;
use tracing::{info, warn};
use winelab_core::data::{CompleteRows, Table};

use crate::stage::StageError;

/// Read a partition with the shared parser and keep only complete rows.
pub(crate) fn load_partition(path: &Path, target: &str) -> Result<CompleteRows, StageError> {
    let table = Table::read(path).map_err(|e| StageError::parse(path, e))?;
    let frame = table
        .into_frame(Some(target))
        .map_err(|e| StageError::parse(path, e))?;
    let rows = frame.complete_rows();
    if rows.dropped > 0 {
        warn!(
            path = %path.display(),
            dropped = rows.dropped,
            "dropped rows with missing or malformed values"
        );
    }
    info!(
        path = %path.display(),
        rows = rows.x.len(),
        columns = ?rows.feature_names,
        "processed data"
    );
    Ok(rows)
}
