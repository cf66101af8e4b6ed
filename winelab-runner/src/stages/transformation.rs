//! Data transformation: consult the validation gate, then write seeded
//! train/test partitions.

use tracing::info;

use winelab_core::config::DataTransformationConfig;
use winelab_core::data::{train_test_split, write_partition, StatusFile, Table};

use crate::stage::{Stage, StageDetail, StageError, StageName, StageOutcome};

pub const TRAIN_FILE: &str = "train.csv";
pub const TEST_FILE: &str = "test.csv";

pub struct DataTransformation {
    config: DataTransformationConfig,
}

impl DataTransformation {
    pub fn new(config: DataTransformationConfig) -> Self {
        Self { config }
    }

    /// `Ok` only when the status file exists and says `true`.
    fn check_gate(&self) -> Result<(), StageError> {
        let status_file = &self.config.status_file;
        match StatusFile::read(status_file) {
            Ok(true) => Ok(()),
            Ok(false) => Err(StageError::GateClosed {
                status_file: status_file.clone(),
                reason: "validation status is false".to_string(),
            }),
            Err(e) => Err(StageError::GateClosed {
                status_file: status_file.clone(),
                reason: e.to_string(),
            }),
        }
    }
}

impl Stage for DataTransformation {
    fn name(&self) -> StageName {
        StageName::Transformation
    }

    fn run(&mut self) -> Result<StageOutcome, StageError> {
        self.check_gate()?;

        let data_path = &self.config.data_path;
        let table = Table::read(data_path).map_err(|e| StageError::parse(data_path, e))?;
        let split = self.config.split;
        let (train, test) = train_test_split(&table, split.test_size, split.seed)?;

        let train_path = self.config.root_dir.join(TRAIN_FILE);
        let test_path = self.config.root_dir.join(TEST_FILE);
        write_partition(&train, &train_path)?;
        write_partition(&test, &test_path)?;

        info!("splitted data into training and test sets");
        info!(rows = train.len(), columns = train.headers.len(), "train shape");
        info!(rows = test.len(), columns = test.headers.len(), "test shape");

        Ok(StageOutcome::new(
            StageName::Transformation,
            StageDetail::Split {
                train_rows: train.len(),
                test_rows: test.len(),
                train_path,
                test_path,
            },
        ))
    }
}
