//! Data validation: compare the extracted dataset against the schema and
//! persist the status gate.
//!
//! A schema failure is a normal outcome (`passed = false`), not an error. The
//! status file is written in every case, including when the dataset cannot be
//! loaded at all, so the gate never holds a stale `true`.

use tracing::{error, info, warn};

use winelab_core::config::DataValidationConfig;
use winelab_core::data::{validate_dataset, StatusFile, ValidationReport};

use crate::stage::{Stage, StageDetail, StageError, StageName, StageOutcome};

pub struct DataValidation {
    config: DataValidationConfig,
}

impl DataValidation {
    pub fn new(config: DataValidationConfig) -> Self {
        Self { config }
    }
}

impl Stage for DataValidation {
    fn name(&self) -> StageName {
        StageName::Validation
    }

    fn run(&mut self) -> Result<StageOutcome, StageError> {
        let data = &self.config.unzip_data_dir;
        let status_file = &self.config.status_file;

        let report = match validate_dataset(data, &self.config.all_schema) {
            Ok(report) => report,
            Err(e) => {
                error!(path = %data.display(), error = %e, "dataset could not be validated");
                let failed = ValidationReport {
                    passed: false,
                    issues: Vec::new(),
                };
                StatusFile::write(status_file, &failed)?;
                return Err(e.into());
            }
        };

        for issue in &report.issues {
            warn!(%issue, "schema issue");
        }
        StatusFile::write(status_file, &report)?;
        info!(
            passed = report.passed,
            status_file = %status_file.display(),
            "validation status written"
        );

        Ok(StageOutcome::new(
            StageName::Validation,
            StageDetail::Validated {
                passed: report.passed,
                issues: report.issues.iter().map(ToString::to_string).collect(),
                status_file: status_file.clone(),
            },
        ))
    }
}
